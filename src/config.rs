//! Configuration file loading.
//!
//! Settings live in a TOML file:
//!
//! ```toml
//! [validation]
//! mode = "lenient"   # or "strict"
//! nesting = "both"   # or "inline", "named"
//! ```
//!
//! Search order:
//! 1. Explicit path if provided
//! 2. `latticejson.toml` in the working directory
//! 3. Platform-specific config directory
//! 4. Defaults

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use log::{debug, info};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::validate::ValidateOptions;

pub const FILE_NAME: &str = "latticejson.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub validation: ValidateOptions,
}

/// Find and load configuration.
///
/// An explicit path must exist. The other locations are skipped when absent.
pub fn load(explicit_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = explicit_path {
        info!(path = path.display().to_string(); "Loading configuration from explicit path");
        return load_file(path);
    }

    let local = Path::new(FILE_NAME);
    if local.exists() {
        info!(path = local.display().to_string(); "Loading configuration from local path");
        return load_file(local);
    }

    if let Some(system) = system_path() {
        if system.exists() {
            info!(path = system.display().to_string(); "Loading configuration from system path");
            return load_file(&system);
        }
        debug!(path = system.display().to_string(); "System configuration file not found");
    } else {
        debug!("Could not determine platform-specific config directory");
    }

    debug!("No configuration file found, using default configuration");
    Ok(Config::default())
}

/// `<config dir>/latticejson/latticejson.toml` on this platform.
pub fn system_path() -> Option<PathBuf> {
    ProjectDirs::from("org", "latticejson", "latticejson")
        .map(|dirs| dirs.config_dir().join(FILE_NAME))
}

pub fn load_file(path: &Path) -> Result<Config> {
    let fail = |reason: String| Error::Config {
        path: path.to_path_buf(),
        reason,
    };

    if !path.exists() {
        return Err(fail("file does not exist".into()));
    }
    let content = fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|e| fail(e.message().to_string()))
}
