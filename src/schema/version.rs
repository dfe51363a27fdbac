//! Format version strings.
//!
//! Versions are written as `"MAJOR.MINOR"`. A document is readable when its
//! major version equals [`Version::CURRENT`]'s. A newer minor version may add
//! optional keys, so unknown keys in such documents are only warnings.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\.(\d+)$").expect("version pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
}

impl Version {
    /// The version this crate reads and writes.
    pub const CURRENT: Version = Version { major: 3, minor: 0 };

    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Parse `"3.0"` into `Version { major: 3, minor: 0 }`.
    pub fn parse(s: &str) -> Option<Version> {
        let caps = VERSION_RE.captures(s.trim())?;
        let major = caps.get(1)?.as_str().parse().ok()?;
        let minor = caps.get(2)?.as_str().parse().ok()?;
        Some(Version { major, minor })
    }

    pub fn is_readable(&self) -> bool {
        self.major == Self::CURRENT.major
    }

    /// Same major as [`Version::CURRENT`] but a later minor revision.
    pub fn is_forward_compatible(&self) -> bool {
        self.is_readable() && self.minor > Self::CURRENT.minor
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}
