use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;

use anyhow::{Context, anyhow, bail};
use clap::{Parser, Subcommand, ValueEnum};
use log::{LevelFilter, debug, info};

use latticejson::{Document, ElementType, ValidateOptions, codec, config, export, import, migrate, schema};

pub type Result<T> = anyhow::Result<T>;

#[derive(Debug, Parser)]
#[command(name = "latticejson")]
#[command(about = "Validate, inspect and convert LatticeJSON files", long_about = None)]
struct Cli {
    /// Path to a configuration file (default: ./latticejson.toml, then the
    /// platform config directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (off, error, warn, info, debug, trace).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Check a file and list every violation.
    Validate { file: PathBuf },

    /// Describe one element or lattice.
    Show { file: PathBuf, name: String },

    /// Print the nesting of a lattice (default: the root).
    Tree { file: PathBuf, lattice: Option<String> },

    /// Print the flattened element sequence of a lattice (default: the root).
    Expand { file: PathBuf, lattice: Option<String> },

    /// Re-encode a file in canonical form.
    Format {
        file: PathBuf,

        /// Overwrite the file instead of printing.
        #[arg(short, long)]
        in_place: bool,
    },

    /// Convert to another lattice language.
    Export {
        file: PathBuf,

        #[arg(long, value_enum)]
        to: Dialect,

        #[arg(short = 'o', long)]
        out: Option<PathBuf>,
    },

    /// Read an elegant or MAD-X lattice file into LatticeJSON.
    Import {
        file: PathBuf,

        /// Input language (default: from the file extension).
        #[arg(long, value_enum)]
        from: Option<Dialect>,

        #[arg(short = 'o', long)]
        out: Option<PathBuf>,
    },

    /// Rewrite a file written for an older format version.
    Migrate {
        file: PathBuf,

        /// Source major version (default: read from the file).
        #[arg(long)]
        from: Option<u32>,

        /// Target major version (default: current).
        #[arg(long)]
        to: Option<u32>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Dialect {
    Elegant,
    Madx,
}

impl Dialect {
    fn from_extension(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("lte") => Ok(Dialect::Elegant),
            Some("madx" | "seq" | "mad") => Ok(Dialect::Madx),
            _ => bail!(
                "cannot tell the language of {} from its extension, pass --from",
                path.display()
            ),
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = LevelFilter::from_str(&cli.log_level).unwrap_or_else(|_| {
        eprintln!("Invalid log level: {}. Using 'warn' instead.", cli.log_level);
        LevelFilter::Warn
    });
    env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(log_level)
        .init();
    debug!(cli:?; "Parsed arguments");

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = config::load(cli.config.as_deref())?;
    let options = config.validation;
    info!(mode:? = options.mode, nesting:? = options.nesting; "Validation settings");

    match cli.cmd {
        Commands::Validate { file } => return validate_file(&file, &options),
        Commands::Show { file, name } => {
            let doc = read(&file, &options)?;
            println!("{}", describe(&doc, &name)?);
        }
        Commands::Tree { file, lattice } => {
            let doc = read(&file, &options)?;
            let name = lattice_or_root(&doc, lattice)?;
            print!("{}", doc.tree(&name)?);
        }
        Commands::Expand { file, lattice } => {
            let doc = read(&file, &options)?;
            let name = lattice_or_root(&doc, lattice)?;
            for element in doc.expand(&name)? {
                println!("{}", element.name());
            }
        }
        Commands::Format { file, in_place } => {
            let doc = read(&file, &options)?;
            let text = codec::encode(&doc);
            if in_place {
                fs::write(&file, text)
                    .with_context(|| format!("failed to write {}", file.display()))?;
            } else {
                print!("{text}");
            }
        }
        Commands::Export { file, to, out } => {
            let doc = read(&file, &options)?;
            let text = match to {
                Dialect::Elegant => export::to_elegant(&doc)?,
                Dialect::Madx => export::to_madx(&doc)?,
            };
            emit(out.as_deref(), &text)?;
        }
        Commands::Import { file, from, out } => {
            let from = match from {
                Some(from) => from,
                None => Dialect::from_extension(&file)?,
            };
            let text = read_text(&file)?;
            let doc = match from {
                Dialect::Elegant => import::from_elegant(&text),
                Dialect::Madx => import::from_madx(&text),
            }
            .with_context(|| format!("failed to import {}", file.display()))?;
            emit(out.as_deref(), &codec::encode(&doc))?;
        }
        Commands::Migrate { file, from, to } => {
            let raw: serde_json::Value = serde_json::from_str(&read_text(&file)?)
                .map_err(latticejson::Error::from)
                .with_context(|| format!("failed to parse {}", file.display()))?;
            let from = match from {
                Some(v) => v,
                None => migrate::source_version(&raw)?,
            };
            let to = to.unwrap_or(schema::Version::CURRENT.major);
            let migrated = migrate::migrate(raw, from, to)?;

            if to == schema::Version::CURRENT.major {
                let doc = codec::decode_with(&migrated.to_string(), &options)
                    .context("migrated document does not validate")?;
                print!("{}", codec::encode(&doc));
            } else {
                println!("{}", serde_json::to_string_pretty(&migrated)?);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Write `text` to `out`, or to stdout without one.
fn emit(out: Option<&Path>, text: &str) -> Result<()> {
    match out {
        Some(out) => {
            fs::write(out, text).with_context(|| format!("failed to write {}", out.display()))?;
            println!("Wrote {}", out.display());
        }
        None => print!("{text}"),
    }
    Ok(())
}

fn read(path: &Path, options: &ValidateOptions) -> Result<Document> {
    let text = read_text(path)?;
    codec::decode_with(&text, options).with_context(|| format!("invalid file {}", path.display()))
}

/// Print every violation on its own line; failure if any is an error.
fn validate_file(path: &Path, options: &ValidateOptions) -> Result<ExitCode> {
    let text = read_text(path)?;
    let raw: serde_json::Value = match serde_json::from_str(&text) {
        Ok(raw) => raw,
        Err(err) => {
            println!("{}: {}", path.display(), latticejson::Error::from(err));
            return Ok(ExitCode::FAILURE);
        }
    };

    match latticejson::validate(&raw, options) {
        Ok(warnings) => {
            for w in &warnings {
                println!("{w}");
            }
            println!("{}: valid", path.display());
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            for v in err.violations() {
                println!("{v}");
            }
            println!("{}: {} error(s)", path.display(), err.len());
            Ok(ExitCode::FAILURE)
        }
    }
}

fn lattice_or_root(doc: &Document, lattice: Option<String>) -> Result<String> {
    lattice
        .or_else(|| doc.root().map(str::to_string))
        .ok_or_else(|| anyhow!("no lattice given and the document has no root"))
}

fn describe(doc: &Document, name: &str) -> Result<String> {
    if let Some(element) = doc.element(name) {
        let ty = element.element_type();
        let article = if matches!(ty, ElementType::Octupole) { "an" } else { "a" };
        let mut line = format!("The element {name} is {article} {ty}");
        if element.length() > 0.0 {
            line.push_str(&format!(" and is {} meters long", element.length()));
        }
        line.push('.');
        if let Some(info) = element.info() {
            line.push_str(&format!(" {info}"));
        }
        return Ok(line);
    }

    if doc.lattice(name).is_some() {
        let elements = doc.expand(name)?;
        let length: f64 = elements.iter().map(|e| e.length()).sum();
        return Ok(format!(
            "The lattice {name} has {} elements and is {length} meters long.",
            elements.len()
        ));
    }

    bail!("no element or lattice named '{name}'")
}
