//! Error types shared by the codec, the validator and the exporters.
//!
//! Validation collects [`Violation`]s instead of stopping at the first
//! problem. When a decode fails, the collected list is classified into one
//! of the [`Error`] variants so callers can match on the kind of failure
//! without parsing messages.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// A type alias for `Result<T, latticejson::Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the library.
#[derive(Debug, Error)]
pub enum Error {
    /// The input text is not well-formed JSON.
    #[error("parse error at line {line}, column {column}: {message}")]
    Parse {
        line: usize,
        column: usize,
        message: String,
    },

    /// The document violates the schema (shape, element or lattice rules).
    #[error(transparent)]
    Validation(ValidationError),

    /// A lattice references names that are not defined.
    #[error(transparent)]
    Reference(ReferenceError),

    /// Lattice nesting is circular.
    #[error(transparent)]
    Cycle(CycleError),

    /// A lookup by name missed.
    #[error("no {what} named '{name}'")]
    NotFound { what: &'static str, name: String },

    /// The document cannot be written in the requested dialect.
    #[error("cannot export to {dialect}: {reason}")]
    Export {
        dialect: &'static str,
        reason: String,
    },

    /// A foreign lattice file could not be read.
    #[error("cannot import {dialect} input at line {line}: {reason}")]
    Import {
        dialect: &'static str,
        line: usize,
        reason: String,
    },

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("invalid configuration in {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },

    #[error("I/O operation failed: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// A validated document could not be projected into the typed model.
    /// This is a bug in the validator, never a problem with the input.
    #[error("internal invariant violated: {0}")]
    Internal(String),
}

impl Error {
    pub(crate) fn not_found(what: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            what,
            name: name.into(),
        }
    }

    pub(crate) fn export(dialect: &'static str, reason: impl Into<String>) -> Self {
        Self::Export {
            dialect,
            reason: reason.into(),
        }
    }

    pub(crate) fn import(dialect: &'static str, line: usize, reason: impl Into<String>) -> Self {
        Self::Import {
            dialect,
            line,
            reason: reason.into(),
        }
    }

    /// All violations carried by this error, if it came out of validation.
    pub fn violations(&self) -> Option<&[Violation]> {
        match self {
            Error::Validation(err) => Some(err.violations()),
            Error::Reference(err) => Some(err.violations()),
            Error::Cycle(err) => Some(err.violations()),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Parse {
            line: err.line(),
            column: err.column(),
            message: err.to_string(),
        }
    }
}

impl From<ValidationError> for Error {
    /// Structural problems win over reference problems, which win over
    /// cycles: a cycle report is only meaningful once every name resolves.
    /// The chosen variant still carries every violation.
    fn from(err: ValidationError) -> Self {
        if err.violations.iter().any(|v| v.rule.is_structural()) {
            return Error::Validation(err);
        }

        let missing: Vec<Dangling> = err
            .violations
            .iter()
            .filter_map(|v| match &v.rule {
                Rule::Reference { name } => Some(Dangling {
                    name: name.clone(),
                    path: v.path.clone(),
                }),
                _ => None,
            })
            .collect();
        if !missing.is_empty() {
            return Error::Reference(ReferenceError {
                missing,
                violations: err.violations,
            });
        }

        let cycles: Vec<Vec<String>> = err
            .violations
            .iter()
            .filter_map(|v| match &v.rule {
                Rule::Cycle { names } => Some(names.clone()),
                _ => None,
            })
            .collect();
        if cycles.is_empty() {
            return Error::Validation(err);
        }
        Error::Cycle(CycleError {
            cycles,
            violations: err.violations,
        })
    }
}

/// How serious a finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// The document is rejected.
    Error,
    /// Reported, but the document is accepted (lenient mode).
    Warning,
}

impl Severity {
    pub fn is_error(&self) -> bool {
        matches!(self, Severity::Error)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// Which validation phase found a violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    /// Top-level keys, their JSON types, the version string.
    Shape,
    /// An element entry: its type tag or its parameters.
    Element,
    /// A lattice entry or the `root` selection.
    Lattice,
    /// A name that resolves to nothing.
    Reference { name: String },
    /// A lattice that (transitively) contains itself.
    Cycle { names: Vec<String> },
}

impl Rule {
    pub fn is_structural(&self) -> bool {
        matches!(self, Rule::Shape | Rule::Element | Rule::Lattice)
    }

    fn label(&self) -> &'static str {
        match self {
            Rule::Shape => "shape",
            Rule::Element => "element",
            Rule::Lattice => "lattice",
            Rule::Reference { .. } => "reference",
            Rule::Cycle { .. } => "cycle",
        }
    }
}

/// A single finding of the validator, located by a JSON pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub severity: Severity,
    pub rule: Rule,
    /// JSON pointer into the raw document, e.g. `/elements/Q1/0`.
    pub path: String,
    pub reason: String,
}

impl Violation {
    pub fn error(rule: Rule, path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            rule,
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn warning(rule: Rule, path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            rule,
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() { "/" } else { &self.path };
        write!(
            f,
            "{}[{}] {}: {}",
            self.severity,
            self.rule.label(),
            path,
            self.reason
        )
    }
}

/// Every error-level violation found in one validation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    violations: Vec<Violation>,
}

impl ValidationError {
    pub fn new(violations: Vec<Violation>) -> Self {
        Self { violations }
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "document failed validation with {} violation(s)",
            self.violations.len()
        )?;
        for v in &self.violations {
            write!(f, "\n  {v}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// A reference to an undefined name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dangling {
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceError {
    pub missing: Vec<Dangling>,
    violations: Vec<Violation>,
}

impl ReferenceError {
    /// The undefined names, in the order they were found.
    pub fn names(&self) -> Vec<&str> {
        self.missing.iter().map(|d| d.name.as_str()).collect()
    }

    /// Cycles found in the same pass. They may disappear once the missing
    /// names are defined, so they are reported alongside.
    pub fn cycles(&self) -> Vec<&[String]> {
        cycles_of(&self.violations)
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }
}

impl fmt::Display for ReferenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "undefined object(s) referenced:")?;
        for d in &self.missing {
            write!(f, "\n  '{}' at {}", d.name, d.path)?;
        }
        for cycle in self.cycles() {
            write!(f, "\n  cyclic nesting {}", cycle.join(" -> "))?;
        }
        Ok(())
    }
}

impl std::error::Error for ReferenceError {}

/// Every circular nesting path found; in each, the first and last names
/// are equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleError {
    pub cycles: Vec<Vec<String>>,
    violations: Vec<Violation>,
}

impl CycleError {
    /// A single cycle met while walking a typed document.
    pub(crate) fn walk(path: Vec<String>) -> Self {
        let first = path.first().cloned().unwrap_or_default();
        let violation = Violation::error(
            Rule::Cycle {
                names: path.clone(),
            },
            format!("/lattices/{}", crate::validate::escape_pointer(&first)),
            format!("lattice nesting is cyclic: {}", path.join(" -> ")),
        );
        Self {
            cycles: vec![path],
            violations: vec![violation],
        }
    }

    /// The first cycle found.
    pub fn path(&self) -> &[String] {
        self.cycles.first().map(Vec::as_slice).unwrap_or_default()
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }
}

impl fmt::Display for CycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let paths: Vec<String> = self.cycles.iter().map(|c| c.join(" -> ")).collect();
        write!(f, "cyclic lattice nesting: {}", paths.join("; "))
    }
}

impl std::error::Error for CycleError {}

fn cycles_of(violations: &[Violation]) -> Vec<&[String]> {
    violations
        .iter()
        .filter_map(|v| match &v.rule {
            Rule::Cycle { names } => Some(names.as_slice()),
            _ => None,
        })
        .collect()
}
