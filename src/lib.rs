//! LatticeJSON: a JSON file format for particle-accelerator lattices.
//!
//! The crate reads, validates and writes LatticeJSON documents, and
//! converts them to and from the elegant and MAD-X lattice languages:
//!
//! ```
//! let text = r#"{
//!   "version": "3.0",
//!   "elements": {"Q1": ["quadrupole", {"length": 0.5}]},
//!   "lattices": {"FODO": ["Q1"]}
//! }"#;
//! let doc = latticejson::decode(text)?;
//! let line = doc.expand("FODO")?;
//! assert_eq!(line[0].name(), "Q1");
//! # Ok::<(), latticejson::Error>(())
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod export;
mod graph;
pub mod import;
pub mod migrate;
pub mod model;
pub mod schema;
pub mod validate;

pub use codec::{DecodeCache, decode, decode_with, encode, read_file, to_value};
pub use config::Config;
pub use error::{
    CycleError, Error, ReferenceError, Result, Rule, Severity, ValidationError, Violation,
};
pub use model::{Document, DocumentBuilder, Element, ElementKind, Lattice, LatticeItem};
pub use schema::{ElementType, Version};
pub use validate::{Mode, Nesting, ValidateOptions, validate};
