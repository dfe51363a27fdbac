//! Typed in-memory model: elements, lattices and the owning document.

pub mod document;
pub mod element;
pub mod lattice;

pub use document::{Document, DocumentBuilder};
pub use element::{Element, ElementKind, Field};
pub use lattice::{Lattice, LatticeItem};
