//! Lattices: ordered sequences of references and inline sub-lattices.
//!
//! A lattice never holds its children directly. Names are resolved against
//! the owning [`Document`](super::Document), which keeps nesting free of
//! in-memory reference cycles.

/// One item of a lattice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LatticeItem {
    /// Name of an element or of another lattice.
    Ref(String),
    /// An anonymous sub-lattice written in place.
    Inline(Vec<LatticeItem>),
}

impl LatticeItem {
    pub fn reference(name: impl Into<String>) -> Self {
        LatticeItem::Ref(name.into())
    }

    pub fn inline(items: impl IntoIterator<Item = LatticeItem>) -> Self {
        LatticeItem::Inline(items.into_iter().collect())
    }
}

impl From<&str> for LatticeItem {
    fn from(name: &str) -> Self {
        LatticeItem::Ref(name.to_string())
    }
}

/// A named beamline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lattice {
    name: String,
    items: Vec<LatticeItem>,
}

impl Lattice {
    pub fn new(name: impl Into<String>, items: impl IntoIterator<Item = LatticeItem>) -> Self {
        Self {
            name: name.into(),
            items: items.into_iter().collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn items(&self) -> &[LatticeItem] {
        &self.items
    }

    /// Every referenced name in order of appearance, inline arrays included.
    pub fn references(&self) -> Vec<&str> {
        fn walk<'a>(items: &'a [LatticeItem], out: &mut Vec<&'a str>) {
            for item in items {
                match item {
                    LatticeItem::Ref(name) => out.push(name),
                    LatticeItem::Inline(inner) => walk(inner, out),
                }
            }
        }

        let mut out = Vec::new();
        walk(&self.items, &mut out);
        out
    }
}
