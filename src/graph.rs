//! Composition helpers over a document's lattice graph.
//!
//! Lattices refer to each other by name only, so every traversal here is an
//! explicit depth-first walk through the document's name-indexed maps. The
//! walks keep their own stack of frames, so nesting depth is limited by
//! memory rather than by the call stack. They also keep the current path of
//! lattice names and refuse to re-enter a name already on it, even though a
//! decoded document has been checked for cycles.

use std::collections::HashSet;

use crate::error::{CycleError, Error, Result};
use crate::model::{Document, Element, Lattice, LatticeItem};

impl Document {
    /// Look up an element definition by name.
    pub fn resolve_element(&self, name: &str) -> Result<&Element> {
        self.elements
            .get(name)
            .ok_or_else(|| Error::not_found("element", name))
    }

    /// The lattice selected by `root`, if the document declares one.
    pub fn beamline(&self) -> Option<&Lattice> {
        self.root.as_deref().and_then(|name| self.lattices.get(name))
    }

    fn start(&self, lattice: &str) -> Result<&Lattice> {
        self.lattices
            .get(lattice)
            .ok_or_else(|| Error::not_found("lattice", lattice))
    }

    /// The lattice behind a reference that is not an element.
    fn sub_lattice(&self, name: &str) -> Result<&Lattice> {
        self.lattices
            .get(name)
            .ok_or_else(|| Error::not_found("element or lattice", name))
    }

    /// Flatten a lattice into its ordered element sequence.
    ///
    /// Inline arrays and named sub-lattices are inlined at any depth.
    pub fn expand(&self, lattice: &str) -> Result<Vec<&Element>> {
        let start = self.start(lattice)?;
        let mut out = Vec::new();
        let mut path = Path::new(start.name());
        let mut stack = vec![Frame::lattice(start)];

        while let Some(frame) = stack.last_mut() {
            let items: &[LatticeItem] = frame.items;
            let Some(item) = items.get(frame.next) else {
                if let Some(done) = stack.pop().and_then(|f| f.lattice) {
                    path.leave(done);
                }
                continue;
            };
            frame.next += 1;

            match item {
                LatticeItem::Inline(inner) => stack.push(Frame::inline(inner)),
                LatticeItem::Ref(name) => {
                    if let Some(element) = self.elements.get(name) {
                        out.push(element);
                        continue;
                    }
                    let sub = self.sub_lattice(name)?;
                    path.enter(sub.name())?;
                    stack.push(Frame::lattice(sub));
                }
            }
        }
        Ok(out)
    }

    /// Sum of element lengths along the flattened lattice, in meters.
    pub fn length(&self, lattice: &str) -> Result<f64> {
        Ok(self.expand(lattice)?.iter().map(|e| e.length()).sum())
    }

    /// Render the nesting structure of a lattice as a text tree.
    ///
    /// ```text
    /// RING
    /// ├── CELL
    /// │   ├── Q1
    /// │   └── D1
    /// └── (inline)
    ///     └── CELL
    ///         ...
    /// ```
    pub fn tree(&self, lattice: &str) -> Result<String> {
        let start = self.start(lattice)?;
        let mut out = format!("{}\n", start.name());
        let mut path = Path::new(start.name());
        let mut stack = vec![(Frame::lattice(start), String::new())];

        while let Some((frame, prefix)) = stack.last_mut() {
            let items: &[LatticeItem] = frame.items;
            let Some(item) = items.get(frame.next) else {
                if let Some(done) = stack.pop().and_then(|(f, _)| f.lattice) {
                    path.leave(done);
                }
                continue;
            };
            frame.next += 1;

            let last = frame.next == items.len();
            let (branch, child_prefix) = if last {
                ("└── ", format!("{prefix}    "))
            } else {
                ("├── ", format!("{prefix}│   "))
            };

            match item {
                LatticeItem::Inline(inner) => {
                    out.push_str(&format!("{prefix}{branch}(inline)\n"));
                    stack.push((Frame::inline(inner), child_prefix));
                }
                LatticeItem::Ref(name) => {
                    out.push_str(&format!("{prefix}{branch}{name}\n"));
                    if self.elements.contains_key(name) {
                        continue;
                    }
                    let sub = self.sub_lattice(name)?;
                    path.enter(sub.name())?;
                    stack.push((Frame::lattice(sub), child_prefix));
                }
            }
        }
        Ok(out)
    }

    /// Every lattice, each listed after all lattices it references.
    ///
    /// Ties keep declaration order. Exporters rely on this because their
    /// target languages require a line to be defined before use.
    pub fn lattices_in_dependency_order(&self) -> Vec<&Lattice> {
        let mut seen = HashSet::new();
        let mut out = Vec::with_capacity(self.lattices.len());

        for lattice in self.lattices.values() {
            if !seen.insert(lattice.name()) {
                continue;
            }
            // Post-order: a lattice is emitted once all its references are.
            let mut stack = vec![(lattice, lattice.references(), 0)];
            while let Some((current, refs, next)) = stack.last_mut() {
                let Some(name) = refs.get(*next).copied() else {
                    out.push(*current);
                    stack.pop();
                    continue;
                };
                *next += 1;
                if let Some(sub) = self.lattices.get(name)
                    && seen.insert(sub.name())
                {
                    stack.push((sub, sub.references(), 0));
                }
            }
        }
        out
    }
}

/// Progress through one item list during a walk.
struct Frame<'a> {
    items: &'a [LatticeItem],
    next: usize,
    /// Set when the items belong to a named lattice rather than an inline
    /// array, so the name leaves the path once they are done.
    lattice: Option<&'a str>,
}

impl<'a> Frame<'a> {
    fn lattice(lattice: &'a Lattice) -> Self {
        Self {
            items: lattice.items(),
            next: 0,
            lattice: Some(lattice.name()),
        }
    }

    fn inline(items: &'a [LatticeItem]) -> Self {
        Self {
            items,
            next: 0,
            lattice: None,
        }
    }
}

/// Named lattices currently being walked, outermost first.
struct Path<'a> {
    names: Vec<&'a str>,
    on_path: HashSet<&'a str>,
}

impl<'a> Path<'a> {
    fn new(start: &'a str) -> Self {
        Self {
            names: vec![start],
            on_path: HashSet::from([start]),
        }
    }

    /// Push `name`, failing if it is already on the path.
    fn enter(&mut self, name: &'a str) -> Result<()> {
        if !self.on_path.insert(name) {
            let pos = self.names.iter().position(|n| *n == name).unwrap_or(0);
            let mut cycle: Vec<String> = self.names[pos..].iter().map(|n| n.to_string()).collect();
            cycle.push(name.to_string());
            return Err(Error::Cycle(CycleError::walk(cycle)));
        }
        self.names.push(name);
        Ok(())
    }

    fn leave(&mut self, name: &'a str) {
        self.names.pop();
        self.on_path.remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode;
    use crate::model::ElementKind;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const FODO: &str = r#"{
        "version": "3.0",
        "root": "RING",
        "elements": {
            "Q1": ["quadrupole", {"length": 0.5}],
            "D1": ["drift", {"length": 1.0}],
            "B1": ["dipole", {"length": 2.0, "angle": 0.1}]
        },
        "lattices": {
            "RING": ["CELL", ["B1", "CELL"]],
            "CELL": ["Q1", "D1"],
            "FODO": ["Q1"]
        }
    }"#;

    fn names<'a>(elements: &[&'a Element]) -> Vec<&'a str> {
        elements.iter().map(|e| e.name()).collect()
    }

    #[test]
    fn expand_single_element_lattice() {
        let doc = decode(FODO).unwrap();
        let flat = doc.expand("FODO").unwrap();
        assert_eq!(flat.len(), 1);
        assert_eq!(flat[0].name(), "Q1");
        assert_eq!(
            flat[0].kind(),
            &ElementKind::Quadrupole {
                length: 0.5,
                k1: None
            }
        );
    }

    #[test]
    fn expand_inlines_named_and_inline_sub_lattices() {
        let doc = decode(FODO).unwrap();
        let flat = doc.expand("RING").unwrap();
        assert_eq!(names(&flat), vec!["Q1", "D1", "B1", "Q1", "D1"]);
        assert_eq!(doc.length("RING").unwrap(), 5.0);
    }

    #[test]
    fn expand_unknown_lattice_is_not_found() {
        let doc = decode(FODO).unwrap();
        let err = doc.expand("NOPE").unwrap_err();
        assert!(matches!(err, Error::NotFound { what: "lattice", .. }));
    }

    #[test]
    fn expand_detects_cycles_in_unvalidated_documents() {
        let mut doc = decode(FODO).unwrap();
        // Bypass validation to build a cyclic graph.
        doc.lattices.insert(
            "CELL".into(),
            Lattice::new("CELL", ["Q1".into(), "RING".into()]),
        );

        match doc.expand("RING").unwrap_err() {
            Error::Cycle(c) => assert_eq!(c.path().to_vec(), vec!["RING", "CELL", "RING"]),
            other => panic!("expected cycle, got {other:?}"),
        }
        assert!(matches!(doc.tree("RING"), Err(Error::Cycle(_))));
    }

    #[test]
    fn resolve_element_misses_with_not_found() {
        let doc = decode(FODO).unwrap();
        assert_eq!(doc.resolve_element("D1").unwrap().length(), 1.0);
        let err = doc.resolve_element("CELL").unwrap_err();
        assert_eq!(err.to_string(), "no element named 'CELL'");
    }

    #[test]
    fn tree_draws_nesting() {
        let doc = decode(FODO).unwrap();
        let expected = "\
RING
├── CELL
│   ├── Q1
│   └── D1
└── (inline)
    ├── B1
    └── CELL
        ├── Q1
        └── D1
";
        assert_eq!(doc.tree("RING").unwrap(), expected);
    }

    #[test]
    fn dependency_order_lists_children_first() {
        let doc = decode(FODO).unwrap();
        let order: Vec<&str> = doc
            .lattices_in_dependency_order()
            .iter()
            .map(|l| l.name())
            .collect();
        assert_eq!(order, vec!["CELL", "RING", "FODO"]);
    }

    /// `L0 -> L1 -> ... -> L{depth}`, the last one holding a drift.
    fn chain(depth: usize) -> String {
        let mut lattices = serde_json::Map::new();
        for i in 0..depth {
            lattices.insert(format!("L{i}"), json!([format!("L{}", i + 1)]));
        }
        lattices.insert(format!("L{depth}"), json!(["D"]));
        json!({
            "version": "3.0",
            "root": "L0",
            "elements": {"D": ["drift", {"length": 0.5}]},
            "lattices": lattices
        })
        .to_string()
    }

    #[test]
    fn deep_named_chains_walk_without_recursion() {
        let doc = decode(&chain(10_000)).unwrap();

        assert_eq!(names(&doc.expand("L0").unwrap()), vec!["D"]);
        assert_eq!(doc.length("L0").unwrap(), 0.5);

        let order = doc.lattices_in_dependency_order();
        assert_eq!(order.len(), 10_001);
        assert_eq!(order[0].name(), "L10000");
        assert_eq!(order[10_000].name(), "L0");

        let tree = doc.tree("L9000").unwrap();
        assert_eq!(tree.lines().count(), 1_002);
        assert!(tree.ends_with("└── D\n"));
    }

    #[test]
    fn deep_cycles_are_caught_during_walks() {
        let mut doc = decode(&chain(10_000)).unwrap();
        doc.lattices
            .insert("L10000".into(), Lattice::new("L10000", ["L0".into()]));

        match doc.expand("L0").unwrap_err() {
            Error::Cycle(c) => {
                assert_eq!(c.path().len(), 10_002);
                assert_eq!(c.path().first(), c.path().last());
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn beamline_follows_root() {
        let doc = decode(FODO).unwrap();
        assert_eq!(doc.beamline().map(|l| l.name()), Some("RING"));
    }
}
