//! Acyclicity of named lattice nesting.
//!
//! Depth-first search with a temporary/permanent mark per lattice. Hitting a
//! temporary mark means the name is already on the current path, so the
//! path from its first occurrence forms a cycle. The search keeps its own
//! stack of `(lattice, next child)` frames, so long chains of named
//! lattices cannot overflow the call stack.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::Rule;

use super::{Collector, escape_pointer};

#[derive(Copy, Clone, PartialEq, Eq)]
enum Mark {
    Temp,
    Perm,
}

/// Report every back edge of the lattice graph as one cycle violation.
pub(super) fn check(lattices: &Map<String, Value>, c: &mut Collector) {
    let children: BTreeMap<&str, Vec<&str>> = lattices
        .iter()
        .map(|(name, items)| {
            let mut kids = Vec::new();
            if let Some(items) = items.as_array() {
                collect_lattice_refs(items, lattices, &mut kids);
            }
            (name.as_str(), kids)
        })
        .collect();

    let mut marks = BTreeMap::<&str, Mark>::new();
    for root in lattices.keys() {
        let root = root.as_str();
        if marks.contains_key(root) {
            continue;
        }
        marks.insert(root, Mark::Temp);
        let mut stack: Vec<(&str, usize)> = vec![(root, 0)];

        while let Some(&(v, next)) = stack.last() {
            let Some(k) = children.get(v).and_then(|kids| kids.get(next)).copied() else {
                marks.insert(v, Mark::Perm);
                stack.pop();
                continue;
            };
            if let Some(top) = stack.last_mut() {
                top.1 += 1;
            }

            match marks.get(k) {
                Some(Mark::Perm) => {}
                Some(Mark::Temp) => report(k, &stack, c),
                None => {
                    marks.insert(k, Mark::Temp);
                    stack.push((k, 0));
                }
            }
        }
    }
}

fn collect_lattice_refs<'a>(
    items: &'a [Value],
    lattices: &Map<String, Value>,
    out: &mut Vec<&'a str>,
) {
    for item in items {
        match item {
            Value::String(name) if lattices.contains_key(name) => out.push(name),
            Value::Array(inner) => collect_lattice_refs(inner, lattices, out),
            _ => {}
        }
    }
}

/// `k` is on the current path: the path from `k` back to `k` is a cycle.
fn report(k: &str, stack: &[(&str, usize)], c: &mut Collector) {
    let start = stack.iter().position(|(n, _)| *n == k).unwrap_or(0);
    let mut names: Vec<String> = stack[start..].iter().map(|(n, _)| n.to_string()).collect();
    names.push(k.to_string());
    let reason = format!("lattice nesting is cyclic: {}", names.join(" -> "));
    c.error(
        Rule::Cycle { names },
        format!("/lattices/{}", escape_pointer(k)),
        reason,
    );
}
