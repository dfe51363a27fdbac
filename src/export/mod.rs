//! Writers for foreign lattice languages.
//!
//! Both dialects share one layout: a title line, one definition per element,
//! one `LINE` per lattice with every line defined before it is used, and a
//! closing `USE` of the root lattice. They differ in keyword tables and in
//! statement terminators, which each dialect supplies through [`Dialect`].

mod elegant;
mod madx;

use log::debug;

use crate::error::{Error, Result};
use crate::model::{Document, Element, ElementKind, Field, LatticeItem};
use crate::schema::ElementType;

pub use elegant::Elegant;
pub use madx::MadX;

/// A target lattice language.
pub trait Dialect: Sized {
    /// Short name used in error messages.
    const NAME: &'static str;

    /// Appended to every statement.
    const TERMINATOR: &'static str;

    /// Type keywords accepted on import besides [`Dialect::type_name`].
    const ALIASES: &'static [(&'static str, ElementType)] = &[];

    /// Quoted attribute values hold RPN expressions.
    const QUOTED_EXPRESSIONS: bool = false;

    fn header(title: &str) -> String;

    fn type_name(ty: ElementType) -> &'static str;

    /// Attribute keyword for a LatticeJSON parameter.
    fn attribute(param: &str) -> Option<&'static str>;

    /// `KEY=value` pairs for one element.
    fn attributes(element: &Element) -> Result<Vec<String>> {
        attributes_of::<Self>(element)
    }

    fn array(xs: &[f64]) -> String {
        let items: Vec<String> = xs.iter().copied().map(number).collect();
        format!("{{{}}}", items.join(", "))
    }
}

pub fn to_elegant(doc: &Document) -> Result<String> {
    write::<Elegant>(doc)
}

pub fn to_madx(doc: &Document) -> Result<String> {
    write::<MadX>(doc)
}

/// Render `doc` in dialect `D`.
pub fn write<D: Dialect>(doc: &Document) -> Result<String> {
    let root = doc
        .beamline()
        .ok_or_else(|| Error::export(D::NAME, "document has no root lattice"))?;
    let title = doc.title().unwrap_or(root.name());
    let end = D::TERMINATOR;

    let mut out = D::header(title);
    out.push('\n');

    for element in doc.elements().values() {
        let keyword = D::type_name(element.element_type());
        let attrs = D::attributes(element)?;
        if attrs.is_empty() {
            out.push_str(&format!("{}: {keyword}{end}\n", element.name()));
        } else {
            out.push_str(&format!(
                "{}: {keyword}, {}{end}\n",
                element.name(),
                attrs.join(", ")
            ));
        }
    }

    let order = doc.lattices_in_dependency_order();
    for lattice in &order {
        let mut names = Vec::new();
        flatten(lattice.items(), &mut names);
        out.push_str(&format!(
            "{}: LINE=({}){end}\n",
            lattice.name(),
            names.join(", ")
        ));
    }

    out.push_str(&format!("USE, {}{end}\n", root.name()));
    debug!(
        dialect = D::NAME,
        elements = doc.elements().len(),
        lines = order.len();
        "exported document"
    );
    Ok(out)
}

/// Every present parameter through the dialect's attribute table.
pub(crate) fn attributes_of<D: Dialect>(element: &Element) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for (param, field) in element.kind().fields() {
        let key = D::attribute(param).ok_or_else(|| {
            Error::export(
                D::NAME,
                format!("element '{}': no attribute for '{param}'", element.name()),
            )
        })?;
        match field {
            Field::Number(x) => out.push(format!("{key}={}", number(x))),
            Field::Numbers(xs) => out.push(format!("{key}={}", D::array(&xs))),
        }
    }
    Ok(out)
}

/// Inline arrays have no name in the target languages, so their items are
/// spliced into the enclosing line.
fn flatten<'a>(items: &'a [LatticeItem], out: &mut Vec<&'a str>) {
    for item in items {
        match item {
            LatticeItem::Ref(name) => out.push(name),
            LatticeItem::Inline(inner) => flatten(inner, out),
        }
    }
}

/// Shortest text that reads back as the same `f64`.
pub(crate) fn number(x: f64) -> String {
    format!("{x}")
}

/// The single non-zero order of a normal multipole, if it has exactly one.
pub(crate) fn single_order(element: &Element) -> Option<(usize, f64)> {
    let ElementKind::Multipole { knl, ksl } = element.kind() else {
        return None;
    };
    if ksl.as_ref().is_some_and(|ksl| ksl.iter().any(|k| *k != 0.0)) {
        return None;
    }
    let mut nonzero = knl.iter().copied().enumerate().filter(|(_, k)| *k != 0.0);
    match (nonzero.next(), nonzero.next()) {
        (Some(order), None) => Some(order),
        (None, _) => Some((0, 0.0)),
        _ => None,
    }
}
