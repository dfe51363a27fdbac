//! Readers for elegant and MAD-X lattice files.
//!
//! Input is split into statements, each statement is parsed with the
//! grammar in [`syntax`], and definitions are mapped back through the
//! keyword tables the exporters write with, so an exported file reads back
//! as the document it came from. Element types and attributes without a
//! LatticeJSON counterpart are reported with `warn!` and skipped; an
//! unknown type becomes a drift of the same length.
//!
//! Groups inside a `LINE` are spliced into it. A reversed line `-NAME`
//! refers to a generated `NAME_REV` line with the items in reverse order
//! and every sub-line reversed in turn. Elements read the same both ways.

mod source;
mod syntax;

use std::marker::PhantomData;

use indexmap::IndexMap;
use log::{debug, warn};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::export::{Dialect, Elegant, MadX};
use crate::model::{Document, Element, ElementKind, Lattice, LatticeItem};
use crate::schema::{ElementType, ParamSpec, ParamType, registry};

use source::{Source, Split};
use syntax::{Arg, Item, Literal, Statement, Target, Vars};

/// Bracket nesting allowed in one statement.
const MAX_NESTING: usize = 64;

/// Read an elegant `.lte` file.
pub fn from_elegant(text: &str) -> Result<Document> {
    read::<Elegant>(source::elegant(text))
}

/// Read a MAD-X file made of element definitions and `LINE`s.
pub fn from_madx(text: &str) -> Result<Document> {
    read::<MadX>(source::madx(text))
}

fn read<D: Dialect>(split: Split) -> Result<Document> {
    let mut reader = Reader::<D>::new(split.title);
    for statement in &split.statements {
        if reader.statement(statement)? == Flow::Stop {
            break;
        }
    }
    reader.finish()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

#[derive(Debug, Clone)]
struct Definition {
    line: usize,
    ty: ElementType,
    params: Map<String, Value>,
}

struct Reader<D> {
    vars: Vars,
    elements: IndexMap<String, Definition>,
    lines: IndexMap<String, Vec<String>>,
    /// The most recent `LINE` written in the file.
    last_line: Option<String>,
    root: Option<String>,
    title: Option<String>,
    dialect: PhantomData<D>,
}

impl<D: Dialect> Reader<D> {
    fn new(title: Option<String>) -> Self {
        Self {
            vars: syntax::builtin_vars(),
            elements: IndexMap::new(),
            lines: IndexMap::new(),
            last_line: None,
            root: None,
            title,
            dialect: PhantomData,
        }
    }

    fn fail(line: usize, reason: impl Into<String>) -> Error {
        Error::import(D::NAME, line, reason)
    }

    fn statement(&mut self, source: &Source) -> Result<Flow> {
        let line = source.line;
        if source::nesting(&source.text) > MAX_NESTING {
            return Err(Self::fail(
                line,
                format!("brackets nested deeper than {MAX_NESTING} levels"),
            ));
        }

        if D::QUOTED_EXPRESSIONS
            && let Some(rpn) = source.text.strip_prefix('%')
        {
            syntax::rpn(rpn, &mut self.vars).map_err(|e| Self::fail(line, e))?;
            return Ok(Flow::Continue);
        }

        match syntax::parse(&source.text).map_err(|e| Self::fail(line, e))? {
            Statement::Assign { name, value } => {
                let x = value.eval(&self.vars).map_err(|e| Self::fail(line, e))?;
                debug!(name = name.as_str(), value = x; "variable set");
                self.vars.insert(name, x);
            }
            Statement::Element {
                name,
                keyword,
                attributes,
            } => self.element(line, name, &keyword, attributes)?,
            Statement::Line { name, items } => {
                let mut names = Vec::new();
                self.arrange(items, &mut names);
                if self.lines.insert(name.clone(), names).is_some() {
                    debug!(line = name.as_str(); "line redefined");
                }
                self.last_line = Some(name);
            }
            Statement::Command { keyword, args } => return Ok(self.command(&keyword, &args)),
        }
        Ok(Flow::Continue)
    }

    fn element(
        &mut self,
        line: usize,
        name: String,
        keyword: &str,
        attributes: Vec<(String, Literal)>,
    ) -> Result<()> {
        if keyword == "SEQUENCE" {
            return Err(Self::fail(
                line,
                "SEQUENCE blocks are not supported, define beamlines with LINE",
            ));
        }

        let ty = element_type::<D>(keyword);
        let parent = match ty {
            Some(_) => None,
            None => self.elements.get(keyword).cloned(),
        };
        let mut def = match (ty, parent) {
            (Some(ty), _) => Definition {
                line,
                ty,
                params: Map::new(),
            },
            (None, Some(parent)) => Definition { line, ..parent },
            (None, None) => {
                warn!(
                    element = name.as_str(), keyword = keyword;
                    "unknown element type, imported as a drift"
                );
                let mut length = 0.0;
                for (key, value) in &attributes {
                    if key == "L" {
                        length = self.number(line, value)?;
                    }
                }
                let length = json_number(length).map_err(|e| Self::fail(line, e))?;
                let mut params = Map::new();
                params.insert("length".into(), length);
                self.define(name, Definition {
                    line,
                    ty: ElementType::Drift,
                    params,
                });
                return Ok(());
            }
        };

        let mut order = None;
        for (key, value) in attributes {
            if def.ty == ElementType::Multipole && key == "ORDER" {
                order = Some(self.order(line, &value)?);
                continue;
            }
            let Some(spec) = param_for::<D>(def.ty, &key) else {
                warn!(
                    element = name.as_str(), attribute = key.as_str();
                    "unknown attribute skipped"
                );
                continue;
            };
            let value = self.param(line, spec, &value)?;
            def.params.insert(spec.name.to_string(), value);
        }
        if let Some(order) = order {
            shift_to_order(&mut def.params, order);
        }

        self.define(name, def);
        Ok(())
    }

    fn define(&mut self, name: String, def: Definition) {
        if self.elements.contains_key(&name) {
            debug!(element = name.as_str(); "element redefined");
        }
        self.elements.insert(name, def);
    }

    fn number(&mut self, line: usize, value: &Literal) -> Result<f64> {
        match value {
            Literal::Expr(expr) => expr.eval(&self.vars),
            Literal::Text(text) if D::QUOTED_EXPRESSIONS => syntax::rpn(text, &mut self.vars),
            Literal::Text(text) => Err(format!("expected a number, found \"{text}\"")),
            Literal::Array(_) => Err("expected a number, found an array".to_string()),
        }
        .map_err(|e| Self::fail(line, e))
    }

    fn order(&mut self, line: usize, value: &Literal) -> Result<usize> {
        let x = self.number(line, value)?;
        if x < 0.0 || x.fract() != 0.0 {
            return Err(Self::fail(line, format!("ORDER must be a whole number, found {x}")));
        }
        Ok(x as usize)
    }

    fn param(&mut self, line: usize, spec: &ParamSpec, value: &Literal) -> Result<Value> {
        let fail = |e: String| Self::fail(line, e);
        if spec.ty != ParamType::NumberArray {
            return json_number(self.number(line, value)?).map_err(fail);
        }
        let xs = match value {
            Literal::Array(items) => items
                .iter()
                .map(|x| x.eval(&self.vars))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(fail)?,
            single => vec![self.number(line, single)?],
        };
        xs.into_iter()
            .map(json_number)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map(Value::Array)
            .map_err(fail)
    }

    /// Flatten `items` into element and line names.
    fn arrange(&mut self, items: Vec<Item>, out: &mut Vec<String>) {
        for item in items {
            let mut names = match item.target {
                Target::Name(name) => vec![name],
                Target::Group(inner) => {
                    let mut names = Vec::new();
                    self.arrange(inner, &mut names);
                    names
                }
            };
            if item.reversed {
                names.reverse();
                for name in &mut names {
                    *name = self.reversed(name);
                }
            }
            for _ in 0..item.count {
                out.extend(names.iter().cloned());
            }
        }
    }

    /// Name of the reversed form of `name`, generating `_REV` lines for it
    /// and every line below it.
    fn reversed(&mut self, name: &str) -> String {
        if !self.lines.contains_key(name) {
            return name.to_string();
        }

        let mut pending = vec![name.to_string()];
        while let Some(next) = pending.pop() {
            let rev = format!("{next}_REV");
            if self.lines.contains_key(&rev) {
                continue;
            }
            let Some(items) = self.lines.get(&next) else {
                continue;
            };
            let items: Vec<String> = items
                .iter()
                .rev()
                .map(|item| {
                    if self.lines.contains_key(item) {
                        pending.push(item.clone());
                        format!("{item}_REV")
                    } else {
                        item.clone()
                    }
                })
                .collect();
            debug!(line = rev.as_str(); "generated reversed line");
            self.lines.insert(rev, items);
        }
        format!("{name}_REV")
    }

    fn command(&mut self, keyword: &str, args: &[Arg]) -> Flow {
        match keyword {
            "USE" => {
                self.root = args
                    .iter()
                    .find(|a| matches!(a.key.as_deref(), None | Some("SEQUENCE" | "PERIOD" | "LINE")))
                    .map(|a| a.value.to_ascii_uppercase());
            }
            "TITLE" => self.title = args.first().map(|a| a.value.clone()),
            "RETURN" | "STOP" | "EXIT" => return Flow::Stop,
            _ => debug!(command = keyword; "command ignored"),
        }
        Flow::Continue
    }

    fn finish(self) -> Result<Document> {
        let mut builder = Document::builder();
        if let Some(title) = self.title {
            builder = builder.title(title);
        }

        for (name, mut def) in self.elements {
            for spec in registry().get(def.ty).required() {
                if !def.params.contains_key(spec.name) {
                    let zero = match spec.ty {
                        ParamType::NumberArray => Value::Array(Vec::new()),
                        _ => Value::from(0.0),
                    };
                    debug!(element = name.as_str(), param = spec.name; "missing parameter set to zero");
                    def.params.insert(spec.name.to_string(), zero);
                }
            }
            let kind = ElementKind::from_params(def.ty, &def.params)
                .map_err(|e| Error::import(D::NAME, def.line, format!("element '{name}': {e}")))?;
            builder = builder.element(Element::new(name, kind));
        }

        for (name, items) in self.lines {
            builder = builder.lattice(Lattice::new(name, items.into_iter().map(LatticeItem::Ref)));
        }
        if let Some(root) = self.root.or(self.last_line) {
            builder = builder.root(root);
        }

        let doc = builder.build()?;
        debug!(
            dialect = D::NAME,
            elements = doc.elements().len(),
            lattices = doc.lattices().len();
            "imported lattice file"
        );
        Ok(doc)
    }
}

/// Kind for a type keyword, through the dialect's export table first.
fn element_type<D: Dialect>(keyword: &str) -> Option<ElementType> {
    ElementType::ALL
        .into_iter()
        .find(|ty| D::type_name(*ty) == keyword)
        .or_else(|| {
            D::ALIASES
                .iter()
                .find(|(alias, _)| *alias == keyword)
                .map(|(_, ty)| *ty)
        })
}

/// The parameter an attribute keyword is written for.
fn param_for<D: Dialect>(ty: ElementType, key: &str) -> Option<&'static ParamSpec> {
    registry()
        .get(ty)
        .params
        .iter()
        .find(|p| D::attribute(p.name) == Some(key))
}

/// A single strength given with `ORDER=n` becomes the `n`-th entry.
fn shift_to_order(params: &mut Map<String, Value>, order: usize) {
    for key in ["knl", "ksl"] {
        if let Some(Value::Array(xs)) = params.get_mut(key)
            && xs.len() == 1
        {
            let mut shifted = vec![Value::from(0.0); order];
            shifted.append(xs);
            *xs = shifted;
        }
    }
}

fn json_number(x: f64) -> std::result::Result<Value, String> {
    serde_json::Number::from_f64(x)
        .map(Value::Number)
        .ok_or_else(|| format!("value {x} is not a finite number"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names(doc: &Document, lattice: &str) -> Vec<String> {
        doc.expand(lattice)
            .unwrap()
            .iter()
            .map(|e| e.name().to_string())
            .collect()
    }

    #[test]
    fn madx_variables_and_expressions() {
        let doc = from_madx(
            "lq = 0.5;\n\
             kq := 1.25;\n\
             qf: quadrupole, l=lq/2, k1=kq;\n\
             qd: qf, k1=-kq;\n\
             d: drift, l=2*lq;\n\
             cell: line=(qf, d, qd, d);\n",
        )
        .unwrap();

        assert_eq!(
            doc.element("QF").unwrap().kind(),
            &ElementKind::Quadrupole {
                length: 0.25,
                k1: Some(1.25)
            }
        );
        assert_eq!(
            doc.element("QD").unwrap().kind(),
            &ElementKind::Quadrupole {
                length: 0.25,
                k1: Some(-1.25)
            }
        );
        assert_eq!(doc.root(), Some("CELL"));
        assert_eq!(doc.length("CELL").unwrap(), 2.5);
    }

    #[test]
    fn elegant_rpn_strings_and_variables() {
        let doc = from_elegant(
            "% 0.5 2 / sto lh\n\
             B: CSBEND, L=\"lh 2 *\", ANGLE=\"pi 8 /\"\n\
             H: MULT, KNL=3.5, ORDER=2\n\
             L: LINE=(B, H)\n",
        )
        .unwrap();

        assert_eq!(
            doc.element("B").unwrap().kind(),
            &ElementKind::Dipole {
                length: 0.5,
                angle: std::f64::consts::PI / 8.0,
                e1: None,
                e2: None,
                k1: None
            }
        );
        assert_eq!(
            doc.element("H").unwrap().kind(),
            &ElementKind::Multipole {
                knl: vec![0.0, 0.0, 3.5],
                ksl: None
            }
        );
    }

    #[test]
    fn unknown_types_become_drifts_and_unknown_attributes_are_skipped() {
        let doc = from_elegant(
            "W: WIGGLER, L=1.5, POLES=20\n\
             Q: KQUAD, L=0.2, K1=1, N_KICKS=8\n\
             L: LINE=(W, Q)\n",
        )
        .unwrap();

        assert_eq!(
            doc.element("W").unwrap().kind(),
            &ElementKind::Drift { length: 1.5 }
        );
        assert_eq!(
            doc.element("Q").unwrap().kind(),
            &ElementKind::Quadrupole {
                length: 0.2,
                k1: Some(1.0)
            }
        );
    }

    #[test]
    fn multipliers_groups_and_reversal() {
        let doc = from_elegant(
            "D1: DRIF, L=1\n\
             D2: DRIF, L=2\n\
             D3: DRIF, L=3\n\
             A: LINE=(D1, D2)\n\
             B: LINE=(D1, A, D3)\n\
             RING: LINE=(D2, -B, 2*(D3, -D1))\n",
        )
        .unwrap();

        assert_eq!(
            names(&doc, "RING"),
            vec!["D2", "D3", "D2", "D1", "D1", "D3", "D1", "D3", "D1"]
        );
        assert_eq!(
            doc.lattice("B_REV").unwrap().items().to_vec(),
            vec![
                LatticeItem::from("D3"),
                LatticeItem::from("A_REV"),
                LatticeItem::from("D1")
            ]
        );
        assert!(doc.lattice("A_REV").is_some());
    }

    #[test]
    fn use_selects_the_root() {
        let doc = from_madx(
            "d: drift, l=1;\n\
             a: line=(d);\n\
             b: line=(a, a);\n\
             use, sequence=a;\n",
        )
        .unwrap();
        assert_eq!(doc.root(), Some("A"));
    }

    #[test]
    fn missing_required_parameters_default_to_zero() {
        let doc = from_madx("m: marker; b: sbend, l=1; l: line=(m, b);").unwrap();
        assert_eq!(
            doc.element("B").unwrap().kind(),
            &ElementKind::Dipole {
                length: 1.0,
                angle: 0.0,
                e1: None,
                e2: None,
                k1: None
            }
        );
    }

    #[test]
    fn errors_name_the_line() {
        let err = from_madx("d: drift, l=1;\n\nq: quadrupole, l=lq;\n").unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot import MAD-X input at line 3: undefined variable 'LQ'"
        );

        let err = from_elegant("D: DRIF, L=1\nL: LINE=(D,\n").unwrap_err();
        assert!(matches!(err, Error::Import { dialect: "elegant", line: 2, .. }));
    }

    #[test]
    fn sequences_are_refused() {
        let err = from_madx("ring: sequence, l=10; endsequence;").unwrap_err();
        assert!(err.to_string().contains("SEQUENCE blocks are not supported"), "{err}");
    }

    #[test]
    fn deep_brackets_are_refused() {
        let text = format!("x = {}1{};", "(".repeat(200), ")".repeat(200));
        let err = from_madx(&text).unwrap_err();
        assert!(err.to_string().contains("nested deeper than 64"), "{err}");
    }

    #[test]
    fn dangling_names_fail_validation() {
        let err = from_madx("d: drift, l=1; l: line=(d, nope);").unwrap_err();
        match err {
            Error::Reference(r) => assert_eq!(r.names(), vec!["NOPE"]),
            other => panic!("expected reference error, got {other:?}"),
        }
    }
}
