//! Schema validation of raw (untyped) documents.
//!
//! The validator is a pure, read-only pass over a [`serde_json::Value`]. It
//! runs five phases in order and collects every violation instead of
//! stopping at the first one:
//!
//! 1. top-level shape and version
//! 2. element entries against the [schema registry](crate::schema)
//! 3. lattice item shapes and the nesting policy
//! 4. referential integrity of names and `root`
//! 5. acyclicity of lattice nesting
//!
//! Unknown keys are errors in [`Mode::Strict`] and warnings in
//! [`Mode::Lenient`]. Documents with a newer minor version are always read
//! leniently, since a minor revision may add optional keys.

mod cycle;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Rule, ValidationError, Violation};
use crate::schema::{ElementType, Version, registry};

const KNOWN_KEYS: [&str; 6] = ["version", "title", "info", "root", "elements", "lattices"];

/// How unknown keys are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Strict,
    Lenient,
}

/// Which forms of sub-lattice nesting are accepted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Nesting {
    /// Only anonymous arrays inside a lattice.
    Inline,
    /// Only references to other named lattices.
    Named,
    #[default]
    Both,
}

impl Nesting {
    fn allows_inline(&self) -> bool {
        matches!(self, Nesting::Inline | Nesting::Both)
    }

    fn allows_named(&self) -> bool {
        matches!(self, Nesting::Named | Nesting::Both)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateOptions {
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub nesting: Nesting,
}

impl ValidateOptions {
    pub fn lenient() -> Self {
        Self {
            mode: Mode::Lenient,
            ..Self::default()
        }
    }
}

/// Escape a key for use as a JSON pointer segment.
pub fn escape_pointer(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

/// Accumulates violations for one validation pass.
#[derive(Debug, Default)]
pub(crate) struct Collector {
    violations: Vec<Violation>,
}

impl Collector {
    pub(crate) fn error(&mut self, rule: Rule, path: impl Into<String>, reason: impl Into<String>) {
        self.violations.push(Violation::error(rule, path, reason));
    }

    /// An unknown key: an error unless validation is lenient.
    fn unknown(&mut self, lenient: bool, rule: Rule, path: String, reason: String) {
        if lenient {
            self.violations.push(Violation::warning(rule, path, reason));
        } else {
            self.error(rule, path, reason);
        }
    }

    /// Split into errors and warnings; any error fails the pass.
    fn finish(self) -> Result<Vec<Violation>, ValidationError> {
        let (errors, warnings): (Vec<_>, Vec<_>) = self
            .violations
            .into_iter()
            .partition(|v| v.severity.is_error());

        for w in &warnings {
            warn!(path = w.path.as_str(); "{}", w.reason);
        }
        debug!(errors = errors.len(), warnings = warnings.len(); "validation finished");

        if errors.is_empty() {
            Ok(warnings)
        } else {
            Err(ValidationError::new(errors))
        }
    }
}

/// Validate a parsed document.
///
/// Returns the warnings on success, or every error found.
pub fn validate(doc: &Value, options: &ValidateOptions) -> Result<Vec<Violation>, ValidationError> {
    let mut c = Collector::default();

    let Some(obj) = doc.as_object() else {
        c.error(Rule::Shape, "", "document must be a JSON object");
        return c.finish();
    };

    let version = check_shape(obj, options, &mut c);
    let lenient =
        options.mode == Mode::Lenient || version.is_some_and(|v| v.is_forward_compatible());
    check_unknown_keys(obj, lenient, &mut c);

    let elements = obj.get("elements").and_then(Value::as_object);
    let lattices = obj.get("lattices").and_then(Value::as_object);

    if let Some(elements) = elements {
        for (name, entry) in elements {
            check_element(name, entry, lenient, &mut c);
        }
    }

    if let Some(lattices) = lattices {
        for (name, items) in lattices {
            check_lattice(name, items, options.nesting, lattices, &mut c);
        }
    }

    check_references(obj, elements, lattices, &mut c);

    if let Some(lattices) = lattices {
        cycle::check(lattices, &mut c);
    }

    c.finish()
}

/// Required keys, their JSON types, and the version. Returns the parsed
/// version when it is readable.
fn check_shape(obj: &Map<String, Value>, options: &ValidateOptions, c: &mut Collector) -> Option<Version> {
    for key in ["version", "elements", "lattices"] {
        if !obj.contains_key(key) {
            c.error(Rule::Shape, "", format!("missing required key '{key}'"));
        }
    }

    for key in ["elements", "lattices"] {
        if let Some(v) = obj.get(key)
            && !v.is_object()
        {
            c.error(Rule::Shape, format!("/{key}"), format!("'{key}' must be an object"));
        }
    }

    for key in ["title", "info", "root"] {
        if let Some(v) = obj.get(key)
            && !v.is_string()
        {
            c.error(Rule::Shape, format!("/{key}"), format!("'{key}' must be a string"));
        }
    }

    let raw = obj.get("version")?;
    let Some(raw) = raw.as_str() else {
        c.error(Rule::Shape, "/version", "'version' must be a string");
        return None;
    };
    let Some(version) = Version::parse(raw) else {
        c.error(
            Rule::Shape,
            "/version",
            format!("invalid version '{raw}', expected MAJOR.MINOR"),
        );
        return None;
    };
    if !version.is_readable() {
        c.error(
            Rule::Shape,
            "/version",
            format!(
                "unsupported format version {version}, this library reads {}.x; migrate the document first",
                Version::CURRENT.major
            ),
        );
        return None;
    }
    if version.is_forward_compatible() && options.mode == Mode::Strict {
        debug!(version = raw; "newer minor version, unknown keys are warnings");
    }
    Some(version)
}

fn check_unknown_keys(obj: &Map<String, Value>, lenient: bool, c: &mut Collector) {
    for key in obj.keys() {
        if !KNOWN_KEYS.contains(&key.as_str()) {
            c.unknown(
                lenient,
                Rule::Shape,
                format!("/{}", escape_pointer(key)),
                format!("unknown top-level key '{key}'"),
            );
        }
    }
}

fn check_element(name: &str, entry: &Value, lenient: bool, c: &mut Collector) {
    let path = format!("/elements/{}", escape_pointer(name));

    if name.is_empty() {
        c.error(Rule::Element, path.clone(), "element name must not be empty");
    }

    let pair = match entry.as_array() {
        Some(pair) if pair.len() == 2 => pair,
        _ => {
            c.error(
                Rule::Element,
                path,
                format!("element '{name}' must be a [type, params] pair"),
            );
            return;
        }
    };

    let schema = match pair[0].as_str() {
        Some(tag) => match registry().lookup(tag) {
            Some(schema) => Some(schema),
            None => {
                c.error(
                    Rule::Element,
                    format!("{path}/0"),
                    format!(
                        "unknown element type '{tag}' (expected one of: {})",
                        registry().tags().join(", ")
                    ),
                );
                None
            }
        },
        None => {
            c.error(
                Rule::Element,
                format!("{path}/0"),
                "element type must be a string",
            );
            None
        }
    };

    let Some(params) = pair[1].as_object() else {
        c.error(
            Rule::Element,
            format!("{path}/1"),
            "element parameters must be an object",
        );
        return;
    };

    // Parameters cannot be checked against an unknown type.
    let Some(schema) = schema else {
        return;
    };
    let kind = schema.kind;

    for spec in schema.required() {
        if !params.contains_key(spec.name) {
            c.error(
                Rule::Element,
                format!("{path}/1"),
                format!("missing required parameter '{}' for {kind}", spec.name),
            );
        }
    }

    for (key, value) in params {
        let param_path = format!("{path}/1/{}", escape_pointer(key));
        let Some(spec) = schema.param(key) else {
            c.unknown(
                lenient,
                Rule::Element,
                param_path,
                format!("unknown parameter '{key}' for {kind}"),
            );
            continue;
        };
        if !spec.ty.matches(value) {
            c.error(
                Rule::Element,
                param_path,
                format!("parameter '{key}' must be {}", spec.ty.describe()),
            );
            continue;
        }
        if spec.non_negative && value.as_f64().is_some_and(|x| x < 0.0) {
            c.error(
                Rule::Element,
                param_path,
                format!("parameter '{key}' must not be negative"),
            );
        }
    }
}

/// Call `f` for every item of a lattice, descending into inline arrays.
fn walk_items(items: &[Value], path: &str, f: &mut impl FnMut(&Value, &str)) {
    for (i, item) in items.iter().enumerate() {
        let item_path = format!("{path}/{i}");
        f(item, &item_path);
        if let Value::Array(inner) = item {
            walk_items(inner, &item_path, f);
        }
    }
}

fn check_lattice(
    name: &str,
    items: &Value,
    nesting: Nesting,
    lattices: &Map<String, Value>,
    c: &mut Collector,
) {
    let path = format!("/lattices/{}", escape_pointer(name));

    if name.is_empty() {
        c.error(Rule::Lattice, path.clone(), "lattice name must not be empty");
    }

    let Some(items) = items.as_array() else {
        c.error(
            Rule::Lattice,
            path,
            format!("lattice '{name}' must be an array of names"),
        );
        return;
    };

    walk_items(items, &path, &mut |item, item_path| match item {
        Value::String(reference) => {
            if !nesting.allows_named() && lattices.contains_key(reference) {
                c.error(
                    Rule::Lattice,
                    item_path,
                    format!("named sub-lattice '{reference}' is not allowed, nesting is inline-only"),
                );
            }
        }
        Value::Array(inner) => {
            if !nesting.allows_inline() {
                c.error(
                    Rule::Lattice,
                    item_path,
                    "inline sub-lattices are not allowed, nesting is named-only",
                );
            } else if inner.is_empty() {
                c.error(
                    Rule::Lattice,
                    item_path,
                    "inline sub-lattice must not be empty",
                );
            }
        }
        _ => c.error(
            Rule::Lattice,
            item_path,
            "lattice item must be a name or an array",
        ),
    });
}

fn check_references(
    obj: &Map<String, Value>,
    elements: Option<&Map<String, Value>>,
    lattices: Option<&Map<String, Value>>,
    c: &mut Collector,
) {
    let is_element = |name: &str| elements.is_some_and(|e| e.contains_key(name));
    let is_lattice = |name: &str| lattices.is_some_and(|l| l.contains_key(name));

    if let Some(lattices) = lattices {
        for (name, items) in lattices {
            if is_element(name) {
                c.error(
                    Rule::Lattice,
                    format!("/lattices/{}", escape_pointer(name)),
                    format!("name '{name}' is defined both as an element and as a lattice"),
                );
            }

            let Some(items) = items.as_array() else {
                continue;
            };
            let path = format!("/lattices/{}", escape_pointer(name));
            walk_items(items, &path, &mut |item, item_path| {
                if let Value::String(reference) = item
                    && !is_element(reference)
                    && !is_lattice(reference)
                {
                    c.error(
                        Rule::Reference {
                            name: reference.clone(),
                        },
                        item_path,
                        format!("undefined name '{reference}' referenced in lattice '{name}'"),
                    );
                }
            });
        }
    }

    if let Some(root) = obj.get("root").and_then(Value::as_str)
        && !is_lattice(root)
    {
        if is_element(root) {
            c.error(
                Rule::Lattice,
                "/root",
                format!("root must name a lattice, '{root}' is an element"),
            );
        } else {
            c.error(
                Rule::Reference {
                    name: root.to_string(),
                },
                "/root",
                format!("undefined root lattice '{root}'"),
            );
        }
    }
}

/// Kind tag of an element entry that already passed validation.
pub(crate) fn element_type(entry: &Value) -> Option<ElementType> {
    entry
        .as_array()?
        .first()?
        .as_str()
        .and_then(ElementType::from_tag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn fodo() -> Value {
        json!({
            "version": "3.0",
            "title": "FODO",
            "root": "RING",
            "elements": {
                "D1": ["drift", {"length": 0.55}],
                "Q1": ["quadrupole", {"length": 0.2, "k1": 1.2}],
                "Q2": ["quadrupole", {"length": 0.4, "k1": -1.2}],
                "B1": ["dipole", {"length": 1.5, "angle": 0.392701, "e1": 0.1963505, "e2": 0.1963505}]
            },
            "lattices": {
                "CELL": ["Q1", "D1", "B1", "D1", "Q2", "D1", "B1", "D1", "Q1"],
                "RING": ["CELL", ["CELL", "CELL"], "CELL"]
            }
        })
    }

    fn errors(doc: &Value) -> Vec<Violation> {
        validate(doc, &ValidateOptions::default()).unwrap_err().violations().to_vec()
    }

    fn paths(violations: &[Violation]) -> Vec<&str> {
        violations.iter().map(|v| v.path.as_str()).collect()
    }

    #[test]
    fn accepts_valid_document() {
        let warnings = validate(&fodo(), &ValidateOptions::default()).unwrap();
        assert!(warnings.is_empty());
    }

    #[test]
    fn rejects_non_object() {
        let v = errors(&json!([1, 2]));
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].rule, Rule::Shape);
    }

    #[test]
    fn reports_missing_required_keys() {
        let v = errors(&json!({"title": "x"}));
        let reasons: Vec<&str> = v.iter().map(|v| v.reason.as_str()).collect();
        assert_eq!(
            reasons,
            vec![
                "missing required key 'version'",
                "missing required key 'elements'",
                "missing required key 'lattices'",
            ]
        );
    }

    #[test]
    fn unknown_type_points_at_type_field() {
        let mut doc = fodo();
        doc["elements"]["Q1"][0] = json!("quad");
        let v = errors(&doc);
        assert_eq!(paths(&v), vec!["/elements/Q1/0"]);
        assert_eq!(v[0].rule, Rule::Element);
    }

    #[test]
    fn aggregates_every_violation() {
        let mut doc = fodo();
        doc["elements"]["Q1"][1] = json!({"k1": "strong"});
        doc["elements"]["D1"] = json!(["drift", {"length": -1.0}]);
        doc["elements"]["B1"][1]["tilt"] = json!(0.1);
        doc["lattices"]["CELL"][1] = json!(42);

        let v = errors(&doc);
        assert_eq!(
            paths(&v),
            vec![
                "/elements/D1/1/length",
                "/elements/Q1/1",
                "/elements/Q1/1/k1",
                "/elements/B1/1/tilt",
                "/lattices/CELL/1",
            ]
        );
    }

    #[test]
    fn dangling_reference_names_missing_identifier() {
        let mut doc = fodo();
        doc["lattices"]["CELL"][2] = json!("B9");
        let v = errors(&doc);
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].rule, Rule::Reference { name: "B9".into() });
        assert_eq!(v[0].path, "/lattices/CELL/2");
    }

    #[test]
    fn dangling_reference_inside_inline_array() {
        let mut doc = fodo();
        doc["lattices"]["RING"][1][1] = json!("CELL2");
        let v = errors(&doc);
        assert_eq!(paths(&v), vec!["/lattices/RING/1/1"]);
    }

    #[test]
    fn detects_cycle_with_path() {
        let doc = json!({
            "version": "3.0",
            "elements": {"D1": ["drift", {"length": 1.0}]},
            "lattices": {"A": ["D1", "B"], "B": [["A"]]}
        });
        let v = errors(&doc);
        assert_eq!(v.len(), 1);
        assert_eq!(
            v[0].rule,
            Rule::Cycle {
                names: vec!["A".into(), "B".into(), "A".into()]
            }
        );
    }

    /// `L0 -> L1 -> ... -> L{depth}`, the last one holding a drift.
    fn chain(depth: usize) -> Value {
        let mut lattices = Map::new();
        for i in 0..depth {
            lattices.insert(format!("L{i}"), json!([format!("L{}", i + 1)]));
        }
        lattices.insert(format!("L{depth}"), json!(["D"]));
        json!({
            "version": "3.0",
            "elements": {"D": ["drift", {"length": 1.0}]},
            "lattices": lattices
        })
    }

    #[test]
    fn deep_named_chain_is_accepted() {
        let doc = chain(20_000);
        assert_eq!(validate(&doc, &ValidateOptions::default()).unwrap(), vec![]);
    }

    #[test]
    fn cycle_closing_a_deep_chain_is_found() {
        let mut doc = chain(20_000);
        doc["lattices"]["L20000"] = json!(["D", "L0"]);
        let v = errors(&doc);
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].path, "/lattices/L0");
        let Rule::Cycle { names } = &v[0].rule else {
            panic!("expected a cycle, got {:?}", v[0].rule);
        };
        assert_eq!(names.len(), 20_002);
        assert_eq!(names.first(), names.last());
    }

    #[test]
    fn independent_cycles_are_each_reported() {
        let doc = json!({
            "version": "3.0",
            "elements": {},
            "lattices": {"A": ["B"], "B": ["A"], "C": ["D"], "D": ["C"]}
        });
        let rules: Vec<Rule> = errors(&doc).into_iter().map(|v| v.rule).collect();
        assert_eq!(
            rules,
            vec![
                Rule::Cycle {
                    names: vec!["A".into(), "B".into(), "A".into()]
                },
                Rule::Cycle {
                    names: vec!["C".into(), "D".into(), "C".into()]
                },
            ]
        );
    }

    #[test]
    fn detects_self_reference() {
        let doc = json!({
            "version": "3.0",
            "elements": {},
            "lattices": {"A": ["A"]}
        });
        let v = errors(&doc);
        assert_eq!(
            v[0].rule,
            Rule::Cycle {
                names: vec!["A".into(), "A".into()]
            }
        );
    }

    #[test]
    fn lenient_mode_warns_on_unknown_keys() {
        let mut doc = fodo();
        doc["author"] = json!("someone");
        doc["elements"]["Q1"][1]["tilt"] = json!(0.0);

        assert_eq!(errors(&doc).len(), 2);

        let warnings = validate(&doc, &ValidateOptions::lenient()).unwrap();
        assert_eq!(paths(&warnings), vec!["/author", "/elements/Q1/1/tilt"]);
    }

    #[test]
    fn newer_minor_version_is_forward_compatible() {
        let mut doc = fodo();
        doc["version"] = json!("3.4");
        doc["author"] = json!("someone");
        let warnings = validate(&doc, &ValidateOptions::default()).unwrap();
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn rejects_older_major_version() {
        let mut doc = fodo();
        doc["version"] = json!("2.0");
        let v = errors(&doc);
        assert_eq!(paths(&v), vec!["/version"]);
    }

    #[test]
    fn nesting_policy_restricts_forms() {
        let inline_only = ValidateOptions {
            nesting: Nesting::Inline,
            ..ValidateOptions::default()
        };
        let v = validate(&fodo(), &inline_only).unwrap_err();
        assert_eq!(
            paths(v.violations()),
            vec!["/lattices/RING/0", "/lattices/RING/1/0", "/lattices/RING/1/1", "/lattices/RING/2"]
        );

        let named_only = ValidateOptions {
            nesting: Nesting::Named,
            ..ValidateOptions::default()
        };
        let v = validate(&fodo(), &named_only).unwrap_err();
        assert_eq!(paths(v.violations()), vec!["/lattices/RING/1"]);
    }

    #[test]
    fn root_must_name_a_lattice() {
        let mut doc = fodo();
        doc["root"] = json!("Q1");
        let v = errors(&doc);
        assert_eq!(v[0].rule, Rule::Lattice);

        doc["root"] = json!("MISSING");
        let v = errors(&doc);
        assert_eq!(v[0].rule, Rule::Reference { name: "MISSING".into() });
    }

    #[test]
    fn name_shared_by_element_and_lattice_is_ambiguous() {
        let mut doc = fodo();
        doc["lattices"]["Q1"] = json!(["D1"]);
        let v = errors(&doc);
        assert_eq!(paths(&v), vec!["/lattices/Q1"]);
    }

    #[test]
    fn pointer_segments_are_escaped() {
        assert_eq!(escape_pointer("a/b~c"), "a~1b~0c");
    }

    #[test]
    fn validation_does_not_mutate_input() {
        let doc = fodo();
        let before = doc.clone();
        let _ = validate(&doc, &ValidateOptions::default());
        assert_eq!(doc, before);
    }
}
