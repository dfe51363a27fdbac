//! Element kinds and their parameter schemas.
//!
//! The registry is the single source of truth for which element types exist
//! and which parameters each accepts. It is built once on first use and
//! never mutated afterwards; the validator, the typed model and the encoder
//! all read from it.

pub mod version;

pub use version::Version;

use std::fmt;
use std::sync::OnceLock;

use serde_json::Value;

static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// The closed set of element kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ElementType {
    Drift,
    Dipole,
    Quadrupole,
    Sextupole,
    Octupole,
    Solenoid,
    Cavity,
    Kicker,
    Multipole,
    Monitor,
    Marker,
}

impl ElementType {
    pub const ALL: [ElementType; 11] = [
        ElementType::Drift,
        ElementType::Dipole,
        ElementType::Quadrupole,
        ElementType::Sextupole,
        ElementType::Octupole,
        ElementType::Solenoid,
        ElementType::Cavity,
        ElementType::Kicker,
        ElementType::Multipole,
        ElementType::Monitor,
        ElementType::Marker,
    ];

    /// The tag used in files.
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementType::Drift => "drift",
            ElementType::Dipole => "dipole",
            ElementType::Quadrupole => "quadrupole",
            ElementType::Sextupole => "sextupole",
            ElementType::Octupole => "octupole",
            ElementType::Solenoid => "solenoid",
            ElementType::Cavity => "cavity",
            ElementType::Kicker => "kicker",
            ElementType::Multipole => "multipole",
            ElementType::Monitor => "monitor",
            ElementType::Marker => "marker",
        }
    }

    pub fn from_tag(tag: &str) -> Option<ElementType> {
        Self::ALL.into_iter().find(|t| t.as_str() == tag)
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JSON type of a parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Number,
    Text,
    NumberArray,
}

impl ParamType {
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ParamType::Number => value.is_number(),
            ParamType::Text => value.is_string(),
            ParamType::NumberArray => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_number)),
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            ParamType::Number => "a number",
            ParamType::Text => "a string",
            ParamType::NumberArray => "an array of numbers",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub ty: ParamType,
    pub required: bool,
    pub non_negative: bool,
}

impl ParamSpec {
    const fn required(name: &'static str, ty: ParamType) -> Self {
        Self {
            name,
            ty,
            required: true,
            non_negative: false,
        }
    }

    const fn optional(name: &'static str, ty: ParamType) -> Self {
        Self {
            name,
            ty,
            required: false,
            non_negative: false,
        }
    }

    const fn non_negative(mut self) -> Self {
        self.non_negative = true;
        self
    }
}

/// Parameters accepted by one element kind, in encoding order.
#[derive(Debug, Clone)]
pub struct KindSchema {
    pub kind: ElementType,
    pub params: Vec<ParamSpec>,
}

impl KindSchema {
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn required(&self) -> impl Iterator<Item = &ParamSpec> {
        self.params.iter().filter(|p| p.required)
    }
}

/// Process-wide table of element kinds.
#[derive(Debug)]
pub struct Registry {
    kinds: Vec<KindSchema>,
}

/// The shared registry, built on first access.
pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::build)
}

impl Registry {
    fn build() -> Self {
        use ParamType::{Number, NumberArray, Text};

        let length = ParamSpec::required("length", Number).non_negative();
        let thin_length = ParamSpec::optional("length", Number).non_negative();
        let num = |name| ParamSpec::optional(name, Number);

        let kinds = ElementType::ALL
            .into_iter()
            .map(|kind| {
                let mut params = match kind {
                    ElementType::Drift => vec![length],
                    ElementType::Dipole => vec![
                        length,
                        ParamSpec::required("angle", Number),
                        num("e1"),
                        num("e2"),
                        num("k1"),
                    ],
                    ElementType::Quadrupole => vec![length, num("k1")],
                    ElementType::Sextupole => vec![length, num("k2")],
                    ElementType::Octupole => vec![length, num("k3")],
                    ElementType::Solenoid => vec![length, num("ks")],
                    ElementType::Cavity => {
                        vec![length, num("voltage"), num("frequency"), num("phase")]
                    }
                    ElementType::Kicker => vec![thin_length, num("hkick"), num("vkick")],
                    ElementType::Multipole => vec![
                        ParamSpec::required("knl", NumberArray),
                        ParamSpec::optional("ksl", NumberArray),
                    ],
                    ElementType::Monitor => vec![thin_length],
                    ElementType::Marker => vec![],
                };
                params.push(ParamSpec::optional("info", Text));
                KindSchema { kind, params }
            })
            .collect();

        Registry { kinds }
    }

    /// Schema for a kind. Every kind has one.
    pub fn get(&self, kind: ElementType) -> &KindSchema {
        &self.kinds[kind as usize]
    }

    /// Schema for a file tag such as `"quadrupole"`.
    pub fn lookup(&self, tag: &str) -> Option<&KindSchema> {
        ElementType::from_tag(tag).map(|kind| self.get(kind))
    }

    pub fn iter(&self) -> impl Iterator<Item = &KindSchema> {
        self.kinds.iter()
    }

    /// All known tags, for error messages.
    pub fn tags(&self) -> Vec<&'static str> {
        self.kinds.iter().map(|k| k.kind.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn registry_is_indexed_by_kind() {
        for kind in ElementType::ALL {
            assert_eq!(registry().get(kind).kind, kind);
        }
    }

    #[test]
    fn every_kind_accepts_info() {
        for schema in registry().iter() {
            let info = schema.param("info").expect("info param");
            assert!(!info.required);
            assert_eq!(info.ty, ParamType::Text);
        }
    }

    #[test]
    fn quadrupole_requires_only_length() {
        let schema = registry().lookup("quadrupole").unwrap();
        let required: Vec<_> = schema.required().map(|p| p.name).collect();
        assert_eq!(required, vec!["length"]);
        assert!(schema.param("k1").is_some());
        assert!(schema.param("k2").is_none());
    }

    #[test]
    fn unknown_tag_has_no_schema() {
        assert!(registry().lookup("Quadrupole").is_none());
        assert!(registry().lookup("wiggler").is_none());
    }

    #[test]
    fn param_types_match_json_values() {
        assert!(ParamType::Number.matches(&json!(0.5)));
        assert!(!ParamType::Number.matches(&json!("0.5")));
        assert!(ParamType::NumberArray.matches(&json!([0.0, 1.5])));
        assert!(ParamType::NumberArray.matches(&json!([])));
        assert!(!ParamType::NumberArray.matches(&json!([0.0, "x"])));
        assert!(ParamType::Text.matches(&json!("focusing")));
    }
}
