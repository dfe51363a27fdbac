//! Typed element definitions.
//!
//! Each element kind is a variant with a fixed set of fields. Optional
//! parameters are `Option`s so that an absent parameter stays absent when a
//! document is re-encoded.

use serde_json::{Map, Value};

use crate::schema::ElementType;

#[derive(Debug, Clone, PartialEq)]
pub enum ElementKind {
    Drift {
        length: f64,
    },
    Dipole {
        length: f64,
        angle: f64,
        e1: Option<f64>,
        e2: Option<f64>,
        k1: Option<f64>,
    },
    Quadrupole {
        length: f64,
        k1: Option<f64>,
    },
    Sextupole {
        length: f64,
        k2: Option<f64>,
    },
    Octupole {
        length: f64,
        k3: Option<f64>,
    },
    Solenoid {
        length: f64,
        ks: Option<f64>,
    },
    Cavity {
        length: f64,
        voltage: Option<f64>,
        frequency: Option<f64>,
        phase: Option<f64>,
    },
    Kicker {
        length: Option<f64>,
        hkick: Option<f64>,
        vkick: Option<f64>,
    },
    Multipole {
        knl: Vec<f64>,
        ksl: Option<Vec<f64>>,
    },
    Monitor {
        length: Option<f64>,
    },
    Marker,
}

/// A parameter value as stored in the typed model.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Number(f64),
    Numbers(Vec<f64>),
}

impl From<&Field> for Value {
    fn from(field: &Field) -> Self {
        match field {
            Field::Number(x) => Value::from(*x),
            Field::Numbers(xs) => Value::Array(xs.iter().map(|x| Value::from(*x)).collect()),
        }
    }
}

impl ElementKind {
    pub fn element_type(&self) -> ElementType {
        match self {
            ElementKind::Drift { .. } => ElementType::Drift,
            ElementKind::Dipole { .. } => ElementType::Dipole,
            ElementKind::Quadrupole { .. } => ElementType::Quadrupole,
            ElementKind::Sextupole { .. } => ElementType::Sextupole,
            ElementKind::Octupole { .. } => ElementType::Octupole,
            ElementKind::Solenoid { .. } => ElementType::Solenoid,
            ElementKind::Cavity { .. } => ElementType::Cavity,
            ElementKind::Kicker { .. } => ElementType::Kicker,
            ElementKind::Multipole { .. } => ElementType::Multipole,
            ElementKind::Monitor { .. } => ElementType::Monitor,
            ElementKind::Marker => ElementType::Marker,
        }
    }

    /// Physical length in meters; thin elements are zero.
    pub fn length(&self) -> f64 {
        match self {
            ElementKind::Drift { length }
            | ElementKind::Dipole { length, .. }
            | ElementKind::Quadrupole { length, .. }
            | ElementKind::Sextupole { length, .. }
            | ElementKind::Octupole { length, .. }
            | ElementKind::Solenoid { length, .. }
            | ElementKind::Cavity { length, .. } => *length,
            ElementKind::Kicker { length, .. } | ElementKind::Monitor { length } => {
                length.unwrap_or(0.0)
            }
            ElementKind::Multipole { .. } | ElementKind::Marker => 0.0,
        }
    }

    /// Present parameters in registry order, `info` excluded.
    pub fn fields(&self) -> Vec<(&'static str, Field)> {
        let mut out = Vec::new();
        match self {
            ElementKind::Drift { length } => push(&mut out, "length", Some(*length)),
            ElementKind::Dipole {
                length,
                angle,
                e1,
                e2,
                k1,
            } => {
                push(&mut out, "length", Some(*length));
                push(&mut out, "angle", Some(*angle));
                push(&mut out, "e1", *e1);
                push(&mut out, "e2", *e2);
                push(&mut out, "k1", *k1);
            }
            ElementKind::Quadrupole { length, k1 } => {
                push(&mut out, "length", Some(*length));
                push(&mut out, "k1", *k1);
            }
            ElementKind::Sextupole { length, k2 } => {
                push(&mut out, "length", Some(*length));
                push(&mut out, "k2", *k2);
            }
            ElementKind::Octupole { length, k3 } => {
                push(&mut out, "length", Some(*length));
                push(&mut out, "k3", *k3);
            }
            ElementKind::Solenoid { length, ks } => {
                push(&mut out, "length", Some(*length));
                push(&mut out, "ks", *ks);
            }
            ElementKind::Cavity {
                length,
                voltage,
                frequency,
                phase,
            } => {
                push(&mut out, "length", Some(*length));
                push(&mut out, "voltage", *voltage);
                push(&mut out, "frequency", *frequency);
                push(&mut out, "phase", *phase);
            }
            ElementKind::Kicker {
                length,
                hkick,
                vkick,
            } => {
                push(&mut out, "length", *length);
                push(&mut out, "hkick", *hkick);
                push(&mut out, "vkick", *vkick);
            }
            ElementKind::Monitor { length } => push(&mut out, "length", *length),
            ElementKind::Multipole { knl, ksl } => {
                out.push(("knl", Field::Numbers(knl.clone())));
                if let Some(ksl) = ksl {
                    out.push(("ksl", Field::Numbers(ksl.clone())));
                }
            }
            ElementKind::Marker => {}
        }
        out
    }

    /// Build a kind from a parameter object that already passed validation.
    pub(crate) fn from_params(
        ty: ElementType,
        params: &Map<String, Value>,
    ) -> Result<ElementKind, String> {
        let p = Params(params);
        let kind = match ty {
            ElementType::Drift => ElementKind::Drift {
                length: p.number("length")?,
            },
            ElementType::Dipole => ElementKind::Dipole {
                length: p.number("length")?,
                angle: p.number("angle")?,
                e1: p.opt_number("e1")?,
                e2: p.opt_number("e2")?,
                k1: p.opt_number("k1")?,
            },
            ElementType::Quadrupole => ElementKind::Quadrupole {
                length: p.number("length")?,
                k1: p.opt_number("k1")?,
            },
            ElementType::Sextupole => ElementKind::Sextupole {
                length: p.number("length")?,
                k2: p.opt_number("k2")?,
            },
            ElementType::Octupole => ElementKind::Octupole {
                length: p.number("length")?,
                k3: p.opt_number("k3")?,
            },
            ElementType::Solenoid => ElementKind::Solenoid {
                length: p.number("length")?,
                ks: p.opt_number("ks")?,
            },
            ElementType::Cavity => ElementKind::Cavity {
                length: p.number("length")?,
                voltage: p.opt_number("voltage")?,
                frequency: p.opt_number("frequency")?,
                phase: p.opt_number("phase")?,
            },
            ElementType::Kicker => ElementKind::Kicker {
                length: p.opt_number("length")?,
                hkick: p.opt_number("hkick")?,
                vkick: p.opt_number("vkick")?,
            },
            ElementType::Multipole => ElementKind::Multipole {
                knl: p.numbers("knl")?,
                ksl: p.opt_numbers("ksl")?,
            },
            ElementType::Monitor => ElementKind::Monitor {
                length: p.opt_number("length")?,
            },
            ElementType::Marker => ElementKind::Marker,
        };
        Ok(kind)
    }
}

fn push(out: &mut Vec<(&'static str, Field)>, name: &'static str, value: Option<f64>) {
    if let Some(x) = value {
        out.push((name, Field::Number(x)));
    }
}

struct Params<'a>(&'a Map<String, Value>);

impl Params<'_> {
    fn number(&self, name: &str) -> Result<f64, String> {
        self.opt_number(name)?
            .ok_or_else(|| format!("missing parameter '{name}'"))
    }

    fn opt_number(&self, name: &str) -> Result<Option<f64>, String> {
        match self.0.get(name) {
            None => Ok(None),
            Some(v) => v
                .as_f64()
                .map(Some)
                .ok_or_else(|| format!("parameter '{name}' is not a number")),
        }
    }

    fn numbers(&self, name: &str) -> Result<Vec<f64>, String> {
        self.opt_numbers(name)?
            .ok_or_else(|| format!("missing parameter '{name}'"))
    }

    fn opt_numbers(&self, name: &str) -> Result<Option<Vec<f64>>, String> {
        let Some(v) = self.0.get(name) else {
            return Ok(None);
        };
        let items = v
            .as_array()
            .ok_or_else(|| format!("parameter '{name}' is not an array"))?;
        items
            .iter()
            .map(|x| {
                x.as_f64()
                    .ok_or_else(|| format!("parameter '{name}' contains a non-number"))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }
}

/// A named element definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    name: String,
    info: Option<String>,
    kind: ElementKind,
}

impl Element {
    pub fn new(name: impl Into<String>, kind: ElementKind) -> Self {
        Self {
            name: name.into(),
            info: None,
            kind,
        }
    }

    pub fn with_info(mut self, info: impl Into<String>) -> Self {
        self.info = Some(info.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn info(&self) -> Option<&str> {
        self.info.as_deref()
    }

    pub fn kind(&self) -> &ElementKind {
        &self.kind
    }

    pub fn element_type(&self) -> ElementType {
        self.kind.element_type()
    }

    pub fn length(&self) -> f64 {
        self.kind.length()
    }
}

/// One kind of every type with every parameter set.
#[cfg(test)]
pub(crate) fn sample_kinds() -> Vec<ElementKind> {
    vec![
        ElementKind::Drift { length: 1.0 },
        ElementKind::Dipole {
            length: 1.5,
            angle: 0.39,
            e1: Some(0.1),
            e2: Some(0.2),
            k1: Some(-0.1),
        },
        ElementKind::Quadrupole {
            length: 0.5,
            k1: Some(1.2),
        },
        ElementKind::Sextupole {
            length: 0.1,
            k2: Some(3.0),
        },
        ElementKind::Octupole {
            length: 0.1,
            k3: Some(9.0),
        },
        ElementKind::Solenoid {
            length: 2.0,
            ks: Some(0.3),
        },
        ElementKind::Cavity {
            length: 0.3,
            voltage: Some(1.0e6),
            frequency: Some(5.0e8),
            phase: Some(90.0),
        },
        ElementKind::Kicker {
            length: Some(0.2),
            hkick: Some(1e-4),
            vkick: Some(-1e-4),
        },
        ElementKind::Multipole {
            knl: vec![0.0, 0.1],
            ksl: Some(vec![0.0, 0.0]),
        },
        ElementKind::Monitor { length: Some(0.0) },
        ElementKind::Marker,
    ]
}
