use crate::error::{Error, Result};
use crate::model::{Element, ElementKind};
use crate::schema::ElementType;

use super::{Dialect, number, single_order};

/// The elegant `.lte` lattice language.
#[derive(Debug, Clone, Copy)]
pub struct Elegant;

impl Dialect for Elegant {
    const NAME: &'static str = "elegant";
    const TERMINATOR: &'static str = "";
    const QUOTED_EXPRESSIONS: bool = true;
    const ALIASES: &'static [(&'static str, ElementType)] = &[
        ("DRIFT", ElementType::Drift),
        ("EDRIFT", ElementType::Drift),
        ("SBEN", ElementType::Dipole),
        ("SBEND", ElementType::Dipole),
        ("CSRCSBEND", ElementType::Dipole),
        ("QUAD", ElementType::Quadrupole),
        ("SEXT", ElementType::Sextupole),
        ("RFCW", ElementType::Cavity),
        ("HKICK", ElementType::Kicker),
        ("VKICK", ElementType::Kicker),
        ("HMON", ElementType::Monitor),
        ("VMON", ElementType::Monitor),
        ("WATCH", ElementType::Marker),
    ];

    fn header(title: &str) -> String {
        format!("! TITLE: {title}")
    }

    fn type_name(ty: ElementType) -> &'static str {
        match ty {
            ElementType::Drift => "DRIF",
            ElementType::Dipole => "CSBEND",
            ElementType::Quadrupole => "KQUAD",
            ElementType::Sextupole => "KSEXT",
            ElementType::Octupole => "KOCT",
            ElementType::Solenoid => "SOLE",
            ElementType::Cavity => "RFCA",
            ElementType::Kicker => "KICKER",
            ElementType::Multipole => "MULT",
            ElementType::Monitor => "MONI",
            ElementType::Marker => "MARK",
        }
    }

    fn attribute(param: &str) -> Option<&'static str> {
        Some(match param {
            "length" => "L",
            "angle" => "ANGLE",
            "e1" => "E1",
            "e2" => "E2",
            "k1" => "K1",
            "k2" => "K2",
            "k3" => "K3",
            "ks" => "KS",
            "voltage" => "VOLT",
            "frequency" => "FREQ",
            "phase" => "PHASE",
            "hkick" => "HKICK",
            "vkick" => "VKICK",
            "knl" => "KNL",
            _ => return None,
        })
    }

    /// MULT carries one integrated strength plus its order.
    fn attributes(element: &Element) -> Result<Vec<String>> {
        if !matches!(element.kind(), ElementKind::Multipole { .. }) {
            return super::attributes_of::<Self>(element);
        }
        let (order, knl) = single_order(element).ok_or_else(|| {
            Error::export(
                Self::NAME,
                format!(
                    "element '{}': multipole has more than one non-zero order",
                    element.name()
                ),
            )
        })?;
        Ok(vec![format!("KNL={}", number(knl)), format!("ORDER={order}")])
    }
}
