use crate::schema::ElementType;

use super::Dialect;

/// The MAD-X sequence language.
#[derive(Debug, Clone, Copy)]
pub struct MadX;

impl Dialect for MadX {
    const NAME: &'static str = "MAD-X";
    const TERMINATOR: &'static str = ";";
    const ALIASES: &'static [(&'static str, ElementType)] = &[
        ("RBEND", ElementType::Dipole),
        ("HKICKER", ElementType::Kicker),
        ("VKICKER", ElementType::Kicker),
        ("TKICKER", ElementType::Kicker),
        ("HMONITOR", ElementType::Monitor),
        ("VMONITOR", ElementType::Monitor),
    ];

    fn header(title: &str) -> String {
        format!("TITLE, {};", serde_json::Value::from(title))
    }

    fn type_name(ty: ElementType) -> &'static str {
        match ty {
            ElementType::Drift => "DRIFT",
            ElementType::Dipole => "SBEND",
            ElementType::Quadrupole => "QUADRUPOLE",
            ElementType::Sextupole => "SEXTUPOLE",
            ElementType::Octupole => "OCTUPOLE",
            ElementType::Solenoid => "SOLENOID",
            ElementType::Cavity => "RFCAVITY",
            ElementType::Kicker => "KICKER",
            ElementType::Multipole => "MULTIPOLE",
            ElementType::Monitor => "MONITOR",
            ElementType::Marker => "MARKER",
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
            "phase" => "LAG",
            "hkick" => "HKICK",
            "vkick" => "VKICK",
            "knl" => "KNL",
            "ksl" => "KSL",
            _ => return None,
        })
    }
}
