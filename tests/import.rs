use std::fs;

use latticejson::{Document, ElementKind, decode, export, import};
use pretty_assertions::assert_eq;

fn data(name: &str) -> String {
    let path = format!("{}/tests/data/{name}", env!("CARGO_MANIFEST_DIR"));
    fs::read_to_string(path).unwrap()
}

fn names(doc: &Document, lattice: &str) -> Vec<String> {
    doc.expand(lattice)
        .unwrap()
        .iter()
        .map(|e| e.name().to_string())
        .collect()
}

/// Every element type, upper-case names, named lattices only.
const MADX_RING: &str = r#"{
    "version": "3.0",
    "title": "round trip",
    "root": "RING",
    "elements": {
        "D1": ["drift", {"length": 0.55}],
        "B1": ["dipole", {"length": 1.5, "angle": 0.392701, "e1": 0.1963505, "e2": 0.1963505, "k1": -0.05}],
        "Q1": ["quadrupole", {"length": 0.2, "k1": 1.2}],
        "S1": ["sextupole", {"length": 0.1, "k2": 12.5}],
        "O1": ["octupole", {"length": 0.1, "k3": -150.0}],
        "SOL": ["solenoid", {"length": 0.8, "ks": 0.25}],
        "RF": ["cavity", {"length": 0.3, "voltage": 1000000.0, "frequency": 499654000.0, "phase": 0.25}],
        "HK": ["kicker", {"hkick": 0.001, "vkick": -0.0005}],
        "MP": ["multipole", {"knl": [0, 0.5, -1.25], "ksl": [0, 0, 0.75]}],
        "BPM": ["monitor", {}],
        "M": ["marker", {}]
    },
    "lattices": {
        "CELL": ["Q1", "D1", "B1", "S1", "O1"],
        "ARC": ["CELL", "MP", "CELL"],
        "RING": ["M", "SOL", "ARC", "RF", "HK", "BPM", "ARC"]
    }
}"#;

#[test]
fn madx_export_reads_back_unchanged() {
    let doc = decode(MADX_RING).unwrap();
    let text = export::to_madx(&doc).unwrap();
    let back = import::from_madx(&text).unwrap();
    assert_eq!(back, doc);
}

#[test]
fn elegant_export_reads_back_unchanged() {
    let ring = MADX_RING.replace(
        r#"{"knl": [0, 0.5, -1.25], "ksl": [0, 0, 0.75]}"#,
        r#"{"knl": [0, 0, 3.5]}"#,
    );
    let doc = decode(&ring).unwrap();
    let text = export::to_elegant(&doc).unwrap();
    let back = import::from_elegant(&text).unwrap();
    assert_eq!(back, doc);
}

#[test]
fn fodo_survives_both_languages() {
    let doc = decode(&data("fodo.json")).unwrap();
    let lte = import::from_elegant(&export::to_elegant(&doc).unwrap()).unwrap();
    let madx = import::from_madx(&export::to_madx(&doc).unwrap()).unwrap();

    for back in [&lte, &madx] {
        assert_eq!(back.root(), Some("RING"));
        assert_eq!(back.title(), Some("FODO ring"));
        assert_eq!(names(back, "RING"), names(&doc, "RING"));
        assert_eq!(back.length("RING").unwrap(), doc.length("RING").unwrap());
        assert_eq!(back.elements().len(), doc.elements().len());
    }
}

#[test]
fn elegant_file_with_rpn_and_reversal() {
    let doc = import::from_elegant(&data("ring.lte")).unwrap();
    assert_eq!(doc.title(), Some("Small test ring"));
    assert_eq!(doc.root(), Some("RING"));

    assert_eq!(
        doc.element("Q2").unwrap().kind(),
        &ElementKind::Quadrupole {
            length: 0.25,
            k1: Some(-1.2)
        }
    );
    assert_eq!(
        doc.element("W1").unwrap().kind(),
        &ElementKind::Drift { length: 0.25 }
    );
    let ElementKind::Dipole { angle, e1, .. } = doc.element("B1").unwrap().kind() else {
        panic!("B1 should be a dipole");
    };
    assert_eq!(*angle, std::f64::consts::PI / 8.0);
    assert_eq!(*e1, Some(std::f64::consts::PI / 16.0));

    let ring = names(&doc, "RING");
    assert_eq!(ring.len(), 28);
    assert_eq!(
        ring[19..],
        ["W1", "D1", "B1", "D1", "Q2", "D1", "B1", "D1", "Q1"]
    );
}

#[test]
fn madx_file_with_variables_and_inheritance() {
    let doc = import::from_madx(&data("cell.madx")).unwrap();
    assert_eq!(doc.title(), Some("MAD-X cell"));
    assert_eq!(doc.root(), Some("CELL"));
    assert_eq!(
        doc.element("Q2").unwrap().kind(),
        &ElementKind::Quadrupole {
            length: 0.25,
            k1: Some(-1.2)
        }
    );
    assert_eq!(
        doc.element("H1").unwrap().kind(),
        &ElementKind::Kicker {
            length: Some(0.1),
            hkick: None,
            vkick: None
        }
    );
    assert_eq!(
        doc.element("OCT").unwrap().kind(),
        &ElementKind::Multipole {
            knl: vec![0.0, 0.0, 0.0, 4.5],
            ksl: None
        }
    );
    assert_eq!(
        names(&doc, "CELL"),
        vec!["Q1", "D1", "OCT", "Q2", "D1", "H1"]
    );
}
