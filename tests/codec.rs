use std::fs;
use std::path::PathBuf;

use latticejson::{
    Document, Element, ElementKind, Error, Lattice, LatticeItem, Rule, ValidateOptions, codec,
    decode, decode_with, encode, migrate,
};
use pretty_assertions::assert_eq;

fn data(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/data")
        .join(name)
}

fn read(name: &str) -> String {
    fs::read_to_string(data(name)).unwrap()
}

#[test]
fn canonical_file_round_trips_byte_for_byte() {
    let text = read("fodo.json");
    let doc = decode(&text).unwrap();
    let encoded = encode(&doc);
    assert_eq!(encoded, text);
    assert_eq!(decode(&encoded).unwrap(), doc);
}

#[test]
fn encoding_is_idempotent_for_non_canonical_input() {
    let text = r#"{"lattices":{"L":["Q",["Q","Q"]]},"version":"3.0","elements":{"Q":["quadrupole",{"k1":-0.5,"length":1e-1}]},"root":"L"}"#;
    let once = encode(&decode(text).unwrap());
    let twice = encode(&decode(&once).unwrap());
    assert_eq!(once, twice);
}

#[test]
fn read_file_uses_given_options() {
    let doc = codec::read_file(data("fodo.json"), &ValidateOptions::default()).unwrap();
    assert_eq!(doc.title(), Some("FODO ring"));
    assert_eq!(doc.element("START").unwrap().info(), Some("injection point"));

    let err = codec::read_file(data("missing.json"), &ValidateOptions::default()).unwrap_err();
    assert!(matches!(err, Error::Io { .. }));
}

#[test]
fn every_violation_is_reported() {
    let err = decode(&read("invalid.json")).unwrap_err();
    let violations = err.violations().unwrap();
    let paths: Vec<&str> = violations.iter().map(|v| v.path.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "/elements/Q1/0",
            "/elements/D1/1/length",
            "/elements/B1/1",
            "/lattices/CELL/1",
        ]
    );
    assert!(violations[0].reason.contains("unknown element type 'quadrupol'"));
    assert!(violations.iter().all(|v| v.severity.is_error()));
}

#[test]
fn dangling_names_are_reference_errors() {
    match decode(&read("dangling.json")).unwrap_err() {
        Error::Reference(err) => assert_eq!(err.names(), vec!["Q9", "X7"]),
        other => panic!("expected reference error, got {other:?}"),
    }
}

#[test]
fn cyclic_nesting_is_a_cycle_error() {
    match decode(&read("cycle.json")).unwrap_err() {
        Error::Cycle(err) => {
            assert_eq!(err.path().to_vec(), vec!["A", "B", "A"]);
            assert_eq!(err.to_string(), "cyclic lattice nesting: A -> B -> A");
        }
        other => panic!("expected cycle error, got {other:?}"),
    }
}

#[test]
fn independent_cycles_are_all_kept() {
    let text = r#"{
        "version": "3.0",
        "elements": {},
        "lattices": {"A": ["B"], "B": ["A"], "C": ["D"], "D": ["C"]}
    }"#;
    let err = decode(text).unwrap_err();
    assert_eq!(err.violations().map(|v| v.len()), Some(2));
    assert_eq!(
        err.to_string(),
        "cyclic lattice nesting: A -> B -> A; C -> D -> C"
    );
    match err {
        Error::Cycle(err) => assert_eq!(
            err.cycles,
            vec![vec!["A", "B", "A"], vec!["C", "D", "C"]]
        ),
        other => panic!("expected cycle error, got {other:?}"),
    }
}

#[test]
fn reference_errors_still_report_cycles() {
    let text = r#"{
        "version": "3.0",
        "elements": {},
        "lattices": {"A": ["B", "MISSING"], "B": ["A"]}
    }"#;
    let err = decode(text).unwrap_err();
    let rules: Vec<&Rule> = err.violations().unwrap().iter().map(|v| &v.rule).collect();
    assert_eq!(
        rules,
        vec![
            &Rule::Reference {
                name: "MISSING".into()
            },
            &Rule::Cycle {
                names: vec!["A".into(), "B".into(), "A".into()]
            },
        ]
    );
    assert!(err.to_string().contains("cyclic nesting A -> B -> A"), "{err}");
    match err {
        Error::Reference(err) => {
            assert_eq!(err.names(), vec!["MISSING"]);
            assert_eq!(err.cycles().len(), 1);
        }
        other => panic!("expected reference error, got {other:?}"),
    }
}

#[test]
fn structural_errors_take_precedence_over_references() {
    let text = r#"{
        "version": "3.0",
        "elements": {"D": ["drift", {}]},
        "lattices": {"L": ["D", "NOPE"]}
    }"#;
    let err = decode(text).unwrap_err();
    let rules: Vec<&Rule> = err.violations().unwrap().iter().map(|v| &v.rule).collect();
    assert_eq!(
        rules,
        vec![&Rule::Element, &Rule::Reference { name: "NOPE".into() }]
    );
}

#[test]
fn builder_documents_encode_like_decoded_ones() {
    let doc = Document::builder()
        .title("FODO")
        .root("FODO")
        .element(Element::new(
            "Q1",
            ElementKind::Quadrupole {
                length: 0.5,
                k1: None,
            },
        ))
        .element(Element::new("D1", ElementKind::Drift { length: 1.0 }))
        .lattice(Lattice::new(
            "FODO",
            ["Q1".into(), LatticeItem::inline(["D1".into()])],
        ))
        .build()
        .unwrap();

    let text = encode(&doc);
    assert_eq!(decode(&text).unwrap(), doc);
    assert_eq!(doc.length("FODO").unwrap(), 1.5);
}

#[test]
fn migrated_legacy_file_decodes() {
    let raw: serde_json::Value = serde_json::from_str(&read("v1.json")).unwrap();
    let migrated = migrate::migrate_to_current(raw).unwrap();
    let doc = decode(&migrated.to_string()).unwrap();

    assert_eq!(doc.title(), Some("legacy"));
    assert_eq!(doc.root(), Some(migrate::MAIN_LATTICE));
    assert_eq!(doc.element("Q1").unwrap().info(), Some("focusing"));
    let names: Vec<&str> = doc
        .expand(migrate::MAIN_LATTICE)
        .unwrap()
        .iter()
        .map(|e| e.name())
        .collect();
    assert_eq!(names, vec!["Q1", "D1", "C1", "Q1", "D1"]);
}

#[test]
fn lenient_mode_accepts_unknown_keys() {
    let text = r#"{
        "version": "3.0",
        "generator": "tracker 2.1",
        "elements": {"D": ["drift", {"length": 1, "aperture": 0.02}]},
        "lattices": {"L": ["D"]}
    }"#;
    let err = decode(text).unwrap_err();
    assert_eq!(err.violations().unwrap().len(), 2);

    let doc = decode_with(text, &ValidateOptions::lenient()).unwrap();
    let encoded = encode(&doc);
    assert!(encoded.contains("\"generator\": \"tracker 2.1\""));
    assert!(!encoded.contains("aperture"));
}
