//! Rewrites of raw documents written against older format versions.
//!
//! Migration runs on the generic JSON tree, before validation, because an
//! old document does not fit the current model. Steps are applied one
//! major version at a time.

use log::debug;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::schema::Version;

/// Name given to the former top-level `lattice` when it joins `lattices`.
pub const MAIN_LATTICE: &str = "__MAIN__";

type Step = fn(&mut Map<String, Value>) -> Result<()>;

const STEPS: [(u32, Step); 3] = [(0, v0_to_v1), (1, v1_to_v2), (2, v2_to_v3)];

/// The major version a raw document declares. Documents without a version
/// string predate versioning and count as version 0.
pub fn source_version(raw: &Value) -> Result<u32> {
    match raw.get("version") {
        None => Ok(0),
        Some(Value::String(s)) => Version::parse(s)
            .map(|v| v.major)
            .ok_or_else(|| Error::Migration(format!("unreadable version '{s}'"))),
        Some(other) => Err(Error::Migration(format!(
            "version must be a string, found {other}"
        ))),
    }
}

/// Rewrite `raw` from major version `from` to major version `to`.
pub fn migrate(raw: Value, from: u32, to: u32) -> Result<Value> {
    let latest = Version::CURRENT.major;
    if from > to || to > latest {
        return Err(Error::Migration(format!(
            "cannot migrate from version {from} to version {to} (latest is {latest})"
        )));
    }

    let Value::Object(mut obj) = raw else {
        return Err(Error::Migration("document is not an object".into()));
    };

    for (start, step) in STEPS {
        if start >= from && start < to {
            step(&mut obj)?;
            debug!(from = start, to = start + 1; "applied migration step");
        }
    }
    Ok(Value::Object(obj))
}

/// Migrate to the current version from whatever `raw` declares.
pub fn migrate_to_current(raw: Value) -> Result<Value> {
    let from = source_version(&raw)?;
    migrate(raw, from, Version::CURRENT.major)
}

fn object_mut<'a>(obj: &'a mut Map<String, Value>, key: &str) -> Result<&'a mut Map<String, Value>> {
    obj.get_mut(key)
        .and_then(Value::as_object_mut)
        .ok_or_else(|| Error::Migration(format!("'{key}' must be an object")))
}

/// Element objects carried their type as a `type` key.
fn v0_to_v1(doc: &mut Map<String, Value>) -> Result<()> {
    let elements = object_mut(doc, "elements")?;
    for (name, entry) in elements.iter_mut() {
        let Value::Object(params) = entry else {
            return Err(Error::Migration(format!("element '{name}' is not an object")));
        };
        let ty = params
            .remove("type")
            .ok_or_else(|| Error::Migration(format!("element '{name}' has no type")))?;
        *entry = Value::Array(vec![ty, Value::Object(std::mem::take(params))]);
    }
    doc.insert("version".into(), "1.0".into());
    Ok(())
}

/// One main `lattice` plus `sub_lattices` became a single `lattices` map.
fn v1_to_v2(doc: &mut Map<String, Value>) -> Result<()> {
    if let Some(name) = doc.remove("name") {
        doc.insert("title".into(), name);
    }

    let mut lattices = match doc.remove("sub_lattices") {
        Some(Value::Object(subs)) => subs,
        None => Map::new(),
        Some(_) => return Err(Error::Migration("'sub_lattices' must be an object".into())),
    };
    let main = doc
        .remove("lattice")
        .ok_or_else(|| Error::Migration("document has no 'lattice'".into()))?;
    lattices.insert(MAIN_LATTICE.into(), main);
    doc.insert("lattices".into(), Value::Object(lattices));
    doc.insert("root".into(), MAIN_LATTICE.into());

    if let Some(info) = doc.remove("description").filter(truthy) {
        doc.insert("info".into(), info);
    }
    for entry in object_mut(doc, "elements")?.values_mut() {
        let Some(params) = entry.get_mut(1).and_then(Value::as_object_mut) else {
            continue;
        };
        if let Some(info) = params.remove("description").filter(truthy) {
            params.insert("info".into(), info);
        }
    }

    doc.insert("version".into(), "2.0".into());
    Ok(())
}

fn truthy(value: &Value) -> bool {
    !matches!(value, Value::Null | Value::Bool(false))
        && value.as_str().is_none_or(|s| !s.is_empty())
}

/// Type tags became lowercase kind names.
fn v2_to_v3(doc: &mut Map<String, Value>) -> Result<()> {
    for (name, entry) in object_mut(doc, "elements")?.iter_mut() {
        let tag = entry
            .get_mut(0)
            .ok_or_else(|| Error::Migration(format!("element '{name}' has no type")))?;
        let old = tag.as_str().unwrap_or_default();
        let new = kind_name(old).ok_or_else(|| {
            Error::Migration(format!("element '{name}' has unknown type '{old}'"))
        })?;
        *tag = Value::String(new.to_string());
    }
    doc.insert("version".into(), "3.0".into());
    Ok(())
}

fn kind_name(tag: &str) -> Option<&'static str> {
    Some(match tag {
        "Drift" => "drift",
        "Dipole" | "Sbend" | "SBend" => "dipole",
        "Quadrupole" => "quadrupole",
        "Sextupole" => "sextupole",
        "Octupole" => "octupole",
        "Solenoid" => "solenoid",
        "Cavity" | "RFCavity" => "cavity",
        "Kicker" => "kicker",
        "Multipole" => "multipole",
        "Monitor" => "monitor",
        "Marker" => "marker",
        _ => return None,
    })
}
