//! Projection of a validated raw tree into the typed model.
//!
//! Every failure here means the validator let something through that it
//! should not have, so failures surface as [`Error::Internal`].

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::model::{Document, Element, ElementKind, Lattice, LatticeItem};
use crate::schema::Version;
use crate::validate;

fn internal(what: impl Into<String>) -> Error {
    Error::Internal(what.into())
}

pub(crate) fn project(raw: Value) -> Result<Document> {
    let Value::Object(obj) = raw else {
        return Err(internal("document is not an object"));
    };

    let mut version = None;
    let mut title = None;
    let mut info = None;
    let mut root = None;
    let mut elements = IndexMap::new();
    let mut lattices = IndexMap::new();
    let mut extras = Map::new();

    for (key, value) in obj {
        match key.as_str() {
            "version" => {
                version = value.as_str().and_then(Version::parse);
            }
            "title" => title = value.as_str().map(str::to_string),
            "info" => info = value.as_str().map(str::to_string),
            "root" => root = value.as_str().map(str::to_string),
            "elements" => elements = project_elements(value)?,
            "lattices" => lattices = project_lattices(value)?,
            _ => {
                extras.insert(key, value);
            }
        }
    }

    let version = version.ok_or_else(|| internal("missing or unreadable version"))?;

    Ok(Document {
        version,
        title,
        info,
        root,
        elements,
        lattices,
        extras,
    })
}

fn project_elements(value: Value) -> Result<IndexMap<String, Element>> {
    let Value::Object(entries) = value else {
        return Err(internal("'elements' is not an object"));
    };

    let mut out = IndexMap::with_capacity(entries.len());
    for (name, entry) in entries {
        let ty = validate::element_type(&entry)
            .ok_or_else(|| internal(format!("element '{name}' has no known type")))?;
        let params = entry
            .get(1)
            .and_then(Value::as_object)
            .ok_or_else(|| internal(format!("element '{name}' has no parameter object")))?;

        let kind = ElementKind::from_params(ty, params)
            .map_err(|e| internal(format!("element '{name}': {e}")))?;
        let mut element = Element::new(name.clone(), kind);
        if let Some(info) = params.get("info").and_then(Value::as_str) {
            element = element.with_info(info);
        }
        out.insert(name, element);
    }
    Ok(out)
}

fn project_lattices(value: Value) -> Result<IndexMap<String, Lattice>> {
    let Value::Object(entries) = value else {
        return Err(internal("'lattices' is not an object"));
    };

    let mut out = IndexMap::with_capacity(entries.len());
    for (name, items) in entries {
        let Value::Array(items) = items else {
            return Err(internal(format!("lattice '{name}' is not an array")));
        };
        let items = project_items(items)
            .map_err(|e| internal(format!("lattice '{name}': {e}")))?;
        out.insert(name.clone(), Lattice::new(name, items));
    }
    Ok(out)
}

fn project_items(items: Vec<Value>) -> std::result::Result<Vec<LatticeItem>, String> {
    items
        .into_iter()
        .map(|item| match item {
            Value::String(name) => Ok(LatticeItem::Ref(name)),
            Value::Array(inner) => project_items(inner).map(LatticeItem::Inline),
            other => Err(format!("unexpected lattice item {other}")),
        })
        .collect()
}
