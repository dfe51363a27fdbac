//! Text <-> [`Document`] conversion.
//!
//! Decoding is all-or-nothing: parse the text into a generic JSON tree,
//! validate the tree, then project it into the typed model. Encoding is the
//! structural inverse and is deterministic, so re-encoding an unchanged
//! document yields identical bytes.

pub mod cache;
mod format;
mod project;

pub use cache::{DecodeCache, Fingerprint, fingerprint};

use std::fs;
use std::path::Path;

use log::debug;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::model::{Document, LatticeItem};
use crate::validate::{self, ValidateOptions};

/// Decode with strict validation and both nesting forms enabled.
pub fn decode(text: &str) -> Result<Document> {
    decode_with(text, &ValidateOptions::default())
}

pub fn decode_with(text: &str, options: &ValidateOptions) -> Result<Document> {
    let raw: Value = serde_json::from_str(text)?;
    let warnings = validate::validate(&raw, options)?;
    debug!(warnings = warnings.len(); "document validated");
    project::project(raw)
}

/// Read and decode a file.
pub fn read_file(path: impl AsRef<Path>, options: &ValidateOptions) -> Result<Document> {
    let path = path.as_ref();
    debug!(path = path.display().to_string(); "reading lattice file");
    let text = fs::read_to_string(path)?;
    decode_with(&text, options)
}

pub fn encode(doc: &Document) -> String {
    format::to_string(&to_value(doc))
}

/// The generic JSON tree of a document, keys in canonical order.
pub fn to_value(doc: &Document) -> Value {
    let mut obj = Map::new();
    obj.insert("version".into(), Value::String(doc.version.to_string()));
    if let Some(title) = &doc.title {
        obj.insert("title".into(), Value::String(title.clone()));
    }
    if let Some(info) = &doc.info {
        obj.insert("info".into(), Value::String(info.clone()));
    }
    if let Some(root) = &doc.root {
        obj.insert("root".into(), Value::String(root.clone()));
    }

    let elements = doc
        .elements
        .iter()
        .map(|(name, element)| {
            let mut params: Map<String, Value> = element
                .kind()
                .fields()
                .iter()
                .map(|(key, field)| (key.to_string(), Value::from(field)))
                .collect();
            if let Some(info) = element.info() {
                params.insert("info".into(), Value::String(info.to_string()));
            }
            let entry = Value::Array(vec![
                Value::String(element.element_type().as_str().to_string()),
                Value::Object(params),
            ]);
            (name.clone(), entry)
        })
        .collect();
    obj.insert("elements".into(), Value::Object(elements));

    let lattices = doc
        .lattices
        .iter()
        .map(|(name, lattice)| (name.clone(), items_to_value(lattice.items())))
        .collect();
    obj.insert("lattices".into(), Value::Object(lattices));

    for (key, value) in &doc.extras {
        obj.insert(key.clone(), value.clone());
    }

    Value::Object(obj)
}

fn items_to_value(items: &[LatticeItem]) -> Value {
    Value::Array(
        items
            .iter()
            .map(|item| match item {
                LatticeItem::Ref(name) => Value::String(name.clone()),
                LatticeItem::Inline(inner) => items_to_value(inner),
            })
            .collect(),
    )
}

impl std::str::FromStr for Document {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        decode(s)
    }
}
