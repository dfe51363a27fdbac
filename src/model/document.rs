use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::codec;
use crate::error::{Result, Rule, ValidationError, Violation};
use crate::schema::Version;
use crate::validate::{self, ValidateOptions};

use super::{Element, Lattice};

/// The root container: metadata plus name-indexed elements and lattices.
///
/// A `Document` is only handed out after validation, by
/// [`codec::decode`] or [`DocumentBuilder::build`], and cannot be mutated
/// afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub(crate) version: Version,
    pub(crate) title: Option<String>,
    pub(crate) info: Option<String>,
    pub(crate) root: Option<String>,
    pub(crate) elements: IndexMap<String, Element>,
    pub(crate) lattices: IndexMap<String, Lattice>,
    /// Unknown top-level keys kept in lenient mode.
    pub(crate) extras: Map<String, Value>,
}

impl Document {
    pub fn builder() -> DocumentBuilder {
        DocumentBuilder::new()
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn info(&self) -> Option<&str> {
        self.info.as_deref()
    }

    /// Name of the lattice selected as the beamline, if any.
    pub fn root(&self) -> Option<&str> {
        self.root.as_deref()
    }

    pub fn elements(&self) -> &IndexMap<String, Element> {
        &self.elements
    }

    pub fn lattices(&self) -> &IndexMap<String, Lattice> {
        &self.lattices
    }

    pub fn element(&self, name: &str) -> Option<&Element> {
        self.elements.get(name)
    }

    pub fn lattice(&self, name: &str) -> Option<&Lattice> {
        self.lattices.get(name)
    }

    pub fn extras(&self) -> &Map<String, Value> {
        &self.extras
    }

    /// Re-run the validator over this document's encoded form.
    ///
    /// Returns the warnings on success.
    pub fn check(&self, options: &ValidateOptions) -> Result<Vec<Violation>> {
        let value = codec::to_value(self);
        Ok(validate::validate(&value, options)?)
    }
}

/// Assembles a [`Document`] programmatically.
///
/// Names must be unique across elements and lattices; `build` validates the
/// result with the same rules the decoder applies.
#[derive(Debug)]
pub struct DocumentBuilder {
    doc: Document,
    duplicates: Vec<Violation>,
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self {
            doc: Document {
                version: Version::CURRENT,
                title: None,
                info: None,
                root: None,
                elements: IndexMap::new(),
                lattices: IndexMap::new(),
                extras: Map::new(),
            },
            duplicates: Vec::new(),
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.doc.title = Some(title.into());
        self
    }

    pub fn info(mut self, info: impl Into<String>) -> Self {
        self.doc.info = Some(info.into());
        self
    }

    pub fn root(mut self, root: impl Into<String>) -> Self {
        self.doc.root = Some(root.into());
        self
    }

    pub fn element(mut self, element: Element) -> Self {
        let name = element.name().to_string();
        if self.doc.elements.contains_key(&name) {
            self.duplicates.push(Violation::error(
                Rule::Shape,
                format!("/elements/{}", validate::escape_pointer(&name)),
                format!("element '{name}' is defined more than once"),
            ));
            return self;
        }
        self.doc.elements.insert(name, element);
        self
    }

    pub fn lattice(mut self, lattice: Lattice) -> Self {
        let name = lattice.name().to_string();
        if self.doc.lattices.contains_key(&name) {
            self.duplicates.push(Violation::error(
                Rule::Shape,
                format!("/lattices/{}", validate::escape_pointer(&name)),
                format!("lattice '{name}' is defined more than once"),
            ));
            return self;
        }
        self.doc.lattices.insert(name, lattice);
        self
    }

    pub fn build(self) -> Result<Document> {
        if !self.duplicates.is_empty() {
            return Err(ValidationError::new(self.duplicates).into());
        }
        self.doc.check(&ValidateOptions::default())?;
        Ok(self.doc)
    }
}
