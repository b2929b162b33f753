//! Patching of a single record before it is uploaded again.
//!
//! References are *added* (a record may point to many objects) while scalar
//! fields such as the original file name are *replaced*.

mod exif;

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};
use xmltree::{Element, XMLNode};

use crate::constants::MODULE_NS;
use crate::module::Module;
use crate::xml::{self, XmlError, attr, child, child_mut, children_mut};

/// Errors raised while patching a record.
#[derive(Debug, Error)]
pub enum RecordError {
    /// A record wraps exactly one item.
    #[error("record expects exactly one item, found {0}")]
    WrongCount(usize),

    /// The operation applies to a different module.
    #[error("{expected} record expected, found {found}")]
    WrongModule {
        /// Module the operation works on.
        expected: &'static str,
        /// Module of the record.
        found: String,
    },

    /// Reading the referenced file failed.
    #[error("cannot read {path}: {source}")]
    Io {
        /// File that was read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Writing the record failed.
    #[error(transparent)]
    Xml(#[from] XmlError),
}

impl RecordError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Where a replaced data field is inserted into the item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    /// After the last child element of the item.
    End,
    /// Directly after the last `dataField`.
    AfterLastDataField,
}

/// A single module item with helpers to rewrite it.
#[derive(Debug, Clone)]
pub struct Record {
    module: Module,
}

impl Record {
    /// Copies `data`, which must contain exactly one item.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::WrongCount`] otherwise.
    pub fn new(data: &Module) -> Result<Self, RecordError> {
        match data.len() {
            1 => Ok(Self {
                module: data.clone(),
            }),
            n => Err(RecordError::WrongCount(n)),
        }
    }

    /// Name of the record's module, e.g. `Multimedia`.
    #[must_use]
    pub fn module_type(&self) -> &str {
        self.module
            .module_names()
            .into_iter()
            .find(|name| self.module.actual_size(name) == 1)
            .unwrap_or_default()
    }

    /// # Errors
    ///
    /// Returns [`RecordError::WrongModule`] unless this is a Multimedia record.
    pub fn raise_if_not_multimedia(&self) -> Result<(), RecordError> {
        self.expect_module("Multimedia")
    }

    /// # Errors
    ///
    /// Returns [`RecordError::WrongModule`] unless this is an Object record.
    pub fn raise_if_not_object(&self) -> Result<(), RecordError> {
        self.expect_module("Object")
    }

    fn expect_module(&self, expected: &'static str) -> Result<(), RecordError> {
        let found = self.module_type();
        if found == expected {
            Ok(())
        } else {
            Err(RecordError::WrongModule {
                expected,
                found: found.to_string(),
            })
        }
    }

    fn item_mut(&mut self) -> Result<&mut Element, RecordError> {
        child_mut(self.module.root_mut(), "modules")
            .and_then(|modules| {
                children_mut(modules, "module")
                    .flat_map(|m| children_mut(m, "moduleItem"))
                    .next()
            })
            .ok_or(RecordError::WrongCount(0))
    }

    /// Adds a link from this asset to `item_id` of `target_module`.
    ///
    /// Existing references are kept; the `MulReferencesCre` composite is
    /// created after the item's last child when missing.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::WrongModule`] for non-Multimedia records.
    pub fn add_reference(&mut self, target_module: &str, item_id: u64) -> Result<(), RecordError> {
        self.raise_if_not_multimedia()?;
        let item = self.item_mut()?;

        let has_composite = xml::children(item, "composite")
            .any(|c| attr(c, "name") == Some("MulReferencesCre"));
        if !has_composite {
            let mut composite = xml::element(MODULE_NS, "composite");
            xml::set_attr(&mut composite, "name", "MulReferencesCre");
            item.children.push(XMLNode::Element(composite));
        }
        let Some(composite) = children_mut(item, "composite")
            .find(|c| attr(c, "name") == Some("MulReferencesCre"))
        else {
            return Ok(());
        };

        let mut reference_item = xml::element(MODULE_NS, "moduleReferenceItem");
        xml::set_attr(&mut reference_item, "moduleItemId", item_id.to_string());
        xml::set_attr(&mut reference_item, "seqNo", "0");

        let mut reference = xml::element(MODULE_NS, "moduleReference");
        xml::set_attr(&mut reference, "name", "MulObjectRef");
        xml::set_attr(&mut reference, "targetModule", target_module);
        xml::set_attr(&mut reference, "multiplicity", "M:N");
        xml::set_attr(&mut reference, "size", "1");
        reference.children.push(XMLNode::Element(reference_item));

        let mut composite_item = xml::element(MODULE_NS, "compositeItem");
        xml::set_attr(&mut composite_item, "seqNo", "0");
        composite_item.children.push(XMLNode::Element(reference));

        composite.children.push(XMLNode::Element(composite_item));
        debug!(target_module, item_id, "added reference");
        Ok(())
    }

    /// Records the file name (without directories) of `path`.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::WrongModule`] for non-Multimedia records.
    pub fn set_filename(&mut self, path: &Path) -> Result<(), RecordError> {
        self.raise_if_not_multimedia()?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.replace_data_field("MulOriginalFileTxt", "Varchar", &name, Placement::End)
    }

    /// Records the size of `path` in kilobytes, rounded up.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::Io`] if the file cannot be inspected.
    pub fn set_size(&mut self, path: &Path) -> Result<(), RecordError> {
        self.raise_if_not_multimedia()?;
        let bytes = std::fs::metadata(path)
            .map_err(|e| RecordError::io(path, e))?
            .len();
        let value = format!("{} KB", bytes.div_ceil(1024));
        self.replace_data_field("MulSizeTxt", "Varchar", &value, Placement::End)
    }

    /// Records the EXIF capture date of `path`.
    ///
    /// Leaves the record untouched when the file has no readable EXIF date.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::Io`] if the file cannot be opened.
    pub fn set_dateexif(&mut self, path: &Path) -> Result<(), RecordError> {
        self.raise_if_not_multimedia()?;
        let Some(date) = exif::read_datetime(path).map_err(|e| RecordError::io(path, e))? else {
            warn!(path = %path.display(), "keeping MulDateExifTst, no exif date");
            return Ok(());
        };
        let value = date.format("%Y-%m-%dT%H:%M:%SZ").to_string();
        self.replace_data_field(
            "MulDateExifTst",
            "Timestamp",
            &value,
            Placement::AfterLastDataField,
        )
    }

    /// Replaces (or inserts) the data field `name` with a single value.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::WrongCount`] if the record lost its item.
    pub fn set_data_field(
        &mut self,
        name: &str,
        data_type: &str,
        value: &str,
    ) -> Result<(), RecordError> {
        self.replace_data_field(name, data_type, value, Placement::End)
    }

    fn replace_data_field(
        &mut self,
        name: &str,
        data_type: &str,
        value: &str,
        placement: Placement,
    ) -> Result<(), RecordError> {
        let item = self.item_mut()?;
        xml::remove_children(item, |c| c.name == "dataField" && attr(c, "name") == Some(name));

        let mut field = xml::element(MODULE_NS, "dataField");
        xml::set_attr(&mut field, "dataType", data_type);
        xml::set_attr(&mut field, "name", name);
        field
            .children
            .push(XMLNode::Element(xml::text_element(MODULE_NS, "value", value)));

        let position = match placement {
            Placement::End => item.children.len(),
            Placement::AfterLastDataField => item
                .children
                .iter()
                .rposition(|n| matches!(n, XMLNode::Element(e) if e.name == "dataField"))
                .map_or(item.children.len(), |i| i + 1),
        };
        item.children.insert(position, XMLNode::Element(field));
        debug!(field = name, value, "replaced data field");
        Ok(())
    }

    /// Value of a data field of the record, if present.
    #[must_use]
    pub fn data_field(&self, name: &str) -> Option<String> {
        let modules = child(self.module.root(), "modules")?;
        let module = child(modules, "module")?;
        let item = child(module, "moduleItem")?;
        xml::field_value(item, "dataField", name)
    }

    /// Writes the patched record.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::Xml`] on write failures.
    pub fn to_file(&self, path: &Path) -> Result<(), RecordError> {
        Ok(self.module.to_file(path)?)
    }

    /// Serializes the patched record.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::Xml`] if serialization fails.
    pub fn to_xml_string(&self) -> Result<String, RecordError> {
        Ok(self.module.to_xml_string()?)
    }

    /// Hands back the patched document.
    #[must_use]
    pub fn into_module(self) -> Module {
        self.module
    }
}
