//! Module documents: record data returned by the API.
//!
//! A [`Module`] wraps an `application/modules/module/moduleItem` tree. Several
//! responses (objects, their multimedia, their persons) are joined into one
//! document with [`Module::join`] or `+`, cleaned, validated and cached on disk
//! as plain XML or as a zipped chunk.

mod clean;

use std::ops::{Add, AddAssign};
use std::path::{Path, PathBuf};

use tracing::debug;
use xmltree::{Element, XMLNode};

use crate::constants::MODULE_NS;
use crate::validate::{ValidationError, validate_module};
use crate::xml::{self, XmlError, attr, child, child_mut, children};

pub use clean::NON_PUBLIC_GROUPS;

/// Record data of one or more modules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    root: Element,
}

/// A multimedia item that has a downloadable attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentCandidate {
    /// Multimedia item id.
    pub id: String,
    /// Original file name recorded in `MulOriginalFileTxt`, if any.
    pub original_file: Option<String>,
    /// `__lastModified` system field, if present.
    pub last_modified: Option<String>,
}

impl AttachmentCandidate {
    /// File name used when saving the attachment: `{id}{ext}`.
    #[must_use]
    pub fn file_name(&self) -> String {
        let ext = self
            .original_file
            .as_deref()
            .and_then(|name| Path::new(name).extension())
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        format!("{}{ext}", self.id)
    }
}

impl Default for Module {
    fn default() -> Self {
        Self::new()
    }
}

impl Module {
    /// Creates an empty document (`application/modules` without modules).
    #[must_use]
    pub fn new() -> Self {
        let mut root = xml::document_root(MODULE_NS, "application");
        root.children
            .push(XMLNode::Element(xml::element(MODULE_NS, "modules")));
        Self { root }
    }

    /// Wraps an already parsed document tree.
    #[must_use]
    pub fn from_element(root: Element) -> Self {
        Self { root }
    }

    /// Parses a response body.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::Parse`] for malformed input.
    pub fn from_xml(raw: &str) -> Result<Self, XmlError> {
        xml::parse_str(raw).map(Self::from_element)
    }

    /// Reads a document from disk.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError`] if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, XmlError> {
        xml::parse_file(path).map(Self::from_element)
    }

    /// Reads a zipped chunk written by [`Module::to_zip`].
    ///
    /// The archive `name.zip` is expected to contain the entry `name.xml`.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError`] if the archive or its entry cannot be read.
    pub fn from_zip(path: &Path) -> Result<Self, XmlError> {
        let entry = zip_entry_name(path);
        xml::parse_zip_entry(path, &entry).map(Self::from_element)
    }

    /// The underlying document tree.
    #[must_use]
    pub fn root(&self) -> &Element {
        &self.root
    }

    /// Mutable access to the document tree.
    pub fn root_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    fn modules(&self) -> impl Iterator<Item = &Element> {
        child(&self.root, "modules")
            .into_iter()
            .flat_map(|modules| children(modules, "module"))
    }

    fn module_el(&self, name: &str) -> Option<&Element> {
        self.modules().find(|m| attr(m, "name") == Some(name))
    }

    /// Names of the contained modules, in document order.
    #[must_use]
    pub fn module_names(&self) -> Vec<&str> {
        self.modules().filter_map(|m| attr(m, "name")).collect()
    }

    /// Total number of items across all modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules()
            .map(|m| children(m, "moduleItem").count())
            .sum()
    }

    /// Whether the document contains no items at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of items of module `module`.
    #[must_use]
    pub fn actual_size(&self, module: &str) -> usize {
        self.module_el(module)
            .map_or(0, |m| children(m, "moduleItem").count())
    }

    /// `totalSize` reported by the server for `module` (all matches, not only this page).
    #[must_use]
    pub fn total_size(&self, module: &str) -> Option<u64> {
        self.module_el(module)
            .and_then(|m| attr(m, "totalSize"))
            .and_then(|v| v.parse().ok())
    }

    /// Iterates the items of `module`.
    pub fn items<'a>(&'a self, module: &str) -> impl Iterator<Item = &'a Element> + use<'a> {
        self.module_el(module)
            .into_iter()
            .flat_map(|m| children(m, "moduleItem"))
    }

    /// Looks up an item by module and id.
    #[must_use]
    pub fn item(&self, module: &str, id: &str) -> Option<&Element> {
        self.module_el(module)
            .and_then(|m| children(m, "moduleItem").find(|item| attr(item, "id") == Some(id)))
    }

    /// Ids of the items of `module`, in document order.
    #[must_use]
    pub fn item_ids(&self, module: &str) -> Vec<String> {
        self.items(module)
            .filter_map(|item| attr(item, "id").map(str::to_string))
            .collect()
    }

    /// Merges `other` into this document.
    ///
    /// Modules are matched by name. Items already present (same id) are kept
    /// and the incoming duplicate is dropped. `totalSize` of every touched
    /// module is set to its item count.
    pub fn join(&mut self, other: Module) {
        let Module { mut root } = other;
        let Some(other_modules) = child_mut(&mut root, "modules") else {
            return;
        };
        let incoming: Vec<Element> = std::mem::take(&mut other_modules.children)
            .into_iter()
            .filter_map(|node| match node {
                XMLNode::Element(e) if e.name == "module" => Some(e),
                _ => None,
            })
            .collect();

        if child(&self.root, "modules").is_none() {
            self.root
                .children
                .push(XMLNode::Element(xml::element(MODULE_NS, "modules")));
        }
        let Some(modules) = child_mut(&mut self.root, "modules") else {
            return;
        };
        for mut module in incoming {
            scrub_namespaces(&mut module);
            let name = attr(&module, "name").unwrap_or_default().to_string();
            let existing = xml::children_mut(modules, "module")
                .find(|m| attr(m, "name") == Some(name.as_str()));
            match existing {
                Some(target) => {
                    let mut added = 0usize;
                    for item in module.children.drain(..) {
                        let XMLNode::Element(item) = item else {
                            continue;
                        };
                        let duplicate = attr(&item, "id").is_some_and(|id| {
                            children(target, "moduleItem").any(|t| attr(t, "id") == Some(id))
                        });
                        if !duplicate {
                            target.children.push(XMLNode::Element(item));
                            added += 1;
                        }
                    }
                    debug!(module = %name, added, "joined module items");
                    update_total_size(target);
                }
                None => {
                    update_total_size(&mut module);
                    modules.children.push(XMLNode::Element(module));
                }
            }
        }
    }

    /// Removes data that must not be published or that fails validation.
    ///
    /// Drops `uuid` attributes and the groups in [`NON_PUBLIC_GROUPS`], sorts
    /// items by numeric id and recomputes `totalSize`.
    pub fn clean(&mut self) {
        clean::clean(&mut self.root);
    }

    /// Checks the module document structure.
    ///
    /// # Errors
    ///
    /// Returns the first structural violation.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_module(&self.root)
    }

    /// Multimedia items flagged with `hasAttachments="true"`.
    #[must_use]
    pub fn attachment_candidates(&self) -> Vec<AttachmentCandidate> {
        self.items("Multimedia")
            .filter(|item| attr(item, "hasAttachments") == Some("true"))
            .filter_map(|item| {
                Some(AttachmentCandidate {
                    id: attr(item, "id")?.to_string(),
                    original_file: xml::field_value(item, "dataField", "MulOriginalFileTxt"),
                    last_modified: xml::field_value(item, "systemField", "__lastModified"),
                })
            })
            .collect()
    }

    /// Serializes the document.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::Write`] if serialization fails.
    pub fn to_xml_string(&self) -> Result<String, XmlError> {
        xml::to_string(&self.root)
    }

    /// Writes the document to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::Io`] on file system errors.
    pub fn to_file(&self, path: &Path) -> Result<(), XmlError> {
        debug!(path = %path.display(), items = self.len(), "writing module file");
        xml::write_file(&self.root, path)
    }

    /// Writes the document zipped next to `path`.
    ///
    /// `path` names the XML document (e.g. `group1-chunk3.xml`); the archive is
    /// written to the same path with a `.zip` extension and contains a single
    /// entry named after the file name of `path`. Returns the archive path.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError`] if the archive cannot be written.
    pub fn to_zip(&self, path: &Path) -> Result<PathBuf, XmlError> {
        let zip_path = path.with_extension("zip");
        let entry = zip_entry_name(&zip_path);
        debug!(path = %zip_path.display(), entry = %entry, items = self.len(), "writing zipped module file");
        xml::write_zip(&self.root, &zip_path, &entry)?;
        Ok(zip_path)
    }
}

fn zip_entry_name(zip_path: &Path) -> String {
    let stem = zip_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    format!("{stem}.xml")
}

fn update_total_size(module: &mut Element) {
    let count = children(module, "moduleItem").count();
    xml::set_attr(module, "totalSize", count.to_string());
}

// Elements moved between documents keep the namespace map of their source.
fn scrub_namespaces(el: &mut Element) {
    xml::walk_mut(el, &mut |e| e.namespaces = None);
}

impl Add for Module {
    type Output = Module;

    fn add(mut self, rhs: Module) -> Module {
        self.join(rhs);
        self
    }
}

impl AddAssign for Module {
    fn add_assign(&mut self, rhs: Module) {
        self.join(rhs);
    }
}

impl std::fmt::Display for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to_xml_string() {
            Ok(s) => f.write_str(&s),
            Err(_) => Err(std::fmt::Error),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn objects(ids: &[&str]) -> Module {
        let items: String = ids
            .iter()
            .map(|id| format!(r#"<moduleItem id="{id}" uuid="u{id}"><dataField name="ObjTitleTxt"><value>t{id}</value></dataField></moduleItem>"#))
            .collect();
        Module::from_xml(&format!(
            r#"<application xmlns="http://www.zetcom.com/ria/ws/module"><modules><module name="Object" totalSize="99">{items}</module></modules></application>"#
        ))
        .unwrap()
    }

    fn multimedia() -> Module {
        Module::from_xml(
            r#"<application xmlns="http://www.zetcom.com/ria/ws/module"><modules>
                 <module name="Multimedia" totalSize="3">
                   <moduleItem id="10" hasAttachments="true">
                     <dataField name="MulOriginalFileTxt"><value>VII a 40.tif</value></dataField>
                   </moduleItem>
                   <moduleItem id="11" hasAttachments="false"/>
                   <moduleItem id="12" hasAttachments="true"/>
                 </module>
               </modules></application>"#,
        )
        .unwrap()
    }

    #[test]
    fn test_new_module_is_empty_and_valid() {
        let m = Module::new();
        assert!(m.is_empty());
        assert_eq!(m.len(), 0);
        assert!(m.validate().is_ok());
        assert!(m.module_names().is_empty());
    }

    #[test]
    fn test_len_counts_items_across_modules() {
        let m = objects(&["1", "2"]) + multimedia();
        assert_eq!(m.len(), 5);
        assert_eq!(m.actual_size("Object"), 2);
        assert_eq!(m.actual_size("Multimedia"), 3);
        assert_eq!(m.actual_size("Person"), 0);
        assert_eq!(m.module_names(), vec!["Object", "Multimedia"]);
    }

    #[test]
    fn test_item_lookup_outlives_module_name() {
        let m = objects(&["1", "2"]);
        let found = {
            let name = String::from("Object");
            m.item(&name, "2")
        };
        assert_eq!(found.and_then(|item| attr(item, "id")), Some("2"));

        let remaining = {
            let name = String::from("Object");
            m.items(&name)
        };
        assert_eq!(remaining.count(), 2);
        assert!(m.item("Object", "3").is_none());
        assert!(m.item("Person", "1").is_none());
    }

    #[test]
    fn test_join_drops_duplicate_items_and_recounts() {
        let mut m = objects(&["1", "2"]);
        m += objects(&["2", "3"]);
        assert_eq!(m.item_ids("Object"), vec!["1", "2", "3"]);
        assert_eq!(m.total_size("Object"), Some(3));
        assert!(m.validate().is_ok());
    }

    #[test]
    fn test_join_into_empty_module_keeps_items() {
        let joined = Module::new() + objects(&["5"]);
        assert_eq!(joined.len(), 1);
        assert!(joined.item("Object", "5").is_some());
        let out = joined.to_xml_string().unwrap();
        assert_eq!(out.matches("xmlns=").count(), 1, "{out}");
    }

    #[test]
    fn test_clean_drops_uuid_and_sorts_items() {
        let mut m = objects(&["30", "4", "100"]);
        m.clean();
        assert_eq!(m.item_ids("Object"), vec!["4", "30", "100"]);
        let out = m.to_xml_string().unwrap();
        assert!(!out.contains("uuid="), "{out}");
        assert_eq!(m.total_size("Object"), Some(3));
    }

    #[test]
    fn test_attachment_candidates_only_flagged_items() {
        let candidates = multimedia().attachment_candidates();
        let ids: Vec<&str> = candidates.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["10", "12"]);
        assert_eq!(candidates[0].file_name(), "10.tif");
        assert_eq!(candidates[1].file_name(), "12");
    }

    #[test]
    fn test_zip_roundtrip_uses_xml_entry_name() {
        let dir = tempfile::TempDir::new().unwrap();
        let xml_path = dir.path().join("group1-chunk1.xml");
        let m = objects(&["1", "2"]);
        let zip_path = m.to_zip(&xml_path).unwrap();
        assert_eq!(zip_path, dir.path().join("group1-chunk1.zip"));
        assert!(!xml_path.exists());

        let back = Module::from_zip(&zip_path).unwrap();
        assert_eq!(back.item_ids("Object"), vec!["1", "2"]);
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("m.xml");
        multimedia().to_file(&path).unwrap();
        let back = Module::from_file(&path).unwrap();
        assert_eq!(back.len(), 3);
        assert_eq!(back.item_ids("Multimedia"), vec!["10", "11", "12"]);
    }
}
