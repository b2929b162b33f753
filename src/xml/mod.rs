//! XML document plumbing shared by module and search documents.
//!
//! Documents are held as [`xmltree::Element`] trees. The vendor documents use a
//! single default namespace each, so navigation matches on local element names.
//! Elements created here carry the namespace URI without a prefix; only a
//! document root declares the default namespace, which the emitter inherits for
//! all descendants.

mod error;

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use xmltree::{Element, EmitterConfig, Namespace, XMLNode};

pub use error::XmlError;

/// Parses a document from a string.
///
/// # Errors
///
/// Returns [`XmlError::Parse`] for malformed input.
pub fn parse_str(xml: &str) -> Result<Element, XmlError> {
    Element::parse(xml.as_bytes()).map_err(|e| XmlError::parse("string", e))
}

/// Parses a document from a file.
///
/// # Errors
///
/// Returns [`XmlError::Io`] when the file cannot be opened and
/// [`XmlError::Parse`] for malformed content.
pub fn parse_file(path: &Path) -> Result<Element, XmlError> {
    let file = File::open(path).map_err(|e| XmlError::io(path, e))?;
    Element::parse(std::io::BufReader::new(file))
        .map_err(|e| XmlError::parse(path.display().to_string(), e))
}

/// Parses the document stored as `entry` inside the zip archive at `path`.
///
/// # Errors
///
/// Returns [`XmlError::MissingEntry`] if the archive has no such entry.
pub fn parse_zip_entry(path: &Path, entry: &str) -> Result<Element, XmlError> {
    let file = File::open(path).map_err(|e| XmlError::io(path, e))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| XmlError::zip(path, e))?;
    let mut zipped = match archive.by_name(entry) {
        Ok(zipped) => zipped,
        Err(zip::result::ZipError::FileNotFound) => {
            return Err(XmlError::MissingEntry {
                path: path.to_path_buf(),
                entry: entry.to_string(),
            });
        }
        Err(e) => return Err(XmlError::zip(path, e)),
    };
    let mut raw = Vec::new();
    zipped
        .read_to_end(&mut raw)
        .map_err(|e| XmlError::io(path, e))?;
    Element::parse(raw.as_slice())
        .map_err(|e| XmlError::parse(format!("{}!{entry}", path.display()), e))
}

/// Serializes a document pretty-printed with an XML declaration.
///
/// # Errors
///
/// Returns [`XmlError::Write`] if the emitter rejects the tree.
pub fn to_string(root: &Element) -> Result<String, XmlError> {
    let bytes = to_bytes(root)?;
    String::from_utf8(bytes).map_err(XmlError::write)
}

fn to_bytes(root: &Element) -> Result<Vec<u8>, XmlError> {
    let mut buffer = Vec::new();
    let config = EmitterConfig::new().perform_indent(true);
    root.write_with_config(&mut buffer, config)
        .map_err(XmlError::write)?;
    Ok(buffer)
}

/// Writes a document to `path`, replacing any existing file.
///
/// # Errors
///
/// Returns [`XmlError::Io`] on file system errors.
pub fn write_file(root: &Element, path: &Path) -> Result<(), XmlError> {
    let bytes = to_bytes(root)?;
    std::fs::write(path, bytes).map_err(|e| XmlError::io(path, e))
}

/// Writes a document as the single deflated entry `entry` of a new zip archive.
///
/// # Errors
///
/// Returns [`XmlError::Zip`] or [`XmlError::Io`] when the archive cannot be written.
pub fn write_zip(root: &Element, zip_path: &Path, entry: &str) -> Result<(), XmlError> {
    let bytes = to_bytes(root)?;
    let file = File::create(zip_path).map_err(|e| XmlError::io(zip_path, e))?;
    let mut archive = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    archive
        .start_file(entry, options)
        .map_err(|e| XmlError::zip(zip_path, e))?;
    archive
        .write_all(&bytes)
        .map_err(|e| XmlError::io(zip_path, e))?;
    archive.finish().map_err(|e| XmlError::zip(zip_path, e))?;
    Ok(())
}

/// Creates an element in namespace `ns` without declaring it.
#[must_use]
pub fn element(ns: &str, name: &str) -> Element {
    let mut el = Element::new(name);
    el.namespace = Some(ns.to_string());
    el
}

/// Creates a document root that declares `ns` as the default namespace.
#[must_use]
pub fn document_root(ns: &str, name: &str) -> Element {
    let mut root = element(ns, name);
    let mut namespaces = Namespace::empty();
    namespaces.put("", ns);
    root.namespaces = Some(namespaces);
    root
}

/// Creates an element holding a single text node.
#[must_use]
pub fn text_element(ns: &str, name: &str, text: &str) -> Element {
    let mut el = element(ns, name);
    el.children.push(XMLNode::Text(text.to_string()));
    el
}

/// Sets an attribute, replacing a previous value.
pub fn set_attr(el: &mut Element, name: &str, value: impl Into<String>) {
    el.attributes.insert(name.to_string(), value.into());
}

/// Returns an attribute value.
#[must_use]
pub fn attr<'a>(el: &'a Element, name: &str) -> Option<&'a str> {
    el.attributes.get(name).map(String::as_str)
}

/// Iterates the element children of `el`.
pub fn elements(el: &Element) -> impl Iterator<Item = &Element> {
    el.children.iter().filter_map(|node| match node {
        XMLNode::Element(child) => Some(child),
        _ => None,
    })
}

/// Iterates the element children of `el` mutably.
pub fn elements_mut(el: &mut Element) -> impl Iterator<Item = &mut Element> {
    el.children.iter_mut().filter_map(|node| match node {
        XMLNode::Element(child) => Some(child),
        _ => None,
    })
}

/// Iterates the element children of `el` with local name `name`.
pub fn children<'a>(el: &'a Element, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
    elements(el).filter(move |child| child.name == name)
}

/// Iterates the element children of `el` with local name `name` mutably.
pub fn children_mut<'a>(
    el: &'a mut Element,
    name: &'a str,
) -> impl Iterator<Item = &'a mut Element> + 'a {
    elements_mut(el).filter(move |child| child.name == name)
}

/// Returns the first element child named `name`.
#[must_use]
pub fn child<'a>(el: &'a Element, name: &str) -> Option<&'a Element> {
    elements(el).find(|child| child.name == name)
}

/// Returns the first element child named `name` mutably.
pub fn child_mut<'a>(el: &'a mut Element, name: &str) -> Option<&'a mut Element> {
    elements_mut(el).find(|child| child.name == name)
}

/// Concatenated text content of the direct text children of `el`.
#[must_use]
pub fn text(el: &Element) -> Option<String> {
    let mut out = String::new();
    let mut found = false;
    for node in &el.children {
        if let XMLNode::Text(t) | XMLNode::CData(t) = node {
            out.push_str(t);
            found = true;
        }
    }
    found.then_some(out)
}

/// Visits `el` and all of its element descendants, parents first.
pub fn walk<'a>(el: &'a Element, visit: &mut impl FnMut(&'a Element)) {
    visit(el);
    for child in elements(el) {
        walk(child, visit);
    }
}

/// Visits `el` and all of its element descendants mutably, parents first.
pub fn walk_mut(el: &mut Element, visit: &mut impl FnMut(&mut Element)) {
    visit(el);
    for child in elements_mut(el) {
        walk_mut(child, visit);
    }
}

/// Removes all element children of `el` for which `remove` returns true.
///
/// Returns the number of removed children.
pub fn remove_children(el: &mut Element, mut remove: impl FnMut(&Element) -> bool) -> usize {
    let before = el.children.len();
    el.children.retain(|node| match node {
        XMLNode::Element(child) => !remove(child),
        _ => true,
    });
    before - el.children.len()
}

/// Returns the `value` text of the field child `kind[@name = name]` of an item.
///
/// `kind` is one of the vendor field element names (`systemField`,
/// `dataField`, `virtualField`).
#[must_use]
pub fn field_value(item: &Element, kind: &str, name: &str) -> Option<String> {
    children(item, kind)
        .find(|field| attr(field, "name") == Some(name))
        .and_then(|field| child(field, "value"))
        .and_then(text)
}
