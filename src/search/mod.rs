//! Search query builder.
//!
//! A [`Search`] describes one search request against a single module. Terms
//! are appended at an insertion point: initially directly below `expert`;
//! [`Search::and`], [`Search::or`] and [`Search::not`] open a conjunction at
//! the insertion point and move the insertion point into it. Conjunctions are
//! never closed, so everything added after opening one lands inside it.
//!
//! ```
//! use mpapi::search::{Operator, Search};
//!
//! let mut query = Search::new("Object");
//! query.and();
//! query.add_criterion(Operator::EqualsField, "ObjCurrentLocationVoc", "4220560");
//! query.add_criterion(Operator::NotEqualsField, "__orgUnit", "EMPrimarverpackungen");
//! assert!(query.validate().is_ok());
//! ```

mod operator;

use std::path::Path;

use thiserror::Error;
use xmltree::{Element, XMLNode};

use crate::constants::SEARCH_NS;
use crate::validate::{DocumentKind, ValidationError, validate_search};
use crate::xml::{self, XmlError, attr, child, children, elements};

pub use operator::{Operator, UnknownOperator};

/// Errors when reading a search document.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The document is not well-formed XML.
    #[error(transparent)]
    Xml(#[from] XmlError),

    /// The document is well-formed but not a valid search request.
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// A search request for one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Search {
    module: String,
    limit: i64,
    offset: u64,
    fields: Vec<String>,
    terms: Vec<Element>,
    open: Vec<Element>,
    sort: Option<Element>,
}

impl Search {
    /// Creates an unrestricted search (`limit = -1`, `offset = 0`) for `module`.
    #[must_use]
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            limit: -1,
            offset: 0,
            fields: Vec::new(),
            terms: Vec::new(),
            open: Vec::new(),
            sort: None,
        }
    }

    /// Creates the request body for one page of a saved query result.
    #[must_use]
    pub fn saved_query_page(target: impl Into<String>, limit: i64, offset: u64) -> Self {
        let mut page = Self::new(target);
        page.limit = limit;
        page.offset = offset;
        page
    }

    /// Parses and validates a search document.
    ///
    /// Criteria added to a parsed search are appended directly below `expert`.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError`] for malformed or invalid documents.
    pub fn from_xml(raw: &str) -> Result<Self, SearchError> {
        let root = xml::parse_str(raw)?;
        validate_search(&root)?;

        let module_el = child(&root, "modules").and_then(|modules| child(modules, "module"));
        let search_el = module_el.and_then(|module| child(module, "search"));
        let (Some(module_el), Some(search_el)) = (module_el, search_el) else {
            return Err(SearchError::Invalid(ValidationError {
                kind: DocumentKind::Search,
                path: "/application/modules".to_string(),
                reason: "missing module search".to_string(),
            }));
        };

        let mut search = Self::new(attr(module_el, "name").unwrap_or_default());
        search.limit = attr(search_el, "limit")
            .and_then(|v| v.parse().ok())
            .unwrap_or(-1);
        search.offset = attr(search_el, "offset")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        if let Some(select) = child(search_el, "select") {
            search.fields = children(select, "field")
                .filter_map(|f| attr(f, "fieldPath").map(str::to_string))
                .collect();
        }
        if let Some(expert) = child(search_el, "expert") {
            search.terms = elements(expert).cloned().map(detach).collect();
        }
        search.sort = child(search_el, "sort").cloned().map(detach);
        Ok(search)
    }

    /// Name of the searched module.
    #[must_use]
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Maximum number of returned items; `-1` means no limit.
    #[must_use]
    pub fn limit(&self) -> i64 {
        self.limit
    }

    /// Sets the maximum number of returned items.
    pub fn set_limit(&mut self, limit: i64) -> &mut Self {
        self.limit = limit;
        self
    }

    /// Number of result items skipped.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Sets the number of result items skipped.
    pub fn set_offset(&mut self, offset: u64) -> &mut Self {
        self.offset = offset;
        self
    }

    /// Opens an `and` conjunction at the insertion point.
    pub fn and(&mut self) -> &mut Self {
        self.open_conjunction("and")
    }

    /// Opens an `or` conjunction at the insertion point.
    pub fn or(&mut self) -> &mut Self {
        self.open_conjunction("or")
    }

    /// Opens a `not` at the insertion point.
    pub fn not(&mut self) -> &mut Self {
        self.open_conjunction("not")
    }

    /// Appends a criterion with an operand at the insertion point.
    pub fn add_criterion(
        &mut self,
        operator: Operator,
        field: &str,
        value: impl Into<String>,
    ) -> &mut Self {
        let mut criterion = xml::element(SEARCH_NS, operator.as_str());
        xml::set_attr(&mut criterion, "fieldPath", field);
        xml::set_attr(&mut criterion, "operand", value);
        self.insert(criterion)
    }

    /// Appends an operand-less criterion (`isNull`, `isBlank`, ...) at the insertion point.
    pub fn add_unary_criterion(&mut self, operator: Operator, field: &str) -> &mut Self {
        let mut criterion = xml::element(SEARCH_NS, operator.as_str());
        xml::set_attr(&mut criterion, "fieldPath", field);
        self.insert(criterion)
    }

    /// Restricts the returned fields; may be called repeatedly.
    pub fn add_field(&mut self, field: impl Into<String>) -> &mut Self {
        self.fields.push(field.into());
        self
    }

    /// Whether the search carries any criteria.
    #[must_use]
    pub fn has_criteria(&self) -> bool {
        !self.terms.is_empty() || !self.open.is_empty()
    }

    fn open_conjunction(&mut self, name: &str) -> &mut Self {
        self.open.push(xml::element(SEARCH_NS, name));
        self
    }

    fn insert(&mut self, term: Element) -> &mut Self {
        match self.open.last_mut() {
            Some(conjunction) => conjunction.children.push(XMLNode::Element(term)),
            None => self.terms.push(term),
        }
        self
    }

    /// Builds the search document.
    #[must_use]
    pub fn to_element(&self) -> Element {
        let mut search = xml::element(SEARCH_NS, "search");
        xml::set_attr(&mut search, "limit", self.limit.to_string());
        xml::set_attr(&mut search, "offset", self.offset.to_string());

        if !self.fields.is_empty() {
            let mut select = xml::element(SEARCH_NS, "select");
            for field in &self.fields {
                let mut field_el = xml::element(SEARCH_NS, "field");
                xml::set_attr(&mut field_el, "fieldPath", field.as_str());
                select.children.push(XMLNode::Element(field_el));
            }
            search.children.push(XMLNode::Element(select));
        }

        if self.has_criteria() {
            let mut expert = xml::element(SEARCH_NS, "expert");
            for term in &self.terms {
                expert.children.push(XMLNode::Element(term.clone()));
            }
            if let Some(nested) = self.fold_open() {
                expert.children.push(XMLNode::Element(nested));
            }
            search.children.push(XMLNode::Element(expert));
        }

        if let Some(sort) = &self.sort {
            search.children.push(XMLNode::Element(sort.clone()));
        }

        let mut module = xml::element(SEARCH_NS, "module");
        xml::set_attr(&mut module, "name", self.module.as_str());
        module.children.push(XMLNode::Element(search));
        let mut modules = xml::element(SEARCH_NS, "modules");
        modules.children.push(XMLNode::Element(module));
        let mut root = xml::document_root(SEARCH_NS, "application");
        root.children.push(XMLNode::Element(modules));
        root
    }

    // Innermost open conjunction is the last one; each is nested in its predecessor.
    fn fold_open(&self) -> Option<Element> {
        self.open.iter().rev().fold(None, |inner, conjunction| {
            let mut outer = conjunction.clone();
            if let Some(inner) = inner {
                outer.children.push(XMLNode::Element(inner));
            }
            Some(outer)
        })
    }

    /// Checks the request against the search document structure.
    ///
    /// # Errors
    ///
    /// Returns the first structural violation, e.g. two top-level terms.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_search(&self.to_element())
    }

    /// Serializes the request.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::Write`] if serialization fails.
    pub fn to_xml_string(&self) -> Result<String, XmlError> {
        xml::to_string(&self.to_element())
    }

    /// Writes the request to a file.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::Io`] on file system errors.
    pub fn to_file(&self, path: &Path) -> Result<(), XmlError> {
        xml::write_file(&self.to_element(), path)
    }
}

// Parsed elements carry every namespace in scope; the rebuilt root declares its own.
fn detach(mut el: Element) -> Element {
    xml::walk_mut(&mut el, &mut |e| e.namespaces = None);
    el
}
