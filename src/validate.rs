//! Structural validation of module and search documents.
//!
//! The vendor publishes XSD schemas for both document kinds; the checks here
//! cover the structure this crate produces and consumes, so a document that
//! passes can be sent to (or was plausibly returned by) the API.

use std::fmt;

use thiserror::Error;
use xmltree::Element;

use crate::constants::{MODULE_NS, SEARCH_NS};
use crate::search::Operator;
use crate::xml::{attr, children, elements};

/// A document violates the expected structure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind} document at {path}: {reason}")]
pub struct ValidationError {
    /// Which kind of document was validated.
    pub kind: DocumentKind,
    /// Slash-separated element path where the violation was found.
    pub path: String,
    /// What is wrong.
    pub reason: String,
}

/// The two document kinds exchanged with the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// Record data (`module` namespace).
    Module,
    /// Search request (`search` namespace).
    Search,
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Module => write!(f, "module"),
            Self::Search => write!(f, "search"),
        }
    }
}

struct Checker {
    kind: DocumentKind,
}

impl Checker {
    fn fail(&self, path: &str, reason: impl Into<String>) -> ValidationError {
        ValidationError {
            kind: self.kind,
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    fn root<'a>(&self, root: &'a Element, ns: &str) -> Result<&'a Element, ValidationError> {
        if root.name != "application" {
            return Err(self.fail(
                &root.name,
                format!("root element must be 'application', found '{}'", root.name),
            ));
        }
        if root.namespace.as_deref() != Some(ns) {
            return Err(self.fail("/application", format!("root must be in namespace {ns}")));
        }
        let mut modules = children(root, "modules");
        let Some(first) = modules.next() else {
            return Err(self.fail("/application", "missing 'modules' element"));
        };
        if modules.next().is_some() {
            return Err(self.fail("/application", "more than one 'modules' element"));
        }
        if let Some(other) = elements(root).find(|c| c.name != "modules") {
            return Err(self.fail(
                "/application",
                format!("unexpected element '{}'", other.name),
            ));
        }
        Ok(first)
    }

    fn numeric_attr(
        &self,
        el: &Element,
        name: &str,
        path: &str,
        allow_negative: bool,
    ) -> Result<(), ValidationError> {
        let Some(value) = attr(el, name) else {
            return Ok(());
        };
        let ok = if allow_negative {
            value.parse::<i64>().is_ok()
        } else {
            value.parse::<u64>().is_ok()
        };
        if ok {
            Ok(())
        } else {
            Err(self.fail(path, format!("attribute '{name}' is not a number: '{value}'")))
        }
    }

    fn module_name<'a>(&self, module: &'a Element, path: &str) -> Result<&'a str, ValidationError> {
        match attr(module, "name") {
            Some(name) if !name.trim().is_empty() => Ok(name),
            _ => Err(self.fail(path, "module without a name")),
        }
    }
}

/// Validates a module (record data) document.
///
/// # Errors
///
/// Returns a [`ValidationError`] describing the first violation found.
pub fn validate_module(root: &Element) -> Result<(), ValidationError> {
    let checker = Checker {
        kind: DocumentKind::Module,
    };
    let modules = checker.root(root, MODULE_NS)?;

    for module in elements(modules) {
        if module.name != "module" {
            return Err(checker.fail(
                "/application/modules",
                format!("unexpected element '{}'", module.name),
            ));
        }
        let name = checker.module_name(module, "/application/modules/module")?;
        let path = format!("/application/modules/module[{name}]");
        checker.numeric_attr(module, "totalSize", &path, false)?;

        for item in elements(module) {
            if item.name != "moduleItem" {
                return Err(checker.fail(&path, format!("unexpected element '{}'", item.name)));
            }
            checker.numeric_attr(item, "id", &format!("{path}/moduleItem"), false)?;
        }
    }
    Ok(())
}

/// Validates a search request document.
///
/// # Errors
///
/// Returns a [`ValidationError`] describing the first violation found.
pub fn validate_search(root: &Element) -> Result<(), ValidationError> {
    let checker = Checker {
        kind: DocumentKind::Search,
    };
    let modules = checker.root(root, SEARCH_NS)?;

    let mut any_module = false;
    for module in elements(modules) {
        if module.name != "module" {
            return Err(checker.fail(
                "/application/modules",
                format!("unexpected element '{}'", module.name),
            ));
        }
        any_module = true;
        let name = checker.module_name(module, "/application/modules/module")?;
        let path = format!("/application/modules/module[{name}]");

        let searches: Vec<&Element> = elements(module).collect();
        let [search] = searches.as_slice() else {
            return Err(checker.fail(&path, "module must contain exactly one 'search'"));
        };
        if search.name != "search" {
            return Err(checker.fail(&path, format!("unexpected element '{}'", search.name)));
        }
        let path = format!("{path}/search");
        checker.numeric_attr(search, "limit", &path, true)?;
        checker.numeric_attr(search, "offset", &path, false)?;
        check_search_body(&checker, search, &path)?;
    }
    if !any_module {
        return Err(checker.fail("/application/modules", "no module to search"));
    }
    Ok(())
}

fn check_search_body(
    checker: &Checker,
    search: &Element,
    path: &str,
) -> Result<(), ValidationError> {
    let mut seen_select = false;
    let mut seen_expert = false;
    for part in elements(search) {
        match part.name.as_str() {
            "select" => {
                if seen_select || seen_expert {
                    return Err(checker.fail(path, "'select' must appear once, before 'expert'"));
                }
                seen_select = true;
                for field in elements(part) {
                    if field.name != "field" || attr(field, "fieldPath").is_none() {
                        return Err(checker.fail(
                            &format!("{path}/select"),
                            "select may only contain 'field' elements with a fieldPath",
                        ));
                    }
                }
            }
            "expert" => {
                if seen_expert {
                    return Err(checker.fail(path, "more than one 'expert' element"));
                }
                seen_expert = true;
                let expert_path = format!("{path}/expert");
                let terms: Vec<&Element> = elements(part).collect();
                let [term] = terms.as_slice() else {
                    return Err(checker.fail(
                        &expert_path,
                        format!("expert must contain exactly one term, found {}", terms.len()),
                    ));
                };
                check_term(checker, term, &expert_path)?;
            }
            "sort" => {}
            other => {
                return Err(checker.fail(path, format!("unexpected element '{other}'")));
            }
        }
    }
    Ok(())
}

fn check_term(checker: &Checker, term: &Element, parent: &str) -> Result<(), ValidationError> {
    let path = format!("{parent}/{}", term.name);
    let nested: Vec<&Element> = elements(term).collect();
    match term.name.as_str() {
        "and" | "or" => {
            if nested.is_empty() {
                return Err(checker.fail(&path, "conjunction without terms"));
            }
            for inner in nested {
                check_term(checker, inner, &path)?;
            }
            Ok(())
        }
        "not" => {
            let [inner] = nested.as_slice() else {
                return Err(checker.fail(
                    &path,
                    format!("'not' must contain exactly one term, found {}", nested.len()),
                ));
            };
            check_term(checker, inner, &path)
        }
        name => {
            let operator: Operator = name
                .parse()
                .map_err(|_| checker.fail(&path, format!("unknown operator '{name}'")))?;
            if attr(term, "fieldPath").is_none_or(str::is_empty) {
                return Err(checker.fail(&path, "criterion without fieldPath"));
            }
            let has_operand = attr(term, "operand").is_some();
            if operator.is_unary() && has_operand {
                return Err(checker.fail(&path, format!("'{name}' takes no operand")));
            }
            if !operator.is_unary() && !has_operand {
                return Err(checker.fail(&path, format!("'{name}' requires an operand")));
            }
            if !nested.is_empty() {
                return Err(checker.fail(&path, "criterion must not contain elements"));
            }
            Ok(())
        }
    }
}
