//! Refresh object records whose approved assets changed after them.
//!
//! The public portal only republishes an asset when its object record
//! changes. For every object in a pack file this module looks up linked
//! Multimedia items carrying the SMB-digital approval; when such an asset was
//! modified after the object, the object's `ObjCategoryVoc` is written back
//! unchanged, which bumps the object's modification date.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use xmltree::{Element, XMLNode};

use crate::client::{ApiError, MpApi};
use crate::constants::MODULE_NS;
use crate::module::Module;
use crate::sar::LAST_MODIFIED;
use crate::xml::{self, XmlError, attr, children};

/// Vocabulary id of the approval type "SMB-digital".
pub const APPROVAL_TYPE_SMB_DIGITAL: &str = "1816002";

/// Vocabulary id of the approval status "granted".
pub const APPROVAL_GRANTED: &str = "4160027";

/// Field re-uploaded to touch an object.
pub const TOUCH_FIELD: &str = "ObjCategoryVoc";

/// Errors raised while touching objects.
#[derive(Debug, Error)]
pub enum TouchError {
    /// A request failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A document could not be read or built.
    #[error(transparent)]
    Xml(#[from] XmlError),

    /// The fetched object has no field to re-upload.
    #[error("object {id} has no ObjCategoryVoc")]
    MissingField {
        /// Object id.
        id: String,
    },
}

/// Counts and ids collected while analysing a pack file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TouchReport {
    /// Object items in the input.
    pub object_items: usize,
    /// Multimedia items in the input.
    pub multimedia_items: usize,
    /// Object/asset links where the asset is SMB-digital approved.
    pub approved_assets: usize,
    /// Objects older than one of their approved assets.
    pub stale_objects: Vec<String>,
    /// Objects actually touched.
    pub touched: Vec<String>,
}

fn vocabulary_item_ids<'a>(
    group_item: &'a Element,
    reference: &'a str,
) -> impl Iterator<Item = &'a str> + 'a {
    children(group_item, "vocabularyReference")
        .filter(move |v| attr(v, "name") == Some(reference))
        .flat_map(|v| children(v, "vocabularyReferenceItem"))
        .filter_map(|item| attr(item, "id"))
}

/// Whether a Multimedia item carries a granted SMB-digital approval.
#[must_use]
pub fn is_smb_approved(item: &Element) -> bool {
    children(item, "repeatableGroup")
        .filter(|g| attr(g, "name") == Some("MulApprovalGrp"))
        .flat_map(|g| children(g, "repeatableGroupItem"))
        .any(|entry| {
            vocabulary_item_ids(entry, "TypeVoc").any(|id| id == APPROVAL_TYPE_SMB_DIGITAL)
                && vocabulary_item_ids(entry, "ApprovalVoc").any(|id| id == APPROVAL_GRANTED)
        })
}

fn linked_assets(object: &Element) -> impl Iterator<Item = &str> {
    children(object, "moduleReference")
        .filter(|r| attr(r, "name") == Some("ObjMultimediaRef"))
        .flat_map(|r| children(r, "moduleReferenceItem"))
        .filter_map(|r| attr(r, "moduleItemId"))
}

/// Finds objects that are older than one of their approved assets.
#[must_use]
pub fn analyze(data: &Module) -> TouchReport {
    let mut report = TouchReport {
        object_items: data.actual_size("Object"),
        multimedia_items: data.actual_size("Multimedia"),
        ..TouchReport::default()
    };

    for object in data.items("Object") {
        let Some(object_id) = attr(object, "id") else {
            continue;
        };
        let Some(object_modified) = xml::field_value(object, "systemField", LAST_MODIFIED) else {
            warn!(id = object_id, "object without __lastModified, skipped");
            continue;
        };
        let mut stale = false;
        for asset_id in linked_assets(object) {
            let Some(asset) = data
                .item("Multimedia", asset_id)
                .filter(|asset| is_smb_approved(asset))
            else {
                continue;
            };
            report.approved_assets += 1;
            let asset_modified = xml::field_value(asset, "systemField", LAST_MODIFIED);
            if asset_modified.is_some_and(|m| m > object_modified) {
                debug!(object = object_id, asset = asset_id, "object older than asset");
                stale = true;
            }
        }
        if stale {
            report.stale_objects.push(object_id.to_string());
        }
    }
    report
}

/// Builds the update document re-uploading `field` of a fetched object.
///
/// # Errors
///
/// Returns [`TouchError::MissingField`] if the object lacks the field.
pub fn touch_document(object: &Module, id: &str) -> Result<String, TouchError> {
    let field = object
        .item("Object", id)
        .or_else(|| object.items("Object").next())
        .and_then(|item| {
            children(item, "vocabularyReference").find(|v| attr(v, "name") == Some(TOUCH_FIELD))
        })
        .ok_or_else(|| TouchError::MissingField { id: id.to_string() })?;

    let mut field = field.clone();
    xml::walk_mut(&mut field, &mut |e| e.namespaces = None);

    let mut item = xml::element(MODULE_NS, "moduleItem");
    xml::set_attr(&mut item, "id", id);
    item.children.push(XMLNode::Element(field));
    let mut module = xml::element(MODULE_NS, "module");
    xml::set_attr(&mut module, "name", "Object");
    module.children.push(XMLNode::Element(item));
    let mut modules = xml::element(MODULE_NS, "modules");
    modules.children.push(XMLNode::Element(module));
    let mut root = xml::document_root(MODULE_NS, "application");
    root.children.push(XMLNode::Element(modules));
    Ok(xml::to_string(&root)?)
}

/// Re-uploads the category of object `id` as fetched right now.
///
/// # Errors
///
/// Returns [`TouchError`] on request failures or when the field is missing.
#[instrument(skip(api))]
pub async fn touch_object(api: &MpApi, id: &str) -> Result<(), TouchError> {
    let object = api.get_item("Object", id).await?;
    let document = touch_document(&object, id)?;
    api.update_item("Object", id, document).await?;
    info!(id, "touched object");
    Ok(())
}

/// Analyses `data` and, with `act`, touches every stale object once.
///
/// # Errors
///
/// Returns the first [`TouchError`]; objects touched before it stay touched.
pub async fn run(api: &MpApi, data: &Module, act: bool) -> Result<TouchReport, TouchError> {
    let mut report = analyze(data);
    info!(
        objects = report.object_items,
        assets = report.multimedia_items,
        approved = report.approved_assets,
        stale = report.stale_objects.len(),
        act,
        "analysed pack"
    );
    if act {
        for id in report.stale_objects.clone() {
            touch_object(api, &id).await?;
            report.touched.push(id);
        }
    }
    Ok(report)
}
