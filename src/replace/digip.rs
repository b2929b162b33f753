use chrono::{Local, NaiveDate};
use xmltree::{Element, XMLNode};

use super::{Action, ReplaceError, ReplacePlugin};
use crate::constants::MODULE_NS;
use crate::search::{Operator, Search};
use crate::touch::{APPROVAL_GRANTED, APPROVAL_TYPE_SMB_DIGITAL};
use crate::xml::{self, attr};

/// Current location of the Humboldt Forum objects.
const LOCATION_ID: &str = "4220557";

/// Multimedia type "Digitalisat p".
const TYPE_DIGITALISAT_P: &str = "4457921";

const APPROVAL_GROUP: &str = "MulApprovalGrp";

/// Grants the SMB-digital approval to "Digitalisat p" assets of objects at
/// one location that do not have it yet.
#[derive(Debug, Clone)]
pub struct DigiP {
    location: String,
    today: NaiveDate,
}

impl Default for DigiP {
    fn default() -> Self {
        Self {
            location: LOCATION_ID.to_string(),
            today: Local::now().date_naive(),
        }
    }
}

impl DigiP {
    /// Selects assets of objects at `location` instead of the default one.
    #[must_use]
    pub fn at_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// Date written into the approval entry.
    #[must_use]
    pub fn dated(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    fn approval_document(&self, id: &str, user: &str) -> Result<String, ReplaceError> {
        let mut entry = xml::element(MODULE_NS, "repeatableGroupItem");
        for (data_type, name, value) in [
            ("Date", "ModifiedDateDat", self.today.format("%Y-%m-%d").to_string()),
            ("Varchar", "ModifiedByTxt", user.to_string()),
            ("Long", "SortLnu", "1".to_string()),
        ] {
            let mut field = xml::element(MODULE_NS, "dataField");
            xml::set_attr(&mut field, "dataType", data_type);
            xml::set_attr(&mut field, "name", name);
            field
                .children
                .push(XMLNode::Element(xml::text_element(MODULE_NS, "value", &value)));
            entry.children.push(XMLNode::Element(field));
        }
        entry.children.push(XMLNode::Element(vocabulary_reference(
            "TypeVoc",
            "62650",
            "MulApprovalTypeVgr",
            "2600647",
        )));
        entry.children.push(XMLNode::Element(vocabulary_reference(
            "ApprovalVoc",
            APPROVAL_TYPE_SMB_DIGITAL,
            "MulApprovalVgr",
            APPROVAL_GRANTED,
        )));

        let mut group = xml::element(MODULE_NS, "repeatableGroup");
        xml::set_attr(&mut group, "name", APPROVAL_GROUP);
        group.children.push(XMLNode::Element(entry));
        let mut item = xml::element(MODULE_NS, "moduleItem");
        xml::set_attr(&mut item, "id", id);
        item.children.push(XMLNode::Element(group));
        let mut module = xml::element(MODULE_NS, "module");
        xml::set_attr(&mut module, "name", self.module());
        module.children.push(XMLNode::Element(item));
        let mut modules = xml::element(MODULE_NS, "modules");
        modules.children.push(XMLNode::Element(module));
        let mut root = xml::document_root(MODULE_NS, "application");
        root.children.push(XMLNode::Element(modules));
        Ok(xml::to_string(&root)?)
    }
}

fn vocabulary_reference(name: &str, id: &str, instance: &str, item_id: &str) -> Element {
    let mut item = xml::element(MODULE_NS, "vocabularyReferenceItem");
    xml::set_attr(&mut item, "id", item_id);
    let mut reference = xml::element(MODULE_NS, "vocabularyReference");
    xml::set_attr(&mut reference, "name", name);
    xml::set_attr(&mut reference, "id", id);
    xml::set_attr(&mut reference, "instanceName", instance);
    reference.children.push(XMLNode::Element(item));
    reference
}

impl ReplacePlugin for DigiP {
    fn name(&self) -> &'static str {
        "digip"
    }

    fn module(&self) -> &'static str {
        "Multimedia"
    }

    fn search(&self, limit: i64) -> Search {
        let mut query = Search::new(self.module());
        query
            .set_limit(limit)
            .and()
            .add_criterion(
                Operator::EqualsField,
                "MulObjectRef.ObjCurrentLocationVoc",
                self.location.as_str(),
            )
            .add_criterion(Operator::EqualsField, "MulTypeVoc", TYPE_DIGITALISAT_P)
            .add_criterion(
                Operator::NotEqualsField,
                "MulApprovalGrp.TypeVoc",
                APPROVAL_TYPE_SMB_DIGITAL,
            );
        query
    }

    fn on_item(&self, item: &Element, user: &str) -> Result<Option<Action>, ReplaceError> {
        let Some(id) = attr(item, "id") else {
            return Ok(None);
        };
        let module = self.module();
        Ok(Some(Action::CreateRepeatableGroup {
            module: module.to_string(),
            id: id.to_string(),
            group: APPROVAL_GROUP.to_string(),
            xml: self.approval_document(id, user)?,
            success: format!("{module} {id}: set asset smbfreigabe"),
        }))
    }
}
