use tracing::debug;
use xmltree::{Element, XMLNode};

use crate::xml::{self, attr, children, children_mut};

/// Repeatable groups that never leave the export.
pub const NON_PUBLIC_GROUPS: &[&str] = &["ObjValuationGrp"];

pub(super) fn clean(root: &mut Element) {
    let mut dropped_groups = 0usize;
    xml::walk_mut(root, &mut |el| {
        el.attributes.shift_remove("uuid");
        dropped_groups += xml::remove_children(el, |c| {
            c.name == "repeatableGroup"
                && attr(c, "name").is_some_and(|n| NON_PUBLIC_GROUPS.contains(&n))
        });
    });

    let Some(modules) = xml::child_mut(root, "modules") else {
        return;
    };
    for module in children_mut(modules, "module") {
        sort_items(module);
        let count = children(module, "moduleItem").count();
        xml::set_attr(module, "totalSize", count.to_string());
    }
    debug!(dropped_groups, "cleaned module document");
}

// Items without a numeric id go last, in their original order.
fn sort_items(module: &mut Element) {
    module.children.sort_by_key(|node| match node {
        XMLNode::Element(item) => attr(item, "id")
            .and_then(|id| id.parse::<u64>().ok())
            .unwrap_or(u64::MAX),
        _ => u64::MAX,
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::xml::parse_str;

    #[test]
    fn test_clean_removes_valuation_group_only() {
        let mut root = parse_str(
            r#"<application xmlns="http://www.zetcom.com/ria/ws/module"><modules>
                 <module name="Object"><moduleItem id="1">
                   <repeatableGroup name="ObjValuationGrp" size="1"/>
                   <repeatableGroup name="ObjDimAllGrp" size="1"/>
                 </moduleItem></module>
               </modules></application>"#,
        )
        .unwrap();
        clean(&mut root);
        let out = xml::to_string(&root).unwrap();
        assert!(!out.contains("ObjValuationGrp"), "{out}");
        assert!(out.contains("ObjDimAllGrp"), "{out}");
    }
}
