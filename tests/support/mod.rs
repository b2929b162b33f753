//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use mpapi::Credentials;
use wiremock::MockServer;
use wiremock::ResponseTemplate;

pub const MODULE_NS: &str = "http://www.zetcom.com/ria/ws/module";

/// Path of the search endpoint of `module` on the mock server.
pub fn search_path(module: &str) -> String {
    format!("/ria-ws/application/module/{module}/search/")
}

pub fn credentials(server: &MockServer) -> Credentials {
    Credentials::new(server.uri(), "EM_tester", "secret").expect("valid mock server url")
}

pub fn xml_response(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "application/xml")
        .set_body_string(body)
}

fn document(module: &str, items: &str, count: usize) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<application xmlns="{MODULE_NS}"><modules><module name="{module}" totalSize="{count}">{items}</module></modules></application>"#
    )
}

/// Module document without items.
pub fn empty(module: &str) -> String {
    document(module, "", 0)
}

/// Objects as `(id, multimedia id, person id)`.
pub fn objects(items: &[(&str, &str, &str)]) -> String {
    let body: String = items
        .iter()
        .map(|(id, multimedia, person)| {
            format!(
                r#"<moduleItem id="{id}" uuid="u-{id}">
  <systemField name="__lastModified"><value>2021-01-01 10:00:00.000</value></systemField>
  <dataField name="ObjTitleTxt"><value>Object {id}</value></dataField>
  <moduleReference name="ObjMultimediaRef" targetModule="Multimedia"><moduleReferenceItem moduleItemId="{multimedia}"/></moduleReference>
  <moduleReference name="ObjPerAssociationRef" targetModule="Person"><moduleReferenceItem moduleItemId="{person}"/></moduleReference>
</moduleItem>"#
            )
        })
        .collect();
    document("Object", &body, items.len())
}

/// Multimedia items with an attachment named `{id}.jpg`.
pub fn multimedia(ids: &[&str]) -> String {
    let dated: Vec<(&str, &str)> = ids
        .iter()
        .map(|id| (*id, "2021-02-01 10:00:00.000"))
        .collect();
    multimedia_modified(&dated)
}

/// Multimedia items as `(id, __lastModified)`, each with an attachment.
pub fn multimedia_modified(items: &[(&str, &str)]) -> String {
    let body: String = items
        .iter()
        .map(|(id, modified)| {
            format!(
                r#"<moduleItem id="{id}" hasAttachments="true">
  <systemField name="__lastModified"><value>{modified}</value></systemField>
  <dataField name="MulOriginalFileTxt"><value>scan_{id}.jpg</value></dataField>
</moduleItem>"#
            )
        })
        .collect();
    document("Multimedia", &body, items.len())
}

pub fn persons(ids: &[&str]) -> String {
    let body: String = ids
        .iter()
        .map(|id| format!(r#"<moduleItem id="{id}"><dataField name="PerNennformTxt"><value>Person {id}</value></dataField></moduleItem>"#))
        .collect();
    document("Person", &body, ids.len())
}

/// Items of any module with a single data field.
pub fn module_items(module: &str, ids: &[&str]) -> String {
    let body: String = ids
        .iter()
        .map(|id| format!(r#"<moduleItem id="{id}"><dataField name="Title"><value>{module} {id}</value></dataField></moduleItem>"#))
        .collect();
    document(module, &body, ids.len())
}
