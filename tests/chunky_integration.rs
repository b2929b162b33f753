//! Integration tests for chunked retrieval against a mock API.

mod support;

use mpapi::{ApiError, ChunkRequest, Chunky, MpApi, QueryType, Sar};
use support::{credentials, empty, multimedia, objects, persons, search_path, xml_response};
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn chunky(server: &MockServer, chunk_size: u32) -> Chunky {
    let api = MpApi::new(&credentials(server)).expect("client builds");
    Chunky::new(Sar::new(api), chunk_size)
}

async fn mount_object_page(server: &MockServer, offset: u64, body: String) {
    Mock::given(method("POST"))
        .and(path(search_path("Object")))
        .and(body_string_contains(format!(r#"offset="{offset}""#)))
        .respond_with(xml_response(body))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_chunks_until_empty_page_with_related_items() {
    let server = MockServer::start().await;
    mount_object_page(&server, 0, objects(&[("1", "10", "20"), ("2", "11", "20")])).await;
    mount_object_page(&server, 2, objects(&[("3", "12", "21")])).await;
    mount_object_page(&server, 4, empty("Object")).await;
    Mock::given(method("POST"))
        .and(path(search_path("Multimedia")))
        .respond_with(xml_response(multimedia(&["10", "11"])))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(search_path("Person")))
        .respond_with(xml_response(persons(&["20"])))
        .expect(2)
        .mount(&server)
        .await;

    let chunky = chunky(&server, 2);
    let mut cursor = chunky.get_by_type(ChunkRequest::new(QueryType::Group, "162397"));

    let first = cursor.next_chunk().await.expect("first chunk").expect("has items");
    assert_eq!(first.item_ids("Object"), vec!["1", "2"]);
    assert_eq!(first.item_ids("Multimedia"), vec!["10", "11"]);
    assert_eq!(first.item_ids("Person"), vec!["20"]);
    assert_eq!(cursor.offset(), 2);

    let second = cursor.next_chunk().await.expect("second chunk").expect("has items");
    assert_eq!(second.item_ids("Object"), vec!["3"]);

    assert!(cursor.next_chunk().await.expect("empty page").is_none());
    // exhausted cursors do not ask again
    assert!(cursor.next_chunk().await.expect("done").is_none());
}

#[tokio::test]
async fn test_group_selection_is_sent_as_field_criterion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(search_path("Multimedia")))
        .and(body_string_contains("MulObjectRef.ObjObjectGroupsRef.__id"))
        .and(body_string_contains(r#"operand="162397""#))
        .respond_with(xml_response(empty("Multimedia")))
        .expect(1)
        .mount(&server)
        .await;

    let chunky = chunky(&server, 100);
    let request = ChunkRequest::new(QueryType::Group, "162397").target("Multimedia");
    let mut cursor = chunky.get_by_type(request);
    assert!(cursor.next_chunk().await.expect("request succeeds").is_none());
}

#[tokio::test]
async fn test_server_error_does_not_advance_cursor() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(search_path("Object")))
        .respond_with(ResponseTemplate::new(500).set_body_string("database offline"))
        .mount(&server)
        .await;

    let chunky = chunky(&server, 10);
    let mut cursor = chunky.get_by_type(ChunkRequest::new(QueryType::Location, "4220557").offset(30));
    let err = cursor.next_chunk().await.unwrap_err();
    assert!(
        matches!(err, ApiError::HttpStatus { status: 500, .. }),
        "unexpected error: {err}"
    );
    assert!(err.to_string().contains("database offline"));
    assert_eq!(cursor.offset(), 30);
}

#[tokio::test]
async fn test_rejected_credentials_are_reported_as_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(search_path("Object")))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let chunky = chunky(&server, 10);
    let err = chunky
        .fetch_part(&ChunkRequest::new(QueryType::Approval, "4460851"), 0)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::AuthRequired { .. }), "unexpected error: {err}");
}

#[tokio::test]
async fn test_saved_query_pages_through_saved_query_endpoint() {
    let server = MockServer::start().await;
    let pages: [(u64, String); 2] = [(0, multimedia(&["10"])), (1, empty("Multimedia"))];
    for (offset, body) in pages {
        Mock::given(method("POST"))
            .and(path("/ria-ws/application/module/Multimedia/search/savedQuery/4711"))
            .and(body_string_contains(format!(r#"offset="{offset}""#)))
            .and(body_string_contains(r#"limit="1""#))
            .respond_with(xml_response(body))
            .expect(1)
            .mount(&server)
            .await;
    }

    let chunky = chunky(&server, 1);
    let request = ChunkRequest::new(QueryType::SavedQuery, "4711")
        .target("Multimedia")
        .since(Some("2021-01-01".to_string()));
    let mut cursor = chunky.get_by_type(request);
    let chunk = cursor.next_chunk().await.expect("first page").expect("has items");
    assert_eq!(chunk.item_ids("Multimedia"), vec!["10"]);
    assert!(cursor.next_chunk().await.expect("empty page").is_none());

    // saved queries run on the server as stored; no date criterion is added
    let requests = server.received_requests().await.expect("recording enabled");
    assert_eq!(requests.len(), 2);
    for request in &requests {
        let body = String::from_utf8_lossy(&request.body);
        assert!(!body.contains("__lastModified"), "{body}");
    }
}

#[tokio::test]
async fn test_get_by_ids_sends_one_or_search() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(search_path("Person")))
        .and(body_string_contains("<or>"))
        .and(body_string_contains(r#"operand="20""#))
        .and(body_string_contains(r#"operand="21""#))
        .respond_with(xml_response(persons(&["20", "21"])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(search_path("Object")))
        .and(body_string_contains(r#"<equalsField fieldPath="__id" operand="1""#))
        .respond_with(xml_response(objects(&[("1", "10", "20")])))
        .expect(1)
        .mount(&server)
        .await;

    let sar = Sar::new(MpApi::new(&credentials(&server)).expect("client builds"));
    let found = sar
        .get_by_ids("Person", &["20".to_string(), "21".to_string()])
        .await
        .expect("search succeeds");
    assert_eq!(found.item_ids("Person"), vec!["20", "21"]);

    let single = sar.get_by_ids("Object", &["1".to_string()]).await.expect("search succeeds");
    assert_eq!(single.item_ids("Object"), vec!["1"]);

    // no ids, no request
    assert!(sar.get_by_ids("Multimedia", &[]).await.expect("no request").is_empty());
}

#[tokio::test]
async fn test_save_attachment_streams_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ria-ws/application/module/Multimedia/10/attachment"))
        .and(header("accept", "application/octet-stream"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"IMAGEDATA".to_vec()))
        .expect(1)
        .mount(&server)
        .await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let target = temp_dir.path().join("10.jpg");

    let api = MpApi::new(&credentials(&server)).expect("client builds");
    let saved = api
        .save_attachment("Multimedia", "10", &target)
        .await
        .expect("download succeeds");
    assert_eq!(saved, target);
    assert_eq!(std::fs::read(&target).expect("file written"), b"IMAGEDATA");
}

#[tokio::test]
async fn test_save_attachment_removes_truncated_file() {
    let server = MockServer::start().await;
    // announces more bytes than it sends, so the body stream fails
    Mock::given(method("GET"))
        .and(path("/ria-ws/application/module/Multimedia/10/attachment"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"IMA".to_vec())
                .insert_header("Content-Length", "4096"),
        )
        .mount(&server)
        .await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let target = temp_dir.path().join("10.jpg");

    let api = MpApi::new(&credentials(&server)).expect("client builds");
    let result = api.save_attachment("Multimedia", "10", &target).await;
    assert!(result.is_err(), "truncated body must fail: {result:?}");
    assert!(!target.exists(), "partial file must be removed");
}
