//! Integration tests for the job runner: caching, joining and resuming.

mod support;

use std::path::Path;

use chrono::NaiveDate;
use mpapi::{Chunky, Credentials, Mink, MinkError, Module, MpApi, Sar, parse_jobs};
use support::{
    credentials, empty, module_items, multimedia, multimedia_modified, objects, persons, search_path,
    xml_response,
};
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2021, 4, 1).expect("valid date")
}

fn mink(jobs: &str, credentials: &Credentials, base: &Path, chunk_size: u32) -> Mink {
    let jobs = parse_jobs(jobs).expect("job file parses");
    let api = MpApi::new(credentials).expect("client builds");
    Mink::new(jobs, base, Chunky::new(Sar::new(api), chunk_size)).with_date(date())
}

async fn mount_search(server: &MockServer, module: &str, body: String) {
    Mock::given(method("POST"))
        .and(path(search_path(module)))
        .respond_with(xml_response(body))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_get_item_is_cached_for_the_day() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ria-ws/application/module/Object/42"))
        .respond_with(xml_response(objects(&[("42", "10", "20")])))
        .expect(1)
        .mount(&server)
        .await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mink = mink("Einzel:\n    getItem Object 42\n", &credentials(&server), temp_dir.path(), 10);

    let first = mink.run_job("Einzel").await.expect("first run");
    let cached = temp_dir.path().join("Einzel/20210401/getItem-Object42.xml");
    assert_eq!(first.written, vec![cached.clone()]);
    assert_eq!(first.steps, 1);

    let second = mink.run_job("Einzel").await.expect("second run");
    assert!(second.written.is_empty(), "cache hit must not write");
    let item = Module::from_file(&cached).expect("cached item parses");
    assert_eq!(item.item_ids("Object"), vec!["42"]);
}

#[tokio::test]
async fn test_get_pack_attachments_and_pack() {
    let server = MockServer::start().await;
    mount_search(&server, "Person", persons(&["20"])).await;
    mount_search(&server, "Multimedia", multimedia(&["10", "11"])).await;
    mount_search(&server, "Object", objects(&[("2", "11", "20"), ("1", "10", "20")])).await;
    for id in ["10", "11"] {
        Mock::given(method("GET"))
            .and(path(format!("/ria-ws/application/module/Multimedia/{id}/attachment")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(format!("jpeg {id}").into_bytes()))
            .expect(1)
            .mount(&server)
            .await;
    }
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let jobs = "HF:\n    getPack group 162397 HF\n    attachments group 162397 HF\n    pack\n";
    let mink = mink(jobs, &credentials(&server), temp_dir.path(), 10);

    let report = mink.run_job("HF").await.expect("job runs");
    assert_eq!(report.jobs, vec!["HF"]);
    assert_eq!(report.steps, 3);

    let project = temp_dir.path().join("HF/20210401");
    let join = project.join("HF-join-group162397.xml");
    let pack = temp_dir.path().join("HF/HF20210401.xml");
    assert!(project.join("parts/HF-Multimedia-group162397.xml").exists());
    assert!(report.written.contains(&join));
    assert!(report.written.contains(&pack));

    let picture = temp_dir.path().join("HF/pix_HF/10.jpg");
    assert_eq!(std::fs::read_to_string(&picture).expect("attachment saved"), "jpeg 10");

    let joined = Module::from_file(&join).expect("join parses");
    assert_eq!(joined.item_ids("Object"), vec!["1", "2"], "clean sorts by id");
    assert!(!std::fs::read_to_string(&join).expect("join readable").contains("uuid="));

    let packed = Module::from_file(&pack).expect("pack parses");
    assert_eq!(packed.item_ids("Multimedia"), vec!["10", "11"]);

    // every request mock expects exactly one call; a rerun is served from disk
    let rerun = mink.run_job("HF").await.expect("rerun");
    assert!(!rerun.written.contains(&join));
    assert!(!rerun.written.contains(&pack));
}

#[tokio::test]
async fn test_chunk_resumes_at_last_chunk() {
    let server = MockServer::start().await;
    let pages: [(u64, String, u64); 3] = [
        (0, multimedia(&["10"]), 1),
        (1, multimedia(&["11"]), 2),
        (2, empty("Multimedia"), 2),
    ];
    for (offset, body, calls) in pages {
        Mock::given(method("POST"))
            .and(path(search_path("Multimedia")))
            .and(body_string_contains(format!(r#"offset="{offset}""#)))
            .respond_with(xml_response(body))
            .expect(calls)
            .mount(&server)
            .await;
    }
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mink = mink("Chunks:\n    chunk loc 4220557 Multimedia\n", &credentials(&server), temp_dir.path(), 1);
    let project = temp_dir.path().join("Chunks/20210401");

    let first = mink.run_job("Chunks").await.expect("first run");
    assert_eq!(
        first.written,
        vec![project.join("loc4220557-chunk1.zip"), project.join("loc4220557-chunk2.zip")]
    );

    let second = mink.run_job("Chunks").await.expect("resumed run");
    assert_eq!(second.written, vec![project.join("loc4220557-chunk2.zip")]);
    let chunk = Module::from_zip(&project.join("loc4220557-chunk2.zip")).expect("chunk parses");
    assert_eq!(chunk.item_ids("Multimedia"), vec!["11"]);
}

#[tokio::test]
async fn test_unknown_job_is_an_error() {
    let credentials = Credentials::new("http://127.0.0.1:9", "u", "p").expect("valid url");
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mink = mink("a:\n    pack\nb:\n    all a\n", &credentials, temp_dir.path(), 10);

    let err = mink.run_job("c").await.unwrap_err();
    assert!(matches!(err, MinkError::UnknownJob { ref known, .. } if known == "a, b"), "{err}");
    assert!(!temp_dir.path().join("c").exists());
}

#[tokio::test]
async fn test_nested_job_runs_in_its_own_project_dir() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ria-ws/application/module/Object/42"))
        .respond_with(xml_response(objects(&[("42", "10", "20")])))
        .expect(1)
        .mount(&server)
        .await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let jobs = "outer:\n    all inner\n    pack\ninner:\n    getItem Object 42\n";
    let mink = mink(jobs, &credentials(&server), temp_dir.path(), 10);

    let report = mink.run_job("outer").await.expect("job runs");
    assert_eq!(report.jobs, vec!["outer", "inner"]);
    assert_eq!(report.steps, 3);
    assert!(temp_dir.path().join("inner/20210401/getItem-Object42.xml").exists());
    assert!(!temp_dir.path().join("outer/20210401/getItem-Object42.xml").exists());
    assert!(report.written.contains(&temp_dir.path().join("outer/outer20210401.xml")));
}

#[tokio::test]
async fn test_exhibit_pack_adds_exhibition_and_registrar() {
    let server = MockServer::start().await;
    mount_search(&server, "Person", persons(&["20"])).await;
    mount_search(&server, "Multimedia", multimedia(&["10"])).await;
    mount_search(&server, "Object", objects(&[("1", "10", "20")])).await;
    Mock::given(method("POST"))
        .and(path(search_path("Exhibition")))
        .and(body_string_contains(r#"fieldPath="__id""#))
        .and(body_string_contains(r#"operand="20222""#))
        .respond_with(xml_response(module_items("Exhibition", &["20222"])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(search_path("Registrar")))
        .and(body_string_contains(r#"fieldPath="RegExhibitionRef.__id""#))
        .respond_with(xml_response(module_items("Registrar", &["305", "306"])))
        .expect(1)
        .mount(&server)
        .await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mink = mink("M39:\n    getPack exhibit 20222 M39\n", &credentials(&server), temp_dir.path(), 10);

    mink.run_job("M39").await.expect("job runs");
    let project = temp_dir.path().join("M39/20210401");
    assert!(project.join("parts/M39-Registrar-exhibit20222.xml").exists());
    let joined = Module::from_file(&project.join("M39-join-exhibit20222.xml")).expect("join parses");
    assert_eq!(
        joined.module_names(),
        vec!["Person", "Multimedia", "Object", "Exhibition", "Registrar"]
    );
    assert_eq!(joined.item_ids("Registrar"), vec!["305", "306"]);
}

#[tokio::test]
async fn test_attachments_since_only_fetch_changed_assets() {
    let server = MockServer::start().await;
    mount_search(&server, "Person", persons(&["20"])).await;
    mount_search(
        &server,
        "Multimedia",
        multimedia_modified(&[("10", "2021-02-01 10:00:00.000"), ("11", "2021-04-01 10:00:00.000")]),
    )
    .await;
    mount_search(&server, "Object", objects(&[("1", "10", "20"), ("2", "11", "20")])).await;
    for (id, calls) in [("10", 0), ("11", 1)] {
        Mock::given(method("GET"))
            .and(path(format!("/ria-ws/application/module/Multimedia/{id}/attachment")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jpeg".to_vec()))
            .expect(calls)
            .mount(&server)
            .await;
    }
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let jobs = "Upd:\n    getPack group 1 U 2021-03-01\n    attachments group 1 U 2021-03-01\n";
    let mink = mink(jobs, &credentials(&server), temp_dir.path(), 10);

    mink.run_job("Upd").await.expect("job runs");
    let pix = temp_dir.path().join("Upd/pix_update");
    assert!(pix.join("11.jpg").exists());
    assert!(!pix.join("10.jpg").exists());
    assert!(!temp_dir.path().join("Upd/pix_U").exists());
}

#[tokio::test]
async fn test_attachments_from_chunk_files() {
    let server = MockServer::start().await;
    let pages: [(u64, String); 3] = [
        (0, multimedia(&["10"])),
        (1, multimedia(&["11"])),
        (2, empty("Multimedia")),
    ];
    for (offset, body) in pages {
        Mock::given(method("POST"))
            .and(path(search_path("Multimedia")))
            .and(body_string_contains(format!(r#"offset="{offset}""#)))
            .respond_with(xml_response(body))
            .expect(1)
            .mount(&server)
            .await;
    }
    for id in ["10", "11"] {
        Mock::given(method("GET"))
            .and(path(format!("/ria-ws/application/module/Multimedia/{id}/attachment")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(format!("jpeg {id}").into_bytes()))
            .expect(1)
            .mount(&server)
            .await;
    }
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let jobs = "Pix:\n    chunk loc 4220557 Multimedia\n    attachments loc 4220557 chunk\n";
    let mink = mink(jobs, &credentials(&server), temp_dir.path(), 1);

    let report = mink.run_job("Pix").await.expect("job runs");
    let pix = temp_dir.path().join("Pix/pix_chunk");
    assert_eq!(std::fs::read_to_string(pix.join("11.jpg")).expect("saved"), "jpeg 11");
    assert!(report.written.contains(&pix.join("10.jpg")));
}

#[tokio::test]
async fn test_attachments_without_fetched_pack_is_missing_input() {
    let credentials = Credentials::new("http://127.0.0.1:9", "u", "p").expect("valid url");
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mink = mink("Pix:\n    attachments group 1 HF\n", &credentials, temp_dir.path(), 10);

    let err = mink.run_job("Pix").await.unwrap_err();
    assert!(matches!(err, MinkError::MissingInput { .. }), "{err}");
}
