//! Storage tier HTTP tests.
//!
//! Drive the storage router directly: multipart ingestion, content reads,
//! downloads, archives and deletion.

mod common;

use axum::http::StatusCode;
use axum_test::multipart::MultipartForm;
use codevault::vault::{sanitize, CodebaseId};
use serde_json::Value;

use common::{add_file, file_part, storage_fixture, zip_entries, zip_entry, TEST_UPLOAD_LIMIT};

fn form_for(id: &CodebaseId) -> MultipartForm {
    MultipartForm::new().add_text("codebase_id", id.to_string())
}

#[tokio::test]
async fn test_store_and_read_back() {
    let fx = storage_fixture();
    let id = CodebaseId::new();

    let form = add_file(form_for(&id), "main.rs", Some("src/main.rs"), b"fn main() {}\n");
    let form = add_file(form, "README.md", None, b"# hello\n");

    let response = fx.server.post("/store").multipart(form).await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["codebase_id"], id.to_string());
    assert_eq!(body["message"], "Successfully stored 2 files (21 bytes total)");
    assert_eq!(body["files"][0]["path"], "src/main.rs");
    assert_eq!(body["files"][0]["name"], "main.rs");
    assert_eq!(body["files"][0]["size"], 13);
    assert_eq!(body["files"][1]["path"], "README.md");
    assert_eq!(body["rejected"], Value::Array(vec![]));

    let content = fx
        .server
        .get(&format!("/content/{id}"))
        .add_query_param("file", "src/main.rs")
        .await;
    content.assert_status_ok();
    let content: Value = content.json();
    assert_eq!(content["file_path"], "src/main.rs");
    assert_eq!(content["is_text"], true);
    assert_eq!(content["size"], 13);
    assert_eq!(content["content"], "fn main() {}\n");
    assert!(content.get("download_url").is_none());
}

#[tokio::test]
async fn test_traversal_entry_is_skipped() {
    let fx = storage_fixture();
    let id = CodebaseId::new();

    let form = add_file(form_for(&id), "a.txt", None, b"a");
    let form = add_file(form, "evil.txt", Some("../../etc/passwd"), b"evil");
    let form = add_file(form, "b.txt", Some("docs/b.txt"), b"b");

    let response = fx.server.post("/store").multipart(form).await;
    response.assert_status_ok();

    let body: Value = response.json();
    let paths: Vec<&str> = body["files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["path"].as_str().unwrap())
        .collect();
    assert_eq!(paths, vec!["a.txt", "docs/b.txt"]);
    assert_eq!(body["rejected"][0]["name"], "evil.txt");
    assert_eq!(body["rejected"][0]["reason"], "invalid_path");

    let listed = fx.store.list(&id).await.unwrap();
    assert_eq!(listed.len(), 2);

    let rejected = fx
        .server
        .get(&format!("/download/{id}"))
        .add_query_param("file", "../../etc/passwd")
        .await;
    rejected.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_all_rejected_removes_codebase() {
    let fx = storage_fixture();
    let id = CodebaseId::new();

    let form = add_file(form_for(&id), "x.txt", Some("../x.txt"), b"x");
    let form = add_file(form, "y.txt", Some("a/../../y.txt"), b"y");

    let response = fx.server.post("/store").multipart(form).await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "No valid files were uploaded");
    assert!(!fx.store.exists(&id).await);
}

#[tokio::test]
async fn test_duplicate_paths_keep_first_copy() {
    let fx = storage_fixture();
    let id = CodebaseId::new();

    let form = add_file(form_for(&id), "one.txt", Some("same.txt"), b"first");
    let form = add_file(form, "two.txt", Some("same.txt"), b"second");

    let response = fx.server.post("/store").multipart(form).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["files"].as_array().unwrap().len(), 1);
    assert_eq!(body["rejected"][0]["reason"], "duplicate");

    let download = fx
        .server
        .get(&format!("/download/{id}"))
        .add_query_param("file", "same.txt")
        .await;
    download.assert_status_ok();
    assert_eq!(download.as_bytes().as_ref(), b"first");
}

#[tokio::test]
async fn test_store_requires_codebase_id_first() {
    let fx = storage_fixture();

    let form = MultipartForm::new().add_part("files", file_part("a.txt", "a"));
    let response = fx.server.post("/store").multipart(form).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "Codebase ID is required");
}

#[tokio::test]
async fn test_store_rejects_malformed_id() {
    let fx = storage_fixture();

    let form = MultipartForm::new()
        .add_text("codebase_id", "../../tmp")
        .add_part("files", file_part("a.txt", "a"));
    let response = fx.server.post("/store").multipart(form).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "Invalid directory ID");
}

#[tokio::test]
async fn test_store_without_files() {
    let fx = storage_fixture();
    let id = CodebaseId::new();

    let response = fx.server.post("/store").multipart(form_for(&id)).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "No files uploaded");
    assert!(!fx.store.exists(&id).await);
}

#[tokio::test]
async fn test_oversized_file_aborts_batch() {
    let fx = storage_fixture();
    let id = CodebaseId::new();

    let big = vec![b'a'; TEST_UPLOAD_LIMIT + 1];
    let form = add_file(form_for(&id), "ok.txt", None, b"fine");
    let form = add_file(form, "big.bin", None, &big);

    let response = fx.server.post("/store").multipart(form).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json::<Value>()["error"],
        "File too large or invalid form data"
    );
    assert!(!fx.store.exists(&id).await);
}

#[tokio::test]
async fn test_oversized_path_field_aborts_batch() {
    let fx = storage_fixture();
    let id = CodebaseId::new();

    let long_path = "d/".repeat(TEST_UPLOAD_LIMIT / 2 + 1);
    let form = add_file(form_for(&id), "ok.txt", None, b"fine");
    let form = form.add_text("path_next.txt", long_path);

    let response = fx.server.post("/store").multipart(form).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json::<Value>()["error"],
        "File too large or invalid form data"
    );
    assert!(!fx.store.exists(&id).await);
}

#[tokio::test]
async fn test_binary_content_has_download_url() {
    let fx = storage_fixture();
    let id = CodebaseId::new();
    let png = [0x89u8, b'P', b'N', b'G', 0, 0, 0, 0x0d, 0xff, 0xfe];

    let form = add_file(form_for(&id), "logo.png", Some("img/logo.png"), &png);
    fx.server.post("/store").multipart(form).await.assert_status_ok();

    let content = fx
        .server
        .get(&format!("/content/{id}"))
        .add_query_param("file", "img/logo.png")
        .await;
    content.assert_status_ok();
    let content: Value = content.json();
    assert_eq!(content["is_text"], false);
    assert_eq!(
        content["content"],
        "Binary file - use download endpoint to get the file"
    );
    assert_eq!(
        content["download_url"],
        format!("/download/{id}?file=img%2Flogo.png")
    );

    let download = fx
        .server
        .get(&format!("/download/{id}"))
        .add_query_param("file", "img/logo.png")
        .await;
    download.assert_status_ok();
    assert_eq!(download.as_bytes().as_ref(), &png);
    assert_eq!(
        download.header("content-type"),
        "application/octet-stream"
    );
    assert_eq!(
        download.header("content-disposition"),
        "attachment; filename=\"logo.png\""
    );
}

#[tokio::test]
async fn test_content_errors() {
    let fx = storage_fixture();
    let id = CodebaseId::new();
    let form = add_file(form_for(&id), "a.txt", Some("dir/a.txt"), b"a");
    fx.server.post("/store").multipart(form).await.assert_status_ok();

    let missing_param = fx.server.get(&format!("/content/{id}")).await;
    missing_param.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(missing_param.json::<Value>()["error"], "File path is required");

    let missing_file = fx
        .server
        .get(&format!("/content/{id}"))
        .add_query_param("file", "dir/nope.txt")
        .await;
    missing_file.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(missing_file.json::<Value>()["error"], "File not found");

    let directory = fx
        .server
        .get(&format!("/content/{id}"))
        .add_query_param("file", "dir")
        .await;
    directory.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(
        directory.json::<Value>()["error"],
        "Cannot read directory as file"
    );

    let bad_id = fx
        .server
        .get("/content/not-a-uuid")
        .add_query_param("file", "dir/a.txt")
        .await;
    bad_id.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(bad_id.json::<Value>()["error"], "Invalid directory ID");
}

#[tokio::test]
async fn test_zip_archive() {
    let fx = storage_fixture();
    let id = CodebaseId::new();

    let form = add_file(form_for(&id), "a.txt", None, b"alpha");
    let form = add_file(form, "b.txt", Some("sub/b.txt"), b"beta");
    fx.server.post("/store").multipart(form).await.assert_status_ok();

    let response = fx.server.get(&format!("/zip/{id}")).await;
    response.assert_status_ok();
    assert_eq!(response.header("content-type"), "application/zip");
    assert_eq!(
        response.header("content-disposition").to_str().unwrap(),
        format!("attachment; filename=\"codebase-{id}.zip\"")
    );

    let bytes = response.as_bytes();
    assert_eq!(zip_entries(bytes), vec!["a.txt", "sub/", "sub/b.txt"]);
    assert_eq!(zip_entry(bytes, "sub/b.txt"), b"beta");
}

#[tokio::test]
async fn test_zip_unknown_codebase() {
    let fx = storage_fixture();

    let response = fx.server.get(&format!("/zip/{}", CodebaseId::new())).await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(response.json::<Value>()["error"], "Codebase not found");
}

#[tokio::test]
async fn test_list_files_and_codebases() {
    let fx = storage_fixture();
    let id = CodebaseId::new();

    let form = add_file(form_for(&id), "a.txt", Some("z/a.txt"), b"1");
    let form = add_file(form, "b.txt", None, b"22");
    fx.server.post("/store").multipart(form).await.assert_status_ok();

    let first: Value = fx.server.get(&format!("/files/{id}")).await.json();
    let second: Value = fx.server.get(&format!("/files/{id}")).await.json();
    assert_eq!(first, second);
    assert_eq!(first["directory_id"], id.to_string());
    assert_eq!(first["files"].as_array().unwrap().len(), 2);

    let codebases: Value = fx.server.get("/codebases").await.json();
    assert_eq!(codebases["codebases"][0]["directory_id"], id.to_string());
    assert_eq!(codebases["codebases"][0]["file_count"], 2);

    let unknown = fx.server.get(&format!("/files/{}", CodebaseId::new())).await;
    unknown.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_codebase() {
    let fx = storage_fixture();
    let id = CodebaseId::new();

    let form = add_file(form_for(&id), "a.txt", None, b"a");
    fx.server.post("/store").multipart(form).await.assert_status_ok();

    let response = fx.server.delete(&format!("/store/{id}")).await;
    response.assert_status_ok();
    assert!(!fx.store.exists(&id).await);

    let again = fx.server.delete(&format!("/store/{id}")).await;
    again.assert_status(StatusCode::NOT_FOUND);

    let path = sanitize("a.txt").unwrap();
    assert!(fx.store.get(&id, &path).await.is_err());
}

#[tokio::test]
async fn test_health() {
    let fx = storage_fixture();

    let response = fx.server.get("/health").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "ok");
}
