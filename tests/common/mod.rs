//! Shared helpers for the HTTP integration tests.

#![allow(dead_code)]

use std::io::{Cursor, Read};
use std::net::SocketAddr;
use std::sync::Arc;

use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use tempfile::TempDir;

use codevault::vault::BlobStore;
use codevault::web::handlers::{ApiState, StorageState};
use codevault::web::router::{create_api_router, create_storage_router};
use codevault::web::{StorageClient, StorageServer};
use codevault::config::StorageConfig;
use codevault::Database;

/// Upload limit used by the test servers.
pub const TEST_UPLOAD_LIMIT: usize = 4 * 1024 * 1024;

/// Storage tier driven in-process by `axum-test`.
pub struct StorageFixture {
    pub server: TestServer,
    pub store: BlobStore,
    _root: TempDir,
}

/// Create a storage tier router over a fresh temporary root.
pub fn storage_fixture() -> StorageFixture {
    let root = TempDir::new().expect("Failed to create temp dir");
    let store = BlobStore::new(root.path()).expect("Failed to create blob store");
    let state = Arc::new(StorageState::new(store.clone()));
    let server = TestServer::new(create_storage_router(state, TEST_UPLOAD_LIMIT))
        .expect("Failed to create test server");

    StorageFixture {
        server,
        store,
        _root: root,
    }
}

/// API tier in front of a real storage tier listening on an ephemeral port.
pub struct ApiFixture {
    pub server: TestServer,
    pub db: Database,
    pub store: BlobStore,
    pub storage: StorageClient,
    pub storage_addr: SocketAddr,
    _root: TempDir,
}

/// Start a storage tier on 127.0.0.1:0 and an API tier router in front of it.
pub async fn api_fixture() -> ApiFixture {
    let root = TempDir::new().expect("Failed to create temp dir");
    let config = StorageConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        root: root.path().to_string_lossy().into_owned(),
    };
    let storage_addr = StorageServer::new(&config, TEST_UPLOAD_LIMIT)
        .expect("Failed to create storage server")
        .run_with_addr()
        .await
        .expect("Failed to start storage server");

    let store = BlobStore::new(root.path()).expect("Failed to create blob store");
    let storage = StorageClient::new(&format!("http://{storage_addr}"))
        .expect("Failed to create storage client");
    let db = Database::open_in_memory()
        .await
        .expect("Failed to create test database");

    let state = Arc::new(ApiState::new(db.clone(), storage.clone()));
    let server = TestServer::new(create_api_router(state, &[], TEST_UPLOAD_LIMIT))
        .expect("Failed to create test server");

    ApiFixture {
        server,
        db,
        store,
        storage,
        storage_addr,
        _root: root,
    }
}

/// A file part named `name` with `content`.
pub fn file_part(name: &str, content: impl Into<Vec<u8>>) -> Part {
    Part::bytes(content.into()).file_name(name)
}

/// Add a file to an upload form, with an optional relative path override.
pub fn add_file(form: MultipartForm, name: &str, path: Option<&str>, content: &[u8]) -> MultipartForm {
    let form = match path {
        Some(path) => form.add_text(format!("path_{name}"), path),
        None => form,
    };
    form.add_part("files", file_part(name, content.to_vec()))
}

/// Entry names of a ZIP archive, in archive order.
pub fn zip_entries(bytes: &[u8]) -> Vec<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).expect("invalid zip");
    (0..archive.len())
        .map(|i| archive.by_index(i).expect("bad entry").name().to_string())
        .collect()
}

/// Content of one ZIP entry.
pub fn zip_entry(bytes: &[u8], name: &str) -> Vec<u8> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).expect("invalid zip");
    let mut entry = archive.by_name(name).expect("missing entry");
    let mut content = Vec::new();
    entry.read_to_end(&mut content).expect("failed to read entry");
    content
}
