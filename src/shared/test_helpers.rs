use std::sync::Arc;

use axum::Router;

use crate::features::files::repositories::memory::InMemoryFileRepository;
use crate::features::files::{routes as files_routes, FileService};
use crate::modules::storage::memory::InMemoryObjectStore;

/// Upload limit used by router tests
pub const TEST_MAX_UPLOAD_BYTES: usize = 64 * 1024;

/// Files router wired to in-memory collaborators
pub struct TestApp {
    pub router: Router,
    pub repo: Arc<InMemoryFileRepository>,
    pub storage: Arc<InMemoryObjectStore>,
    pub max_upload_bytes: usize,
}

pub fn test_app() -> TestApp {
    let repo = Arc::new(InMemoryFileRepository::new());
    let storage = Arc::new(InMemoryObjectStore::new());
    let service = Arc::new(FileService::new(repo.clone(), storage.clone()));

    TestApp {
        router: files_routes(service, TEST_MAX_UPLOAD_BYTES),
        repo,
        storage,
        max_upload_bytes: TEST_MAX_UPLOAD_BYTES,
    }
}
