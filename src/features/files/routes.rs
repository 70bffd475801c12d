use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::features::files::handlers::{
    archive_file, delete_file, download_file, download_project_documents_zip, get_file,
    list_archived_files, list_project_documents, list_project_files, reconcile_project,
    unarchive_file, upload_file,
};
use crate::features::files::services::FileService;

/// Multipart overhead allowed on top of the upload limit
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

/// State shared by the file handlers
#[derive(Clone)]
pub struct FilesState {
    pub service: Arc<FileService>,
    pub max_upload_bytes: usize,
}

/// Create routes for the files feature
pub fn routes(file_service: Arc<FileService>, max_upload_bytes: usize) -> Router {
    let state = FilesState {
        service: file_service,
        max_upload_bytes,
    };

    Router::new()
        .route(
            "/files",
            post(upload_file).layer(DefaultBodyLimit::max(
                max_upload_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES),
            )),
        )
        .route("/files/{id}", get(get_file).delete(delete_file))
        .route("/files/{id}/download", get(download_file))
        .route("/files/{id}/archive", post(archive_file))
        .route("/files/{id}/unarchive", post(unarchive_file))
        .route("/projects/{project_id}/files", get(list_project_files))
        .route(
            "/projects/{project_id}/files/archived",
            get(list_archived_files),
        )
        .route("/projects/{project_id}/documents", get(list_project_documents))
        .route(
            "/projects/{project_id}/documents/zip",
            get(download_project_documents_zip),
        )
        .route("/admin/reconcile/{project_id}", post(reconcile_project))
        .with_state(state)
}
