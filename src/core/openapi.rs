use utoipa::{Modify, OpenApi};

use crate::features::auth::Role;
use crate::features::files::models::FileCategory;
use crate::features::files::{dtos as files_dtos, handlers as files_handlers};
use crate::shared::types::{ApiResponse, Meta};

#[derive(OpenApi)]
#[openapi(
    paths(
        // Files
        files_handlers::upload_file,
        files_handlers::get_file,
        files_handlers::download_file,
        files_handlers::delete_file,
        files_handlers::archive_file,
        files_handlers::unarchive_file,
        // Projects
        files_handlers::list_project_files,
        files_handlers::list_archived_files,
        files_handlers::list_project_documents,
        files_handlers::download_project_documents_zip,
        // Admin
        files_handlers::reconcile_project,
    ),
    components(
        schemas(
            // Shared
            Meta,
            // Files
            Role,
            FileCategory,
            files_dtos::UploadFileDto,
            files_dtos::FileMetadataDto,
            files_dtos::DeleteFileDto,
            files_dtos::ArchiveFileDto,
            files_dtos::ReconcileResponseDto,
            ApiResponse<files_dtos::FileMetadataDto>,
            ApiResponse<Vec<files_dtos::FileMetadataDto>>,
            ApiResponse<files_dtos::ReconcileResponseDto>,
        )
    ),
    tags(
        (name = "files", description = "File upload, retrieval and lifecycle"),
        (name = "projects", description = "Project file listings and document export"),
        (name = "admin", description = "Storage reconciliation"),
    ),
    info(
        title = "Files Service API",
        version = "0.1.0",
        description = "File metadata and object storage service",
    )
)]
pub struct ApiDoc;

/// Modifier to override OpenAPI info from config
pub struct SwaggerInfoModifier {
    pub title: String,
    pub version: String,
    pub description: String,
}

impl Modify for SwaggerInfoModifier {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi.info.title = self.title.clone();
        openapi.info.version = self.version.clone();
        openapi.info.description = Some(self.description.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_file_routes() {
        let doc = ApiDoc::openapi();
        for path in [
            "/files",
            "/files/{id}",
            "/files/{id}/download",
            "/files/{id}/archive",
            "/files/{id}/unarchive",
            "/projects/{project_id}/files",
            "/projects/{project_id}/files/archived",
            "/projects/{project_id}/documents",
            "/projects/{project_id}/documents/zip",
            "/admin/reconcile/{project_id}",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }

    #[test]
    fn test_swagger_info_modifier() {
        let mut doc = ApiDoc::openapi();
        SwaggerInfoModifier {
            title: "Files".to_string(),
            version: "9.9.9".to_string(),
            description: "desc".to_string(),
        }
        .modify(&mut doc);

        assert_eq!(doc.info.title, "Files");
        assert_eq!(doc.info.version, "9.9.9");
    }
}
