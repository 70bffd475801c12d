use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::features::auth::Role;
use crate::features::files::models::{File, FileCategory};

/// Upload file request DTO for OpenAPI documentation
/// Note: This struct is for Swagger UI documentation only.
/// The actual handler uses axum's Multipart extractor directly.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
#[schema(rename_all = "camelCase")]
pub struct UploadFileDto {
    /// The file to upload
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub file: String,
    /// DOCUMENT, PHOTO or OTHER (defaults to OTHER)
    #[schema(example = "DOCUMENT")]
    pub category: Option<String>,
    /// Owning project, required for documents
    #[schema(example = "P1")]
    pub project_id: Option<String>,
    /// Identity of the uploader
    #[schema(example = "U1")]
    pub uploaded_by: String,
    /// OWNER, CONTRACTOR, SALESPERSON or CUSTOMER
    #[schema(example = "CONTRACTOR")]
    pub uploader_role: Option<String>,
}

/// Validated upload handed to the service
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file_name: String,
    pub content_type: String,
    pub category: FileCategory,
    pub project_id: String,
    pub uploaded_by: String,
    pub uploader_role: Option<Role>,
    pub data: Vec<u8>,
}

/// Metadata view of a stored file
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadataDto {
    pub id: Uuid,
    pub file_name: String,
    pub content_type: String,
    pub category: FileCategory,
    pub project_id: String,
    pub uploaded_by: String,
    pub uploader_role: Option<Role>,
    pub size: i64,
    /// Resource URL of the file, `/files/{id}`
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub is_archived: bool,
}

impl From<&File> for FileMetadataDto {
    fn from(file: &File) -> Self {
        Self {
            id: file.id,
            file_name: file.file_name.clone(),
            content_type: file.content_type.clone(),
            category: file.category,
            project_id: file.project_id.clone(),
            uploaded_by: file.uploaded_by.clone(),
            uploader_role: file.uploader_role,
            size: file.size,
            url: file.url(),
            created_at: file.created_at,
            is_archived: file.is_archived,
        }
    }
}

/// Request body for soft-deleting a file
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteFileDto {
    /// UUID of the principal performing the delete
    #[serde(default)]
    #[validate(length(min = 1, message = "deletedBy is required"))]
    pub deleted_by: String,
}

/// Request body for archiving a file
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveFileDto {
    /// UUID of the principal performing the archive
    #[serde(default)]
    #[validate(length(min = 1, message = "archivedBy is required"))]
    pub archived_by: String,
}

/// Caller identity passed as query parameters
#[derive(Debug, Default, Deserialize, IntoParams)]
#[allow(dead_code)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct RequesterQuery {
    /// Viewer role; enables role-checked access when present
    pub role: Option<String>,
    /// Viewer identity
    pub user_id: Option<String>,
}

/// Query parameters of the ZIP export
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ZipQuery {
    pub role: Option<String>,
    pub user_id: Option<String>,
    /// Name used for the archive file instead of the project id
    pub display_name: Option<String>,
}

/// Result of a reconciliation run
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileResponseDto {
    pub message: String,
    pub files_reconciled: usize,
    pub project_id: String,
}

/// Raw bytes of a stored file
#[derive(Debug, Clone)]
pub struct FileContent {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// A finished ZIP export
#[derive(Debug, Clone)]
pub struct ProjectArchive {
    pub file_name: String,
    pub data: Vec<u8>,
}

/// Content types accepted for DOCUMENT uploads
pub const ALLOWED_DOCUMENT_TYPES: &[&str] = &[
    "application/pdf",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "text/plain",
    "application/json",
    "application/octet-stream",
];

/// Content types accepted for PHOTO uploads
pub const ALLOWED_PHOTO_TYPES: &[&str] = &["image/png", "image/jpeg", "image/webp", "video/mp4"];

/// Check a content type against the allow list of a category.
///
/// Parameters such as `; charset=utf-8` are ignored. OTHER accepts anything.
pub fn is_content_type_allowed(category: FileCategory, content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match category {
        FileCategory::Document => ALLOWED_DOCUMENT_TYPES.contains(&essence.as_str()),
        FileCategory::Photo => ALLOWED_PHOTO_TYPES.contains(&essence.as_str()),
        FileCategory::Other => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_content_type_allowed() {
        assert!(is_content_type_allowed(FileCategory::Document, "application/pdf"));
        assert!(is_content_type_allowed(
            FileCategory::Document,
            "text/plain; charset=utf-8"
        ));
        assert!(!is_content_type_allowed(FileCategory::Document, "image/png"));
        assert!(is_content_type_allowed(FileCategory::Photo, "IMAGE/JPEG"));
        assert!(!is_content_type_allowed(FileCategory::Photo, "application/pdf"));
        assert!(is_content_type_allowed(FileCategory::Other, "application/x-anything"));
    }

    #[test]
    fn test_delete_dto_defaults_to_empty_actor() {
        let dto: DeleteFileDto = serde_json::from_str("{}").unwrap();
        assert!(dto.validate().is_err());

        let dto: DeleteFileDto =
            serde_json::from_str(r#"{"deletedBy":"6f1c2a4e-3b1d-4c55-9a61-0d3c7e2f8b90"}"#)
                .unwrap();
        assert!(dto.validate().is_ok());
    }

    #[test]
    fn test_metadata_dto_is_camel_case() {
        let json = serde_json::to_value(FileMetadataDto {
            id: Uuid::nil(),
            file_name: "a.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            category: FileCategory::Document,
            project_id: "P1".to_string(),
            uploaded_by: "U1".to_string(),
            uploader_role: Some(Role::Contractor),
            size: 3,
            url: "/files/00000000-0000-0000-0000-000000000000".to_string(),
            created_at: Utc::now(),
            is_archived: false,
        })
        .unwrap();

        assert_eq!(json["fileName"], "a.pdf");
        assert_eq!(json["category"], "DOCUMENT");
        assert_eq!(json["uploaderRole"], "CONTRACTOR");
        assert_eq!(json["isArchived"], false);
    }
}
