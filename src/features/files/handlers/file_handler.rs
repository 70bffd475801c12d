use axum::{
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::debug;
use uuid::Uuid;
use validator::Validate;

use crate::core::error::AppError;
use crate::core::extractor::{JsonOrDefault, MaybeRequester};
use crate::features::auth::{Requester, Role};
use crate::features::files::dtos::{
    is_content_type_allowed, ArchiveFileDto, DeleteFileDto, FileContent, FileMetadataDto,
    ReconcileResponseDto, RequesterQuery, UploadFileDto, UploadRequest, ZipQuery,
    ALLOWED_DOCUMENT_TYPES, ALLOWED_PHOTO_TYPES,
};
use crate::features::files::models::FileCategory;
use crate::features::files::routes::FilesState;
use crate::shared::types::{ApiResponse, Meta};
use crate::shared::validation::sanitize_filename;

/// Unparseable ids cannot name a file
fn parse_file_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::NotFound(format!("File {} not found", raw)))
}

fn multipart_error(context: &str, e: MultipartError) -> AppError {
    debug!("Failed to read {}: {}", context, e);
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Request body exceeds the upload limit".to_string())
    } else {
        AppError::BadRequest(format!("Failed to read {}: {}", context, e.body_text()))
    }
}

fn listing(files: Vec<FileMetadataDto>) -> Json<ApiResponse<Vec<FileMetadataDto>>> {
    let total = files.len() as i64;
    Json(ApiResponse::success(Some(files), None, Some(Meta { total })))
}

fn file_response(content: FileContent, attachment: bool) -> Response {
    let mut headers = vec![
        (header::CONTENT_TYPE, content.content_type),
        (header::ACCEPT_RANGES, "bytes".to_string()),
        (header::CACHE_CONTROL, "public, max-age=31536000".to_string()),
    ];

    if attachment {
        let fallback =
            sanitize_filename(&content.file_name).unwrap_or_else(|| "download".to_string());
        headers.push((
            header::CONTENT_DISPOSITION,
            format!(
                "attachment; filename=\"{}\"; filename*=UTF-8''{}",
                fallback,
                urlencoding::encode(&content.file_name)
            ),
        ));
    }

    let mut response = content.data.into_response();
    for (name, value) in headers {
        match value.parse() {
            Ok(value) => {
                response.headers_mut().insert(name, value);
            }
            Err(_) => debug!("Skipping invalid {} header value", name),
        }
    }
    response
}

async fn fetch(
    state: &FilesState,
    id: &str,
    requester: Option<Requester>,
) -> Result<FileContent, AppError> {
    let id = parse_file_id(id)?;
    match requester {
        Some(requester) => state.service.get_with_role_check(id, &requester).await,
        None => state.service.get(id).await,
    }
}

/// Upload a file
///
/// Accepts multipart/form-data with:
/// - `file`: The file to upload (required)
/// - `category`: DOCUMENT, PHOTO or OTHER (optional, defaults to OTHER)
/// - `projectId`: Owning project (required for documents)
/// - `uploadedBy`: Uploader identity (required)
/// - `uploaderRole`: OWNER, CONTRACTOR, SALESPERSON or CUSTOMER (optional)
#[utoipa::path(
    post,
    path = "/files",
    tag = "files",
    request_body(
        content = UploadFileDto,
        content_type = "multipart/form-data",
        description = "File upload form with category, project and uploader fields",
    ),
    responses(
        (status = 201, description = "File uploaded successfully", body = ApiResponse<FileMetadataDto>),
        (status = 400, description = "Invalid file or validation error"),
        (status = 413, description = "File too large"),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn upload_file(
    State(state): State<FilesState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<FileMetadataDto>>), AppError> {
    let mut file_data: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;
    let mut content_type: Option<String> = None;
    let mut category: Option<String> = None;
    let mut project_id = String::new();
    let mut uploaded_by = String::new();
    let mut uploader_role: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error("multipart data", e))?
    {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "file" => {
                let ct = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                let fname = field.file_name().map(|s| s.to_string()).unwrap_or_default();

                let data = field
                    .bytes()
                    .await
                    .map_err(|e| multipart_error("file data", e))?;

                file_data = Some(data.to_vec());
                file_name = Some(fname);
                content_type = Some(ct);
            }
            "category" | "projectId" | "uploadedBy" | "uploaderRole" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| multipart_error(&field_name, e))?;
                let text = text.trim().to_string();
                match field_name.as_str() {
                    "category" => category = Some(text).filter(|t| !t.is_empty()),
                    "projectId" => project_id = text,
                    "uploadedBy" => uploaded_by = text,
                    _ => uploader_role = Some(text).filter(|t| !t.is_empty()),
                }
            }
            _ => {
                debug!("Ignoring unknown field: {}", field_name);
            }
        }
    }

    let file_data =
        file_data.ok_or_else(|| AppError::BadRequest("File is required".to_string()))?;
    let file_name = file_name
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("Filename is required".to_string()))?;
    let content_type =
        content_type.ok_or_else(|| AppError::BadRequest("Content type is required".to_string()))?;

    if file_data.len() > state.max_upload_bytes {
        return Err(AppError::PayloadTooLarge(format!(
            "File too large. Maximum size is {} bytes ({} MB)",
            state.max_upload_bytes,
            state.max_upload_bytes / 1024 / 1024
        )));
    }

    let category = match category {
        Some(raw) => raw.parse::<FileCategory>().map_err(AppError::BadRequest)?,
        None => FileCategory::Other,
    };

    if !is_content_type_allowed(category, &content_type) {
        let allowed = match category {
            FileCategory::Document => ALLOWED_DOCUMENT_TYPES,
            _ => ALLOWED_PHOTO_TYPES,
        };
        return Err(AppError::BadRequest(format!(
            "File type '{}' is not allowed for {}. Allowed types: {}",
            content_type,
            category,
            allowed.join(", ")
        )));
    }

    let uploader_role = uploader_role
        .map(|raw| raw.parse::<Role>())
        .transpose()
        .map_err(AppError::BadRequest)?;

    let response = state
        .service
        .upload(UploadRequest {
            file_name,
            content_type,
            category,
            project_id,
            uploaded_by,
            uploader_role,
            data: file_data,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            Some(response),
            Some("File uploaded successfully".to_string()),
            None,
        )),
    ))
}

/// Get file content
///
/// With a `role` query parameter the caller's access is checked; files the
/// caller may not see are reported as not found.
#[utoipa::path(
    get,
    path = "/files/{id}",
    tag = "files",
    params(
        ("id" = String, Path, description = "File ID"),
        RequesterQuery
    ),
    responses(
        (status = 200, description = "Raw file content", content_type = "application/octet-stream"),
        (status = 404, description = "File not found"),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn get_file(
    State(state): State<FilesState>,
    Path(id): Path<String>,
    MaybeRequester(requester): MaybeRequester,
) -> Result<Response, AppError> {
    let content = fetch(&state, &id, requester).await?;
    Ok(file_response(content, false))
}

/// Download file content as an attachment
#[utoipa::path(
    get,
    path = "/files/{id}/download",
    tag = "files",
    params(
        ("id" = String, Path, description = "File ID"),
        RequesterQuery
    ),
    responses(
        (status = 200, description = "File attachment", content_type = "application/octet-stream"),
        (status = 404, description = "File not found"),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn download_file(
    State(state): State<FilesState>,
    Path(id): Path<String>,
    MaybeRequester(requester): MaybeRequester,
) -> Result<Response, AppError> {
    let content = fetch(&state, &id, requester).await?;
    Ok(file_response(content, true))
}

/// Soft-delete a file
#[utoipa::path(
    delete,
    path = "/files/{id}",
    tag = "files",
    params(("id" = String, Path, description = "File ID")),
    request_body = DeleteFileDto,
    responses(
        (status = 204, description = "File deleted"),
        (status = 400, description = "Missing or invalid deletedBy"),
        (status = 404, description = "File not found")
    )
)]
pub async fn delete_file(
    State(state): State<FilesState>,
    Path(id): Path<String>,
    JsonOrDefault(dto): JsonOrDefault<DeleteFileDto>,
) -> Result<StatusCode, AppError> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let id = parse_file_id(&id)?;
    state.service.delete(id, &dto.deleted_by).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Archive a file
#[utoipa::path(
    post,
    path = "/files/{id}/archive",
    tag = "files",
    params(("id" = String, Path, description = "File ID")),
    request_body = ArchiveFileDto,
    responses(
        (status = 204, description = "File archived"),
        (status = 400, description = "Missing or invalid archivedBy"),
        (status = 404, description = "File not found or already archived")
    )
)]
pub async fn archive_file(
    State(state): State<FilesState>,
    Path(id): Path<String>,
    JsonOrDefault(dto): JsonOrDefault<ArchiveFileDto>,
) -> Result<StatusCode, AppError> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let id = parse_file_id(&id)?;
    state.service.archive(id, &dto.archived_by).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Unarchive a file
#[utoipa::path(
    post,
    path = "/files/{id}/unarchive",
    tag = "files",
    params(("id" = String, Path, description = "File ID")),
    responses(
        (status = 204, description = "File unarchived"),
        (status = 404, description = "File not found or not archived")
    )
)]
pub async fn unarchive_file(
    State(state): State<FilesState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_file_id(&id)?;
    state.service.unarchive(id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// List photos of a project
#[utoipa::path(
    get,
    path = "/projects/{project_id}/files",
    tag = "projects",
    params(("project_id" = String, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Active, non-archived photos", body = ApiResponse<Vec<FileMetadataDto>>),
        (status = 400, description = "Missing project id")
    )
)]
pub async fn list_project_files(
    State(state): State<FilesState>,
    Path(project_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<FileMetadataDto>>>, AppError> {
    let files = state.service.list_photos_by_project_id(&project_id).await?;
    Ok(listing(files))
}

/// List archived files of a project
#[utoipa::path(
    get,
    path = "/projects/{project_id}/files/archived",
    tag = "projects",
    params(("project_id" = String, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Archived files", body = ApiResponse<Vec<FileMetadataDto>>),
        (status = 400, description = "Missing project id")
    )
)]
pub async fn list_archived_files(
    State(state): State<FilesState>,
    Path(project_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<FileMetadataDto>>>, AppError> {
    let files = state
        .service
        .list_archived_by_project_id(&project_id)
        .await?;
    Ok(listing(files))
}

/// List documents of a project
///
/// Filtered to what the caller may see when `role` is given.
#[utoipa::path(
    get,
    path = "/projects/{project_id}/documents",
    tag = "projects",
    params(
        ("project_id" = String, Path, description = "Project ID"),
        RequesterQuery
    ),
    responses(
        (status = 200, description = "Active, non-archived documents", body = ApiResponse<Vec<FileMetadataDto>>),
        (status = 400, description = "Missing project id")
    )
)]
pub async fn list_project_documents(
    State(state): State<FilesState>,
    Path(project_id): Path<String>,
    MaybeRequester(requester): MaybeRequester,
) -> Result<Json<ApiResponse<Vec<FileMetadataDto>>>, AppError> {
    let files = match requester {
        Some(requester) => {
            state
                .service
                .list_documents_by_project_id_and_role(&project_id, &requester)
                .await?
        }
        None => state.service.list_documents_by_project_id(&project_id).await?,
    };
    Ok(listing(files))
}

/// Download the caller's visible project documents as a ZIP archive
#[utoipa::path(
    get,
    path = "/projects/{project_id}/documents/zip",
    tag = "projects",
    params(
        ("project_id" = String, Path, description = "Project ID"),
        ZipQuery
    ),
    responses(
        (status = 200, description = "ZIP archive", content_type = "application/zip"),
        (status = 404, description = "No documents visible to the caller")
    )
)]
pub async fn download_project_documents_zip(
    State(state): State<FilesState>,
    Path(project_id): Path<String>,
    Query(query): Query<ZipQuery>,
) -> Result<Response, AppError> {
    let requester = Requester::from_raw(
        query.role.as_deref().unwrap_or_default(),
        query.user_id.as_deref(),
    );

    let archive = state
        .service
        .download_project_documents_zip(&project_id, &requester, query.display_name.as_deref())
        .await?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", archive.file_name),
            ),
        ],
        archive.data,
    )
        .into_response())
}

/// Recreate missing metadata rows for a project's stored objects
#[utoipa::path(
    post,
    path = "/admin/reconcile/{project_id}",
    tag = "admin",
    params(("project_id" = String, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Reconciliation finished", body = ApiResponse<ReconcileResponseDto>),
        (status = 400, description = "Missing project id"),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn reconcile_project(
    State(state): State<FilesState>,
    Path(project_id): Path<String>,
) -> Result<Json<ApiResponse<ReconcileResponseDto>>, AppError> {
    let files_reconciled = state
        .service
        .reconcile_storage_with_database(&project_id)
        .await?;

    let message = format!("Reconciled {} files", files_reconciled);

    Ok(Json(ApiResponse::success(
        Some(ReconcileResponseDto {
            message: message.clone(),
            files_reconciled,
            project_id: project_id.trim().to_string(),
        }),
        Some(message),
        None,
    )))
}
