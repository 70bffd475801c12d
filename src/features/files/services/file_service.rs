use std::collections::{BTreeSet, HashMap, HashSet};
use std::io::Write;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use zip::{write::FileOptions, CompressionMethod, ZipWriter};

use crate::core::error::{AppError, Result};
use crate::features::auth::Requester;
use crate::features::files::dtos::{FileContent, FileMetadataDto, ProjectArchive, UploadRequest};
use crate::features::files::models::{
    File, FileCategory, NewFile, DOCUMENTS_PREFIX, GLOBAL_PHOTOS_PREFIX, PROJECT_PHOTOS_PREFIX,
};
use crate::features::files::policy::can_access_file;
use crate::features::files::repositories::FileRepository;
use crate::modules::storage::{ObjectStore, StoredObject, META_FILENAME, META_UPLOADED_BY};
use crate::shared::validation::{parse_actor_id, require_project_id, sanitize_filename};

/// Uploader recorded for reconciled objects without `uploadedby` metadata
pub const UNKNOWN_UPLOADER: &str = "Unknown uploader";

/// Content type recorded for reconciled objects without one
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// File lifecycle: upload, retrieval, listing, archival, export and
/// reconciliation between the object store and the metadata repository.
pub struct FileService {
    repo: Arc<dyn FileRepository>,
    storage: Arc<dyn ObjectStore>,
}

/// Storage key for a new upload.
///
/// Documents live under their project, photos under their project and upload
/// day (or the global namespace when no project is given).
pub fn derive_object_key(
    category: FileCategory,
    project_id: &str,
    id: Uuid,
    uploaded_at: DateTime<Utc>,
) -> String {
    let date_folder = uploaded_at.format("%Y-%m-%d");
    match category {
        FileCategory::Document => format!("{}{}/{}", DOCUMENTS_PREFIX, project_id, id),
        FileCategory::Photo if project_id.is_empty() => {
            format!("{}{}/{}", GLOBAL_PHOTOS_PREFIX, date_folder, id)
        }
        FileCategory::Photo => {
            format!("{}{}/{}/{}", PROJECT_PHOTOS_PREFIX, project_id, date_folder, id)
        }
        FileCategory::Other => {
            let scope = if project_id.is_empty() {
                "unassigned"
            } else {
                project_id
            };
            format!("{}/other/{}", scope, id)
        }
    }
}

/// Project id segment of a project-scoped key
/// (`documents/{pid}/...` or `photos/projects/{pid}/...`)
pub fn project_id_from_key(key: &str) -> Option<&str> {
    let rest = key
        .strip_prefix(DOCUMENTS_PREFIX)
        .or_else(|| key.strip_prefix(PROJECT_PHOTOS_PREFIX))?;
    let (project_id, remainder) = rest.split_once('/')?;
    if project_id.is_empty() || remainder.is_empty() {
        None
    } else {
        Some(project_id)
    }
}

/// Pick a ZIP entry name not used yet in this archive: `a.pdf`, `a (2).pdf`, ...
fn unique_entry_name(name: &str, used: &mut HashSet<String>) -> String {
    if used.insert(name.to_string()) {
        return name.to_string();
    }

    let (stem, extension) = match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    };

    let mut counter = 2;
    loop {
        let candidate = format!("{} ({}){}", stem, counter, extension);
        if used.insert(candidate.clone()) {
            return candidate;
        }
        counter += 1;
    }
}

/// Write entries into a ZIP archive, skipping entries that fail to write
fn build_zip(entries: Vec<(String, Vec<u8>)>) -> Result<Vec<u8>> {
    let mut buffer: Vec<u8> = Vec::new();
    {
        let cursor = std::io::Cursor::new(&mut buffer);
        let mut zip = ZipWriter::new(cursor);
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(0o644);

        for (name, data) in entries {
            if let Err(e) = zip.start_file(name.as_str(), options) {
                warn!("Failed to create ZIP entry {}: {}", name, e);
                continue;
            }
            if let Err(e) = zip.write_all(&data) {
                warn!("Failed to write ZIP entry {}: {}", name, e);
            }
        }

        zip.finish()
            .map_err(|e| AppError::Internal(format!("Failed to finish ZIP archive: {}", e)))?;
    }
    Ok(buffer)
}

impl FileService {
    pub fn new(repo: Arc<dyn FileRepository>, storage: Arc<dyn ObjectStore>) -> Self {
        Self { repo, storage }
    }

    /// Store the payload, then persist its metadata.
    ///
    /// When persisting fails the uploaded object is deleted again (best effort)
    /// and the persistence error is returned, whatever the cleanup outcome.
    pub async fn upload(&self, request: UploadRequest) -> Result<FileMetadataDto> {
        let file_name = request.file_name;
        let content_type = request.content_type.trim().to_string();
        let uploaded_by = request.uploaded_by.trim().to_string();
        let project_id = request.project_id.trim().to_string();

        if file_name.trim().is_empty() {
            return Err(AppError::Validation("fileName is required".to_string()));
        }
        if content_type.is_empty() {
            return Err(AppError::Validation("contentType is required".to_string()));
        }
        if request.data.is_empty() {
            return Err(AppError::Validation("File is empty".to_string()));
        }
        if uploaded_by.is_empty() {
            return Err(AppError::Validation("uploadedBy is required".to_string()));
        }
        if request.category == FileCategory::Document && project_id.is_empty() {
            return Err(AppError::Validation(
                "projectId is required for documents".to_string(),
            ));
        }

        let id = Uuid::new_v4();
        let now = Utc::now();
        let object_key = derive_object_key(request.category, &project_id, id, now);
        let size = request.data.len() as i64;

        let metadata = HashMap::from([
            (META_UPLOADED_BY.to_string(), uploaded_by.clone()),
            (META_FILENAME.to_string(), file_name.clone()),
        ]);

        self.storage
            .put(&object_key, request.data, &content_type, &metadata)
            .await?;

        debug!("File uploaded to storage: {}", object_key);

        let file = File::create(
            id,
            NewFile {
                file_name,
                content_type,
                category: request.category,
                project_id,
                uploaded_by,
                uploader_role: request.uploader_role,
                size,
                object_key,
            },
            now,
        );

        if let Err(save_error) = self.repo.save(&file).await {
            error!(
                "Failed to save metadata for {}, removing uploaded object: {}",
                file.object_key, save_error
            );
            if let Err(cleanup_error) = self.storage.delete(&file.object_key).await {
                warn!(
                    object_key = %file.object_key,
                    "Compensating delete failed, object is orphaned: {}", cleanup_error
                );
            }
            return Err(save_error);
        }

        info!(
            "File metadata saved: id={}, key={}, category={}, size={}",
            file.id, file.object_key, file.category, file.size
        );

        Ok(FileMetadataDto::from(&file))
    }

    async fn find_active(&self, id: Uuid) -> Result<File> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("File {} not found", id)))
    }

    async fn download(&self, file: File) -> Result<FileContent> {
        let data = self.storage.get(&file.object_key).await?;
        Ok(FileContent {
            file_name: file.file_name,
            content_type: file.content_type,
            data,
        })
    }

    /// Fetch a file without any access check
    pub async fn get(&self, id: Uuid) -> Result<FileContent> {
        let file = self.find_active(id).await?;
        self.download(file).await
    }

    /// Fetch a file on behalf of `requester`.
    ///
    /// A denied request gets the same NotFound as a missing file.
    pub async fn get_with_role_check(
        &self,
        id: Uuid,
        requester: &Requester,
    ) -> Result<FileContent> {
        let file = self.find_active(id).await?;
        if !can_access_file(requester, &file) {
            debug!(
                "Access to file {} denied for role {:?} user {}",
                id, requester.role, requester.user_id
            );
            return Err(AppError::NotFound(format!("File {} not found", id)));
        }
        self.download(file).await
    }

    /// Active, non-archived files of a project, newest first
    pub async fn list_by_project_id(&self, project_id: &str) -> Result<Vec<FileMetadataDto>> {
        let project_id = require_project_id(project_id)?;
        let files = self.repo.find_by_project_id(project_id).await?;
        Ok(files.iter().map(FileMetadataDto::from).collect())
    }

    /// Active, non-archived photos of a project
    pub async fn list_photos_by_project_id(
        &self,
        project_id: &str,
    ) -> Result<Vec<FileMetadataDto>> {
        let files = self.list_by_project_id(project_id).await?;
        Ok(files
            .into_iter()
            .filter(|f| f.category == FileCategory::Photo)
            .collect())
    }

    /// Active, non-archived documents of a project, unfiltered by role
    pub async fn list_documents_by_project_id(
        &self,
        project_id: &str,
    ) -> Result<Vec<FileMetadataDto>> {
        let files = self.list_by_project_id(project_id).await?;
        Ok(files
            .into_iter()
            .filter(|f| f.category == FileCategory::Document)
            .collect())
    }

    /// Documents of a project visible to `requester`.
    ///
    /// A requester without a recognised role sees nothing.
    pub async fn list_documents_by_project_id_and_role(
        &self,
        project_id: &str,
        requester: &Requester,
    ) -> Result<Vec<FileMetadataDto>> {
        let project_id = require_project_id(project_id)?;
        let Some(role) = requester.role else {
            return Ok(Vec::new());
        };

        let files = self
            .repo
            .find_by_project_id_and_role(project_id, role, &requester.user_id)
            .await?;

        Ok(files
            .iter()
            .filter(|f| f.category == FileCategory::Document)
            .map(FileMetadataDto::from)
            .collect())
    }

    /// Archived (but active) files of a project, newest first
    pub async fn list_archived_by_project_id(
        &self,
        project_id: &str,
    ) -> Result<Vec<FileMetadataDto>> {
        let project_id = require_project_id(project_id)?;
        let files = self.repo.find_archived_by_project_id(project_id).await?;
        Ok(files.iter().map(FileMetadataDto::from).collect())
    }

    /// Soft-delete a file. The stored object is kept.
    pub async fn delete(&self, id: Uuid, deleted_by: &str) -> Result<()> {
        let actor = parse_actor_id("deletedBy", deleted_by)?.to_string();
        let file = self.find_active(id).await?;

        self.repo.delete(id, &actor).await?;

        info!(
            audit = true,
            file_id = %file.id,
            uploaded_by = %file.uploaded_by,
            project_id = %file.project_id,
            category = %file.category,
            actor = %actor,
            "File soft-deleted"
        );

        Ok(())
    }

    /// Hide an active file from listings without deleting it
    pub async fn archive(&self, id: Uuid, archived_by: &str) -> Result<()> {
        let actor = parse_actor_id("archivedBy", archived_by)?.to_string();
        let file = self.find_active(id).await?;

        self.repo.archive(id, &actor).await?;

        info!(
            audit = true,
            file_id = %file.id,
            uploaded_by = %file.uploaded_by,
            project_id = %file.project_id,
            category = %file.category,
            actor = %actor,
            "File archived"
        );

        Ok(())
    }

    pub async fn unarchive(&self, id: Uuid) -> Result<()> {
        let file = self.find_active(id).await?;

        self.repo.unarchive(id).await?;

        info!(
            audit = true,
            file_id = %file.id,
            uploaded_by = %file.uploaded_by,
            project_id = %file.project_id,
            category = %file.category,
            "File unarchived"
        );

        Ok(())
    }

    /// Bundle the documents `requester` may see into one ZIP archive.
    ///
    /// Documents whose record or object cannot be read are left out.
    pub async fn download_project_documents_zip(
        &self,
        project_id: &str,
        requester: &Requester,
        display_name: Option<&str>,
    ) -> Result<ProjectArchive> {
        let project_id = require_project_id(project_id)?;
        let documents = self
            .list_documents_by_project_id_and_role(project_id, requester)
            .await?;

        if documents.is_empty() {
            return Err(AppError::NotFound(format!(
                "No documents found for project {}",
                project_id
            )));
        }

        let mut used_names = HashSet::new();
        let mut entries = Vec::with_capacity(documents.len());

        for doc in &documents {
            let file = match self.repo.find_by_id(doc.id).await {
                Ok(Some(file)) => file,
                Ok(None) => {
                    warn!("File {} vanished before ZIP export, skipping", doc.id);
                    continue;
                }
                Err(e) => {
                    warn!("Failed to load file {} for ZIP export: {}", doc.id, e);
                    continue;
                }
            };

            let data = match self.storage.get(&file.object_key).await {
                Ok(data) => data,
                Err(e) => {
                    warn!("Failed to download {} for ZIP export: {}", file.object_key, e);
                    continue;
                }
            };

            let base_name = if file.file_name.trim().is_empty() {
                format!("file-{}", file.id)
            } else {
                file.file_name.clone()
            };
            entries.push((unique_entry_name(&base_name, &mut used_names), data));
        }

        let data = build_zip(entries)?;

        let stem = display_name
            .and_then(sanitize_filename)
            .or_else(|| sanitize_filename(project_id))
            .unwrap_or_else(|| "project".to_string());

        info!(
            "Built ZIP export for project {}: {} documents, {} bytes",
            project_id,
            documents.len(),
            data.len()
        );

        Ok(ProjectArchive {
            file_name: format!("{}_documents.zip", stem),
            data,
        })
    }

    /// Build a metadata record for an object the repository does not know
    fn synthesize_record(project_id: &str, object: &StoredObject) -> File {
        let file_name = object
            .metadata_value(META_FILENAME)
            .map(str::to_string)
            .unwrap_or_else(|| {
                object
                    .key
                    .rsplit('/')
                    .next()
                    .unwrap_or(object.key.as_str())
                    .to_string()
            });

        let uploaded_by = object
            .metadata_value(META_UPLOADED_BY)
            .unwrap_or(UNKNOWN_UPLOADER)
            .to_string();

        let content_type = object
            .content_type
            .as_deref()
            .map(str::trim)
            .filter(|ct| !ct.is_empty())
            .unwrap_or(FALLBACK_CONTENT_TYPE)
            .to_string();

        File::create(
            Uuid::new_v4(),
            NewFile {
                file_name,
                content_type,
                category: FileCategory::from_object_key(&object.key),
                project_id: project_id.to_string(),
                uploaded_by,
                uploader_role: None,
                size: object.size,
                object_key: object.key.clone(),
            },
            Utc::now(),
        )
    }

    /// Create metadata rows for objects of a project that have none.
    ///
    /// Returns the number of rows created. Existing rows are never touched,
    /// so running this twice creates nothing the second time. A failure on one
    /// object is logged and the rest of the batch continues.
    pub async fn reconcile_storage_with_database(&self, project_id: &str) -> Result<usize> {
        let project_id = require_project_id(project_id)?;
        let prefixes = [
            format!("{}{}/", DOCUMENTS_PREFIX, project_id),
            format!("{}{}/", PROJECT_PHOTOS_PREFIX, project_id),
        ];

        // Both listings must succeed before anything is written
        let mut objects = Vec::new();
        for prefix in &prefixes {
            let listed = self.storage.list(prefix).await?;
            debug!("Reconciling {} objects under {}", listed.len(), prefix);
            objects.extend(listed);
        }

        let mut synced = 0;
        for object in objects {
            if object.key.ends_with('/') {
                continue;
            }

            match self.repo.find_by_object_key(&object.key).await {
                Ok(Some(_)) => continue,
                Ok(None) => {}
                Err(e) => {
                    error!("Failed to look up {} during reconciliation: {}", object.key, e);
                    continue;
                }
            }

            let record = Self::synthesize_record(project_id, &object);
            match self.repo.save(&record).await {
                Ok(()) => {
                    synced += 1;
                    info!(
                        audit = true,
                        file_id = %record.id,
                        uploaded_by = %record.uploaded_by,
                        project_id = %record.project_id,
                        category = %record.category,
                        object_key = %record.object_key,
                        "File record reconciled from storage"
                    );
                }
                Err(e) => {
                    error!("Failed to save reconciled record for {}: {}", object.key, e);
                }
            }
        }

        info!(
            "Reconciliation for project {} created {} records",
            project_id, synced
        );

        Ok(synced)
    }

    /// Reconcile every project that has objects in storage.
    ///
    /// Never fails: listing or per-project errors are logged and the pass
    /// carries on with what it could find.
    pub async fn auto_reconcile_all_projects(&self) -> usize {
        let mut project_ids = BTreeSet::new();

        for prefix in [DOCUMENTS_PREFIX, PROJECT_PHOTOS_PREFIX] {
            match self.storage.list(prefix).await {
                Ok(objects) => project_ids.extend(
                    objects
                        .iter()
                        .filter_map(|o| project_id_from_key(&o.key))
                        .map(str::to_string),
                ),
                Err(e) => warn!("Auto-reconcile could not list {}: {}", prefix, e),
            }
        }

        if project_ids.is_empty() {
            info!("Auto-reconcile found no projects in storage");
            return 0;
        }

        let mut total = 0;
        for project_id in &project_ids {
            match self.reconcile_storage_with_database(project_id).await {
                Ok(count) => total += count,
                Err(e) => warn!("Auto-reconcile failed for project {}: {}", project_id, e),
            }
        }

        info!(
            "Auto-reconcile finished: {} projects scanned, {} records created",
            project_ids.len(),
            total
        );

        total
    }
}
