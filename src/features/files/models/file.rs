use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::features::auth::Role;

/// Key prefix for project documents
pub const DOCUMENTS_PREFIX: &str = "documents/";

/// Key prefix for all photos
pub const PHOTOS_PREFIX: &str = "photos/";

/// Key prefix for project-scoped photos
pub const PROJECT_PHOTOS_PREFIX: &str = "photos/projects/";

/// Key prefix for photos not tied to a project
pub const GLOBAL_PHOTOS_PREFIX: &str = "photos/global/";

/// File category matching the `file_category` database enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type, ToSchema)]
#[sqlx(type_name = "file_category", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum FileCategory {
    Document,
    Photo,
    Other,
}

impl FileCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileCategory::Document => "DOCUMENT",
            FileCategory::Photo => "PHOTO",
            FileCategory::Other => "OTHER",
        }
    }

    /// Infer the category from the storage layout of an object key
    pub fn from_object_key(key: &str) -> Self {
        if key.starts_with(DOCUMENTS_PREFIX) {
            FileCategory::Document
        } else if key.starts_with(PHOTOS_PREFIX) {
            FileCategory::Photo
        } else {
            FileCategory::Other
        }
    }
}

impl fmt::Display for FileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DOCUMENT" => Ok(FileCategory::Document),
            "PHOTO" => Ok(FileCategory::Photo),
            "OTHER" => Ok(FileCategory::Other),
            _ => Err(format!(
                "Invalid category '{}'. Use DOCUMENT, PHOTO, or OTHER",
                s.trim()
            )),
        }
    }
}

/// Database model for file metadata
#[derive(Debug, Clone, FromRow)]
pub struct File {
    pub id: Uuid,
    pub file_name: String,
    pub content_type: String,
    pub category: FileCategory,
    /// Empty only for global photos
    pub project_id: String,
    pub uploaded_by: String,
    /// Absent on legacy and reconciled rows
    pub uploader_role: Option<Role>,
    pub size: i64,
    pub object_key: String,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<String>,
    pub is_archived: bool,
    pub archived_at: Option<DateTime<Utc>>,
    pub archived_by: Option<String>,
}

/// Fields needed to create a fresh, active, non-archived record
#[derive(Debug, Clone)]
pub struct NewFile {
    pub file_name: String,
    pub content_type: String,
    pub category: FileCategory,
    pub project_id: String,
    pub uploaded_by: String,
    pub uploader_role: Option<Role>,
    pub size: i64,
    pub object_key: String,
}

impl File {
    pub fn create(id: Uuid, new: NewFile, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            file_name: new.file_name,
            content_type: new.content_type,
            category: new.category,
            project_id: new.project_id,
            uploaded_by: new.uploaded_by,
            uploader_role: new.uploader_role,
            size: new.size,
            object_key: new.object_key,
            created_at,
            is_active: true,
            deleted_at: None,
            deleted_by: None,
            is_archived: false,
            archived_at: None,
            archived_by: None,
        }
    }

    /// Resource URL served by this service
    pub fn url(&self) -> String {
        format!("/files/{}", self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parse() {
        assert_eq!("document".parse::<FileCategory>(), Ok(FileCategory::Document));
        assert_eq!(" Photo".parse::<FileCategory>(), Ok(FileCategory::Photo));
        assert_eq!("OTHER".parse::<FileCategory>(), Ok(FileCategory::Other));
        assert!("video".parse::<FileCategory>().is_err());
    }

    #[test]
    fn test_category_from_object_key() {
        assert_eq!(
            FileCategory::from_object_key("documents/p1/abc"),
            FileCategory::Document
        );
        assert_eq!(
            FileCategory::from_object_key("photos/projects/p1/2025-01-01/abc"),
            FileCategory::Photo
        );
        assert_eq!(
            FileCategory::from_object_key("photos/global/2025-01-01/abc"),
            FileCategory::Photo
        );
        assert_eq!(
            FileCategory::from_object_key("p1/other/abc"),
            FileCategory::Other
        );
        // prefix match only, not substring
        assert_eq!(
            FileCategory::from_object_key("archive/documents/abc"),
            FileCategory::Other
        );
    }

    #[test]
    fn test_create_starts_active_and_unarchived() {
        let id = Uuid::new_v4();
        let file = File::create(
            id,
            NewFile {
                file_name: "contract.pdf".to_string(),
                content_type: "application/pdf".to_string(),
                category: FileCategory::Document,
                project_id: "P1".to_string(),
                uploaded_by: "U1".to_string(),
                uploader_role: Some(Role::Contractor),
                size: 10,
                object_key: format!("documents/P1/{}", id),
            },
            Utc::now(),
        );

        assert!(file.is_active);
        assert!(!file.is_archived);
        assert!(file.deleted_at.is_none() && file.archived_at.is_none());
        assert_eq!(file.url(), format!("/files/{}", id));
    }
}
