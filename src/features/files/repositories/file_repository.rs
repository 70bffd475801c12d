use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::auth::Role;
use crate::features::files::models::File;

const FILE_COLUMNS: &str = "id, file_name, content_type, category, project_id, uploaded_by, \
     uploader_role, size, object_key, created_at, is_active, deleted_at, deleted_by, \
     is_archived, archived_at, archived_by";

/// Persistence of file metadata rows.
///
/// State transitions (`delete`, `archive`, `unarchive`) are conditional
/// updates: when the row is not in the required state nothing is written and
/// [`AppError::NotFound`] is returned. Concurrent callers racing on the same
/// row therefore see exactly one success.
#[async_trait]
pub trait FileRepository: Send + Sync {
    async fn save(&self, file: &File) -> Result<()>;

    /// Active record by id (archived records included)
    async fn find_by_id(&self, id: Uuid) -> Result<Option<File>>;

    async fn delete(&self, id: Uuid, deleted_by: &str) -> Result<()>;

    async fn archive(&self, id: Uuid, archived_by: &str) -> Result<()>;

    async fn unarchive(&self, id: Uuid) -> Result<()>;

    /// Active, non-archived records of a project, newest first
    async fn find_by_project_id(&self, project_id: &str) -> Result<Vec<File>>;

    /// Like [`FileRepository::find_by_project_id`], narrowed to what `role`
    /// acting as `requester_id` may see
    async fn find_by_project_id_and_role(
        &self,
        project_id: &str,
        role: Role,
        requester_id: &str,
    ) -> Result<Vec<File>>;

    /// Active, archived records of a project, newest first
    async fn find_archived_by_project_id(&self, project_id: &str) -> Result<Vec<File>>;

    /// Any record holding `object_key`, soft-deleted ones included
    async fn find_by_object_key(&self, object_key: &str) -> Result<Option<File>>;
}

/// Postgres-backed [`FileRepository`]
pub struct PgFileRepository {
    pool: PgPool,
}

impl PgFileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn affected_or_not_found(rows: u64, id: Uuid) -> Result<()> {
    if rows == 0 {
        Err(AppError::NotFound(format!("File {} not found", id)))
    } else {
        Ok(())
    }
}

#[async_trait]
impl FileRepository for PgFileRepository {
    async fn save(&self, file: &File) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO files (
                id, file_name, content_type, category, project_id, uploaded_by,
                uploader_role, size, object_key, created_at, is_active, is_archived
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, TRUE, FALSE)
            "#,
        )
        .bind(file.id)
        .bind(&file.file_name)
        .bind(&file.content_type)
        .bind(file.category)
        .bind(&file.project_id)
        .bind(&file.uploaded_by)
        .bind(file.uploader_role)
        .bind(file.size)
        .bind(&file.object_key)
        .bind(file.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<File>> {
        let sql = format!(
            "SELECT {} FROM files WHERE id = $1 AND is_active = TRUE",
            FILE_COLUMNS
        );
        let file = sqlx::query_as::<_, File>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(file)
    }

    async fn delete(&self, id: Uuid, deleted_by: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE files
            SET is_active = FALSE, deleted_at = NOW(), deleted_by = $2
            WHERE id = $1 AND is_active = TRUE
            "#,
        )
        .bind(id)
        .bind(deleted_by)
        .execute(&self.pool)
        .await?;

        affected_or_not_found(result.rows_affected(), id)
    }

    async fn archive(&self, id: Uuid, archived_by: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE files
            SET is_archived = TRUE, archived_at = NOW(), archived_by = $2
            WHERE id = $1 AND is_active = TRUE AND is_archived = FALSE
            "#,
        )
        .bind(id)
        .bind(archived_by)
        .execute(&self.pool)
        .await?;

        affected_or_not_found(result.rows_affected(), id)
    }

    async fn unarchive(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE files
            SET is_archived = FALSE, archived_at = NULL, archived_by = NULL
            WHERE id = $1 AND is_active = TRUE AND is_archived = TRUE
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        affected_or_not_found(result.rows_affected(), id)
    }

    async fn find_by_project_id(&self, project_id: &str) -> Result<Vec<File>> {
        let sql = format!(
            "SELECT {} FROM files \
             WHERE project_id = $1 AND is_active = TRUE AND is_archived = FALSE \
             ORDER BY created_at DESC",
            FILE_COLUMNS
        );
        let files = sqlx::query_as::<_, File>(&sql)
            .bind(project_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(files)
    }

    async fn find_by_project_id_and_role(
        &self,
        project_id: &str,
        role: Role,
        requester_id: &str,
    ) -> Result<Vec<File>> {
        // Rows without uploader_role never match the non-OWNER filters
        let role_filter = match role {
            Role::Owner => "",
            Role::Contractor | Role::Salesperson => {
                "AND uploaded_by = $2 AND uploader_role = $3"
            }
            Role::Customer => "AND uploader_role IN ('CONTRACTOR', 'SALESPERSON')",
        };

        let sql = format!(
            "SELECT {} FROM files \
             WHERE project_id = $1 AND is_active = TRUE AND is_archived = FALSE {} \
             ORDER BY created_at DESC",
            FILE_COLUMNS, role_filter
        );

        let query = sqlx::query_as::<_, File>(&sql).bind(project_id);
        let query = match role {
            Role::Contractor | Role::Salesperson => query.bind(requester_id).bind(role),
            Role::Owner | Role::Customer => query,
        };

        let files = query.fetch_all(&self.pool).await?;
        Ok(files)
    }

    async fn find_archived_by_project_id(&self, project_id: &str) -> Result<Vec<File>> {
        let sql = format!(
            "SELECT {} FROM files \
             WHERE project_id = $1 AND is_active = TRUE AND is_archived = TRUE \
             ORDER BY created_at DESC",
            FILE_COLUMNS
        );
        let files = sqlx::query_as::<_, File>(&sql)
            .bind(project_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(files)
    }

    async fn find_by_object_key(&self, object_key: &str) -> Result<Option<File>> {
        let sql = format!(
            "SELECT {} FROM files WHERE object_key = $1 ORDER BY is_active DESC LIMIT 1",
            FILE_COLUMNS
        );
        let file = sqlx::query_as::<_, File>(&sql)
            .bind(object_key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_affected_or_not_found() {
        let id = Uuid::new_v4();
        assert!(affected_or_not_found(1, id).is_ok());
        assert!(matches!(
            affected_or_not_found(0, id),
            Err(AppError::NotFound(_))
        ));
    }
}
