//! In-memory file repository for tests. Role filtering is delegated to the
//! access policy, mirroring the SQL filter of the Postgres repository.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::auth::{Requester, Role};
use crate::features::files::models::File;
use crate::features::files::policy::can_access_file;
use crate::features::files::repositories::FileRepository;

#[derive(Default)]
pub struct InMemoryFileRepository {
    rows: Mutex<Vec<File>>,
    pub fail_save: AtomicBool,
    pub fail_find: AtomicBool,
    /// Fail lookups by id for this row only
    pub fail_find_for_id: Mutex<Option<Uuid>>,
    /// Report this row as absent on lookups by id
    pub hide_on_find: Mutex<Option<Uuid>>,
    /// Fail saves only for keys containing this fragment
    pub fail_save_for_key: Mutex<Option<String>>,
    pub save_calls: AtomicUsize,
}

impl InMemoryFileRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every row, inactive ones included
    pub fn all(&self) -> Vec<File> {
        self.rows.lock().unwrap().clone()
    }

    pub fn raw(&self, id: Uuid) -> Option<File> {
        self.rows.lock().unwrap().iter().find(|f| f.id == id).cloned()
    }

    fn check_find(&self) -> Result<()> {
        if self.fail_find.load(Ordering::SeqCst) {
            return Err(AppError::Database(sqlx::Error::Protocol(
                "connection reset".to_string(),
            )));
        }
        Ok(())
    }

    fn project_rows(&self, project_id: &str, archived: bool) -> Vec<File> {
        let mut files: Vec<File> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f.project_id == project_id && f.is_active && f.is_archived == archived)
            .cloned()
            .collect();
        files.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        files
    }
}

#[async_trait]
impl FileRepository for InMemoryFileRepository {
    async fn save(&self, file: &File) -> Result<()> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_save.load(Ordering::SeqCst) {
            return Err(AppError::Database(sqlx::Error::Protocol(
                "insert failed".to_string(),
            )));
        }
        if let Some(fragment) = self.fail_save_for_key.lock().unwrap().as_deref() {
            if file.object_key.contains(fragment) {
                return Err(AppError::Database(sqlx::Error::Protocol(
                    "insert failed".to_string(),
                )));
            }
        }

        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|f| f.object_key == file.object_key) {
            return Err(AppError::Database(sqlx::Error::Protocol(
                "duplicate key value violates unique constraint \"idx_files_object_key\""
                    .to_string(),
            )));
        }
        rows.push(file.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<File>> {
        self.check_find()?;
        if *self.fail_find_for_id.lock().unwrap() == Some(id) {
            return Err(AppError::Database(sqlx::Error::Protocol(
                "connection reset".to_string(),
            )));
        }
        if *self.hide_on_find.lock().unwrap() == Some(id) {
            return Ok(None);
        }
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|f| f.id == id && f.is_active)
            .cloned())
    }

    async fn delete(&self, id: Uuid, deleted_by: &str) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        match rows.iter_mut().find(|f| f.id == id && f.is_active) {
            Some(file) => {
                file.is_active = false;
                file.deleted_at = Some(Utc::now());
                file.deleted_by = Some(deleted_by.to_string());
                Ok(())
            }
            None => Err(AppError::NotFound(format!("File {} not found", id))),
        }
    }

    async fn archive(&self, id: Uuid, archived_by: &str) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        match rows
            .iter_mut()
            .find(|f| f.id == id && f.is_active && !f.is_archived)
        {
            Some(file) => {
                file.is_archived = true;
                file.archived_at = Some(Utc::now());
                file.archived_by = Some(archived_by.to_string());
                Ok(())
            }
            None => Err(AppError::NotFound(format!("File {} not found", id))),
        }
    }

    async fn unarchive(&self, id: Uuid) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        match rows
            .iter_mut()
            .find(|f| f.id == id && f.is_active && f.is_archived)
        {
            Some(file) => {
                file.is_archived = false;
                file.archived_at = None;
                file.archived_by = None;
                Ok(())
            }
            None => Err(AppError::NotFound(format!("File {} not found", id))),
        }
    }

    async fn find_by_project_id(&self, project_id: &str) -> Result<Vec<File>> {
        self.check_find()?;
        Ok(self.project_rows(project_id, false))
    }

    async fn find_by_project_id_and_role(
        &self,
        project_id: &str,
        role: Role,
        requester_id: &str,
    ) -> Result<Vec<File>> {
        self.check_find()?;
        let viewer = Requester::new(Some(role), requester_id);
        Ok(self
            .project_rows(project_id, false)
            .into_iter()
            .filter(|f| can_access_file(&viewer, f))
            .collect())
    }

    async fn find_archived_by_project_id(&self, project_id: &str) -> Result<Vec<File>> {
        self.check_find()?;
        Ok(self.project_rows(project_id, true))
    }

    async fn find_by_object_key(&self, object_key: &str) -> Result<Option<File>> {
        self.check_find()?;
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|f| f.object_key == object_key)
            .cloned())
    }
}
