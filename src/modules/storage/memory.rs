//! In-memory object store used by service and handler tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::error::{AppError, Result};
use crate::modules::storage::object_store::{ObjectStore, StoredObject};

#[derive(Debug, Clone)]
struct Entry {
    data: Vec<u8>,
    content_type: String,
    metadata: HashMap<String, String>,
}

/// Object store backed by a map, with switches to make each operation fail
#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: Mutex<BTreeMap<String, Entry>>,
    pub fail_put: AtomicBool,
    pub fail_get: AtomicBool,
    pub fail_delete: AtomicBool,
    pub fail_list: AtomicBool,
    /// Fail listings only for prefixes starting with this fragment
    pub fail_list_prefix: Mutex<Option<String>>,
    pub put_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place an object directly, bypassing the service (simulates out-of-band uploads)
    pub fn insert(&self, key: &str, data: &[u8], content_type: &str, metadata: &[(&str, &str)]) {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            Entry {
                data: data.to_vec(),
                content_type: content_type.to_string(),
                metadata: metadata
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            },
        );
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn metadata_of(&self, key: &str) -> Option<HashMap<String, String>> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|e| e.metadata.clone())
    }

    pub fn puts(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<String> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(AppError::Storage(format!("put '{}' failed", key)));
        }
        self.objects.lock().unwrap().insert(
            key.to_string(),
            Entry {
                data,
                content_type: content_type.to_string(),
                metadata: metadata.clone(),
            },
        );
        Ok(key.to_string())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(AppError::Storage(format!("get '{}' failed", key)));
        }
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|e| e.data.clone())
            .ok_or_else(|| AppError::Storage(format!("no such key '{}'", key)))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(AppError::Storage(format!("delete '{}' failed", key)));
        }
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(AppError::Storage(format!("list '{}' failed", prefix)));
        }
        if let Some(fragment) = self.fail_list_prefix.lock().unwrap().as_deref() {
            if prefix.starts_with(fragment) {
                return Err(AppError::Storage(format!("list '{}' failed", prefix)));
            }
        }
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, e)| StoredObject {
                key: k.clone(),
                size: e.data.len() as i64,
                content_type: Some(e.content_type.clone()).filter(|ct| !ct.is_empty()),
                metadata: e.metadata.clone(),
            })
            .collect())
    }
}
