//! Object store contract consumed by the file service.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::core::error::Result;

/// User metadata key carrying the uploader identity
pub const META_UPLOADED_BY: &str = "uploadedby";

/// User metadata key carrying the original filename
pub const META_FILENAME: &str = "filename";

/// An object as reported by a prefix listing
#[derive(Debug, Clone, Default)]
pub struct StoredObject {
    pub key: String,
    pub size: i64,
    pub content_type: Option<String>,
    /// User metadata with lowercased keys
    pub metadata: HashMap<String, String>,
}

impl StoredObject {
    /// Look up a user metadata value, ignoring key case and blank values
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// Blob storage addressed by key.
///
/// Every failure is reported as [`crate::core::error::AppError::Storage`];
/// implementations never swallow errors.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `data` under `key`, returning the key
    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<String>;

    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// List every object whose key starts with `prefix`, recursively
    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_value_is_case_insensitive() {
        let mut metadata = HashMap::new();
        metadata.insert("Uploadedby".to_string(), "user-1".to_string());
        metadata.insert("filename".to_string(), "   ".to_string());

        let object = StoredObject {
            key: "documents/p1/abc".to_string(),
            size: 3,
            content_type: None,
            metadata,
        };

        assert_eq!(object.metadata_value(META_UPLOADED_BY), Some("user-1"));
        assert_eq!(object.metadata_value(META_FILENAME), None);
        assert_eq!(object.metadata_value("missing"), None);
    }
}
