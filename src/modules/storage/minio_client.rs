//! MinIO/S3-compatible storage client
//!
//! Works against local MinIO as well as DigitalOcean Spaces and any other
//! S3-compatible service. Uses the rust-s3 crate for lightweight S3 operations.

use std::collections::HashMap;

use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use s3::creds::Credentials;
use s3::{Bucket, BucketConfiguration, Region};
use tracing::{debug, info, warn};

use crate::core::config::MinIOConfig;
use crate::core::error::{AppError, Result};
use crate::modules::storage::object_store::{ObjectStore, StoredObject};

const USER_METADATA_PREFIX: &str = "x-amz-meta-";

/// MinIO/S3-compatible storage client
pub struct MinIOClient {
    bucket: Box<Bucket>,
    region: Region,
    credentials: Credentials,
    endpoint: String,
}

impl MinIOClient {
    /// Create a new MinIO client from configuration and make sure the bucket exists
    pub async fn new(config: MinIOConfig) -> Result<Self> {
        let credentials = Credentials::new(
            Some(&config.access_key),
            Some(&config.secret_key),
            None,
            None,
            None,
        )
        .map_err(|e| AppError::Internal(format!("Failed to create MinIO credentials: {}", e)))?;

        let region = Region::Custom {
            region: config.region.clone(),
            endpoint: config.endpoint.clone(),
        };

        let mut bucket = Bucket::new(&config.bucket, region.clone(), credentials.clone())
            .map_err(|e| AppError::Internal(format!("Failed to create MinIO bucket: {}", e)))?;

        // Use path-style URLs for MinIO (http://endpoint/bucket instead of http://bucket.endpoint)
        bucket.set_path_style();

        let client = Self {
            bucket,
            region,
            credentials,
            endpoint: config.endpoint,
        };

        client.ensure_bucket_exists().await?;

        info!(
            "MinIO client initialized for endpoint: {}, bucket: {}, region: {}",
            client.endpoint,
            client.bucket.name(),
            config.region
        );

        Ok(client)
    }

    /// Ensure the bucket exists, create if not
    pub async fn ensure_bucket_exists(&self) -> Result<()> {
        // Creating an existing bucket fails with a recognisable error we can ignore
        match self.create_bucket().await {
            Ok(_) => {
                info!("Bucket '{}' created successfully", self.bucket.name());
                Ok(())
            }
            Err(e) => {
                let error_str = e.to_string();
                if error_str.contains("BucketAlreadyOwnedByYou")
                    || error_str.contains("BucketAlreadyExists")
                    || error_str.contains("already own it")
                {
                    debug!("Bucket '{}' already exists", self.bucket.name());
                } else {
                    warn!(
                        "Could not create bucket '{}': {}. Assuming it exists.",
                        self.bucket.name(),
                        e
                    );
                }
                Ok(())
            }
        }
    }

    async fn create_bucket(&self) -> Result<()> {
        let bucket_config = BucketConfiguration::default();

        Bucket::create_with_path_style(
            &self.bucket.name(),
            self.region.clone(),
            self.credentials.clone(),
            bucket_config,
        )
        .await
        .map_err(|e| {
            AppError::Storage(format!(
                "Failed to create bucket '{}': {}",
                self.bucket.name(),
                e
            ))
        })?;

        Ok(())
    }

    /// Get the bucket name
    pub fn bucket_name(&self) -> String {
        self.bucket.name()
    }

    /// Fetch content type and user metadata for a listed key.
    ///
    /// A failed HEAD is not fatal for listings: the object is still returned,
    /// just without metadata.
    async fn describe(&self, key: &str, size: i64) -> StoredObject {
        match self.bucket.head_object(key).await {
            Ok((head, status)) if (200..300).contains(&status) => StoredObject {
                key: key.to_string(),
                size: head.content_length.unwrap_or(size),
                content_type: head.content_type.filter(|ct| !ct.is_empty()),
                metadata: head
                    .metadata
                    .map(decode_user_metadata)
                    .unwrap_or_default(),
            },
            Ok((_, status)) => {
                warn!("Failed to fetch metadata for '{}': status {}", key, status);
                StoredObject {
                    key: key.to_string(),
                    size,
                    ..Default::default()
                }
            }
            Err(e) => {
                warn!("Failed to fetch metadata for '{}': {}", key, e);
                StoredObject {
                    key: key.to_string(),
                    size,
                    ..Default::default()
                }
            }
        }
    }
}

#[async_trait]
impl ObjectStore for MinIOClient {
    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<String> {
        let headers = encode_user_metadata(metadata)?;

        let response = self
            .bucket
            .put_object_with_content_type_and_headers(key, &data, content_type, Some(headers))
            .await
            .map_err(|e| AppError::Storage(format!("Failed to upload file '{}': {}", key, e)))?;

        let status = response.status_code();
        if !(200..300).contains(&status) {
            return Err(AppError::Storage(format!(
                "Failed to upload file '{}': status {}",
                key, status
            )));
        }

        debug!("Uploaded file '{}' to bucket '{}'", key, self.bucket.name());
        Ok(key.to_string())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let response = self.bucket.get_object(key).await.map_err(|e| {
            AppError::Storage(format!("Failed to download file '{}': {}", key, e))
        })?;

        let status = response.status_code();
        if !(200..300).contains(&status) {
            return Err(AppError::Storage(format!(
                "Failed to download file '{}': status {}",
                key, status
            )));
        }

        debug!(
            "Downloaded file '{}' from bucket '{}'",
            key,
            self.bucket.name()
        );
        Ok(response.bytes().to_vec())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let response = self
            .bucket
            .delete_object(key)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to delete file '{}': {}", key, e)))?;

        let status = response.status_code();
        if !(200..300).contains(&status) {
            return Err(AppError::Storage(format!(
                "Failed to delete file '{}': status {}",
                key, status
            )));
        }

        debug!(
            "Deleted file '{}' from bucket '{}'",
            key,
            self.bucket.name()
        );
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>> {
        let pages = self
            .bucket
            .list(prefix.to_string(), None)
            .await
            .map_err(|e| {
                AppError::Storage(format!("Failed to list objects under '{}': {}", prefix, e))
            })?;

        let mut objects = Vec::new();
        for page in pages {
            for entry in page.contents {
                let size = i64::try_from(entry.size).unwrap_or(i64::MAX);
                objects.push(self.describe(&entry.key, size).await);
            }
        }

        debug!("Listed {} objects under '{}'", objects.len(), prefix);
        Ok(objects)
    }
}

/// Turn user metadata into `x-amz-meta-*` headers.
///
/// Values are percent-encoded so non-ASCII filenames survive the trip through
/// HTTP headers.
fn encode_user_metadata(metadata: &HashMap<String, String>) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for (key, value) in metadata {
        let name = HeaderName::from_bytes(
            format!("{}{}", USER_METADATA_PREFIX, key.to_ascii_lowercase()).as_bytes(),
        )
        .map_err(|e| AppError::Storage(format!("Invalid metadata key '{}': {}", key, e)))?;
        let value = HeaderValue::from_str(&urlencoding::encode(value))
            .map_err(|e| {
                AppError::Storage(format!("Invalid metadata value for '{}': {}", key, e))
            })?;
        headers.insert(name, value);
    }
    Ok(headers)
}

fn decode_user_metadata(raw: HashMap<String, String>) -> HashMap<String, String> {
    raw.into_iter()
        .map(|(key, value)| {
            let key = key.to_ascii_lowercase();
            let key = key
                .strip_prefix(USER_METADATA_PREFIX)
                .map(str::to_string)
                .unwrap_or(key);
            let value = urlencoding::decode(&value)
                .map(|v| v.into_owned())
                .unwrap_or(value);
            (key, value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_user_metadata_prefixes_and_escapes() {
        let mut metadata = HashMap::new();
        metadata.insert("Filename".to_string(), "devis été.pdf".to_string());

        let headers = encode_user_metadata(&metadata).unwrap();
        let value = headers.get("x-amz-meta-filename").unwrap();
        assert_eq!(value.to_str().unwrap(), "devis%20%C3%A9t%C3%A9.pdf");
    }

    #[test]
    fn test_decode_user_metadata_strips_prefix_and_unescapes() {
        let mut raw = HashMap::new();
        raw.insert(
            "X-Amz-Meta-Filename".to_string(),
            "devis%20%C3%A9t%C3%A9.pdf".to_string(),
        );
        raw.insert("uploadedby".to_string(), "user-1".to_string());

        let decoded = decode_user_metadata(raw);
        assert_eq!(decoded.get("filename").map(String::as_str), Some("devis été.pdf"));
        assert_eq!(decoded.get("uploadedby").map(String::as_str), Some("user-1"));
    }
}
