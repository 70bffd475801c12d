//! Storage module for file blobs
//!
//! Defines the [`ObjectStore`] contract and its MinIO/S3-compatible implementation.

#[cfg(test)]
pub mod memory;
mod minio_client;
mod object_store;

pub use minio_client::MinIOClient;
pub use object_store::{ObjectStore, StoredObject, META_FILENAME, META_UPLOADED_BY};
