//! Dermascan Storage Library
//!
//! Storage abstraction for captured photos, with a local filesystem backend
//! and an S3-compatible backend.
//!
//! # Storage key format
//!
//! Keys are owner-scoped. All backends use the same layout:
//!
//! - **Originals**: `{owner_id}/original/{angle}.{ext}`, overwritten on every
//!   new diagnosis of the same owner
//! - **Resized variants**: `{owner_id}/resized/{timestamp_ms}-{index}-{rand}-{angle}.{ext}`,
//!   append-only
//!
//! Keys must not contain `..` or a leading `/`. Key generation is centralized in the
//! `keys` module so all backends stay consistent.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use dermascan_core::StorageBackend;
pub use factory::create_storage;
pub use keys::{original_key, resized_key};
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{Storage, StorageError, StorageResult};
