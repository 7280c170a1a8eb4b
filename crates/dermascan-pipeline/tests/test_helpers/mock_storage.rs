//! In-memory storage

use async_trait::async_trait;
use dermascan_core::StorageBackend;
use dermascan_storage::{Storage, StorageError, StorageResult};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

pub const MOCK_BASE_URL: &str = "mock://media";

#[derive(Default)]
pub struct MockStorage {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    failing_downloads: Mutex<HashSet<String>>,
    uploads: Mutex<Vec<String>>,
}

impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every download of `key` fail.
    pub fn fail_download(self, key: &str) -> Self {
        self.failing_downloads
            .lock()
            .unwrap()
            .insert(key.to_string());
        self
    }

    /// Keys uploaded so far, in call order.
    pub fn uploaded_keys(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl Storage for MockStorage {
    async fn upload_with_key(
        &self,
        storage_key: &str,
        data: Vec<u8>,
        _content_type: &str,
        overwrite: bool,
    ) -> StorageResult<String> {
        let mut objects = self.objects.lock().unwrap();
        if !overwrite && objects.contains_key(storage_key) {
            return Err(StorageError::AlreadyExists(storage_key.to_string()));
        }
        objects.insert(storage_key.to_string(), data);
        self.uploads.lock().unwrap().push(storage_key.to_string());
        Ok(self.public_url(storage_key))
    }

    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>> {
        if self.failing_downloads.lock().unwrap().contains(storage_key) {
            return Err(StorageError::DownloadFailed(format!(
                "injected failure for {}",
                storage_key
            )));
        }
        self.objects
            .lock()
            .unwrap()
            .get(storage_key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(storage_key.to_string()))
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        self.objects.lock().unwrap().remove(storage_key);
        Ok(())
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        Ok(self.objects.lock().unwrap().contains_key(storage_key))
    }

    fn public_url(&self, storage_key: &str) -> String {
        format!("{}/{}", MOCK_BASE_URL, storage_key)
    }

    fn key_from_url(&self, url: &str) -> Option<String> {
        url.strip_prefix(MOCK_BASE_URL)
            .and_then(|rest| rest.strip_prefix('/'))
            .map(str::to_string)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
