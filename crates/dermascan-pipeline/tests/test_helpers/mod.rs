//! Test helpers for pipeline integration tests
//!
//! In-memory doubles for every collaborator of the diagnosis flow. Each one
//! records its calls so tests can assert what was (and was not) reached.

#![allow(dead_code)]

pub mod fixtures;
pub mod mock_services;
pub mod mock_storage;

pub use fixtures::*;
pub use mock_services::*;
pub use mock_storage::*;

use dermascan_pipeline::{
    AssetTransfer, AssetTransferGateway, DiagnosisInvoker, FlowOrchestrator, ResultPersister,
    RetryPolicy, StorageAssetFetcher,
};
use dermascan_processing::CompressOptions;
use dermascan_storage::Storage;
use std::sync::Arc;
use std::time::Duration;

/// All doubles behind one orchestrator.
pub struct TestFlow {
    pub storage: Arc<MockStorage>,
    pub sessions: Arc<CountingSessionProvider>,
    pub diagnosis: Arc<MockDiagnosisService>,
    pub records: Arc<MockRecordStore>,
    pub orchestrator: Arc<FlowOrchestrator>,
}

pub struct TestFlowBuilder {
    storage: MockStorage,
    sessions: CountingSessionProvider,
    diagnosis: MockDiagnosisService,
    records: MockRecordStore,
    keep_uploads: Option<usize>,
}

impl Default for TestFlowBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestFlowBuilder {
    pub fn new() -> Self {
        Self {
            storage: MockStorage::new(),
            sessions: CountingSessionProvider::signed_in("u1", "token-1"),
            diagnosis: MockDiagnosisService::succeeding("r1"),
            records: MockRecordStore::succeeding("s1"),
            keep_uploads: None,
        }
    }

    pub fn storage(mut self, storage: MockStorage) -> Self {
        self.storage = storage;
        self
    }

    pub fn sessions(mut self, sessions: CountingSessionProvider) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn diagnosis(mut self, diagnosis: MockDiagnosisService) -> Self {
        self.diagnosis = diagnosis;
        self
    }

    pub fn records(mut self, records: MockRecordStore) -> Self {
        self.records = records;
        self
    }

    /// Report only the first `keep` uploads back to the orchestrator.
    pub fn keep_uploads(mut self, keep: usize) -> Self {
        self.keep_uploads = Some(keep);
        self
    }

    pub fn build(self) -> TestFlow {
        let storage = Arc::new(self.storage);
        let sessions = Arc::new(self.sessions);
        let diagnosis = Arc::new(self.diagnosis);
        let records = Arc::new(self.records);

        let shared_storage = storage.clone() as Arc<dyn Storage>;
        let invoker = DiagnosisInvoker::new(
            diagnosis.clone(),
            RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(1),
            },
            Duration::from_millis(5),
        );
        let persister = ResultPersister::new(
            Arc::new(StorageAssetFetcher::new(shared_storage.clone())),
            shared_storage.clone(),
            records.clone(),
            CompressOptions::default(),
        );
        let gateway = AssetTransferGateway::new(shared_storage);
        let transfer: Arc<dyn AssetTransfer> = match self.keep_uploads {
            Some(keep) => Arc::new(TruncatingTransfer::new(gateway, keep)),
            None => Arc::new(gateway),
        };
        let orchestrator = FlowOrchestrator::new(
            sessions.clone(),
            transfer,
            invoker,
            persister,
        );

        TestFlow {
            storage,
            sessions,
            diagnosis,
            records,
            orchestrator: Arc::new(orchestrator),
        }
    }
}
