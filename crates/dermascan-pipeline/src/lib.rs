//! Dermascan Pipeline Library
//!
//! Upload, analyze and save orchestration for captured photos:
//!
//! - [`AssetTransferGateway`] uploads originals to owner-scoped paths
//! - [`DiagnosisInvoker`] calls the diagnosis service with staged progress and retry
//! - [`ResultPersister`] builds compact variants and saves the diagnosis record
//! - [`FlowOrchestrator`] composes the three and owns the progress of one invocation

pub mod diagnosis;
pub mod flow;
pub mod persister;
pub mod session;
pub mod transfer;

use dermascan_core::StageUpdate;

/// Stage-local progress sink. Percentages passed through it are `0..=100`.
pub type ProgressFn<'a> = &'a (dyn Fn(StageUpdate) + Send + Sync);

/// Sink that drops every update.
pub fn ignore_progress(_: StageUpdate) {}

// Re-export commonly used types
pub use diagnosis::{
    DiagnosisInvoker, DiagnosisService, HttpDiagnosisService, RetryPolicy, ServiceCallError,
};
pub use flow::{derive_angle_labels, FlowContext, FlowOrchestrator, StageEstimates};
pub use persister::{
    AssetFetcher, HttpAssetFetcher, HttpRecordStore, PersistInput, RecordStore, ResultPersister,
    StorageAssetFetcher,
};
pub use session::{Session, SessionProvider, StaticSessionProvider};
pub use transfer::{AssetTransfer, AssetTransferGateway};
