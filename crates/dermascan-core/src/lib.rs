//! Dermascan Core Library
//!
//! This crate provides the domain models, error taxonomy and configuration
//! shared by the capture assessment and diagnosis pipeline crates.

pub mod config;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, AppResult, ErrorCategory, ErrorMetadata, LogLevel};
pub use models::{
    AngleLabel, CaptureAsset, DiagnosisFlowOutput, DiagnosisRequest, DiagnosisResponse,
    DiagnosisResult, FlowEvent, FlowProgress, FlowStage, FlowTerminal, PersistedRecord,
    QualityReport, RawCapture, ResponseStatus, SaveRecordRequest, SaveRecordResponse,
    StageUpdate, UploadBatch, UploadedAsset,
};
pub use storage_types::StorageBackend;
