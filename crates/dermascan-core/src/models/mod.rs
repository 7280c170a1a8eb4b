pub mod capture;
pub mod diagnosis;
pub mod progress;
pub mod quality;

pub use capture::{AngleLabel, CaptureAsset, RawCapture, UploadBatch, UploadedAsset};
pub use diagnosis::{
    DiagnosisFlowOutput, DiagnosisRequest, DiagnosisResponse, DiagnosisResult, PersistedRecord,
    ResponseStatus, SaveRecordRequest, SaveRecordResponse,
};
pub use progress::{FlowEvent, FlowProgress, FlowStage, FlowTerminal, StageUpdate};
pub use quality::QualityReport;
