//! Dermascan Processing Library
//!
//! Image-quality assessment of captured photos and the resize/compress
//! transform used to build compact derived assets.

pub mod image;
pub mod quality;

// Re-export commonly used types
pub use crate::image::{detect_format, prepare_for_upload, CaptureFormat, CompressOptions, PreparedImage};
pub use quality::{QualityAssessor, QualityOptions};
