use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for fallible hold operations
pub type Result<T> = std::result::Result<T, HoldError>;

/// Errors that abort the current unit of work
#[derive(Error, Debug)]
pub enum HoldError {
    #[error("Schema error at {location}: {reason}")]
    Schema { location: String, reason: String },

    #[error("Not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Invalid frame size {w}x{h}: both dimensions must be positive")]
    InvalidFrame { w: u32, h: u32 },

    #[error("Detector failed: {0}")]
    Detector(String),

    #[error("Classifier failed: {0}")]
    Classifier(String),

    #[error("Worker failed: {0}")]
    Worker(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HoldError {
    pub fn schema<L: Into<String>, R: Into<String>>(location: L, reason: R) -> Self {
        Self::Schema {
            location: location.into(),
            reason: reason.into(),
        }
    }

    pub fn detector<S: Into<String>>(msg: S) -> Self {
        Self::Detector(msg.into())
    }

    pub fn classifier<S: Into<String>>(msg: S) -> Self {
        Self::Classifier(msg.into())
    }
}

/// Why a detection or frame was left out of a crop batch
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SkipReason {
    #[error("confidence {confidence:.2} below threshold {threshold:.2}")]
    BelowThreshold { confidence: f32, threshold: f32 },

    #[error("class id {0} is not in the hold vocabulary")]
    UnknownClass(u32),

    #[error("padded crop region is empty")]
    EmptyRegion,

    #[error("frame could not be read: {0}")]
    UnreadableFrame(String),

    #[error("detector failed on frame: {0}")]
    DetectorFailed(String),

    #[error("crop could not be written: {0}")]
    WriteFailed(String),
}

/// Failures of the external route advisory service
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdvisoryError {
    #[error("advisory quota exhausted")]
    QuotaExhausted,

    #[error("advisory service unavailable: {0}")]
    Unavailable(String),

    #[error("advisory response could not be used: {0}")]
    InvalidResponse(String),
}
