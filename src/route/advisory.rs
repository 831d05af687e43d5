use std::path::PathBuf;

use crate::error::AdvisoryError;
use crate::models::{Frame, Route};
use crate::route::normalize::NormalizedHolds;

/// External route service. It can run out of quota or be unreachable, in
/// which case callers fall back to the local route.
pub trait RouteAdvisor: Send + Sync {
    fn advise(&self, frame: &Frame, holds: &NormalizedHolds) -> Result<Route, AdvisoryError>;

    fn name(&self) -> &str;
}

/// Used when no advisory service is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAdvisor;

impl RouteAdvisor for NoAdvisor {
    fn advise(&self, _frame: &Frame, _holds: &NormalizedHolds) -> Result<Route, AdvisoryError> {
        Err(AdvisoryError::Unavailable(
            "no advisory service configured".to_string(),
        ))
    }

    fn name(&self) -> &str {
        "none"
    }
}

/// Replays a route response captured from the advisory service
#[derive(Debug, Clone)]
pub struct RecordedAdvisor {
    pub response_path: PathBuf,
}

impl RecordedAdvisor {
    pub fn new(response_path: impl Into<PathBuf>) -> Self {
        Self {
            response_path: response_path.into(),
        }
    }
}

impl RouteAdvisor for RecordedAdvisor {
    fn advise(&self, _frame: &Frame, _holds: &NormalizedHolds) -> Result<Route, AdvisoryError> {
        let contents = std::fs::read_to_string(&self.response_path).map_err(|e| {
            AdvisoryError::Unavailable(format!("{}: {}", self.response_path.display(), e))
        })?;
        serde_json::from_str(&contents)
            .map_err(|e| AdvisoryError::InvalidResponse(e.to_string()))
    }

    fn name(&self) -> &str {
        "recorded"
    }
}
