use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{HoldError, Result};
use crate::models::{Detection, Frame};

/// Common interface for hold detectors
pub trait HoldDetector: Send + Sync {
    /// Detect holds in a frame, keeping only detections at or above `conf_threshold`
    fn detect(&self, frame: &Frame, source: &Path, conf_threshold: f32) -> Result<Vec<Detection>>;

    /// Detector name (for logging)
    fn name(&self) -> &str;
}

#[derive(Debug, Deserialize)]
struct SidecarFile {
    #[serde(default)]
    detections: Vec<Detection>,
}

/// Reads detections exported by an offline detector run.
///
/// For `wall/img_01.jpg` the detections live in `wall/img_01.json` (or under
/// `sidecar_dir` when set) as `{"detections": [{"class_id", "confidence", "bbox"}]}`.
/// A frame without a sidecar has no detections.
#[derive(Debug, Clone, Default)]
pub struct SidecarDetector {
    pub sidecar_dir: Option<PathBuf>,
}

impl SidecarDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sidecar_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.sidecar_dir = Some(dir.into());
        self
    }

    pub fn sidecar_path(&self, source: &Path) -> PathBuf {
        match (&self.sidecar_dir, source.file_stem()) {
            (Some(dir), Some(stem)) => dir.join(format!("{}.json", stem.to_string_lossy())),
            _ => source.with_extension("json"),
        }
    }
}

impl HoldDetector for SidecarDetector {
    fn detect(&self, _frame: &Frame, source: &Path, conf_threshold: f32) -> Result<Vec<Detection>> {
        let path = self.sidecar_path(source);
        if !path.is_file() {
            log::debug!("no detections sidecar at {}", path.display());
            return Ok(Vec::new());
        }

        let contents = std::fs::read_to_string(&path)?;
        let file: SidecarFile = serde_json::from_str(&contents)
            .map_err(|e| HoldError::detector(format!("{}: {}", path.display(), e)))?;

        Ok(file
            .detections
            .into_iter()
            .filter(|d| d.confidence >= conf_threshold)
            .collect())
    }

    fn name(&self) -> &str {
        "sidecar"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage};

    #[test]
    fn reads_sidecar_and_applies_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = dir.path().join("img_01.jpg");
        std::fs::write(
            dir.path().join("img_01.json"),
            r#"{"detections": [
                {"class_id": 0, "confidence": 0.9, "bbox": [1, 2, 3, 4]},
                {"class_id": 1, "confidence": 0.2, "bbox": [5, 6, 7, 8]}
            ]}"#,
        )
        .unwrap();

        let frame = Frame::new("img_01", DynamicImage::ImageRgb8(RgbImage::new(10, 10)));
        let detections = SidecarDetector::new().detect(&frame, &image_path, 0.3).unwrap();

        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].class_id, 0);
        assert_eq!(detections[0].bbox.x2, 3.0);
    }

    #[test]
    fn missing_sidecar_means_no_detections() {
        let dir = tempfile::tempdir().unwrap();
        let frame = Frame::new("x", DynamicImage::ImageRgb8(RgbImage::new(4, 4)));
        let detections = SidecarDetector::new()
            .detect(&frame, &dir.path().join("x.png"), 0.0)
            .unwrap();
        assert!(detections.is_empty());
    }

    #[test]
    fn sidecar_dir_overrides_image_location() {
        let detector = SidecarDetector::new().with_sidecar_dir("/labels");
        assert_eq!(
            detector.sidecar_path(Path::new("/photos/a/wall.jpg")),
            PathBuf::from("/labels/wall.json")
        );
    }
}
