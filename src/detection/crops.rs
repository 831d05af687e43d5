use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::config::{DEFAULT_CONF_THRESHOLD, DEFAULT_PADDING};
use crate::detection::padding::{CropRegion, pad_box};
use crate::error::{Result, SkipReason};
use crate::models::{Detection, Frame, HoldVocabulary};

/// Counts for detections that did not produce a crop
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkipCounts {
    pub below_threshold: usize,
    pub unknown_class: usize,
    pub empty_region: usize,
    pub write_failed: usize,
    pub unreadable_frames: usize,
    pub detector_failures: usize,
}

impl SkipCounts {
    pub fn record(&mut self, reason: &SkipReason) {
        match reason {
            SkipReason::BelowThreshold { .. } => self.below_threshold += 1,
            SkipReason::UnknownClass(_) => self.unknown_class += 1,
            SkipReason::EmptyRegion => self.empty_region += 1,
            SkipReason::WriteFailed(_) => self.write_failed += 1,
            SkipReason::UnreadableFrame(_) => self.unreadable_frames += 1,
            SkipReason::DetectorFailed(_) => self.detector_failures += 1,
        }
    }

    fn merge(&mut self, other: &SkipCounts) {
        self.below_threshold += other.below_threshold;
        self.unknown_class += other.unknown_class;
        self.empty_region += other.empty_region;
        self.write_failed += other.write_failed;
        self.unreadable_frames += other.unreadable_frames;
        self.detector_failures += other.detector_failures;
    }
}

/// Crops written per class, plus what was skipped
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CropSummary {
    pub per_class: BTreeMap<String, usize>,
    pub skipped: SkipCounts,
}

impl CropSummary {
    /// Summary with a zero entry for every class, so reports list empty classes too
    pub fn for_vocabulary(vocabulary: &HoldVocabulary) -> Self {
        Self {
            per_class: vocabulary.names().iter().map(|n| (n.clone(), 0)).collect(),
            skipped: SkipCounts::default(),
        }
    }

    pub fn total(&self) -> usize {
        self.per_class.values().sum()
    }

    pub fn count(&self, class_name: &str) -> usize {
        self.per_class.get(class_name).copied().unwrap_or(0)
    }

    pub fn record_crop(&mut self, class_name: &str) {
        *self.per_class.entry(class_name.to_string()).or_insert(0) += 1;
    }

    /// Fold a partial summary (e.g. from another worker) into this one
    pub fn merge(&mut self, other: &CropSummary) {
        for (class_name, count) in &other.per_class {
            *self.per_class.entry(class_name.clone()).or_insert(0) += count;
        }
        self.skipped.merge(&other.skipped);
    }
}

/// Cuts padded detections out of frames and files them by split and class
#[derive(Debug, Clone)]
pub struct CropExtractor {
    pub output_root: PathBuf,
    pub vocabulary: HoldVocabulary,
    pub padding: f32,
    pub conf_threshold: f32,
}

impl CropExtractor {
    pub fn new(output_root: impl Into<PathBuf>, vocabulary: HoldVocabulary) -> Self {
        Self {
            output_root: output_root.into(),
            vocabulary,
            padding: DEFAULT_PADDING,
            conf_threshold: DEFAULT_CONF_THRESHOLD,
        }
    }

    pub fn with_padding(mut self, padding: f32) -> Self {
        self.padding = padding;
        self
    }

    pub fn with_threshold(mut self, conf_threshold: f32) -> Self {
        self.conf_threshold = conf_threshold;
        self
    }

    pub fn split_dir(&self, split: &str) -> PathBuf {
        self.output_root.join(split)
    }

    /// Create one directory per class for `split`, even if no crop will land there
    pub fn prepare_split(&self, split: &str) -> Result<()> {
        let split_dir = self.split_dir(split);
        for class_name in self.vocabulary.names() {
            std::fs::create_dir_all(split_dir.join(class_name))?;
        }
        Ok(())
    }

    /// File name carrying frame identity, detection index and confidence
    pub fn crop_filename(frame_id: &str, index: usize, confidence: f32) -> String {
        format!("{}_crop{}_{:.2}.jpg", frame_id, index, confidence)
    }

    /// Write crops for every usable detection of one frame
    pub fn extract(&self, frame: &Frame, detections: &[Detection], split: &str) -> CropSummary {
        let mut summary = CropSummary::default();
        let split_dir = self.split_dir(split);

        for (index, detection) in detections.iter().enumerate() {
            match self.extract_one(frame, index, detection, &split_dir) {
                Ok((class_name, path)) => {
                    debug!("{}: wrote {}", frame.id, path.display());
                    summary.record_crop(&class_name);
                }
                Err(reason) => {
                    if matches!(reason, SkipReason::BelowThreshold { .. }) {
                        debug!("{} detection {}: {}", frame.id, index, reason);
                    } else {
                        warn!("{} detection {}: skipped, {}", frame.id, index, reason);
                    }
                    summary.skipped.record(&reason);
                }
            }
        }

        summary
    }

    fn extract_one(
        &self,
        frame: &Frame,
        index: usize,
        detection: &Detection,
        split_dir: &Path,
    ) -> std::result::Result<(String, PathBuf), SkipReason> {
        if detection.confidence < self.conf_threshold {
            return Err(SkipReason::BelowThreshold {
                confidence: detection.confidence,
                threshold: self.conf_threshold,
            });
        }

        let class_name = self
            .vocabulary
            .name(detection.class_id)
            .ok_or(SkipReason::UnknownClass(detection.class_id))?;

        let padded = pad_box(&detection.bbox, frame.width(), frame.height(), self.padding);
        let region = CropRegion::from_padded(&padded);
        if region.is_empty() {
            return Err(SkipReason::EmptyRegion);
        }

        let crop = frame
            .image
            .crop_imm(region.x, region.y, region.width, region.height);

        let path = split_dir
            .join(class_name)
            .join(Self::crop_filename(&frame.id, index, detection.confidence));

        // JPEG has no alpha channel
        image::DynamicImage::ImageRgb8(crop.to_rgb8())
            .save(&path)
            .map_err(|e| SkipReason::WriteFailed(e.to_string()))?;

        Ok((class_name.to_string(), path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PixelBox;
    use image::{DynamicImage, RgbImage};

    fn frame(w: u32, h: u32) -> Frame {
        Frame::new("wall", DynamicImage::ImageRgb8(RgbImage::new(w, h)))
    }

    fn detection(class_id: u32, confidence: f32, b: [f32; 4]) -> Detection {
        Detection {
            class_id,
            confidence,
            bbox: PixelBox::from(b),
        }
    }

    #[test]
    fn filename_rounds_confidence_to_two_places() {
        assert_eq!(CropExtractor::crop_filename("img_01", 3, 0.876), "img_01_crop3_0.88.jpg");
    }

    #[test]
    fn writes_crops_and_counts_per_class() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = CropExtractor::new(dir.path(), HoldVocabulary::default());
        extractor.prepare_split("train").unwrap();

        let detections = vec![
            detection(0, 0.9, [10.0, 10.0, 30.0, 30.0]),
            detection(1, 0.8, [40.0, 40.0, 60.0, 50.0]),
            detection(0, 0.5, [0.0, 0.0, 5.0, 5.0]),
        ];
        let summary = extractor.extract(&frame(100, 80), &detections, "train");

        assert_eq!(summary.total(), 3);
        assert_eq!(summary.count("jug"), 2);
        assert_eq!(summary.count("crimp"), 1);
        assert!(dir.path().join("train/jug/wall_crop0_0.90.jpg").is_file());
        assert!(dir.path().join("train/crimp/wall_crop1_0.80.jpg").is_file());
        assert!(dir.path().join("train/jug/wall_crop2_0.50.jpg").is_file());
    }

    #[test]
    fn skips_unknown_class_low_confidence_and_empty_regions() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = CropExtractor::new(dir.path(), HoldVocabulary::default());
        extractor.prepare_split("val").unwrap();

        let detections = vec![
            detection(42, 0.9, [10.0, 10.0, 30.0, 30.0]),
            detection(2, 0.1, [10.0, 10.0, 30.0, 30.0]),
            detection(3, 0.9, [150.0, 150.0, 160.0, 160.0]),
        ];
        let summary = extractor.extract(&frame(100, 100), &detections, "val");

        assert_eq!(summary.total(), 0);
        assert_eq!(summary.skipped.unknown_class, 1);
        assert_eq!(summary.skipped.below_threshold, 1);
        assert_eq!(summary.skipped.empty_region, 1);
        assert_eq!(std::fs::read_dir(dir.path().join("val/sloper")).unwrap().count(), 0);
    }

    #[test]
    fn merge_adds_counts() {
        let vocab = HoldVocabulary::default();
        let mut a = CropSummary::for_vocabulary(&vocab);
        a.record_crop("jug");
        let mut b = CropSummary::default();
        b.record_crop("jug");
        b.record_crop("pocket");
        b.skipped.record(&SkipReason::EmptyRegion);

        a.merge(&b);
        assert_eq!(a.count("jug"), 2);
        assert_eq!(a.count("pocket"), 1);
        assert_eq!(a.count("volume"), 0);
        assert_eq!(a.total(), 3);
        assert_eq!(a.skipped.empty_region, 1);
    }
}
