use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};

use log::info;
use serde_json::{Value, json};

use crate::detection::padding::{CropRegion, pad_box};
use crate::detection::{ClassDistribution, HoldClassifier, HoldDetector};
use crate::error::{HoldError, Result};
use crate::models::{Detection, Frame, HoldVocabulary};

type Loader<T> = Box<dyn Fn() -> Result<Arc<T>> + Send + Sync>;

/// A model handle loaded at most once, on first use
pub struct ModelSlot<T: ?Sized> {
    name: String,
    cell: OnceLock<Arc<T>>,
    loader: Loader<T>,
    init: Mutex<()>,
}

impl<T: ?Sized> ModelSlot<T> {
    pub fn new<F>(name: impl Into<String>, loader: F) -> Self
    where
        F: Fn() -> Result<Arc<T>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            cell: OnceLock::new(),
            loader: Box::new(loader),
            init: Mutex::new(()),
        }
    }

    /// Slot holding an already constructed model
    pub fn ready(name: impl Into<String>, model: Arc<T>) -> Self {
        let slot = Self::new(name, || {
            Err(HoldError::Worker("preloaded model slot has no loader".to_string()))
        });
        let _ = slot.cell.set(model);
        slot
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Return the model, loading it if this is the first access. Concurrent
    /// first accesses wait on the init lock, so the loader runs once.
    pub fn get(&self) -> Result<Arc<T>> {
        if let Some(model) = self.cell.get() {
            return Ok(model.clone());
        }

        let _guard = self.init.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(model) = self.cell.get() {
            return Ok(model.clone());
        }

        info!("loading {} model", self.name);
        let model = (self.loader)()?;
        Ok(self.cell.get_or_init(|| model).clone())
    }
}

/// Detection with the classifier's view of its crop
#[derive(Debug, Clone)]
pub struct ClassifiedHold {
    pub detection: Detection,
    pub distribution: ClassDistribution,
}

/// Owns the detector and classifier for the lifetime of the process and
/// hands them to request handling code.
pub struct HoldService {
    detector: ModelSlot<dyn HoldDetector>,
    classifier: ModelSlot<dyn HoldClassifier>,
    vocabulary: HoldVocabulary,
    padding: f32,
    conf_threshold: f32,
}

impl HoldService {
    pub fn new(
        detector: ModelSlot<dyn HoldDetector>,
        classifier: ModelSlot<dyn HoldClassifier>,
        vocabulary: HoldVocabulary,
    ) -> Self {
        Self {
            detector,
            classifier,
            vocabulary,
            padding: crate::config::DEFAULT_PADDING,
            conf_threshold: crate::config::DEFAULT_CONF_THRESHOLD,
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

    pub fn detector(&self) -> Result<Arc<dyn HoldDetector>> {
        self.detector.get()
    }

    pub fn classifier(&self) -> Result<Arc<dyn HoldClassifier>> {
        self.classifier.get()
    }

    pub fn vocabulary(&self) -> &HoldVocabulary {
        &self.vocabulary
    }

    /// Detect holds and classify each padded crop. Detections whose crop
    /// region is empty are left out.
    pub fn classify_frame(&self, frame: &Frame, source: &Path) -> Result<Vec<ClassifiedHold>> {
        let detector = self.detector()?;
        let detections = detector.detect(frame, source, self.conf_threshold)?;
        if detections.is_empty() {
            return Ok(Vec::new());
        }

        let classifier = self.classifier()?;
        let mut results = Vec::with_capacity(detections.len());

        for detection in detections {
            let padded = pad_box(&detection.bbox, frame.width(), frame.height(), self.padding);
            let region = CropRegion::from_padded(&padded);
            if region.is_empty() {
                continue;
            }
            let crop = frame
                .image
                .crop_imm(region.x, region.y, region.width, region.height);
            let distribution = classifier.classify(&crop)?;
            results.push(ClassifiedHold {
                detection,
                distribution,
            });
        }

        Ok(results)
    }

    /// Run the detector and express its output as hold JSON ready for
    /// normalization and route planning.
    pub fn detect_holds_json(&self, frame: &Frame, source: &Path) -> Result<Value> {
        let detections = self.detector()?.detect(frame, source, self.conf_threshold)?;
        Ok(detections_to_hold_json(&detections, &self.vocabulary))
    }
}

/// `{"holds": [...]}` with one entry per detection; ids follow detection order
pub fn detections_to_hold_json(detections: &[Detection], vocabulary: &HoldVocabulary) -> Value {
    let holds: Vec<Value> = detections
        .iter()
        .enumerate()
        .map(|(i, d)| {
            json!({
                "id": i,
                "type": vocabulary.name(d.class_id).unwrap_or(crate::route::normalize::UNKNOWN_TYPE),
                "bbox": [d.bbox.x1, d.bbox.y1, d.bbox.x2, d.bbox.y2],
                "confidence": d.confidence,
            })
        })
        .collect();
    json!({ "holds": holds })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FrameSize, PixelBox};
    use crate::route::normalize::normalize_holds;
    use image::{DynamicImage, RgbImage};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedDetector(Vec<Detection>);

    impl HoldDetector for FixedDetector {
        fn detect(&self, _frame: &Frame, _source: &Path, conf: f32) -> Result<Vec<Detection>> {
            Ok(self.0.iter().copied().filter(|d| d.confidence >= conf).collect())
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    struct AreaClassifier(Vec<String>);

    impl HoldClassifier for AreaClassifier {
        fn classify(&self, crop: &DynamicImage) -> Result<ClassDistribution> {
            // Small crops read as crimps, everything else as jugs
            let small = crop.width() * crop.height() < 400;
            let probs: [f32; 2] = if small { [0.1, 0.9] } else { [0.9, 0.1] };
            Ok(ClassDistribution::new(&self.0, &probs))
        }

        fn name(&self) -> &str {
            "area"
        }
    }

    fn detection(class_id: u32, confidence: f32, b: [f32; 4]) -> Detection {
        Detection {
            class_id,
            confidence,
            bbox: PixelBox::from(b),
        }
    }

    fn service(detections: Vec<Detection>) -> HoldService {
        let labels = vec!["jug".to_string(), "crimp".to_string()];
        HoldService::new(
            ModelSlot::ready("detector", Arc::new(FixedDetector(detections)) as Arc<dyn HoldDetector>),
            ModelSlot::ready("classifier", Arc::new(AreaClassifier(labels)) as Arc<dyn HoldClassifier>),
            HoldVocabulary::default(),
        )
    }

    fn frame() -> Frame {
        Frame::new("wall", DynamicImage::ImageRgb8(RgbImage::new(100, 100)))
    }

    #[test]
    fn loader_runs_once_across_threads() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let slot: ModelSlot<dyn HoldDetector> = ModelSlot::new("detector", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(FixedDetector(vec![])) as Arc<dyn HoldDetector>)
        });

        assert!(!slot.is_loaded());
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| slot.get().unwrap());
            }
        });
        assert!(slot.is_loaded());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_load_is_retried_on_next_access() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let slot: ModelSlot<dyn HoldDetector> = ModelSlot::new("detector", move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(HoldError::detector("weights missing"))
            } else {
                Ok(Arc::new(FixedDetector(vec![])) as Arc<dyn HoldDetector>)
            }
        });

        assert!(slot.get().is_err());
        assert!(slot.get().is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn classifies_each_usable_detection() {
        let svc = service(vec![
            detection(0, 0.9, [10.0, 10.0, 50.0, 50.0]),
            detection(1, 0.8, [60.0, 60.0, 70.0, 70.0]),
            detection(1, 0.1, [0.0, 0.0, 90.0, 90.0]),
            detection(0, 0.9, [200.0, 200.0, 220.0, 220.0]),
        ]);

        let results = svc.classify_frame(&frame(), Path::new("wall.jpg")).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].distribution.top().map(|(l, _)| l), Some("jug"));
        assert_eq!(results[1].distribution.top().map(|(l, _)| l), Some("crimp"));
    }

    #[test]
    fn detector_output_normalizes_into_holds() {
        let svc = service(vec![
            detection(0, 0.9, [0.0, 80.0, 20.0, 100.0]),
            detection(7, 0.9, [0.0, 0.0, 20.0, 20.0]),
        ]);

        let data = svc.detect_holds_json(&frame(), Path::new("wall.jpg")).unwrap();
        let normalized = normalize_holds(&data, FrameSize::new(100, 100).unwrap()).unwrap();
        assert_eq!(normalized.holds.len(), 2);
        assert_eq!(normalized.holds[0].hold_type, "jug");
        assert_eq!(normalized.holds[1].hold_type, "Unknown");
        assert_eq!(normalized.holds[0].center_norm, [0.1, 0.9]);
    }
}
