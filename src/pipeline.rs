use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use image::ImageReader;
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::Serialize;
use serde_json::Value;

use crate::config::{DatasetConfig, SplitSource};
use crate::detection::{CropExtractor, CropSummary, HoldDetector};
use crate::error::{HoldError, Result, SkipReason};
use crate::models::{Frame, Route};
use crate::route::advisory::{NoAdvisor, RouteAdvisor};
use crate::route::normalize::{NormalizedHolds, load_hold_json, normalize_holds};
use crate::route::sequencer::sequence_route;

/// Extensions picked up when scanning an image folder
pub const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "webp"];

/// Decode an image file into a frame named after its file stem
pub fn load_frame(path: &Path) -> Result<Frame> {
    if !path.is_file() {
        return Err(HoldError::NotFound(path.to_path_buf()));
    }
    let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    let id = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "frame".to_string());
    Ok(Frame::new(id, image))
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.as_str()))
}

/// All images below `dir`, recursively, in sorted order. Symlinked
/// directories are not descended into. Folders that cannot be listed are
/// logged and skipped.
pub fn collect_images(dir: &Path) -> Vec<PathBuf> {
    let mut images = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let entries = match std::fs::read_dir(&current) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("cannot read folder {}: {}", current.display(), e);
                continue;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("cannot read entry in {}: {}", current.display(), e);
                    continue;
                }
            };
            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(e) => {
                    warn!("cannot stat {}: {}", entry.path().display(), e);
                    continue;
                }
            };

            let path = entry.path();
            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_symlink() && path.is_dir() {
                debug!("not following symlinked folder {}", path.display());
            } else if is_image(&path) {
                images.push(path);
            }
        }
    }

    images.sort();
    images
}

/// Frame id for `path` relative to the folder it was collected from. Nested
/// images get their folder names joined in, so `a/wall.jpg` and `b/wall.jpg`
/// produce different crop names.
pub fn frame_id(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path).with_extension("");
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        "frame".to_string()
    } else {
        parts.join("_")
    }
}

/// Crop counts per split for a whole dataset run
#[derive(Debug, Clone, Default)]
pub struct DatasetReport {
    pub splits: BTreeMap<String, CropSummary>,
}

impl DatasetReport {
    pub fn total(&self) -> usize {
        self.splits.values().map(CropSummary::total).sum()
    }

    pub fn split(&self, name: &str) -> Option<&CropSummary> {
        self.splits.get(name)
    }

    fn add(&mut self, split: &str, summary: &CropSummary) {
        self.splits
            .entry(split.to_string())
            .or_default()
            .merge(summary);
    }
}

/// Generates classifier crops for image folders using a worker pool
pub struct DatasetPipeline {
    extractor: CropExtractor,
    detector: Arc<dyn HoldDetector>,
    workers: usize,
    cancel: Arc<AtomicBool>,
}

impl DatasetPipeline {
    pub fn new(extractor: CropExtractor, detector: Arc<dyn HoldDetector>) -> Self {
        Self {
            extractor,
            detector,
            workers: 1,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn from_config(config: &DatasetConfig, detector: Arc<dyn HoldDetector>) -> Self {
        let extractor = CropExtractor::new(&config.output_dir, config.class_names.clone())
            .with_padding(config.padding)
            .with_threshold(config.conf_threshold);
        Self::new(extractor, detector).with_workers(config.worker_count())
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn extractor(&self) -> &CropExtractor {
        &self.extractor
    }

    /// Flag that stops workers from taking further frames once set.
    /// Crops already written are kept.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn run(&self, sources: &[SplitSource]) -> Result<DatasetReport> {
        let mut report = DatasetReport::default();
        for source in sources {
            if self.cancel.load(Ordering::Relaxed) {
                info!("cancelled; skipping remaining splits");
                break;
            }
            let summary = self.run_split(&source.split, &source.dir)?;
            report.add(&source.split, &summary);
        }
        Ok(report)
    }

    /// Process every image under `dir` into `split`. A missing or empty folder
    /// yields an empty summary.
    pub fn run_split(&self, split: &str, dir: &Path) -> Result<CropSummary> {
        let mut summary = CropSummary::for_vocabulary(&self.extractor.vocabulary);

        if !dir.is_dir() {
            warn!("folder not found: {}", dir.display());
            return Ok(summary);
        }

        let images = collect_images(dir);
        if images.is_empty() {
            warn!("no images found in {}", dir.display());
            return Ok(summary);
        }

        info!("processing {}: {} images from {}", split, images.len(), dir.display());
        self.extractor.prepare_split(split)?;

        summary.merge(&self.execute(split, dir, &images)?);

        info!("{} crops generated: {}", split, summary.total());
        for (class_name, count) in &summary.per_class {
            info!("  {}: {}", class_name, count);
        }
        Ok(summary)
    }

    /// Fan frames out over the worker pool. Each worker folds its frames
    /// into a partial summary and the partials are merged at the end, so the
    /// counts do not depend on the number of workers.
    fn execute(&self, split: &str, root: &Path, images: &[PathBuf]) -> Result<CropSummary> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()
            .map_err(|e| HoldError::Worker(format!("failed to start crop workers: {}", e)))?;

        let summary = pool.install(|| {
            images
                .par_iter()
                .map(|path| {
                    if self.cancel.load(Ordering::Relaxed) {
                        return CropSummary::default();
                    }
                    self.process_frame(root, path, split)
                })
                .reduce(CropSummary::default, |mut acc, partial| {
                    acc.merge(&partial);
                    acc
                })
        });
        Ok(summary)
    }

    /// Detect and crop one image collected from `root`. Failures to read the
    /// frame or run the detector are logged and counted, never propagated.
    pub fn process_frame(&self, root: &Path, path: &Path, split: &str) -> CropSummary {
        let mut summary = CropSummary::default();

        let mut frame = match load_frame(path) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("skipping unreadable frame {}: {}", path.display(), e);
                summary.skipped.record(&SkipReason::UnreadableFrame(e.to_string()));
                return summary;
            }
        };
        frame.id = frame_id(root, path);

        let detections = match self
            .detector
            .detect(&frame, path, self.extractor.conf_threshold)
        {
            Ok(detections) => detections,
            Err(e) => {
                warn!("{} failed on {}: {}", self.detector.name(), path.display(), e);
                summary.skipped.record(&SkipReason::DetectorFailed(e.to_string()));
                return summary;
            }
        };

        debug!("{}: {} detections", frame.id, detections.len());
        self.extractor.extract(&frame, &detections, split)
    }
}

/// Who produced a planned route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RouteOrigin {
    Advisory,
    Local,
}

/// A route together with the normalized holds it was planned from
#[derive(Debug, Clone, Serialize)]
pub struct RoutePlan {
    pub holds: NormalizedHolds,
    pub route: Route,
    pub origin: RouteOrigin,
}

/// Plans a route for a single wall photo, preferring the advisory service and
/// falling back to the local sequencer when it fails.
pub struct RoutePlanner {
    advisor: Arc<dyn RouteAdvisor>,
}

impl RoutePlanner {
    pub fn new(advisor: Arc<dyn RouteAdvisor>) -> Self {
        Self { advisor }
    }

    /// Planner that always uses the local sequencer
    pub fn local() -> Self {
        Self::new(Arc::new(NoAdvisor))
    }

    pub fn plan_files(&self, image_path: &Path, holds_path: &Path) -> Result<RoutePlan> {
        let frame = load_frame(image_path)?;
        let hold_data = load_hold_json(holds_path)?;
        self.plan(&frame, &hold_data)
    }

    pub fn plan(&self, frame: &Frame, hold_data: &Value) -> Result<RoutePlan> {
        let holds = normalize_holds(hold_data, frame.size()?)?;

        let (route, origin) = match self.advisor.advise(frame, &holds) {
            Ok(route) => (route, RouteOrigin::Advisory),
            Err(e) => {
                warn!(
                    "{} advisor failed ({}); using local route heuristics",
                    self.advisor.name(),
                    e
                );
                (sequence_route(&holds.holds), RouteOrigin::Local)
            }
        };

        Ok(RoutePlan {
            holds,
            route,
            origin,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_extensions_are_case_insensitive() {
        assert!(is_image(Path::new("a/b.JPG")));
        assert!(is_image(Path::new("a/b.webp")));
        assert!(!is_image(Path::new("a/b.json")));
        assert!(!is_image(Path::new("a/b")));
    }

    #[test]
    fn collect_images_recurses_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("nested/deeper")).unwrap();
        for name in ["b.png", "a.jpg", "notes.txt", "nested/c.jpeg", "nested/deeper/d.bmp"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }

        let images = collect_images(dir.path());
        let names: Vec<String> = images
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.png", "nested/c.jpeg", "nested/deeper/d.bmp"]);
    }

    #[test]
    fn unreadable_root_gives_no_images() {
        assert!(collect_images(Path::new("/no/such/folder")).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn collect_images_skips_symlinked_folders() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("wall.png"), b"").unwrap();
        std::os::unix::fs::symlink(dir.path(), dir.path().join("loop")).unwrap();

        let images = collect_images(dir.path());
        assert_eq!(images, vec![dir.path().join("wall.png")]);
    }

    #[test]
    fn frame_id_includes_subfolders() {
        let root = Path::new("/data/train");
        assert_eq!(frame_id(root, Path::new("/data/train/wall.jpg")), "wall");
        assert_eq!(frame_id(root, Path::new("/data/train/gym_a/wall.jpg")), "gym_a_wall");
        assert_ne!(
            frame_id(root, Path::new("/data/train/a/wall.jpg")),
            frame_id(root, Path::new("/data/train/b/wall.jpg"))
        );
    }

    #[test]
    fn load_frame_reports_missing_file() {
        let err = load_frame(Path::new("/missing/wall.jpg")).unwrap_err();
        assert!(matches!(err, HoldError::NotFound(_)));
    }
}
