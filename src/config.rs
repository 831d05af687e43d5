use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::models::HoldVocabulary;

pub const DEFAULT_CONF_THRESHOLD: f32 = 0.3;
pub const DEFAULT_PADDING: f32 = 0.15;
pub const DEFAULT_OUTPUT_DIR: &str = "holds_cls_finetuned";

/// One input folder feeding one dataset split
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SplitSource {
    pub split: String,
    pub dir: PathBuf,
}

impl SplitSource {
    pub fn new(split: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            split: split.into(),
            dir: dir.into(),
        }
    }
}

/// Settings for a crop-generation run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub output_dir: PathBuf,
    pub conf_threshold: f32,
    pub padding: f32,
    pub class_names: HoldVocabulary,
    /// Worker threads; 0 means one per available core
    pub workers: usize,
    pub sources: Vec<SplitSource>,
    /// Optional folder of uncurated images added to the train split
    pub raw_folder: Option<PathBuf>,
    /// Detection sidecars live here instead of next to the images
    pub sidecar_dir: Option<PathBuf>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            conf_threshold: DEFAULT_CONF_THRESHOLD,
            padding: DEFAULT_PADDING,
            class_names: HoldVocabulary::default(),
            workers: 0,
            sources: Vec::new(),
            raw_folder: None,
            sidecar_dir: None,
        }
    }
}

impl DatasetConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading dataset config {}", path_ref.display()))?;
        let config: DatasetConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing dataset config {}", path_ref.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Build a config from the usual train/val/test folders
    pub fn from_args(
        output_dir: PathBuf,
        train: Option<PathBuf>,
        val: Option<PathBuf>,
        test: Option<PathBuf>,
        conf_threshold: f32,
        padding: f32,
    ) -> Self {
        let sources = [("train", train), ("val", val), ("test", test)]
            .into_iter()
            .filter_map(|(split, dir)| dir.map(|d| SplitSource::new(split, d)))
            .collect();

        Self {
            output_dir,
            conf_threshold,
            padding,
            sources,
            ..Self::default()
        }
    }

    pub fn with_raw_folder(mut self, raw_folder: Option<PathBuf>) -> Self {
        self.raw_folder = raw_folder;
        self
    }

    /// All sources in processing order, raw images last into train
    pub fn all_sources(&self) -> Vec<SplitSource> {
        let mut sources = self.sources.clone();
        if let Some(raw) = &self.raw_folder {
            sources.push(SplitSource::new("train", raw.clone()));
        }
        sources
    }

    pub fn worker_count(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.conf_threshold),
            "confidence threshold must be within [0, 1], got {}",
            self.conf_threshold
        );
        anyhow::ensure!(
            self.padding >= 0.0,
            "padding must be non-negative, got {}",
            self.padding
        );
        anyhow::ensure!(!self.class_names.is_empty(), "class_names must not be empty");
        Ok(())
    }
}
