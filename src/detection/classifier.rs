use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Probability per hold type for a single crop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassDistribution {
    pub probs: Vec<(String, f32)>,
}

impl ClassDistribution {
    pub fn new(labels: &[String], probs: &[f32]) -> Self {
        Self {
            probs: labels.iter().cloned().zip(probs.iter().copied()).collect(),
        }
    }

    pub fn get(&self, label: &str) -> Option<f32> {
        self.probs.iter().find(|(l, _)| l == label).map(|(_, p)| *p)
    }

    /// Most likely label; ties go to the earlier label
    pub fn top(&self) -> Option<(&str, f32)> {
        let mut best: Option<(&str, f32)> = None;
        for (label, p) in &self.probs {
            match best {
                Some((_, bp)) if bp >= *p => {}
                _ => best = Some((label.as_str(), *p)),
            }
        }
        best
    }

    /// Labels whose probability reaches `threshold` (multi-label reading)
    pub fn active(&self, threshold: f32) -> Vec<&str> {
        self.probs
            .iter()
            .filter(|(_, p)| *p >= threshold)
            .map(|(l, _)| l.as_str())
            .collect()
    }
}

/// Common interface for hold-type classifiers working on crops
pub trait HoldClassifier: Send + Sync {
    fn classify(&self, crop: &DynamicImage) -> Result<ClassDistribution>;

    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> Vec<String> {
        vec!["jug".into(), "crimp".into(), "sloper".into()]
    }

    #[test]
    fn top_picks_highest_probability() {
        let dist = ClassDistribution::new(&labels(), &[0.1, 0.7, 0.2]);
        assert_eq!(dist.top(), Some(("crimp", 0.7)));
        assert_eq!(dist.get("sloper"), Some(0.2));
    }

    #[test]
    fn top_breaks_ties_by_order() {
        let dist = ClassDistribution::new(&labels(), &[0.5, 0.5, 0.0]);
        assert_eq!(dist.top().map(|(l, _)| l), Some("jug"));
    }

    #[test]
    fn active_filters_by_threshold() {
        let dist = ClassDistribution::new(&labels(), &[0.6, 0.5, 0.4]);
        assert_eq!(dist.active(0.5), vec!["jug", "crimp"]);
    }
}
