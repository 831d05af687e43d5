pub mod classifier;
pub mod crops;
pub mod detector;
pub mod padding;

pub use classifier::{ClassDistribution, HoldClassifier};
pub use crops::{CropExtractor, CropSummary, SkipCounts};
pub use detector::{HoldDetector, SidecarDetector};
pub use padding::{CropRegion, pad_box};
