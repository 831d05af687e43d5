pub mod config;
pub mod detection;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod route;
pub mod service;

pub use config::{DatasetConfig, SplitSource};
pub use detection::{CropExtractor, CropSummary, HoldClassifier, HoldDetector, SidecarDetector, pad_box};
pub use error::{AdvisoryError, HoldError, SkipReason};
pub use models::{Detection, Difficulty, Frame, FrameSize, Hold, HoldId, HoldVocabulary, PixelBox, Route, RouteHold};
pub use pipeline::{DatasetPipeline, DatasetReport, RouteOrigin, RoutePlan, RoutePlanner};
pub use route::{NormalizedHolds, RouteAdvisor, normalize_holds, sequence_route};
pub use service::{HoldService, ModelSlot};
