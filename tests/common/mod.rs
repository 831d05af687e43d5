mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from holdroute for tests
pub use holdroute::{
    CropSummary, DatasetConfig, DatasetPipeline, Detection, Difficulty, HoldDetector,
    HoldService, HoldVocabulary, ModelSlot, PixelBox, RouteOrigin, RoutePlanner,
    SidecarDetector, SplitSource,
};
