pub mod advisory;
pub mod normalize;
pub mod overlay;
pub mod sequencer;

pub use advisory::{NoAdvisor, RecordedAdvisor, RouteAdvisor};
pub use normalize::{NormalizedHolds, load_hold_json, normalize_holds};
pub use sequencer::{DifficultyAssessment, assess_difficulty, sequence_route};
