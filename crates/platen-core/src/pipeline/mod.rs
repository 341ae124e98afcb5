//! Stage graph, state tracking, and orchestration.

mod controller;
mod stage;
mod tracker;

pub use controller::{PipelineController, StageResult};
pub use stage::Stage;
pub use tracker::{Progress, StageTracker};
