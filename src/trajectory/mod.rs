pub mod rag;
pub mod recorder;
pub mod store;

pub use rag::{AggregatePatterns, Retrieved, TrajectoryIndex};
pub use recorder::{RoundRecord, TrajectoryRecord, TrajectoryRecorder};
pub use store::TrajectoryStore;
