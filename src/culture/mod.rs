pub mod dimension;
pub mod router;
pub mod weights;

pub use dimension::Dimension;
pub use router::{resolve, PipelineVariant};
pub use weights::{modulate, ModulationConfig, WeightTable};
