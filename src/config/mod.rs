pub mod schema;

pub use schema::{AtelierConfig, CriticConfig, DraftConfig, OrchestratorConfig, QueenConfig};
