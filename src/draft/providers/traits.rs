use crate::error::ProviderError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One generation request, fully resolved (all clamping already applied by
/// the chain before the request reaches a provider).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub negative_prompt: String,
    pub seed: u64,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub sampler: String,
    pub output_path: PathBuf,
}

/// Successful generation: where the artifact landed and who rendered it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftOutput {
    /// Model reference of the provider that actually produced the artifact.
    /// Under fallback this is the succeeding provider, not the first
    /// configured one.
    pub provider: String,
    pub output_path: PathBuf,
    pub byte_len: u64,
}

/// Generation provider contract. Implementations must report failures as
/// distinguishable transient kinds (rate-limit / timeout / connection) so the
/// chain can retry and log them; the reference mock provider always succeeds
/// and terminates any fallback chain.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Stable model reference recorded on candidates ("mock/procedural-v1").
    fn model_ref(&self) -> &str;

    /// Whether the provider can currently serve requests.
    fn available(&self) -> bool {
        true
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<DraftOutput, ProviderError>;
}
