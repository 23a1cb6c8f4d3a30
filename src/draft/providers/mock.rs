use super::traits::{DraftOutput, GenerationProvider, GenerationRequest};
use crate::error::{FailureKind, ProviderError};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU32, Ordering};

/// Bytes of synthetic artifact the mock provider renders.
const MOCK_ARTIFACT_LEN: usize = 1024;

/// Reference provider: always succeeds, byte-identical output for identical
/// (prompt, seed, provider). The seed-reproducibility contract is validated
/// end-to-end against this provider.
pub struct MockProvider {
    model_ref: String,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            model_ref: "mock/procedural-v1".into(),
        }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Deterministic byte expansion: counter-mode SHA-256 over the identifying
/// request fields.
pub(crate) fn render_deterministic(model_ref: &str, request: &GenerationRequest) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(MOCK_ARTIFACT_LEN);
    let mut counter: u32 = 0;
    while bytes.len() < MOCK_ARTIFACT_LEN {
        let mut hasher = Sha256::new();
        hasher.update(model_ref.as_bytes());
        hasher.update(request.prompt.as_bytes());
        hasher.update(request.negative_prompt.as_bytes());
        hasher.update(request.seed.to_le_bytes());
        hasher.update(request.width.to_le_bytes());
        hasher.update(request.height.to_le_bytes());
        hasher.update(request.steps.to_le_bytes());
        hasher.update(counter.to_le_bytes());
        bytes.extend_from_slice(&hasher.finalize());
        counter += 1;
    }
    bytes.truncate(MOCK_ARTIFACT_LEN);
    bytes
}

async fn write_artifact(
    provider: &str,
    request: &GenerationRequest,
    bytes: &[u8],
) -> Result<DraftOutput, ProviderError> {
    if let Some(parent) = request.output_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ProviderError::Rejected {
                provider: provider.to_string(),
                message: format!("cannot create output dir: {e}"),
            })?;
    }
    tokio::fs::write(&request.output_path, bytes)
        .await
        .map_err(|e| ProviderError::Rejected {
            provider: provider.to_string(),
            message: format!("cannot write artifact: {e}"),
        })?;
    Ok(DraftOutput {
        provider: provider.to_string(),
        output_path: request.output_path.clone(),
        byte_len: bytes.len() as u64,
    })
}

#[async_trait]
impl GenerationProvider for MockProvider {
    fn model_ref(&self) -> &str {
        &self.model_ref
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<DraftOutput, ProviderError> {
        let bytes = render_deterministic(&self.model_ref, request);
        write_artifact(&self.model_ref, request, &bytes).await
    }
}

// ─── Fault injection ────────────────────────────────────────────────────────

/// Mock provider that fails a configured number of times before succeeding
/// (or fails forever when `failures_before_success` is `None`). Used for
/// fallback-chain and retry-accounting tests.
pub struct FlakyProvider {
    model_ref: String,
    failures_before_success: Option<u32>,
    failure_kind: FailureKind,
    calls: AtomicU32,
}

impl FlakyProvider {
    pub fn new(failures_before_success: Option<u32>, failure_kind: FailureKind) -> Self {
        Self {
            model_ref: "mock/flaky-v1".into(),
            failures_before_success,
            failure_kind,
            calls: AtomicU32::new(0),
        }
    }

    pub fn always_failing(kind: FailureKind) -> Self {
        Self::new(None, kind)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationProvider for FlakyProvider {
    fn model_ref(&self) -> &str {
        &self.model_ref
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<DraftOutput, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let should_fail = match self.failures_before_success {
            Some(n) => call < n,
            None => true,
        };
        if should_fail {
            return Err(ProviderError::Attempt {
                provider: self.model_ref.clone(),
                kind: self.failure_kind,
                message: format!("injected fault on call {}", call + 1),
            });
        }
        let bytes = render_deterministic(&self.model_ref, request);
        write_artifact(&self.model_ref, request, &bytes).await
    }
}

/// Local-model stub: renders the same procedural artifact under a distinct
/// model reference. Stands in for an on-disk diffusion checkpoint until one
/// is wired up.
pub struct LocalModelProvider {
    model_ref: String,
}

impl LocalModelProvider {
    pub fn new(checkpoint: &str) -> Self {
        Self {
            model_ref: format!("local/{checkpoint}"),
        }
    }
}

#[async_trait]
impl GenerationProvider for LocalModelProvider {
    fn model_ref(&self) -> &str {
        &self.model_ref
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<DraftOutput, ProviderError> {
        let bytes = render_deterministic(&self.model_ref, request);
        write_artifact(&self.model_ref, request, &bytes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(dir: &std::path::Path, prompt: &str, seed: u64) -> GenerationRequest {
        GenerationRequest {
            prompt: prompt.into(),
            negative_prompt: "blurry".into(),
            seed,
            width: 512,
            height: 512,
            steps: 20,
            sampler: "euler_a".into(),
            output_path: dir.join(format!("{seed}.bin")),
        }
    }

    #[tokio::test]
    async fn identical_inputs_yield_byte_identical_output() {
        let dir = tempfile::tempdir().unwrap();
        let provider = MockProvider::new();
        let req = request(dir.path(), "a shanshui landscape", 7);

        provider.generate(&req).await.unwrap();
        let first = tokio::fs::read(&req.output_path).await.unwrap();
        provider.generate(&req).await.unwrap();
        let second = tokio::fs::read(&req.output_path).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), MOCK_ARTIFACT_LEN);
    }

    #[tokio::test]
    async fn different_seed_changes_output() {
        let dir = tempfile::tempdir().unwrap();
        let provider = MockProvider::new();
        let a = request(dir.path(), "a shanshui landscape", 7);
        let b = request(dir.path(), "a shanshui landscape", 8);

        provider.generate(&a).await.unwrap();
        provider.generate(&b).await.unwrap();
        let first = tokio::fs::read(&a.output_path).await.unwrap();
        let second = tokio::fs::read(&b.output_path).await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn flaky_fails_then_recovers() {
        let dir = tempfile::tempdir().unwrap();
        let provider = FlakyProvider::new(Some(2), FailureKind::Timeout);
        let req = request(dir.path(), "p", 1);

        assert!(provider.generate(&req).await.is_err());
        assert!(provider.generate(&req).await.is_err());
        assert!(provider.generate(&req).await.is_ok());
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn always_failing_reports_configured_kind() {
        let dir = tempfile::tempdir().unwrap();
        let provider = FlakyProvider::always_failing(FailureKind::RateLimit);
        let req = request(dir.path(), "p", 1);

        let err = provider.generate(&req).await.unwrap_err();
        assert_eq!(err.kind(), Some(FailureKind::RateLimit));
    }
}
