use super::traits::{DraftOutput, GenerationProvider, GenerationRequest};
use crate::error::{FailureKind, ProviderError};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Remote generation endpoint speaking a minimal JSON contract:
/// POST {base_url}/v1/generate with the request fields, base64 image back.
pub struct RemoteApiProvider {
    model_ref: String,
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct RemoteGenerationResponse {
    image_base64: String,
}

impl RemoteApiProvider {
    pub fn new(base_url: &str, model: &str, api_key: Option<&str>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self {
            model_ref: format!("remote/{model}"),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.map(str::to_string),
            client,
        }
    }

    fn classify(&self, err: &reqwest::Error) -> FailureKind {
        if err.is_timeout() {
            FailureKind::Timeout
        } else if err.is_connect() {
            FailureKind::Connection
        } else if err.status() == Some(reqwest::StatusCode::TOO_MANY_REQUESTS) {
            FailureKind::RateLimit
        } else {
            FailureKind::Connection
        }
    }

    fn attempt_error(&self, kind: FailureKind, message: String) -> ProviderError {
        ProviderError::Attempt {
            provider: self.model_ref.clone(),
            kind,
            message,
        }
    }
}

#[async_trait]
impl GenerationProvider for RemoteApiProvider {
    fn model_ref(&self) -> &str {
        &self.model_ref
    }

    fn available(&self) -> bool {
        !self.base_url.is_empty()
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<DraftOutput, ProviderError> {
        let url = format!("{}/v1/generate", self.base_url);
        let body = serde_json::json!({
            "prompt": request.prompt,
            "negative_prompt": request.negative_prompt,
            "seed": request.seed,
            "width": request.width,
            "height": request.height,
            "steps": request.steps,
            "sampler": request.sampler,
        });

        let mut req = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req
            .send()
            .await
            .map_err(|e| self.attempt_error(self.classify(&e), e.to_string()))?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(self.attempt_error(FailureKind::RateLimit, "429 from endpoint".into()));
        }
        let response = response
            .error_for_status()
            .map_err(|e| self.attempt_error(self.classify(&e), e.to_string()))?;

        let payload: RemoteGenerationResponse = response
            .json()
            .await
            .map_err(|e| self.attempt_error(FailureKind::Connection, e.to_string()))?;

        use base64::Engine as _;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload.image_base64.as_bytes())
            .map_err(|e| ProviderError::Rejected {
                provider: self.model_ref.clone(),
                message: format!("invalid base64 payload: {e}"),
            })?;

        if let Some(parent) = request.output_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ProviderError::Rejected {
                    provider: self.model_ref.clone(),
                    message: format!("cannot create output dir: {e}"),
                })?;
        }
        tokio::fs::write(&request.output_path, &bytes)
            .await
            .map_err(|e| ProviderError::Rejected {
                provider: self.model_ref.clone(),
                message: format!("cannot write artifact: {e}"),
            })?;

        Ok(DraftOutput {
            provider: self.model_ref.clone(),
            output_path: request.output_path.clone(),
            byte_len: bytes.len() as u64,
        })
    }
}
