use super::providers::{DraftOutput, GenerationProvider, GenerationRequest};
use crate::error::{FailureKind, ProviderError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

// ─── Route log ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum RouteOutcome {
    Success,
    Failure { kind: FailureKind },
}

/// One generation attempt, success or failure, for observability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteEntry {
    pub provider: String,
    /// 1-based attempt number within this provider.
    pub attempt: u32,
    #[serde(flatten)]
    pub outcome: RouteOutcome,
    pub message: String,
    pub at: DateTime<Utc>,
}

// ─── Chain ──────────────────────────────────────────────────────────────────

/// Ordered provider list with bounded per-provider retries and automatic
/// fallback. Contract: exactly one successful generation, or a typed
/// exhaustion failure after (providers x attempts-per-provider) attempts.
pub struct ProviderChain {
    providers: Vec<(String, Arc<dyn GenerationProvider>)>,
    attempts_per_provider: u32,
    base_backoff_ms: u64,
}

impl ProviderChain {
    pub fn new(
        providers: Vec<(String, Arc<dyn GenerationProvider>)>,
        attempts_per_provider: u32,
        base_backoff_ms: u64,
    ) -> Self {
        Self {
            providers,
            attempts_per_provider: attempts_per_provider.max(1),
            base_backoff_ms,
        }
    }

    /// Drive the chain for one request, appending every attempt to the
    /// route log.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        route_log: &mut Vec<RouteEntry>,
    ) -> Result<DraftOutput, ProviderError> {
        let mut attempts: u32 = 0;
        let mut failure_lines = Vec::new();

        for (name, provider) in &self.providers {
            if !provider.available() {
                tracing::warn!(provider = name.as_str(), "provider unavailable, skipping");
                continue;
            }

            let mut backoff_ms = self.base_backoff_ms;
            for attempt in 1..=self.attempts_per_provider {
                attempts += 1;
                match provider.generate(request).await {
                    Ok(output) => {
                        route_log.push(RouteEntry {
                            provider: name.clone(),
                            attempt,
                            outcome: RouteOutcome::Success,
                            message: format!("wrote {} bytes", output.byte_len),
                            at: Utc::now(),
                        });
                        if attempt > 1 {
                            tracing::info!(
                                provider = name.as_str(),
                                attempt,
                                "provider recovered after retries"
                            );
                        }
                        return Ok(output);
                    }
                    Err(err) => {
                        let kind = err.kind().unwrap_or(FailureKind::Connection);
                        route_log.push(RouteEntry {
                            provider: name.clone(),
                            attempt,
                            outcome: RouteOutcome::Failure { kind },
                            message: err.to_string(),
                            at: Utc::now(),
                        });
                        failure_lines.push(format!(
                            "{name} attempt {attempt}/{}: {err}",
                            self.attempts_per_provider
                        ));

                        if attempt < self.attempts_per_provider {
                            tracing::warn!(
                                provider = name.as_str(),
                                attempt,
                                "generation attempt failed, retrying"
                            );
                            if backoff_ms > 0 {
                                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                                backoff_ms = backoff_ms.saturating_mul(2).min(10_000);
                            }
                        }
                    }
                }
            }
            tracing::warn!(provider = name.as_str(), "switching to fallback provider");
        }

        Err(ProviderError::AllProvidersExhausted {
            attempts,
            log: failure_lines.join("\n"),
        })
    }
}
