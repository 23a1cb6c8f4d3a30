pub mod mock;
pub mod remote;
pub mod traits;

pub use mock::{FlakyProvider, LocalModelProvider, MockProvider};
pub use remote::RemoteApiProvider;
pub use traits::{DraftOutput, GenerationProvider, GenerationRequest};

use crate::error::FailureKind;
use std::sync::Arc;

/// Resolve a provider name to a concrete implementation.
///
/// Supported names:
/// - `mock` — deterministic reference provider, always succeeds
/// - `flaky:<n>:<kind>` — fails n times with the given kind, then succeeds
/// - `flaky:always:<kind>` — fails every call
/// - `local:<checkpoint>` — local-model stub
/// - `remote:<base-url>` — remote JSON endpoint (API key from `ATELIER_API_KEY`)
pub fn create_provider(name: &str) -> anyhow::Result<Arc<dyn GenerationProvider>> {
    match name {
        "mock" => Ok(Arc::new(MockProvider::new())),

        name if name.starts_with("flaky:") => {
            let rest = name.strip_prefix("flaky:").unwrap_or("");
            let (count_part, kind_part) = rest.split_once(':').unwrap_or((rest, "timeout"));
            let kind = parse_failure_kind(kind_part)?;
            if count_part == "always" {
                return Ok(Arc::new(FlakyProvider::always_failing(kind)));
            }
            let count: u32 = count_part.parse().map_err(|_| {
                anyhow::anyhow!("flaky provider needs a count: flaky:<n>:<kind>, got {name:?}")
            })?;
            Ok(Arc::new(FlakyProvider::new(Some(count), kind)))
        }

        name if name.starts_with("local:") => {
            let checkpoint = name.strip_prefix("local:").unwrap_or("");
            if checkpoint.is_empty() {
                anyhow::bail!("local provider requires a checkpoint name: local:<checkpoint>");
            }
            Ok(Arc::new(LocalModelProvider::new(checkpoint)))
        }

        name if name.starts_with("remote:") => {
            let base_url = name.strip_prefix("remote:").unwrap_or("");
            if base_url.is_empty() {
                anyhow::bail!("remote provider requires a URL: remote:https://host");
            }
            let api_key = std::env::var("ATELIER_API_KEY").ok();
            Ok(Arc::new(RemoteApiProvider::new(
                base_url,
                "image-v1",
                api_key.as_deref(),
            )))
        }

        _ => anyhow::bail!(
            "Unknown provider: {name}. Use mock, flaky:<n>:<kind>, local:<checkpoint> \
             or remote:<base-url>."
        ),
    }
}

fn parse_failure_kind(name: &str) -> anyhow::Result<FailureKind> {
    match name {
        "rate_limit" | "rate-limit" => Ok(FailureKind::RateLimit),
        "timeout" => Ok(FailureKind::Timeout),
        "connection" => Ok(FailureKind::Connection),
        other => anyhow::bail!("unknown failure kind: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_resolves_mock() {
        let provider = create_provider("mock").unwrap();
        assert_eq!(provider.model_ref(), "mock/procedural-v1");
    }

    #[test]
    fn factory_parses_flaky_spec() {
        let provider = create_provider("flaky:3:rate_limit").unwrap();
        assert_eq!(provider.model_ref(), "mock/flaky-v1");
        assert!(create_provider("flaky:always:connection").is_ok());
    }

    #[test]
    fn factory_rejects_unknown_names() {
        assert!(create_provider("dall-e-9000").is_err());
        assert!(create_provider("flaky:NaN:timeout").is_err());
        assert!(create_provider("local:").is_err());
        assert!(create_provider("remote:").is_err());
    }

    #[test]
    fn factory_resolves_local_and_remote() {
        assert_eq!(
            create_provider("local:sdxl-base").unwrap().model_ref(),
            "local/sdxl-base"
        );
        assert_eq!(
            create_provider("remote:https://gen.example.com")
                .unwrap()
                .model_ref(),
            "remote/image-v1"
        );
    }
}
