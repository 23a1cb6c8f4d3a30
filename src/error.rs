use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `atelier`.
///
/// Each pipeline subsystem defines its own error variant. Library callers can
/// match on these to decide recovery strategy; internal code continues to use
/// `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum AtelierError {
    // ── Draft / generation providers ────────────────────────────────────
    #[error("provider: {0}")]
    Provider(#[from] ProviderError),

    // ── Pipeline control loop ───────────────────────────────────────────
    #[error("pipeline: {0}")]
    Pipeline(#[from] PipelineError),

    // ── Externally supplied intent data ─────────────────────────────────
    #[error("validation: {0}")]
    Validation(#[from] ValidationError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Provider errors ────────────────────────────────────────────────────────

/// Transient fault classes a generation provider can report. The kind is
/// recorded in the route log and drives retry accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    #[error("rate-limited")]
    RateLimit,

    #[error("timeout")]
    Timeout,

    #[error("connection")]
    Connection,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider {provider} failed ({kind}): {message}")]
    Attempt {
        provider: String,
        kind: FailureKind,
        message: String,
    },

    #[error("all providers exhausted after {attempts} attempts:\n{log}")]
    AllProvidersExhausted { attempts: u32, log: String },

    #[error("provider {provider} rejected request: {message}")]
    Rejected { provider: String, message: String },
}

impl ProviderError {
    /// Failure kind for retry accounting. Non-attempt errors are terminal.
    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            Self::Attempt { kind, .. } => Some(*kind),
            Self::AllProvidersExhausted { .. } | Self::Rejected { .. } => None,
        }
    }
}

// ─── Pipeline errors ────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("checkpoint missing for stage {stage}: {message}")]
    CheckpointMissing { stage: String, message: String },

    #[error("draft stage failed: {0}")]
    Draft(String),
}

// ─── Validation errors ──────────────────────────────────────────────────────

/// Per-field validation failures on externally supplied intent data.
/// All violations are collected and reported together, never partial-accepted.
#[derive(Debug, Error)]
#[error("invalid run intent: {}", issues.join("; "))]
pub struct ValidationError {
    pub issues: Vec<String>,
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, AtelierError>;
