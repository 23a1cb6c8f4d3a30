use super::signals::CrossLayerSignal;
use crate::culture::Dimension;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Structured context handed to an evaluation capability (VLM or text model).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationContext {
    pub task_id: String,
    pub dimension: Dimension,
    pub dimension_label: String,
    pub subject: String,
    pub tradition: String,
    /// Accumulated analysis of earlier dimensions (progressive mode only;
    /// empty in parallel mode).
    pub prior_analysis: String,
    pub candidate_summary: String,
    pub evidence_summary: String,
    /// Normalized image reference: remote URL or inline data URI.
    pub image: Option<String>,
    /// Few-shot guidance rendered from similar historical trajectories.
    pub guidance: Option<String>,
}

/// What the capability returned for one dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationVerdict {
    pub score: f64,
    pub confidence: f64,
    pub rationale: String,
    pub signals: Vec<CrossLayerSignal>,
}

/// Agent/evaluation capability contract. Implementations must be cheap to
/// share across concurrent dimension calls.
#[async_trait]
pub trait EvaluationCapability: Send + Sync {
    fn model_ref(&self) -> &str;

    fn available(&self) -> bool {
        true
    }

    async fn evaluate(&self, context: &EvaluationContext) -> anyhow::Result<EvaluationVerdict>;
}

// ─── Mock capability ────────────────────────────────────────────────────────

type VerdictFn = dyn Fn(&EvaluationContext) -> EvaluationVerdict + Send + Sync;

/// Scripted capability for tests and offline runs: a caller-supplied function
/// maps contexts to verdicts deterministically.
pub struct MockCapability {
    model_ref: String,
    verdict: Box<VerdictFn>,
}

impl MockCapability {
    pub fn new(verdict: impl Fn(&EvaluationContext) -> EvaluationVerdict + Send + Sync + 'static) -> Self {
        Self {
            model_ref: "mock/critic-v1".into(),
            verdict: Box::new(verdict),
        }
    }

    /// Default script: nudge the score up slightly and echo the context, no
    /// cross-layer signals.
    pub fn agreeable() -> Self {
        Self::new(|ctx| EvaluationVerdict {
            score: 0.75,
            confidence: 0.85,
            rationale: format!(
                "deepened {} reading of {} within {}",
                ctx.dimension_label, ctx.subject, ctx.tradition
            ),
            signals: Vec::new(),
        })
    }
}

#[async_trait]
impl EvaluationCapability for MockCapability {
    fn model_ref(&self) -> &str {
        &self.model_ref
    }

    async fn evaluate(&self, context: &EvaluationContext) -> anyhow::Result<EvaluationVerdict> {
        Ok((self.verdict)(context))
    }
}

/// Resolve a capability name from config. `none` (or empty) means no
/// capability is available and escalation falls back to rule-based results.
pub fn create_capability(name: &str) -> anyhow::Result<Option<Arc<dyn EvaluationCapability>>> {
    match name {
        "" | "none" => Ok(None),
        "mock" => Ok(Some(Arc::new(MockCapability::agreeable()))),
        other => anyhow::bail!("unknown evaluation capability: {other}. Use none or mock."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_capability_applies_script() {
        let capability = MockCapability::new(|ctx| EvaluationVerdict {
            score: 0.42,
            confidence: 0.9,
            rationale: format!("scripted for {}", ctx.dimension_label),
            signals: Vec::new(),
        });
        let ctx = EvaluationContext {
            task_id: "t".into(),
            dimension: Dimension::CulturalContext,
            dimension_label: "cultural context".into(),
            subject: "s".into(),
            tradition: "chinese_xieyi".into(),
            prior_analysis: String::new(),
            candidate_summary: "c".into(),
            evidence_summary: "e".into(),
            image: None,
            guidance: None,
        };
        let verdict = capability.evaluate(&ctx).await.unwrap();
        assert_eq!(verdict.score, 0.42);
        assert!(verdict.rationale.contains("cultural context"));
    }

    #[test]
    fn factory_none_means_no_capability() {
        assert!(create_capability("none").unwrap().is_none());
        assert!(create_capability("").unwrap().is_none());
        assert!(create_capability("mock").unwrap().is_some());
        assert!(create_capability("gpt-13").is_err());
    }
}
