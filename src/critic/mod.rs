pub mod attachment;
pub mod capability;
pub mod escalation;
pub mod layers;
pub mod rules;
pub mod signals;

pub use capability::{EvaluationCapability, EvaluationContext, EvaluationVerdict, MockCapability};
pub use escalation::{EscalationMode, EscalationReport};
pub use layers::{LayerState, LayerStateStore};
pub use rules::DimensionScore;
pub use signals::{CrossLayerSignal, SignalKind};

use crate::config::CriticConfig;
use crate::culture::{Dimension, PipelineVariant, WeightTable};
use crate::draft::Candidate;
use crate::scout::EvidencePack;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

// ─── Round critique output ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    pub scores: BTreeMap<Dimension, DimensionScore>,
    /// Sum of score x weight under the table in force when last computed.
    pub weighted_total: f64,
    /// Every dimension at or above the minimum per-dimension threshold.
    pub gate_passed: bool,
}

impl ScoredCandidate {
    pub fn score_map(&self) -> BTreeMap<Dimension, f64> {
        self.scores.iter().map(|(d, s)| (*d, s.score)).collect()
    }

    /// Recompute the weighted total under a new weight table. The queen must
    /// always see the current round's weights, not the run's initial ones.
    pub fn reweigh(&mut self, weights: &WeightTable) {
        self.weighted_total = weights.weighted_total(&self.score_map());
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundCritique {
    pub candidates: Vec<ScoredCandidate>,
    pub best_index: usize,
    /// Dimensions the critic suggests regenerating next round.
    pub rerun_hints: Vec<Dimension>,
    pub signals: Vec<CrossLayerSignal>,
    pub escalated: Vec<Dimension>,
}

impl RoundCritique {
    pub fn best(&self) -> &ScoredCandidate {
        &self.candidates[self.best_index]
    }

    /// Re-score every candidate under a modulated weight table and refresh
    /// the best index.
    pub fn apply_weights(&mut self, weights: &WeightTable) {
        for candidate in &mut self.candidates {
            candidate.reweigh(weights);
        }
        self.best_index = self
            .candidates
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.weighted_total.total_cmp(&b.weighted_total))
            .map_or(0, |(i, _)| i);
    }
}

// ─── Critic ─────────────────────────────────────────────────────────────────

/// Multi-dimensional critique: deterministic rule pass over every candidate,
/// then optional agent escalation deepening the best candidate's weakest
/// dimensions.
pub struct Critic {
    config: CriticConfig,
    capability: Option<Arc<dyn EvaluationCapability>>,
    /// Few-shot guidance distilled from similar past runs, injected into
    /// every escalation context.
    guidance: Option<String>,
}

impl Critic {
    pub fn new(config: CriticConfig, capability: Option<Arc<dyn EvaluationCapability>>) -> Self {
        Self {
            config,
            capability,
            guidance: None,
        }
    }

    pub fn with_guidance(mut self, guidance: Option<String>) -> Self {
        self.guidance = guidance;
        self
    }

    pub async fn evaluate(
        &self,
        task_id: &str,
        evidence: &EvidencePack,
        candidates: &[Candidate],
        variant: &PipelineVariant,
        weights: &WeightTable,
        layers: &mut LayerStateStore,
    ) -> anyhow::Result<RoundCritique> {
        anyhow::ensure!(!candidates.is_empty(), "critic needs at least one candidate");

        let mut scored: Vec<ScoredCandidate> = candidates
            .iter()
            .map(|candidate| {
                let scores = rules::critique(candidate, evidence);
                let mut sc = ScoredCandidate {
                    candidate: candidate.clone(),
                    gate_passed: scores
                        .values()
                        .all(|s| s.score >= self.config.gate_min_score),
                    scores,
                    weighted_total: 0.0,
                };
                sc.reweigh(weights);
                sc
            })
            .collect();

        let best_index = scored
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.weighted_total.total_cmp(&b.weighted_total))
            .map_or(0, |(i, _)| i);

        // Layer store tracks the best candidate's reading. The variant's
        // stage groupings fix the update order for staged traditions.
        for stage in &variant.critic_stages {
            for dimension in stage {
                let dim_score = &scored[best_index].scores[dimension];
                let state = layers.get_mut(*dimension);
                state.record_score(dim_score.score);
                state.confidence = dim_score.confidence;
                state.evidence_coverage = evidence.coverage;
                state.push_analysis(dim_score.rationale.join("; "));
            }
        }

        let candidate_summary = summarize_candidate(&scored[best_index]);
        let image = scored[best_index]
            .candidate
            .output_path
            .to_str()
            .map(str::to_string);
        let normalized_image = attachment::normalize(image.as_deref());

        let report = escalation::escalate(
            task_id,
            evidence,
            &candidate_summary,
            normalized_image.as_deref(),
            self.guidance.as_deref(),
            weights,
            layers,
            self.capability.as_ref(),
            &self.config,
        )
        .await?;

        // Fold escalated verdicts back into the best candidate's scores.
        for dimension in &report.escalated {
            if let Some(verdict) = report.verdicts.get(dimension) {
                let entry = scored[best_index]
                    .scores
                    .get_mut(dimension)
                    .expect("all dimensions scored");
                entry.score = verdict.score.clamp(0.0, 1.0);
                entry.confidence = verdict.confidence.clamp(0.0, 1.0);
                entry.rationale.push(format!("agent: {}", verdict.rationale));
            }
        }
        scored[best_index].reweigh(weights);
        scored[best_index].gate_passed = scored[best_index]
            .scores
            .values()
            .all(|s| s.score >= self.config.gate_min_score);

        let rerun_hints: Vec<Dimension> = Dimension::ALL
            .into_iter()
            .filter(|d| scored[best_index].scores[d].score < self.config.hint_threshold)
            .collect();

        tracing::info!(
            best = scored[best_index].candidate.id.as_str(),
            weighted_total = scored[best_index].weighted_total,
            gate = scored[best_index].gate_passed,
            hints = ?rerun_hints.iter().map(|d| d.layer_label()).collect::<Vec<_>>(),
            "round critique complete"
        );

        Ok(RoundCritique {
            candidates: scored,
            best_index,
            rerun_hints,
            signals: report.signals,
            escalated: report.escalated,
        })
    }
}

fn summarize_candidate(scored: &ScoredCandidate) -> String {
    let c = &scored.candidate;
    format!(
        "candidate {} seed={} {}x{} steps={} sampler={} prompt={:?}",
        c.id, c.seed, c.width, c.height, c.steps, c.sampler, c.prompt
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::culture;
    use crate::scout::Scout;
    use std::path::PathBuf;

    fn candidate(id: &str, prompt: &str) -> Candidate {
        Candidate {
            id: id.into(),
            prompt: prompt.into(),
            negative_prompt: String::new(),
            seed: 7,
            width: 512,
            height: 512,
            steps: 20,
            sampler: "euler_a".into(),
            generator: "mock".into(),
            output_path: PathBuf::from(format!("/tmp/{id}.png")),
        }
    }

    fn xieyi_fixture() -> (EvidencePack, PipelineVariant, WeightTable) {
        let (variant, weights) = culture::resolve("chinese_xieyi");
        let evidence = Scout::build(
            "Dong Yuan landscape with hemp-fiber texture strokes",
            "chinese_xieyi",
            &variant,
        );
        (evidence, variant, weights)
    }

    fn rich_prompt() -> &'static str {
        "Dong Yuan landscape with hemp-fiber texture strokes, hemp-fiber strokes \
         (layer loosely with dry ink for earthen mass), shanshui landscape \
         (compose with guest-host mountain relations), ink wash: graded ink over mineral color"
    }

    #[tokio::test]
    async fn parallel_and_progressive_identical_without_capability() {
        let (evidence, variant, weights) = xieyi_fixture();
        let candidates = vec![candidate("a", rich_prompt()), candidate("b", "a cat")];

        let mut outputs = Vec::new();
        for mode in [EscalationMode::Parallel, EscalationMode::Progressive] {
            let config = CriticConfig {
                escalation_mode: mode,
                ..CriticConfig::default()
            };
            let critic = Critic::new(config, None);
            let mut layers = LayerStateStore::new();
            let critique = critic
                .evaluate("t", &evidence, &candidates, &variant, &weights, &mut layers)
                .await
                .unwrap();
            outputs.push((critique, layers));
        }

        assert_eq!(outputs[0].0, outputs[1].0);
        assert_eq!(outputs[0].1, outputs[1].1);
    }

    #[tokio::test]
    async fn best_candidate_wins_by_weighted_total() {
        let (evidence, variant, weights) = xieyi_fixture();
        let candidates = vec![candidate("weak", "a cat"), candidate("strong", rich_prompt())];
        let critic = Critic::new(CriticConfig::default(), None);
        let mut layers = LayerStateStore::new();

        let critique = critic
            .evaluate("t", &evidence, &candidates, &variant, &weights, &mut layers)
            .await
            .unwrap();

        assert_eq!(critique.best().candidate.id, "strong");
        assert!(critique.best().gate_passed);
        assert!(critique.best().weighted_total > 0.7);
    }

    #[tokio::test]
    async fn layer_store_tracks_best_candidate_scores() {
        let (evidence, variant, weights) = xieyi_fixture();
        let candidates = vec![candidate("a", rich_prompt())];
        let critic = Critic::new(CriticConfig::default(), None);
        let mut layers = LayerStateStore::new();

        let critique = critic
            .evaluate("t", &evidence, &candidates, &variant, &weights, &mut layers)
            .await
            .unwrap();

        for dim in Dimension::ALL {
            assert!(
                (layers.get(dim).score - critique.best().scores[&dim].score).abs() < 1e-9
            );
        }
    }

    #[tokio::test]
    async fn escalation_folds_into_best_scores_and_hints() {
        let (evidence, variant, weights) = xieyi_fixture();
        let candidates = vec![candidate("a", "a cat")];
        let capability: Arc<dyn EvaluationCapability> =
            Arc::new(MockCapability::new(|_| EvaluationVerdict {
                score: 0.3,
                confidence: 0.95,
                rationale: "the reading stays shallow".into(),
                signals: Vec::new(),
            }));
        let config = CriticConfig {
            escalation_threshold: 0.0,
            ..CriticConfig::default()
        };
        let critic = Critic::new(config, Some(capability));
        let mut layers = LayerStateStore::new();

        let critique = critic
            .evaluate("t", &evidence, &candidates, &variant, &weights, &mut layers)
            .await
            .unwrap();

        assert!(!critique.escalated.is_empty());
        for dim in &critique.escalated {
            assert_eq!(critique.best().scores[dim].score, 0.3);
            assert!(critique.best().scores[dim]
                .rationale
                .iter()
                .any(|r| r.starts_with("agent:")));
        }
        // 0.3 sits under the hint threshold, so escalated dims become hints.
        for dim in &critique.escalated {
            assert!(critique.rerun_hints.contains(dim));
        }
    }

    #[tokio::test]
    async fn apply_weights_refreshes_best_index() {
        let (evidence, variant, weights) = xieyi_fixture();
        let candidates = vec![candidate("a", rich_prompt()), candidate("b", "a cat")];
        let critic = Critic::new(CriticConfig::default(), None);
        let mut layers = LayerStateStore::new();
        let mut critique = critic
            .evaluate("t", &evidence, &candidates, &variant, &weights, &mut layers)
            .await
            .unwrap();

        let before = critique.best().weighted_total;
        critique.apply_weights(&WeightTable::uniform());
        // Totals change under the new table but best stays coherent.
        assert_eq!(critique.best().candidate.id, "a");
        assert_ne!(critique.best().weighted_total, before);
    }
}
