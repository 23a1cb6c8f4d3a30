use super::capability::{EvaluationCapability, EvaluationContext, EvaluationVerdict};
use super::layers::LayerStateStore;
use super::signals::CrossLayerSignal;
use crate::config::CriticConfig;
use crate::culture::{Dimension, WeightTable};
use crate::scout::{EvidencePack, TabooSeverity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinSet;

/// How agent calls are staged across dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::EnumString, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EscalationMode {
    /// Independent per-dimension calls, each seeing only its own evidence slice.
    Parallel,
    /// L1 → L5 serially; later calls see the accumulated analysis of all
    /// completed earlier dimensions.
    Progressive,
}

#[derive(Debug, Clone, Default)]
pub struct EscalationReport {
    pub escalated: Vec<Dimension>,
    pub verdicts: BTreeMap<Dimension, EvaluationVerdict>,
    pub signals: Vec<CrossLayerSignal>,
}

/// Escalation risk from evidence: taboo-burdened subjects are riskier reads.
pub fn risk_factor(evidence: &EvidencePack) -> f64 {
    let high = evidence
        .taboos
        .iter()
        .filter(|t| t.severity == TabooSeverity::High)
        .count() as f64;
    let critical = evidence
        .taboos
        .iter()
        .filter(|t| t.severity == TabooSeverity::Critical)
        .count() as f64;
    (1.0 + 0.25 * high + 0.5 * critical).clamp(0.5, 2.0)
}

/// Whether one dimension warrants an agent call this round.
fn should_escalate(
    dimension: Dimension,
    weights: &WeightTable,
    layers: &LayerStateStore,
    risk: f64,
    config: &CriticConfig,
) -> bool {
    let state = layers.get(dimension);
    if state.locked || state.escalated {
        return false;
    }
    let priority =
        weights.get(dimension) * (1.0 - state.score) * (1.0 - state.confidence) * risk;
    priority > config.escalation_threshold
        || state.evidence_coverage < config.coverage_threshold
}

struct ContextSeed<'a> {
    task_id: &'a str,
    evidence: &'a EvidencePack,
    candidate_summary: &'a str,
    image: Option<&'a str>,
    guidance: Option<&'a str>,
}

fn build_context(seed: &ContextSeed<'_>, dimension: Dimension, prior_analysis: String) -> EvaluationContext {
    EvaluationContext {
        task_id: seed.task_id.to_string(),
        dimension,
        dimension_label: dimension.label().to_string(),
        subject: seed.evidence.subject.clone(),
        tradition: seed.evidence.tradition.clone(),
        prior_analysis,
        candidate_summary: seed.candidate_summary.to_string(),
        evidence_summary: seed.evidence.summary(),
        image: seed.image.map(str::to_string),
        guidance: seed.guidance.map(str::to_string),
    }
}

/// Run agent escalation over the dimensions that warrant it.
///
/// Without a capability provider both modes return an empty report and leave
/// the layer store untouched, so parallel and progressive runs stay
/// numerically identical in the fallback.
#[allow(clippy::too_many_arguments)]
pub async fn escalate(
    task_id: &str,
    evidence: &EvidencePack,
    candidate_summary: &str,
    image: Option<&str>,
    guidance: Option<&str>,
    weights: &WeightTable,
    layers: &mut LayerStateStore,
    capability: Option<&Arc<dyn EvaluationCapability>>,
    config: &CriticConfig,
) -> anyhow::Result<EscalationReport> {
    let Some(capability) = capability else {
        return Ok(EscalationReport::default());
    };
    if !capability.available() {
        tracing::warn!("evaluation capability unavailable, falling back to rule-based result");
        return Ok(EscalationReport::default());
    }

    let risk = risk_factor(evidence);
    let targets: Vec<Dimension> = Dimension::ALL
        .into_iter()
        .filter(|d| should_escalate(*d, weights, layers, risk, config))
        .collect();
    if targets.is_empty() {
        return Ok(EscalationReport::default());
    }
    tracing::info!(
        mode = %config.escalation_mode,
        dimensions = ?targets.iter().map(|d| d.layer_label()).collect::<Vec<_>>(),
        risk,
        "escalating to evaluation capability"
    );

    let seed = ContextSeed {
        task_id,
        evidence,
        candidate_summary,
        image,
        guidance,
    };

    let mut report = EscalationReport::default();
    match config.escalation_mode {
        EscalationMode::Parallel => {
            let mut join_set = JoinSet::new();
            for dimension in &targets {
                let context = build_context(&seed, *dimension, String::new());
                let capability = Arc::clone(capability);
                let dimension = *dimension;
                join_set.spawn(async move {
                    (dimension, capability.evaluate(&context).await)
                });
            }
            let mut verdicts: BTreeMap<Dimension, EvaluationVerdict> = BTreeMap::new();
            while let Some(joined) = join_set.join_next().await {
                let (dimension, result) = joined?;
                verdicts.insert(dimension, result?);
            }
            // Apply in canonical order for determinism.
            for dimension in targets {
                if let Some(verdict) = verdicts.remove(&dimension) {
                    apply_verdict(dimension, verdict, layers, config, &mut report);
                }
            }
        }
        EscalationMode::Progressive => {
            for dimension in targets {
                let prior = layers.prior_analysis(dimension);
                let context = build_context(&seed, dimension, prior);
                let verdict = capability.evaluate(&context).await?;
                apply_verdict(dimension, verdict, layers, config, &mut report);
            }
        }
    }

    Ok(report)
}

fn apply_verdict(
    dimension: Dimension,
    verdict: EvaluationVerdict,
    layers: &mut LayerStateStore,
    config: &CriticConfig,
    report: &mut EscalationReport,
) {
    let state = layers.get_mut(dimension);
    state.record_score(verdict.score);
    state.confidence = verdict.confidence.clamp(0.0, 1.0);
    state.escalated = true;
    state.cost_spent += config.escalation_cost;
    state.push_analysis(verdict.rationale.clone());

    report.signals.extend(verdict.signals.iter().cloned());
    report.escalated.push(dimension);
    report.verdicts.insert(dimension, verdict);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::critic::capability::MockCapability;
    use crate::critic::signals::SignalKind;
    use crate::culture;
    use crate::scout::Scout;

    fn setup(tradition: &str, subject: &str) -> (EvidencePack, WeightTable, LayerStateStore) {
        let (variant, weights) = culture::resolve(tradition);
        let evidence = Scout::build(subject, tradition, &variant);
        let mut layers = LayerStateStore::new();
        for dim in Dimension::ALL {
            let state = layers.get_mut(dim);
            state.record_score(0.5);
            state.confidence = 0.4;
            state.evidence_coverage = evidence.coverage;
        }
        (evidence, weights, layers)
    }

    fn config(mode: EscalationMode) -> CriticConfig {
        CriticConfig {
            escalation_mode: mode,
            ..CriticConfig::default()
        }
    }

    #[tokio::test]
    async fn no_capability_returns_empty_report_both_modes() {
        for mode in [EscalationMode::Parallel, EscalationMode::Progressive] {
            let (evidence, weights, mut layers) = setup("chinese_xieyi", "a landscape");
            let before = layers.clone();
            let report = escalate(
                "t",
                &evidence,
                "candidate",
                None,
                None,
                &weights,
                &mut layers,
                None,
                &config(mode),
            )
            .await
            .unwrap();
            assert!(report.escalated.is_empty());
            assert_eq!(layers, before, "fallback must leave layers untouched");
        }
    }

    #[tokio::test]
    async fn locked_and_escalated_dimensions_never_reescalate() {
        let (evidence, weights, mut layers) = setup("chinese_xieyi", "a landscape");
        layers.get_mut(Dimension::VisualPerception).locked = true;
        layers.get_mut(Dimension::TechnicalAnalysis).escalated = true;

        let capability: Arc<dyn EvaluationCapability> = Arc::new(MockCapability::agreeable());
        let report = escalate(
            "t",
            &evidence,
            "candidate",
            None,
            None,
            &weights,
            &mut layers,
            Some(&capability),
            &config(EscalationMode::Progressive),
        )
        .await
        .unwrap();

        assert!(!report.escalated.contains(&Dimension::VisualPerception));
        assert!(!report.escalated.contains(&Dimension::TechnicalAnalysis));
    }

    #[tokio::test]
    async fn progressive_contexts_accumulate_prior_analysis() {
        let (evidence, weights, mut layers) = setup("chinese_xieyi", "a landscape");
        let capability: Arc<dyn EvaluationCapability> =
            Arc::new(MockCapability::new(|ctx| EvaluationVerdict {
                score: 0.8,
                confidence: 0.9,
                rationale: format!("[{}] prior_len={}", ctx.dimension_label, ctx.prior_analysis.len()),
                signals: Vec::new(),
            }));

        let report = escalate(
            "t",
            &evidence,
            "candidate",
            None,
            None,
            &weights,
            &mut layers,
            Some(&capability),
            &config(EscalationMode::Progressive),
        )
        .await
        .unwrap();

        // Later dimensions must have seen non-empty prior context.
        assert!(report.escalated.len() >= 2);
        let last = *report.escalated.last().unwrap();
        let rationale = &report.verdicts[&last].rationale;
        assert!(!rationale.ends_with("prior_len=0"), "last context was empty: {rationale}");
    }

    #[tokio::test]
    async fn signals_are_collected_from_verdicts() {
        let (evidence, weights, mut layers) = setup("chinese_xieyi", "a landscape");
        let capability: Arc<dyn EvaluationCapability> =
            Arc::new(MockCapability::new(|ctx| EvaluationVerdict {
                score: 0.6,
                confidence: 0.9,
                rationale: "ok".into(),
                signals: if ctx.dimension == Dimension::PhilosophicalAesthetic {
                    vec![CrossLayerSignal {
                        source: Dimension::PhilosophicalAesthetic,
                        target: Dimension::VisualPerception,
                        kind: SignalKind::Reinterpret,
                        message: "re-read the voids as structure".into(),
                        strength: 0.7,
                    }]
                } else {
                    Vec::new()
                },
            }));

        let report = escalate(
            "t",
            &evidence,
            "candidate",
            None,
            None,
            &weights,
            &mut layers,
            Some(&capability),
            &config(EscalationMode::Progressive),
        )
        .await
        .unwrap();
        assert_eq!(report.signals.len(), 1);
        assert_eq!(report.signals[0].target, Dimension::VisualPerception);
    }

    #[test]
    fn risk_rises_with_taboo_severity() {
        let (variant, _) = culture::resolve("western_academic");
        let clean = Scout::build("a still life", "western_academic", &variant);
        let loaded = Scout::build(
            "primitive art tribal art savage scene",
            "western_academic",
            &variant,
        );
        assert!(risk_factor(&loaded) > risk_factor(&clean));
    }
}
