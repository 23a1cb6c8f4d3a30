use super::dimension::Dimension;
use super::weights::WeightTable;
use serde::{Deserialize, Serialize};

/// How the critic passes are staged for one tradition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineVariant {
    pub name: String,
    /// Dimensions the scout weights its evidence gathering toward.
    pub scout_focus: Vec<Dimension>,
    /// Whether the queen may order a local rerun (regenerate only the
    /// signalled dimensions while preserving the rest).
    pub local_rerun_allowed: bool,
    /// Ordered critic stage groupings; each group is evaluated before the
    /// next group starts.
    pub critic_stages: Vec<Vec<Dimension>>,
    pub description: String,
}

impl PipelineVariant {
    fn default_variant() -> Self {
        Self {
            name: "default".into(),
            scout_focus: Dimension::ALL.to_vec(),
            local_rerun_allowed: true,
            critic_stages: vec![Dimension::ALL.to_vec()],
            description: "single critic pass over all five dimensions".into(),
        }
    }

    /// One-pass generation philosophy: the work either lands whole or is
    /// redone whole, so local reruns are forbidden and evidence gathering
    /// concentrates on the contextual and philosophical reading.
    fn atomic_variant() -> Self {
        Self {
            name: "atomic".into(),
            scout_focus: vec![
                Dimension::CulturalContext,
                Dimension::PhilosophicalAesthetic,
            ],
            local_rerun_allowed: false,
            critic_stages: vec![Dimension::ALL.to_vec()],
            description: "one-pass generation, no local rerun, philosophy-weighted".into(),
        }
    }

    fn progressive_staged_variant() -> Self {
        Self {
            name: "progressive_staged".into(),
            scout_focus: Dimension::ALL.to_vec(),
            local_rerun_allowed: true,
            critic_stages: vec![
                vec![Dimension::VisualPerception, Dimension::TechnicalAnalysis],
                vec![Dimension::CulturalContext, Dimension::CriticalInterpretation],
                vec![Dimension::PhilosophicalAesthetic],
            ],
            description: "three sequential critic stages: form, meaning, philosophy".into(),
        }
    }
}

// ─── Tradition routing ──────────────────────────────────────────────────────

/// Resolve a tradition id to its pipeline variant and base weight table.
/// Unknown traditions fall back to the default variant with balanced weights.
pub fn resolve(tradition: &str) -> (PipelineVariant, WeightTable) {
    match tradition {
        "chinese_xieyi" => (
            PipelineVariant::atomic_variant(),
            WeightTable::new([
                (Dimension::VisualPerception, 0.15),
                (Dimension::TechnicalAnalysis, 0.15),
                (Dimension::CulturalContext, 0.25),
                (Dimension::CriticalInterpretation, 0.15),
                (Dimension::PhilosophicalAesthetic, 0.30),
            ]),
        ),
        "chinese_gongbi" => (
            PipelineVariant::progressive_staged_variant(),
            WeightTable::new([
                (Dimension::VisualPerception, 0.20),
                (Dimension::TechnicalAnalysis, 0.30),
                (Dimension::CulturalContext, 0.20),
                (Dimension::CriticalInterpretation, 0.15),
                (Dimension::PhilosophicalAesthetic, 0.15),
            ]),
        ),
        "western_academic" => (
            PipelineVariant::default_variant(),
            WeightTable::new([
                (Dimension::VisualPerception, 0.25),
                (Dimension::TechnicalAnalysis, 0.25),
                (Dimension::CulturalContext, 0.15),
                (Dimension::CriticalInterpretation, 0.25),
                (Dimension::PhilosophicalAesthetic, 0.10),
            ]),
        ),
        "japanese_sumi_e" => (
            PipelineVariant::atomic_variant(),
            WeightTable::new([
                (Dimension::VisualPerception, 0.20),
                (Dimension::TechnicalAnalysis, 0.10),
                (Dimension::CulturalContext, 0.20),
                (Dimension::CriticalInterpretation, 0.15),
                (Dimension::PhilosophicalAesthetic, 0.35),
            ]),
        ),
        "islamic_geometric" => (
            PipelineVariant::progressive_staged_variant(),
            WeightTable::new([
                (Dimension::VisualPerception, 0.20),
                (Dimension::TechnicalAnalysis, 0.35),
                (Dimension::CulturalContext, 0.20),
                (Dimension::CriticalInterpretation, 0.10),
                (Dimension::PhilosophicalAesthetic, 0.15),
            ]),
        ),
        other => {
            if !other.is_empty() {
                tracing::debug!(tradition = other, "unknown tradition, using default variant");
            }
            (PipelineVariant::default_variant(), WeightTable::uniform())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::culture::weights::WEIGHT_SUM_TOLERANCE;

    #[test]
    fn known_traditions_have_normalized_weights() {
        for tradition in [
            "chinese_xieyi",
            "chinese_gongbi",
            "western_academic",
            "japanese_sumi_e",
            "islamic_geometric",
        ] {
            let (_, weights) = resolve(tradition);
            assert!(
                (weights.sum() - 1.0).abs() < WEIGHT_SUM_TOLERANCE,
                "{tradition} weights sum to {}",
                weights.sum()
            );
        }
    }

    #[test]
    fn xieyi_is_atomic_and_philosophy_weighted() {
        let (variant, weights) = resolve("chinese_xieyi");
        assert_eq!(variant.name, "atomic");
        assert!(!variant.local_rerun_allowed);
        assert_eq!(
            variant.scout_focus,
            vec![
                Dimension::CulturalContext,
                Dimension::PhilosophicalAesthetic
            ]
        );
        let max_dim = Dimension::ALL
            .iter()
            .copied()
            .max_by(|a, b| weights.get(*a).total_cmp(&weights.get(*b)))
            .unwrap();
        assert_eq!(max_dim, Dimension::PhilosophicalAesthetic);
    }

    #[test]
    fn gongbi_is_staged_form_meaning_philosophy() {
        let (variant, _) = resolve("chinese_gongbi");
        assert_eq!(variant.name, "progressive_staged");
        assert_eq!(variant.critic_stages.len(), 3);
        assert_eq!(
            variant.critic_stages[2],
            vec![Dimension::PhilosophicalAesthetic]
        );
    }

    #[test]
    fn unknown_tradition_falls_back_to_default() {
        let (variant, weights) = resolve("venusian_plasma_art");
        assert_eq!(variant.name, "default");
        assert!(variant.local_rerun_allowed);
        for dim in Dimension::ALL {
            assert!((weights.get(dim) - 0.2).abs() < WEIGHT_SUM_TOLERANCE);
        }
    }

    #[test]
    fn staged_variants_cover_all_five_dimensions() {
        for tradition in ["chinese_gongbi", "islamic_geometric"] {
            let (variant, _) = resolve(tradition);
            let mut covered: Vec<Dimension> =
                variant.critic_stages.iter().flatten().copied().collect();
            covered.sort();
            assert_eq!(covered, Dimension::ALL.to_vec());
        }
    }
}
