use crate::culture::Dimension;
use crate::draft::Candidate;
use crate::scout::{EvidencePack, TabooSeverity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One dimension's verdict with the full rule trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionScore {
    pub dimension: Dimension,
    /// Always in [0, 1].
    pub score: f64,
    pub confidence: f64,
    /// Every additive / subtractive rule that fired, in application order.
    pub rationale: Vec<String>,
}

const BASE_SCORE: f64 = 0.5;

/// Prompt length bands for the technical rules.
const TERSE_PROMPT_LEN: usize = 15;
const GOOD_PROMPT_MIN: usize = 40;
const GOOD_PROMPT_MAX: usize = 600;

/// Deterministic scorer: (candidate, evidence) → five dimension scores.
/// Pure function of its inputs, no model calls. Rules apply in a fixed order
/// and every firing rule is recorded in the rationale.
pub fn critique(candidate: &Candidate, evidence: &EvidencePack) -> BTreeMap<Dimension, DimensionScore> {
    let prompt = candidate.prompt.to_lowercase();
    let confidence = (0.35 + 0.5 * evidence.coverage).min(0.9);

    let mut scores = BTreeMap::new();
    for dimension in Dimension::ALL {
        let mut rationale = vec![format!("base score {BASE_SCORE}")];
        let mut score = BASE_SCORE;

        match dimension {
            Dimension::VisualPerception => {
                if let Some(keyword) = matched_style_keyword(&prompt, evidence) {
                    score += 0.15;
                    rationale.push(format!("+0.15 style keyword '{keyword}' present"));
                }
                if params_complete(candidate) {
                    score += 0.05;
                    rationale.push("+0.05 generation parameters complete".into());
                }
                if prompt.len() < TERSE_PROMPT_LEN {
                    score -= 0.10;
                    rationale.push("-0.10 prompt too terse for visual intent".into());
                }
            }
            Dimension::TechnicalAnalysis => {
                if let Some(keyword) = matched_style_keyword(&prompt, evidence) {
                    score += 0.15;
                    rationale.push(format!("+0.15 style keyword '{keyword}' present"));
                }
                if params_complete(candidate) {
                    score += 0.10;
                    rationale.push("+0.10 generation parameters complete".into());
                }
                if (GOOD_PROMPT_MIN..=GOOD_PROMPT_MAX).contains(&prompt.len()) {
                    score += 0.05;
                    rationale.push("+0.05 prompt length in working band".into());
                } else if prompt.len() > GOOD_PROMPT_MAX {
                    score -= 0.05;
                    rationale.push("-0.05 prompt overlong, dilutes control".into());
                }
            }
            Dimension::CulturalContext => {
                let anchored = evidence
                    .terminology
                    .iter()
                    .filter(|a| prompt.contains(&a.term.to_lowercase()))
                    .take(2)
                    .count();
                if anchored > 0 {
                    let bonus = 0.10 * anchored as f64;
                    score += bonus;
                    rationale.push(format!("+{bonus:.2} {anchored} terminology anchor(s) in prompt"));
                } else if evidence.terminology.is_empty() {
                    score -= 0.10;
                    rationale.push("-0.10 no terminology evidence for tradition".into());
                }
                let coverage_bonus = evidence.coverage * 0.20;
                score += coverage_bonus;
                rationale.push(format!("+{coverage_bonus:.2} evidence coverage contribution"));
            }
            Dimension::CriticalInterpretation => {
                if evidence.taboos.is_empty() {
                    score += 0.10;
                    rationale.push("+0.10 no taboo constraints violated".into());
                }
                for taboo in &evidence.taboos {
                    let penalty = match taboo.severity {
                        TabooSeverity::Low => 0.05,
                        TabooSeverity::Medium => 0.15,
                        TabooSeverity::High => 0.30,
                        // Applied after clamping as an absolute override.
                        TabooSeverity::Critical => 0.0,
                    };
                    if penalty > 0.0 {
                        score -= penalty;
                        rationale.push(format!(
                            "-{penalty:.2} taboo '{}' severity {}",
                            taboo.matched, taboo.severity
                        ));
                    }
                }
            }
            Dimension::PhilosophicalAesthetic => {
                let coverage_bonus = evidence.coverage * 0.20;
                score += coverage_bonus;
                rationale.push(format!("+{coverage_bonus:.2} evidence coverage contribution"));
                if evidence.terminology.iter().any(|a| a.confidence >= 0.9) {
                    score += 0.10;
                    rationale.push("+0.10 high-confidence terminology anchoring".into());
                }
                if !evidence.compositions.is_empty() {
                    score += 0.05;
                    rationale.push("+0.05 composition reference available".into());
                }
            }
        }

        score = score.clamp(0.0, 1.0);

        // Absolute override: a critical taboo zeroes the critical-interpretation
        // reading no matter what the other rules produced.
        if dimension == Dimension::CriticalInterpretation
            && evidence
                .taboos
                .iter()
                .any(|t| t.severity == TabooSeverity::Critical)
        {
            score = 0.0;
            rationale.push("=0.00 critical taboo violation, absolute override".into());
        }

        scores.insert(
            dimension,
            DimensionScore {
                dimension,
                score,
                confidence,
                rationale,
            },
        );
    }
    scores
}

fn matched_style_keyword<'a>(prompt: &str, evidence: &'a EvidencePack) -> Option<&'a str> {
    evidence
        .styles
        .iter()
        .find(|s| prompt.contains(&s.keyword.to_lowercase()))
        .map(|s| s.keyword.as_str())
}

fn params_complete(candidate: &Candidate) -> bool {
    !candidate.sampler.is_empty() && candidate.steps >= 10 && candidate.width > 0 && candidate.height > 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::culture;
    use crate::scout::Scout;
    use std::path::PathBuf;

    fn candidate(prompt: &str) -> Candidate {
        Candidate {
            id: "t-r1-c0".into(),
            prompt: prompt.into(),
            negative_prompt: String::new(),
            seed: 42,
            width: 512,
            height: 512,
            steps: 20,
            sampler: "euler_a".into(),
            generator: "mock".into(),
            output_path: PathBuf::from("/tmp/t-r1-c0.png"),
        }
    }

    fn pack(subject: &str, tradition: &str) -> EvidencePack {
        let (variant, _) = culture::resolve(tradition);
        Scout::build(subject, tradition, &variant)
    }

    #[test]
    fn all_scores_stay_in_unit_interval() {
        let evidence = pack("primitive art tribal art savage exotic scene", "western_academic");
        let scores = critique(&candidate("x"), &evidence);
        for score in scores.values() {
            assert!((0.0..=1.0).contains(&score.score), "{score:?}");
        }
    }

    #[test]
    fn critical_taboo_forces_exact_zero() {
        let evidence = pack("savage warrior scene", "western_academic");
        let scores = critique(
            &candidate("savage warrior scene, chiaroscuro: single dominant light source"),
            &evidence,
        );
        let critical = &scores[&Dimension::CriticalInterpretation];
        assert_eq!(critical.score, 0.0);
        assert!(critical
            .rationale
            .iter()
            .any(|r| r.contains("absolute override")));
        // The override is not merely a penalty: other dimensions are untouched.
        assert!(scores[&Dimension::VisualPerception].score > 0.0);
    }

    #[test]
    fn well_evidenced_candidate_scores_above_base() {
        let evidence = pack(
            "Dong Yuan landscape with hemp-fiber texture strokes",
            "chinese_xieyi",
        );
        let prompt = "Dong Yuan landscape with hemp-fiber texture strokes, \
                      hemp-fiber strokes (layer loosely with dry ink for earthen mass), \
                      shanshui landscape (compose with guest-host mountain relations), \
                      ink wash: graded ink over mineral color";
        let scores = critique(&candidate(prompt), &evidence);
        for dim in [
            Dimension::VisualPerception,
            Dimension::TechnicalAnalysis,
            Dimension::CulturalContext,
            Dimension::PhilosophicalAesthetic,
        ] {
            assert!(scores[&dim].score > BASE_SCORE, "{dim}: {:?}", scores[&dim]);
        }
    }

    #[test]
    fn rationale_lists_every_fired_rule() {
        let evidence = pack(
            "Dong Yuan landscape with hemp-fiber texture strokes",
            "chinese_xieyi",
        );
        let scores = critique(
            &candidate("hemp-fiber strokes over rolling hills, ink wash: graded tones"),
            &evidence,
        );
        let cultural = &scores[&Dimension::CulturalContext];
        assert!(cultural.rationale.len() >= 2);
        assert!(cultural.rationale[0].contains("base score"));
    }

    #[test]
    fn terse_prompt_penalized_on_visual_dimension() {
        let evidence = pack("a cat", "chinese_xieyi");
        let scores = critique(&candidate("a cat"), &evidence);
        assert!(scores[&Dimension::VisualPerception]
            .rationale
            .iter()
            .any(|r| r.contains("terse")));
    }

    #[test]
    fn pure_function_is_deterministic() {
        let evidence = pack(
            "Dong Yuan landscape with hemp-fiber texture strokes",
            "chinese_xieyi",
        );
        let c = candidate("hemp-fiber strokes, ink wash: graded tones");
        assert_eq!(critique(&c, &evidence), critique(&c, &evidence));
    }
}
