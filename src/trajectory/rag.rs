use super::recorder::TrajectoryRecord;
use super::store::TrajectoryStore;
use crate::culture::Dimension;
use crate::queen::QueenAction;
use std::collections::BTreeMap;
use std::collections::HashSet;

/// One indexed trajectory with its synthesized text representation.
struct IndexEntry {
    record: TrajectoryRecord,
    tokens: HashSet<String>,
}

/// A retrieved neighbor with its similarity score.
pub struct Retrieved<'a> {
    pub record: &'a TrajectoryRecord,
    pub similarity: f64,
}

/// Aggregate patterns over a retrieved neighborhood.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatePatterns {
    pub sample_size: usize,
    pub mean_rounds: f64,
    pub mean_final_score: f64,
    pub accept_rate: f64,
    /// Most frequent rerun dimensions, most common first.
    pub frequent_rerun_dimensions: Vec<Dimension>,
    pub mean_round_improvement: f64,
}

/// Searchable index over stored trajectories. Rebuilt explicitly, never
/// incrementally; readers tolerate a stale or empty index.
pub struct TrajectoryIndex {
    entries: Vec<IndexEntry>,
}

impl TrajectoryIndex {
    /// Build the index from every record in the store. An empty store
    /// produces an empty index, which degrades every query to empty results.
    pub fn build(store: &TrajectoryStore) -> Self {
        let entries = store
            .list()
            .into_iter()
            .map(|record| IndexEntry {
                tokens: tokenize(&synthesize_text(&record)),
                record,
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Top-k most similar historical runs for a new query.
    pub fn retrieve(&self, subject: &str, tradition: &str, top_k: usize) -> Vec<Retrieved<'_>> {
        if top_k == 0 || self.entries.is_empty() {
            return Vec::new();
        }
        let query = tokenize(&format!("{subject} {tradition}"));
        let mut scored: Vec<Retrieved<'_>> = self
            .entries
            .iter()
            .map(|entry| {
                let mut similarity = jaccard(&query, &entry.tokens);
                // Same-tradition runs are structurally closer regardless of
                // token overlap.
                if entry.record.tradition == tradition {
                    similarity += 0.25;
                }
                Retrieved {
                    record: &entry.record,
                    similarity,
                }
            })
            .filter(|r| r.similarity > 0.0)
            .collect();
        scored.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        scored.truncate(top_k);
        scored
    }

    /// Derive aggregate patterns from a retrieved neighborhood.
    pub fn patterns(neighbors: &[Retrieved<'_>]) -> Option<AggregatePatterns> {
        if neighbors.is_empty() {
            return None;
        }
        let n = neighbors.len() as f64;
        let mean_rounds = neighbors
            .iter()
            .map(|r| r.record.rounds.len() as f64)
            .sum::<f64>()
            / n;
        let mean_final_score =
            neighbors.iter().map(|r| r.record.final_score).sum::<f64>() / n;
        let accept_rate = neighbors
            .iter()
            .filter(|r| r.record.final_action == QueenAction::Accept)
            .count() as f64
            / n;

        // Rerun dimensions are extracted by scanning decision reasons for
        // dimension names.
        let mut rerun_counts: BTreeMap<Dimension, usize> = BTreeMap::new();
        for neighbor in neighbors {
            for round in &neighbor.record.rounds {
                if round.decision.action != QueenAction::Rerun {
                    continue;
                }
                let reason = round.decision.reason.to_lowercase();
                for dim in Dimension::ALL {
                    if reason.contains(&dim.to_string())
                        || reason.contains(dim.layer_label().to_lowercase().as_str())
                        || round.decision.rerun_dimensions.contains(&dim)
                    {
                        *rerun_counts.entry(dim).or_default() += 1;
                    }
                }
            }
        }
        let mut frequent: Vec<(Dimension, usize)> = rerun_counts.into_iter().collect();
        frequent.sort_by(|a, b| b.1.cmp(&a.1));
        let frequent_rerun_dimensions = frequent.into_iter().map(|(d, _)| d).collect();

        let mut improvements = Vec::new();
        for neighbor in neighbors {
            let rounds = &neighbor.record.rounds;
            for pair in rounds.windows(2) {
                improvements.push(pair[1].weighted_total - pair[0].weighted_total);
            }
        }
        let mean_round_improvement = if improvements.is_empty() {
            0.0
        } else {
            improvements.iter().sum::<f64>() / improvements.len() as f64
        };

        Some(AggregatePatterns {
            sample_size: neighbors.len(),
            mean_rounds,
            mean_final_score,
            accept_rate,
            frequent_rerun_dimensions,
            mean_round_improvement,
        })
    }

    /// Render retrieved neighbors and their patterns into a few-shot text
    /// block for injection into agent-escalation prompts.
    pub fn render_guidance(neighbors: &[Retrieved<'_>]) -> Option<String> {
        let patterns = Self::patterns(neighbors)?;
        let mut lines = vec![format!(
            "From {} similar past runs: mean {:.1} rounds to resolution, \
             mean final score {:.2}, accept rate {:.0}%, mean per-round improvement {:+.3}.",
            patterns.sample_size,
            patterns.mean_rounds,
            patterns.mean_final_score,
            patterns.accept_rate * 100.0,
            patterns.mean_round_improvement
        )];
        if let Some(dim) = patterns.frequent_rerun_dimensions.first() {
            lines.push(format!(
                "The most frequently re-run dimension was {}.",
                dim.label()
            ));
        }
        for neighbor in neighbors.iter().take(3) {
            let r = neighbor.record;
            lines.push(format!(
                "- {:?} ({}): {} after {} round(s), final score {:.2}",
                r.subject,
                r.tradition,
                r.final_action,
                r.rounds.len(),
                r.final_score
            ));
        }
        Some(lines.join("\n"))
    }
}

/// Single text representation per record: subject, tradition, outcome,
/// per-round decisions, underperforming dimensions.
fn synthesize_text(record: &TrajectoryRecord) -> String {
    let mut parts = vec![
        record.subject.clone(),
        record.tradition.clone(),
        format!("final {} score {:.2}", record.final_action, record.final_score),
    ];
    for round in &record.rounds {
        parts.push(format!("round {} {}", round.round, round.decision.action));
        for (dim, score) in &round.scores {
            if *score < 0.5 {
                parts.push(format!("weak {dim}"));
            }
        }
    }
    parts.join(" ")
}

fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 2)
        .map(str::to_string)
        .collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    intersection / union
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::DraftPlan;
    use crate::queen::QueenDecision;
    use crate::scout::EvidencePack;
    use crate::trajectory::recorder::RoundRecord;
    use chrono::Utc;

    fn record(run_id: &str, subject: &str, tradition: &str, action: QueenAction, rounds: u32) -> TrajectoryRecord {
        let round_records = (1..=rounds)
            .map(|round| RoundRecord {
                round,
                draft_plan: DraftPlan {
                    prompt: subject.into(),
                    negative_prompt: String::new(),
                    prompt_hash: crate::draft::prompt_hash(subject),
                    candidate_count: 2,
                    steps: 20,
                },
                scores: BTreeMap::from([(Dimension::CulturalContext, 0.4)]),
                weighted_total: 0.4 + 0.15 * f64::from(round),
                gate_passed: round == rounds,
                decision: QueenDecision {
                    action: if round == rounds { action } else { QueenAction::Rerun },
                    reason: if round == rounds {
                        "done".into()
                    } else {
                        "critic rerun hints: cultural_context".into()
                    },
                    rerun_dimensions: vec![Dimension::CulturalContext],
                    preserve_dimensions: Vec::new(),
                    downgrade: None,
                },
            })
            .collect();
        TrajectoryRecord {
            run_id: run_id.into(),
            subject: subject.into(),
            tradition: tradition.into(),
            evidence: EvidencePack::empty(subject, tradition),
            rounds: round_records,
            final_score: 0.4 + 0.15 * f64::from(rounds),
            final_action: action,
            total_cost: 10.0 * f64::from(rounds),
            total_latency_ms: 5,
            created_at: Utc::now(),
        }
    }

    fn seeded_store(dir: &std::path::Path) -> TrajectoryStore {
        let store = TrajectoryStore::new(dir);
        store
            .save(&record("r1", "misty shanshui landscape", "chinese_xieyi", QueenAction::Accept, 2))
            .unwrap();
        store
            .save(&record("r2", "pine landscape with qiyun", "chinese_xieyi", QueenAction::Accept, 3))
            .unwrap();
        store
            .save(&record("r3", "neoclassical history painting", "western_academic", QueenAction::Stop, 3))
            .unwrap();
        store
    }

    #[test]
    fn empty_index_degrades_to_empty_results() {
        let dir = tempfile::tempdir().unwrap();
        let index = TrajectoryIndex::build(&TrajectoryStore::new(dir.path()));
        assert!(index.is_empty());
        assert!(index.retrieve("anything", "chinese_xieyi", 5).is_empty());
        assert!(TrajectoryIndex::patterns(&[]).is_none());
        assert!(TrajectoryIndex::render_guidance(&[]).is_none());
    }

    #[test]
    fn retrieval_prefers_same_tradition_and_overlap() {
        let dir = tempfile::tempdir().unwrap();
        let index = TrajectoryIndex::build(&seeded_store(dir.path()));
        let results = index.retrieve("foggy shanshui landscape study", "chinese_xieyi", 2);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].record.run_id, "r1");
        assert_eq!(results[0].record.tradition, "chinese_xieyi");
    }

    #[test]
    fn patterns_aggregate_the_neighborhood() {
        let dir = tempfile::tempdir().unwrap();
        let index = TrajectoryIndex::build(&seeded_store(dir.path()));
        let results = index.retrieve("landscape", "chinese_xieyi", 10);
        let patterns = TrajectoryIndex::patterns(&results).unwrap();

        assert!(patterns.mean_rounds > 1.0);
        assert!(patterns.accept_rate > 0.0);
        assert!(patterns.mean_round_improvement > 0.0);
        assert_eq!(
            patterns.frequent_rerun_dimensions.first(),
            Some(&Dimension::CulturalContext)
        );
    }

    #[test]
    fn guidance_renders_a_few_shot_block() {
        let dir = tempfile::tempdir().unwrap();
        let index = TrajectoryIndex::build(&seeded_store(dir.path()));
        let results = index.retrieve("shanshui landscape", "chinese_xieyi", 3);
        let guidance = TrajectoryIndex::render_guidance(&results).unwrap();
        assert!(guidance.contains("similar past runs"));
        assert!(guidance.contains("cultural context"));
    }
}
