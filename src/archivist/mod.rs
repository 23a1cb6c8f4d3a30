use crate::config::AtelierConfig;
use crate::critic::RoundCritique;
use crate::trajectory::TrajectoryRecord;
use crate::util::sanitize_id;
use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// What the archivist managed to persist. Archiving is best-effort: a failed
/// archive degrades the run's record keeping, never the run itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveOutcome {
    pub run_id: String,
    pub success: bool,
    pub artifacts: Vec<PathBuf>,
    pub error: Option<String>,
}

/// Writes the per-run archive: evidence chain, critique report, and the
/// configuration snapshot the run executed under.
pub struct Archivist {
    root: PathBuf,
}

impl Archivist {
    pub fn new(workspace: &Path) -> Self {
        Self {
            root: workspace.join("archive"),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Archive one finished run. Failures are captured in the outcome and
    /// logged, never propagated.
    pub fn archive(
        &self,
        record: &TrajectoryRecord,
        final_critique: Option<&RoundCritique>,
        config: &AtelierConfig,
    ) -> ArchiveOutcome {
        match self.try_archive(record, final_critique, config) {
            Ok(artifacts) => {
                tracing::info!(
                    run_id = record.run_id.as_str(),
                    artifacts = artifacts.len(),
                    "run archived"
                );
                ArchiveOutcome {
                    run_id: record.run_id.clone(),
                    success: true,
                    artifacts,
                    error: None,
                }
            }
            Err(e) => {
                tracing::warn!(run_id = record.run_id.as_str(), "archive failed: {e:#}");
                ArchiveOutcome {
                    run_id: record.run_id.clone(),
                    success: false,
                    artifacts: Vec::new(),
                    error: Some(format!("{e:#}")),
                }
            }
        }
    }

    fn try_archive(
        &self,
        record: &TrajectoryRecord,
        final_critique: Option<&RoundCritique>,
        config: &AtelierConfig,
    ) -> anyhow::Result<Vec<PathBuf>> {
        let safe_id = sanitize_id(&record.run_id)?;
        let dir = self.root.join(&safe_id);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating archive dir {}", dir.display()))?;

        let evidence_path = dir.join("evidence_chain.json");
        let evidence = serde_json::to_string_pretty(&EvidenceChain::from_record(record))
            .context("serializing evidence chain")?;
        std::fs::write(&evidence_path, evidence)
            .with_context(|| format!("writing {}", evidence_path.display()))?;

        let report_path = dir.join("critique_report.md");
        std::fs::write(&report_path, render_report(record, final_critique))
            .with_context(|| format!("writing {}", report_path.display()))?;

        let config_path = dir.join("config_snapshot.json");
        let snapshot =
            serde_json::to_string_pretty(config).context("serializing config snapshot")?;
        std::fs::write(&config_path, snapshot)
            .with_context(|| format!("writing {}", config_path.display()))?;

        Ok(vec![evidence_path, report_path, config_path])
    }
}

/// The evidence chain artifact: the scout pack plus the per-round prompt
/// lineage derived from it.
#[derive(Debug, Serialize)]
struct EvidenceChain<'a> {
    subject: &'a str,
    tradition: &'a str,
    evidence: &'a crate::scout::EvidencePack,
    prompt_lineage: Vec<PromptLink<'a>>,
}

#[derive(Debug, Serialize)]
struct PromptLink<'a> {
    round: u32,
    prompt_hash: &'a str,
    candidate_count: u32,
    steps: u32,
}

impl<'a> EvidenceChain<'a> {
    fn from_record(record: &'a TrajectoryRecord) -> Self {
        Self {
            subject: &record.subject,
            tradition: &record.tradition,
            evidence: &record.evidence,
            prompt_lineage: record
                .rounds
                .iter()
                .map(|r| PromptLink {
                    round: r.round,
                    prompt_hash: &r.draft_plan.prompt_hash,
                    candidate_count: r.draft_plan.candidate_count,
                    steps: r.draft_plan.steps,
                })
                .collect(),
        }
    }
}

fn render_report(record: &TrajectoryRecord, final_critique: Option<&RoundCritique>) -> String {
    let mut out = String::new();
    out.push_str(&format!("# Critique report: {}\n\n", record.run_id));
    out.push_str(&format!(
        "Subject: {}\nTradition: {}\nOutcome: {} at {:.3} after {} round(s), cost {:.1}\n\n",
        record.subject,
        record.tradition,
        record.final_action,
        record.final_score,
        record.rounds.len(),
        record.total_cost
    ));

    out.push_str("## Rounds\n\n");
    for round in &record.rounds {
        out.push_str(&format!(
            "- round {}: total {:.3}, gate {}, {} ({})\n",
            round.round,
            round.weighted_total,
            if round.gate_passed { "passed" } else { "failed" },
            round.decision.action,
            round.decision.reason
        ));
        for (dim, score) in &round.scores {
            out.push_str(&format!("  - {}: {:.2}\n", dim.layer_label(), score));
        }
    }

    if let Some(critique) = final_critique {
        out.push_str("\n## Final critique\n\n");
        let best = critique.best();
        out.push_str(&format!(
            "Best candidate `{}` (seed {}), weighted total {:.3}\n\n",
            best.candidate.id, best.candidate.seed, best.weighted_total
        ));
        for (dim, score) in &best.scores {
            out.push_str(&format!(
                "- {} {}: {:.2} (confidence {:.2})\n",
                dim.layer_label(),
                dim.label(),
                score.score,
                score.confidence
            ));
            for line in &score.rationale {
                out.push_str(&format!("  - {line}\n"));
            }
        }
        if !critique.signals.is_empty() {
            out.push_str("\n### Cross-layer signals\n\n");
            for signal in &critique.signals {
                out.push_str(&format!(
                    "- {} -> {} {} ({:.2}): {}\n",
                    signal.source.layer_label(),
                    signal.target.layer_label(),
                    signal.kind,
                    signal.strength,
                    signal.message
                ));
            }
        }
    }
    out
}
