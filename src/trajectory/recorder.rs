use crate::culture::Dimension;
use crate::draft::DraftPlan;
use crate::queen::{QueenAction, QueenDecision};
use crate::scout::EvidencePack;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

/// One round as recorded into the trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub round: u32,
    pub draft_plan: DraftPlan,
    /// Best candidate's per-dimension scores this round.
    pub scores: BTreeMap<Dimension, f64>,
    pub weighted_total: f64,
    pub gate_passed: bool,
    pub decision: QueenDecision,
}

/// The complete recorded history of one run. Immutable once persisted;
/// indexed for retrieval by the RAG service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryRecord {
    pub run_id: String,
    pub subject: String,
    pub tradition: String,
    pub evidence: EvidencePack,
    pub rounds: Vec<RoundRecord>,
    pub final_score: f64,
    pub final_action: QueenAction,
    pub total_cost: f64,
    pub total_latency_ms: u64,
    pub created_at: DateTime<Utc>,
}

/// Accumulates round records during a run; sealed once at run end.
pub struct TrajectoryRecorder {
    run_id: String,
    subject: String,
    tradition: String,
    evidence: Option<EvidencePack>,
    rounds: Vec<RoundRecord>,
    started: Instant,
}

impl TrajectoryRecorder {
    pub fn new(run_id: &str, subject: &str, tradition: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            subject: subject.to_string(),
            tradition: tradition.to_string(),
            evidence: None,
            rounds: Vec::new(),
            started: Instant::now(),
        }
    }

    pub fn set_evidence(&mut self, evidence: &EvidencePack) {
        self.evidence = Some(evidence.clone());
    }

    pub fn record_round(&mut self, record: RoundRecord) {
        self.rounds.push(record);
    }

    pub fn rounds(&self) -> &[RoundRecord] {
        &self.rounds
    }

    /// Seal the trajectory at run end.
    pub fn finalize(self, final_action: QueenAction, final_score: f64, total_cost: f64) -> TrajectoryRecord {
        let subject = self.subject.clone();
        TrajectoryRecord {
            run_id: self.run_id,
            subject,
            tradition: self.tradition,
            evidence: self
                .evidence
                .unwrap_or_else(|| EvidencePack::empty("", "")),
            rounds: self.rounds,
            final_score,
            final_action,
            total_cost,
            total_latency_ms: self.started.elapsed().as_millis() as u64,
            created_at: Utc::now(),
        }
    }
}
