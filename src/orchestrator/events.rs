use crate::queen::{QueenAction, QueenDecision};
use serde::{Deserialize, Serialize};

/// The resumable pipeline stages, in execution order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    Scout,
    Draft,
    Critic,
    Queen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StageStatus {
    Completed,
    /// The stage's output was restored from a checkpoint instead of running.
    Skipped,
}

/// Typed event stream emitted by a running pipeline. Consumers get every
/// state transition in order; the stream ends with exactly one terminal
/// event, completed or failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    StageStarted {
        run_id: String,
        round: u32,
        stage: Stage,
    },
    StageCompleted {
        run_id: String,
        round: u32,
        stage: Stage,
        status: StageStatus,
    },
    DecisionMade {
        run_id: String,
        round: u32,
        weighted_total: f64,
        decision: QueenDecision,
    },
    /// The run is paused waiting for a human action.
    AwaitingHuman { run_id: String, round: u32 },
    PipelineCompleted {
        run_id: String,
        final_action: QueenAction,
        final_score: f64,
        rounds_used: u32,
        total_cost: f64,
    },
    PipelineFailed { run_id: String, message: String },
}

impl PipelineEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineEvent::PipelineCompleted { .. } | PipelineEvent::PipelineFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn stage_names_roundtrip() {
        for stage in [Stage::Scout, Stage::Draft, Stage::Critic, Stage::Queen] {
            assert_eq!(Stage::from_str(&stage.to_string()).unwrap(), stage);
        }
        assert_eq!(Stage::from_str("queen").unwrap(), Stage::Queen);
    }

    #[test]
    fn stages_order_by_execution() {
        assert!(Stage::Scout < Stage::Draft);
        assert!(Stage::Draft < Stage::Critic);
        assert!(Stage::Critic < Stage::Queen);
    }

    #[test]
    fn terminal_events_are_flagged() {
        let done = PipelineEvent::PipelineCompleted {
            run_id: "r".into(),
            final_action: QueenAction::Accept,
            final_score: 0.8,
            rounds_used: 1,
            total_cost: 10.0,
        };
        assert!(done.is_terminal());
        let started = PipelineEvent::StageStarted {
            run_id: "r".into(),
            round: 1,
            stage: Stage::Scout,
        };
        assert!(!started.is_terminal());
    }

    #[test]
    fn events_tag_by_kind_in_json() {
        let event = PipelineEvent::StageCompleted {
            run_id: "r".into(),
            round: 2,
            stage: Stage::Draft,
            status: StageStatus::Skipped,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"stage_completed\""));
        assert!(json.contains("\"status\":\"skipped\""));
    }
}
