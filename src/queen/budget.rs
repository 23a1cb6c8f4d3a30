use crate::critic::CrossLayerSignal;
use crate::culture::Dimension;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Spend accounting for one run. Owned exclusively by the queen.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BudgetState {
    pub rounds_used: u32,
    pub total_cost: f64,
    pub candidates_generated: u32,
    pub critic_calls: u32,
}

/// One line of the queen's round history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundSummary {
    pub round: u32,
    pub best_score: f64,
    pub gate_passed: bool,
    pub action: super::QueenAction,
    pub reason: String,
}

/// Plan-level state across rounds: which dimensions are settled, which are
/// still open, and which cross-layer signals have not been consumed yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanState {
    pub history: Vec<RoundSummary>,
    pub confirmed: BTreeSet<Dimension>,
    pub pending: BTreeSet<Dimension>,
    pub outstanding_signals: Vec<CrossLayerSignal>,
}

impl PlanState {
    pub fn new() -> Self {
        Self {
            history: Vec::new(),
            confirmed: BTreeSet::new(),
            pending: Dimension::ALL.into_iter().collect(),
            outstanding_signals: Vec::new(),
        }
    }

    /// Best score of the previous round, if one was recorded.
    pub fn previous_best(&self) -> Option<f64> {
        self.history.last().map(|s| s.best_score)
    }
}

impl Default for PlanState {
    fn default() -> Self {
        Self::new()
    }
}
