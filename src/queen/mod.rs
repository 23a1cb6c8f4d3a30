pub mod budget;

pub use budget::{BudgetState, PlanState, RoundSummary};

use crate::config::QueenConfig;
use crate::critic::CrossLayerSignal;
use crate::culture::Dimension;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ─── Decision types ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum QueenAction {
    Accept,
    Rerun,
    Downgrade,
    Stop,
}

/// Reduced generation parameters applied to every round after a downgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DowngradeParams {
    pub candidate_count: u32,
    pub steps: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueenDecision {
    pub action: QueenAction,
    pub reason: String,
    /// Dimensions a rerun regenerates; empty for full regeneration.
    pub rerun_dimensions: Vec<Dimension>,
    /// Dimensions explicitly preserved by a local rerun.
    pub preserve_dimensions: Vec<Dimension>,
    pub downgrade: Option<DowngradeParams>,
}

/// What the queen sees of one round's critique.
#[derive(Debug, Clone)]
pub struct RoundInput {
    pub gate_passed: bool,
    pub best_total: f64,
    pub rerun_hints: Vec<Dimension>,
    pub signals: Vec<CrossLayerSignal>,
    pub candidates_generated: u32,
    pub critic_calls: u32,
    pub local_rerun_allowed: bool,
}

// ─── Queen ──────────────────────────────────────────────────────────────────

/// Budget-aware decision state machine, one per run. The decision priority is
/// evaluated top to bottom, first match wins; the ordering is load-bearing
/// and must not be reordered.
pub struct Queen {
    config: QueenConfig,
    budget: BudgetState,
    plan: PlanState,
    downgraded: Option<DowngradeParams>,
}

impl Queen {
    pub fn new(config: QueenConfig) -> Self {
        Self {
            config,
            budget: BudgetState::default(),
            plan: PlanState::new(),
            downgraded: None,
        }
    }

    pub fn budget(&self) -> &BudgetState {
        &self.budget
    }

    pub fn plan(&self) -> &PlanState {
        &self.plan
    }

    /// Generation parameters in force, after any downgrade.
    pub fn effective_params(&self, base_candidates: u32, base_steps: u32) -> (u32, u32) {
        match self.downgraded {
            Some(params) => (params.candidate_count, params.steps),
            None => (base_candidates, base_steps),
        }
    }

    /// Human lock on a dimension: treated as settled from here on.
    pub fn confirm_dimension(&mut self, dimension: Dimension) {
        self.plan.pending.remove(&dimension);
        self.plan.confirmed.insert(dimension);
    }

    pub fn decide(&mut self, input: RoundInput) -> QueenDecision {
        // Every invocation spends one round and the per-round cost estimate.
        self.budget.rounds_used += 1;
        self.budget.total_cost += self.config.round_cost_estimate;
        self.budget.candidates_generated += input.candidates_generated;
        self.budget.critic_calls += input.critic_calls;
        self.plan
            .outstanding_signals
            .extend(input.signals.iter().cloned());

        let round = self.budget.rounds_used;
        let rounds_remain = round < self.config.max_rounds;
        let decision = self.evaluate_priority(&input, rounds_remain);

        self.plan.history.push(RoundSummary {
            round,
            best_score: input.best_total,
            gate_passed: input.gate_passed,
            action: decision.action,
            reason: decision.reason.clone(),
        });

        match decision.action {
            QueenAction::Accept => {
                let pending: Vec<Dimension> = self.plan.pending.iter().copied().collect();
                for dim in pending {
                    self.confirm_dimension(dim);
                }
            }
            QueenAction::Rerun => {
                self.plan.pending = if decision.rerun_dimensions.is_empty() {
                    Dimension::ALL.into_iter().collect()
                } else {
                    decision.rerun_dimensions.iter().copied().collect()
                };
            }
            QueenAction::Downgrade | QueenAction::Stop => {}
        }

        tracing::info!(
            round,
            action = %decision.action,
            total_cost = self.budget.total_cost,
            reason = decision.reason.as_str(),
            "queen decision"
        );
        decision
    }

    fn evaluate_priority(&mut self, input: &RoundInput, rounds_remain: bool) -> QueenDecision {
        // 1. Early stop: gate passed and the weighted total clears the high bar.
        if input.gate_passed && input.best_total >= self.config.early_stop_threshold {
            return self.accept(format!(
                "gate passed and weighted total {:.3} >= early stop threshold {:.3}",
                input.best_total, self.config.early_stop_threshold
            ));
        }

        // 2. Round budget exhausted.
        if self.budget.rounds_used >= self.config.max_rounds {
            return self.stop(format!(
                "round budget exhausted ({}/{})",
                self.budget.rounds_used, self.config.max_rounds
            ));
        }

        // 3. Cost budget exhausted.
        if self.budget.total_cost >= self.config.max_cost {
            return self.stop(format!(
                "cost budget exhausted ({:.1}/{:.1})",
                self.budget.total_cost, self.config.max_cost
            ));
        }

        // 4. Approaching the cost ceiling: downgrade subsequent rounds.
        let downgrade_at = self.config.max_cost * self.config.downgrade_fraction;
        if self.budget.total_cost >= downgrade_at && self.downgraded.is_none() {
            let params = DowngradeParams {
                candidate_count: self.config.downgraded_candidate_count,
                steps: self.config.downgraded_steps,
            };
            self.downgraded = Some(params);
            return QueenDecision {
                action: QueenAction::Downgrade,
                reason: format!(
                    "cost {:.1} >= downgrade point {downgrade_at:.1}, reducing to {} candidates at {} steps",
                    self.budget.total_cost, params.candidate_count, params.steps
                ),
                rerun_dimensions: Vec::new(),
                preserve_dimensions: Vec::new(),
                downgrade: Some(params),
            };
        }

        // 5. Regular accept.
        if input.gate_passed && input.best_total >= self.config.accept_threshold {
            return self.accept(format!(
                "gate passed and weighted total {:.3} >= accept threshold {:.3}",
                input.best_total, self.config.accept_threshold
            ));
        }

        // 6. Unresolved cross-layer signals re-open their target dimensions.
        let actionable: Vec<CrossLayerSignal> = self
            .plan
            .outstanding_signals
            .iter()
            .filter(|s| s.is_actionable())
            .cloned()
            .collect();
        if !actionable.is_empty() && rounds_remain {
            // Signals are consumed here, exactly once.
            self.plan.outstanding_signals.clear();
            let mut targets: BTreeSet<Dimension> =
                actionable.iter().map(|s| s.target).collect();
            if !input.local_rerun_allowed {
                targets = Dimension::ALL.into_iter().collect();
            }
            let preserve: Vec<Dimension> = Dimension::ALL
                .into_iter()
                .filter(|d| !targets.contains(d))
                .collect();
            let detail: Vec<String> = actionable
                .iter()
                .map(|s| format!("{}→{} {} ({:.2})", s.source.layer_label(), s.target.layer_label(), s.kind, s.strength))
                .collect();
            return QueenDecision {
                action: QueenAction::Rerun,
                reason: format!("unresolved cross-layer signals: {}", detail.join(", ")),
                rerun_dimensions: targets.into_iter().collect(),
                preserve_dimensions: preserve,
                downgrade: None,
            };
        }

        // 7. Critic rerun hints.
        if !input.rerun_hints.is_empty() && rounds_remain {
            let targets: Vec<Dimension> = if input.local_rerun_allowed {
                input.rerun_hints.clone()
            } else {
                Dimension::ALL.to_vec()
            };
            let preserve: Vec<Dimension> = Dimension::ALL
                .into_iter()
                .filter(|d| !targets.contains(d))
                .collect();
            let labels: Vec<&str> = input.rerun_hints.iter().map(|d| d.layer_label()).collect();
            return QueenDecision {
                action: QueenAction::Rerun,
                reason: format!("critic rerun hints: {}", labels.join(", ")),
                rerun_dimensions: targets,
                preserve_dimensions: preserve,
                downgrade: None,
            };
        }

        // 8. Stagnation: no meaningful improvement between rounds.
        if let Some(previous) = self.plan.previous_best()
            && self.budget.rounds_used >= 2
            && input.best_total - previous < self.config.min_improvement
        {
            return self.stop(format!(
                "stagnated: improvement {:.4} < minimum {:.4}",
                input.best_total - previous,
                self.config.min_improvement
            ));
        }

        // 9. Default: another full round.
        QueenDecision {
            action: QueenAction::Rerun,
            reason: "no terminal condition met, continuing".into(),
            rerun_dimensions: input.rerun_hints.clone(),
            preserve_dimensions: Vec::new(),
            downgrade: None,
        }
    }

    fn accept(&self, reason: String) -> QueenDecision {
        QueenDecision {
            action: QueenAction::Accept,
            reason,
            rerun_dimensions: Vec::new(),
            preserve_dimensions: Vec::new(),
            downgrade: None,
        }
    }

    fn stop(&self, reason: String) -> QueenDecision {
        QueenDecision {
            action: QueenAction::Stop,
            reason,
            rerun_dimensions: Vec::new(),
            preserve_dimensions: Vec::new(),
            downgrade: None,
        }
    }
}
