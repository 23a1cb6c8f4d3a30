use crate::culture::Dimension;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mutable per-dimension state, created fresh per run and carried across
/// rounds. Volatility is always recomputed from the full score history,
/// never set directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerState {
    pub dimension: Dimension,
    pub score: f64,
    pub confidence: f64,
    pub evidence_coverage: f64,
    volatility: f64,
    score_history: Vec<f64>,
    /// Human-confirmed; locked dimensions never re-escalate.
    pub locked: bool,
    /// Already deepened by an agent call this run.
    pub escalated: bool,
    pub cost_spent: f64,
    /// Accumulated textual analysis, newest last. Progressive-mode contexts
    /// are built from this.
    pub analysis: Vec<String>,
}

impl LayerState {
    pub fn new(dimension: Dimension) -> Self {
        Self {
            dimension,
            score: 0.0,
            confidence: 0.0,
            evidence_coverage: 0.0,
            volatility: 0.0,
            score_history: Vec::new(),
            locked: false,
            escalated: false,
            cost_spent: 0.0,
            analysis: Vec::new(),
        }
    }

    /// Record a new score observation and recompute volatility from the
    /// full history of deltas.
    pub fn record_score(&mut self, score: f64) {
        let score = score.clamp(0.0, 1.0);
        self.score = score;
        self.score_history.push(score);
        self.volatility = Self::volatility_of(&self.score_history);
    }

    pub fn volatility(&self) -> f64 {
        self.volatility
    }

    pub fn score_history(&self) -> &[f64] {
        &self.score_history
    }

    pub fn push_analysis(&mut self, text: impl Into<String>) {
        let text = text.into();
        if !text.is_empty() {
            self.analysis.push(text);
        }
    }

    /// Mean absolute delta between consecutive scores, clamped to [0, 1].
    fn volatility_of(history: &[f64]) -> f64 {
        if history.len() < 2 {
            return 0.0;
        }
        let deltas: f64 = history.windows(2).map(|w| (w[1] - w[0]).abs()).sum();
        (deltas / (history.len() - 1) as f64).clamp(0.0, 1.0)
    }
}

/// One state slot per dimension, keyed by the canonical dimension id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerStateStore {
    layers: BTreeMap<Dimension, LayerState>,
}

impl LayerStateStore {
    pub fn new() -> Self {
        let layers = Dimension::ALL
            .iter()
            .map(|d| (*d, LayerState::new(*d)))
            .collect();
        Self { layers }
    }

    pub fn get(&self, dimension: Dimension) -> &LayerState {
        self.layers
            .get(&dimension)
            .expect("store holds every dimension")
    }

    pub fn get_mut(&mut self, dimension: Dimension) -> &mut LayerState {
        self.layers
            .get_mut(&dimension)
            .expect("store holds every dimension")
    }

    pub fn iter(&self) -> impl Iterator<Item = &LayerState> {
        self.layers.values()
    }

    /// Dimensions whose accumulated analysis feeds a progressive context:
    /// all dimensions strictly earlier in L1..L5 order.
    pub fn prior_analysis(&self, dimension: Dimension) -> String {
        Dimension::ALL
            .iter()
            .take_while(|d| **d != dimension)
            .flat_map(|d| self.get(*d).analysis.iter())
            .cloned()
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for LayerStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volatility_zero_until_two_observations() {
        let mut state = LayerState::new(Dimension::VisualPerception);
        assert_eq!(state.volatility(), 0.0);
        state.record_score(0.8);
        assert_eq!(state.volatility(), 0.0);
    }

    #[test]
    fn volatility_tracks_mean_absolute_delta() {
        let mut state = LayerState::new(Dimension::VisualPerception);
        state.record_score(0.2);
        state.record_score(0.8);
        state.record_score(0.5);
        // deltas: 0.6, 0.3 → mean 0.45
        assert!((state.volatility() - 0.45).abs() < 1e-9);
    }

    #[test]
    fn record_clamps_scores_into_unit_interval() {
        let mut state = LayerState::new(Dimension::TechnicalAnalysis);
        state.record_score(1.7);
        assert_eq!(state.score, 1.0);
        state.record_score(-0.4);
        assert_eq!(state.score, 0.0);
    }

    #[test]
    fn store_holds_all_five_dimensions() {
        let store = LayerStateStore::new();
        assert_eq!(store.iter().count(), 5);
    }

    #[test]
    fn prior_analysis_accumulates_earlier_layers_only() {
        let mut store = LayerStateStore::new();
        store
            .get_mut(Dimension::VisualPerception)
            .push_analysis("ink handling is loose and confident");
        store
            .get_mut(Dimension::TechnicalAnalysis)
            .push_analysis("stroke pressure uneven in the foreground");
        store
            .get_mut(Dimension::PhilosophicalAesthetic)
            .push_analysis("should not appear");

        let context = store.prior_analysis(Dimension::CulturalContext);
        assert!(context.contains("ink handling"));
        assert!(context.contains("stroke pressure"));
        assert!(!context.contains("should not appear"));
    }
}
