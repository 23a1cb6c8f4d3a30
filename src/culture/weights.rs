use super::dimension::Dimension;
use crate::critic::layers::LayerStateStore;
use crate::critic::signals::{CrossLayerSignal, SignalKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-dimension weight table. Invariant: weights sum to 1.0 within
/// floating tolerance at construction and after every modulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightTable {
    weights: BTreeMap<Dimension, f64>,
}

pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Minimum signal strength that earns the target dimension a weight boost.
pub const SIGNAL_BOOST_THRESHOLD: f64 = 0.3;

impl WeightTable {
    /// Build a table from per-dimension raw weights, normalizing to sum 1.
    /// Non-finite or negative entries are treated as 0; an all-zero input
    /// degrades to the uniform table.
    pub fn new(raw: [(Dimension, f64); 5]) -> Self {
        let mut weights = BTreeMap::new();
        for (dim, w) in raw {
            weights.insert(dim, if w.is_finite() && w > 0.0 { w } else { 0.0 });
        }
        let mut table = Self { weights };
        table.renormalize();
        table
    }

    pub fn uniform() -> Self {
        Self::new(Dimension::ALL.map(|d| (d, 0.2)))
    }

    pub fn get(&self, dim: Dimension) -> f64 {
        self.weights.get(&dim).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Dimension, f64)> + '_ {
        self.weights.iter().map(|(d, w)| (*d, *w))
    }

    pub fn sum(&self) -> f64 {
        self.weights.values().sum()
    }

    /// Weighted total of a per-dimension score set under this table.
    pub fn weighted_total(&self, scores: &BTreeMap<Dimension, f64>) -> f64 {
        Dimension::ALL
            .iter()
            .map(|d| self.get(*d) * scores.get(d).copied().unwrap_or(0.0))
            .sum()
    }

    fn renormalize(&mut self) {
        let sum: f64 = self.weights.values().sum();
        if sum <= WEIGHT_SUM_TOLERANCE {
            for dim in Dimension::ALL {
                self.weights.insert(dim, 0.2);
            }
            return;
        }
        for w in self.weights.values_mut() {
            *w /= sum;
        }
    }
}

// ─── Per-round modulation ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModulationConfig {
    /// Confidence below which a dimension's weight is boosted.
    pub low_confidence_threshold: f64,
    /// Multiplicative boost for low-confidence and signal-targeted dims.
    pub boost_factor: f64,
    /// Maximum absolute deviation any dimension may take from its base weight.
    pub max_deviation: f64,
    /// Decay constant for blending toward the uniform table; larger keeps the
    /// cultural prior alive longer.
    pub uniform_decay_rounds: f64,
}

impl Default for ModulationConfig {
    fn default() -> Self {
        Self {
            low_confidence_threshold: 0.5,
            boost_factor: 1.3,
            max_deviation: 0.20,
            uniform_decay_rounds: 6.0,
        }
    }
}

/// Recompute the round's weight table from the base cultural weights.
///
/// Boosts low-confidence dimensions and dimensions targeted by a strong
/// reinterpret / evidence-gap / conflict signal, then blends toward the
/// uniform 1/5 distribution as rounds accumulate: later rounds trust the
/// per-run signal more than the static cultural prior. Deviations from the
/// base table are clipped to `max_deviation` before renormalizing.
pub fn modulate(
    base: &WeightTable,
    layers: &LayerStateStore,
    round_number: u32,
    signals: &[CrossLayerSignal],
    config: &ModulationConfig,
) -> WeightTable {
    let mut raw: BTreeMap<Dimension, f64> = base.iter().collect();

    for (dim, weight) in &mut raw {
        let state = layers.get(*dim);
        if state.confidence < config.low_confidence_threshold {
            *weight *= config.boost_factor;
        }
        let signalled = signals.iter().any(|s| {
            s.target == *dim
                && s.strength >= SIGNAL_BOOST_THRESHOLD
                && matches!(
                    s.kind,
                    SignalKind::Reinterpret | SignalKind::EvidenceGap | SignalKind::Conflict
                )
        });
        if signalled {
            *weight *= config.boost_factor;
        }
    }

    // Monotonic decay of the cultural prior toward uniform.
    let round = f64::from(round_number.max(1));
    let t = round / (round + config.uniform_decay_rounds.max(1.0));
    for weight in raw.values_mut() {
        *weight = (1.0 - t) * *weight + t * 0.2;
    }

    // Clip to the deviation bound relative to the base table.
    for (dim, weight) in &mut raw {
        let base_w = base.get(*dim);
        let lo = (base_w - config.max_deviation).max(0.0);
        let hi = base_w + config.max_deviation;
        *weight = weight.clamp(lo, hi);
    }

    let mut entries = [(Dimension::VisualPerception, 0.0); 5];
    for (i, dim) in Dimension::ALL.iter().enumerate() {
        entries[i] = (*dim, raw.get(dim).copied().unwrap_or(0.0));
    }
    WeightTable::new(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::critic::signals::CrossLayerSignal;

    fn store_with_confidence(confidence: f64) -> LayerStateStore {
        let mut store = LayerStateStore::new();
        for dim in Dimension::ALL {
            store.get_mut(dim).confidence = confidence;
        }
        store
    }

    #[test]
    fn base_table_sums_to_one() {
        let table = WeightTable::new([
            (Dimension::VisualPerception, 0.15),
            (Dimension::TechnicalAnalysis, 0.15),
            (Dimension::CulturalContext, 0.25),
            (Dimension::CriticalInterpretation, 0.15),
            (Dimension::PhilosophicalAesthetic, 0.30),
        ]);
        assert!((table.sum() - 1.0).abs() < WEIGHT_SUM_TOLERANCE);
    }

    #[test]
    fn all_zero_input_degrades_to_uniform() {
        let table = WeightTable::new(Dimension::ALL.map(|d| (d, 0.0)));
        for dim in Dimension::ALL {
            assert!((table.get(dim) - 0.2).abs() < WEIGHT_SUM_TOLERANCE);
        }
    }

    #[test]
    fn modulated_table_sums_to_one_every_round() {
        let base = WeightTable::new([
            (Dimension::VisualPerception, 0.1),
            (Dimension::TechnicalAnalysis, 0.1),
            (Dimension::CulturalContext, 0.3),
            (Dimension::CriticalInterpretation, 0.2),
            (Dimension::PhilosophicalAesthetic, 0.3),
        ]);
        let store = store_with_confidence(0.3);
        let config = ModulationConfig::default();
        for round in 1..=10 {
            let table = modulate(&base, &store, round, &[], &config);
            assert!(
                (table.sum() - 1.0).abs() < 1e-6,
                "round {round} sum {}",
                table.sum()
            );
        }
    }

    #[test]
    fn later_rounds_trend_toward_uniform() {
        let base = WeightTable::new([
            (Dimension::VisualPerception, 0.05),
            (Dimension::TechnicalAnalysis, 0.05),
            (Dimension::CulturalContext, 0.2),
            (Dimension::CriticalInterpretation, 0.2),
            (Dimension::PhilosophicalAesthetic, 0.5),
        ]);
        let store = store_with_confidence(0.9);
        let config = ModulationConfig::default();

        let mut prev_distance = f64::MAX;
        for round in 1..=8 {
            let table = modulate(&base, &store, round, &[], &config);
            let distance: f64 = Dimension::ALL
                .iter()
                .map(|d| (table.get(*d) - 0.2).abs())
                .sum();
            assert!(
                distance <= prev_distance + 1e-9,
                "round {round}: distance {distance} > previous {prev_distance}"
            );
            prev_distance = distance;
        }
    }

    #[test]
    fn signal_target_gets_boosted() {
        let base = WeightTable::uniform();
        let store = store_with_confidence(0.9);
        let config = ModulationConfig::default();
        let signal = CrossLayerSignal {
            source: Dimension::PhilosophicalAesthetic,
            target: Dimension::CulturalContext,
            kind: SignalKind::Reinterpret,
            message: "reread the landscape as literati self-portrait".into(),
            strength: 0.8,
        };

        let plain = modulate(&base, &store, 1, &[], &config);
        let signalled = modulate(&base, &store, 1, &[signal], &config);
        assert!(signalled.get(Dimension::CulturalContext) > plain.get(Dimension::CulturalContext));
    }

    #[test]
    fn weak_or_confirmation_signals_do_not_boost() {
        let base = WeightTable::uniform();
        let store = store_with_confidence(0.9);
        let config = ModulationConfig::default();
        let weak = CrossLayerSignal {
            source: Dimension::PhilosophicalAesthetic,
            target: Dimension::CulturalContext,
            kind: SignalKind::Conflict,
            message: "minor".into(),
            strength: 0.2,
        };
        let confirmation = CrossLayerSignal {
            source: Dimension::VisualPerception,
            target: Dimension::TechnicalAnalysis,
            kind: SignalKind::Confirmation,
            message: "agrees".into(),
            strength: 0.9,
        };

        let plain = modulate(&base, &store, 1, &[], &config);
        let with_signals = modulate(&base, &store, 1, &[weak, confirmation], &config);
        assert_eq!(plain, with_signals);
    }

    #[test]
    fn deviation_clipped_to_bound() {
        let base = WeightTable::new([
            (Dimension::VisualPerception, 0.1),
            (Dimension::TechnicalAnalysis, 0.1),
            (Dimension::CulturalContext, 0.1),
            (Dimension::CriticalInterpretation, 0.1),
            (Dimension::PhilosophicalAesthetic, 0.6),
        ]);
        let store = store_with_confidence(0.1);
        let config = ModulationConfig {
            max_deviation: 0.05,
            ..ModulationConfig::default()
        };
        let table = modulate(&base, &store, 9, &[], &config);
        // Pre-normalization clipping bounds deviation; renormalization can
        // shift entries slightly, so allow a small margin.
        for dim in Dimension::ALL {
            let deviation = (table.get(dim) - base.get(dim)).abs();
            assert!(deviation <= 0.05 + 0.02, "{dim} deviated {deviation}");
        }
    }
}
