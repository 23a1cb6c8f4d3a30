use crate::culture::Dimension;
use serde::{Deserialize, Serialize};

/// What a cross-layer signal is asking the target dimension to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SignalKind {
    /// Re-read the target dimension under a new interpretation.
    Reinterpret,
    /// The target dimension lacks evidence to stand on.
    EvidenceGap,
    /// The source and target dimensions disagree.
    Conflict,
    /// The source agrees with the target's current reading.
    Confirmation,
}

/// A directive from one dimension's evaluation asking another dimension to be
/// reconsidered. Produced by agent escalation; consumed exactly once by the
/// weight modulator / queen, then cleared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossLayerSignal {
    pub source: Dimension,
    pub target: Dimension,
    pub kind: SignalKind,
    pub message: String,
    /// In [0, 1]; signals below 0.3 are advisory only.
    pub strength: f64,
}

impl CrossLayerSignal {
    /// Whether this signal is strong enough to re-open its target dimension.
    pub fn is_actionable(&self) -> bool {
        self.strength >= crate::culture::weights::SIGNAL_BOOST_THRESHOLD
            && matches!(
                self.kind,
                SignalKind::Reinterpret | SignalKind::EvidenceGap | SignalKind::Conflict
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmation_is_never_actionable() {
        let signal = CrossLayerSignal {
            source: Dimension::VisualPerception,
            target: Dimension::TechnicalAnalysis,
            kind: SignalKind::Confirmation,
            message: "agrees".into(),
            strength: 1.0,
        };
        assert!(!signal.is_actionable());
    }

    #[test]
    fn strong_conflict_is_actionable() {
        let signal = CrossLayerSignal {
            source: Dimension::PhilosophicalAesthetic,
            target: Dimension::CulturalContext,
            kind: SignalKind::Conflict,
            message: "reading disagrees with the cultural framing".into(),
            strength: 0.6,
        };
        assert!(signal.is_actionable());
    }

    #[test]
    fn weak_signal_is_advisory() {
        let signal = CrossLayerSignal {
            source: Dimension::CulturalContext,
            target: Dimension::VisualPerception,
            kind: SignalKind::EvidenceGap,
            message: "thin".into(),
            strength: 0.1,
        };
        assert!(!signal.is_actionable());
    }
}
