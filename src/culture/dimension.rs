use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// The five fixed evaluation axes, ordered L1 → L5.
///
/// Progressive critic staging and weight tables both rely on this order being
/// stable; `Dimension::ALL` is the canonical iteration order everywhere.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Dimension {
    VisualPerception,
    TechnicalAnalysis,
    CulturalContext,
    CriticalInterpretation,
    PhilosophicalAesthetic,
}

impl Dimension {
    pub const ALL: [Dimension; 5] = [
        Dimension::VisualPerception,
        Dimension::TechnicalAnalysis,
        Dimension::CulturalContext,
        Dimension::CriticalInterpretation,
        Dimension::PhilosophicalAesthetic,
    ];

    /// Zero-based layer index (L1 = 0 … L5 = 4).
    pub fn index(self) -> usize {
        Self::ALL.iter().position(|d| *d == self).unwrap_or(0)
    }

    /// Short layer label ("L1" … "L5") used in reports and logs.
    pub fn layer_label(self) -> &'static str {
        match self {
            Dimension::VisualPerception => "L1",
            Dimension::TechnicalAnalysis => "L2",
            Dimension::CulturalContext => "L3",
            Dimension::CriticalInterpretation => "L4",
            Dimension::PhilosophicalAesthetic => "L5",
        }
    }

    /// Human-readable label for agent prompts and critique reports.
    pub fn label(self) -> &'static str {
        match self {
            Dimension::VisualPerception => "visual perception",
            Dimension::TechnicalAnalysis => "technical analysis",
            Dimension::CulturalContext => "cultural context",
            Dimension::CriticalInterpretation => "critical interpretation",
            Dimension::PhilosophicalAesthetic => "philosophical aesthetic",
        }
    }
}
