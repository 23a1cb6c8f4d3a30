use serde::{Deserialize, Serialize};

// ─── Evidence pack ──────────────────────────────────────────────────────────

/// Severity ladder for taboo constraints. Fixed enum; evidence packs never
/// carry severities outside this set.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TabooSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// One terminology hit anchoring the subject to the tradition's vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminologyAnchor {
    pub term: String,
    pub definition: String,
    pub usage_hint: String,
    /// Match confidence: 1.0 exact, 0.9 alias, 0.7 fuzzy.
    pub confidence: f64,
    /// Which dictionary supplied the term.
    pub source: String,
}

/// A curated reference composition the subject resembles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositionReference {
    pub title: String,
    pub artist: String,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleConstraint {
    /// Keyword expected to surface in the draft prompt.
    pub keyword: String,
    pub guidance: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabooViolation {
    pub description: String,
    pub severity: TabooSeverity,
    pub source: String,
    /// The subject fragment that fired the rule.
    pub matched: String,
}

/// Everything the scout found for one (subject, tradition) pair.
/// Built once per run and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidencePack {
    pub subject: String,
    pub tradition: String,
    pub terminology: Vec<TerminologyAnchor>,
    pub compositions: Vec<CompositionReference>,
    pub styles: Vec<StyleConstraint>,
    pub taboos: Vec<TabooViolation>,
    /// Monotonic function of evidence volume, in [0, 1].
    pub coverage: f64,
}

impl EvidencePack {
    pub fn empty(subject: &str, tradition: &str) -> Self {
        Self {
            subject: subject.to_string(),
            tradition: tradition.to_string(),
            terminology: Vec::new(),
            compositions: Vec::new(),
            styles: Vec::new(),
            taboos: Vec::new(),
            coverage: 0.0,
        }
    }

    /// Worst severity among recorded taboo violations, if any.
    pub fn max_taboo_severity(&self) -> Option<TabooSeverity> {
        self.taboos.iter().map(|t| t.severity).max()
    }

    /// One-paragraph summary used in agent contexts and archives.
    pub fn summary(&self) -> String {
        let terms: Vec<&str> = self.terminology.iter().map(|t| t.term.as_str()).collect();
        let refs: Vec<String> = self
            .compositions
            .iter()
            .map(|c| format!("{} ({})", c.title, c.artist))
            .collect();
        format!(
            "tradition={} coverage={:.2} terms=[{}] references=[{}] taboo_violations={}",
            self.tradition,
            self.coverage,
            terms.join(", "),
            refs.join(", "),
            self.taboos.len()
        )
    }
}
