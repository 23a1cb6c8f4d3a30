use super::events::Stage;
use crate::error::ValidationError;
use serde::{Deserialize, Serialize};

pub const MAX_SUBJECT_LEN: usize = 500;

/// Externally supplied request for one pipeline run. Validated as a whole
/// before anything executes; all field violations are reported together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunIntent {
    /// Caller-chosen run id; generated when absent.
    #[serde(default)]
    pub run_id: Option<String>,
    pub subject: String,
    pub tradition: String,
    /// Runs sharing a key are deduplicated: a completed run's outcome is
    /// returned instead of executing again.
    #[serde(default)]
    pub idempotency_key: Option<String>,
    #[serde(default)]
    pub candidate_count: Option<u32>,
    #[serde(default)]
    pub steps: Option<u32>,
    /// Resume the first round from this stage, restoring earlier stages
    /// from checkpoints.
    #[serde(default)]
    pub resume_from: Option<Stage>,
}

impl RunIntent {
    pub fn new(subject: &str, tradition: &str) -> Self {
        Self {
            run_id: None,
            subject: subject.to_string(),
            tradition: tradition.to_string(),
            idempotency_key: None,
            candidate_count: None,
            steps: None,
            resume_from: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        let subject = self.subject.trim();
        if subject.is_empty() {
            issues.push("subject: must not be empty".to_string());
        } else if subject.len() > MAX_SUBJECT_LEN {
            issues.push(format!(
                "subject: {} chars exceeds maximum {MAX_SUBJECT_LEN}",
                subject.len()
            ));
        }

        let tradition = self.tradition.trim();
        if tradition.is_empty() {
            issues.push("tradition: must not be empty".to_string());
        } else if !tradition
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            issues.push(format!(
                "tradition: {tradition:?} must be lowercase snake_case"
            ));
        }

        if let Some(run_id) = &self.run_id {
            if let Err(e) = crate::util::sanitize_id(run_id) {
                issues.push(format!("run_id: {e}"));
            }
        }
        if let Some(key) = &self.idempotency_key {
            if key.trim().is_empty() {
                issues.push("idempotency_key: must not be blank when present".to_string());
            }
        }
        if let Some(count) = self.candidate_count {
            if !(1..=16).contains(&count) {
                issues.push(format!("candidate_count: {count} outside [1, 16]"));
            }
        }
        if let Some(steps) = self.steps {
            if !(1..=crate::draft::MAX_STEPS).contains(&steps) {
                issues.push(format!(
                    "steps: {steps} outside [1, {}]",
                    crate::draft::MAX_STEPS
                ));
            }
        }
        if self.resume_from.is_some() && self.run_id.is_none() {
            issues.push("resume_from: requires an explicit run_id".to_string());
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}
