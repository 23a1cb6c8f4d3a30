use crate::queen::QueenAction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

/// Lightweight per-run bookkeeping row. The trajectory store holds the full
/// history; this is the index the orchestrator consults for dedup and status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub idempotency_key: Option<String>,
    pub subject: String,
    pub tradition: String,
    pub status: RunStatus,
    pub final_action: Option<QueenAction>,
    pub final_score: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// Run bookkeeping backend. Swappable so embedders can persist run state
/// in their own storage.
pub trait RunStore: Send + Sync {
    fn find(&self, run_id: &str) -> Option<RunRecord>;
    fn find_by_key(&self, idempotency_key: &str) -> Option<RunRecord>;
    fn upsert(&self, record: RunRecord);
}

/// Default in-process backend.
#[derive(Default)]
pub struct InMemoryRunStore {
    records: RwLock<HashMap<String, RunRecord>>,
}

impl InMemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RunStore for InMemoryRunStore {
    fn find(&self, run_id: &str) -> Option<RunRecord> {
        self.records
            .read()
            .ok()
            .and_then(|map| map.get(run_id).cloned())
    }

    fn find_by_key(&self, idempotency_key: &str) -> Option<RunRecord> {
        self.records.read().ok().and_then(|map| {
            map.values()
                .find(|r| r.idempotency_key.as_deref() == Some(idempotency_key))
                .cloned()
        })
    }

    fn upsert(&self, record: RunRecord) {
        if let Ok(mut map) = self.records.write() {
            map.insert(record.run_id.clone(), record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(run_id: &str, key: Option<&str>, status: RunStatus) -> RunRecord {
        RunRecord {
            run_id: run_id.into(),
            idempotency_key: key.map(str::to_string),
            subject: "subject".into(),
            tradition: "chinese_xieyi".into(),
            status,
            final_action: None,
            final_score: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn upsert_then_find() {
        let store = InMemoryRunStore::new();
        store.upsert(record("run-1", None, RunStatus::Running));
        assert_eq!(store.find("run-1").unwrap().status, RunStatus::Running);
        assert!(store.find("missing").is_none());
    }

    #[test]
    fn find_by_key_matches_only_keyed_runs() {
        let store = InMemoryRunStore::new();
        store.upsert(record("run-1", Some("key-a"), RunStatus::Completed));
        store.upsert(record("run-2", None, RunStatus::Completed));

        assert_eq!(store.find_by_key("key-a").unwrap().run_id, "run-1");
        assert!(store.find_by_key("key-b").is_none());
    }

    #[test]
    fn upsert_replaces_status_in_place() {
        let store = InMemoryRunStore::new();
        store.upsert(record("run-1", None, RunStatus::Running));
        let mut done = record("run-1", None, RunStatus::Completed);
        done.final_score = Some(0.8);
        store.upsert(done);

        let found = store.find("run-1").unwrap();
        assert_eq!(found.status, RunStatus::Completed);
        assert_eq!(found.final_score, Some(0.8));
    }
}
