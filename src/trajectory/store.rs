use super::recorder::TrajectoryRecord;
use crate::error::Result;
use crate::util::sanitize_id;
use anyhow::Context as _;
use std::path::{Path, PathBuf};

/// Filesystem-backed trajectory store, one JSON document per run id.
/// Records are immutable once written.
pub struct TrajectoryStore {
    root: PathBuf,
}

impl TrajectoryStore {
    pub fn new(workspace: &Path) -> Self {
        Self {
            root: workspace.join("trajectories"),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn save(&self, record: &TrajectoryRecord) -> Result<PathBuf> {
        let safe_id = sanitize_id(&record.run_id)?;
        std::fs::create_dir_all(&self.root)
            .with_context(|| format!("creating trajectory dir {}", self.root.display()))?;
        let path = self.root.join(format!("{safe_id}.json"));
        let json = serde_json::to_string_pretty(record)
            .context("serializing trajectory record")?;
        std::fs::write(&path, json)
            .with_context(|| format!("writing trajectory {}", path.display()))?;
        tracing::debug!(run_id = record.run_id.as_str(), path = %path.display(), "trajectory persisted");
        Ok(path)
    }

    pub fn load(&self, run_id: &str) -> Result<TrajectoryRecord> {
        let safe_id = sanitize_id(run_id)?;
        let path = self.root.join(format!("{safe_id}.json"));
        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("reading trajectory {}", path.display()))?;
        let record = serde_json::from_str(&json)
            .with_context(|| format!("parsing trajectory {}", path.display()))?;
        Ok(record)
    }

    /// All stored trajectories. A missing directory is an empty store, not
    /// an error; unparsable files are skipped with a warning.
    pub fn list(&self) -> Vec<TrajectoryRecord> {
        let Ok(entries) = std::fs::read_dir(&self.root) else {
            return Vec::new();
        };
        let mut records = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_none_or(|e| e != "json") {
                continue;
            }
            match std::fs::read_to_string(&path)
                .map_err(anyhow::Error::from)
                .and_then(|json| serde_json::from_str(&json).map_err(anyhow::Error::from))
            {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(path = %path.display(), "skipping unreadable trajectory: {e}");
                }
            }
        }
        records.sort_by(|a: &TrajectoryRecord, b: &TrajectoryRecord| {
            a.created_at.cmp(&b.created_at)
        });
        records
    }
}
