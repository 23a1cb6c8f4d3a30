use super::events::Stage;
use crate::error::{PipelineError, Result};
use crate::util::sanitize_id;
use anyhow::Context as _;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Per-stage checkpoint files for one run. A resumed run restores the
/// outputs of every stage before the resume point from here.
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new(workspace: &Path, run_id: &str) -> Result<Self> {
        let safe_id = sanitize_id(run_id)?;
        Ok(Self {
            dir: workspace.join("runs").join(safe_id).join("checkpoints"),
        })
    }

    fn path(&self, stage: Stage) -> PathBuf {
        self.dir.join(format!("{stage}.json"))
    }

    pub fn save<T: Serialize>(&self, stage: Stage, payload: &T) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating checkpoint dir {}", self.dir.display()))?;
        let path = self.path(stage);
        let json = serde_json::to_string_pretty(payload)
            .with_context(|| format!("serializing {stage} checkpoint"))?;
        std::fs::write(&path, json)
            .with_context(|| format!("writing checkpoint {}", path.display()))?;
        tracing::debug!(%stage, path = %path.display(), "checkpoint saved");
        Ok(())
    }

    /// Load a stage's checkpoint. A missing file is a dedicated error so the
    /// orchestrator can tell "never ran" apart from IO trouble.
    pub fn load<T: DeserializeOwned>(&self, stage: Stage) -> Result<T> {
        let path = self.path(stage);
        if !path.exists() {
            return Err(PipelineError::CheckpointMissing {
                stage: stage.to_string(),
                message: format!("no checkpoint at {}", path.display()),
            }
            .into());
        }
        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("reading checkpoint {}", path.display()))?;
        let payload = serde_json::from_str(&json)
            .with_context(|| format!("parsing checkpoint {}", path.display()))?;
        Ok(payload)
    }

    pub fn exists(&self, stage: Stage) -> bool {
        self.path(stage).exists()
    }
}
