use crate::critic::EscalationMode;
use crate::culture::ModulationConfig;
use anyhow::{Context, Result};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

// ── Top-level config ──────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AtelierConfig {
    /// Workspace directory - computed from home, not serialized
    #[serde(skip)]
    pub workspace_dir: PathBuf,
    /// Path to config.toml - computed from home, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(default)]
    pub draft: DraftConfig,

    #[serde(default)]
    pub critic: CriticConfig,

    #[serde(default)]
    pub queen: QueenConfig,

    #[serde(default)]
    pub modulation: ModulationConfig,

    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

// ── Draft stage ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DraftConfig {
    /// Provider chain, tried in order ("mock", "local:<checkpoint>",
    /// "remote:<url>", "flaky:<n>:<kind>").
    pub providers: Vec<String>,
    pub attempts_per_provider: u32,
    pub base_backoff_ms: u64,
    /// Candidates generated per round before any downgrade.
    pub candidate_count: u32,
    pub steps: u32,
    pub base_seed: u64,
    pub width: u32,
    pub height: u32,
    pub sampler: String,
}

impl Default for DraftConfig {
    fn default() -> Self {
        Self {
            providers: vec!["mock".into()],
            attempts_per_provider: 2,
            base_backoff_ms: 50,
            candidate_count: 3,
            steps: 28,
            base_seed: 42,
            width: 768,
            height: 768,
            sampler: "euler_a".into(),
        }
    }
}

// ── Critic ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CriticConfig {
    /// Evaluation capability: "none" keeps the critic purely rule-based,
    /// "mock" wires the deterministic test capability.
    pub capability: String,
    pub escalation_mode: EscalationMode,
    /// Priority above which a dimension earns an agent call.
    pub escalation_threshold: f64,
    /// Evidence coverage below which escalation fires regardless of priority.
    pub coverage_threshold: f64,
    /// Budget charged per agent call.
    pub escalation_cost: f64,
    /// Per-dimension floor every candidate must clear to pass the gate.
    pub gate_min_score: f64,
    /// Dimensions scoring under this become rerun hints.
    pub hint_threshold: f64,
}

impl Default for CriticConfig {
    fn default() -> Self {
        Self {
            capability: "none".into(),
            escalation_mode: EscalationMode::Parallel,
            escalation_threshold: 0.02,
            coverage_threshold: 0.3,
            escalation_cost: 5.0,
            gate_min_score: 0.35,
            hint_threshold: 0.45,
        }
    }
}

// ── Queen ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueenConfig {
    pub max_rounds: u32,
    pub max_cost: f64,
    /// Flat estimate charged per round; provider billing varies too much
    /// between chains to meter exactly.
    pub round_cost_estimate: f64,
    pub early_stop_threshold: f64,
    pub accept_threshold: f64,
    /// Fraction of max_cost at which generation parameters are downgraded.
    pub downgrade_fraction: f64,
    /// Smallest round-over-round gain that does not count as stagnation.
    pub min_improvement: f64,
    pub downgraded_candidate_count: u32,
    pub downgraded_steps: u32,
}

impl Default for QueenConfig {
    fn default() -> Self {
        Self {
            max_rounds: 5,
            max_cost: 100.0,
            round_cost_estimate: 10.0,
            early_stop_threshold: 0.85,
            accept_threshold: 0.70,
            downgrade_fraction: 0.75,
            min_improvement: 0.01,
            downgraded_candidate_count: 1,
            downgraded_steps: 12,
        }
    }
}

// ── Orchestrator ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Bounded event channel capacity between the run worker and consumers.
    pub channel_capacity: usize,
    /// Pause in a waiting state after each round until a human action
    /// arrives. Off by default; interactive frontends turn it on.
    pub await_action_between_rounds: bool,
    /// How many similar past trajectories feed the escalation guidance.
    pub rag_top_k: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 64,
            await_action_between_rounds: false,
            rag_top_k: 3,
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────

impl AtelierConfig {
    pub fn load_or_init() -> Result<Self> {
        let home = UserDirs::new()
            .map(|u| u.home_dir().to_path_buf())
            .context("Could not find home directory")?;
        let atelier_dir = home.join(".atelier");
        let config_path = atelier_dir.join("config.toml");

        if !atelier_dir.exists() {
            fs::create_dir_all(&atelier_dir).context("Failed to create .atelier directory")?;
            fs::create_dir_all(atelier_dir.join("workspace"))
                .context("Failed to create workspace directory")?;
        }

        if config_path.exists() {
            let contents =
                fs::read_to_string(&config_path).context("Failed to read config file")?;
            let mut config: AtelierConfig =
                toml::from_str(&contents).context("Failed to parse config file")?;
            config.config_path.clone_from(&config_path);
            config.workspace_dir = atelier_dir.join("workspace");
            config.apply_env_overrides();
            config.validate()?;
            Ok(config)
        } else {
            let mut config = Self {
                config_path: config_path.clone(),
                workspace_dir: atelier_dir.join("workspace"),
                ..Self::default()
            };
            config.apply_env_overrides();
            config.validate()?;
            config.save()?;
            Ok(config)
        }
    }

    /// Apply environment variable overrides to config
    pub fn apply_env_overrides(&mut self) {
        if let Ok(workspace) = std::env::var("ATELIER_WORKSPACE") {
            if !workspace.is_empty() {
                self.workspace_dir = PathBuf::from(workspace);
            }
        }
        if let Ok(providers) = std::env::var("ATELIER_PROVIDERS") {
            let parsed: Vec<String> = providers
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect();
            if !parsed.is_empty() {
                self.draft.providers = parsed;
            }
        }
        if let Ok(rounds) = std::env::var("ATELIER_MAX_ROUNDS") {
            if let Ok(rounds) = rounds.parse::<u32>() {
                if rounds >= 1 {
                    self.queen.max_rounds = rounds;
                }
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.draft.providers.is_empty(),
            "draft.providers must name at least one provider"
        );
        anyhow::ensure!(
            self.draft.attempts_per_provider >= 1,
            "draft.attempts_per_provider must be at least 1"
        );
        anyhow::ensure!(self.queen.max_rounds >= 1, "queen.max_rounds must be at least 1");
        anyhow::ensure!(self.queen.max_cost > 0.0, "queen.max_cost must be positive");
        anyhow::ensure!(
            self.queen.round_cost_estimate > 0.0,
            "queen.round_cost_estimate must be positive"
        );
        for (name, value) in [
            ("queen.early_stop_threshold", self.queen.early_stop_threshold),
            ("queen.accept_threshold", self.queen.accept_threshold),
            ("critic.gate_min_score", self.critic.gate_min_score),
            ("critic.hint_threshold", self.critic.hint_threshold),
            ("critic.coverage_threshold", self.critic.coverage_threshold),
        ] {
            anyhow::ensure!(
                (0.0..=1.0).contains(&value),
                "{name} must be within [0, 1], got {value}"
            );
        }
        anyhow::ensure!(
            self.queen.accept_threshold <= self.queen.early_stop_threshold,
            "queen.accept_threshold must not exceed queen.early_stop_threshold"
        );
        anyhow::ensure!(
            self.queen.downgrade_fraction > 0.0,
            "queen.downgrade_fraction must be positive"
        );
        anyhow::ensure!(
            self.orchestrator.channel_capacity >= 1,
            "orchestrator.channel_capacity must be at least 1"
        );
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&self.config_path, toml_str).context("Failed to write config file")?;
        Ok(())
    }
}
