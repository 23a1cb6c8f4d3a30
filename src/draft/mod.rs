pub mod chain;
pub mod providers;

pub use chain::{ProviderChain, RouteEntry, RouteOutcome};
pub use providers::{DraftOutput, GenerationProvider, GenerationRequest};

use crate::config::DraftConfig;
use crate::culture::Dimension;
use crate::error::{PipelineError, Result};
use crate::scout::EvidencePack;
use crate::util::sanitize_id;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Canvas dimensions must land on this granularity for every provider.
pub const DIMENSION_GRANULARITY: u32 = 8;
pub const MIN_CANVAS: u32 = 64;
pub const MAX_CANVAS: u32 = 2048;
pub const MAX_STEPS: u32 = 150;

// ─── Candidate ──────────────────────────────────────────────────────────────

/// One generated artifact. Created by the draft stage, referenced but never
/// mutated by later stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub prompt: String,
    pub negative_prompt: String,
    pub seed: u64,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub sampler: String,
    /// Model reference of the provider that produced the artifact.
    pub generator: String,
    pub output_path: PathBuf,
}

/// The plan recorded into the trajectory before generation starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftPlan {
    pub prompt: String,
    pub negative_prompt: String,
    pub prompt_hash: String,
    pub candidate_count: u32,
    pub steps: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftResult {
    pub plan: DraftPlan,
    pub candidates: Vec<Candidate>,
    pub route_log: Vec<RouteEntry>,
}

// ─── Clamping ───────────────────────────────────────────────────────────────

/// Non-positive counts coerce to 1; an upper bound keeps a single round from
/// flooding the budget.
pub fn clamp_candidate_count(count: u32) -> u32 {
    count.clamp(1, 16)
}

pub fn clamp_steps(steps: u32) -> u32 {
    steps.clamp(1, MAX_STEPS)
}

/// Clamp into the supported canvas range, then round to the nearest multiple
/// of the provider-mandated granularity. Clamping first keeps the snap
/// arithmetic inside u32 for any input.
pub fn clamp_canvas(dim: u32) -> u32 {
    let clamped = dim.clamp(MIN_CANVAS, MAX_CANVAS);
    ((clamped + DIMENSION_GRANULARITY / 2) / DIMENSION_GRANULARITY) * DIMENSION_GRANULARITY
}

// ─── Stage ──────────────────────────────────────────────────────────────────

/// Drives one round of candidate generation through the provider chain.
pub struct DraftStage<'a> {
    chain: &'a ProviderChain,
    config: &'a DraftConfig,
    workspace: &'a Path,
}

impl<'a> DraftStage<'a> {
    pub fn new(chain: &'a ProviderChain, config: &'a DraftConfig, workspace: &'a Path) -> Self {
        Self {
            chain,
            config,
            workspace,
        }
    }

    /// Generate this round's candidates. `rerun_focus` lists dimensions a
    /// local rerun is targeting; the prompt carries the extra emphasis while
    /// preserved dimensions keep their phrasing untouched.
    pub async fn run(
        &self,
        task_id: &str,
        round: u32,
        evidence: &EvidencePack,
        rerun_focus: &[Dimension],
        candidate_count: u32,
        steps: u32,
    ) -> Result<DraftResult> {
        let safe_task = sanitize_id(task_id)?;
        let candidate_dir = self
            .workspace
            .join("runs")
            .join(&safe_task)
            .join("candidates");

        let prompt = build_prompt(evidence, rerun_focus);
        let negative_prompt = build_negative_prompt(evidence);
        let count = clamp_candidate_count(candidate_count);
        let steps = clamp_steps(steps);

        let plan = DraftPlan {
            prompt_hash: prompt_hash(&prompt),
            prompt: prompt.clone(),
            negative_prompt: negative_prompt.clone(),
            candidate_count: count,
            steps,
        };
        tracing::info!(
            round,
            candidates = count,
            steps,
            prompt_hash = plan.prompt_hash.as_str(),
            "draft plan ready"
        );

        let mut candidates = Vec::with_capacity(count as usize);
        let mut route_log = Vec::new();

        for index in 0..count {
            let seed = self.config.base_seed + u64::from(round) * 1_000 + u64::from(index);
            let id = format!("{safe_task}-r{round}-c{index}");
            let request = GenerationRequest {
                prompt: prompt.clone(),
                negative_prompt: negative_prompt.clone(),
                seed,
                width: clamp_canvas(self.config.width),
                height: clamp_canvas(self.config.height),
                steps,
                sampler: self.config.sampler.clone(),
                output_path: candidate_dir.join(format!("{id}.png")),
            };

            let output = self
                .chain
                .generate(&request, &mut route_log)
                .await
                .map_err(|e| PipelineError::Draft(e.to_string()))?;

            candidates.push(Candidate {
                id,
                prompt: request.prompt,
                negative_prompt: request.negative_prompt,
                seed,
                width: request.width,
                height: request.height,
                steps,
                sampler: request.sampler,
                generator: output.provider,
                output_path: output.output_path,
            });
        }

        Ok(DraftResult {
            plan,
            candidates,
            route_log,
        })
    }
}

fn build_prompt(evidence: &EvidencePack, rerun_focus: &[Dimension]) -> String {
    let mut parts = vec![evidence.subject.clone()];
    for anchor in &evidence.terminology {
        parts.push(format!("{} ({})", anchor.term, anchor.usage_hint));
    }
    for style in &evidence.styles {
        parts.push(format!("{}: {}", style.keyword, style.guidance));
    }
    if !rerun_focus.is_empty() {
        let labels: Vec<&str> = rerun_focus.iter().map(|d| d.label()).collect();
        parts.push(format!("refine especially: {}", labels.join(", ")));
    }
    parts.join(", ")
}

fn build_negative_prompt(evidence: &EvidencePack) -> String {
    let mut parts = vec!["blurry".to_string(), "watermark".to_string(), "text artifacts".to_string()];
    for taboo in &evidence.taboos {
        parts.push(taboo.matched.clone());
    }
    parts.join(", ")
}

/// Short stable hash identifying the prompt in trajectory records.
pub fn prompt_hash(prompt: &str) -> String {
    let digest = Sha256::digest(prompt.as_bytes());
    hex::encode(&digest[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::culture;
    use crate::draft::providers::MockProvider;
    use crate::scout::Scout;
    use std::sync::Arc;

    fn evidence() -> EvidencePack {
        let (variant, _) = culture::resolve("chinese_xieyi");
        Scout::build(
            "Dong Yuan landscape with hemp-fiber texture strokes",
            "chinese_xieyi",
            &variant,
        )
    }

    fn config() -> DraftConfig {
        DraftConfig::default()
    }

    #[test]
    fn clamps_follow_safe_ranges() {
        assert_eq!(clamp_candidate_count(0), 1);
        assert_eq!(clamp_candidate_count(99), 16);
        assert_eq!(clamp_steps(0), 1);
        assert_eq!(clamp_steps(9_999), MAX_STEPS);
        assert_eq!(clamp_canvas(510), 512);
        assert_eq!(clamp_canvas(513), 512);
        assert_eq!(clamp_canvas(1), MIN_CANVAS);
        assert_eq!(clamp_canvas(90_000), MAX_CANVAS);
        assert_eq!(clamp_canvas(512) % DIMENSION_GRANULARITY, 0);
    }

    #[test]
    fn extreme_canvas_values_clamp_without_overflow() {
        assert_eq!(clamp_canvas(u32::MAX), MAX_CANVAS);
        assert_eq!(clamp_canvas(u32::MAX - DIMENSION_GRANULARITY), MAX_CANVAS);
        assert_eq!(clamp_canvas(0), MIN_CANVAS);
    }

    #[test]
    fn prompt_embeds_evidence_and_focus() {
        let pack = evidence();
        let prompt = build_prompt(&pack, &[Dimension::CulturalContext]);
        assert!(prompt.contains("Dong Yuan landscape"));
        assert!(prompt.contains("hemp-fiber strokes"));
        assert!(prompt.contains("refine especially: cultural context"));
    }

    #[test]
    fn negative_prompt_carries_taboo_matches() {
        let (variant, _) = culture::resolve("western_academic");
        let pack = Scout::build("primitive art still life", "western_academic", &variant);
        let negative = build_negative_prompt(&pack);
        assert!(negative.contains("primitive art"));
    }

    #[test]
    fn prompt_hash_is_stable_and_short() {
        let a = prompt_hash("ink wash mountains");
        let b = prompt_hash("ink wash mountains");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[tokio::test]
    async fn stage_generates_requested_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let chain = ProviderChain::new(vec![("mock".into(), Arc::new(MockProvider::new()))], 2, 0);
        let cfg = config();
        let stage = DraftStage::new(&chain, &cfg, dir.path());

        let result = stage
            .run("task-1", 1, &evidence(), &[], 2, 20)
            .await
            .unwrap();

        assert_eq!(result.candidates.len(), 2);
        assert_ne!(result.candidates[0].seed, result.candidates[1].seed);
        for candidate in &result.candidates {
            assert!(candidate.output_path.exists());
            assert_eq!(candidate.width % DIMENSION_GRANULARITY, 0);
        }
        assert_eq!(result.route_log.len(), 2);
    }

    #[tokio::test]
    async fn generator_names_the_provider_that_succeeded() {
        use crate::draft::providers::FlakyProvider;
        use crate::error::FailureKind;

        let dir = tempfile::tempdir().unwrap();
        let chain = ProviderChain::new(
            vec![
                (
                    "flaky".into(),
                    Arc::new(FlakyProvider::always_failing(FailureKind::Timeout)),
                ),
                ("mock".into(), Arc::new(MockProvider::new())),
            ],
            2,
            0,
        );
        let cfg = config();
        let stage = DraftStage::new(&chain, &cfg, dir.path());

        let result = stage
            .run("task-2", 1, &evidence(), &[], 1, 20)
            .await
            .unwrap();

        // The fallback provider rendered the artifact, so it must be credited.
        assert_eq!(result.candidates[0].generator, "mock/procedural-v1");
    }

    #[tokio::test]
    async fn stage_rejects_traversal_task_ids() {
        let dir = tempfile::tempdir().unwrap();
        let chain = ProviderChain::new(vec![("mock".into(), Arc::new(MockProvider::new()))], 2, 0);
        let cfg = config();
        let stage = DraftStage::new(&chain, &cfg, dir.path());

        let err = stage
            .run("../escape", 1, &evidence(), &[], 1, 20)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("path traversal"));
    }
}
