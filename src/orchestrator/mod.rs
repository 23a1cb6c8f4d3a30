pub mod checkpoint;
pub mod events;
pub mod hitl;
pub mod intent;
pub mod run_store;

pub use checkpoint::CheckpointStore;
pub use events::{PipelineEvent, Stage, StageStatus};
pub use hitl::{ActionReceipt, HitlGate, HumanAction};
pub use intent::RunIntent;
pub use run_store::{InMemoryRunStore, RunRecord, RunStatus, RunStore};

use crate::archivist::Archivist;
use crate::config::AtelierConfig;
use crate::critic::{capability::create_capability, Critic, CrossLayerSignal, LayerStateStore, RoundCritique};
use crate::culture::{self, Dimension, ModulationConfig, WeightTable};
use crate::draft::providers::create_provider;
use crate::draft::{DraftResult, DraftStage, ProviderChain};
use crate::error::Result;
use crate::queen::{Queen, QueenAction, QueenDecision, RoundInput};
use crate::scout::{EvidencePack, Scout};
use crate::trajectory::{RoundRecord, TrajectoryIndex, TrajectoryRecorder, TrajectoryStore};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

// ─── Outcome and handle ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub run_id: String,
    pub final_action: QueenAction,
    pub final_score: f64,
    pub rounds_used: u32,
    pub total_cost: f64,
    pub archived: bool,
    /// True when an idempotency key matched a completed run and this outcome
    /// was replayed instead of executed.
    pub reused: bool,
}

/// Live handle to a running pipeline: the event stream, the human-action
/// gate, and the final outcome.
#[derive(Debug)]
pub struct RunHandle {
    pub run_id: String,
    events: mpsc::Receiver<PipelineEvent>,
    gate: Arc<HitlGate>,
    join: JoinHandle<Result<RunOutcome>>,
}

impl RunHandle {
    pub async fn next_event(&mut self) -> Option<PipelineEvent> {
        self.events.recv().await
    }

    pub fn submit(&self, action: HumanAction) -> ActionReceipt {
        self.gate.submit(action)
    }

    /// Drain remaining events and wait for the worker. Draining first keeps
    /// the worker from blocking on a full event channel.
    pub async fn wait(mut self) -> Result<RunOutcome> {
        while self.events.recv().await.is_some() {}
        match self.join.await {
            Ok(result) => result,
            Err(e) => Err(anyhow::anyhow!("run worker panicked: {e}").into()),
        }
    }
}

// ─── Orchestrator ───────────────────────────────────────────────────────────

/// Owns run lifecycle: validates intents, deduplicates by idempotency key,
/// spawns the round loop on a worker task, and exposes the typed event
/// stream.
pub struct Orchestrator {
    config: AtelierConfig,
    run_store: Arc<dyn RunStore>,
}

impl Orchestrator {
    pub fn new(config: AtelierConfig) -> Self {
        Self::with_run_store(config, Arc::new(InMemoryRunStore::new()))
    }

    pub fn with_run_store(config: AtelierConfig, run_store: Arc<dyn RunStore>) -> Self {
        Self { config, run_store }
    }

    pub fn run_store(&self) -> &Arc<dyn RunStore> {
        &self.run_store
    }

    /// Start one pipeline run. Returns immediately with a handle; the rounds
    /// execute on a spawned worker task.
    pub fn start(&self, intent: RunIntent) -> Result<RunHandle> {
        intent.validate()?;

        if let Some(key) = &intent.idempotency_key {
            if let Some(existing) = self.run_store.find_by_key(key) {
                if existing.status == RunStatus::Completed {
                    tracing::info!(
                        run_id = existing.run_id.as_str(),
                        key,
                        "idempotency key matched a completed run, replaying outcome"
                    );
                    return Ok(self.replay(existing));
                }
            }
        }

        let run_id = intent
            .run_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        crate::util::sanitize_id(&run_id)?;

        self.run_store.upsert(RunRecord {
            run_id: run_id.clone(),
            idempotency_key: intent.idempotency_key.clone(),
            subject: intent.subject.clone(),
            tradition: intent.tradition.clone(),
            status: RunStatus::Running,
            final_action: None,
            final_score: None,
            created_at: Utc::now(),
        });

        let (tx, rx) = mpsc::channel(self.config.orchestrator.channel_capacity);
        let (gate, actions) = HitlGate::channel();
        let gate = Arc::new(gate);

        let worker = RunWorker {
            config: self.config.clone(),
            run_store: Arc::clone(&self.run_store),
            intent,
            run_id: run_id.clone(),
            tx,
            gate: Arc::clone(&gate),
            actions,
        };
        let join = tokio::spawn(worker.run());

        Ok(RunHandle {
            run_id,
            events: rx,
            gate,
            join,
        })
    }

    fn replay(&self, existing: RunRecord) -> RunHandle {
        let (tx, rx) = mpsc::channel(self.config.orchestrator.channel_capacity);
        let (gate, _actions) = HitlGate::channel();
        let gate = Arc::new(gate);
        let workspace = self.config.workspace_dir.clone();
        let run_id = existing.run_id.clone();

        let join = tokio::spawn(async move {
            let store = TrajectoryStore::new(&workspace);
            let (action, score, rounds, cost) = match store.load(&existing.run_id) {
                Ok(record) => (
                    record.final_action,
                    record.final_score,
                    record.rounds.len() as u32,
                    record.total_cost,
                ),
                Err(_) => (
                    existing.final_action.unwrap_or(QueenAction::Stop),
                    existing.final_score.unwrap_or(0.0),
                    0,
                    0.0,
                ),
            };
            let _ = tx
                .send(PipelineEvent::PipelineCompleted {
                    run_id: existing.run_id.clone(),
                    final_action: action,
                    final_score: score,
                    rounds_used: rounds,
                    total_cost: cost,
                })
                .await;
            Ok(RunOutcome {
                run_id: existing.run_id,
                final_action: action,
                final_score: score,
                rounds_used: rounds,
                total_cost: cost,
                archived: true,
                reused: true,
            })
        });

        RunHandle {
            run_id,
            events: rx,
            gate,
            join,
        }
    }
}

// ─── Worker ─────────────────────────────────────────────────────────────────

struct RunWorker {
    config: AtelierConfig,
    run_store: Arc<dyn RunStore>,
    intent: RunIntent,
    run_id: String,
    tx: mpsc::Sender<PipelineEvent>,
    gate: Arc<HitlGate>,
    actions: mpsc::Receiver<HumanAction>,
}

impl RunWorker {
    async fn run(mut self) -> Result<RunOutcome> {
        let result = self.execute().await;
        match &result {
            Ok(outcome) => {
                self.emit(PipelineEvent::PipelineCompleted {
                    run_id: self.run_id.clone(),
                    final_action: outcome.final_action,
                    final_score: outcome.final_score,
                    rounds_used: outcome.rounds_used,
                    total_cost: outcome.total_cost,
                })
                .await;
                self.update_record(RunStatus::Completed, Some(outcome));
            }
            Err(e) => {
                self.emit(PipelineEvent::PipelineFailed {
                    run_id: self.run_id.clone(),
                    message: format!("{e}"),
                })
                .await;
                self.update_record(RunStatus::Failed, None);
            }
        }
        result
    }

    async fn execute(&mut self) -> Result<RunOutcome> {
        let intent = self.intent.clone();
        let workspace = self.config.workspace_dir.clone();
        let (variant, base_weights) = culture::resolve(&intent.tradition);
        let checkpoints = CheckpointStore::new(&workspace, &self.run_id)?;

        let mut providers = Vec::new();
        for name in &self.config.draft.providers {
            providers.push((name.clone(), create_provider(name)?));
        }
        let chain = ProviderChain::new(
            providers,
            self.config.draft.attempts_per_provider,
            self.config.draft.base_backoff_ms,
        );

        let trajectory_store = TrajectoryStore::new(&workspace);
        let index = TrajectoryIndex::build(&trajectory_store);
        let neighbors = index.retrieve(
            &intent.subject,
            &intent.tradition,
            self.config.orchestrator.rag_top_k,
        );
        let guidance = TrajectoryIndex::render_guidance(&neighbors);

        let capability = create_capability(&self.config.critic.capability)?;
        let critic = Critic::new(self.config.critic.clone(), capability).with_guidance(guidance);
        let mut queen = Queen::new(self.config.queen.clone());
        let mut layers = LayerStateStore::new();
        let mut recorder = TrajectoryRecorder::new(&self.run_id, &intent.subject, &intent.tradition);

        let resume = intent.resume_from;
        let evidence: EvidencePack = if resume.is_some_and(|s| s > Stage::Scout) {
            self.stage_started(1, Stage::Scout).await;
            let pack = checkpoints.load(Stage::Scout)?;
            self.stage_completed(1, Stage::Scout, StageStatus::Skipped).await;
            pack
        } else {
            self.stage_started(1, Stage::Scout).await;
            let pack = Scout::build(&intent.subject, &intent.tradition, &variant);
            checkpoints.save(Stage::Scout, &pack)?;
            self.stage_completed(1, Stage::Scout, StageStatus::Completed).await;
            pack
        };
        recorder.set_evidence(&evidence);

        let base_candidates = intent.candidate_count.unwrap_or(self.config.draft.candidate_count);
        let base_steps = intent.steps.unwrap_or(self.config.draft.steps);

        let mut rerun_focus: Vec<Dimension> = Vec::new();
        let mut last_signals: Vec<CrossLayerSignal> = Vec::new();
        let mut final_critique: Option<RoundCritique> = None;
        let mut round: u32 = 0;

        let (final_action, final_score) = loop {
            round += 1;
            // Scoring table at round start, modulated by what the previous
            // round's critique reported.
            let scoring_weights = culture::modulate(
                &base_weights,
                &layers,
                round,
                &last_signals,
                &self.config.modulation,
            );

            let draft_result: DraftResult =
                if round == 1 && resume.is_some_and(|s| s > Stage::Draft) {
                    self.stage_started(round, Stage::Draft).await;
                    let restored = checkpoints.load(Stage::Draft)?;
                    self.stage_completed(round, Stage::Draft, StageStatus::Skipped).await;
                    restored
                } else {
                    self.stage_started(round, Stage::Draft).await;
                    let (count, steps) = queen.effective_params(base_candidates, base_steps);
                    let stage = DraftStage::new(&chain, &self.config.draft, &workspace);
                    let result = stage
                        .run(&self.run_id, round, &evidence, &rerun_focus, count, steps)
                        .await?;
                    checkpoints.save(Stage::Draft, &result)?;
                    self.stage_completed(round, Stage::Draft, StageStatus::Completed).await;
                    result
                };

            let mut critique: RoundCritique =
                if round == 1 && resume.is_some_and(|s| s > Stage::Critic) {
                    self.stage_started(round, Stage::Critic).await;
                    let restored = checkpoints.load(Stage::Critic)?;
                    self.stage_completed(round, Stage::Critic, StageStatus::Skipped).await;
                    restored
                } else {
                    self.stage_started(round, Stage::Critic).await;
                    let mut critique = critic
                        .evaluate(
                            &self.run_id,
                            &evidence,
                            &draft_result.candidates,
                            &variant,
                            &scoring_weights,
                            &mut layers,
                        )
                        .await?;
                    reweigh_for_decision(
                        &mut critique,
                        &base_weights,
                        &layers,
                        round,
                        &self.config.modulation,
                    );
                    checkpoints.save(Stage::Critic, &critique)?;
                    self.stage_completed(round, Stage::Critic, StageStatus::Completed).await;
                    critique
                };

            let best_total = critique.best().weighted_total;
            let gate_passed = critique.best().gate_passed;
            self.stage_started(round, Stage::Queen).await;
            let decision = queen.decide(RoundInput {
                gate_passed,
                best_total,
                rerun_hints: critique.rerun_hints.clone(),
                signals: critique.signals.clone(),
                candidates_generated: draft_result.candidates.len() as u32,
                critic_calls: 1 + critique.escalated.len() as u32,
                local_rerun_allowed: variant.local_rerun_allowed,
            });
            checkpoints.save(Stage::Queen, &decision)?;
            self.stage_completed(round, Stage::Queen, StageStatus::Completed).await;
            last_signals = critique.signals.clone();

            recorder.record_round(RoundRecord {
                round,
                draft_plan: draft_result.plan.clone(),
                scores: critique.best().score_map(),
                weighted_total: best_total,
                gate_passed,
                decision: decision.clone(),
            });
            self.emit(PipelineEvent::DecisionMade {
                run_id: self.run_id.clone(),
                round,
                weighted_total: best_total,
                decision: decision.clone(),
            })
            .await;

            let decision = if self.config.orchestrator.await_action_between_rounds {
                self.await_human(round, decision, &mut queen, &mut layers, &mut critique)
                    .await
            } else {
                decision
            };

            match decision.action {
                QueenAction::Accept | QueenAction::Stop => {
                    let total = critique.best().weighted_total;
                    final_critique = Some(critique);
                    break (decision.action, total);
                }
                QueenAction::Rerun => {
                    rerun_focus = decision.rerun_dimensions.clone();
                    final_critique = Some(critique);
                }
                QueenAction::Downgrade => {
                    rerun_focus.clear();
                    final_critique = Some(critique);
                }
            }
        };

        let total_cost = queen.budget().total_cost;
        let rounds_used = queen.budget().rounds_used;
        let record = recorder.finalize(final_action, final_score, total_cost);
        trajectory_store.save(&record)?;

        let archivist = Archivist::new(&workspace);
        let archive = archivist.archive(&record, final_critique.as_ref(), &self.config);

        Ok(RunOutcome {
            run_id: self.run_id.clone(),
            final_action,
            final_score,
            rounds_used,
            total_cost,
            archived: archive.success,
            reused: false,
        })
    }

    /// Park in the waiting state until a terminal reviewer action arrives.
    /// Dimension locks apply immediately and keep the window open; so does a
    /// force-accept naming a candidate this round never produced.
    async fn await_human(
        &mut self,
        round: u32,
        decision: QueenDecision,
        queen: &mut Queen,
        layers: &mut LayerStateStore,
        critique: &mut RoundCritique,
    ) -> QueenDecision {
        self.gate.set_waiting(true);
        self.emit(PipelineEvent::AwaitingHuman {
            run_id: self.run_id.clone(),
            round,
        })
        .await;

        let resolved = loop {
            match self.actions.recv().await {
                None | Some(HumanAction::Approve) => break decision,
                Some(HumanAction::Reject { reason }) => {
                    break QueenDecision {
                        action: QueenAction::Stop,
                        reason: format!("rejected by reviewer: {reason}"),
                        rerun_dimensions: Vec::new(),
                        preserve_dimensions: Vec::new(),
                        downgrade: None,
                    };
                }
                Some(HumanAction::ForceAccept { candidate_id }) => {
                    let Some(index) = critique
                        .candidates
                        .iter()
                        .position(|c| c.candidate.id == candidate_id)
                    else {
                        tracing::warn!(
                            candidate_id = candidate_id.as_str(),
                            "force-accept names an unknown candidate, still waiting"
                        );
                        continue;
                    };
                    critique.best_index = index;
                    break QueenDecision {
                        action: QueenAction::Accept,
                        reason: format!("force-accepted by reviewer: candidate {candidate_id}"),
                        rerun_dimensions: Vec::new(),
                        preserve_dimensions: Vec::new(),
                        downgrade: None,
                    };
                }
                Some(HumanAction::Abort) => {
                    break QueenDecision {
                        action: QueenAction::Stop,
                        reason: "aborted by reviewer".into(),
                        rerun_dimensions: Vec::new(),
                        preserve_dimensions: Vec::new(),
                        downgrade: None,
                    };
                }
                Some(HumanAction::LockDimension { dimension }) => {
                    layers.get_mut(dimension).locked = true;
                    queen.confirm_dimension(dimension);
                    tracing::info!(dimension = %dimension, "dimension locked by reviewer");
                }
            }
        };
        self.gate.set_waiting(false);
        resolved
    }

    async fn emit(&self, event: PipelineEvent) {
        if self.tx.send(event).await.is_err() {
            tracing::debug!("event receiver dropped, continuing without stream");
        }
    }

    async fn stage_started(&self, round: u32, stage: Stage) {
        self.emit(PipelineEvent::StageStarted {
            run_id: self.run_id.clone(),
            round,
            stage,
        })
        .await;
    }

    async fn stage_completed(&self, round: u32, stage: Stage, status: StageStatus) {
        self.emit(PipelineEvent::StageCompleted {
            run_id: self.run_id.clone(),
            round,
            stage,
            status,
        })
        .await;
    }

    fn update_record(&self, status: RunStatus, outcome: Option<&RunOutcome>) {
        if let Some(mut record) = self.run_store.find(&self.run_id) {
            record.status = status;
            record.final_action = outcome.map(|o| o.final_action);
            record.final_score = outcome.map(|o| o.final_score);
            self.run_store.upsert(record);
        }
    }
}

/// The critique feeds the weight table before the queen reads it: this
/// round's signals and layer confidences modulate the base weights, and every
/// candidate is re-scored under the result.
fn reweigh_for_decision(
    critique: &mut RoundCritique,
    base: &WeightTable,
    layers: &LayerStateStore,
    round: u32,
    config: &ModulationConfig,
) {
    let weights = culture::modulate(base, layers, round, &critique.signals, config);
    critique.apply_weights(&weights);
}
