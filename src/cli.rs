use crate::archivist::Archivist;
use crate::config::AtelierConfig;
use crate::orchestrator::{Orchestrator, PipelineEvent, RunIntent, Stage};
use crate::trajectory::{TrajectoryIndex, TrajectoryStore};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::str::FromStr;

/// `atelier` - culturally grounded generation and critique pipeline.
#[derive(Parser, Debug)]
#[command(name = "atelier")]
#[command(version = "0.1.0")]
#[command(
    about = "Generate artwork candidates and refine them against tradition-specific aesthetics.",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full pipeline for one subject
    Run {
        /// Artwork subject / creative brief
        subject: String,

        /// Aesthetic tradition (e.g. chinese_xieyi, western_academic)
        #[arg(short, long, default_value = "western_academic")]
        tradition: String,

        /// Explicit run id (required to resume a previous run)
        #[arg(long)]
        run_id: Option<String>,

        /// Candidates generated per round
        #[arg(long)]
        candidates: Option<u32>,

        /// Sampler steps per candidate
        #[arg(long)]
        steps: Option<u32>,

        /// Round budget override for this invocation
        #[arg(long)]
        max_rounds: Option<u32>,

        /// Provider chain override, first entry tried first
        /// (mock, flaky:<n>:<kind>, local:<ckpt>, remote:<url>)
        #[arg(long = "provider")]
        providers: Vec<String>,

        /// Resume the first round from this stage (scout, draft, critic, queen)
        #[arg(long)]
        resume_from: Option<String>,

        /// Idempotency key; a completed run with the same key is replayed
        #[arg(long)]
        idempotency_key: Option<String>,
    },

    /// List recorded run trajectories, or query them for similar past runs
    Trajectories {
        /// Show full round detail for one run id
        #[arg(long)]
        run_id: Option<String>,

        /// Retrieve the most similar past runs for this subject
        #[arg(long, conflicts_with = "run_id")]
        subject: Option<String>,

        /// Tradition to weight retrieval toward (with --subject)
        #[arg(short, long, default_value = "western_academic")]
        tradition: String,
    },

    /// Show archive artifacts for a finished run
    Archive { run_id: String },
}

pub async fn dispatch(cli: Cli, config: AtelierConfig) -> Result<()> {
    match cli.command {
        Commands::Run {
            subject,
            tradition,
            run_id,
            candidates,
            steps,
            max_rounds,
            providers,
            resume_from,
            idempotency_key,
        } => {
            let mut config = config;
            if let Some(max_rounds) = max_rounds {
                config.queen.max_rounds = max_rounds;
            }
            if !providers.is_empty() {
                config.draft.providers = providers;
            }
            config.validate()?;

            let resume = resume_from
                .as_deref()
                .map(|s| {
                    Stage::from_str(s)
                        .map_err(|_| anyhow::anyhow!("unknown stage {s:?}: use scout, draft, critic or queen"))
                })
                .transpose()?;

            let intent = RunIntent {
                run_id,
                subject,
                tradition,
                idempotency_key,
                candidate_count: candidates,
                steps,
                resume_from: resume,
            };

            let orchestrator = Orchestrator::new(config);
            let mut handle = orchestrator.start(intent)?;
            println!("run {} started", handle.run_id);

            while let Some(event) = handle.next_event().await {
                print_event(&event);
            }
            let outcome = handle.wait().await?;
            println!(
                "{}: {} at {:.3} after {} round(s), cost {:.1}",
                outcome.run_id,
                outcome.final_action,
                outcome.final_score,
                outcome.rounds_used,
                outcome.total_cost
            );
            Ok(())
        }

        Commands::Trajectories {
            run_id,
            subject,
            tradition,
        } => {
            let store = TrajectoryStore::new(&config.workspace_dir);
            if let Some(subject) = subject {
                let index = TrajectoryIndex::build(&store);
                let neighbors = index.retrieve(&subject, &tradition, config.orchestrator.rag_top_k);
                if neighbors.is_empty() {
                    println!("no similar past runs recorded");
                    return Ok(());
                }
                for neighbor in &neighbors {
                    println!(
                        "{:.3}  {}  {} ({}) -> {} at {:.3}",
                        neighbor.similarity,
                        neighbor.record.run_id,
                        neighbor.record.subject,
                        neighbor.record.tradition,
                        neighbor.record.final_action,
                        neighbor.record.final_score
                    );
                }
                if let Some(patterns) = TrajectoryIndex::patterns(&neighbors) {
                    println!(
                        "patterns over {} run(s): {:.1} mean rounds, {:.3} mean final score, {:.0}% accepted",
                        patterns.sample_size,
                        patterns.mean_rounds,
                        patterns.mean_final_score,
                        patterns.accept_rate * 100.0
                    );
                    for dim in &patterns.frequent_rerun_dimensions {
                        println!("  frequent rerun dimension: {}", dim.label());
                    }
                }
            } else if let Some(run_id) = run_id {
                let record = store
                    .load(&run_id)
                    .with_context(|| format!("loading trajectory for run {run_id}"))?;
                println!(
                    "{}: {:?} ({}) -> {} at {:.3}",
                    record.run_id,
                    record.subject,
                    record.tradition,
                    record.final_action,
                    record.final_score
                );
                for round in &record.rounds {
                    println!(
                        "  round {}: total {:.3}, gate {}, {} ({})",
                        round.round,
                        round.weighted_total,
                        if round.gate_passed { "passed" } else { "failed" },
                        round.decision.action,
                        round.decision.reason
                    );
                }
            } else {
                let records = store.list();
                if records.is_empty() {
                    println!("no trajectories recorded yet");
                }
                for record in records {
                    println!(
                        "{}  {}  {} round(s)  {} {:.3}",
                        record.created_at.format("%Y-%m-%d %H:%M"),
                        record.run_id,
                        record.rounds.len(),
                        record.final_action,
                        record.final_score
                    );
                }
            }
            Ok(())
        }

        Commands::Archive { run_id } => {
            let archivist = Archivist::new(&config.workspace_dir);
            let dir = archivist.root().join(crate::util::sanitize_id(&run_id)?);
            anyhow::ensure!(dir.exists(), "no archive for run {run_id}");
            for entry in std::fs::read_dir(&dir)
                .with_context(|| format!("reading archive dir {}", dir.display()))?
            {
                let entry = entry?;
                println!("{}", entry.path().display());
            }
            Ok(())
        }
    }
}

fn print_event(event: &PipelineEvent) {
    match event {
        PipelineEvent::StageStarted { round, stage, .. } => {
            println!("  round {round}: {stage} started");
        }
        PipelineEvent::StageCompleted {
            round,
            stage,
            status,
            ..
        } => {
            println!("  round {round}: {stage} {status}");
        }
        PipelineEvent::DecisionMade {
            round,
            weighted_total,
            decision,
            ..
        } => {
            println!(
                "  round {round}: {} at {weighted_total:.3} ({})",
                decision.action, decision.reason
            );
        }
        PipelineEvent::AwaitingHuman { round, .. } => {
            println!("  round {round}: awaiting reviewer action");
        }
        PipelineEvent::PipelineCompleted { .. } | PipelineEvent::PipelineFailed { .. } => {}
    }
}
