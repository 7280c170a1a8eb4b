//! Dermascan CLI: assess capture quality or run a full diagnosis.
//!
//! `diagnose` reads its collaborators from the environment (see `.env`).

use anyhow::Context;
use clap::{Parser, Subcommand};
use dermascan_cli::{describe_event, init_tracing, print_json, quality_options, read_captures};
use dermascan_core::Config;
use dermascan_pipeline::{FlowContext, FlowOrchestrator, StaticSessionProvider};
use dermascan_processing::{QualityAssessor, QualityOptions};
use dermascan_storage::create_storage;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "dermascan", about = "Skin capture assessment and diagnosis")]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score the technical quality of one capture
    Assess {
        /// Path to the image
        file: PathBuf,
        /// Minimum overall score for a good capture [default: MIN_QUALITY_SCORE]
        #[arg(long)]
        min_score: Option<u8>,
        #[arg(long)]
        no_sharpness: bool,
        #[arg(long)]
        no_brightness: bool,
        #[arg(long)]
        no_framing: bool,
    },
    /// Upload, analyze and save up to three captures (front, left, right)
    Diagnose {
        /// Capture files in angle order
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;
    // Production deployments always log JSON lines
    init_tracing(cli.json_logs || config.is_production());

    match cli.command {
        Commands::Assess {
            file,
            min_score,
            no_sharpness,
            no_brightness,
            no_framing,
        } => {
            let data = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let assessor = QualityAssessor::new(QualityOptions {
                evaluate_sharpness: !no_sharpness,
                evaluate_brightness: !no_brightness,
                evaluate_framing: !no_framing,
                ..quality_options(&config, min_score)
            });
            let report = tokio::task::spawn_blocking(move || assessor.assess(&data))
                .await
                .context("Assessment task panicked")??;
            print_json(&report)?;
        }
        Commands::Diagnose { files } => {
            let storage = create_storage(&config)
                .await
                .context("Failed to initialize storage")?;
            let sessions = Arc::new(StaticSessionProvider::from_config(&config));
            let orchestrator = FlowOrchestrator::from_config(&config, storage, sessions)?;

            let captures = read_captures(&files).await?;
            tracing::info!(
                captures = captures.len(),
                storage = %config.storage_backend,
                "Starting diagnosis"
            );

            let (ctx, mut events) = FlowContext::with_events();
            let logger = tokio::spawn(async move {
                while let Some(event) = events.recv().await {
                    eprintln!("{}", describe_event(&event));
                }
            });

            let outcome = orchestrator.run(captures, &ctx).await;
            drop(ctx);
            // Sender is gone, the logger drains what is left and stops
            let _ = logger.await;

            let output = outcome.context("Diagnosis failed")?;
            print_json(&output)?;
        }
    }

    Ok(())
}
