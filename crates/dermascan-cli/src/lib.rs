use anyhow::Context;
use dermascan_core::{Config, FlowEvent, FlowTerminal, RawCapture};
use dermascan_processing::QualityOptions;
use serde::Serialize;
use std::path::PathBuf;

/// Initialize tracing for the CLI. JSON lines when `json` is set.
pub fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

pub fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

/// Assessment options with every axis on. An explicit `min_score` wins over
/// `MIN_QUALITY_SCORE`.
pub fn quality_options(config: &Config, min_score: Option<u8>) -> QualityOptions {
    QualityOptions {
        min_acceptable_score: min_score.unwrap_or(config.min_quality_score),
        ..QualityOptions::default()
    }
}

/// Read capture files in the given order. The format is sniffed later.
pub async fn read_captures(files: &[PathBuf]) -> anyhow::Result<Vec<RawCapture>> {
    let mut captures = Vec::with_capacity(files.len());
    for file in files {
        let data = tokio::fs::read(file)
            .await
            .with_context(|| format!("Failed to read {}", file.display()))?;
        captures.push(RawCapture::new(data));
    }
    Ok(captures)
}

/// One-line rendering of a flow event for the console.
pub fn describe_event(event: &FlowEvent) -> String {
    match event {
        FlowEvent::Progress(p) => format!(
            "[{:>3}%] {:?}: {} (~{}s left)",
            p.percent, p.stage, p.message, p.estimated_seconds_remaining
        ),
        FlowEvent::Retry {
            attempt,
            max_attempts,
            delay_ms,
        } => format!(
            "retry {}/{} in {}ms",
            attempt, max_attempts, delay_ms
        ),
        FlowEvent::Terminal {
            outcome: FlowTerminal::Completed { saved_id },
        } => format!("completed, saved as {}", saved_id),
        FlowEvent::Terminal {
            outcome: FlowTerminal::Failed {
                error_code,
                message,
            },
        } => format!("failed [{}]: {}", error_code, message),
    }
}
