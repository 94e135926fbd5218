mod catalog;
mod listings;
mod pricing;
mod providers;
mod snapshot;

use std::time::Instant;

use serde::Serialize;
use serde_json::{json, Value};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

use sedori_core::{BatchRun, ItemOutcome, ProviderId, RunStatus};

use crate::cli::{Cli, Command};
use crate::error::CliError;

/// How the run ended, surfaced in the report and the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunLabel {
    Completed,
    CompletedWithFailures,
    Aborted,
}

/// Payload assembled by one subcommand.
pub struct CommandResult {
    pub data: Value,
    pub provider_chain: Vec<ProviderId>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub status: RunLabel,
}

impl CommandResult {
    pub fn ok(data: Value, provider_chain: Vec<ProviderId>) -> Self {
        Self {
            data,
            provider_chain,
            warnings: Vec::new(),
            errors: Vec::new(),
            status: RunLabel::Completed,
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings.extend(warnings);
        self
    }
}

/// Machine-readable run report rendered by the output layer.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub request_id: String,
    pub generated_at: String,
    pub providers: Vec<ProviderId>,
    pub status: RunLabel,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    pub data: Value,
}

pub async fn run(cli: &Cli) -> Result<RunReport, CliError> {
    let started = Instant::now();

    let result = match &cli.command {
        Command::Listings(args) => listings::run(args).await?,
        Command::Catalog(args) => catalog::run(args).await?,
        Command::Pricing(args) => pricing::run(args).await?,
        Command::Snapshot(args) => snapshot::run(args).await?,
        Command::Providers => providers::run()?,
    };

    let generated_at = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| String::from("unknown"));

    tracing::debug!(
        status = ?result.status,
        latency_ms = started.elapsed().as_millis() as u64,
        "command finished"
    );

    Ok(RunReport {
        request_id: Uuid::new_v4().to_string(),
        generated_at,
        providers: result.provider_chain,
        status: result.status,
        latency_ms: started.elapsed().as_millis().min(u128::from(u64::MAX)) as u64,
        warnings: result.warnings,
        errors: result.errors,
        data: result.data,
    })
}

/// Serializes a batch run into per-item JSON rows, one per input code.
pub fn outcomes_to_json<T: Serialize>(codes: &[String], run: &BatchRun<T>) -> Value {
    let rows: Vec<Value> = codes
        .iter()
        .zip(run.outcomes.iter())
        .map(|(code, outcome)| match outcome {
            ItemOutcome::Enriched(value) => json!({
                "code": code,
                "status": "enriched",
                "data": serde_json::to_value(value).unwrap_or(Value::Null),
            }),
            ItemOutcome::NoData => json!({ "code": code, "status": "no_data" }),
            ItemOutcome::Failed { error } => json!({
                "code": code,
                "status": "failed",
                "error": error,
            }),
            ItemOutcome::Skipped => json!({ "code": code, "status": "skipped" }),
        })
        .collect();

    json!({
        "items": rows,
        "enriched_count": run.enriched_count(),
        "total_count": run.outcomes.len(),
    })
}

/// Maps batch-run status onto the report label plus warning/error lines.
pub fn run_disposition<T>(run: &BatchRun<T>) -> (RunLabel, Vec<String>, Vec<String>) {
    match &run.status {
        RunStatus::Completed => (RunLabel::Completed, Vec::new(), Vec::new()),
        RunStatus::CompletedWithFailures { failed_chunks } => (
            RunLabel::CompletedWithFailures,
            vec![format!("{failed_chunks} chunk(s) failed after retries")],
            Vec::new(),
        ),
        RunStatus::Aborted { error } => {
            (RunLabel::Aborted, Vec::new(), vec![error.to_string()])
        }
    }
}
