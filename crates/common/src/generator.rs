//! Boundary to the external balance / voting-power generator.
//!
//! The generator is an independently versioned program run as a subprocess. It
//! writes two JSON documents into `GENERATOR_OUTPUT_DIR`. Previous outputs are
//! removed before each run; afterwards we check that it exited in time and that
//! both files were written again.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::process::Command;
use tracing::{info, warn};

use crate::config::Generator;
use crate::error::GeneratorError;
use crate::snapshots::parse_snapshot_date;

pub const OUTPUT_DIR_ENV: &str = "GENERATOR_OUTPUT_DIR";
pub const GENERATOR_RUNS: &str = "reg_generator_runs_total";

/// Keep at most this many bytes of stderr in error messages.
const STDERR_TAIL_BYTES: usize = 2048;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateRequest {
    /// Optional `DD-MM-YYYY` snapshot date forwarded as `--date`.
    pub date: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GeneratorOutput {
    pub balances_path: PathBuf,
    pub voting_power_path: PathBuf,
    pub duration: Duration,
}

fn tail(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let trimmed = text.trim();
    if trimmed.len() <= STDERR_TAIL_BYTES {
        return trimmed.to_string();
    }
    let mut start = trimmed.len() - STDERR_TAIL_BYTES;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    trimmed[start..].to_string()
}

pub fn build_command(cfg: &Generator, request: &GenerateRequest) -> Result<Command, GeneratorError> {
    let mut cmd = Command::new(&cfg.program);
    cmd.args(&cfg.args);
    if let Some(date) = &request.date {
        if parse_snapshot_date(date).is_none() {
            return Err(GeneratorError::InvalidRequest(format!(
                "date must be DD-MM-YYYY, got {date:?}"
            )));
        }
        cmd.arg("--date").arg(date);
    }
    if let Some(dir) = &cfg.working_dir {
        cmd.current_dir(dir);
    }
    cmd.env(OUTPUT_DIR_ENV, &cfg.output_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    Ok(cmd)
}

async fn clear_previous_output(path: &Path) -> Result<(), GeneratorError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(GeneratorError::ClearOutput {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Run the generator once. Expiry of `timeout_secs` kills the child and is
/// reported as [`GeneratorError::TimedOut`]; there is no retry here.
pub async fn run_generator(
    cfg: &Generator,
    request: &GenerateRequest,
) -> Result<GeneratorOutput, GeneratorError> {
    tokio::fs::create_dir_all(&cfg.output_dir)
        .await
        .map_err(|source| GeneratorError::Spawn {
            program: cfg.program.clone(),
            source,
        })?;

    let mut cmd = build_command(cfg, request)?;
    let balances_path = cfg.output_dir.join(&cfg.balances_file);
    let voting_power_path = cfg.output_dir.join(&cfg.voting_power_file);
    // Outputs of an earlier run must not pass for this run's.
    for path in [&balances_path, &voting_power_path] {
        clear_previous_output(path).await?;
    }

    let started = Instant::now();
    let child = cmd.spawn().map_err(|source| GeneratorError::Spawn {
        program: cfg.program.clone(),
        source,
    })?;
    info!(program = %cfg.program, date = ?request.date, "generator started");

    let output = match tokio::time::timeout(cfg.timeout(), child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(source)) => {
            metrics::counter!(GENERATOR_RUNS, "outcome" => "error").increment(1);
            return Err(GeneratorError::Spawn {
                program: cfg.program.clone(),
                source,
            });
        }
        Err(_elapsed) => {
            // Dropping the wait future drops the child, which kills it (kill_on_drop).
            warn!(timeout_secs = cfg.timeout_secs, "generator timed out");
            metrics::counter!(GENERATOR_RUNS, "outcome" => "timeout").increment(1);
            return Err(GeneratorError::TimedOut(cfg.timeout_secs));
        }
    };

    if !output.status.success() {
        metrics::counter!(GENERATOR_RUNS, "outcome" => "failed").increment(1);
        return Err(GeneratorError::Failed {
            status: output.status.to_string(),
            stderr: tail(&output.stderr),
        });
    }

    for path in [&balances_path, &voting_power_path] {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            metrics::counter!(GENERATOR_RUNS, "outcome" => "missing_output")
                .increment(1);
            return Err(GeneratorError::MissingOutput(path.clone()));
        }
    }

    let duration = started.elapsed();
    metrics::counter!(GENERATOR_RUNS, "outcome" => "ok").increment(1);
    info!(
        duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        "generator finished"
    );
    Ok(GeneratorOutput {
        balances_path,
        voting_power_path,
        duration,
    })
}
