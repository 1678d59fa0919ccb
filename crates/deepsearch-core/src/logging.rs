use anyhow::{Context, Result};
use chrono::{Datelike, Utc};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;
use std::collections::HashSet;
use std::fs::{self, create_dir_all, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::warn;

const LOG_DIR_ENV: &str = "DEEPSEARCH_LOG_DIR";
const RETENTION_ENV: &str = "DEEPSEARCH_LOG_RETENTION_DAYS";
const DEFAULT_LOG_DIR: &str = "data/logs";
const DEFAULT_RETENTION_DAYS: u64 = 90;

static REDACTION_PATTERNS: Lazy<Vec<(String, Regex)>> = Lazy::new(|| {
    vec![
        (
            "api_key".to_string(),
            Regex::new(r"(?i)(api[_-]?key\s*[:=]\s*)([A-Za-z0-9\-_.+/]+)")
                .expect("invalid api_key regex"),
        ),
        (
            "secret".to_string(),
            Regex::new(r"(?i)(secret\s*[:=]\s*)([A-Za-z0-9\-_.+/]+)")
                .expect("invalid secret regex"),
        ),
        (
            "bearer".to_string(),
            Regex::new(r"(?i)(bearer\s+)([A-Za-z0-9\-_.+=/]+)").expect("invalid bearer regex"),
        ),
    ]
});

/// What the orchestration layer hands over after a run completes.
#[derive(Debug, Clone)]
pub struct RunLogInput {
    pub run_id: String,
    pub query: String,
    pub final_state: String,
    pub confidence: f64,
    pub credits_used: f64,
    pub workflow_path: Vec<String>,
    pub processing_time: f64,
}

#[derive(Serialize)]
struct RunLogRecord {
    timestamp: String,
    run_id: String,
    query: String,
    final_state: String,
    confidence: f64,
    credits_used: f64,
    workflow_path: Vec<String>,
    processing_time: f64,
    redactions: Vec<String>,
}

#[derive(Serialize)]
struct AuditLogRecord {
    timestamp: String,
    run_id: String,
    redactions: Vec<String>,
}

fn log_base_dir() -> PathBuf {
    std::env::var(LOG_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_LOG_DIR))
}

fn retention_days() -> u64 {
    std::env::var(RETENTION_ENV)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETENTION_DAYS)
}

fn append_json_line<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)
            .with_context(|| format!("failed to create log directory {}", parent.display()))?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let line = serde_json::to_string(value)?;
    writeln!(writer, "{}", line)
        .with_context(|| format!("failed to append log entry to {}", path.display()))?;
    writer.flush()?;
    Ok(())
}

fn sanitize_text(input: &str, redactions: &mut HashSet<String>) -> String {
    let mut output = input.to_string();
    for (name, regex) in REDACTION_PATTERNS.iter() {
        let mut matched = false;
        output = regex
            .replace_all(&output, |caps: &Captures| {
                matched = true;
                format!("{}[REDACTED]", &caps[1])
            })
            .to_string();
        if matched {
            redactions.insert(name.clone());
        }
    }
    output
}

/// Append one run-completion record under the month-partitioned log tree,
/// redacting anything secret-shaped from the query first.
pub fn log_run_completion(input: RunLogInput) -> Result<()> {
    let timestamp = Utc::now();
    let mut redactions = HashSet::new();

    let query = sanitize_text(&input.query, &mut redactions);

    let record = RunLogRecord {
        timestamp: timestamp.to_rfc3339(),
        run_id: input.run_id.clone(),
        query,
        final_state: input.final_state,
        confidence: input.confidence,
        credits_used: input.credits_used,
        workflow_path: input.workflow_path,
        processing_time: input.processing_time,
        redactions: redactions.iter().cloned().collect(),
    };

    let base_dir = log_base_dir();
    let month_dir = base_dir
        .join(format!("{:04}", timestamp.year()))
        .join(format!("{:02}", timestamp.month()));
    let run_log_path = month_dir.join("runs.jsonl");
    append_json_line(&run_log_path, &record)?;

    if !record.redactions.is_empty() {
        let audit = AuditLogRecord {
            timestamp: record.timestamp.clone(),
            run_id: input.run_id.clone(),
            redactions: record.redactions.clone(),
        };
        let audit_path = month_dir.join("audit.jsonl");
        append_json_line(&audit_path, &audit)?;
        warn!(
            run_id = %input.run_id,
            fields = ?record.redactions,
            "redacted potential secrets from run log"
        );
    }

    enforce_retention(&base_dir)?;

    Ok(())
}

fn enforce_retention(base_dir: &Path) -> Result<()> {
    let retention = retention_days();
    if retention == 0 || !base_dir.exists() {
        return Ok(());
    }
    let cutoff = SystemTime::now()
        .checked_sub(Duration::from_secs(retention.saturating_mul(86_400)))
        .unwrap_or(SystemTime::UNIX_EPOCH);

    prune_directory(base_dir, cutoff)
}

fn prune_directory(dir: &Path, cutoff: SystemTime) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let metadata = entry.metadata()?;
        if metadata.is_dir() {
            prune_directory(&path, cutoff)?;
            if path.read_dir()?.next().is_none() {
                fs::remove_dir(&path).ok();
            }
        } else if metadata.is_file()
            && metadata
                .modified()
                .map(|time| time < cutoff)
                .unwrap_or(false)
        {
            fs::remove_file(&path).ok();
        }
    }

    Ok(())
}
