use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Default, Clone, Deserialize)]
pub struct RunLogEntry {
    pub run_id: Option<String>,
    #[serde(default)]
    pub final_state: String,
    #[serde(default)]
    pub confidence: f64,
}

#[derive(Debug, Default, Clone)]
pub struct EvaluationMetrics {
    pub total_runs: usize,
    pub completed_runs: usize,
    pub average_confidence: f64,
    pub degraded: Vec<String>,
}

impl EvaluationMetrics {
    pub fn record(&mut self, entry: &RunLogEntry) {
        self.total_runs += 1;
        self.average_confidence = ((self.average_confidence * (self.total_runs - 1) as f64)
            + entry.confidence)
            / self.total_runs as f64;
        if entry.final_state == "completed" {
            self.completed_runs += 1;
        } else if let Some(id) = &entry.run_id {
            self.degraded.push(id.clone());
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "completed {}/{} runs • avg confidence {:.2} • {} degraded",
            self.completed_runs,
            self.total_runs,
            self.average_confidence,
            self.degraded.len()
        )
    }
}

/// Aggregates the JSONL run log produced by `log_run_completion`.
pub struct EvaluationHarness;

impl EvaluationHarness {
    pub fn analyze_log(path: impl AsRef<Path>) -> Result<EvaluationMetrics> {
        let file = File::open(path.as_ref())
            .with_context(|| format!("failed to open log file {}", path.as_ref().display()))?;
        let mut metrics = EvaluationMetrics::default();

        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<RunLogEntry>(&line) {
                Ok(entry) => metrics.record(&entry),
                Err(err) => {
                    tracing::debug!(%err, "skipping malformed run log entry");
                }
            }
        }

        Ok(metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::{BufWriter, Write};
    use uuid::Uuid;

    #[test]
    fn evaluation_harness_aggregates_runs() {
        let mut path = std::env::temp_dir();
        path.push(format!("deepsearch-eval-{}.log", Uuid::new_v4()));
        let mut writer = BufWriter::new(File::create(&path).expect("temp file"));
        writeln!(
            writer,
            r#"{{"run_id":"a","final_state":"completed","confidence":0.8}}"#
        )
        .unwrap();
        writeln!(
            writer,
            r#"{{"run_id":"b","final_state":"stuck","confidence":0.4}}"#
        )
        .unwrap();
        writer.flush().unwrap();

        let metrics = EvaluationHarness::analyze_log(&path).expect("metrics");
        std::fs::remove_file(path).ok();

        assert_eq!(metrics.total_runs, 2);
        assert_eq!(metrics.completed_runs, 1);
        assert!((metrics.average_confidence - 0.6).abs() < 1e-9);
        assert_eq!(metrics.degraded, vec!["b".to_string()]);
    }
}
