//! Adaptive state machine sequencing one research run.
//!
//! States are an enumerated set with an explicit transition table and an
//! iteration budget, so the backtracking cycle stays bounded and the whole
//! trace is inspectable through the adaptation-decision log.

use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::agent::{AgentResult, Payload};
use crate::config::EngineConfig;
use crate::context::ResearchContext;

/// Workflow states. Initializing is the entry; Completed, Failed, and Stuck
/// are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchState {
    Initializing,
    Planning,
    Searching,
    Analyzing,
    Validating,
    Synthesizing,
    Completed,
    Failed,
    Stuck,
}

impl ResearchState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResearchState::Initializing => "initializing",
            ResearchState::Planning => "planning",
            ResearchState::Searching => "searching",
            ResearchState::Analyzing => "analyzing",
            ResearchState::Validating => "validating",
            ResearchState::Synthesizing => "synthesizing",
            ResearchState::Completed => "completed",
            ResearchState::Failed => "failed",
            ResearchState::Stuck => "stuck",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ResearchState::Completed | ResearchState::Failed | ResearchState::Stuck
        )
    }
}

/// Quality measured after each state execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualitySnapshot {
    pub confidence: f64,
    pub source_count: usize,
    pub information_density: f64,
    pub contradiction_level: f64,
}

/// One reasoned transition, recorded for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptationDecision {
    pub from: ResearchState,
    pub to: ResearchState,
    pub reason: String,
    pub quality: QualitySnapshot,
}

/// Effective thresholds for one run: engine config with per-run overrides
/// applied.
#[derive(Debug, Clone)]
pub struct StateMachineConfig {
    pub max_iterations: usize,
    pub min_confidence: f64,
    pub min_sources: usize,
    pub completion_answer_len: usize,
}

impl StateMachineConfig {
    pub fn from_engine(config: &EngineConfig) -> Self {
        Self {
            max_iterations: config.engine.max_iterations,
            min_confidence: config.engine.min_confidence,
            min_sources: config.engine.min_sources,
            completion_answer_len: config.engine.completion_answer_len,
        }
    }
}

impl Default for StateMachineConfig {
    fn default() -> Self {
        Self::from_engine(&EngineConfig::default())
    }
}

/// Run-level bookkeeping carried in the terminal result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowMetadata {
    pub iterations: usize,
    pub states_visited: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Terminal output of one state-machine run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub final_state: ResearchState,
    pub data: Payload,
    pub metadata: WorkflowMetadata,
    pub execution_path: Vec<ResearchState>,
    pub quality: QualitySnapshot,
    pub decisions: Vec<AdaptationDecision>,
    pub total_time_ms: u64,
    pub success: bool,
}

/// Provider of per-state behavior; the orchestrator implements this by
/// delegating to the matching agent. Handlers never raise; failures are
/// carried inside the returned [`AgentResult`].
#[async_trait]
pub trait StateHandlers: Send + Sync {
    async fn execute_state(
        &self,
        state: ResearchState,
        query: &str,
        data: &Payload,
        ctx: &ResearchContext,
    ) -> AgentResult;
}

pub struct AdaptiveStateMachine {
    config: StateMachineConfig,
}

impl AdaptiveStateMachine {
    pub fn new(config: StateMachineConfig) -> Self {
        Self { config }
    }

    /// Drive one run to a terminal state. The workflow data map is owned by
    /// this run; concurrent runs never share it.
    pub async fn run(
        &self,
        query: &str,
        mut data: Payload,
        handlers: &dyn StateHandlers,
        ctx: &ResearchContext,
    ) -> WorkflowResult {
        let cfg = StateMachineConfig {
            max_iterations: ctx.max_iterations.unwrap_or(self.config.max_iterations),
            min_confidence: ctx.min_confidence.unwrap_or(self.config.min_confidence),
            min_sources: ctx.min_sources.unwrap_or(self.config.min_sources),
            completion_answer_len: ctx
                .completion_answer_len
                .unwrap_or(self.config.completion_answer_len),
        };

        let started = Instant::now();
        let mut current = ResearchState::Initializing;
        let mut path: Vec<ResearchState> = Vec::new();
        let mut decisions: Vec<AdaptationDecision> = Vec::new();
        let mut quality = QualitySnapshot::default();
        let mut iterations = 0usize;
        let mut error: Option<String> = None;

        loop {
            path.push(current);
            if current.is_terminal() {
                break;
            }

            if ctx.is_cancelled() {
                let reason = "cancelled".to_string();
                warn!(state = current.as_str(), "run cancelled");
                decisions.push(AdaptationDecision {
                    from: current,
                    to: ResearchState::Failed,
                    reason,
                    quality: quality.clone(),
                });
                error = Some("research run cancelled before completion".to_string());
                current = ResearchState::Failed;
                continue;
            }

            if current != ResearchState::Initializing && iterations >= cfg.max_iterations {
                warn!(iterations, max = cfg.max_iterations, "iteration budget exhausted");
                decisions.push(AdaptationDecision {
                    from: current,
                    to: ResearchState::Stuck,
                    reason: "iteration_budget_exhausted".to_string(),
                    quality: quality.clone(),
                });
                current = ResearchState::Stuck;
                continue;
            }

            let result = handlers.execute_state(current, query, &data, ctx).await;
            if current != ResearchState::Initializing {
                iterations += 1;
            }

            if !result.success {
                let reason = result
                    .error
                    .clone()
                    .unwrap_or_else(|| "handler_error".to_string());
                decisions.push(AdaptationDecision {
                    from: current,
                    to: ResearchState::Failed,
                    reason: reason.clone(),
                    quality: quality.clone(),
                });
                error = Some(reason);
                current = ResearchState::Failed;
                continue;
            }

            quality = Self::assess_quality(current, &result, &quality);
            let (mut next, mut reason) = Self::next_state(current, &quality, &cfg);

            data.extend(result.payload);

            if !next.is_terminal() && Self::completion_met(&data, &quality, &cfg) {
                next = ResearchState::Completed;
                reason = "completion_criteria_met";
            }

            debug!(
                from = current.as_str(),
                to = next.as_str(),
                reason,
                confidence = quality.confidence,
                sources = quality.source_count,
                "state transition"
            );

            decisions.push(AdaptationDecision {
                from: current,
                to: next,
                reason: reason.to_string(),
                quality: quality.clone(),
            });
            current = next;
        }

        let success = current == ResearchState::Completed;
        info!(
            final_state = current.as_str(),
            iterations,
            elapsed_ms = started.elapsed().as_millis() as u64,
            success,
            "workflow finished"
        );

        let states_visited = {
            let mut names = path.iter().map(|s| s.as_str()).collect::<Vec<_>>();
            names.sort_unstable();
            names.dedup();
            names.len()
        };

        WorkflowResult {
            final_state: current,
            data,
            metadata: WorkflowMetadata {
                iterations,
                states_visited,
                error,
            },
            execution_path: path,
            quality,
            decisions,
            total_time_ms: started.elapsed().as_millis() as u64,
            success,
        }
    }

    /// State-specific quality assessment over the handler's payload;
    /// untouched dimensions carry over from the previous snapshot.
    fn assess_quality(
        state: ResearchState,
        result: &AgentResult,
        prev: &QualitySnapshot,
    ) -> QualitySnapshot {
        let mut quality = prev.clone();
        match state {
            ResearchState::Planning => {
                let complexity = result
                    .payload
                    .get("plan")
                    .and_then(|plan| plan.pointer("/analysis/complexity"))
                    .and_then(Value::as_f64)
                    .unwrap_or(0.5);
                quality.confidence = (1.0 - 0.5 * complexity).clamp(0.0, 1.0);
            }
            ResearchState::Searching => {
                quality.source_count = result
                    .payload
                    .get("search.sources")
                    .and_then(Value::as_array)
                    .map(Vec::len)
                    .unwrap_or(0);
                quality.confidence = result
                    .payload
                    .get("search.stats")
                    .and_then(|stats| stats.pointer("/mean_relevance"))
                    .and_then(Value::as_f64)
                    .unwrap_or(0.0);
            }
            ResearchState::Analyzing => {
                quality.confidence = result
                    .payload
                    .get("analysis.confidence")
                    .and_then(Value::as_f64)
                    .unwrap_or(0.0);
                quality.information_density = result
                    .payload
                    .get("analysis.quality")
                    .and_then(|metrics| metrics.pointer("/information_density"))
                    .and_then(Value::as_f64)
                    .unwrap_or(0.0);
            }
            ResearchState::Validating => {
                quality.confidence = result
                    .payload
                    .get("validation.report")
                    .and_then(|report| report.pointer("/overall_confidence"))
                    .and_then(Value::as_f64)
                    .unwrap_or(quality.confidence);
                quality.contradiction_level = result
                    .payload
                    .get("validation.contradiction_level")
                    .and_then(Value::as_f64)
                    .unwrap_or(0.0);
            }
            _ => {}
        }
        quality
    }

    /// Default transition table. Quality shortfalls are not errors; they
    /// route back to earlier states.
    fn next_state(
        state: ResearchState,
        quality: &QualitySnapshot,
        cfg: &StateMachineConfig,
    ) -> (ResearchState, &'static str) {
        match state {
            ResearchState::Initializing => (ResearchState::Planning, "initialized"),
            ResearchState::Planning => (ResearchState::Searching, "plan_ready"),
            ResearchState::Searching => {
                if quality.source_count < cfg.min_sources {
                    (ResearchState::Searching, "insufficient_sources")
                } else if quality.confidence < cfg.min_confidence {
                    (ResearchState::Searching, "low_confidence")
                } else {
                    (ResearchState::Analyzing, "sources_sufficient")
                }
            }
            ResearchState::Analyzing => {
                if quality.confidence < cfg.min_confidence {
                    (ResearchState::Searching, "analysis_quality_insufficient")
                } else {
                    (ResearchState::Validating, "analysis_accepted")
                }
            }
            ResearchState::Validating => {
                if quality.contradiction_level > 0.3 {
                    (ResearchState::Analyzing, "high_contradictions")
                } else if quality.confidence < cfg.min_confidence {
                    (ResearchState::Searching, "validation_confidence_low")
                } else {
                    (ResearchState::Synthesizing, "validation_passed")
                }
            }
            ResearchState::Synthesizing => (ResearchState::Completed, "synthesis_complete"),
            terminal => (terminal, "terminal"),
        }
    }

    /// Global completion predicate: a non-trivial synthesized answer plus
    /// sufficient confidence short-circuits straight to Completed.
    fn completion_met(data: &Payload, quality: &QualitySnapshot, cfg: &StateMachineConfig) -> bool {
        data.get("analysis.answer")
            .and_then(Value::as_str)
            .map(|answer| answer.len() > cfg.completion_answer_len)
            .unwrap_or(false)
            && quality.confidence >= cfg.min_confidence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Scripted handlers for exercising transitions without real agents.
    struct ScriptedHandlers {
        search_confidence: f64,
        source_count: usize,
        analysis_confidence: f64,
        answer: String,
        contradiction_level: f64,
        fail_at: Option<ResearchState>,
    }

    impl Default for ScriptedHandlers {
        fn default() -> Self {
            Self {
                search_confidence: 0.9,
                source_count: 5,
                analysis_confidence: 0.9,
                answer: "a ".repeat(80).trim().to_string(),
                contradiction_level: 0.0,
                fail_at: None,
            }
        }
    }

    #[async_trait]
    impl StateHandlers for ScriptedHandlers {
        async fn execute_state(
            &self,
            state: ResearchState,
            _query: &str,
            _data: &Payload,
            _ctx: &ResearchContext,
        ) -> AgentResult {
            if self.fail_at == Some(state) {
                return AgentResult::failed("scripted", "scripted failure");
            }

            let mut payload = Payload::new();
            match state {
                ResearchState::Searching => {
                    let sources: Vec<Value> =
                        (0..self.source_count).map(|i| json!({"id": i})).collect();
                    payload.insert("search.sources".into(), json!(sources));
                    payload.insert(
                        "search.stats".into(),
                        json!({"mean_relevance": self.search_confidence}),
                    );
                }
                ResearchState::Analyzing => {
                    payload.insert("analysis.answer".into(), json!(self.answer));
                    payload.insert("analysis.confidence".into(), json!(self.analysis_confidence));
                    payload.insert(
                        "analysis.quality".into(),
                        json!({"information_density": 12.0}),
                    );
                }
                ResearchState::Validating => {
                    payload.insert(
                        "validation.report".into(),
                        json!({"overall_confidence": self.analysis_confidence}),
                    );
                    payload.insert(
                        "validation.contradiction_level".into(),
                        json!(self.contradiction_level),
                    );
                }
                ResearchState::Synthesizing => {
                    payload.insert("final.answer".into(), json!(self.answer));
                }
                _ => {}
            }
            AgentResult::completed("scripted", payload, Payload::new(), 0.0)
        }
    }

    fn machine() -> AdaptiveStateMachine {
        AdaptiveStateMachine::new(StateMachineConfig::default())
    }

    #[tokio::test]
    async fn happy_path_short_circuits_after_analysis() {
        let handlers = ScriptedHandlers::default();
        let ctx = ResearchContext::new();

        let result = machine().run("q", Payload::new(), &handlers, &ctx).await;

        assert!(result.success);
        assert_eq!(result.final_state, ResearchState::Completed);
        assert_eq!(
            result.decisions.last().unwrap().reason,
            "completion_criteria_met"
        );
        assert!(result.execution_path.contains(&ResearchState::Analyzing));
        assert!(!result.execution_path.contains(&ResearchState::Validating));
    }

    #[tokio::test]
    async fn full_path_runs_validation_when_answer_is_short() {
        let handlers = ScriptedHandlers {
            answer: "short but confident answer".to_string(),
            ..Default::default()
        };
        let ctx = ResearchContext::new();

        let result = machine().run("q", Payload::new(), &handlers, &ctx).await;

        assert!(result.success);
        assert!(result.execution_path.contains(&ResearchState::Validating));
        assert!(result.execution_path.contains(&ResearchState::Synthesizing));
        assert_eq!(result.metadata.iterations, 5);
    }

    #[tokio::test]
    async fn insufficient_sources_backtrack_forces_stuck() {
        let handlers = ScriptedHandlers {
            source_count: 1,
            ..Default::default()
        };
        let ctx = ResearchContext::new();

        let result = machine().run("q", Payload::new(), &handlers, &ctx).await;

        assert_eq!(result.final_state, ResearchState::Stuck);
        assert!(!result.success);
        assert!(result.metadata.iterations <= 5);
        assert!(result
            .decisions
            .iter()
            .any(|d| d.reason == "insufficient_sources"));
        assert_eq!(
            result.decisions.last().unwrap().reason,
            "iteration_budget_exhausted"
        );
    }

    #[tokio::test]
    async fn handler_failure_terminates_in_failed() {
        let handlers = ScriptedHandlers {
            fail_at: Some(ResearchState::Searching),
            ..Default::default()
        };
        let ctx = ResearchContext::new();

        let result = machine().run("q", Payload::new(), &handlers, &ctx).await;

        assert_eq!(result.final_state, ResearchState::Failed);
        assert_eq!(result.metadata.error.as_deref(), Some("scripted failure"));
    }

    #[tokio::test]
    async fn high_contradictions_route_back_to_analyzing() {
        let handlers = ScriptedHandlers {
            answer: "short answer".to_string(),
            contradiction_level: 0.6,
            ..Default::default()
        };
        let ctx = ResearchContext::new();

        let result = machine().run("q", Payload::new(), &handlers, &ctx).await;

        assert!(result
            .decisions
            .iter()
            .any(|d| d.from == ResearchState::Validating
                && d.to == ResearchState::Analyzing
                && d.reason == "high_contradictions"));
    }

    #[tokio::test]
    async fn cancellation_fails_the_run() {
        let handlers = ScriptedHandlers::default();
        let ctx = ResearchContext::new();
        ctx.cancel.cancel();

        let result = machine().run("q", Payload::new(), &handlers, &ctx).await;

        assert_eq!(result.final_state, ResearchState::Failed);
        assert!(result
            .metadata
            .error
            .as_deref()
            .unwrap()
            .contains("cancelled"));
    }

    #[tokio::test]
    async fn decision_log_preserves_transition_order() {
        let handlers = ScriptedHandlers::default();
        let ctx = ResearchContext::new();

        let result = machine().run("q", Payload::new(), &handlers, &ctx).await;

        for window in result.decisions.windows(2) {
            assert_eq!(window[0].to, window[1].from, "decision chain must be contiguous");
        }
        assert_eq!(result.decisions.first().unwrap().from, ResearchState::Initializing);
    }
}
