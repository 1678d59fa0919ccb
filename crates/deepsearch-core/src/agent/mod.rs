//! Agent abstraction: uniform lifecycle, timing, credit accounting, and
//! error wrapping shared by all agents.
//!
//! Concrete behavior lives behind [`AgentLogic`]; the [`Agent`] wrapper owns
//! the monitored execution. Errors raised by agent logic never cross the
//! wrapper boundary; they are folded into a Failed or Timeout
//! [`AgentResult`].

mod analyzer;
mod planner;
mod searcher;

pub use analyzer::{AnalyzerAgent, QualityMetrics};
pub use planner::PlannerAgent;
pub use searcher::SearcherAgent;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::ResearchContext;
use crate::error::AgentError;

/// Free-form key→value map used for agent payloads and shared workflow data.
pub type Payload = HashMap<String, Value>;

/// Lifecycle of a single agent invocation. Idle is the only entry state;
/// Completed, Failed, and Timeout are terminal until `reset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Idle,
    Initializing,
    Running,
    Completed,
    Failed,
    Timeout,
}

impl AgentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentState::Idle => "idle",
            AgentState::Initializing => "initializing",
            AgentState::Running => "running",
            AgentState::Completed => "completed",
            AgentState::Failed => "failed",
            AgentState::Timeout => "timeout",
        }
    }
}

/// Result of one agent invocation.
///
/// Invariants: `success` holds exactly when `state == Completed`, and
/// `error` is populated exactly when the invocation failed. Failed and
/// timed-out invocations charge zero credits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResult {
    pub agent: String,
    pub state: AgentState,
    pub payload: Payload,
    pub metadata: Payload,
    pub execution_time_ms: u64,
    pub credits_used: f64,
    pub success: bool,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AgentResult {
    pub fn completed(agent: impl Into<String>, payload: Payload, metadata: Payload, credits: f64) -> Self {
        Self {
            agent: agent.into(),
            state: AgentState::Completed,
            payload,
            metadata,
            execution_time_ms: 0,
            credits_used: credits,
            success: true,
            error: None,
            created_at: Utc::now(),
        }
    }

    pub fn failed(agent: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            state: AgentState::Failed,
            payload: Payload::new(),
            metadata: Payload::new(),
            execution_time_ms: 0,
            credits_used: 0.0,
            success: false,
            error: Some(error.into()),
            created_at: Utc::now(),
        }
    }

    pub fn timed_out(agent: impl Into<String>, timeout: Duration) -> Self {
        Self {
            agent: agent.into(),
            state: AgentState::Timeout,
            payload: Payload::new(),
            metadata: Payload::new(),
            execution_time_ms: timeout.as_millis() as u64,
            credits_used: 0.0,
            success: false,
            error: Some(format!("agent timed out after {} ms", timeout.as_millis())),
            created_at: Utc::now(),
        }
    }
}

/// Borrowed input for one invocation: the query, the run's shared workflow
/// data, and the run context.
pub struct AgentInput<'a> {
    pub query: &'a str,
    pub data: &'a Payload,
    pub ctx: &'a ResearchContext,
}

/// What concrete agent logic hands back on success. The wrapper folds this
/// into an [`AgentResult`] with measured timing.
#[derive(Debug, Default)]
pub struct AgentOutcome {
    pub payload: Payload,
    pub metadata: Payload,
    pub credits: f64,
}

/// Concrete agent behavior. Implementations must be stateless with respect
/// to the run: all run-local data flows through the input and the returned
/// outcome.
#[async_trait]
pub trait AgentLogic: Send + Sync {
    fn name(&self) -> &'static str;

    async fn perform(&self, input: &AgentInput<'_>) -> Result<AgentOutcome, AgentError>;
}

#[derive(Debug, Clone)]
struct StatusInner {
    state: AgentState,
    last_execution: Duration,
    credits_used: f64,
}

/// Operational snapshot of an agent, for status dashboards.
#[derive(Debug, Clone, Serialize)]
pub struct AgentStatusView {
    pub state: AgentState,
    pub execution_time_ms: u64,
    pub credits_used: f64,
}

/// Monitored wrapper around agent logic.
///
/// Shared across concurrent runs via `Arc`; the status cell records the most
/// recent invocation and cumulative credits.
pub struct Agent {
    logic: Arc<dyn AgentLogic>,
    status: Mutex<StatusInner>,
}

impl Agent {
    pub fn new(logic: impl AgentLogic + 'static) -> Self {
        Self {
            logic: Arc::new(logic),
            status: Mutex::new(StatusInner {
                state: AgentState::Idle,
                last_execution: Duration::ZERO,
                credits_used: 0.0,
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.logic.name()
    }

    /// Monitored execution: Idle → Initializing → Running, then a terminal
    /// state. The measured duration and the accounted credits always
    /// overwrite whatever the agent logic reported, and any error or elapsed
    /// timeout becomes a Failed/Timeout result rather than propagating.
    pub async fn execute(&self, input: AgentInput<'_>) -> AgentResult {
        let name = self.logic.name();
        self.set_state(AgentState::Initializing);

        if input.ctx.is_cancelled() {
            self.set_state(AgentState::Failed);
            return AgentResult::failed(name, AgentError::Cancelled.to_string());
        }

        self.set_state(AgentState::Running);
        let started = Instant::now();

        let outcome = tokio::time::timeout(input.ctx.agent_timeout, self.logic.perform(&input)).await;
        let elapsed = started.elapsed();

        let mut result = match outcome {
            Ok(Ok(outcome)) => {
                tracing::debug!(
                    agent = name,
                    elapsed_ms = elapsed.as_millis() as u64,
                    credits = outcome.credits,
                    "agent completed"
                );
                AgentResult::completed(name, outcome.payload, outcome.metadata, outcome.credits)
            }
            Ok(Err(err)) => {
                tracing::warn!(agent = name, error = %err, "agent failed");
                AgentResult::failed(name, err.to_string())
            }
            Err(_) => {
                tracing::warn!(
                    agent = name,
                    timeout_ms = input.ctx.agent_timeout.as_millis() as u64,
                    "agent timed out"
                );
                AgentResult::timed_out(name, input.ctx.agent_timeout)
            }
        };

        if result.state != AgentState::Timeout {
            result.execution_time_ms = elapsed.as_millis() as u64;
        }

        let mut status = self.status.lock().expect("agent status poisoned");
        status.state = result.state;
        status.last_execution = elapsed;
        status.credits_used += result.credits_used;

        result
    }

    /// Return the agent to Idle for reuse.
    pub fn reset(&self) {
        let mut status = self.status.lock().expect("agent status poisoned");
        status.state = AgentState::Idle;
        status.last_execution = Duration::ZERO;
    }

    pub fn status(&self) -> AgentStatusView {
        let status = self.status.lock().expect("agent status poisoned");
        AgentStatusView {
            state: status.state,
            execution_time_ms: status.last_execution.as_millis() as u64,
            credits_used: status.credits_used,
        }
    }

    fn set_state(&self, state: AgentState) {
        self.status.lock().expect("agent status poisoned").state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedLogic {
        credits: f64,
    }

    #[async_trait]
    impl AgentLogic for FixedLogic {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn perform(&self, _input: &AgentInput<'_>) -> Result<AgentOutcome, AgentError> {
            let mut payload = Payload::new();
            payload.insert("answer".into(), serde_json::json!(42));
            Ok(AgentOutcome {
                payload,
                metadata: Payload::new(),
                credits: self.credits,
            })
        }
    }

    struct FailingLogic;

    #[async_trait]
    impl AgentLogic for FailingLogic {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn perform(&self, _input: &AgentInput<'_>) -> Result<AgentOutcome, AgentError> {
            Err(AgentError::MissingDependency(
                "Database connection not available".into(),
            ))
        }
    }

    struct SlowLogic;

    #[async_trait]
    impl AgentLogic for SlowLogic {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn perform(&self, _input: &AgentInput<'_>) -> Result<AgentOutcome, AgentError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(AgentOutcome::default())
        }
    }

    fn input_with<'a>(query: &'a str, data: &'a Payload, ctx: &'a ResearchContext) -> AgentInput<'a> {
        AgentInput { query, data, ctx }
    }

    #[tokio::test]
    async fn success_sets_completed_and_measured_fields() {
        let agent = Agent::new(FixedLogic { credits: 2.5 });
        let ctx = ResearchContext::new();
        let data = Payload::new();

        let result = agent.execute(input_with("q", &data, &ctx)).await;

        assert!(result.success);
        assert_eq!(result.state, AgentState::Completed);
        assert!(result.error.is_none());
        assert!((result.credits_used - 2.5).abs() < f64::EPSILON);
        assert_eq!(agent.status().state, AgentState::Completed);
    }

    #[tokio::test]
    async fn failure_is_wrapped_not_propagated() {
        let agent = Agent::new(FailingLogic);
        let ctx = ResearchContext::new();
        let data = Payload::new();

        let result = agent.execute(input_with("q", &data, &ctx)).await;

        assert!(!result.success);
        assert_eq!(result.state, AgentState::Failed);
        assert!(result.error.as_deref().unwrap().contains("Database connection"));
        assert_eq!(result.credits_used, 0.0);
    }

    #[tokio::test]
    async fn timeout_produces_timeout_state() {
        let agent = Agent::new(SlowLogic);
        let ctx = ResearchContext::new().with_agent_timeout(Duration::from_millis(50));
        let data = Payload::new();

        let result = agent.execute(input_with("q", &data, &ctx)).await;

        assert_eq!(result.state, AgentState::Timeout);
        assert!(!result.success);
        assert!(result.error.as_deref().unwrap().contains("timed out"));
        assert_eq!(result.credits_used, 0.0);
    }

    #[tokio::test]
    async fn reset_returns_agent_to_idle() {
        let agent = Agent::new(FixedLogic { credits: 1.0 });
        let ctx = ResearchContext::new();
        let data = Payload::new();

        agent.execute(input_with("q", &data, &ctx)).await;
        assert_eq!(agent.status().state, AgentState::Completed);

        agent.reset();
        assert_eq!(agent.status().state, AgentState::Idle);
        // cumulative credits survive a reset
        assert!(agent.status().credits_used > 0.0);
    }

    #[tokio::test]
    async fn cancelled_context_fails_before_running() {
        let agent = Agent::new(FixedLogic { credits: 1.0 });
        let ctx = ResearchContext::new();
        ctx.cancel.cancel();
        let data = Payload::new();

        let result = agent.execute(input_with("q", &data, &ctx)).await;
        assert!(!result.success);
        assert!(result.error.as_deref().unwrap().contains("cancelled"));
    }
}
