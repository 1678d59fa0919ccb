//! Research orchestrator: owns the agent set and the state machine, drives
//! one run end-to-end, and packages the response envelope.
//!
//! The public entry point never returns an error; failure information is
//! folded into a stable envelope so callers need no separate error type.

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, instrument};

use crate::agent::{
    Agent, AgentInput, AgentResult, AgentStatusView, AnalyzerAgent, Payload, PlannerAgent,
    QualityMetrics, SearcherAgent,
};
use crate::config::EngineConfig;
use crate::context::ResearchContext;
use crate::factcheck::FactChecker;
use crate::metrics::record_run_metrics;
use crate::plan::{Depth, ResearchPlan, ValidationLevel};
use crate::source::Source;
use crate::state_machine::{
    AdaptationDecision, AdaptiveStateMachine, ResearchState, StateHandlers, StateMachineConfig,
    WorkflowResult,
};

/// Maximum citations appended during final synthesis.
const MAX_CITATIONS: usize = 5;

/// Confidence below which the final answer carries an explicit disclaimer.
const DISCLAIMER_THRESHOLD: f64 = 0.7;

/// Transition reasons that represent backtracking, for metrics.
const BACKTRACK_REASONS: &[&str] = &[
    "insufficient_sources",
    "low_confidence",
    "analysis_quality_insufficient",
    "high_contradictions",
    "validation_confidence_low",
];

/// Run metadata surfaced to presentation-layer consumers.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseMetadata {
    pub workflow_path: Vec<String>,
    pub adaptation_decisions: Vec<AdaptationDecision>,
    pub iterations: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Stable response envelope, identical in shape for success and failure.
#[derive(Debug, Clone, Serialize)]
pub struct ResearchResponse {
    pub query: String,
    pub synthesized_answer: String,
    pub sources_used: Vec<Source>,
    pub confidence_score: f64,
    pub processing_time: f64,
    pub persona_used: String,
    pub depth_used: String,
    pub metadata: ResponseMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_metrics: Option<QualityMetrics>,
    pub credits_used: f64,
}

pub struct ResearchOrchestrator {
    planner: Agent,
    searcher: Agent,
    analyzer: Agent,
    config: EngineConfig,
    machine: AdaptiveStateMachine,
}

impl ResearchOrchestrator {
    pub fn new(config: EngineConfig) -> Self {
        let machine = AdaptiveStateMachine::new(StateMachineConfig::from_engine(&config));
        Self {
            planner: Agent::new(PlannerAgent::new()),
            searcher: Agent::new(SearcherAgent::new()),
            analyzer: Agent::new(AnalyzerAgent::new()),
            config,
            machine,
        }
    }

    /// Run one research query to a terminal envelope. Never returns an
    /// error; degraded outcomes produce a failure-shaped envelope.
    #[instrument(name = "orchestrator.execute_research", skip(self, ctx))]
    pub async fn execute_research(&self, query: &str, ctx: ResearchContext) -> ResearchResponse {
        let started = Instant::now();

        let mut data = Payload::new();
        data.insert("query".into(), json!(query));

        let result = self.machine.run(query, data, self, &ctx).await;
        let elapsed_secs = started.elapsed().as_secs_f64();

        let backtracks = result
            .decisions
            .iter()
            .filter(|d| BACKTRACK_REASONS.contains(&d.reason.as_str()))
            .count();
        record_run_metrics(
            result.final_state.as_str(),
            started.elapsed().as_millis() as u64,
            backtracks,
        );

        let depth = self.effective_depth(&ctx, &result);

        info!(
            final_state = result.final_state.as_str(),
            iterations = result.metadata.iterations,
            backtracks,
            elapsed_secs,
            "research run finished"
        );

        if result.success {
            self.success_envelope(query, &ctx, depth, result, elapsed_secs)
        } else {
            self.failure_envelope(query, &ctx, depth, result, elapsed_secs)
        }
    }

    /// Operational snapshot of every owned agent, keyed by role.
    pub fn agent_status(&self) -> HashMap<String, AgentStatusView> {
        let mut status = HashMap::new();
        for agent in [&self.planner, &self.searcher, &self.analyzer] {
            status.insert(agent.name().to_string(), agent.status());
        }
        status
    }

    /// Return every owned agent to Idle.
    pub fn reset(&self) {
        self.planner.reset();
        self.searcher.reset();
        self.analyzer.reset();
    }

    /// `base(depth) + time component (capped at 10) + source component
    /// (capped at 5)`.
    fn calculate_credits(depth: Depth, processing_secs: f64, sources_count: usize) -> f64 {
        let time_component = (processing_secs / 60.0 * 2.0).min(10.0);
        let source_component = (sources_count as f64 / 5.0).min(5.0);
        depth.base_credits() + time_component + source_component
    }

    fn effective_depth(&self, ctx: &ResearchContext, result: &WorkflowResult) -> Depth {
        ctx.depth.unwrap_or_else(|| {
            result
                .data
                .get("plan")
                .and_then(|plan| serde_json::from_value::<ResearchPlan>(plan.clone()).ok())
                .map(|plan| plan.analysis.recommended_depth)
                .unwrap_or(Depth::Comprehensive)
        })
    }

    fn success_envelope(
        &self,
        query: &str,
        ctx: &ResearchContext,
        depth: Depth,
        result: WorkflowResult,
        elapsed_secs: f64,
    ) -> ResearchResponse {
        let answer = result
            .data
            .get("final.answer")
            .or_else(|| result.data.get("analysis.answer"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let sources: Vec<Source> = result
            .data
            .get("search.sources")
            .and_then(|value| serde_json::from_value(value.clone()).ok())
            .unwrap_or_default();

        let quality_metrics: Option<QualityMetrics> = result
            .data
            .get("analysis.quality")
            .and_then(|value| serde_json::from_value(value.clone()).ok());

        let credits_used = Self::calculate_credits(depth, elapsed_secs, sources.len());

        ResearchResponse {
            query: query.to_string(),
            synthesized_answer: answer,
            confidence_score: result.quality.confidence.clamp(0.0, 1.0),
            sources_used: sources,
            processing_time: elapsed_secs,
            persona_used: ctx.persona.clone(),
            depth_used: depth.as_str().to_string(),
            metadata: ResponseMetadata {
                workflow_path: result
                    .execution_path
                    .iter()
                    .map(|s| s.as_str().to_string())
                    .collect(),
                adaptation_decisions: result.decisions,
                iterations: result.metadata.iterations,
                error: None,
            },
            quality_metrics,
            credits_used,
        }
    }

    fn failure_envelope(
        &self,
        query: &str,
        ctx: &ResearchContext,
        depth: Depth,
        result: WorkflowResult,
        elapsed_secs: f64,
    ) -> ResearchResponse {
        let answer = match result.final_state {
            ResearchState::Stuck => {
                "Research could not converge on a confident answer within the allotted effort. \
                 Try narrowing the query or raising the source budget."
            }
            _ => {
                "We could not complete this research request. Please try again, or refine the \
                 query if the problem persists."
            }
        };

        ResearchResponse {
            query: query.to_string(),
            synthesized_answer: answer.to_string(),
            sources_used: Vec::new(),
            confidence_score: 0.0,
            processing_time: elapsed_secs,
            persona_used: ctx.persona.clone(),
            depth_used: depth.as_str().to_string(),
            metadata: ResponseMetadata {
                workflow_path: result
                    .execution_path
                    .iter()
                    .map(|s| s.as_str().to_string())
                    .collect(),
                adaptation_decisions: result.decisions,
                iterations: result.metadata.iterations,
                error: result.metadata.error,
            },
            quality_metrics: None,
            credits_used: 0.0,
        }
    }

    fn initializing_result(&self, query: &str, ctx: &ResearchContext) -> AgentResult {
        let mut payload = Payload::new();
        payload.insert("query".into(), json!(query));
        payload.insert("persona".into(), json!(ctx.persona));
        if let Some(depth) = ctx.depth {
            payload.insert("depth".into(), json!(depth.as_str()));
        }
        AgentResult::completed("orchestrator", payload, Payload::new(), 0.0)
    }

    /// Validating delegates to the fact checker at the plan's validation
    /// level (or the configured default).
    fn validating_result(&self, data: &Payload) -> AgentResult {
        let facts: Vec<String> = data
            .get("analysis.main_points")
            .and_then(|value| serde_json::from_value(value.clone()).ok())
            .unwrap_or_default();
        let sources: Vec<Source> = data
            .get("search.sources")
            .and_then(|value| serde_json::from_value(value.clone()).ok())
            .unwrap_or_default();

        let level = data
            .get("plan")
            .and_then(|plan| serde_json::from_value::<ResearchPlan>(plan.clone()).ok())
            .map(|plan| plan.approach.validation_level)
            .unwrap_or_else(|| ValidationLevel::parse_or_default(&self.config.factcheck.level));

        let checker = FactChecker::new(level);
        let report = checker.validate_facts(&facts, &sources);

        let mut payload = Payload::new();
        payload.insert(
            "validation.contradiction_level".into(),
            json!(report.contradiction_level()),
        );
        payload.insert(
            "validation.report".into(),
            serde_json::to_value(&report).unwrap_or_default(),
        );

        let mut metadata = Payload::new();
        metadata.insert("facts_checked".into(), json!(facts.len()));

        AgentResult::completed("fact_checker", payload, metadata, 0.0)
    }

    /// Final synthesis: append up to five citations and, under the
    /// confidence threshold, an explicit disclaimer.
    fn synthesizing_result(&self, data: &Payload) -> AgentResult {
        let mut answer = data
            .get("analysis.answer")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let confidence = data
            .get("analysis.confidence")
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        let sources: Vec<Source> = data
            .get("search.sources")
            .and_then(|value| serde_json::from_value(value.clone()).ok())
            .unwrap_or_default();

        if !sources.is_empty() {
            answer.push_str("\n\nSources:");
            for (idx, source) in sources.iter().take(MAX_CITATIONS).enumerate() {
                answer.push_str(&format!("\n{}. {}", idx + 1, source.title));
            }
        }

        if confidence < DISCLAIMER_THRESHOLD {
            answer.push_str(&format!(
                "\n\nNote: this answer was synthesized with moderate confidence ({confidence:.2}); \
                 verify the findings independently before relying on them."
            ));
        }

        let mut payload = Payload::new();
        payload.insert("final.answer".into(), json!(answer.clone()));
        payload.insert("analysis.answer".into(), json!(answer));

        AgentResult::completed("orchestrator", payload, Payload::new(), 0.0)
    }
}

#[async_trait]
impl StateHandlers for ResearchOrchestrator {
    async fn execute_state(
        &self,
        state: ResearchState,
        query: &str,
        data: &Payload,
        ctx: &ResearchContext,
    ) -> AgentResult {
        let input = AgentInput { query, data, ctx };
        match state {
            ResearchState::Initializing => self.initializing_result(query, ctx),
            ResearchState::Planning => self.planner.execute(input).await,
            ResearchState::Searching => self.searcher.execute(input).await,
            ResearchState::Analyzing => self.analyzer.execute(input).await,
            ResearchState::Validating => self.validating_result(data),
            ResearchState::Synthesizing => self.synthesizing_result(data),
            terminal => AgentResult::failed(
                "orchestrator",
                format!("no handler for terminal state {}", terminal.as_str()),
            ),
        }
    }
}
