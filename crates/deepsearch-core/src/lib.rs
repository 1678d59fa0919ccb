//! DeepSearch research orchestration engine.
//!
//! Turns a natural-language query into a synthesized, source-grounded
//! answer through planning, retrieval, analysis, and fact validation,
//! governed by an adaptive state machine that backtracks when quality is
//! insufficient.

mod agent;
mod config;
mod context;
mod error;
mod eval;
mod factcheck;
mod heuristics;
mod logging;
mod metrics;
mod orchestrator;
mod plan;
mod retrieval;
mod source;
mod state_machine;
mod trace;

pub use agent::{
    Agent, AgentInput, AgentLogic, AgentOutcome, AgentResult, AgentState, AgentStatusView,
    AnalyzerAgent, Payload, PlannerAgent, QualityMetrics, SearcherAgent,
};
pub use config::{ConfigLoader, EngineConfig};
pub use context::ResearchContext;
pub use error::{AgentError, DeepSearchError};
pub use eval::{EvaluationHarness, EvaluationMetrics};
pub use factcheck::{FactChecker, FactLevel, LevelCounts, ValidationReport, ValidationResult};
pub use logging::{log_run_completion, RunLogInput};
pub use metrics::{init_metrics_from_env, record_run_metrics, shutdown_metrics};
pub use orchestrator::{ResearchOrchestrator, ResearchResponse, ResponseMetadata};
pub use plan::{
    ComplexityFactors, Depth, Persona, PersonaGuidance, QueryAnalysis, QueryType, ResearchApproach,
    ResearchPlan, SynthesisDepth, ValidationLevel,
};
pub use retrieval::{
    DynSearchProvider, DynStorageHandle, MemorySearchIndex, MemoryStorage, ScoredSource,
    SearchProvider, StorageHandle,
};
pub use source::{SearchMethod, Source};
pub use state_machine::{
    AdaptationDecision, AdaptiveStateMachine, QualitySnapshot, ResearchState, StateHandlers,
    StateMachineConfig, WorkflowMetadata, WorkflowResult,
};
pub use trace::DecisionTrace;
