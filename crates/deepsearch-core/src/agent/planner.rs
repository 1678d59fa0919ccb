//! Planner agent: turns a raw query into a structured research plan.

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, instrument};

use crate::agent::{AgentInput, AgentLogic, AgentOutcome, Payload};
use crate::error::AgentError;
use crate::heuristics::{
    contains_analytical_language, contains_comparative_language, contains_enumerative_language,
    contains_explanatory_language, contains_interrogative, technical_term_count, tokenize,
};
use crate::plan::{
    ComplexityFactors, Depth, Persona, QueryAnalysis, QueryType, ResearchApproach, ResearchPlan,
};

/// Planning is cheap relative to search and analysis.
const PLANNING_CREDITS: f64 = 1.0;

/// Token count at which the length factor saturates.
const LENGTH_SATURATION: f64 = 20.0;

/// Technical-term matches at which the density factor saturates.
const TECHNICAL_SATURATION: f64 = 3.0;

#[derive(Default)]
pub struct PlannerAgent;

impl PlannerAgent {
    pub fn new() -> Self {
        Self
    }

    fn analyze_query(query: &str) -> QueryAnalysis {
        let lowercase = query.to_lowercase();
        let tokens = tokenize(query);
        let word_count = tokens.len();

        let technical_matches = technical_term_count(&tokens);
        let factors = ComplexityFactors {
            length: (word_count as f64 / LENGTH_SATURATION).min(1.0),
            interrogative: if contains_interrogative(&tokens) { 1.0 } else { 0.0 },
            technical_density: (technical_matches as f64 / TECHNICAL_SATURATION).min(1.0),
            comparative: if contains_comparative_language(&lowercase) { 1.0 } else { 0.0 },
            analytical: if contains_analytical_language(&lowercase) { 1.0 } else { 0.0 },
        };
        let complexity = factors.mean();

        QueryAnalysis {
            word_count,
            complexity,
            query_type: Self::classify(&lowercase),
            recommended_depth: Depth::from_complexity(complexity),
            factors,
        }
    }

    /// Keyword precedence: explanatory, comparative, analytical, enumerative,
    /// bare question, informational.
    fn classify(lowercase: &str) -> QueryType {
        if contains_explanatory_language(lowercase) || lowercase.starts_with("what is") {
            QueryType::Explanatory
        } else if contains_comparative_language(lowercase) {
            QueryType::Comparative
        } else if contains_analytical_language(lowercase) {
            QueryType::Analytical
        } else if contains_enumerative_language(lowercase) {
            QueryType::Enumerative
        } else if lowercase.contains('?') {
            QueryType::Question
        } else {
            QueryType::Informational
        }
    }

    fn expand_queries(query: &str, analysis: &QueryAnalysis) -> Vec<String> {
        let mut queries = vec![query.to_string()];

        match analysis.query_type {
            QueryType::Explanatory => {
                queries.push(format!("{query} tutorial"));
                queries.push(format!("how to {query}"));
            }
            QueryType::Comparative => {
                if let Some((left, right)) = Self::split_comparative(query) {
                    queries.push(format!("{left} overview"));
                    queries.push(format!("{right} overview"));
                }
            }
            QueryType::Analytical => {
                queries.push(format!("{query} analysis"));
                queries.push(format!("{query} case study"));
            }
            _ => {}
        }

        if analysis.factors.technical_density > 0.5 {
            queries.push(format!("{query} implementation"));
            queries.push(format!("{query} best practices"));
        }

        queries.dedup();
        queries.truncate(8);
        queries
    }

    /// Split "X vs Y"-shaped queries into their components.
    fn split_comparative(query: &str) -> Option<(String, String)> {
        let lowercase = query.to_lowercase();
        for separator in [" versus ", " vs ", " compared to "] {
            if let Some(pos) = lowercase.find(separator) {
                let left = query[..pos].trim();
                let right = query[pos + separator.len()..].trim();
                if !left.is_empty() && !right.is_empty() {
                    return Some((left.to_string(), right.to_string()));
                }
            }
        }
        None
    }

    pub fn build_plan(query: &str, persona_name: &str, requested_depth: Option<Depth>) -> ResearchPlan {
        let analysis = Self::analyze_query(query);
        let depth = requested_depth.unwrap_or(analysis.recommended_depth);
        let approach = ResearchApproach::for_depth(depth, analysis.complexity);
        let search_queries = Self::expand_queries(query, &analysis);
        let persona = Persona::from_name(persona_name);

        ResearchPlan {
            query: query.to_string(),
            search_queries,
            phases: vec![
                "planning".to_string(),
                "searching".to_string(),
                "analyzing".to_string(),
                "validating".to_string(),
                "synthesizing".to_string(),
            ],
            persona_guidance: persona.guidance(),
            persona,
            analysis,
            approach,
        }
    }
}

#[async_trait]
impl AgentLogic for PlannerAgent {
    fn name(&self) -> &'static str {
        "planner"
    }

    #[instrument(name = "agent.planner", skip(self, input))]
    async fn perform(&self, input: &AgentInput<'_>) -> Result<AgentOutcome, AgentError> {
        let plan = Self::build_plan(input.query, &input.ctx.persona, input.ctx.depth);

        debug!(
            complexity = plan.analysis.complexity,
            query_type = plan.analysis.query_type.as_str(),
            expanded_queries = plan.search_queries.len(),
            "planner produced research plan"
        );

        let mut payload = Payload::new();
        payload.insert("plan".into(), serde_json::to_value(&plan).unwrap_or_default());

        let mut metadata = Payload::new();
        metadata.insert("complexity".into(), json!(plan.analysis.complexity));
        metadata.insert("query_type".into(), json!(plan.analysis.query_type.as_str()));

        Ok(AgentOutcome {
            payload,
            metadata,
            credits: PLANNING_CREDITS,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ResearchContext;

    #[test]
    fn complexity_stays_within_unit_interval() {
        for query in [
            "",
            "cats",
            "What is machine learning?",
            "Compare distributed database architecture versus monolithic database design \
             for high throughput machine learning workloads and analyze the latency impact of each",
        ] {
            let analysis = PlannerAgent::analyze_query(query);
            assert!(
                (0.0..=1.0).contains(&analysis.complexity),
                "complexity out of range for {query:?}: {}",
                analysis.complexity
            );
        }
    }

    #[test]
    fn classification_follows_precedence() {
        assert_eq!(
            PlannerAgent::analyze_query("How to deploy a server").query_type,
            QueryType::Explanatory
        );
        assert_eq!(
            PlannerAgent::analyze_query("Postgres vs MySQL").query_type,
            QueryType::Comparative
        );
        assert_eq!(
            PlannerAgent::analyze_query("Assess the impact of remote work").query_type,
            QueryType::Analytical
        );
        assert_eq!(
            PlannerAgent::analyze_query("types of renewable energy").query_type,
            QueryType::Enumerative
        );
        assert_eq!(
            PlannerAgent::analyze_query("is the sky blue?").query_type,
            QueryType::Question
        );
        assert_eq!(
            PlannerAgent::analyze_query("the history of rome").query_type,
            QueryType::Informational
        );
    }

    #[test]
    fn expansion_always_includes_original_and_caps_at_eight() {
        let plan = PlannerAgent::build_plan(
            "Compare kubernetes architecture versus serverless deployment for machine learning",
            "default",
            None,
        );
        assert_eq!(plan.search_queries[0], plan.query);
        assert!(plan.search_queries.len() <= 8);
    }

    #[test]
    fn comparative_queries_split_into_components() {
        let queries = PlannerAgent::expand_queries(
            "Postgres vs MySQL",
            &PlannerAgent::analyze_query("Postgres vs MySQL"),
        );
        assert!(queries.contains(&"Postgres overview".to_string()));
        assert!(queries.contains(&"MySQL overview".to_string()));
    }

    #[tokio::test]
    async fn planner_payload_carries_full_plan() {
        let planner = PlannerAgent::new();
        let ctx = ResearchContext::new().with_persona("technical");
        let data = Payload::new();
        let input = AgentInput {
            query: "What is machine learning?",
            data: &data,
            ctx: &ctx,
        };

        let outcome = planner.perform(&input).await.expect("plan");
        let plan: ResearchPlan =
            serde_json::from_value(outcome.payload.get("plan").cloned().unwrap()).unwrap();

        assert_eq!(plan.persona, Persona::Technical);
        assert_eq!(plan.query, "What is machine learning?");
        assert!((outcome.credits - PLANNING_CREDITS).abs() < f64::EPSILON);
    }
}
