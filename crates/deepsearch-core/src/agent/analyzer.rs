//! Analyzer agent: source validation, key-information extraction,
//! cross-validation, and persona-styled synthesis.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, instrument};

use crate::agent::{AgentInput, AgentLogic, AgentOutcome, Payload};
use crate::error::AgentError;
use crate::heuristics::split_sentences;
use crate::plan::Persona;
use crate::source::Source;

/// Credit rate per source analyzed; deliberately higher than the searcher's
/// per-source rate.
const CREDITS_PER_SOURCE: f64 = 1.0;

/// Sources with less content than this are dropped before extraction.
const MIN_CONTENT_LENGTH: usize = 50;

/// Sentence length band accepted as a candidate point.
const SENTENCE_MIN: usize = 20;
const SENTENCE_MAX: usize = 200;

const MAX_MAIN_POINTS: usize = 10;
const MAX_SUPPORTING_FACTS: usize = 10;

/// Main-point count at which consensus saturates.
const CONSENSUS_SATURATION: f64 = 5.0;

/// Quality metrics computed over one analysis pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub source_count: usize,
    pub avg_source_length: f64,
    pub verified_sources: usize,
    pub answer_length: usize,
    pub consensus_level: f64,
    pub reliability_score: f64,
    pub information_density: f64,
}

#[derive(Default)]
pub struct AnalyzerAgent;

impl AnalyzerAgent {
    pub fn new() -> Self {
        Self
    }

    /// Lenient validation pass: only clearly unusable sources are dropped.
    fn validate_sources(sources: Vec<Source>) -> Vec<Source> {
        sources
            .into_iter()
            .filter(|s| s.content.trim().len() >= MIN_CONTENT_LENGTH)
            .collect()
    }

    /// Sentences within the sane length band become main points, the next
    /// band members become supporting facts.
    fn extract_key_information(sources: &[Source]) -> (Vec<String>, Vec<String>) {
        let combined = sources
            .iter()
            .map(|s| format!("{}. {}", s.title, s.content))
            .collect::<Vec<_>>()
            .join(" ");

        let candidates: Vec<String> = split_sentences(&combined)
            .into_iter()
            .filter(|s| (SENTENCE_MIN..=SENTENCE_MAX).contains(&s.len()))
            .collect();

        let main_points: Vec<String> = candidates.iter().take(MAX_MAIN_POINTS).cloned().collect();
        let supporting_facts: Vec<String> = candidates
            .iter()
            .skip(MAX_MAIN_POINTS)
            .take(MAX_SUPPORTING_FACTS)
            .cloned()
            .collect();

        (main_points, supporting_facts)
    }

    /// Cheap consensus proxy: proportional to the number of main points.
    fn cross_validate(main_points: &[String]) -> (f64, f64) {
        let consensus = (main_points.len() as f64 / CONSENSUS_SATURATION).min(1.0);
        let reliability = consensus * 0.8;
        (consensus, reliability)
    }

    fn synthesize(
        persona: Persona,
        query: &str,
        main_points: &[String],
        supporting_facts: &[String],
    ) -> String {
        Self::synthesize_styled(persona, query, main_points, supporting_facts)
            .unwrap_or_else(|| Self::synthesize_fallback(query, main_points, supporting_facts))
    }

    /// Persona-styled framing of the same underlying points. Returns `None`
    /// when the style has nothing to work with so the fallback can take over.
    fn synthesize_styled(
        persona: Persona,
        query: &str,
        main_points: &[String],
        supporting_facts: &[String],
    ) -> Option<String> {
        if main_points.is_empty() {
            return None;
        }

        let text = match persona {
            Persona::Default => {
                let mut out = format!("Research findings for \"{query}\":\n\n");
                out.push_str(&main_points.join(". "));
                out.push('.');
                if !supporting_facts.is_empty() {
                    out.push_str("\n\nSupporting context: ");
                    out.push_str(&supporting_facts.join(". "));
                    out.push('.');
                }
                out
            }
            Persona::Explainer => {
                let mut out = format!("Let's break down \"{query}\" step by step.\n\n");
                for (idx, point) in main_points.iter().enumerate() {
                    out.push_str(&format!("{}. {point}.\n", idx + 1));
                }
                if !supporting_facts.is_empty() {
                    out.push_str("\nA few extra things worth knowing: ");
                    out.push_str(&supporting_facts.join(". "));
                    out.push('.');
                }
                out
            }
            Persona::Technical => {
                let mut out = format!("## {query}\n\n### Findings\n");
                for point in main_points {
                    out.push_str(&format!("- {point}\n"));
                }
                if !supporting_facts.is_empty() {
                    out.push_str("\n### Supporting evidence\n");
                    for fact in supporting_facts {
                        out.push_str(&format!("- {fact}\n"));
                    }
                }
                out
            }
            Persona::Creative => {
                let mut out = format!("The story behind \"{query}\" unfolds in layers. ");
                out.push_str(&main_points.join(", and "));
                out.push('.');
                if !supporting_facts.is_empty() {
                    out.push_str(" Beneath the surface, ");
                    out.push_str(&supporting_facts.join("; "));
                    out.push('.');
                }
                out
            }
        };

        Some(text)
    }

    /// Plain concatenation synthesis, always available.
    fn synthesize_fallback(query: &str, main_points: &[String], supporting_facts: &[String]) -> String {
        let mut parts = vec![format!("Summary for \"{query}\".")];
        parts.extend(main_points.iter().cloned());
        parts.extend(supporting_facts.iter().cloned());
        parts.join(" ")
    }

    /// Weighted confidence: base 0.5, source-count factor up to 0.3
    /// (saturating at 5 sources), consensus factor up to 0.4, answer-length
    /// factor up to 0.3 (saturating near 100 words); clamped to [0, 1].
    fn confidence_score(source_count: usize, consensus: f64, answer_words: usize) -> f64 {
        let source_factor = (source_count as f64 / 5.0).min(1.0) * 0.3;
        let consensus_factor = consensus * 0.4;
        let length_factor = (answer_words as f64 / 100.0).min(1.0) * 0.3;
        (0.5 + source_factor + consensus_factor + length_factor).clamp(0.0, 1.0)
    }
}

#[async_trait]
impl AgentLogic for AnalyzerAgent {
    fn name(&self) -> &'static str {
        "analyzer"
    }

    #[instrument(name = "agent.analyzer", skip(self, input))]
    async fn perform(&self, input: &AgentInput<'_>) -> Result<AgentOutcome, AgentError> {
        let sources: Vec<Source> = input
            .data
            .get("search.sources")
            .and_then(|value| serde_json::from_value(value.clone()).ok())
            .unwrap_or_default();

        if sources.is_empty() {
            return Err(AgentError::EmptyInput(
                "No sources provided for analysis".into(),
            ));
        }

        let analyzed_count = sources.len();
        let verified_sources = sources.iter().filter(|s| s.verified).count();
        let avg_source_length = sources.iter().map(|s| s.content.len()).sum::<usize>() as f64
            / analyzed_count as f64;

        let validated = Self::validate_sources(sources);
        let (main_points, supporting_facts) = Self::extract_key_information(&validated);
        let (consensus_level, reliability_score) = Self::cross_validate(&main_points);

        let persona = Persona::from_name(&input.ctx.persona);
        let answer = Self::synthesize(persona, input.query, &main_points, &supporting_facts);
        let answer_words = answer.split_whitespace().count();

        let confidence = Self::confidence_score(validated.len(), consensus_level, answer_words);

        let metrics = QualityMetrics {
            source_count: validated.len(),
            avg_source_length,
            verified_sources,
            answer_length: answer_words,
            consensus_level,
            reliability_score,
            information_density: answer_words as f64 / validated.len().max(1) as f64,
        };

        debug!(
            validated = validated.len(),
            main_points = main_points.len(),
            confidence,
            persona = persona.as_str(),
            "analysis complete"
        );

        let mut payload = Payload::new();
        payload.insert("analysis.answer".into(), json!(answer));
        payload.insert("analysis.main_points".into(), json!(main_points));
        payload.insert("analysis.supporting_facts".into(), json!(supporting_facts));
        payload.insert("analysis.confidence".into(), json!(confidence));
        payload.insert(
            "analysis.quality".into(),
            serde_json::to_value(&metrics).unwrap_or_default(),
        );

        let mut metadata = Payload::new();
        metadata.insert("persona".into(), json!(persona.as_str()));
        metadata.insert("dropped_sources".into(), json!(analyzed_count - validated.len()));

        Ok(AgentOutcome {
            credits: analyzed_count as f64 * CREDITS_PER_SOURCE,
            payload,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ResearchContext;

    fn sources_fixture() -> Vec<Source> {
        vec![
            Source::new(
                "s1",
                "Machine learning",
                "Machine learning is a field of study that gives computers the ability to learn \
                 from data without being explicitly programmed. Models improve with experience. \
                 Training requires representative datasets and careful evaluation.",
            )
            .with_verified(true),
            Source::new(
                "s2",
                "Neural networks",
                "Neural networks are layered models inspired by biological neurons. They power \
                 modern image recognition and language systems. Deep architectures need large \
                 amounts of training data.",
            ),
            Source::new("s3", "Too short", "tiny"),
        ]
    }

    fn data_with_sources(sources: &[Source]) -> Payload {
        let mut data = Payload::new();
        data.insert(
            "search.sources".into(),
            serde_json::to_value(sources).unwrap(),
        );
        data
    }

    #[tokio::test]
    async fn empty_source_list_is_a_hard_failure() {
        let analyzer = AnalyzerAgent::new();
        let ctx = ResearchContext::new();
        let data = data_with_sources(&[]);
        let input = AgentInput {
            query: "anything",
            data: &data,
            ctx: &ctx,
        };

        let err = analyzer.perform(&input).await.unwrap_err();
        assert!(err.to_string().contains("No sources provided"));
        assert!(err.is_input_error());
    }

    #[tokio::test]
    async fn confidence_stays_within_unit_interval() {
        let analyzer = AnalyzerAgent::new();
        let ctx = ResearchContext::new();
        let sources = sources_fixture();
        let data = data_with_sources(&sources);
        let input = AgentInput {
            query: "What is machine learning?",
            data: &data,
            ctx: &ctx,
        };

        let outcome = analyzer.perform(&input).await.expect("analysis");
        let confidence = outcome
            .payload
            .get("analysis.confidence")
            .and_then(|v| v.as_f64())
            .unwrap();
        assert!((0.0..=1.0).contains(&confidence));
        assert!(confidence > 0.5, "confidence should exceed the base: {confidence}");
    }

    #[tokio::test]
    async fn short_sources_are_dropped_before_extraction() {
        let analyzer = AnalyzerAgent::new();
        let ctx = ResearchContext::new();
        let sources = sources_fixture();
        let data = data_with_sources(&sources);
        let input = AgentInput {
            query: "machine learning",
            data: &data,
            ctx: &ctx,
        };

        let outcome = analyzer.perform(&input).await.expect("analysis");
        let metrics: QualityMetrics =
            serde_json::from_value(outcome.payload.get("analysis.quality").cloned().unwrap())
                .unwrap();
        assert_eq!(metrics.source_count, 2);
        // credits are charged on the submitted set, not the validated one
        assert!((outcome.credits - 3.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn synthesis_is_deterministic_for_identical_input() {
        let analyzer = AnalyzerAgent::new();
        let ctx = ResearchContext::new().with_persona("explainer");
        let sources = sources_fixture();
        let data = data_with_sources(&sources);
        let input = AgentInput {
            query: "What is machine learning?",
            data: &data,
            ctx: &ctx,
        };

        let first = analyzer.perform(&input).await.expect("first run");
        let second = analyzer.perform(&input).await.expect("second run");

        assert_eq!(
            first.payload.get("analysis.answer"),
            second.payload.get("analysis.answer")
        );
        assert_eq!(
            first.payload.get("analysis.confidence"),
            second.payload.get("analysis.confidence")
        );
    }

    #[test]
    fn persona_styles_share_underlying_points() {
        let main_points = vec!["Machine learning systems learn from data".to_string()];
        let facts = vec!["Training needs representative datasets".to_string()];

        for persona in [
            Persona::Default,
            Persona::Explainer,
            Persona::Technical,
            Persona::Creative,
        ] {
            let text = AnalyzerAgent::synthesize(persona, "ml", &main_points, &facts);
            assert!(text.contains("Machine learning systems learn from data"));
        }
    }

    #[test]
    fn fallback_synthesis_handles_empty_points() {
        let text = AnalyzerAgent::synthesize(Persona::Technical, "empty query", &[], &[]);
        assert!(text.contains("empty query"));
    }
}
