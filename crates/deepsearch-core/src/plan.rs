//! Research plan data model: query analysis, approach tiers, and persona
//! guidance. Created once per run by the planner agent and read-only after
//! that.

use serde::{Deserialize, Serialize};

/// Coarse research-effort tier controlling resource budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Depth {
    Quick,
    Comprehensive,
    Exhaustive,
}

impl Depth {
    pub fn as_str(&self) -> &'static str {
        match self {
            Depth::Quick => "quick",
            Depth::Comprehensive => "comprehensive",
            Depth::Exhaustive => "exhaustive",
        }
    }

    /// Fixed base credit charge per tier.
    pub fn base_credits(&self) -> f64 {
        match self {
            Depth::Quick => 5.0,
            Depth::Comprehensive => 15.0,
            Depth::Exhaustive => 25.0,
        }
    }

    /// Parse a user-supplied tier, defaulting to `comprehensive`.
    pub fn parse_or_default(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "quick" => Depth::Quick,
            "exhaustive" => Depth::Exhaustive,
            _ => Depth::Comprehensive,
        }
    }

    /// Tier derived from query complexity when none was requested.
    pub fn from_complexity(complexity: f64) -> Self {
        if complexity < 0.4 {
            Depth::Quick
        } else if complexity < 0.75 {
            Depth::Comprehensive
        } else {
            Depth::Exhaustive
        }
    }
}

/// Classified intent of the originating query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    Explanatory,
    Comparative,
    Analytical,
    Enumerative,
    Question,
    Informational,
}

impl QueryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::Explanatory => "explanatory",
            QueryType::Comparative => "comparative",
            QueryType::Analytical => "analytical",
            QueryType::Enumerative => "enumerative",
            QueryType::Question => "question",
            QueryType::Informational => "informational",
        }
    }
}

/// How much fact validation a run performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationLevel {
    Basic,
    Comprehensive,
    Exhaustive,
}

impl ValidationLevel {
    pub fn parse_or_default(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "basic" => ValidationLevel::Basic,
            "exhaustive" => ValidationLevel::Exhaustive,
            _ => ValidationLevel::Comprehensive,
        }
    }
}

/// Verbosity of the synthesized answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynthesisDepth {
    Concise,
    Detailed,
    Exhaustive,
}

/// Per-factor breakdown behind the complexity score. Every factor is in
/// [0, 1] and the score is their mean.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplexityFactors {
    pub length: f64,
    pub interrogative: f64,
    pub technical_density: f64,
    pub comparative: f64,
    pub analytical: f64,
}

impl ComplexityFactors {
    pub fn mean(&self) -> f64 {
        (self.length + self.interrogative + self.technical_density + self.comparative
            + self.analytical)
            / 5.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryAnalysis {
    pub word_count: usize,
    pub complexity: f64,
    pub factors: ComplexityFactors,
    pub query_type: QueryType,
    pub recommended_depth: Depth,
}

/// Resource budget selected for the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchApproach {
    pub max_searches: usize,
    pub max_sources: usize,
    pub validation_level: ValidationLevel,
    pub synthesis_depth: SynthesisDepth,
}

pub const MAX_SEARCHES_CEILING: usize = 8;
pub const MAX_SOURCES_CEILING: usize = 30;

impl ResearchApproach {
    /// Fixed budget tuple per depth tier; complex queries get a bump capped
    /// at the global ceilings.
    pub fn for_depth(depth: Depth, complexity: f64) -> Self {
        let (max_searches, max_sources, validation_level, synthesis_depth) = match depth {
            Depth::Quick => (2, 5, ValidationLevel::Basic, SynthesisDepth::Concise),
            Depth::Comprehensive => (4, 15, ValidationLevel::Comprehensive, SynthesisDepth::Detailed),
            Depth::Exhaustive => (6, 25, ValidationLevel::Exhaustive, SynthesisDepth::Exhaustive),
        };

        let (max_searches, max_sources) = if complexity > 0.8 {
            (
                (max_searches + 2).min(MAX_SEARCHES_CEILING),
                (max_sources + 5).min(MAX_SOURCES_CEILING),
            )
        } else {
            (max_searches, max_sources)
        };

        Self {
            max_searches,
            max_sources,
            validation_level,
            synthesis_depth,
        }
    }
}

/// Named writing-style profile applied during synthesis and planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Persona {
    Default,
    Explainer,
    Technical,
    Creative,
}

impl Persona {
    /// Unknown names fall back to the default profile; this never errors.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "explainer" | "clear-explainer" | "teacher" => Persona::Explainer,
            "technical" | "engineer" | "structured" => Persona::Technical,
            "creative" | "storyteller" | "narrative" => Persona::Creative,
            _ => Persona::Default,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Persona::Default => "default",
            Persona::Explainer => "explainer",
            Persona::Technical => "technical",
            Persona::Creative => "creative",
        }
    }

    pub fn guidance(&self) -> PersonaGuidance {
        match self {
            Persona::Default => PersonaGuidance {
                style: "balanced and comprehensive".to_string(),
                instructions: vec![
                    "Present the main findings in neutral prose".to_string(),
                    "Weigh evidence evenly across sources".to_string(),
                ],
            },
            Persona::Explainer => PersonaGuidance {
                style: "clear, enthusiastic explainer".to_string(),
                instructions: vec![
                    "Open with the big picture before details".to_string(),
                    "Prefer plain language over jargon".to_string(),
                    "Use short, numbered steps where possible".to_string(),
                ],
            },
            Persona::Technical => PersonaGuidance {
                style: "precise and structured".to_string(),
                instructions: vec![
                    "Use headed sections and bullet lists".to_string(),
                    "Keep terminology exact; define it once".to_string(),
                    "Separate findings from supporting evidence".to_string(),
                ],
            },
            Persona::Creative => PersonaGuidance {
                style: "narrative and vivid".to_string(),
                instructions: vec![
                    "Frame the findings as a connected story".to_string(),
                    "Favour flowing paragraphs over lists".to_string(),
                ],
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaGuidance {
    pub style: String,
    pub instructions: Vec<String>,
}

/// Structured output of the planner agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchPlan {
    pub query: String,
    pub analysis: QueryAnalysis,
    pub approach: ResearchApproach,
    pub search_queries: Vec<String>,
    pub phases: Vec<String>,
    pub persona: Persona,
    pub persona_guidance: PersonaGuidance,
}
