//! Independent fact validation engine.
//!
//! Cross-references extracted facts against retrieved sources for
//! credibility, agreement, temporal consistency, and (at the exhaustive
//! level) contradictions and basic factual accuracy. Validation never
//! mutates a report after creation; retries produce a fresh report.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::heuristics::{
    contains_logical_impossibility, extract_numbers, extract_years, key_terms,
    known_factual_error, negation_near_term, tokenize,
};
use crate::plan::ValidationLevel;
use crate::source::Source;

/// Share of a fact's key terms a source must contain to count as relevant.
const RELEVANCE_THRESHOLD: f64 = 0.5;

/// Share of key terms treated as strong cross-reference agreement.
const AGREEMENT_THRESHOLD: f64 = 0.75;

/// Token window for negation proximity.
const NEGATION_WINDOW: usize = 5;

/// Content length below which an unverified source is considered
/// low-credibility.
const CREDIBLE_CONTENT_LENGTH: usize = 200;

/// Flags that force a fact to `Contradicted` regardless of its score.
const CRITICAL_FLAGS: &[&str] = &["logical_error", "scientific_error", "geographical_error"];

/// Assessment tier of one validated fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactLevel {
    High,
    Medium,
    Low,
    Uncertain,
    Contradicted,
}

/// One fact's assessment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub fact: String,
    pub confidence: f64,
    pub supporting_sources: usize,
    pub contradicting_sources: usize,
    pub level: FactLevel,
    /// Ids of the sources the fact was cross-referenced against.
    pub cross_references: Vec<String>,
    pub flags: Vec<String>,
}

/// Counts of facts per assessment tier.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LevelCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub uncertain: usize,
    pub contradicted: usize,
}

impl LevelCounts {
    fn record(&mut self, level: FactLevel) {
        match level {
            FactLevel::High => self.high += 1,
            FactLevel::Medium => self.medium += 1,
            FactLevel::Low => self.low += 1,
            FactLevel::Uncertain => self.uncertain += 1,
            FactLevel::Contradicted => self.contradicted += 1,
        }
    }
}

/// Aggregate fact-checking output for one validation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub results: Vec<ValidationResult>,
    pub overall_confidence: f64,
    pub counts: LevelCounts,
    pub recommendations: Vec<String>,
}

impl ValidationReport {
    /// Share of facts classified as contradicted, used by the state machine
    /// to decide whether analysis must be redone.
    pub fn contradiction_level(&self) -> f64 {
        if self.results.is_empty() {
            return 0.0;
        }
        self.counts.contradicted as f64 / self.results.len() as f64
    }
}

struct CheckOutcome {
    supporting: usize,
    contradicting: usize,
    flags: Vec<String>,
}

/// Configurable fact-checking engine.
pub struct FactChecker {
    level: ValidationLevel,
}

impl FactChecker {
    pub fn new(level: ValidationLevel) -> Self {
        Self { level }
    }

    pub fn level(&self) -> ValidationLevel {
        self.level
    }

    /// Validate every fact and aggregate the report.
    pub fn validate_facts(&self, facts: &[String], sources: &[Source]) -> ValidationReport {
        let results: Vec<ValidationResult> = facts
            .iter()
            .map(|fact| self.validate_fact(fact, sources))
            .collect();

        let overall_confidence = if results.is_empty() {
            0.0
        } else {
            results.iter().map(|r| r.confidence).sum::<f64>() / results.len() as f64
        };

        let mut counts = LevelCounts::default();
        for result in &results {
            counts.record(result.level);
        }

        let recommendations = Self::recommendations(&results, overall_confidence, &counts);

        debug!(
            facts = results.len(),
            overall_confidence,
            contradicted = counts.contradicted,
            "fact validation complete"
        );

        ValidationReport {
            results,
            overall_confidence,
            counts,
            recommendations,
        }
    }

    fn validate_fact(&self, fact: &str, sources: &[Source]) -> ValidationResult {
        let terms = key_terms(fact);
        let relevant: Vec<&Source> = sources
            .iter()
            .filter(|source| Self::term_coverage(&terms, source) >= RELEVANCE_THRESHOLD)
            .collect();

        if relevant.is_empty() {
            return ValidationResult {
                fact: fact.to_string(),
                confidence: 0.0,
                supporting_sources: 0,
                contradicting_sources: 0,
                level: FactLevel::Uncertain,
                cross_references: Vec::new(),
                flags: vec!["no_relevant_sources".to_string()],
            };
        }

        let mut checks: Vec<CheckOutcome> = vec![Self::check_credibility(&relevant)];
        if self.level != ValidationLevel::Basic {
            checks.push(Self::check_cross_reference(&terms, &relevant));
            checks.push(Self::check_temporal_consistency(fact, &relevant));
        }
        if self.level == ValidationLevel::Exhaustive {
            checks.push(Self::check_contradictions(&terms, &relevant));
            checks.push(Self::check_factual_accuracy(fact, &relevant));
        }

        let supporting: usize = checks.iter().map(|c| c.supporting).sum();
        let contradicting: usize = checks.iter().map(|c| c.contradicting).sum();
        let mut flags: Vec<String> = checks.into_iter().flat_map(|c| c.flags).collect();
        flags.dedup();

        let possible = (relevant.len() * self.check_count()) as f64;
        let confidence = (supporting as f64 / possible
            - 0.5 * contradicting as f64 / possible)
            .clamp(0.0, 1.0);

        let critical = flags.iter().any(|f| CRITICAL_FLAGS.contains(&f.as_str()));
        let level = if critical {
            FactLevel::Contradicted
        } else if confidence >= 0.8 {
            FactLevel::High
        } else if confidence >= 0.6 {
            FactLevel::Medium
        } else if confidence >= 0.3 {
            FactLevel::Low
        } else {
            FactLevel::Uncertain
        };

        ValidationResult {
            fact: fact.to_string(),
            confidence,
            supporting_sources: supporting,
            contradicting_sources: contradicting,
            level,
            cross_references: relevant.iter().map(|s| s.id.clone()).collect(),
            flags,
        }
    }

    fn check_count(&self) -> usize {
        match self.level {
            ValidationLevel::Basic => 1,
            ValidationLevel::Comprehensive => 3,
            ValidationLevel::Exhaustive => 5,
        }
    }

    fn term_coverage(terms: &[String], source: &Source) -> f64 {
        if terms.is_empty() {
            return 0.0;
        }
        let haystack = format!("{} {}", source.title, source.content).to_lowercase();
        let matched = terms.iter().filter(|t| haystack.contains(t.as_str())).count();
        matched as f64 / terms.len() as f64
    }

    /// Verified sources support; short unverified ones count against.
    fn check_credibility(relevant: &[&Source]) -> CheckOutcome {
        let mut outcome = CheckOutcome {
            supporting: 0,
            contradicting: 0,
            flags: Vec::new(),
        };
        for source in relevant {
            if source.verified {
                outcome.supporting += 1;
            } else if source.content.len() < CREDIBLE_CONTENT_LENGTH {
                outcome.contradicting += 1;
                if !outcome.flags.iter().any(|f| f == "low_credibility_source") {
                    outcome.flags.push("low_credibility_source".to_string());
                }
            }
        }
        outcome
    }

    /// Strong agreement when a source covers most of the fact's terms.
    fn check_cross_reference(terms: &[String], relevant: &[&Source]) -> CheckOutcome {
        let supporting = relevant
            .iter()
            .filter(|source| Self::term_coverage(terms, source) >= AGREEMENT_THRESHOLD)
            .count();
        CheckOutcome {
            supporting,
            contradicting: 0,
            flags: Vec::new(),
        }
    }

    /// Facts without dates are vacuously consistent; dated facts must find
    /// their years in the dated sources.
    fn check_temporal_consistency(fact: &str, relevant: &[&Source]) -> CheckOutcome {
        let fact_years = extract_years(fact);
        let mut outcome = CheckOutcome {
            supporting: 0,
            contradicting: 0,
            flags: Vec::new(),
        };

        if fact_years.is_empty() {
            outcome.supporting = relevant.len();
            return outcome;
        }

        for source in relevant {
            let source_years = extract_years(&source.content);
            if source_years.is_empty() {
                continue;
            }
            if fact_years.iter().any(|y| source_years.contains(y)) {
                outcome.supporting += 1;
            } else {
                outcome.contradicting += 1;
                if !outcome.flags.iter().any(|f| f == "temporal_inconsistency") {
                    outcome.flags.push("temporal_inconsistency".to_string());
                }
            }
        }
        outcome
    }

    /// Negation words near shared key terms signal disagreement.
    fn check_contradictions(terms: &[String], relevant: &[&Source]) -> CheckOutcome {
        let mut outcome = CheckOutcome {
            supporting: 0,
            contradicting: 0,
            flags: Vec::new(),
        };
        for source in relevant {
            let tokens = tokenize(&source.content);
            let negated = terms
                .iter()
                .any(|term| negation_near_term(&tokens, term, NEGATION_WINDOW));
            if negated {
                outcome.contradicting += 1;
                if !outcome.flags.iter().any(|f| f == "contradictions_detected") {
                    outcome.flags.push("contradictions_detected".to_string());
                }
            } else {
                outcome.supporting += 1;
            }
        }
        outcome
    }

    /// Numeric matching plus the impossibility and known-error tables.
    fn check_factual_accuracy(fact: &str, relevant: &[&Source]) -> CheckOutcome {
        let lowercase = fact.to_lowercase();
        let mut outcome = CheckOutcome {
            supporting: 0,
            contradicting: 0,
            flags: Vec::new(),
        };

        if let Some(category) = known_factual_error(&lowercase) {
            outcome.contradicting += relevant.len();
            outcome.flags.push(category.flag().to_string());
            return outcome;
        }

        if contains_logical_impossibility(&lowercase) {
            outcome.contradicting += relevant.len();
            outcome.flags.push("logical_error".to_string());
            return outcome;
        }

        let fact_numbers = extract_numbers(fact);
        if fact_numbers.is_empty() {
            outcome.supporting = relevant.len();
            return outcome;
        }

        for source in relevant {
            let source_numbers = extract_numbers(&source.content);
            if source_numbers.is_empty() {
                continue;
            }
            if fact_numbers.iter().any(|n| source_numbers.contains(n)) {
                outcome.supporting += 1;
            } else {
                outcome.contradicting += 1;
                if !outcome.flags.iter().any(|f| f == "numeric_mismatch") {
                    outcome.flags.push("numeric_mismatch".to_string());
                }
            }
        }
        outcome
    }

    fn recommendations(
        results: &[ValidationResult],
        overall_confidence: f64,
        counts: &LevelCounts,
    ) -> Vec<String> {
        let mut recommendations = Vec::new();
        if results.is_empty() {
            return recommendations;
        }

        let uncertain_ratio = counts.uncertain as f64 / results.len() as f64;

        if overall_confidence < 0.5 {
            recommendations.push(
                "Overall validation confidence is low; broaden the search or add verified sources."
                    .to_string(),
            );
        }
        if uncertain_ratio > 0.3 {
            recommendations.push(
                "A large share of facts lack corroborating sources; additional retrieval is recommended."
                    .to_string(),
            );
        }
        if counts.contradicted > 0 {
            recommendations
                .push("Contradicted facts detected; review flagged claims before use.".to_string());
        }

        recommendations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verified_source(id: &str, content: &str) -> Source {
        Source::new(id, id.to_string(), content.to_string()).with_verified(true)
    }

    #[test]
    fn fact_without_relevant_sources_is_uncertain_at_zero() {
        let checker = FactChecker::new(ValidationLevel::Comprehensive);
        let sources = vec![verified_source("a", "completely unrelated content about gardening")];

        let report = checker.validate_facts(&["quantum entanglement enables teleportation".into()], &sources);

        let result = &report.results[0];
        assert_eq!(result.level, FactLevel::Uncertain);
        assert_eq!(result.confidence, 0.0);
        assert!(result.flags.contains(&"no_relevant_sources".to_string()));
    }

    #[test]
    fn well_supported_fact_scores_high() {
        let checker = FactChecker::new(ValidationLevel::Comprehensive);
        let content = "Machine learning systems learn patterns from training data and generalize \
                       to unseen examples with measurable accuracy across many domains.";
        let sources = vec![
            verified_source("a", content),
            verified_source("b", content),
        ];

        let report = checker.validate_facts(
            &["machine learning systems learn patterns from training data".into()],
            &sources,
        );

        let result = &report.results[0];
        assert!(result.confidence >= 0.8, "confidence {}", result.confidence);
        assert_eq!(result.level, FactLevel::High);
    }

    #[test]
    fn known_factual_error_is_always_contradicted() {
        let checker = FactChecker::new(ValidationLevel::Exhaustive);
        // Sources that repeat the myth still should not rescue it.
        let content = "Many people claim the Great Wall of China is visible from space with the \
                       naked eye, and the claim appears in countless travel brochures worldwide.";
        let sources = vec![
            verified_source("a", content),
            verified_source("b", content),
            verified_source("c", content),
        ];

        let report = checker.validate_facts(
            &["The Great Wall of China is visible from space".into()],
            &sources,
        );

        assert_eq!(report.results[0].level, FactLevel::Contradicted);
        assert!(report.results[0]
            .flags
            .contains(&"scientific_error".to_string()));
        assert!(report.contradiction_level() > 0.9);
        assert!(!report.recommendations.is_empty());
    }

    #[test]
    fn temporal_mismatch_is_flagged() {
        let checker = FactChecker::new(ValidationLevel::Comprehensive);
        let sources = vec![verified_source(
            "a",
            "The framework was first released in 2015 and rewritten for stability in 2018, \
             according to the maintainers' published changelog archive.",
        )];

        let report = checker.validate_facts(&["the framework was released in 1999".into()], &sources);

        assert!(report.results[0]
            .flags
            .contains(&"temporal_inconsistency".to_string()));
    }

    #[test]
    fn low_confidence_report_carries_recommendations() {
        let checker = FactChecker::new(ValidationLevel::Basic);
        let sources = vec![Source::new("a", "short", "tiny unverified snippet about learning rates")];

        let report = checker.validate_facts(
            &["learning rates control gradient descent step size".into()],
            &sources,
        );

        assert!(report.overall_confidence < 0.5);
        assert!(!report.recommendations.is_empty());
    }

    #[test]
    fn basic_level_runs_only_credibility() {
        let checker = FactChecker::new(ValidationLevel::Basic);
        assert_eq!(checker.check_count(), 1);
        let comprehensive = FactChecker::new(ValidationLevel::Comprehensive);
        assert_eq!(comprehensive.check_count(), 3);
    }
}
