//! Lightweight text heuristics shared by the planner, analyzer, and fact
//! checker.
//!
//! These are intentionally simple lexical strategies kept behind plain
//! functions so they can be upgraded (e.g. to embedding-based methods)
//! without touching the state machine or orchestrator contracts.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static SENTENCE_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]+(?:\s+|$)").expect("invalid sentence regex"));

static YEAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(1[89]\d{2}|20\d{2})\b").expect("invalid year regex"));

static NUMBER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d+(?:\.\d+)?\b").expect("invalid number regex"));

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "an", "and", "are", "as", "at", "be", "been", "but", "by", "for", "from", "had",
        "has", "have", "in", "into", "is", "it", "its", "of", "on", "or", "that", "the", "their",
        "them", "then", "there", "these", "they", "this", "to", "was", "were", "which", "while",
        "will", "with", "would",
    ]
    .into_iter()
    .collect()
});

static TECHNICAL_TERMS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "algorithm",
        "api",
        "architecture",
        "asynchronous",
        "authentication",
        "bandwidth",
        "blockchain",
        "cache",
        "compiler",
        "concurrency",
        "container",
        "cryptography",
        "database",
        "dataset",
        "deployment",
        "distributed",
        "embedding",
        "encryption",
        "framework",
        "infrastructure",
        "kernel",
        "kubernetes",
        "latency",
        "learning",
        "machine",
        "microservice",
        "model",
        "network",
        "neural",
        "optimization",
        "protocol",
        "quantum",
        "runtime",
        "scalability",
        "schema",
        "semantic",
        "serialization",
        "server",
        "throughput",
        "transformer",
    ]
    .into_iter()
    .collect()
});

static INTERROGATIVES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    ["what", "how", "why", "when", "where", "which", "who", "whom", "whose"]
        .into_iter()
        .collect()
});

static NEGATIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "not", "no", "never", "none", "cannot", "can't", "isn't", "aren't", "wasn't", "weren't",
        "doesn't", "don't", "won't", "false", "incorrect", "wrong", "myth", "debunked",
    ]
    .into_iter()
    .collect()
});

const COMPARATIVE_CUES: &[&str] = &[
    " vs ",
    " vs. ",
    "versus",
    "compare",
    "compared",
    "comparison",
    "difference between",
    "better than",
    "worse than",
    "pros and cons",
];

const ANALYTICAL_CUES: &[&str] = &[
    "analyze",
    "analysis",
    "assess",
    "evaluate",
    "impact of",
    "implications",
    "trend",
    "trade-off",
    "tradeoff",
];

const EXPLANATORY_CUES: &[&str] = &["how to", "how do", "how does", "explain", "tutorial", "guide"];

const ENUMERATIVE_CUES: &[&str] = &["list of", "list the", "examples of", "types of", "top "];

/// Phrases that are self-contradictory on their face.
const LOGICAL_IMPOSSIBILITIES: &[&str] = &[
    "always never",
    "larger than itself",
    "greater than itself",
    "before it was invented",
    "married bachelor",
    "square circle",
];

/// Category assigned to a known factual error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnownErrorCategory {
    Logical,
    Scientific,
    Geographical,
}

impl KnownErrorCategory {
    pub fn flag(&self) -> &'static str {
        match self {
            KnownErrorCategory::Logical => "logical_error",
            KnownErrorCategory::Scientific => "scientific_error",
            KnownErrorCategory::Geographical => "geographical_error",
        }
    }
}

/// Small curated table of claims that are widely repeated but false.
///
/// Matching is containment over the lowercased fact text. The table is a
/// placeholder heuristic; entries exist so contradicted claims can be caught
/// even when many retrieved sources repeat them.
const KNOWN_FACTUAL_ERRORS: &[(&str, KnownErrorCategory)] = &[
    (
        "great wall of china is visible from space",
        KnownErrorCategory::Scientific,
    ),
    (
        "humans use only 10% of their brains",
        KnownErrorCategory::Scientific,
    ),
    ("the sun orbits the earth", KnownErrorCategory::Scientific),
    (
        "lightning never strikes the same place twice",
        KnownErrorCategory::Scientific,
    ),
    (
        "sydney is the capital of australia",
        KnownErrorCategory::Geographical,
    ),
    (
        "toronto is the capital of canada",
        KnownErrorCategory::Geographical,
    ),
    (
        "rio de janeiro is the capital of brazil",
        KnownErrorCategory::Geographical,
    ),
];

/// Split free text into trimmed sentences.
pub fn split_sentences(text: &str) -> Vec<String> {
    SENTENCE_BOUNDARY
        .split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Lowercased alphanumeric tokens of the input.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .map(|t| t.trim_matches('\''))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Content-bearing terms of a fact: stop words removed, short tokens dropped,
/// first occurrence order preserved.
pub fn key_terms(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    tokenize(text)
        .into_iter()
        .filter(|t| t.len() > 3 && !STOP_WORDS.contains(t.as_str()))
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

pub fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.contains(token)
}

/// Count of technical-vocabulary matches in the token stream.
pub fn technical_term_count(tokens: &[String]) -> usize {
    tokens
        .iter()
        .filter(|t| TECHNICAL_TERMS.contains(t.as_str()))
        .count()
}

pub fn contains_interrogative(tokens: &[String]) -> bool {
    tokens.iter().any(|t| INTERROGATIVES.contains(t.as_str()))
}

pub fn contains_comparative_language(lowercase: &str) -> bool {
    COMPARATIVE_CUES.iter().any(|cue| lowercase.contains(cue))
}

pub fn contains_analytical_language(lowercase: &str) -> bool {
    ANALYTICAL_CUES.iter().any(|cue| lowercase.contains(cue))
}

pub fn contains_explanatory_language(lowercase: &str) -> bool {
    EXPLANATORY_CUES.iter().any(|cue| lowercase.contains(cue))
}

pub fn contains_enumerative_language(lowercase: &str) -> bool {
    ENUMERATIVE_CUES.iter().any(|cue| lowercase.contains(cue))
}

/// True when a negation word appears within `window` tokens of `term`.
pub fn negation_near_term(tokens: &[String], term: &str, window: usize) -> bool {
    for (idx, token) in tokens.iter().enumerate() {
        if token != term {
            continue;
        }
        let start = idx.saturating_sub(window);
        let end = (idx + window + 1).min(tokens.len());
        if tokens[start..end].iter().any(|t| NEGATIONS.contains(t.as_str())) {
            return true;
        }
    }
    false
}

/// Four-digit years mentioned in the text.
pub fn extract_years(text: &str) -> Vec<String> {
    YEAR_PATTERN
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Numeric literals mentioned in the text (years included).
pub fn extract_numbers(text: &str) -> Vec<String> {
    NUMBER_PATTERN
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

pub fn contains_logical_impossibility(lowercase: &str) -> bool {
    LOGICAL_IMPOSSIBILITIES
        .iter()
        .any(|phrase| lowercase.contains(phrase))
}

/// Look the fact up in the known-error table.
pub fn known_factual_error(lowercase: &str) -> Option<KnownErrorCategory> {
    KNOWN_FACTUAL_ERRORS
        .iter()
        .find(|(claim, _)| lowercase.contains(claim))
        .map(|(_, category)| *category)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentences_split_on_terminators() {
        let sentences = split_sentences("First point. Second point! Third? trailing");
        assert_eq!(sentences.len(), 4);
        assert_eq!(sentences[0], "First point");
        assert_eq!(sentences[3], "trailing");
    }

    #[test]
    fn key_terms_drop_stop_words_and_short_tokens() {
        let terms = key_terms("The cat is on the distributed database");
        assert_eq!(terms, vec!["distributed".to_string(), "database".to_string()]);
    }

    #[test]
    fn technical_terms_are_counted() {
        let tokens = tokenize("machine learning network throughput and cats");
        assert_eq!(technical_term_count(&tokens), 4);
    }

    #[test]
    fn negation_proximity_respects_window() {
        let tokens = tokenize("the wall is not visible from orbit");
        assert!(negation_near_term(&tokens, "visible", 2));
        assert!(!negation_near_term(&tokens, "orbit", 1));
    }

    #[test]
    fn years_and_numbers_are_extracted() {
        assert_eq!(extract_years("founded in 1998, revised 2021"), vec!["1998", "2021"]);
        assert_eq!(extract_numbers("3 of 4.5"), vec!["3", "4.5"]);
    }

    #[test]
    fn known_errors_match_by_containment() {
        let category = known_factual_error("the great wall of china is visible from space");
        assert_eq!(category, Some(KnownErrorCategory::Scientific));
        assert_eq!(category.unwrap().flag(), "scientific_error");
        assert!(known_factual_error("water boils at 100 degrees").is_none());
    }
}
