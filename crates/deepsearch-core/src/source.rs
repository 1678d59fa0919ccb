//! Candidate evidence records produced by the searcher.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Retrieval strategy that produced a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMethod {
    Semantic,
    Fulltext,
    Related,
}

impl SearchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMethod::Semantic => "semantic",
            SearchMethod::Fulltext => "fulltext",
            SearchMethod::Related => "related",
        }
    }
}

/// A candidate piece of evidence.
///
/// `relevance_score` is search-method dependent: semantic hits carry the
/// provider's similarity, fulltext hits a fixed floor, related hits a fixed
/// low score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub verified: bool,
    pub relevance_score: f64,
    pub search_method: SearchMethod,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Source {
    pub fn new(id: impl Into<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            summary: None,
            tags: Vec::new(),
            verified: false,
            relevance_score: 0.0,
            search_method: SearchMethod::Semantic,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_verified(mut self, verified: bool) -> Self {
        self.verified = verified;
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Ranking key used by the searcher: relevance, a verification bonus, and
    /// a recency bonus that decays linearly from 0.1 at age zero to 0 at one
    /// year or older.
    pub fn composite_score(&self, now: DateTime<Utc>) -> f64 {
        let verified_bonus = if self.verified { 0.2 } else { 0.0 };
        let age_days = (now - self.updated_at).num_days().max(0) as f64;
        let recency_bonus = (0.1 * (1.0 - age_days / 365.0)).max(0.0);
        self.relevance_score + verified_bonus + recency_bonus
    }
}
