//! Per-run context: persona, depth, injected capabilities, and threshold
//! overrides. One context accompanies one research run; agents only borrow
//! it.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::plan::Depth;
use crate::retrieval::{DynSearchProvider, DynStorageHandle};

const DEFAULT_AGENT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct ResearchContext {
    pub persona: String,
    pub depth: Option<Depth>,
    pub max_sources: Option<usize>,
    pub search: Option<DynSearchProvider>,
    pub storage: Option<DynStorageHandle>,
    pub min_confidence: Option<f64>,
    pub min_sources: Option<usize>,
    pub max_iterations: Option<usize>,
    pub completion_answer_len: Option<usize>,
    pub agent_timeout: Duration,
    pub cancel: CancellationToken,
}

impl ResearchContext {
    pub fn new() -> Self {
        Self {
            persona: "default".to_string(),
            depth: None,
            max_sources: None,
            search: None,
            storage: None,
            min_confidence: None,
            min_sources: None,
            max_iterations: None,
            completion_answer_len: None,
            agent_timeout: DEFAULT_AGENT_TIMEOUT,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = persona.into();
        self
    }

    pub fn with_depth(mut self, depth: Depth) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn with_max_sources(mut self, max_sources: usize) -> Self {
        self.max_sources = Some(max_sources);
        self
    }

    pub fn with_search_provider(mut self, provider: DynSearchProvider) -> Self {
        self.search = Some(provider);
        self
    }

    pub fn with_storage(mut self, storage: DynStorageHandle) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = Some(min_confidence);
        self
    }

    pub fn with_min_sources(mut self, min_sources: usize) -> Self {
        self.min_sources = Some(min_sources);
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    pub fn with_completion_answer_len(mut self, len: usize) -> Self {
        self.completion_answer_len = Some(len);
        self
    }

    pub fn with_agent_timeout(mut self, timeout: Duration) -> Self {
        self.agent_timeout = timeout;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Default for ResearchContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let ctx = ResearchContext::new()
            .with_persona("technical")
            .with_depth(Depth::Quick)
            .with_min_sources(1);

        assert_eq!(ctx.persona, "technical");
        assert_eq!(ctx.depth, Some(Depth::Quick));
        assert_eq!(ctx.min_sources, Some(1));
        assert!(ctx.search.is_none());
        assert!(!ctx.is_cancelled());
    }
}
