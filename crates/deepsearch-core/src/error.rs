use std::path::PathBuf;

use thiserror::Error;

/// Core error type for DeepSearch.
#[derive(Debug, Error)]
pub enum DeepSearchError {
    #[error("configuration error: {0}")]
    InvalidConfiguration(String),
    #[error("I/O error while reading {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DeepSearchError {
    pub fn config_io(path: PathBuf, source: std::io::Error) -> Self {
        Self::ConfigIo { path, source }
    }
}

/// Failure raised by concrete agent logic.
///
/// The monitored execution wrapper converts these into a Failed `AgentResult`
/// instead of propagating them, so callers above the orchestrator boundary
/// never see them directly.
#[derive(Debug, Clone, Error)]
pub enum AgentError {
    /// A required capability was absent from the run context.
    #[error("{0}")]
    MissingDependency(String),
    /// The agent was invoked with unusable input (e.g. an empty source list).
    #[error("{0}")]
    EmptyInput(String),
    /// Every upstream retrieval strategy failed.
    #[error("search failed: {0}")]
    Upstream(String),
    /// The run was cancelled before the agent could finish.
    #[error("research run cancelled")]
    Cancelled,
}

impl AgentError {
    /// Input errors are rejected before any work happens and charge no credits.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::MissingDependency(_) | Self::EmptyInput(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_errors_are_classified() {
        assert!(AgentError::MissingDependency("no db".into()).is_input_error());
        assert!(AgentError::EmptyInput("no sources".into()).is_input_error());
        assert!(!AgentError::Upstream("boom".into()).is_input_error());
        assert!(!AgentError::Cancelled.is_input_error());
    }

    #[test]
    fn display_carries_reason() {
        let err = AgentError::MissingDependency("Database connection not available".into());
        assert!(err.to_string().contains("Database connection"));
    }
}
