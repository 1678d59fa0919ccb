use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::error::DeepSearchError;

const DEFAULT_CONFIG_PATH: &str = "config.toml";
const CONFIG_PATH_ENV: &str = "DEEPSEARCH_CONFIG";

/// Top-level engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub search: SearchSection,
    #[serde(default)]
    pub factcheck: FactcheckSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            engine: EngineSection::default(),
            search: SearchSection::default(),
            factcheck: FactcheckSection::default(),
            logging: LoggingSection::default(),
        }
    }
}

/// Helper to load configuration with guard rails.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a provided path or discoverable defaults.
    ///
    /// Resolution order:
    /// 1. Explicit `path` argument.
    /// 2. `DEEPSEARCH_CONFIG` environment variable.
    /// 3. `config.toml` in the current working directory.
    pub fn load(path: Option<PathBuf>) -> Result<EngineConfig, DeepSearchError> {
        let candidate = resolve_path(path);
        let raw = fs::read_to_string(&candidate)
            .map_err(|err| DeepSearchError::config_io(candidate.clone(), err))?;
        let config: EngineConfig = toml::from_str(&raw)
            .map_err(|err| DeepSearchError::InvalidConfiguration(err.to_string()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    fn validate(config: &EngineConfig) -> Result<(), DeepSearchError> {
        if !(0.0..=1.0).contains(&config.engine.min_confidence) {
            return Err(DeepSearchError::InvalidConfiguration(
                "engine.min_confidence must be within [0, 1]".into(),
            ));
        }
        if config.engine.max_iterations == 0 {
            return Err(DeepSearchError::InvalidConfiguration(
                "engine.max_iterations must be at least 1".into(),
            ));
        }
        if config.engine.min_sources == 0 {
            return Err(DeepSearchError::InvalidConfiguration(
                "engine.min_sources must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn resolve_path(path: Option<PathBuf>) -> PathBuf {
    if let Some(path) = path {
        return path;
    }

    if let Ok(from_env) = env::var(CONFIG_PATH_ENV) {
        if !from_env.trim().is_empty() {
            return PathBuf::from(from_env);
        }
    }

    Path::new(DEFAULT_CONFIG_PATH).to_path_buf()
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineSection {
    #[serde(default = "EngineSection::default_min_confidence")]
    pub min_confidence: f64,
    #[serde(default = "EngineSection::default_min_sources")]
    pub min_sources: usize,
    #[serde(default = "EngineSection::default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "EngineSection::default_agent_timeout_ms")]
    pub agent_timeout_ms: u64,
    #[serde(default = "EngineSection::default_completion_answer_len")]
    pub completion_answer_len: usize,
}

impl EngineSection {
    const fn default_min_confidence() -> f64 {
        0.6
    }

    const fn default_min_sources() -> usize {
        3
    }

    const fn default_max_iterations() -> usize {
        5
    }

    const fn default_agent_timeout_ms() -> u64 {
        30_000
    }

    const fn default_completion_answer_len() -> usize {
        100
    }
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            min_confidence: Self::default_min_confidence(),
            min_sources: Self::default_min_sources(),
            max_iterations: Self::default_max_iterations(),
            agent_timeout_ms: Self::default_agent_timeout_ms(),
            completion_answer_len: Self::default_completion_answer_len(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchSection {
    #[serde(default = "SearchSection::default_limit")]
    pub default_limit: usize,
    /// Semantic result count below which the fulltext fallback is attempted.
    #[serde(default = "SearchSection::default_fulltext_floor")]
    pub fulltext_floor: usize,
}

impl SearchSection {
    const fn default_limit() -> usize {
        15
    }

    const fn default_fulltext_floor() -> usize {
        3
    }
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            default_limit: Self::default_limit(),
            fulltext_floor: Self::default_fulltext_floor(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FactcheckSection {
    #[serde(default = "FactcheckSection::default_level")]
    pub level: String,
}

impl FactcheckSection {
    fn default_level() -> String {
        "comprehensive".to_string()
    }
}

impl Default for FactcheckSection {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "LoggingSection::default_level")]
    pub level: String,
}

impl LoggingSection {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_thresholds() {
        let config = EngineConfig::default();
        assert!((config.engine.min_confidence - 0.6).abs() < f64::EPSILON);
        assert_eq!(config.engine.min_sources, 3);
        assert_eq!(config.engine.max_iterations, 5);
        assert_eq!(config.search.fulltext_floor, 3);
    }

    #[test]
    fn partial_file_is_filled_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "[engine]\nmin_confidence = 0.7").unwrap();

        let config = ConfigLoader::load(Some(file.path().to_path_buf())).expect("config");
        assert!((config.engine.min_confidence - 0.7).abs() < f64::EPSILON);
        assert_eq!(config.engine.max_iterations, 5);
    }

    #[test]
    fn out_of_range_confidence_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "[engine]\nmin_confidence = 1.5").unwrap();

        let err = ConfigLoader::load(Some(file.path().to_path_buf())).unwrap_err();
        assert!(matches!(err, DeepSearchError::InvalidConfiguration(_)));
    }
}
