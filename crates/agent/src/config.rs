use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Unparsable {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid multiline pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Maximum byte length of an output's content before it is cut.
    pub line_limit: usize,
    pub multiline: MultilineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MultilineConfig {
    pub enabled: bool,
    /// "New message begins here" pattern, matched against the first
    /// physical line of a logical message. When set, multi-line
    /// handling is used directly with this pattern.
    pub pattern: Option<String>,
    /// How long an incomplete multi-line message may sit idle before
    /// it is flushed downstream anyway.
    pub flush_timeout_ms: u64,
    /// Probe the first lines for a known timestamp prefix when no
    /// explicit pattern is configured.
    pub auto_detect: bool,
    /// How many consecutive matching lines commit auto-detection.
    pub sample_lines: usize,
}

impl AgentConfig {
    /// Load configuration from file or environment variables.
    /// Priority: Environment Variables > Config File > Defaults
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = std::env::var("AGENT_CONFIG_FILE")
            .unwrap_or_else(|_| "/etc/linetail/agent.toml".to_string());

        let mut config = if Path::new(&config_path).exists() {
            tracing::info!("Loading configuration from: {}", config_path);
            Self::from_file(&config_path)?
        } else {
            tracing::info!(
                "Config file not found at {}, using environment variables",
                config_path
            );
            Self::from_env()
        };

        // Environment variables override file config
        if let Some(limit) = env_parse("AGENT_LINE_LIMIT") {
            config.line_limit = limit;
        }
        if let Ok(pattern) = std::env::var("AGENT_MULTILINE_PATTERN") {
            config.multiline.pattern = Some(pattern);
        }
        if let Some(enabled) = env_parse("AGENT_MULTILINE_ENABLED") {
            config.multiline.enabled = enabled;
        }

        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.to_string(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Unparsable {
            path: path.to_string(),
            source,
        })
    }

    /// Load configuration from environment variables with defaults.
    pub fn from_env() -> Self {
        Self {
            line_limit: env_parse("AGENT_LINE_LIMIT").unwrap_or(256_000),
            multiline: MultilineConfig::from_env(),
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.line_limit == 0 {
            return Err(ConfigError::Invalid("line_limit must be > 0".to_string()));
        }
        self.multiline.validate()
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            line_limit: 256_000,
            multiline: MultilineConfig::default(),
        }
    }
}

impl MultilineConfig {
    /// Load multiline configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            enabled: env_parse("AGENT_MULTILINE_ENABLED").unwrap_or(true),
            pattern: std::env::var("AGENT_MULTILINE_PATTERN").ok(),
            flush_timeout_ms: env_parse("AGENT_MULTILINE_FLUSH_TIMEOUT_MS").unwrap_or(1000),
            auto_detect: env_parse("AGENT_MULTILINE_AUTO_DETECT").unwrap_or(true),
            sample_lines: env_parse("AGENT_MULTILINE_SAMPLE_LINES").unwrap_or(5),
        }
    }

    /// Validate multiline configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled {
            if self.flush_timeout_ms == 0 {
                return Err(ConfigError::Invalid(
                    "multiline.flush_timeout_ms must be > 0 when multiline is enabled".to_string(),
                ));
            }
            if self.auto_detect && self.pattern.is_none() && self.sample_lines == 0 {
                return Err(ConfigError::Invalid(
                    "multiline.sample_lines must be > 0 when auto_detect is enabled".to_string(),
                ));
            }
        }
        Ok(())
    }
}

impl Default for MultilineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            pattern: None,
            flush_timeout_ms: 1000,
            auto_detect: true,
            sample_lines: 5,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|value| value.parse().ok())
}
