//! Service configuration
//!
//! Values are layered: serde defaults, then an optional TOML file
//! (`DEVIS_CONFIG`, default `config/default.toml`), then `DEVIS_`-prefixed
//! environment variables using `__` between sections, e.g.
//! `DEVIS_SCORING__TIMEOUT_SECS=10`.

use crate::conversation::{ConversationFeatureExtractor, KeywordLexicon};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub scoring: ScoringConfig,

    #[serde(default)]
    pub conversation: ConversationConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum accepted request body in bytes
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_body_limit() -> usize {
    64 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `pretty` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// External scoring process configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Interpreter used to run the script; the script is executed directly when unset
    #[serde(default = "default_interpreter")]
    pub interpreter: Option<String>,

    /// Entry-point script of the scoring model
    #[serde(default = "default_script_path")]
    pub script_path: PathBuf,

    /// Working directory of the child process
    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// Hard limit on a single scoring run
    #[serde(default = "default_scoring_timeout")]
    pub timeout_secs: u64,
}

fn default_interpreter() -> Option<String> {
    Some("python3".to_string())
}

fn default_script_path() -> PathBuf {
    PathBuf::from("python/commercial_model.py")
}

fn default_scoring_timeout() -> u64 {
    30
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            script_path: default_script_path(),
            working_dir: None,
            timeout_secs: default_scoring_timeout(),
        }
    }
}

impl ScoringConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Conversation enrichment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Base URL of the message service; enrichment is disabled when unset
    #[serde(default)]
    pub service_url: Option<String>,

    /// Upper bound on the conversation lookup
    #[serde(default = "default_enrichment_timeout")]
    pub enrichment_timeout_ms: u64,

    /// Length of the conversation excerpt forwarded to the model
    #[serde(default = "default_excerpt_max_chars")]
    pub excerpt_max_chars: usize,

    #[serde(default)]
    pub lexicon: KeywordLexicon,
}

fn default_enrichment_timeout() -> u64 {
    2000
}

fn default_excerpt_max_chars() -> usize {
    5000
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            service_url: None,
            enrichment_timeout_ms: default_enrichment_timeout(),
            excerpt_max_chars: default_excerpt_max_chars(),
            lexicon: KeywordLexicon::default(),
        }
    }
}

impl ConversationConfig {
    pub fn enrichment_timeout(&self) -> Duration {
        Duration::from_millis(self.enrichment_timeout_ms)
    }

    /// Extractor over the configured lexicon, for in-process analysis
    pub fn extractor(&self) -> ConversationFeatureExtractor {
        ConversationFeatureExtractor::new(self.lexicon.clone())
    }
}

impl Config {
    /// Load configuration from `.env`, the config file and the environment
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let path = std::env::var("DEVIS_CONFIG").unwrap_or_else(|_| "config/default".to_string());

        let settings = config::Config::builder()
            .add_source(config::File::with_name(&path).required(false))
            .add_source(
                config::Environment::with_prefix("DEVIS")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document, filling gaps with defaults
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scoring.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "scoring.timeout_secs must be greater than zero".to_string(),
            ));
        }

        if self.scoring.script_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "scoring.script_path cannot be empty".to_string(),
            ));
        }

        if self.conversation.excerpt_max_chars == 0 {
            return Err(ConfigError::Invalid(
                "conversation.excerpt_max_chars must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}
