//! Configuration for contexts, session logging and the token codec

use serde::{Deserialize, Serialize};

use crate::error::CausewayError;
use crate::logging::LogLevel;
use crate::Result;

/// Configuration for session log output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Whether session logs are forwarded to the sink at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Records below this level are dropped
    #[serde(default = "default_level")]
    pub level: LogLevel,

    /// Render records as JSON instead of text lines
    #[serde(default)]
    pub structured: bool,

    /// Whether to include hop and origin information in text lines
    #[serde(default = "default_true")]
    pub include_hops: bool,
}

fn default_true() -> bool {
    true
}

fn default_level() -> LogLevel {
    LogLevel::Info
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_level(),
            structured: false,
            include_hops: true,
        }
    }
}

/// Limits applied when decoding tokens received from other processes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Maximum accepted token length in bytes
    #[serde(default = "default_max_token_len")]
    pub max_token_len: usize,

    /// Maximum accepted identity length in bytes
    #[serde(default = "default_max_identity_len")]
    pub max_identity_len: usize,
}

fn default_max_token_len() -> usize {
    4096
}

fn default_max_identity_len() -> usize {
    256
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            max_token_len: default_max_token_len(),
            max_identity_len: default_max_identity_len(),
        }
    }
}

/// Master configuration for a context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Session logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Token codec limits
    #[serde(default)]
    pub token: TokenConfig,

    /// How many recently minted identities are remembered for duplicate
    /// detection. Zero disables the check.
    #[serde(default = "default_duplicate_window")]
    pub duplicate_window: usize,
}

fn default_duplicate_window() -> usize {
    4096
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            token: TokenConfig::default(),
            duplicate_window: default_duplicate_window(),
        }
    }
}

impl ContextConfig {
    /// Create a minimal configuration for testing
    pub fn minimal_for_testing() -> Self {
        let mut config = Self::default();
        config.logging.level = LogLevel::Debug;
        config.duplicate_window = 64;
        config
    }

    /// Create a development configuration
    pub fn development() -> Self {
        let mut config = Self::default();
        config.logging.level = LogLevel::Debug;
        config.logging.structured = false;
        config
    }

    /// Create a production configuration
    pub fn production() -> Self {
        let mut config = Self::default();
        config.logging.level = LogLevel::Info;
        config.logging.structured = true;
        config.logging.include_hops = true;
        config
    }

    /// Check the configuration for values the codec cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.token.max_identity_len == 0 {
            return Err(CausewayError::Config(
                "token.max_identity_len must be greater than zero".to_string(),
            ));
        }

        if self.token.max_token_len <= self.token.max_identity_len {
            return Err(CausewayError::Config(format!(
                "token.max_token_len ({}) must exceed token.max_identity_len ({})",
                self.token.max_token_len, self.token.max_identity_len
            )));
        }

        Ok(())
    }
}
