//! Loading context configuration from a TOML file
//!
//! ```toml
//! preset = "production"
//! duplicate_window = 1024
//!
//! [logging]
//! level = "warn"
//! structured = false
//! ```
//!
//! Sections that are present replace the preset's section as a whole; their
//! missing fields take the library defaults.

use std::fs;
use std::path::Path;

use anyhow::{Context as _, Result};
use causeway_core::{ContextConfig, LoggingConfig, TokenConfig};
use serde::Deserialize;
use tracing::debug;

/// Base configuration a file starts from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// Library defaults
    #[default]
    Default,
    /// Debug-level logging, small duplicate window
    Testing,
    /// Debug-level text logging
    Development,
    /// Info-level structured logging
    Production,
}

impl Preset {
    fn base(self) -> ContextConfig {
        match self {
            Preset::Default => ContextConfig::default(),
            Preset::Testing => ContextConfig::minimal_for_testing(),
            Preset::Development => ContextConfig::development(),
            Preset::Production => ContextConfig::production(),
        }
    }
}

/// On-disk form of the CLI configuration
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub preset: Preset,
    pub logging: Option<LoggingConfig>,
    pub token: Option<TokenConfig>,
    pub duplicate_window: Option<usize>,
}

impl FileConfig {
    pub fn into_context_config(self) -> ContextConfig {
        let mut config = self.preset.base();
        if let Some(logging) = self.logging {
            config.logging = logging;
        }
        if let Some(token) = self.token {
            config.token = token;
        }
        if let Some(window) = self.duplicate_window {
            config.duplicate_window = window;
        }
        config
    }
}

/// Parse and validate a configuration document
pub fn parse(contents: &str) -> Result<ContextConfig> {
    let file: FileConfig = toml::from_str(contents).context("Failed to parse configuration")?;
    let config = file.into_context_config();
    config.validate()?;
    Ok(config)
}

/// Load the configuration at `path`, or the development preset when no file is given
pub fn load(path: Option<&Path>) -> Result<ContextConfig> {
    let Some(path) = path else {
        debug!("no configuration file given, using the development preset");
        return Ok(ContextConfig::development());
    };

    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file {}", path.display()))?;
    let config = parse(&contents)
        .with_context(|| format!("Invalid configuration in {}", path.display()))?;
    debug!(path = %path.display(), "loaded configuration");
    Ok(config)
}
