//! Configuration loader and validator for the console.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub backend: Backend,
    #[serde(default)]
    pub ui: UiPrefs,
    #[serde(default)]
    pub auth: Auth,
}

/// Backend endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Backend {
    pub base_url: String,
}

/// UI preferences.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UiPrefs {
    pub scale: f32,
}

impl Default for UiPrefs {
    fn default() -> Self {
        Self { scale: 1.0 }
    }
}

/// Credential storage overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Auth {
    /// Token file location; platform config dir when unset.
    pub token_path: Option<String>,
}

impl Config {
    /// The backend base URL, parsed and ready for endpoint joins.
    pub fn base_url(&self) -> Result<reqwest::Url, ConfigError> {
        reqwest::Url::parse(&self.backend.base_url)
            .map_err(|_| ConfigError::Invalid("backend.base_url must be an absolute URL"))
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.backend.base_url.trim().is_empty() {
        return Err(ConfigError::Invalid("backend.base_url must be non-empty"));
    }
    cfg.base_url()?;
    if !(0.5..=2.0).contains(&cfg.ui.scale) {
        return Err(ConfigError::Invalid("ui.scale must be between 0.5 and 2.0"));
    }
    Ok(())
}

/// Example YAML document, also used by the config tests.
pub fn example() -> &'static str {
    r#"backend:
  base_url: "http://localhost:8080/api/"

ui:
  scale: 1.0

# auth:
#   token_path: "/secure/stockdesk-token"
"#
}
