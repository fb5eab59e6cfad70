use anyhow::{Context, Result};
use serde::Deserialize;
use std::str::FromStr;

pub const CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Deserialize)]
pub struct Config {
    pub general: General,
    pub artifact: Artifact,
    pub web: Option<Web>,
}

#[derive(Debug, Deserialize)]
pub struct General {
    pub log_level: String,
}

/// Location of the precomputed score table produced by the offline scoring pipeline.
#[derive(Debug, Deserialize)]
pub struct Artifact {
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Web {
    pub port: u16,
    pub host: String,
}

impl Default for Web {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "0.0.0.0".to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let content = std::fs::read_to_string(CONFIG_PATH)
            .with_context(|| format!("failed to read {CONFIG_PATH}"))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// `[web]` is optional; missing section means the default listener.
    pub fn web_or_default(&self) -> Web {
        self.web.clone().unwrap_or_default()
    }
}

impl FromStr for Config {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_toml_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_default_config() {
        let config = Config::from_toml_str(include_str!("../../../config/default.toml")).unwrap();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.artifact.path, "output/final_scored_wallets.csv");
    }

    #[test]
    fn test_web_config_section() {
        let config = Config::from_toml_str(include_str!("../../../config/default.toml")).unwrap();
        let web = config.web.expect("web section should be present");
        assert_eq!(web.port, 8080);
        assert_eq!(web.host, "0.0.0.0");
    }

    #[test]
    fn test_web_config_optional() {
        let toml = r#"
[general]
log_level = "debug"

[artifact]
path = "data/scores.csv"
"#;
        let config: Config = toml.parse().unwrap();
        assert!(config.web.is_none());
        let web = config.web_or_default();
        assert_eq!(web.port, 8080);
        assert_eq!(web.host, "0.0.0.0");
        assert_eq!(config.artifact.path, "data/scores.csv");
    }

    #[test]
    fn test_missing_artifact_section_is_an_error() {
        let toml = r#"
[general]
log_level = "info"
"#;
        assert!(Config::from_toml_str(toml).is_err());
    }
}
