use crate::errors::{Result, SelectorError};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub generator: GeneratorConfig,
    pub browser: BrowserConfig,
}

/// Settings that shape selector generation. Element-valued options
/// (`root`, `omit_text_from`) are supplied per call through
/// [`GenerateOptions`](crate::generator::GenerateOptions).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub test_id_attribute_name: String,
    pub retarget_for_action: bool,
    pub retarget_for_text: bool,
    pub omit_internal_engines: bool,
    pub include_hidden: bool,
    pub max_subtree_depth: usize,
    pub max_subtree_nodes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,
    pub viewport: Viewport,
    pub user_agent: Option<String>,
    pub disable_images: bool,
    pub args: Vec<String>,
    pub settle_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.generator.validate()
    }
}

impl GeneratorConfig {
    pub fn validate(&self) -> Result<()> {
        let attr = self.test_id_attribute_name.trim();
        if attr.is_empty() {
            return Err(SelectorError::ConfigurationError(
                "test_id_attribute_name must not be empty".to_string(),
            ));
        }
        if attr.chars().any(|c| c.is_whitespace() || matches!(c, '[' | ']' | '=' | '"')) {
            return Err(SelectorError::ConfigurationError(format!(
                "test_id_attribute_name \"{}\" is not a valid attribute name",
                attr
            )));
        }
        if self.max_subtree_nodes == 0 {
            return Err(SelectorError::ConfigurationError(
                "max_subtree_nodes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            test_id_attribute_name: "data-testid".to_string(),
            retarget_for_action: false,
            retarget_for_text: false,
            omit_internal_engines: false,
            include_hidden: false,
            max_subtree_depth: 3,
            max_subtree_nodes: 24,
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport: Viewport::default(),
            user_agent: None,
            disable_images: false,
            args: vec![],
            settle_timeout_ms: 500,
        }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = Config::from_json(r#"{ "generator": { "test_id_attribute_name": "data-qa" } }"#)
            .unwrap();
        assert_eq!(config.generator.test_id_attribute_name, "data-qa");
        assert_eq!(config.generator.max_subtree_depth, 3);
        assert!(config.browser.headless);
    }

    #[test]
    fn test_config_round_trip() {
        let mut config = Config::default();
        config.generator.retarget_for_text = true;
        let json = serde_json::to_string(&config).unwrap();
        let parsed = Config::from_json(&json).unwrap();
        assert!(parsed.generator.retarget_for_text);
        assert_eq!(parsed.browser.viewport.width, 1280);
    }

    #[test]
    fn test_rejects_bad_test_id_attribute() {
        let err = Config::from_json(r#"{ "generator": { "test_id_attribute_name": "data test" } }"#)
            .unwrap_err();
        assert!(matches!(err, SelectorError::ConfigurationError(_)));
    }

    #[test]
    fn test_rejects_malformed_json() {
        let err = Config::from_json("{ not json").unwrap_err();
        assert!(matches!(err, SelectorError::SerializationError(_)));
    }
}
