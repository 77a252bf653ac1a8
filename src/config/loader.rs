use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Json, Toml, Yaml},
};
use std::path::Path;

use super::PressConfig;
use super::smart_load;

// Embed the default config at compile time
const DEFAULT_CONFIG: &str = include_str!("../../default-config.toml");

const ENV_PREFIX: &str = "PRESSPOOL_";

impl PressConfig {
    /// Load and validate the merged configuration
    pub fn load_with_custom_config(custom_config: Option<&str>) -> Result<Self> {
        let config = Self::load_unvalidated(custom_config)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the merged configuration without validating it, for callers that
    /// apply their own overrides first and call [`PressConfig::validate`] after
    pub fn load_unvalidated(custom_config: Option<&str>) -> Result<Self> {
        let figment = Self::layered(custom_config, ENV_PREFIX)?;
        Self::extract_from(&figment)
    }

    /// Extract and validate a configuration from an already layered figment
    pub fn from_figment(figment: &Figment) -> Result<Self> {
        let config = Self::extract_from(figment)?;
        config.validate()?;
        Ok(config)
    }

    fn extract_from(figment: &Figment) -> Result<Self> {
        let config: PressConfig = figment
            .extract()
            .context("Failed to parse configuration")?;
        tracing::trace!("Loaded configuration: {:?}", config);
        Ok(config)
    }

    pub(crate) fn layered(custom_config: Option<&str>, env_prefix: &str) -> Result<Figment> {
        let mut figment = Figment::new().merge(Toml::string(DEFAULT_CONFIG)); // Embedded defaults

        // A custom config replaces the user and repository files
        if let Some(custom_path) = custom_config {
            if !Path::new(custom_path).exists() {
                anyhow::bail!("Config file not found: {}", custom_path);
            }
            tracing::debug!("Using custom config {}", custom_path);
            figment = figment.merge(smart_load::auto(custom_path));
        } else {
            let user = Self::user_config_path();
            figment = figment
                // User config - support multiple formats
                .merge(Toml::file(&user))
                .merge(Json::file(user.replace(".toml", ".json")))
                .merge(Yaml::file(user.replace(".toml", ".yaml")))
                .merge(Yaml::file(user.replace(".toml", ".yml")))
                // Repository config - support multiple formats
                .merge(Toml::file("presspool.toml"))
                .merge(Json::file("presspool.json"))
                .merge(Yaml::file("presspool.yaml"))
                .merge(Yaml::file("presspool.yml"));
        }

        // Environment variables always have highest priority
        Ok(figment.merge(Env::prefixed(env_prefix).split("__")))
    }

    fn user_config_path() -> String {
        match std::env::var("HOME") {
            Ok(home) => format!("{}/.config/presspool/config.toml", home),
            Err(_) => "~/.config/presspool/config.toml".to_string(),
        }
    }
}
