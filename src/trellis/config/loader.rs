// SPDX-License-Identifier: MIT

//! Config loader - YAML file plus environment overrides

use super::EngineConfig;
use crate::adk::error::TrellisError;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Loads an [`EngineConfig`] from an optional file and the environment
pub struct ConfigLoader;

impl ConfigLoader {
    /// Read `path` if given, apply environment overrides, validate
    pub fn load(path: Option<&Path>) -> Result<EngineConfig, TrellisError> {
        let mut config = match path {
            Some(path) => {
                log::info!("Loading configuration from {}", path.display());
                Self::load_file(path)?
            }
            None => EngineConfig::default(),
        };
        Self::apply_overrides(&mut config, |key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<EngineConfig, TrellisError> {
        let content = fs::read_to_string(path)?;
        Self::parse_yaml(&content)
    }

    /// An empty document yields the defaults
    pub fn parse_yaml(content: &str) -> Result<EngineConfig, TrellisError> {
        if content.trim().is_empty() {
            return Ok(EngineConfig::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Apply overrides from a key lookup (the process environment in
    /// production)
    pub fn apply_overrides<F>(config: &mut EngineConfig, lookup: F) -> Result<(), TrellisError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parsed(&lookup, "TRELLIS_MAX_HOPS")? {
            config.engine.max_hops = v;
        }
        if let Some(v) = parsed(&lookup, "TRELLIS_TOOL_TIMEOUT")? {
            config.engine.tool_timeout_secs = v;
        }
        if let Some(v) = parsed(&lookup, "TRELLIS_MODEL_TIMEOUT")? {
            config.engine.model_timeout_secs = v;
        }
        if let Some(v) = parsed(&lookup, "TRELLIS_MODEL_RETRIES")? {
            config.engine.model_retries = v;
        }
        if let Some(v) = parsed(&lookup, "TRELLIS_MAX_SESSIONS")? {
            config.sessions.max_sessions = v;
        }
        if let Some(v) = parsed(&lookup, "TRELLIS_PORT")? {
            config.server.port = v;
        }
        if let Some(v) = lookup("MODEL_PROVIDER") {
            config.model.provider = v;
        }
        if let Some(v) = lookup("MODEL_NAME") {
            config.model.model_name = v;
        }
        if let Some(v) = lookup("TRELLIS_DATA_URL") {
            config.tools.data_base_url = v;
        }
        Ok(())
    }
}

fn parsed<T, F>(lookup: &F, key: &str) -> Result<Option<T>, TrellisError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| TrellisError::config(format!("{}='{}': {}", key, raw, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = ConfigLoader::parse_yaml(
            r#"
engine:
  max_hops: 8
model:
  model_name: gpt-4o
"#,
        )
        .unwrap();
        assert_eq!(config.engine.max_hops, 8);
        assert_eq!(config.engine.tool_timeout_secs, 30);
        assert_eq!(config.model.model_name, "gpt-4o");
        assert_eq!(config.model.provider, "openai");
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(ConfigLoader::parse_yaml("  \n").unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "sessions:\n  max_sessions: 5\nserver:\n  port: 9090").unwrap();

        let config = ConfigLoader::load_file(file.path()).unwrap();
        assert_eq!(config.sessions.max_sessions, 5);
        assert_eq!(config.server.port, 9090);
    }

    #[test]
    fn test_malformed_yaml_is_an_error() {
        assert!(matches!(
            ConfigLoader::parse_yaml("engine: [1, 2"),
            Err(TrellisError::Yaml(_))
        ));
    }

    #[test]
    fn test_environment_overrides() {
        let env: HashMap<&str, &str> = [
            ("TRELLIS_MAX_HOPS", "4"),
            ("TRELLIS_PORT", "3000"),
            ("MODEL_NAME", "gpt-4.1"),
        ]
        .into_iter()
        .collect();
        let mut config = EngineConfig::default();
        ConfigLoader::apply_overrides(&mut config, |k| env.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(config.engine.max_hops, 4);
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.model.model_name, "gpt-4.1");
    }

    #[test]
    fn test_unparseable_override_is_a_config_error() {
        let mut config = EngineConfig::default();
        let result = ConfigLoader::apply_overrides(&mut config, |k| {
            (k == "TRELLIS_MAX_HOPS").then(|| "many".to_string())
        });
        assert!(matches!(result, Err(TrellisError::Config(_))));
    }
}
