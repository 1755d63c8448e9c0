// SPDX-License-Identifier: MIT

//! Engine configuration
//!
//! Every field has a default, so an empty YAML document (or no file at all)
//! is a valid configuration. See [`loader`] for file and environment handling.

pub mod loader;

pub use loader::ConfigLoader;

use crate::adk::error::TrellisError;
use crate::adk::model::GenerationConfig;
use crate::trellis::agents::DispatchSettings;
use crate::trellis::session::EvictionPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub engine: EngineSection,
    pub sessions: SessionSection,
    pub model: ModelSection,
    pub server: ServerSection,
    pub tools: ToolsSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    pub max_hops: usize,
    pub tool_timeout_secs: u64,
    pub model_timeout_secs: u64,
    pub model_retries: u32,
    pub retry_backoff_ms: u64,
    pub finalize_window: usize,
    pub specialist_tool_rounds: usize,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            max_hops: 15,
            tool_timeout_secs: 30,
            model_timeout_secs: 60,
            model_retries: 2,
            retry_backoff_ms: 500,
            finalize_window: 3,
            specialist_tool_rounds: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    pub max_sessions: usize,
    pub idle_ttl_secs: u64,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            max_sessions: 100,
            idle_ttl_secs: 24 * 60 * 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSection {
    pub provider: String,
    pub model_name: String,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
}

impl Default for ModelSection {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model_name: "gpt-4o-mini".to_string(),
            temperature: Some(0.2),
            max_output_tokens: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    pub data_base_url: String,
    pub fetch_max_chars: usize,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            data_base_url: "http://localhost:8000".to_string(),
            fetch_max_chars: 3500,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), TrellisError> {
        let e = &self.engine;
        if e.max_hops == 0 {
            return Err(TrellisError::config("engine.max_hops must be at least 1"));
        }
        if e.finalize_window == 0 {
            return Err(TrellisError::config("engine.finalize_window must be at least 1"));
        }
        if e.tool_timeout_secs == 0 || e.model_timeout_secs == 0 {
            return Err(TrellisError::config("engine timeouts must be greater than zero"));
        }
        if self.sessions.max_sessions == 0 {
            return Err(TrellisError::config("sessions.max_sessions must be at least 1"));
        }
        if let Some(t) = self.model.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(TrellisError::config(format!(
                    "model.temperature must be within 0..=2, got {}",
                    t
                )));
            }
        }
        if url::Url::parse(&self.tools.data_base_url).is_err() {
            return Err(TrellisError::config(format!(
                "tools.data_base_url is not a valid URL: {}",
                self.tools.data_base_url
            )));
        }
        Ok(())
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.engine.tool_timeout_secs)
    }

    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.engine.model_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.engine.retry_backoff_ms)
    }

    pub fn generation(&self) -> GenerationConfig {
        GenerationConfig {
            temperature: self.model.temperature,
            max_output_tokens: self.model.max_output_tokens,
        }
    }

    pub fn eviction(&self) -> EvictionPolicy {
        EvictionPolicy {
            max_sessions: self.sessions.max_sessions,
            idle_ttl: Duration::from_secs(self.sessions.idle_ttl_secs),
        }
    }

    pub fn dispatch(&self) -> DispatchSettings {
        DispatchSettings {
            tool_timeout: self.tool_timeout(),
            specialist_tool_rounds: self.engine.specialist_tool_rounds,
            finalize_window: self.engine.finalize_window,
            max_hops: self.engine.max_hops,
        }
    }
}
