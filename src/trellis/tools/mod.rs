// SPDX-License-Identifier: MIT

//! Reference tool set
//!
//! - `current_datetime` - local date and time
//! - `web_search` - Brave Search API
//! - `fetch_page` - page text with markup stripped
//! - `data_query` - structured statistics service

pub mod data_query;
pub mod datetime;
pub mod fetch;
pub mod search;

use crate::adk::error::ToolError;
use crate::adk::tool::ToolArgs;
use crate::trellis::config::EngineConfig;
use crate::trellis::workflow::registry::ToolRegistry;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

/// Register every reference tool that can be built. Tools missing their
/// credentials are skipped with a warning.
pub async fn register_default_tools(registry: &ToolRegistry, config: &EngineConfig) {
    registry.register(Arc::new(datetime::CurrentDateTimeTool)).await;
    registry
        .register(Arc::new(fetch::FetchPageTool::new(config.tools.fetch_max_chars)))
        .await;

    match search::WebSearchTool::new() {
        Ok(tool) => registry.register(Arc::new(tool)).await,
        Err(e) => log::warn!("Failed to load search tool: {}", e),
    }

    match data_query::DataQueryTool::new(&config.tools.data_base_url) {
        Ok(tool) => registry.register(Arc::new(tool)).await,
        Err(e) => log::warn!("Failed to load data query tool: {}", e),
    }

    for signature in registry.signatures().await {
        log::info!("Registered tool: {}", signature.name);
    }
}

/// Deserialize validated arguments into a typed struct
pub(crate) fn typed_args<T: DeserializeOwned>(tool: &str, args: ToolArgs) -> Result<T, ToolError> {
    serde_json::from_value(Value::Object(args)).map_err(|e| ToolError::validation(tool, e.to_string()))
}

pub(crate) fn execution_error(tool: &str, message: impl std::fmt::Display) -> ToolError {
    ToolError::execution(tool, message.to_string())
}
