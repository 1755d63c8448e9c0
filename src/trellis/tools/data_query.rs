// SPDX-License-Identifier: MIT

//! Structured-data query against the statistics service

use super::{execution_error, typed_args};
use crate::adk::error::ToolError;
use crate::adk::tool::{ParamSpec, ParamType, Tool, ToolArgs, ToolSchema};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

const TOOL_NAME: &str = "data_query";

static DATA_QUERY_SCHEMA: Lazy<ToolSchema> = Lazy::new(|| {
    ToolSchema::new(vec![ParamSpec::required(
        "endpoint",
        ParamType::String,
        "One of: passing-leaders, rushing-leaders, health",
    )])
});

/// Endpoints the statistics service exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Endpoint {
    PassingLeaders,
    RushingLeaders,
    Health,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::PassingLeaders => "passing-leaders",
            Endpoint::RushingLeaders => "rushing-leaders",
            Endpoint::Health => "health",
        }
    }
}

#[derive(Debug, Deserialize)]
struct DataQueryArgs {
    endpoint: Endpoint,
}

pub struct DataQueryTool {
    client: Client,
    base_url: Url,
}

impl DataQueryTool {
    pub fn new(base_url: &str) -> Result<Self, ToolError> {
        let mut base_url = Url::parse(base_url).map_err(|e| execution_error(TOOL_NAME, e))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            client: Client::new(),
            base_url,
        })
    }

    pub fn endpoint_url(&self, endpoint: Endpoint) -> Result<Url, ToolError> {
        self.base_url
            .join(endpoint.path())
            .map_err(|e| execution_error(TOOL_NAME, e))
    }
}

#[async_trait]
impl Tool for DataQueryTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Queries the statistics service for structured data such as season passing or rushing leaders."
    }

    fn schema(&self) -> &ToolSchema {
        &DATA_QUERY_SCHEMA
    }

    async fn execute(&self, args: ToolArgs) -> Result<Value, ToolError> {
        let args: DataQueryArgs = typed_args(TOOL_NAME, args)?;
        let url = self.endpoint_url(args.endpoint)?;
        log::debug!("data_query GET {}", url);

        let resp = self
            .client
            .get(url.clone())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| execution_error(TOOL_NAME, e))?;
        if !resp.status().is_success() {
            return Err(execution_error(TOOL_NAME, format!("{} returned {}", url, resp.status())));
        }
        let data: Value = resp.json().await.map_err(|e| execution_error(TOOL_NAME, e))?;

        Ok(json!({
            "endpoint": args.endpoint.path(),
            "data": data,
        }))
    }
}
