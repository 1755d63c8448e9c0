// SPDX-License-Identifier: MIT

use super::{execution_error, typed_args};
use crate::adk::error::ToolError;
use crate::adk::tool::{ParamSpec, ParamType, Tool, ToolArgs, ToolSchema};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::env;

const TOOL_NAME: &str = "web_search";
const MAX_RESULTS_CAP: u64 = 20;

static WEB_SEARCH_SCHEMA: Lazy<ToolSchema> = Lazy::new(|| {
    ToolSchema::new(vec![
        ParamSpec::required("query", ParamType::String, "The search query"),
        ParamSpec::optional(
            "max_results",
            ParamType::Integer,
            Some(json!(5)),
            "Number of results to return (default 5, max 20)",
        ),
    ])
});

#[derive(Debug, Deserialize)]
struct WebSearchArgs {
    query: String,
    #[serde(default)]
    max_results: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WebSearchResult {
    pub query: String,
    pub results: Vec<SearchResult>,
}

pub struct WebSearchTool {
    client: Client,
    api_key: String,
}

impl WebSearchTool {
    pub fn new() -> Result<Self, ToolError> {
        let api_key = env::var("BRAVE_API_KEY").map_err(|_| execution_error(TOOL_NAME, "BRAVE_API_KEY must be set"))?;
        Ok(Self {
            client: Client::new(),
            api_key,
        })
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Searches the web for fresh information. Returns result titles, URLs and descriptions."
    }

    fn schema(&self) -> &ToolSchema {
        &WEB_SEARCH_SCHEMA
    }

    async fn execute(&self, args: ToolArgs) -> Result<Value, ToolError> {
        let args: WebSearchArgs = typed_args(TOOL_NAME, args)?;
        if args.query.trim().is_empty() {
            return Err(ToolError::validation(TOOL_NAME, "query must not be empty"));
        }
        let count = args.max_results.unwrap_or(5).clamp(1, MAX_RESULTS_CAP);

        let mut url = reqwest::Url::parse("https://api.search.brave.com/res/v1/web/search")
            .map_err(|e| execution_error(TOOL_NAME, e))?;
        url.query_pairs_mut()
            .append_pair("q", &args.query)
            .append_pair("count", &count.to_string());

        let resp = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .header("X-Subscription-Token", &self.api_key)
            .send()
            .await
            .map_err(|e| execution_error(TOOL_NAME, e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(execution_error(
                TOOL_NAME,
                format!("Brave API error ({}): {}", status, text),
            ));
        }

        let body: Value = resp.json().await.map_err(|e| execution_error(TOOL_NAME, e))?;
        let results = parse_results(&body, count as usize)?;
        log::debug!("web_search '{}' returned {} results", args.query, results.len());

        serde_json::to_value(WebSearchResult {
            query: args.query,
            results,
        })
        .map_err(|e| execution_error(TOOL_NAME, e))
    }
}

fn parse_results(body: &Value, limit: usize) -> Result<Vec<SearchResult>, ToolError> {
    let results = body
        .get("web")
        .and_then(|w| w.get("results"))
        .cloned()
        .unwrap_or(Value::Array(Vec::new()));
    let mut results: Vec<SearchResult> =
        serde_json::from_value(results).map_err(|e| execution_error(TOOL_NAME, format!("Invalid response format: {}", e)))?;
    results.truncate(limit);
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_results_truncates() {
        let body = json!({"web": {"results": [
            {"title": "a", "url": "https://a.example", "description": "x", "age": "1d"},
            {"title": "b", "url": "https://b.example"},
            {"title": "c", "url": "https://c.example"}
        ]}});
        let results = parse_results(&body, 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].description, "");
    }

    #[test]
    fn test_missing_web_section_is_empty() {
        assert!(parse_results(&json!({"query": {}}), 5).unwrap().is_empty());
    }

    #[test]
    fn test_schema_defaults_max_results() {
        let args = WEB_SEARCH_SCHEMA.validate(TOOL_NAME, &json!({"query": "lisbon"})).unwrap();
        assert_eq!(args["max_results"], json!(5));
        assert!(WEB_SEARCH_SCHEMA.validate(TOOL_NAME, &json!({})).is_err());
    }
}
