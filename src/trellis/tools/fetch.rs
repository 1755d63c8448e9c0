// SPDX-License-Identifier: MIT

use super::{execution_error, typed_args};
use crate::adk::error::ToolError;
use crate::adk::tool::{ParamSpec, ParamType, Tool, ToolArgs, ToolSchema};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

const TOOL_NAME: &str = "fetch_page";

static FETCH_SCHEMA: Lazy<ToolSchema> = Lazy::new(|| {
    ToolSchema::new(vec![
        ParamSpec::required("url", ParamType::String, "Absolute http(s) URL of the page"),
        ParamSpec::optional(
            "max_chars",
            ParamType::Integer,
            None,
            "Maximum number of characters of page text to return",
        ),
    ])
});

static HIDDEN_BLOCK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(script|style|noscript|head)\b[^>]*>.*?</(script|style|noscript|head)>")
        .expect("hidden block pattern is valid")
});

static COMMENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").expect("comment pattern is valid"));

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]+>").expect("tag pattern is valid"));

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

#[derive(Debug, Deserialize)]
struct FetchArgs {
    url: String,
    #[serde(default)]
    max_chars: Option<usize>,
}

/// Reduce an HTML document to its visible text
pub fn html_to_text(html: &str) -> String {
    let text = HIDDEN_BLOCK_RE.replace_all(html, " ");
    let text = COMMENT_RE.replace_all(&text, " ");
    let text = TAG_RE.replace_all(&text, " ");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");
    WHITESPACE_RE.replace_all(&text, " ").trim().to_string()
}

/// First `max_chars` characters, never splitting a character
fn truncate_chars(text: &str, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => (text[..idx].to_string(), true),
        None => (text.to_string(), false),
    }
}

pub struct FetchPageTool {
    client: Client,
    default_max_chars: usize,
}

impl FetchPageTool {
    pub fn new(default_max_chars: usize) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(20))
            .user_agent("trellis-rs/0.1")
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            default_max_chars: default_max_chars.max(1),
        }
    }
}

#[async_trait]
impl Tool for FetchPageTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Fetches a web page and returns its readable text. Use only when details from a specific source are needed."
    }

    fn schema(&self) -> &ToolSchema {
        &FETCH_SCHEMA
    }

    async fn execute(&self, args: ToolArgs) -> Result<Value, ToolError> {
        let args: FetchArgs = typed_args(TOOL_NAME, args)?;
        let url = Url::parse(&args.url)
            .map_err(|e| ToolError::validation(TOOL_NAME, format!("invalid url '{}': {}", args.url, e)))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ToolError::validation(
                TOOL_NAME,
                format!("unsupported scheme '{}'", url.scheme()),
            ));
        }

        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| execution_error(TOOL_NAME, e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(execution_error(TOOL_NAME, format!("{} returned {}", url, status)));
        }
        let body = resp.text().await.map_err(|e| execution_error(TOOL_NAME, e))?;

        let text = html_to_text(&body);
        let max_chars = args.max_chars.unwrap_or(self.default_max_chars).max(1);
        let (content, truncated) = truncate_chars(&text, max_chars);

        Ok(json!({
            "url": url.as_str(),
            "content": content,
            "truncated": truncated,
        }))
    }
}
