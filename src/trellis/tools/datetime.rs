// SPDX-License-Identifier: MIT

use crate::adk::error::ToolError;
use crate::adk::tool::{Tool, ToolArgs, ToolSchema};
use async_trait::async_trait;
use chrono::Local;
use once_cell::sync::Lazy;
use serde_json::{json, Value};

static DATETIME_SCHEMA: Lazy<ToolSchema> = Lazy::new(ToolSchema::empty);

pub struct CurrentDateTimeTool;

#[async_trait]
impl Tool for CurrentDateTimeTool {
    fn name(&self) -> &str {
        "current_datetime"
    }

    fn description(&self) -> &str {
        "Returns the current local date and time. Use it for questions about today, this week or upcoming dates."
    }

    fn schema(&self) -> &ToolSchema {
        &DATETIME_SCHEMA
    }

    async fn execute(&self, _args: ToolArgs) -> Result<Value, ToolError> {
        let now = Local::now();
        Ok(json!({
            "date": now.format("%Y-%m-%d").to_string(),
            "time": now.format("%H:%M:%S").to_string(),
            "iso": now.to_rfc3339(),
        }))
    }
}
