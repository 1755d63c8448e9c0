// SPDX-License-Identifier: MIT

//! Tool trait and declared argument schemas
//!
//! Every tool declares its parameters up front. The invoker validates the
//! model's arguments against that declaration before the tool body runs, so a
//! bad call turns into an error result instead of a crash.

use crate::adk::error::ToolError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Arguments passed to a tool, keyed by parameter name
pub type ToolArgs = Map<String, Value>;

/// Trait for tools that can be called from a tool loop.
///
/// `name()`, `description()` and `schema()` return references so
/// implementations keep these values in struct fields or statics.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the tool name (must be unique within a registry)
    fn name(&self) -> &str;

    /// Returns a human-readable description of what the tool does
    fn description(&self) -> &str;

    /// Returns the declared parameter schema
    fn schema(&self) -> &ToolSchema;

    /// Execute the tool with already-validated arguments
    async fn execute(&self, args: ToolArgs) -> Result<Value, ToolError>;

    /// Signature advertised to the model
    fn signature(&self) -> ToolSignature {
        ToolSignature {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.schema().to_json_schema(),
        }
    }
}

/// Primitive parameter types a tool can declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    fn matches(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Number => value.is_number(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Array => value.is_array(),
            ParamType::Object => value.is_object(),
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
            ParamType::Object => "object",
        }
    }
}

/// One declared parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParamType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub description: String,
}

impl ParamSpec {
    /// A required parameter
    pub fn required(name: &str, kind: ParamType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: true,
            default: None,
            description: description.to_string(),
        }
    }

    /// An optional parameter, filled with `default` when absent
    pub fn optional(name: &str, kind: ParamType, default: Option<Value>, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: false,
            default,
            description: description.to_string(),
        }
    }
}

/// Declared parameter schema of a tool
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub params: Vec<ParamSpec>,
}

impl ToolSchema {
    pub fn new(params: Vec<ParamSpec>) -> Self {
        Self { params }
    }

    /// A schema with no parameters
    pub fn empty() -> Self {
        Self::default()
    }

    /// Validate raw model arguments and fill in defaults.
    ///
    /// `null` is accepted as "no arguments". Parameters the schema does not
    /// declare are passed through untouched.
    pub fn validate(&self, tool: &str, raw: &Value) -> Result<ToolArgs, ToolError> {
        let mut args = match raw {
            Value::Null => Map::new(),
            Value::Object(map) => map.clone(),
            other => {
                return Err(ToolError::validation(
                    tool,
                    format!("arguments must be a JSON object, got {}", type_name(other)),
                ))
            }
        };

        for param in &self.params {
            match args.get(&param.name) {
                Some(Value::Null) | None => {
                    if let Some(default) = &param.default {
                        args.insert(param.name.clone(), default.clone());
                    } else if param.required {
                        return Err(ToolError::validation(
                            tool,
                            format!("missing required parameter '{}'", param.name),
                        ));
                    } else {
                        args.remove(&param.name);
                    }
                }
                Some(value) if !param.kind.matches(value) => {
                    return Err(ToolError::validation(
                        tool,
                        format!(
                            "parameter '{}' expected {}, got {}",
                            param.name,
                            param.kind.as_str(),
                            type_name(value)
                        ),
                    ));
                }
                Some(_) => {}
            }
        }

        Ok(args)
    }

    /// JSON Schema form of the declaration, as sent to the model
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for param in &self.params {
            let mut prop = json!({
                "type": param.kind.as_str(),
                "description": param.description,
            });
            if let Some(default) = &param.default {
                prop["default"] = default.clone();
            }
            properties.insert(param.name.clone(), prop);
            if param.required {
                required.push(Value::String(param.name.clone()));
            }
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// Tool signature handed to the model capability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSignature {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
