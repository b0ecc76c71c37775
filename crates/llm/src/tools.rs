//! Tool schemas, the tool registry and tool execution.
//!
//! The model never runs code itself: it asks for a tool by name, the
//! registry runs the matching local function, and the result goes back into
//! the conversation. Every failure on this path (unknown tool, missing or
//! mistyped argument, handler error) becomes an error *result* for the model
//! to react to, never an `Err` for the caller.

use crate::message::{ToolCall, ToolResult};
use chatloop_core::AppResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Description of a callable function, sent to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,

    pub description: String,

    /// JSON Schema object describing the parameters
    pub parameters: Value,
}

/// A locally executable function the model may request.
pub trait Tool: Send + Sync {
    /// Unique tool name (e.g., "get_weather").
    fn name(&self) -> &str;

    /// What the tool does, for the model.
    fn description(&self) -> &str;

    /// JSON Schema of the tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Run the tool with already validated arguments.
    fn call(&self, arguments: &Value) -> AppResult<Value>;

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

type Handler = Box<dyn Fn(&Value) -> AppResult<Value> + Send + Sync>;

/// A [`Tool`] backed by a closure.
pub struct FunctionTool {
    name: String,
    description: String,
    parameters: Value,
    handler: Handler,
}

impl FunctionTool {
    pub fn new<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
        handler: F,
    ) -> Self
    where
        F: Fn(&Value) -> AppResult<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            handler: Box::new(handler),
        }
    }
}

impl Tool for FunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        self.parameters.clone()
    }

    fn call(&self, arguments: &Value) -> AppResult<Value> {
        (self.handler)(arguments)
    }
}

/// Static registry of tools, in registration order.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        if let Some(slot) = self.tools.iter_mut().find(|t| t.name() == tool.name()) {
            tracing::debug!("Replacing tool: {}", tool.name());
            *slot = tool;
        } else {
            self.tools.push(tool);
        }
    }

    /// Register a closure as a tool.
    pub fn register_fn<F>(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
        handler: F,
    ) where
        F: Fn(&Value) -> AppResult<Value> + Send + Sync + 'static,
    {
        self.register(Box::new(FunctionTool::new(
            name,
            description,
            parameters,
            handler,
        )));
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    /// Schemas of every registered tool, for the model request.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.iter().map(|t| t.schema()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Execute one tool call, always producing a result.
    pub fn execute(&self, call: &ToolCall) -> ToolResult {
        let Some(tool) = self.get(&call.name) else {
            tracing::warn!("Model requested unknown tool: {}", call.name);
            return error_result(call, format!("Unknown tool: {}", call.name));
        };

        if let Err(problem) = check_arguments(&tool.parameters_schema(), &call.arguments) {
            tracing::warn!("Rejected arguments for {}: {}", call.name, problem);
            return error_result(call, problem);
        }

        tracing::debug!("Calling tool {} with {}", call.name, call.arguments);

        match tool.call(&call.arguments) {
            Ok(value) => ToolResult {
                call_id: call.id.clone(),
                name: call.name.clone(),
                output: render_output(&value),
                is_error: false,
            },
            Err(e) => {
                tracing::warn!("Tool {} failed: {}", call.name, e);
                error_result(call, e.to_string())
            }
        }
    }
}

/// Text form of a tool's return value, as handed to the model.
///
/// Strings pass through unchanged; everything else is compact JSON.
pub fn render_output(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn error_result(call: &ToolCall, message: String) -> ToolResult {
    ToolResult {
        call_id: call.id.clone(),
        name: call.name.clone(),
        output: serde_json::json!({ "error": message }).to_string(),
        is_error: true,
    }
}

/// Check arguments against the declared schema: object shape, required
/// parameters, and the declared JSON type of each known parameter. Values
/// are never coerced.
fn check_arguments(schema: &Value, arguments: &Value) -> Result<(), String> {
    let declares_object = schema.get("type").and_then(Value::as_str) == Some("object");
    if !declares_object {
        return Ok(());
    }

    let Some(args) = arguments.as_object() else {
        return Err(format!("Arguments must be an object, got {}", arguments));
    };

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for name in required.iter().filter_map(Value::as_str) {
            if !args.contains_key(name) {
                return Err(format!("Missing required argument '{}'", name));
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        for (name, value) in args {
            let declared = properties
                .get(name)
                .and_then(|p| p.get("type"))
                .and_then(Value::as_str);

            if let Some(declared) = declared {
                if !matches_type(declared, value) {
                    return Err(format!(
                        "Argument '{}' must be of type {}, got {}",
                        name, declared, value
                    ));
                }
            }
        }
    }

    Ok(())
}

fn matches_type(declared: &str, value: &Value) -> bool {
    match declared {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}
