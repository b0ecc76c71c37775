//! Tools offered to the model in tool-enabled sessions.
//!
//! The lookups answer from fixed in-memory data; `add` and `multiply` work
//! on floating-point numbers.

use chatloop_core::{AppError, AppResult};
use chatloop_llm::ToolRegistry;
use serde_json::{json, Value};

/// Registry with `get_weather`, `add`, `multiply` and `get_user_info`.
pub fn demo_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register_fn(
        "get_weather",
        "Get the current weather for a specific location. Returns temperature, condition, and humidity.",
        json!({
            "type": "object",
            "properties": {
                "location": {
                    "type": "string",
                    "description": "The city name, e.g., 'Miami' or 'New York'"
                }
            },
            "required": ["location"]
        }),
        get_weather,
    );

    registry.register_fn(
        "add",
        "Add two numbers together.",
        number_pair_schema(),
        |args| Ok(json!(number_arg(args, "a")? + number_arg(args, "b")?)),
    );

    registry.register_fn(
        "multiply",
        "Multiply two numbers together.",
        number_pair_schema(),
        |args| Ok(json!(number_arg(args, "a")? * number_arg(args, "b")?)),
    );

    registry.register_fn(
        "get_user_info",
        "Get information about a user by their user ID.",
        json!({
            "type": "object",
            "properties": {
                "user_id": {
                    "type": "string",
                    "description": "The user's ID, e.g., 'user_123'"
                }
            },
            "required": ["user_id"]
        }),
        get_user_info,
    );

    registry
}

fn number_pair_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "a": {"type": "number", "description": "First number"},
            "b": {"type": "number", "description": "Second number"}
        },
        "required": ["a", "b"]
    })
}

fn number_arg(args: &Value, name: &str) -> AppResult<f64> {
    args.get(name)
        .and_then(Value::as_f64)
        .ok_or_else(|| AppError::Tool(format!("Missing number argument '{}'", name)))
}

fn string_arg<'a>(args: &'a Value, name: &str) -> AppResult<&'a str> {
    args.get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::Tool(format!("Missing string argument '{}'", name)))
}

fn get_weather(args: &Value) -> AppResult<Value> {
    let weather = match string_arg(args, "location")? {
        "Miami" => json!({"temp": 75, "condition": "Sunny", "humidity": 65}),
        "New York" => json!({"temp": 45, "condition": "Cloudy", "humidity": 70}),
        "London" => json!({"temp": 50, "condition": "Rainy", "humidity": 85}),
        _ => json!({"temp": 70, "condition": "Unknown", "humidity": 50}),
    };
    Ok(weather)
}

fn get_user_info(args: &Value) -> AppResult<Value> {
    let user = match string_arg(args, "user_id")? {
        "user_123" => json!({"name": "Max", "age": 35, "city": "Miami"}),
        "user_456" => json!({"name": "Alex", "age": 28, "city": "New York"}),
        _ => json!({"error": "User not found"}),
    };
    Ok(user)
}
