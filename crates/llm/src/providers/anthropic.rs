//! Anthropic Messages API provider.
//!
//! - `x-api-key` and `anthropic-version` headers
//! - System prompt as a top-level field, not a message
//! - Tool use via `tool_use` / `tool_result` content blocks; results travel
//!   in a user-role message
//! - Streaming via SSE `content_block_delta` events, ended by `message_stop`

use crate::client::{
    status_error, ChatRequest, ChatResponse, LlmClient, LlmStream, LlmStreamChunk, LlmUsage, Reply,
};
use crate::lines::{lines, sse_data};
use crate::message::{Message, Role, ToolCall};
use chatloop_core::{AppError, AppResult};
use futures::StreamExt;
use serde::{Deserialize, Serialize};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MAX_TOKENS: u32 = 1024;

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<AnthropicTool>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Serialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    model: String,
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    #[serde(default)]
    usage: AnthropicUsage,
}

#[derive(Debug, Default, Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

/// Anthropic Messages API client.
pub struct AnthropicClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl AnthropicClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Create a client against a custom base URL (proxies, tests).
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    fn to_anthropic_request(&self, request: &ChatRequest, stream: bool) -> AnthropicRequest {
        AnthropicRequest {
            model: request.model.clone(),
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            messages: Self::to_api_messages(&request.messages),
            system: request.combined_system(),
            temperature: request.temperature,
            tools: if stream {
                Vec::new()
            } else {
                request
                    .tools
                    .iter()
                    .map(|t| AnthropicTool {
                        name: t.name.clone(),
                        description: t.description.clone(),
                        input_schema: t.parameters.clone(),
                    })
                    .collect()
            },
            stream,
        }
    }

    /// Convert history to content-block messages.
    ///
    /// Consecutive tool results are merged into one user message, as the
    /// API expects all results for one assistant turn together.
    fn to_api_messages(messages: &[Message]) -> Vec<AnthropicMessage> {
        let mut result: Vec<AnthropicMessage> = Vec::new();

        for msg in messages {
            match msg.role {
                Role::System => {}
                Role::User => result.push(AnthropicMessage {
                    role: "user",
                    content: vec![ContentBlock::Text {
                        text: msg.content.clone(),
                    }],
                }),
                Role::Assistant => {
                    let mut blocks = Vec::new();
                    if !msg.content.is_empty() {
                        blocks.push(ContentBlock::Text {
                            text: msg.content.clone(),
                        });
                    }
                    blocks.extend(msg.tool_calls.iter().map(|tc| ContentBlock::ToolUse {
                        id: tc.id.clone(),
                        name: tc.name.clone(),
                        input: tc.arguments.clone(),
                    }));
                    if blocks.is_empty() {
                        tracing::debug!("Skipping assistant message with no content");
                        continue;
                    }
                    result.push(AnthropicMessage {
                        role: "assistant",
                        content: blocks,
                    });
                }
                Role::Tool => {
                    let block = ContentBlock::ToolResult {
                        tool_use_id: msg.tool_call_id.clone().unwrap_or_default(),
                        content: msg.content.clone(),
                    };

                    let merge = matches!(
                        result.last(),
                        Some(last) if last.role == "user"
                            && last.content.iter().all(|b| matches!(b, ContentBlock::ToolResult { .. }))
                    );

                    match result.last_mut() {
                        Some(last) if merge => last.content.push(block),
                        _ => result.push(AnthropicMessage {
                            role: "user",
                            content: vec![block],
                        }),
                    }
                }
            }
        }

        result
    }

    fn convert_response(response: AnthropicResponse) -> ChatResponse {
        let mut text = String::new();
        let mut calls = Vec::new();

        for block in response.content {
            match block {
                ContentBlock::Text { text: t } => text.push_str(&t),
                ContentBlock::ToolUse { id, name, input } => {
                    calls.push(ToolCall::new(id, name, input))
                }
                _ => {}
            }
        }

        let reply = if calls.is_empty() {
            Reply::Message(Message::assistant(text))
        } else {
            Reply::ToolCalls { text, calls }
        };

        ChatResponse {
            reply,
            model: response.model,
            usage: LlmUsage::new(response.usage.input_tokens, response.usage.output_tokens),
            stop_reason: response.stop_reason,
        }
    }

    async fn post(&self, body: &AnthropicRequest) -> AppResult<reqwest::Response> {
        let url = format!("{}/v1/messages", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to send request to Anthropic: {}", e)))?;

        if !response.status().is_success() {
            return Err(status_error("Anthropic", response).await);
        }

        Ok(response)
    }
}

/// Interpret one SSE line of a streaming response.
///
/// Returns `None` for lines that carry no text (pings, block starts, event
/// names). Input tokens arrive with `message_start` and are threaded through
/// `input_tokens` so the final chunk can report both counts.
fn parse_stream_line(line: &str, model: &str, input_tokens: &mut u32) -> Option<AppResult<LlmStreamChunk>> {
    let data = sse_data(line)?;
    if data.is_empty() {
        return None;
    }

    let event: serde_json::Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            tracing::trace!("Ignoring unparseable Anthropic SSE line: {}", e);
            return None;
        }
    };

    match event["type"].as_str().unwrap_or("") {
        "message_start" => {
            *input_tokens = event["message"]["usage"]["input_tokens"]
                .as_u64()
                .unwrap_or(0) as u32;
            None
        }
        "content_block_delta" => event["delta"]["text"]
            .as_str()
            .map(|text| Ok(LlmStreamChunk::text(model, text))),
        "message_delta" => event["usage"]["output_tokens"].as_u64().map(|out| {
            Ok(LlmStreamChunk {
                content: String::new(),
                model: model.to_string(),
                done: false,
                usage: Some(LlmUsage::new(*input_tokens, out as u32)),
            })
        }),
        "message_stop" => Some(Ok(LlmStreamChunk::finished(model, None))),
        "error" => Some(Err(AppError::Llm(format!(
            "Anthropic stream error: {}",
            event["error"]["message"].as_str().unwrap_or("unknown")
        )))),
        _ => None,
    }
}

#[async_trait::async_trait]
impl LlmClient for AnthropicClient {
    fn provider_name(&self) -> &str {
        "claude"
    }

    async fn complete(&self, request: &ChatRequest) -> AppResult<ChatResponse> {
        tracing::info!("Sending completion request to Anthropic");
        tracing::debug!(model = %request.model, messages = request.messages.len(), tools = request.tools.len());

        let body = self.to_anthropic_request(request, false);
        let response = self.post(&body).await?;

        let api_response: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to parse Anthropic response: {}", e)))?;

        tracing::info!("Received completion from Anthropic");
        tracing::debug!("Stop reason: {:?}", api_response.stop_reason);

        Ok(Self::convert_response(api_response))
    }

    async fn stream(&self, request: &ChatRequest) -> AppResult<LlmStream> {
        tracing::info!("Starting streaming request to Anthropic");

        let body = self.to_anthropic_request(request, true);
        let response = self.post(&body).await?;

        let model = request.model.clone();
        let mut input_tokens = 0u32;

        let stream = lines(response.bytes_stream()).filter_map(move |line| {
            let chunk = match line {
                Ok(line) => parse_stream_line(&line, &model, &mut input_tokens),
                Err(e) => Some(Err(e)),
            };
            futures::future::ready(chunk)
        });

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ToolResult;
    use crate::tools::ToolSchema;

    #[test]
    fn test_client_creation() {
        let client = AnthropicClient::with_base_url("key", "http://localhost:1234/");
        assert_eq!(client.provider_name(), "claude");
        assert_eq!(client.base_url, "http://localhost:1234");
    }

    #[test]
    fn test_request_conversion_moves_system_out_of_messages() {
        let client = AnthropicClient::new("key");
        let request = ChatRequest::new(
            "claude-sonnet-4-20250514",
            vec![Message::system("history system"), Message::user("Hello")],
        )
        .with_system("context block")
        .with_temperature(0.0);

        let body = client.to_anthropic_request(&request, false);
        assert_eq!(body.messages.len(), 1);
        assert_eq!(body.messages[0].role, "user");
        assert_eq!(body.system.as_deref(), Some("context block\n\nhistory system"));
        assert_eq!(body.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(body.temperature, Some(0.0));
    }

    #[test]
    fn test_tools_sent_only_without_streaming() {
        let client = AnthropicClient::new("key");
        let request = ChatRequest::from_prompt("m", "weather?").with_tools(vec![ToolSchema {
            name: "get_weather".to_string(),
            description: "Weather".to_string(),
            parameters: serde_json::json!({"type": "object"}),
        }]);

        assert_eq!(client.to_anthropic_request(&request, false).tools.len(), 1);
        assert!(client.to_anthropic_request(&request, true).tools.is_empty());

        let json = serde_json::to_value(client.to_anthropic_request(&request, false)).unwrap();
        assert_eq!(json["tools"][0]["input_schema"]["type"], "object");
        assert!(json.get("stream").is_none());
    }

    #[test]
    fn test_tool_results_merge_into_one_user_message() {
        let call_a = ToolCall::new("a", "get_user_info", serde_json::json!({"user_id": "user_123"}));
        let call_b = ToolCall::new("b", "get_weather", serde_json::json!({"location": "Miami"}));
        let result = |id: &str| ToolResult {
            call_id: id.to_string(),
            name: "x".to_string(),
            output: "{}".to_string(),
            is_error: false,
        };

        let messages = vec![
            Message::user("Get info"),
            Message::assistant_with_tools("", vec![call_a, call_b]),
            Message::tool_result(&result("a")),
            Message::tool_result(&result("b")),
        ];

        let api = AnthropicClient::to_api_messages(&messages);
        assert_eq!(api.len(), 3);
        assert_eq!(api[1].content.len(), 2);
        assert_eq!(api[2].role, "user");
        assert_eq!(api[2].content.len(), 2);

        let json = serde_json::to_value(&api[2].content[0]).unwrap();
        assert_eq!(json["type"], "tool_result");
        assert_eq!(json["tool_use_id"], "a");
    }

    #[test]
    fn test_empty_assistant_message_is_not_sent() {
        let messages = vec![
            Message::user("Hi"),
            Message::assistant(""),
            Message::user("Still there?"),
        ];

        let api = AnthropicClient::to_api_messages(&messages);
        assert!(api.iter().all(|m| !m.content.is_empty()));
        assert!(api.iter().all(|m| m.role == "user"));
        assert_eq!(api.len(), 2);
    }

    #[test]
    fn test_convert_tool_use_response() {
        let raw = serde_json::json!({
            "model": "claude-sonnet-4-20250514",
            "stop_reason": "tool_use",
            "content": [
                {"type": "text", "text": "Let me check."},
                {"type": "tool_use", "id": "toolu_1", "name": "get_weather", "input": {"location": "Miami"}}
            ],
            "usage": {"input_tokens": 10, "output_tokens": 5}
        });

        let response: AnthropicResponse = serde_json::from_value(raw).unwrap();
        let converted = AnthropicClient::convert_response(response);

        assert_eq!(converted.text(), "Let me check.");
        assert_eq!(converted.tool_calls().len(), 1);
        assert_eq!(converted.tool_calls()[0].arguments["location"], "Miami");
        assert_eq!(converted.usage.total_tokens, 15);
        assert_eq!(converted.stop_reason.as_deref(), Some("tool_use"));
    }

    #[test]
    fn test_convert_text_response_ignores_unknown_blocks() {
        let raw = serde_json::json!({
            "model": "m",
            "stop_reason": "end_turn",
            "content": [
                {"type": "thinking", "thinking": "hmm"},
                {"type": "text", "text": "An API is an interface."}
            ]
        });

        let response: AnthropicResponse = serde_json::from_value(raw).unwrap();
        let converted = AnthropicClient::convert_response(response);
        assert_eq!(converted.reply, Reply::Message(Message::assistant("An API is an interface.")));
    }

    #[test]
    fn test_parse_stream_lines() {
        let mut input = 0;
        let start = r#"data: {"type":"message_start","message":{"usage":{"input_tokens":12}}}"#;
        assert!(parse_stream_line(start, "m", &mut input).is_none());
        assert_eq!(input, 12);

        let delta = r#"data: {"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hi"}}"#;
        let chunk = parse_stream_line(delta, "m", &mut input).unwrap().unwrap();
        assert_eq!(chunk.content, "Hi");
        assert!(!chunk.done);

        let usage = r#"data: {"type":"message_delta","delta":{"stop_reason":"end_turn"},"usage":{"output_tokens":7}}"#;
        let chunk = parse_stream_line(usage, "m", &mut input).unwrap().unwrap();
        assert_eq!(chunk.usage, Some(LlmUsage::new(12, 7)));

        let stop = r#"data: {"type":"message_stop"}"#;
        assert!(parse_stream_line(stop, "m", &mut input).unwrap().unwrap().done);

        assert!(parse_stream_line("event: ping", "m", &mut input).is_none());
    }

    #[test]
    fn test_parse_stream_error_event() {
        let mut input = 0;
        let line = r#"data: {"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        let result = parse_stream_line(line, "m", &mut input).unwrap();
        assert!(matches!(result, Err(AppError::Llm(msg)) if msg.contains("Overloaded")));
    }
}
