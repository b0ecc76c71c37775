//! OpenAI Chat Completions provider.
//!
//! Also works against any OpenAI-compatible endpoint via a custom base URL.
//! Tool arguments travel as a JSON-encoded string; tool results use the
//! `tool` role with a `tool_call_id`.

use crate::client::{
    status_error, ChatRequest, ChatResponse, LlmClient, LlmStream, LlmStreamChunk, LlmUsage, Reply,
};
use crate::lines::{lines, sse_data};
use crate::message::{Message, Role, ToolCall};
use chatloop_core::{AppError, AppResult};
use futures::StreamExt;
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OpenAiTool>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
}

#[derive(Debug, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<OpenAiToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    kind: String,
    function: OpenAiFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiFunctionCall {
    name: String,
    /// JSON-encoded arguments
    arguments: String,
}

#[derive(Debug, Serialize)]
struct OpenAiTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: OpenAiFunction,
}

#[derive(Debug, Serialize)]
struct OpenAiFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    model: String,
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

fn function_type() -> String {
    "function".to_string()
}

/// OpenAI (and compatible) chat client.
pub struct OpenAiClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    fn to_openai_request(&self, request: &ChatRequest, stream: bool) -> OpenAiRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);

        if let Some(system) = request.system.as_deref().filter(|s| !s.trim().is_empty()) {
            messages.push(OpenAiMessage {
                role: "system".to_string(),
                content: Some(system.to_string()),
                tool_calls: Vec::new(),
                tool_call_id: None,
            });
        }

        messages.extend(request.messages.iter().map(Self::to_api_message));

        OpenAiRequest {
            model: request.model.clone(),
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            tools: if stream {
                Vec::new()
            } else {
                request
                    .tools
                    .iter()
                    .map(|t| OpenAiTool {
                        kind: "function",
                        function: OpenAiFunction {
                            name: t.name.clone(),
                            description: t.description.clone(),
                            parameters: t.parameters.clone(),
                        },
                    })
                    .collect()
            },
            stream,
            stream_options: stream.then_some(StreamOptions {
                include_usage: true,
            }),
        }
    }

    fn to_api_message(message: &Message) -> OpenAiMessage {
        let content = match message.role {
            Role::Assistant if message.content.is_empty() && message.has_tool_calls() => None,
            _ => Some(message.content.clone()),
        };

        OpenAiMessage {
            role: message.role.as_str().to_string(),
            content,
            tool_calls: message
                .tool_calls
                .iter()
                .map(|tc| OpenAiToolCall {
                    id: tc.id.clone(),
                    kind: function_type(),
                    function: OpenAiFunctionCall {
                        name: tc.name.clone(),
                        arguments: tc.arguments.to_string(),
                    },
                })
                .collect(),
            tool_call_id: message.tool_call_id.clone(),
        }
    }

    fn convert_response(response: OpenAiResponse) -> AppResult<ChatResponse> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Llm("OpenAI response contained no choices".to_string()))?;

        let text = choice.message.content.unwrap_or_default();

        let calls = choice
            .message
            .tool_calls
            .into_iter()
            .map(|tc| {
                // Malformed argument JSON is passed on as a string; the
                // registry rejects it as a non-object.
                let arguments = serde_json::from_str(&tc.function.arguments)
                    .unwrap_or(serde_json::Value::String(tc.function.arguments));
                ToolCall::new(tc.id, tc.function.name, arguments)
            })
            .collect::<Vec<_>>();

        let reply = if calls.is_empty() {
            Reply::Message(Message::assistant(text))
        } else {
            Reply::ToolCalls { text, calls }
        };

        Ok(ChatResponse {
            reply,
            model: response.model,
            usage: response
                .usage
                .map(|u| LlmUsage::new(u.prompt_tokens, u.completion_tokens))
                .unwrap_or_default(),
            stop_reason: choice.finish_reason,
        })
    }

    async fn post(&self, body: &OpenAiRequest) -> AppResult<reqwest::Response> {
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to send request to OpenAI: {}", e)))?;

        if !response.status().is_success() {
            return Err(status_error("OpenAI", response).await);
        }

        Ok(response)
    }
}

/// Interpret one SSE line of a streaming response.
fn parse_stream_line(line: &str, model: &str) -> Option<AppResult<LlmStreamChunk>> {
    let data = sse_data(line)?;
    if data.is_empty() {
        return None;
    }

    if data == "[DONE]" {
        return Some(Ok(LlmStreamChunk::finished(model, None)));
    }

    let event: serde_json::Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            tracing::trace!("Ignoring unparseable OpenAI SSE line: {}", e);
            return None;
        }
    };

    if let Some(message) = event["error"]["message"].as_str() {
        return Some(Err(AppError::Llm(format!("OpenAI stream error: {}", message))));
    }

    let content = event["choices"][0]["delta"]["content"]
        .as_str()
        .unwrap_or_default();

    let usage = event["usage"]["prompt_tokens"].as_u64().map(|prompt| {
        LlmUsage::new(
            prompt as u32,
            event["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
        )
    });

    if content.is_empty() && usage.is_none() {
        return None;
    }

    Some(Ok(LlmStreamChunk {
        content: content.to_string(),
        model: model.to_string(),
        done: false,
        usage,
    }))
}

#[async_trait::async_trait]
impl LlmClient for OpenAiClient {
    fn provider_name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: &ChatRequest) -> AppResult<ChatResponse> {
        tracing::info!("Sending completion request to OpenAI");
        tracing::debug!(model = %request.model, messages = request.messages.len(), tools = request.tools.len());

        let body = self.to_openai_request(request, false);
        let response = self.post(&body).await?;

        let api_response: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to parse OpenAI response: {}", e)))?;

        tracing::info!("Received completion from OpenAI");

        Self::convert_response(api_response)
    }

    async fn stream(&self, request: &ChatRequest) -> AppResult<LlmStream> {
        tracing::info!("Starting streaming request to OpenAI");

        let body = self.to_openai_request(request, true);
        let response = self.post(&body).await?;
        let model = request.model.clone();

        let stream = lines(response.bytes_stream()).filter_map(move |line| {
            let chunk = match line {
                Ok(line) => parse_stream_line(&line, &model),
                Err(e) => Some(Err(e)),
            };
            futures::future::ready(chunk)
        });

        Ok(Box::pin(stream))
    }
}
