//! Ollama LLM provider implementation.
//!
//! This module provides integration with Ollama, a local LLM runtime, via its
//! chat endpoint. Ollama API: https://github.com/ollama/ollama/blob/main/docs/api.md

use crate::client::{
    status_error, ChatRequest, ChatResponse, LlmClient, LlmStream, LlmStreamChunk, LlmUsage, Reply,
};
use crate::lines::lines;
use crate::message::{Message, ToolCall};
use chatloop_core::{AppError, AppResult};
use futures::StreamExt;
use serde::{Deserialize, Serialize};

/// Ollama API request format.
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OllamaTool>,
    options: OllamaOptions,
    stream: bool,
}

#[derive(Debug, Default, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<OllamaToolCall>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaToolCall {
    function: OllamaFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaFunctionCall {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct OllamaTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: OllamaFunction,
}

#[derive(Debug, Serialize)]
struct OllamaFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

/// Ollama API response format (also one NDJSON line when streaming).
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    model: String,
    #[serde(default)]
    message: Option<OllamaMessage>,
    done: bool,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
    #[serde(default)]
    error: Option<String>,
}

impl OllamaResponse {
    fn usage(&self) -> LlmUsage {
        LlmUsage::new(
            self.prompt_eval_count.unwrap_or(0),
            self.eval_count.unwrap_or(0),
        )
    }
}

/// Ollama LLM client.
pub struct OllamaClient {
    /// Base URL for Ollama API
    base_url: String,

    /// HTTP client
    client: reqwest::Client,
}

impl OllamaClient {
    /// Create a new Ollama client with default settings.
    ///
    /// Default URL: http://localhost:11434
    pub fn new() -> Self {
        Self::with_base_url("http://localhost:11434")
    }

    /// Create a new Ollama client with a custom base URL.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Convert a ChatRequest to Ollama format.
    fn to_ollama_request(&self, request: &ChatRequest, stream: bool) -> OllamaRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);

        if let Some(system) = request.system.as_deref().filter(|s| !s.trim().is_empty()) {
            messages.push(OllamaMessage {
                role: "system".to_string(),
                content: system.to_string(),
                tool_calls: Vec::new(),
            });
        }

        messages.extend(request.messages.iter().map(|m| OllamaMessage {
            role: m.role.as_str().to_string(),
            content: m.content.clone(),
            tool_calls: m
                .tool_calls
                .iter()
                .map(|tc| OllamaToolCall {
                    function: OllamaFunctionCall {
                        name: tc.name.clone(),
                        arguments: tc.arguments.clone(),
                    },
                })
                .collect(),
        }));

        OllamaRequest {
            model: request.model.clone(),
            messages,
            tools: if stream {
                Vec::new()
            } else {
                request
                    .tools
                    .iter()
                    .map(|t| OllamaTool {
                        kind: "function",
                        function: OllamaFunction {
                            name: t.name.clone(),
                            description: t.description.clone(),
                            parameters: t.parameters.clone(),
                        },
                    })
                    .collect()
            },
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
            stream,
        }
    }

    /// Convert an Ollama response to a ChatResponse.
    ///
    /// Ollama does not assign tool-call ids, so fresh ones are generated.
    fn convert_response(&self, response: OllamaResponse) -> ChatResponse {
        let usage = response.usage();
        let message = response.message.unwrap_or(OllamaMessage {
            role: "assistant".to_string(),
            content: String::new(),
            tool_calls: Vec::new(),
        });

        let calls: Vec<ToolCall> = message
            .tool_calls
            .into_iter()
            .map(|tc| {
                ToolCall::new(
                    format!("call_{}", uuid::Uuid::new_v4().simple()),
                    tc.function.name,
                    tc.function.arguments,
                )
            })
            .collect();

        let reply = if calls.is_empty() {
            Reply::Message(Message::assistant(message.content))
        } else {
            Reply::ToolCalls {
                text: message.content,
                calls,
            }
        };

        ChatResponse {
            reply,
            model: response.model,
            usage,
            stop_reason: response.done_reason,
        }
    }

    async fn post(&self, body: &OllamaRequest) -> AppResult<reqwest::Response> {
        let url = format!("{}/api/chat", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to send request to Ollama: {}", e)))?;

        if !response.status().is_success() {
            return Err(status_error("Ollama", response).await);
        }

        Ok(response)
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse one NDJSON line of a streaming response.
fn parse_stream_line(line: &str) -> Option<AppResult<LlmStreamChunk>> {
    if line.trim().is_empty() {
        return None;
    }

    let response: OllamaResponse = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(e) => {
            return Some(Err(AppError::Llm(format!(
                "Failed to parse chunk: {}",
                e
            ))))
        }
    };

    if let Some(error) = response.error {
        return Some(Err(AppError::Llm(format!("Ollama stream error: {}", error))));
    }

    let usage = response.done.then(|| response.usage());
    let content = response.message.map(|m| m.content).unwrap_or_default();

    Some(Ok(LlmStreamChunk {
        content,
        model: response.model,
        done: response.done,
        usage,
    }))
}

#[async_trait::async_trait]
impl LlmClient for OllamaClient {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, request: &ChatRequest) -> AppResult<ChatResponse> {
        tracing::info!("Sending completion request to Ollama");
        tracing::debug!(model = %request.model, messages = request.messages.len(), tools = request.tools.len());

        let body = self.to_ollama_request(request, false);
        let response = self.post(&body).await?;

        // For non-streaming, Ollama returns a single JSON object
        let ollama_response: OllamaResponse = response
            .json()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to parse Ollama response: {}", e)))?;

        tracing::info!("Received completion from Ollama");
        tracing::debug!("Done reason: {:?}", ollama_response.done_reason);

        Ok(self.convert_response(ollama_response))
    }

    async fn stream(&self, request: &ChatRequest) -> AppResult<LlmStream> {
        tracing::info!("Starting streaming request to Ollama");

        let body = self.to_ollama_request(request, true);
        let response = self.post(&body).await?;

        // Ollama sends newline-delimited JSON
        let stream = lines(response.bytes_stream()).filter_map(|line| {
            let chunk = match line {
                Ok(line) => parse_stream_line(&line),
                Err(e) => Some(Err(e)),
            };
            futures::future::ready(chunk)
        });

        Ok(Box::pin(stream))
    }
}
