//! Model gateway abstraction and request/response types.
//!
//! This module defines the core abstractions for talking to chat-completion
//! providers. A call yields one of three shapes: a final assistant message,
//! a set of tool-call requests, or (via [`LlmClient::stream`]) a lazy stream
//! of text fragments.

use crate::message::{Message, ToolCall};
use crate::tools::ToolSchema;
use chatloop_core::{AppError, AppResult};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// Chat completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Model identifier (e.g., "claude-sonnet-4-20250514", "gpt-4o")
    pub model: String,

    /// Conversation history, oldest first
    pub messages: Vec<Message>,

    /// System content for this call (instructions, retrieved context)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Tools the model may request
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolSchema>,

    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Temperature for sampling (0.0 - 2.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Deliver the reply as a stream of fragments
    #[serde(default)]
    pub stream: bool,
}

impl ChatRequest {
    /// Create a new request with required fields.
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            system: None,
            tools: Vec::new(),
            max_tokens: None,
            temperature: None,
            stream: false,
        }
    }

    /// Single-message request.
    pub fn from_prompt(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self::new(model, vec![Message::user(prompt)])
    }

    /// Enable streaming for this request.
    pub fn with_streaming(mut self) -> Self {
        self.stream = true;
        self
    }

    /// Set the maximum tokens to generate.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the temperature for sampling.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the system content.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Offer tools to the model.
    pub fn with_tools(mut self, tools: Vec<ToolSchema>) -> Self {
        self.tools = tools;
        self
    }

    /// System text from `system` plus any system-role messages, in that order.
    ///
    /// Providers with a dedicated system field use this to fold both sources
    /// into one value.
    pub fn combined_system(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .system
            .as_deref()
            .into_iter()
            .chain(
                self.messages
                    .iter()
                    .filter(|m| m.role == crate::Role::System)
                    .map(|m| m.content.as_str()),
            )
            .filter(|s| !s.trim().is_empty())
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n\n"))
        }
    }
}

/// What the model produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// A final assistant message
    Message(Message),

    /// The model wants tools run before it answers
    ToolCalls {
        /// Any text produced alongside the calls
        text: String,
        calls: Vec<ToolCall>,
    },
}

impl Reply {
    /// The assistant message to record in history.
    pub fn to_message(&self) -> Message {
        match self {
            Self::Message(message) => message.clone(),
            Self::ToolCalls { text, calls } => {
                Message::assistant_with_tools(text.clone(), calls.clone())
            }
        }
    }
}

/// Chat completion response.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub reply: Reply,

    /// Model that generated the response
    pub model: String,

    /// Usage statistics
    pub usage: LlmUsage,

    /// Provider stop reason ("end_turn", "stop", "tool_use", ...)
    pub stop_reason: Option<String>,
}

impl ChatResponse {
    /// Final-message response.
    pub fn message(model: impl Into<String>, content: impl Into<String>, usage: LlmUsage) -> Self {
        Self {
            reply: Reply::Message(Message::assistant(content)),
            model: model.into(),
            usage,
            stop_reason: None,
        }
    }

    /// Text of the reply (for tool-call replies, any accompanying text).
    pub fn text(&self) -> &str {
        match &self.reply {
            Reply::Message(message) => &message.content,
            Reply::ToolCalls { text, .. } => text,
        }
    }

    pub fn tool_calls(&self) -> &[ToolCall] {
        match &self.reply {
            Reply::Message(_) => &[],
            Reply::ToolCalls { calls, .. } => calls,
        }
    }
}

/// Token usage statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LlmUsage {
    /// Tokens in the prompt
    #[serde(default)]
    pub prompt_tokens: u32,

    /// Tokens in the completion
    #[serde(default)]
    pub completion_tokens: u32,

    /// Total tokens used
    #[serde(default)]
    pub total_tokens: u32,
}

impl LlmUsage {
    /// Create usage stats from prompt and completion token counts.
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// A chunk from a streaming response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmStreamChunk {
    /// Incremental text content
    pub content: String,

    /// Model generating the stream
    pub model: String,

    /// Whether this is the final chunk
    #[serde(default)]
    pub done: bool,

    /// Usage statistics (only in final chunk)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<LlmUsage>,
}

impl LlmStreamChunk {
    pub fn text(model: &str, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: model.to_string(),
            done: false,
            usage: None,
        }
    }

    pub fn finished(model: &str, usage: Option<LlmUsage>) -> Self {
        Self {
            content: String::new(),
            model: model.to_string(),
            done: true,
            usage,
        }
    }
}

/// Stream of response chunks. Forward-only and single-consumer.
pub type LlmStream = Pin<Box<dyn Stream<Item = AppResult<LlmStreamChunk>> + Send>>;

/// Text reassembled from a drained stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamedReply {
    pub content: String,
    pub usage: Option<LlmUsage>,
}

/// Drain a stream, handing each non-empty fragment to `on_fragment` as it
/// arrives, and return the concatenated text.
///
/// Stops at the first chunk marked `done`. A stream that ends without one was
/// cut off, and is an error like any other transport failure. The first
/// error aborts the drain and is returned.
pub async fn drain_stream<F>(mut stream: LlmStream, mut on_fragment: F) -> AppResult<StreamedReply>
where
    F: FnMut(&str),
{
    let mut reply = StreamedReply::default();

    while let Some(result) = stream.next().await {
        let chunk = result?;

        if !chunk.content.is_empty() {
            on_fragment(&chunk.content);
            reply.content.push_str(&chunk.content);
        }

        if chunk.usage.is_some() {
            reply.usage = chunk.usage;
        }

        if chunk.done {
            return Ok(reply);
        }
    }

    tracing::warn!(
        "Stream ended after {} characters without a completion signal",
        reply.content.len()
    );
    Err(AppError::Llm("stream ended before completion".to_string()))
}

/// Drain a stream without observing fragments.
pub async fn collect_stream(stream: LlmStream) -> AppResult<StreamedReply> {
    drain_stream(stream, |_| {}).await
}

/// Trait for chat-completion providers.
///
/// Abstracts the vendor (Anthropic, OpenAI, Ollama, ...) behind one
/// interface for complete and streaming calls.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Get the provider name (e.g., "claude", "openai").
    fn provider_name(&self) -> &str;

    /// Perform a non-streaming completion.
    ///
    /// # Returns
    /// Either a final message or the tool calls the model requested
    async fn complete(&self, request: &ChatRequest) -> AppResult<ChatResponse>;

    /// Perform a streaming completion.
    ///
    /// Tool schemas on the request are not sent; streamed turns are text only.
    ///
    /// # Returns
    /// A stream of text chunks, terminated by a chunk with `done` set
    async fn stream(&self, request: &ChatRequest) -> AppResult<LlmStream>;
}

/// Map a non-success HTTP response into a gateway error.
pub(crate) async fn status_error(provider: &str, response: reqwest::Response) -> AppError {
    let status = response.status();
    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    tracing::warn!("{} API error ({}): {}", provider, status, error_text);

    let hint = match status.as_u16() {
        401 | 403 => " (check the API key)",
        429 => " (rate limited)",
        _ => "",
    };

    AppError::Llm(format!(
        "{} API error ({}){}: {}",
        provider, status, hint, error_text
    ))
}
