//! Deterministic offline provider.
//!
//! Needs no network or key. Replies echo the latest user message, so runs are
//! reproducible in tests and demos. When tools are offered and the last
//! message is a user message mentioning a tool by name, the mock requests
//! that tool once; after the results come back it answers with them.

use crate::client::{ChatRequest, ChatResponse, LlmClient, LlmStream, LlmStreamChunk, LlmUsage, Reply};
use crate::message::{Message, Role, ToolCall};
use chatloop_core::AppResult;

/// Offline client producing deterministic replies.
#[derive(Debug, Clone, Default)]
pub struct MockClient;

impl MockClient {
    pub fn new() -> Self {
        Self
    }

    fn reply_for(request: &ChatRequest) -> Reply {
        let last = request.messages.last();

        if last.is_some_and(|m| m.role == Role::Tool) {
            let mut results: Vec<&str> = request
                .messages
                .iter()
                .rev()
                .take_while(|m| m.role == Role::Tool)
                .map(|m| m.content.as_str())
                .collect();
            results.reverse();
            return Reply::Message(Message::assistant(format!(
                "Tool results: {}",
                results.join("; ")
            )));
        }

        let prompt = last
            .filter(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("");

        let calls: Vec<ToolCall> = request
            .tools
            .iter()
            .filter(|t| prompt.contains(t.name.as_str()))
            .enumerate()
            .map(|(i, t)| ToolCall::new(format!("mock_call_{}", i + 1), t.name.clone(), serde_json::json!({})))
            .collect();

        if !calls.is_empty() {
            return Reply::ToolCalls {
                text: String::new(),
                calls,
            };
        }

        let context = if request.combined_system().is_some() {
            " (with context)"
        } else {
            ""
        };

        Reply::Message(Message::assistant(format!("Echo{}: {}", context, prompt)))
    }

    fn usage_for(request: &ChatRequest, reply: &str) -> LlmUsage {
        let prompt_words: usize = request
            .messages
            .iter()
            .map(|m| m.content.split_whitespace().count())
            .sum();
        LlmUsage::new(prompt_words as u32, reply.split_whitespace().count() as u32)
    }
}

#[async_trait::async_trait]
impl LlmClient for MockClient {
    fn provider_name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: &ChatRequest) -> AppResult<ChatResponse> {
        tracing::debug!("Mock completion over {} messages", request.messages.len());

        let reply = Self::reply_for(request);
        let usage = match &reply {
            Reply::Message(m) => Self::usage_for(request, &m.content),
            Reply::ToolCalls { .. } => Self::usage_for(request, ""),
        };

        Ok(ChatResponse {
            reply,
            model: request.model.clone(),
            usage,
            stop_reason: Some("end_turn".to_string()),
        })
    }

    async fn stream(&self, request: &ChatRequest) -> AppResult<LlmStream> {
        let text_only = ChatRequest {
            tools: Vec::new(),
            ..request.clone()
        };
        let text = Self::reply_for(&text_only).to_message().content;
        let usage = Self::usage_for(request, &text);
        let model = request.model.clone();

        // Fragments keep their trailing whitespace so they concatenate back
        // to exactly the full text.
        let mut chunks: Vec<AppResult<LlmStreamChunk>> = text
            .split_inclusive(' ')
            .map(|fragment| Ok(LlmStreamChunk::text(&model, fragment)))
            .collect();
        chunks.push(Ok(LlmStreamChunk::finished(&model, Some(usage))));

        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{collect_stream, drain_stream};
    use crate::message::ToolResult;
    use crate::tools::ToolSchema;

    fn weather_tool() -> ToolSchema {
        ToolSchema {
            name: "get_weather".to_string(),
            description: "Weather".to_string(),
            parameters: serde_json::json!({"type": "object"}),
        }
    }

    #[tokio::test]
    async fn test_complete_echoes_last_user_message() {
        let client = MockClient::new();
        let request = ChatRequest::new(
            "mock-echo",
            vec![Message::user("first"), Message::assistant("Echo: first"), Message::user("second")],
        );

        let response = client.complete(&request).await.unwrap();
        assert_eq!(response.text(), "Echo: second");
    }

    #[tokio::test]
    async fn test_stream_concatenates_to_complete_text() {
        let client = MockClient::new();
        let request = ChatRequest::from_prompt("mock-echo", "Tell me a story about a robot")
            .with_system("ctx");

        let complete = client.complete(&request).await.unwrap();

        let mut fragments = 0;
        let streamed = drain_stream(client.stream(&request).await.unwrap(), |_| fragments += 1)
            .await
            .unwrap();

        assert_eq!(streamed.content, complete.text());
        assert!(fragments > 1);
    }

    #[tokio::test]
    async fn test_requests_named_tool_then_answers_with_results() {
        let client = MockClient::new();
        let mut messages = vec![Message::user("please call get_weather")];
        let request = ChatRequest::new("mock-echo", messages.clone()).with_tools(vec![weather_tool()]);

        let response = client.complete(&request).await.unwrap();
        let calls = response.tool_calls().to_vec();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "get_weather");

        messages.push(response.reply.to_message());
        messages.push(Message::tool_result(&ToolResult {
            call_id: calls[0].id.clone(),
            name: "get_weather".to_string(),
            output: "sunny".to_string(),
            is_error: false,
        }));

        let request = ChatRequest::new("mock-echo", messages).with_tools(vec![weather_tool()]);
        let response = client.complete(&request).await.unwrap();
        assert!(response.tool_calls().is_empty());
        assert_eq!(response.text(), "Tool results: sunny");
    }

    #[tokio::test]
    async fn test_stream_never_requests_tools() {
        let client = MockClient::new();
        let request = ChatRequest::from_prompt("mock-echo", "get_weather now").with_tools(vec![weather_tool()]);

        let streamed = collect_stream(client.stream(&request).await.unwrap()).await.unwrap();
        assert_eq!(streamed.content, "Echo: get_weather now");
    }
}
