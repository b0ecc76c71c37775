//! Model gateway crate for Chatloop.
//!
//! Provides the message and conversation types, tool registry, and a
//! provider-agnostic chat client with complete, tool-calling and streaming
//! modes.
//!
//! # Providers
//! - **Claude** (Anthropic Messages API, default)
//! - **OpenAI** and compatible endpoints
//! - **Ollama**: Local LLM runtime
//! - **Mock**: deterministic offline echo
//!
//! # Example
//! ```no_run
//! use chatloop_llm::{ChatRequest, LlmClient, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = ChatRequest::from_prompt("llama3.2", "Hello, world!");
//! let response = client.complete(&request).await?;
//! println!("{}", response.text());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod conversation;
pub mod factory;
pub mod lines;
pub mod message;
pub mod providers;
pub mod tools;
pub mod types;

// Re-export main types
pub use client::{
    collect_stream, drain_stream, ChatRequest, ChatResponse, LlmClient, LlmStream,
    LlmStreamChunk, LlmUsage, Reply, StreamedReply,
};
pub use conversation::Conversation;
pub use factory::create_client;
pub use message::{Message, Role, ToolCall, ToolResult};
pub use providers::{AnthropicClient, MockClient, OllamaClient, OpenAiClient};
pub use tools::{render_output, FunctionTool, Tool, ToolRegistry, ToolSchema};
pub use types::ProviderType;
