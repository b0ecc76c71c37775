//! LLM provider implementations.

pub mod anthropic;
pub mod mock;
pub mod ollama;
pub mod openai;

pub use anthropic::AnthropicClient;
pub use mock::MockClient;
pub use ollama::OllamaClient;
pub use openai::OpenAiClient;
