//! Command handlers for the chatloop CLI.
//!
//! This module organizes all CLI commands into separate submodules.

pub mod ask;
pub mod chain;
pub mod chat;
pub mod demo;
pub mod docs;

pub use ask::AskCommand;
pub use chain::ChainCommand;
pub use chat::ChatCommand;
pub use demo::DemoCommand;
pub use docs::DocsCommand;

use crate::session::TurnOutcome;
use chatloop_core::{AppConfig, AppResult};
use chatloop_llm::{create_client, LlmClient};
use std::io::Write;
use std::sync::Arc;

/// Build a client for the configured provider.
///
/// The API key is resolved first so a missing credential is reported as a
/// configuration error before anything else happens.
pub fn connect(config: &AppConfig) -> AppResult<Arc<dyn LlmClient>> {
    let api_key = config.require_api_key()?;
    let endpoint = config.endpoint();

    create_client(&config.provider_name(), endpoint.as_deref(), api_key.as_deref())
}

/// Print a streamed fragment immediately.
pub fn print_fragment(fragment: &str) {
    print!("{}", fragment);
    std::io::stdout().flush().ok();
}

/// Print the tool calls made during a turn, one line each.
pub fn print_tool_calls(outcome: &TurnOutcome) {
    for exchange in &outcome.tools {
        let status = if exchange.result.is_error { " (error)" } else { "" };
        println!(
            "  [tool] {}({}){} -> {}",
            exchange.call.name, exchange.call.arguments, status, exchange.result.output
        );
    }
}

/// Log token usage at debug level.
pub fn log_usage(outcome: &TurnOutcome) {
    tracing::debug!(
        "Token usage - Prompt: {}, Completion: {}, Total: {}",
        outcome.usage.prompt_tokens,
        outcome.usage.completion_tokens,
        outcome.usage.total_tokens
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_mock_needs_no_key() {
        let mut config = AppConfig::default();
        config.provider = "mock".to_string();

        let client = connect(&config).unwrap();
        assert_eq!(client.provider_name(), "mock");
    }

    #[test]
    fn test_connect_reports_missing_key_as_config_error() {
        let mut config = AppConfig::default();
        config.provider = "openai".to_string();
        config.api_key = None;
        config.providers.insert(
            "openai".to_string(),
            chatloop_core::ProviderSettings {
                api_key_env: Some("CHATLOOP_TEST_UNSET_KEY_VAR".to_string()),
                model: None,
                endpoint: None,
            },
        );

        match connect(&config) {
            Err(err) => {
                assert!(err.is_fatal());
                assert!(err.to_string().contains("CHATLOOP_TEST_UNSET_KEY_VAR"));
            }
            Ok(_) => panic!("Expected missing key error"),
        }
    }
}
