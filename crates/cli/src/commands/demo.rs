//! Demo command handler.
//!
//! Plays a built-in scripted conversation showing one pattern at a time.

use super::chat::run_scripted;
use super::connect;
use crate::demo_tools::demo_registry;
use crate::session::{Session, SessionOptions};
use chatloop_core::{AppConfig, AppResult};
use clap::{Args, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DemoKind {
    /// Conversation memory across turns
    Memory,
    /// Answers grounded in retrieved documents
    Rag,
    /// Model-requested tool calls
    Tools,
    /// Replies printed as they are generated
    Streaming,
}

impl DemoKind {
    pub fn turns(&self) -> &'static [&'static str] {
        match self {
            Self::Memory => &[
                "Hi! My name is Alex and I love Python.",
                "What's my name?",
                "What programming language do I like?",
            ],
            Self::Rag => &[
                "What is FastAPI?",
                "Who created it?",
                "What is it built on top of?",
            ],
            Self::Tools => &["Get info for user_123 and tell me about their city's weather"],
            Self::Streaming => &["Explain Python in two sentences.", "Who created it?"],
        }
    }

    fn system(&self) -> Option<&'static str> {
        match self {
            Self::Memory => Some("You are a friendly assistant. Remember details the user shares."),
            Self::Rag => Some("You are a helpful assistant that answers questions from the provided documents."),
            Self::Tools => Some("You are a helpful assistant. Use the available tools to look up facts."),
            Self::Streaming => None,
        }
    }

    /// Session options for this demo on top of the configured defaults.
    pub fn options(&self, base: SessionOptions) -> SessionOptions {
        SessionOptions {
            system: self.system().map(str::to_string),
            rag: *self == Self::Rag,
            stream: *self == Self::Streaming,
            ..base
        }
    }
}

/// Run a built-in scripted conversation
#[derive(Args, Debug)]
pub struct DemoCommand {
    /// Which pattern to demonstrate
    #[arg(value_enum)]
    pub kind: DemoKind,
}

impl DemoCommand {
    /// Execute the demo command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Running {:?} demo", self.kind);

        let base = SessionOptions::from_config(config.resolved_model(), &config.chat);
        let mut session = Session::new(connect(config)?, self.kind.options(base));
        if self.kind == DemoKind::Tools {
            session = session.with_tools(demo_registry());
        }

        let turns: Vec<String> = self.kind.turns().iter().map(|t| t.to_string()).collect();
        run_scripted(&mut session, &turns).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatloop_core::ChatConfig;
    use chatloop_llm::MockClient;
    use std::sync::Arc;

    fn base() -> SessionOptions {
        SessionOptions::from_config("mock-echo", &ChatConfig::default())
    }

    #[test]
    fn test_only_streaming_demo_streams() {
        assert!(DemoKind::Streaming.options(base()).stream);
        assert!(!DemoKind::Tools.options(base()).stream);
        assert!(DemoKind::Rag.options(base()).rag);
        assert!(!DemoKind::Memory.options(base()).rag);
    }

    #[tokio::test]
    async fn test_rag_demo_retrieves_fastapi() {
        let options = DemoKind::Rag.options(base());
        let mut session = Session::new(Arc::new(MockClient::new()), options);

        let outcome = session.turn(DemoKind::Rag.turns()[0], |_| {}).await.unwrap();

        assert!(outcome.retrieved.iter().any(|t| t == "FastAPI Framework"));
        assert_eq!(outcome.reply, "Echo (with context): What is FastAPI?");
    }

    #[tokio::test]
    async fn test_tools_demo_runs_both_tools_offline() {
        let options = DemoKind::Tools.options(base());
        let mut session = Session::new(Arc::new(MockClient::new()), options).with_tools(demo_registry());

        let outcome = session
            .turn("Use get_user_info then get_weather", |_| {})
            .await
            .unwrap();

        let names: Vec<&str> = outcome.tools.iter().map(|t| t.call.name.as_str()).collect();
        assert_eq!(names, vec!["get_weather", "get_user_info"]);
        assert!(outcome.tools.iter().all(|t| t.result.is_error));
        assert!(outcome.reply.starts_with("Tool results: "));
    }
}
