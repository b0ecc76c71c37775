//! chatloop CLI
//!
//! Main entry point for the chatloop command-line tool.
//! Provides commands for multi-turn chat with memory, retrieval, tools and
//! streaming against a configurable model provider.

mod chain;
mod commands;
mod demo_tools;
mod session;
#[cfg(test)]
mod testing;

use chatloop_core::{logging, AppConfig, AppResult};
use clap::{Parser, Subcommand};
use commands::{AskCommand, ChainCommand, ChatCommand, DemoCommand, DocsCommand};
use std::path::PathBuf;

/// chatloop - conversational LLM patterns from the command line
#[derive(Parser, Debug)]
#[command(name = "chatloop")]
#[command(about = "Multi-turn LLM chat with memory, retrieval, tools and streaming", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "CHATLOOP_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "CHATLOOP_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// LLM provider (claude, openai, ollama, mock)
    #[arg(short, long, global = true, env = "CHATLOOP_PROVIDER")]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true, env = "CHATLOOP_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ask a single question
    Ask(AskCommand),

    /// Hold a multi-turn conversation
    Chat(ChatCommand),

    /// Run a built-in scripted conversation
    Demo(DemoCommand),

    /// Run a multi-step prompt chain
    Chain(ChainCommand),

    /// Inspect the document store and retrieval
    Docs(DocsCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    let config = AppConfig::load_with(cli.workspace.clone(), cli.config.clone())?.with_overrides(
        cli.workspace,
        cli.config,
        cli.provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    config.validate()?;

    tracing::info!("chatloop starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider_name());
    tracing::debug!("Model: {}", config.resolved_model());

    let command_name = match &cli.command {
        Commands::Ask(_) => "ask",
        Commands::Chat(_) => "chat",
        Commands::Demo(_) => "demo",
        Commands::Chain(_) => "chain",
        Commands::Docs(_) => "docs",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Chat(cmd) => cmd.execute(&config).await,
        Commands::Demo(cmd) => cmd.execute(&config).await,
        Commands::Chain(cmd) => cmd.execute(&config).await,
        Commands::Docs(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_scripted_chat() {
        let cli = Cli::try_parse_from([
            "chatloop", "--provider", "mock", "chat", "--rag", "--turn", "hi", "--turn", "bye",
        ])
        .unwrap();

        assert_eq!(cli.provider.as_deref(), Some("mock"));
        match cli.command {
            Commands::Chat(cmd) => {
                assert!(cmd.rag);
                assert_eq!(cmd.turns, vec!["hi", "bye"]);
            }
            other => panic!("Unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_stream_conflicts_with_tools() {
        let result = Cli::try_parse_from(["chatloop", "chat", "--tools", "--stream"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parses_chain_workflows() {
        let cli = Cli::try_parse_from(["chatloop", "chain", "refine", "Some text", "--iterations", "3"]).unwrap();
        match cli.command {
            Commands::Chain(cmd) => assert!(matches!(
                cmd.action,
                commands::chain::ChainAction::Refine { iterations: 3, .. }
            )),
            other => panic!("Unexpected command: {:?}", other),
        }

        assert!(Cli::try_parse_from(["chatloop", "chain", "refine", "x", "--iterations", "0"]).is_err());
        assert!(Cli::try_parse_from(["chatloop", "chain", "prompts", "--json"]).is_ok());
        assert!(Cli::try_parse_from(["chatloop", "chain", "perspectives", "AI chatbots"]).is_ok());
    }

    #[test]
    fn test_parses_demo_kind() {
        let cli = Cli::try_parse_from(["chatloop", "demo", "streaming"]).unwrap();
        assert!(matches!(cli.command, Commands::Demo(_)));
    }
}
