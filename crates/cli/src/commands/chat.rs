//! Chat command handler.
//!
//! Runs a multi-turn conversation, either from `--turn` arguments (scripted)
//! or from stdin (interactive).

use super::{connect, log_usage, print_fragment, print_tool_calls};
use crate::demo_tools::demo_registry;
use crate::session::{Session, SessionOptions};
use chatloop_core::{AppConfig, AppResult};
use clap::Args;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Hold a multi-turn conversation
#[derive(Args, Debug)]
pub struct ChatCommand {
    /// Scripted user turns; interactive when none are given
    #[arg(short, long = "turn")]
    pub turns: Vec<String>,

    /// Ground each turn in retrieved documents
    #[arg(long)]
    pub rag: bool,

    /// Offer the demo tools to the model
    #[arg(long)]
    pub tools: bool,

    /// Stream replies as they are generated
    #[arg(long, conflicts_with = "tools")]
    pub stream: bool,

    /// System prompt
    #[arg(short, long)]
    pub system: Option<String>,

    /// Maximum documents to retrieve per turn
    #[arg(long)]
    pub max_results: Option<usize>,
}

impl ChatCommand {
    /// Execute the chat command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing chat command");
        tracing::debug!("Chat command options: {:?}", self);

        let config = config.clone().with_chat_overrides(None, None, self.max_results);
        config.validate()?;

        let mut session = self.session(&config)?;

        if self.turns.is_empty() {
            run_interactive(&mut session, &config.chat.quit_token).await
        } else {
            run_scripted(&mut session, &self.turns).await
        }
    }

    fn session(&self, config: &AppConfig) -> AppResult<Session> {
        let mut options = SessionOptions::from_config(config.resolved_model(), &config.chat);
        options.system = self.system.clone();
        options.stream = self.stream;
        options.rag = self.rag;

        let mut session = Session::new(connect(config)?, options);
        if self.tools {
            session = session.with_tools(demo_registry());
        }

        Ok(session)
    }
}

/// Run one turn and print it. Streamed replies are printed as they arrive.
pub async fn run_and_print(session: &mut Session, input: &str) -> AppResult<()> {
    let streaming = session.options().stream;
    print!("Assistant: ");
    std::io::stdout().flush().ok();

    let outcome = session.turn(input, print_fragment).await;
    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(e) => {
            println!();
            return Err(e);
        }
    };

    if streaming {
        println!();
    } else {
        println!("{}", outcome.reply);
    }

    print_tool_calls(&outcome);
    if !outcome.retrieved.is_empty() {
        tracing::debug!("Context documents: {}", outcome.retrieved.join(", "));
    }
    log_usage(&outcome);

    Ok(())
}

/// Play a fixed list of user turns. The first error aborts the run.
pub async fn run_scripted(session: &mut Session, turns: &[String]) -> AppResult<()> {
    for turn in turns {
        println!("You: {}", turn);
        run_and_print(session, turn).await?;
        println!();
    }

    tracing::info!("Conversation finished after {} turns", session.conversation().turns());
    Ok(())
}

/// Read turns from stdin until the quit token or end of input.
///
/// A failed turn is reported and the loop continues; only fatal errors end
/// the session.
pub async fn run_interactive(session: &mut Session, quit_token: &str) -> AppResult<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Chat started. Type '{}' to exit.", quit_token);

    loop {
        print!("\nYou: ");
        std::io::stdout().flush().ok();

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        if is_quit(input, quit_token) {
            println!("Goodbye!");
            break;
        }

        if let Err(e) = run_and_print(session, input).await {
            if e.is_fatal() {
                return Err(e);
            }
            tracing::warn!("Turn failed: {}", e);
            eprintln!("Error: {}", e);
        }
    }

    tracing::info!("Conversation finished after {} turns", session.conversation().turns());
    Ok(())
}

fn is_quit(input: &str, quit_token: &str) -> bool {
    input.eq_ignore_ascii_case(quit_token)
}
