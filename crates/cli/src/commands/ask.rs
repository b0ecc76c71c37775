//! Ask command handler.
//!
//! Sends one question as a single-turn conversation, optionally grounded in
//! the document store.

use super::{connect, log_usage, print_fragment};
use crate::session::{Session, SessionOptions, TurnOutcome};
use chatloop_core::{AppConfig, AppError, AppResult};
use clap::Args;
use std::path::PathBuf;

/// Ask a single question
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub prompt: Option<String>,

    /// Read the question from a file
    #[arg(short, long, conflicts_with = "prompt")]
    pub file: Option<PathBuf>,

    /// System prompt
    #[arg(short, long)]
    pub system: Option<String>,

    /// Stream the answer as it is generated
    #[arg(long)]
    pub stream: bool,

    /// Maximum tokens in response
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Temperature for response generation (0.0-2.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Ground the answer in retrieved documents
    #[arg(long)]
    pub rag: bool,

    /// Maximum documents to retrieve
    #[arg(long)]
    pub max_results: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let question = self.get_prompt()?;
        let config = config
            .clone()
            .with_chat_overrides(self.max_tokens, self.temperature, self.max_results);
        config.validate()?;

        let client = connect(&config)?;
        let mut session = Session::new(client, self.options(&config));

        let print_live = self.stream && !self.json;
        let outcome = session
            .turn(&question, |fragment| {
                if print_live {
                    print_fragment(fragment);
                }
            })
            .await?;

        if self.json {
            self.print_json(&config, session.options(), &outcome)?;
        } else if print_live {
            println!();
        } else {
            println!("{}", outcome.reply);
        }

        log_usage(&outcome);
        Ok(())
    }

    fn options(&self, config: &AppConfig) -> SessionOptions {
        let mut options = SessionOptions::from_config(config.resolved_model(), &config.chat);
        options.system = self.system.clone();
        options.stream = self.stream;
        options.rag = self.rag;
        options
    }

    fn print_json(
        &self,
        config: &AppConfig,
        options: &SessionOptions,
        outcome: &TurnOutcome,
    ) -> AppResult<()> {
        let output = serde_json::json!({
            "answer": outcome.reply,
            "model": options.model,
            "provider": config.provider_name(),
            "usage": {
                "promptTokens": outcome.usage.prompt_tokens,
                "completionTokens": outcome.usage.completion_tokens,
                "totalTokens": outcome.usage.total_tokens
            },
            "metadata": {
                "streamed": outcome.streamed,
                "documents": outcome.retrieved,
            }
        });

        let json = serde_json::to_string_pretty(&output)?;
        println!("{}", json);
        Ok(())
    }

    /// Get the question text from the argument or a file.
    fn get_prompt(&self) -> AppResult<String> {
        if let Some(ref prompt) = self.prompt {
            return Ok(prompt.clone());
        }

        match self.file {
            Some(ref path) => Ok(std::fs::read_to_string(path)?),
            None => Err(AppError::Config("No prompt provided".to_string())),
        }
    }
}
