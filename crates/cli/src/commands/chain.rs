//! Chain command handler.
//!
//! Runs the prompt chains: a linear research pipeline, a support request
//! router, data analysis, iterative refinement and multi-perspective
//! analysis.

use super::{connect, print_fragment};
use crate::chain::{steps_json, ChainRunner, StepOutput};
use chatloop_core::{AppConfig, AppError, AppResult};
use chatloop_prompt::list_prompts;
use clap::{Args, Subcommand};
use std::path::PathBuf;

/// Run a multi-step prompt chain
#[derive(Args, Debug)]
pub struct ChainCommand {
    #[command(subcommand)]
    pub action: ChainAction,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum ChainAction {
    /// Research a topic, draft an article, then edit it
    Research {
        /// Topic to research
        topic: String,
    },
    /// Classify a support message and answer with the matching handler
    Support {
        /// The user's support message
        message: String,
    },
    /// Summarize data, find patterns, draw insights and recommend actions
    Analyze {
        /// Data to analyze
        data: Option<String>,

        /// Read the data from a file
        #[arg(short, long, conflicts_with = "data")]
        file: Option<PathBuf>,
    },
    /// Critique and rewrite a text several times
    Refine {
        /// Text to improve
        text: String,

        /// Number of critique and rewrite rounds
        #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u32).range(1..=10))]
        iterations: u32,
    },
    /// Analyze a topic from technical, business and user perspectives
    Perspectives {
        /// Topic to analyze
        topic: String,
    },
    /// List the prompt ids available to chains
    Prompts,
}

impl ChainCommand {
    /// Execute the chain command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing chain command");
        tracing::debug!("Chain command options: {:?}", self);

        if let ChainAction::Prompts = self.action {
            return self.print_prompts(config);
        }

        let client = connect(config)?;
        let runner = ChainRunner::new(client.as_ref(), config.resolved_model(), &config.workspace)
            .with_defaults(config.chat.max_tokens, config.chat.temperature);

        match &self.action {
            ChainAction::Research { topic } => {
                let print_live = !self.json;
                let steps = runner
                    .research_write_edit(topic, |fragment| {
                        if print_live {
                            print_fragment(fragment);
                        }
                    })
                    .await?;

                if self.json {
                    println!("{}", serde_json::to_string_pretty(&steps_json(&steps))?);
                } else {
                    println!();
                }
            }
            ChainAction::Support { message } => {
                let outcome = runner.handle_support(message).await?;

                if self.json {
                    let output = serde_json::json!({
                        "label": outcome.label,
                        "category": outcome.category.as_str(),
                        "handler": outcome.response.prompt_id,
                        "response": outcome.response.output,
                    });
                    println!("{}", serde_json::to_string_pretty(&output)?);
                } else {
                    println!("Category: {}", outcome.category.as_str());
                    println!();
                    println!("{}", outcome.response.output);
                }
            }
            ChainAction::Analyze { data, file } => {
                let data = match (data, file) {
                    (Some(data), _) => data.clone(),
                    (None, Some(path)) => std::fs::read_to_string(path)?,
                    (None, None) => {
                        return Err(AppError::Config("No data provided".to_string()));
                    }
                };
                let steps = runner.analyze_data(&data).await?;
                self.print_steps(&steps, &["SUMMARY", "PATTERNS", "INSIGHTS", "RECOMMENDATIONS"])?;
            }
            ChainAction::Refine { text, iterations } => {
                let steps = runner.refine(text, *iterations as usize).await?;
                if self.json {
                    println!("{}", serde_json::to_string_pretty(&steps_json(&steps))?);
                } else if let Some(last) = steps.last() {
                    println!("{}", last.output);
                }
            }
            ChainAction::Perspectives { topic } => {
                let steps = runner.perspectives(topic).await?;
                self.print_steps(&steps, &["TECHNICAL", "BUSINESS", "USER", "SYNTHESIS"])?;
            }
            ChainAction::Prompts => {}
        }

        Ok(())
    }

    fn print_steps(&self, steps: &[StepOutput], headings: &[&str]) -> AppResult<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(&steps_json(steps))?);
            return Ok(());
        }

        for (heading, step) in headings.iter().zip(steps) {
            println!("{}:\n{}\n", heading, step.output);
        }
        Ok(())
    }

    fn print_prompts(&self, config: &AppConfig) -> AppResult<()> {
        let prompts = list_prompts(&config.workspace)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&prompts)?);
        } else {
            for id in prompts {
                println!("{}", id);
            }
        }
        Ok(())
    }
}
