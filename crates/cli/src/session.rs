//! Conversation driver.
//!
//! A [`Session`] owns one conversation and runs turns against a model:
//! retrieve and build context (optional), call the gateway, run any
//! requested tools and call again, then record the final reply.
//!
//! A turn is staged before it is recorded. The user message and any tool
//! exchange are only appended to the conversation once the final assistant
//! reply exists, so a failed turn leaves the history exactly as it was.

use chatloop_core::{AppError, AppResult, ChatConfig};
use chatloop_knowledge::{ContextBuilder, DocumentStore, Retriever};
use chatloop_llm::{
    drain_stream, ChatRequest, Conversation, LlmClient, LlmUsage, Message, Reply, ToolCall,
    ToolRegistry, ToolResult,
};
use std::sync::Arc;
use tracing::Instrument;

/// Per-session call settings.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub model: String,

    /// Base system prompt, sent every turn
    pub system: Option<String>,

    pub max_tokens: u32,

    pub temperature: Option<f32>,

    /// Stream replies fragment by fragment (no tools)
    pub stream: bool,

    /// Retrieve documents and inject a context block each turn
    pub rag: bool,

    pub max_results: usize,

    /// Send only the last N turns of history
    pub max_history_turns: Option<usize>,

    pub max_tool_rounds: usize,
}

impl SessionOptions {
    pub fn from_config(model: impl Into<String>, chat: &ChatConfig) -> Self {
        Self {
            model: model.into(),
            system: None,
            max_tokens: chat.max_tokens,
            temperature: chat.temperature,
            stream: false,
            rag: false,
            max_results: chat.max_results,
            max_history_turns: chat.max_history_turns,
            max_tool_rounds: chat.max_tool_rounds,
        }
    }
}

/// One tool call and what it produced.
#[derive(Debug, Clone)]
pub struct ToolExchange {
    pub call: ToolCall,
    pub result: ToolResult,
}

/// What happened during one turn.
#[derive(Debug, Clone, Default)]
pub struct TurnOutcome {
    /// Final assistant text
    pub reply: String,

    /// Titles of the documents injected as context
    pub retrieved: Vec<String>,

    pub tools: Vec<ToolExchange>,

    /// Token usage summed over every model call of the turn
    pub usage: LlmUsage,

    /// Whether the reply was delivered as fragments
    pub streamed: bool,
}

/// A single conversation with one model.
pub struct Session {
    client: Arc<dyn LlmClient>,
    options: SessionOptions,
    conversation: Conversation,
    store: DocumentStore,
    retriever: Retriever,
    context: ContextBuilder,
    tools: ToolRegistry,
}

impl Session {
    /// Create a session over the sample document store with no tools.
    pub fn new(client: Arc<dyn LlmClient>, options: SessionOptions) -> Self {
        let retriever = Retriever::new(options.max_results);

        Self {
            client,
            options,
            conversation: Conversation::new(),
            store: DocumentStore::sample(),
            retriever,
            context: ContextBuilder::new(),
            tools: ToolRegistry::new(),
        }
    }

    #[cfg(test)]
    pub fn with_store(mut self, store: DocumentStore) -> Self {
        self.store = store;
        self
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Run one turn.
    ///
    /// When streaming, `on_fragment` sees every text fragment as it arrives.
    ///
    /// # Errors
    /// Gateway failures, an empty final reply and a runaway tool loop abort
    /// the turn; the conversation is left unchanged.
    pub async fn turn<F>(&mut self, input: &str, on_fragment: F) -> AppResult<TurnOutcome>
    where
        F: FnMut(&str),
    {
        let span = tracing::debug_span!("turn", index = self.conversation.turns() + 1);
        self.run_turn(input, on_fragment).instrument(span).await
    }

    async fn run_turn<F>(&mut self, input: &str, mut on_fragment: F) -> AppResult<TurnOutcome>
    where
        F: FnMut(&str),
    {
        let input = input.trim();
        if input.is_empty() {
            return Err(AppError::Other("Cannot send an empty message".to_string()));
        }

        let mut outcome = TurnOutcome::default();
        let system = self.system_for(input, &mut outcome);
        let mut staged = vec![Message::user(input)];

        let reply = if self.options.stream {
            let request = self.request(&staged, system.as_deref()).with_streaming();
            let stream = self.client.stream(&request).await?;
            let streamed = drain_stream(stream, &mut on_fragment).await?;

            outcome.streamed = true;
            outcome.usage = streamed.usage.unwrap_or_default();
            Message::assistant(streamed.content)
        } else {
            self.complete_with_tools(&mut staged, system.as_deref(), &mut outcome)
                .await?
        };

        if reply.content.trim().is_empty() {
            tracing::warn!("Model returned an empty reply; turn not recorded");
            return Err(AppError::Llm("model returned an empty reply".to_string()));
        }

        outcome.reply = reply.content.clone();
        self.conversation.extend(staged);
        self.conversation.append(reply);

        tracing::debug!(
            "Turn recorded; conversation has {} messages",
            self.conversation.len()
        );

        Ok(outcome)
    }

    /// System content for this turn: the base prompt, plus a context block
    /// when retrieval is enabled and found something.
    fn system_for(&self, input: &str, outcome: &mut TurnOutcome) -> Option<String> {
        let base = self
            .options
            .system
            .as_deref()
            .filter(|s| !s.trim().is_empty());

        if !self.options.rag {
            return base.map(str::to_string);
        }

        let retrieval = self.retriever.retrieve(input, &self.store);
        outcome.retrieved = retrieval.titles().into_iter().map(str::to_string).collect();

        if retrieval.is_empty() {
            tracing::info!("{}", self.context.build(&retrieval));
        } else {
            tracing::info!("Retrieved documents: {}", outcome.retrieved.join(", "));
        }

        self.context.system_prompt(base, &retrieval)
    }

    fn request(&self, staged: &[Message], system: Option<&str>) -> ChatRequest {
        let mut messages = self.conversation.recent(self.options.max_history_turns);
        messages.extend_from_slice(staged);

        let mut request =
            ChatRequest::new(&self.options.model, messages).with_max_tokens(self.options.max_tokens);

        if let Some(temperature) = self.options.temperature {
            request = request.with_temperature(temperature);
        }

        if let Some(system) = system {
            request = request.with_system(system);
        }

        request
    }

    /// Call the model until it answers with a message, running requested
    /// tools in between. Tool exchanges are staged in `staged`.
    async fn complete_with_tools(
        &self,
        staged: &mut Vec<Message>,
        system: Option<&str>,
        outcome: &mut TurnOutcome,
    ) -> AppResult<Message> {
        let schemas = self.tools.schemas();

        for round in 0..=self.options.max_tool_rounds {
            let request = self.request(staged, system).with_tools(schemas.clone());
            let response = self.client.complete(&request).await?;
            outcome.usage = add_usage(outcome.usage, response.usage);

            let (text, calls) = match response.reply {
                Reply::Message(message) => return Ok(message),
                Reply::ToolCalls { text, calls } => (text, calls),
            };

            if round == self.options.max_tool_rounds {
                break;
            }

            tracing::info!(
                "Round {}: model requested {} tool call(s)",
                round + 1,
                calls.len()
            );

            staged.push(Message::assistant_with_tools(text, calls.clone()));

            for call in calls {
                let result = self.tools.execute(&call);
                staged.push(Message::tool_result(&result));
                outcome.tools.push(ToolExchange { call, result });
            }
        }

        Err(AppError::Tool(format!(
            "Model still requesting tools after {} rounds",
            self.options.max_tool_rounds
        )))
    }
}

fn add_usage(total: LlmUsage, more: LlmUsage) -> LlmUsage {
    LlmUsage::new(
        total.prompt_tokens + more.prompt_tokens,
        total.completion_tokens + more.completion_tokens,
    )
}
