//! Stub gateways for driver tests.

use chatloop_core::{AppError, AppResult};
use chatloop_llm::{ChatRequest, ChatResponse, LlmClient, LlmStream, LlmStreamChunk, LlmUsage, Reply};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Replies computed from the request; streams split the reply into words.
pub struct FnClient {
    reply: Box<dyn Fn(&ChatRequest) -> String + Send + Sync>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl FnClient {
    pub fn new<F>(reply: F) -> Self
    where
        F: Fn(&ChatRequest) -> String + Send + Sync + 'static,
    {
        Self {
            reply: Box::new(reply),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every request seen so far, in call order.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl LlmClient for FnClient {
    fn provider_name(&self) -> &str {
        "stub"
    }

    async fn complete(&self, request: &ChatRequest) -> AppResult<ChatResponse> {
        self.requests.lock().unwrap().push(request.clone());
        let text = (self.reply)(request);
        Ok(ChatResponse::message(&request.model, text, LlmUsage::new(1, 1)))
    }

    async fn stream(&self, request: &ChatRequest) -> AppResult<LlmStream> {
        self.requests.lock().unwrap().push(request.clone());
        let text = (self.reply)(request);

        let mut chunks: Vec<AppResult<LlmStreamChunk>> = text
            .split_inclusive(' ')
            .map(|f| Ok(LlmStreamChunk::text(&request.model, f)))
            .collect();
        chunks.push(Ok(LlmStreamChunk::finished(&request.model, None)));

        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}

/// Returns pre-recorded replies in order.
pub struct ScriptedClient {
    replies: Mutex<VecDeque<AppResult<Reply>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedClient {
    pub fn new(replies: Vec<AppResult<Reply>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl LlmClient for ScriptedClient {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &ChatRequest) -> AppResult<ChatResponse> {
        self.requests.lock().unwrap().push(request.clone());

        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AppError::Llm("script exhausted".to_string())))?;

        Ok(ChatResponse {
            reply,
            model: request.model.clone(),
            usage: LlmUsage::default(),
            stop_reason: None,
        })
    }

    async fn stream(&self, _request: &ChatRequest) -> AppResult<LlmStream> {
        Err(AppError::Llm("scripted client does not stream".to_string()))
    }
}
