//! Multi-step prompt workflows.
//!
//! Each step is an independent model call built from a prompt definition;
//! one step's output becomes the next step's input. No conversation is kept
//! between steps. Steps that do not depend on each other run concurrently.

use chatloop_core::AppResult;
use chatloop_llm::{drain_stream, ChatRequest, LlmClient, LlmUsage};
use chatloop_prompt::{build_prompt, builtin, load_prompt, BuiltPrompt};
use serde_json::json;
use std::collections::HashMap;
use std::path::PathBuf;

/// Output of one chain step.
#[derive(Debug, Clone)]
pub struct StepOutput {
    pub prompt_id: String,
    pub output: String,
    pub usage: LlmUsage,
}

/// Categories a support request can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupportCategory {
    BugReport,
    FeatureRequest,
    HowToQuestion,
    BillingIssue,
    Unrecognized,
}

impl SupportCategory {
    /// Parse a classifier label, tolerating case, quotes and trailing
    /// punctuation.
    pub fn parse(label: &str) -> Self {
        let cleaned = label
            .trim()
            .trim_matches(|c: char| !c.is_alphanumeric() && c != '_')
            .to_lowercase();

        match cleaned.as_str() {
            "bug_report" => Self::BugReport,
            "feature_request" => Self::FeatureRequest,
            "how_to_question" => Self::HowToQuestion,
            "billing_issue" => Self::BillingIssue,
            _ => Self::Unrecognized,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BugReport => "bug_report",
            Self::FeatureRequest => "feature_request",
            Self::HowToQuestion => "how_to_question",
            Self::BillingIssue => "billing_issue",
            Self::Unrecognized => "unrecognized",
        }
    }

    /// Prompt that handles this category. Everything without a dedicated
    /// handler goes to the general one.
    pub fn handler(&self) -> &'static str {
        match self {
            Self::BugReport => builtin::BUG_REPORT,
            Self::FeatureRequest => builtin::FEATURE_REQUEST,
            _ => builtin::GENERAL,
        }
    }
}

/// Result of routing a support request.
#[derive(Debug, Clone)]
pub struct SupportOutcome {
    /// Raw classifier output
    pub label: String,
    pub category: SupportCategory,
    pub response: StepOutput,
}

/// Runs prompt chains against one client.
pub struct ChainRunner<'a> {
    client: &'a dyn LlmClient,
    model: String,
    workspace: PathBuf,
    default_max_tokens: u32,
    temperature: Option<f32>,
}

impl<'a> ChainRunner<'a> {
    pub fn new(client: &'a dyn LlmClient, model: impl Into<String>, workspace: impl Into<PathBuf>) -> Self {
        Self {
            client,
            model: model.into(),
            workspace: workspace.into(),
            default_max_tokens: 1024,
            temperature: None,
        }
    }

    pub fn with_defaults(mut self, max_tokens: u32, temperature: Option<f32>) -> Self {
        self.default_max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    /// Research a topic, write a draft from the research, then edit the
    /// draft. The edit step is streamed through `on_fragment`.
    pub async fn research_write_edit<F>(&self, topic: &str, on_fragment: F) -> AppResult<Vec<StepOutput>>
    where
        F: FnMut(&str),
    {
        tracing::info!("Running research chain for: {}", topic);

        let research = self.step(builtin::RESEARCH, topic).await?;
        tracing::info!("Research complete ({} characters)", research.output.len());

        let draft = self.step(builtin::WRITE, &research.output).await?;
        tracing::info!("Draft complete ({} characters)", draft.output.len());

        let edited = self.streamed_step(builtin::EDIT, &draft.output, on_fragment).await?;
        tracing::info!("Editing complete");

        Ok(vec![research, draft, edited])
    }

    /// Classify a support message and answer it with the matching handler.
    pub async fn handle_support(&self, message: &str) -> AppResult<SupportOutcome> {
        let classification = self.step(builtin::CLASSIFY, message).await?;
        let label = classification.output.trim().to_string();
        let category = SupportCategory::parse(&label);

        if category == SupportCategory::Unrecognized {
            tracing::warn!("Unrecognized category '{}', using general handler", label);
        } else {
            tracing::info!("Classified as: {}", category.as_str());
        }

        let response = self.step(category.handler(), message).await?;

        Ok(SupportOutcome {
            label,
            category,
            response,
        })
    }

    /// Summarize data and find its patterns, draw insights from both, then
    /// turn the insights into recommendations.
    pub async fn analyze_data(&self, data: &str) -> AppResult<Vec<StepOutput>> {
        tracing::info!("Running data analysis chain ({} characters)", data.len());

        let (summary, patterns) = futures::try_join!(
            self.step(builtin::SUMMARIZE, data),
            self.step(builtin::PATTERNS, data),
        )?;

        let insights = self
            .step_with(
                builtin::INSIGHTS,
                vars(&[("summary", summary.output.as_str()), ("patterns", patterns.output.as_str())]),
            )
            .await?;

        let recommendations = self.step(builtin::RECOMMEND, &insights.output).await?;
        tracing::info!("Analysis complete");

        Ok(vec![summary, patterns, insights, recommendations])
    }

    /// Critique the text and rewrite it from the critique, `iterations`
    /// times. Returns every critique and rewrite in order; the last step
    /// holds the final version.
    pub async fn refine(&self, text: &str, iterations: usize) -> AppResult<Vec<StepOutput>> {
        let mut steps = Vec::with_capacity(iterations * 2);
        let mut current = text.to_string();

        for i in 0..iterations {
            tracing::info!("Refinement iteration {}/{}", i + 1, iterations);

            let critique = self.step(builtin::CRITIQUE, &current).await?;
            let improved = self
                .step_with(
                    builtin::IMPROVE,
                    vars(&[("text", current.as_str()), ("critique", critique.output.as_str())]),
                )
                .await?;

            current = improved.output.clone();
            steps.push(critique);
            steps.push(improved);
        }

        Ok(steps)
    }

    /// Analyze a topic from technical, business and end-user perspectives
    /// concurrently, then synthesize the three views.
    pub async fn perspectives(&self, topic: &str) -> AppResult<Vec<StepOutput>> {
        tracing::info!("Analyzing '{}' from multiple perspectives", topic);

        let (technical, business, user) = futures::try_join!(
            self.step(builtin::TECHNICAL, topic),
            self.step(builtin::BUSINESS, topic),
            self.step(builtin::USER_VIEW, topic),
        )?;

        let synthesis = self
            .step_with(
                builtin::SYNTHESIZE,
                vars(&[
                    ("technical", technical.output.as_str()),
                    ("business", business.output.as_str()),
                    ("user", user.output.as_str()),
                ]),
            )
            .await?;

        Ok(vec![technical, business, user, synthesis])
    }

    async fn step(&self, prompt_id: &str, input: &str) -> AppResult<StepOutput> {
        self.step_with(prompt_id, vars(&[("input", input)])).await
    }

    async fn step_with(
        &self,
        prompt_id: &str,
        variables: HashMap<String, String>,
    ) -> AppResult<StepOutput> {
        let built = self.build(prompt_id, variables)?;
        let request = self.request(&built);

        tracing::debug!("Step {} ({} chars in)", prompt_id, built.user.len());
        let response = self.client.complete(&request).await?;

        Ok(StepOutput {
            prompt_id: prompt_id.to_string(),
            output: response.text().to_string(),
            usage: response.usage,
        })
    }

    async fn streamed_step<F>(&self, prompt_id: &str, input: &str, on_fragment: F) -> AppResult<StepOutput>
    where
        F: FnMut(&str),
    {
        let built = self.build(prompt_id, vars(&[("input", input)]))?;
        let request = self.request(&built).with_streaming();

        let stream = self.client.stream(&request).await?;
        let streamed = drain_stream(stream, on_fragment).await?;

        Ok(StepOutput {
            prompt_id: prompt_id.to_string(),
            output: streamed.content,
            usage: streamed.usage.unwrap_or_default(),
        })
    }

    fn build(&self, prompt_id: &str, variables: HashMap<String, String>) -> AppResult<BuiltPrompt> {
        let definition = load_prompt(&self.workspace, prompt_id)?;
        build_prompt(&definition, variables)
    }

    fn request(&self, built: &BuiltPrompt) -> ChatRequest {
        let mut request = ChatRequest::from_prompt(&self.model, built.user.clone())
            .with_max_tokens(built.max_tokens.unwrap_or(self.default_max_tokens));

        if let Some(ref system) = built.system {
            request = request.with_system(system.clone());
        }

        if let Some(temperature) = self.temperature {
            request = request.with_temperature(temperature);
        }

        request
    }
}

fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// JSON summary of chain steps.
pub fn steps_json(steps: &[StepOutput]) -> serde_json::Value {
    json!(steps
        .iter()
        .map(|s| json!({
            "promptId": s.prompt_id,
            "output": s.output,
            "totalTokens": s.usage.total_tokens,
        }))
        .collect::<Vec<_>>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FnClient;
    use tempfile::TempDir;

    #[test]
    fn test_category_parsing() {
        assert_eq!(SupportCategory::parse("bug_report"), SupportCategory::BugReport);
        assert_eq!(SupportCategory::parse(" Feature_Request.\n"), SupportCategory::FeatureRequest);
        assert_eq!(SupportCategory::parse("`billing_issue`"), SupportCategory::BillingIssue);
        assert_eq!(SupportCategory::parse("complaint"), SupportCategory::Unrecognized);
    }

    #[test]
    fn test_routing_falls_back_to_general() {
        assert_eq!(SupportCategory::BugReport.handler(), builtin::BUG_REPORT);
        assert_eq!(SupportCategory::HowToQuestion.handler(), builtin::GENERAL);
        assert_eq!(SupportCategory::Unrecognized.handler(), builtin::GENERAL);
    }

    #[tokio::test]
    async fn test_each_step_feeds_the_next() {
        let workspace = TempDir::new().unwrap();
        let client = FnClient::new(|request| {
            let prompt = &request.messages[0].content;
            if prompt.starts_with("Research") {
                "FACTS".to_string()
            } else if prompt.starts_with("Based on this research") {
                "DRAFT".to_string()
            } else {
                "polished final article".to_string()
            }
        });

        let runner = ChainRunner::new(&client, "m", workspace.path());
        let mut streamed = String::new();
        let steps = runner
            .research_write_edit("Rust", |f| streamed.push_str(f))
            .await
            .unwrap();

        let requests = client.requests();
        assert_eq!(requests.len(), 3);
        assert!(requests[0].messages[0].content.contains("Topic: Rust"));
        assert!(requests[1].messages[0].content.contains("FACTS"));
        assert!(requests[2].messages[0].content.contains("DRAFT"));
        assert!(requests[2].stream);

        assert_eq!(steps[2].output, "polished final article");
        assert_eq!(streamed, "polished final article");
    }

    #[tokio::test]
    async fn test_support_routes_by_classification() {
        let workspace = TempDir::new().unwrap();
        let client = FnClient::new(|request| {
            if request.messages[0].content.starts_with("Classify") {
                "bug_report".to_string()
            } else {
                request.system.clone().unwrap_or_default()
            }
        });

        let runner = ChainRunner::new(&client, "m", workspace.path());
        let outcome = runner.handle_support("The app crashes on login").await.unwrap();

        assert_eq!(outcome.category, SupportCategory::BugReport);
        assert_eq!(outcome.response.prompt_id, builtin::BUG_REPORT);
        assert_eq!(outcome.response.output, "You're a support engineer.");

        let requests = client.requests();
        assert_eq!(requests[0].max_tokens, Some(100));
        assert!(requests[1].messages[0].content.contains("The app crashes on login"));
    }

    #[tokio::test]
    async fn test_unknown_category_uses_general_handler() {
        let workspace = TempDir::new().unwrap();
        let client = FnClient::new(|request| {
            if request.messages[0].content.starts_with("Classify") {
                "refund please".to_string()
            } else {
                "general answer".to_string()
            }
        });

        let runner = ChainRunner::new(&client, "m", workspace.path());
        let outcome = runner.handle_support("Where is my money?").await.unwrap();

        assert_eq!(outcome.category, SupportCategory::Unrecognized);
        assert_eq!(outcome.label, "refund please");
        assert_eq!(outcome.response.prompt_id, builtin::GENERAL);
    }

    fn prompt_of(request: &ChatRequest) -> &str {
        &request.messages[0].content
    }

    #[tokio::test]
    async fn test_analysis_combines_summary_and_patterns() {
        let workspace = TempDir::new().unwrap();
        let client = FnClient::new(|request| {
            let prompt = prompt_of(request);
            if prompt.starts_with("Summarize") {
                "SUMMARY".to_string()
            } else if prompt.starts_with("Based on this data") {
                "PATTERNS".to_string()
            } else if prompt.starts_with("Given this summary") {
                "INSIGHTS".to_string()
            } else {
                "RECOMMENDATIONS".to_string()
            }
        });

        let runner = ChainRunner::new(&client, "m", workspace.path());
        let steps = runner.analyze_data("October: $45,000").await.unwrap();

        let outputs: Vec<&str> = steps.iter().map(|s| s.output.as_str()).collect();
        assert_eq!(outputs, vec!["SUMMARY", "PATTERNS", "INSIGHTS", "RECOMMENDATIONS"]);

        let requests = client.requests();
        assert_eq!(requests.len(), 4);

        let insights = requests
            .iter()
            .find(|r| prompt_of(r).starts_with("Given this summary"))
            .unwrap();
        assert!(prompt_of(insights).contains("Summary: SUMMARY"));
        assert!(prompt_of(insights).contains("Patterns: PATTERNS"));

        let last = prompt_of(&requests[3]);
        assert!(last.starts_with("Based on these insights"));
        assert!(last.contains("INSIGHTS"));
    }

    #[tokio::test]
    async fn test_refine_feeds_each_version_forward() {
        let workspace = TempDir::new().unwrap();
        let client = FnClient::new(|request| {
            let prompt = prompt_of(request);
            if prompt.starts_with("Critique") {
                "Too short.".to_string()
            } else {
                let original = prompt
                    .split("Original text:\n")
                    .nth(1)
                    .and_then(|rest| rest.lines().next())
                    .unwrap_or_default();
                format!("better {}", original)
            }
        });

        let runner = ChainRunner::new(&client, "m", workspace.path());
        let steps = runner.refine("draft", 2).await.unwrap();

        assert_eq!(steps.len(), 4);
        assert_eq!(steps[0].prompt_id, builtin::CRITIQUE);
        assert_eq!(steps[1].prompt_id, builtin::IMPROVE);

        assert_eq!(steps[1].output, "better draft");
        assert_eq!(steps[3].output, "better better draft");

        let requests = client.requests();
        assert!(prompt_of(&requests[1]).contains("Original text:\ndraft"));
        assert!(prompt_of(&requests[1]).contains("Too short."));
        assert!(prompt_of(&requests[2]).contains("better draft"));
    }

    #[tokio::test]
    async fn test_refine_zero_iterations_makes_no_calls() {
        let workspace = TempDir::new().unwrap();
        let client = FnClient::new(|_| "unused".to_string());

        let runner = ChainRunner::new(&client, "m", workspace.path());
        assert!(runner.refine("draft", 0).await.unwrap().is_empty());
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn test_perspectives_are_synthesized() {
        let workspace = TempDir::new().unwrap();
        let client = FnClient::new(|request| {
            let prompt = prompt_of(request);
            if prompt.starts_with("Synthesize") {
                "BALANCED".to_string()
            } else if prompt.contains("technical perspective") {
                "TECH".to_string()
            } else if prompt.contains("business perspective") {
                "BIZ".to_string()
            } else {
                "USERS".to_string()
            }
        });

        let runner = ChainRunner::new(&client, "m", workspace.path());
        let steps = runner.perspectives("AI chatbots").await.unwrap();

        assert_eq!(steps.len(), 4);
        assert_eq!(steps[3].output, "BALANCED");

        let requests = client.requests();
        assert_eq!(requests.len(), 4);
        assert!(requests[..3].iter().all(|r| prompt_of(r).contains("AI chatbots")));

        let synthesis = prompt_of(&requests[3]);
        assert!(synthesis.contains("Technical: TECH"));
        assert!(synthesis.contains("Business: BIZ"));
        assert!(synthesis.contains("User: USERS"));
    }
}
