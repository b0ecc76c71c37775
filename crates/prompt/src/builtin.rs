//! Prompt definitions compiled into the binary.
//!
//! A workspace can override any of these by placing a file with the same id
//! under `.chatloop/prompts/`.

pub const RESEARCH: &str = "chain.research";
pub const WRITE: &str = "chain.write";
pub const EDIT: &str = "chain.edit";
pub const CLASSIFY: &str = "support.classify";
pub const BUG_REPORT: &str = "support.bug_report";
pub const FEATURE_REQUEST: &str = "support.feature_request";
pub const GENERAL: &str = "support.general";
pub const SUMMARIZE: &str = "analysis.summarize";
pub const PATTERNS: &str = "analysis.patterns";
pub const INSIGHTS: &str = "analysis.insights";
pub const RECOMMEND: &str = "analysis.recommend";
pub const CRITIQUE: &str = "refine.critique";
pub const IMPROVE: &str = "refine.improve";
pub const TECHNICAL: &str = "perspective.technical";
pub const BUSINESS: &str = "perspective.business";
pub const USER_VIEW: &str = "perspective.user";
pub const SYNTHESIZE: &str = "perspective.synthesize";

const BUILTINS: &[(&str, &str)] = &[
    (
        RESEARCH,
        r#"
id: chain.research
title: Research a topic
apiVersion: "1.0"
maxTokens: 1024
template: |
  Research this topic and provide:
  - 5 key facts
  - Main benefits
  - Common use cases
  - Important considerations

  Topic: {{input}}

  Be concise and factual.
"#,
    ),
    (
        WRITE,
        r#"
id: chain.write
title: Write a draft from research
apiVersion: "1.0"
maxTokens: 1024
template: |
  Based on this research, write a 200-word article:

  {{input}}

  Make it engaging and accessible to beginners.
"#,
    ),
    (
        EDIT,
        r#"
id: chain.edit
title: Edit a draft
apiVersion: "1.0"
maxTokens: 1024
template: |
  Edit this article for clarity and flow:

  {{input}}

  Improve readability while keeping the same length.
  Output ONLY the final article, no commentary.
"#,
    ),
    (
        CLASSIFY,
        r#"
id: support.classify
title: Classify a support request
apiVersion: "1.0"
maxTokens: 100
template: |
  Classify this user message into ONE category:
  - bug_report
  - feature_request
  - how_to_question
  - billing_issue

  User message: {{input}}

  Output ONLY the category name, nothing else.
"#,
    ),
    (
        BUG_REPORT,
        r#"
id: support.bug_report
title: Respond to a bug report
apiVersion: "1.0"
maxTokens: 500
system: You're a support engineer.
template: |
  Respond to this bug report:

  {{input}}

  1. Acknowledge the issue
  2. Ask for reproduction steps
  3. Provide a temporary workaround if possible
"#,
    ),
    (
        FEATURE_REQUEST,
        r#"
id: support.feature_request
title: Respond to a feature request
apiVersion: "1.0"
maxTokens: 500
system: You're a product manager.
template: |
  Respond to this feature request:

  {{input}}

  1. Thank them for the suggestion
  2. Explain if this is on the roadmap
  3. Ask for more details about their use case
"#,
    ),
    (
        GENERAL,
        r#"
id: support.general
title: General support response
apiVersion: "1.0"
maxTokens: 500
system: You're a helpful support agent.
template: |
  Respond to:

  {{input}}

  Be friendly, helpful, and provide actionable next steps.
"#,
    ),
    (
        SUMMARIZE,
        r#"
id: analysis.summarize
title: Summarize data
apiVersion: "1.0"
maxTokens: 500
template: |
  Summarize this data in 2-3 sentences:

  {{input}}
"#,
    ),
    (
        PATTERNS,
        r#"
id: analysis.patterns
title: Find patterns in data
apiVersion: "1.0"
maxTokens: 500
template: |
  Based on this data, identify 3 key patterns or trends:

  {{input}}

  List them as bullet points.
"#,
    ),
    (
        INSIGHTS,
        r#"
id: analysis.insights
title: Draw insights from a summary and patterns
apiVersion: "1.0"
maxTokens: 500
template: |
  Given this summary and patterns, what are 2 key insights?

  Summary: {{summary}}

  Patterns: {{patterns}}
"#,
    ),
    (
        RECOMMEND,
        r#"
id: analysis.recommend
title: Recommend actions from insights
apiVersion: "1.0"
maxTokens: 500
template: |
  Based on these insights, provide 3 actionable recommendations:

  {{input}}
"#,
    ),
    (
        CRITIQUE,
        r#"
id: refine.critique
title: Critique a text
apiVersion: "1.0"
maxTokens: 500
template: |
  Critique this text and suggest 2-3 specific improvements:

  {{input}}

  Focus on clarity, engagement, and accuracy.
"#,
    ),
    (
        IMPROVE,
        r#"
id: refine.improve
title: Improve a text from a critique
apiVersion: "1.0"
maxTokens: 1000
template: |
  Improve this text based on the critique:

  Original text:
  {{text}}

  Critique:
  {{critique}}

  Provide the improved version.
"#,
    ),
    (
        TECHNICAL,
        r#"
id: perspective.technical
title: Technical perspective
apiVersion: "1.0"
maxTokens: 300
template: |
  Analyze {{input}} from a technical perspective. What are the technical considerations?
"#,
    ),
    (
        BUSINESS,
        r#"
id: perspective.business
title: Business perspective
apiVersion: "1.0"
maxTokens: 300
template: |
  Analyze {{input}} from a business perspective. What are the ROI and business considerations?
"#,
    ),
    (
        USER_VIEW,
        r#"
id: perspective.user
title: End-user perspective
apiVersion: "1.0"
maxTokens: 300
template: |
  Analyze {{input}} from an end-user perspective. What do users care about?
"#,
    ),
    (
        SYNTHESIZE,
        r#"
id: perspective.synthesize
title: Combine perspectives
apiVersion: "1.0"
maxTokens: 1000
template: |
  Synthesize these three perspectives into a comprehensive analysis:

  Technical: {{technical}}

  Business: {{business}}

  User: {{user}}

  Provide a balanced view that considers all three perspectives.
"#,
    ),
];

/// Raw YAML of a built-in prompt.
pub fn builtin_source(id: &str) -> Option<&'static str> {
    BUILTINS
        .iter()
        .find(|(builtin_id, _)| *builtin_id == id)
        .map(|(_, source)| *source)
}

/// Ids of every built-in prompt.
pub fn builtin_ids() -> impl Iterator<Item = &'static str> {
    BUILTINS.iter().map(|(id, _)| *id)
}
