//! Prompt builder for rendering templates.

use crate::types::{BuiltPrompt, BuiltPromptMetadata, PromptDefinition};
use chatloop_core::{AppError, AppResult};
use handlebars::Handlebars;
use std::collections::HashMap;

/// Build a prompt from a definition and input variables.
///
/// Renders the user template and, when present, the system template with
/// the same variables.
///
/// # Example
/// ```no_run
/// use chatloop_prompt::{build_prompt, PromptDefinition};
/// use std::collections::HashMap;
///
/// # fn example(def: PromptDefinition) -> Result<(), Box<dyn std::error::Error>> {
/// let mut vars = HashMap::new();
/// vars.insert("input".to_string(), "Rust ownership".to_string());
///
/// let built = build_prompt(&def, vars)?;
/// println!("User prompt: {}", built.user);
/// # Ok(())
/// # }
/// ```
pub fn build_prompt(
    definition: &PromptDefinition,
    variables: HashMap<String, String>,
) -> AppResult<BuiltPrompt> {
    tracing::debug!("Building prompt: {}", definition.id);

    let user = render_template(&definition.template, &variables)?
        .trim_end()
        .to_string();

    let system = definition
        .system
        .as_deref()
        .map(|template| render_template(template, &variables))
        .transpose()?
        .map(|s| s.trim_end().to_string())
        .filter(|s| !s.is_empty());

    Ok(BuiltPrompt {
        system,
        user,
        max_tokens: definition.max_tokens,
        metadata: BuiltPromptMetadata {
            source_prompt_id: definition.id.clone(),
            resolved_variables: variables,
        },
    })
}

/// Build a prompt whose only variable is `input`.
pub fn build_with_input(definition: &PromptDefinition, input: &str) -> AppResult<BuiltPrompt> {
    let mut variables = HashMap::new();
    variables.insert("input".to_string(), input.to_string());
    build_prompt(definition, variables)
}

/// Render a Handlebars template with variables.
fn render_template(template: &str, variables: &HashMap<String, String>) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Disable HTML escaping for plain text
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    let rendered = handlebars
        .render("prompt", &variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))?;

    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_definition(system: Option<&str>) -> PromptDefinition {
        PromptDefinition {
            id: "test.prompt".to_string(),
            title: "Test".to_string(),
            api_version: "1.0".to_string(),
            system: system.map(str::to_string),
            template: "Question: {{input}}\n".to_string(),
            max_tokens: Some(64),
        }
    }

    #[test]
    fn test_render_simple_template() {
        let mut vars = HashMap::new();
        vars.insert("input".to_string(), "Hello, world!".to_string());

        let result = render_template("Question: {{input}}", &vars);
        assert_eq!(result.unwrap(), "Question: Hello, world!");
    }

    #[test]
    fn test_no_html_escaping() {
        let def = create_test_definition(None);
        let built = build_with_input(&def, "a < b && \"c\"").unwrap();
        assert_eq!(built.user, "Question: a < b && \"c\"");
    }

    #[test]
    fn test_build_prompt_with_system() {
        let def = create_test_definition(Some("You answer about {{input}}."));
        let built = build_with_input(&def, "Rust").unwrap();

        assert_eq!(built.system.as_deref(), Some("You answer about Rust."));
        assert_eq!(built.user, "Question: Rust");
        assert_eq!(built.max_tokens, Some(64));
        assert_eq!(built.metadata.source_prompt_id, "test.prompt");
        assert_eq!(built.metadata.resolved_variables["input"], "Rust");
    }

    #[test]
    fn test_render_template_missing_variable() {
        let vars = HashMap::new();
        let result = render_template("Question: {{missing}}", &vars);
        // Handlebars renders missing variables as empty string
        assert_eq!(result.unwrap(), "Question: ");
    }

    #[test]
    fn test_invalid_template_is_prompt_error() {
        let vars = HashMap::new();
        assert!(matches!(
            render_template("{{#if}}", &vars),
            Err(AppError::Prompt(_))
        ));
    }
}
