//! System-prompt rendering for personas.

use crate::types::{profile, shared_rules, AgentPersona};
use atrium_core::{AppError, AppResult};
use handlebars::Handlebars;
use std::collections::HashMap;

/// Render the system prompt for a persona with the given document context.
///
/// `context` is the citation-tagged block of retrieved excerpts; an empty
/// context is rendered as an explicit "no documents" note so the model does
/// not hallucinate sources.
pub fn render_system_prompt(persona: AgentPersona, context: &str) -> AppResult<String> {
    let context = if context.trim().is_empty() {
        "No documents available for reference."
    } else {
        context
    };

    let mut variables = HashMap::new();
    variables.insert("context".to_string(), context.to_string());
    variables.insert("rules".to_string(), shared_rules().to_string());

    render_template(profile(persona).template, &variables)
}

/// Render a Handlebars template with variables.
fn render_template(template: &str, variables: &HashMap<String, String>) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Prompts are plain text, not HTML
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("persona", template)
        .map_err(|e| AppError::Other(format!("Failed to register template: {}", e)))?;

    let rendered = handlebars
        .render("persona", &variables)
        .map_err(|e| AppError::Other(format!("Failed to render template: {}", e)))?;

    Ok(rendered)
}
