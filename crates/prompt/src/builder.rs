//! Prompt builder for rendering templates.

use crate::types::{BuiltPrompt, PromptDefinition};
use docqa_core::{AppError, AppResult};
use handlebars::Handlebars;
use std::collections::HashMap;

/// Build a prompt from a definition and input variables.
///
/// Every name listed in `definition.variables` must be present in
/// `variables`. Both the system message and the user template are rendered
/// with HTML escaping disabled, so document text passes through verbatim.
///
/// # Example
/// ```no_run
/// use docqa_prompt::{build_prompt, load_builtin};
/// use std::collections::HashMap;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let def = load_builtin("qa.draft")?;
/// let mut vars = HashMap::new();
/// vars.insert("question".to_string(), "What is the refund window?".to_string());
/// vars.insert("context".to_string(), "Chunk 1 (page=2): Refunds within 30 days.".to_string());
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

    if let Some(missing) = definition
        .variables
        .iter()
        .find(|name| !variables.contains_key(name.as_str()))
    {
        return Err(AppError::Prompt(format!(
            "Prompt '{}' requires variable '{}'",
            definition.id, missing
        )));
    }

    let handlebars = registry();

    let user = render(&handlebars, &definition.template, &variables)?;
    let system = definition
        .system
        .as_deref()
        .map(|system| render(&handlebars, system, &variables))
        .transpose()?
        .map(|s| s.trim_end().to_string());

    Ok(BuiltPrompt::new(
        system,
        user,
        definition.id.clone(),
        variables,
    ))
}

fn registry() -> Handlebars<'static> {
    let mut handlebars = Handlebars::new();
    // Plain text prompts, no HTML escaping
    handlebars.register_escape_fn(handlebars::no_escape);
    handlebars
}

fn render(
    handlebars: &Handlebars<'_>,
    template: &str,
    variables: &HashMap<String, String>,
) -> AppResult<String> {
    handlebars
        .render_template(template, variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
}
