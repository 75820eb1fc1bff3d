//! Prompt loader for YAML prompt definitions.
//!
//! Built-in prompts ship inside the binary. A workspace may override any of
//! them by dropping `<id>.yml` into `.docqa/prompts/`.

use crate::types::PromptDefinition;
use docqa_core::{AppError, AppResult};
use std::path::{Path, PathBuf};

/// Prompt used by the draft agent.
pub const DRAFT_PROMPT_ID: &str = "qa.draft";

/// Prompt used by the verification agent.
pub const VERIFY_PROMPT_ID: &str = "qa.verify";

const BUILTIN_PROMPTS: [(&str, &str); 2] = [
    (DRAFT_PROMPT_ID, include_str!("../prompts/qa.draft.yml")),
    (VERIFY_PROMPT_ID, include_str!("../prompts/qa.verify.yml")),
];

/// Load a prompt definition by ID.
///
/// Looks for `.docqa/prompts/<id>.yml` in the workspace first and falls back
/// to the built-in definition of the same ID.
///
/// # Example
/// ```no_run
/// use docqa_prompt::load_prompt;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt(Path::new("."), "qa.draft")?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(workspace_path: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let prompt_file = prompts_dir(workspace_path).join(format!("{}.yml", prompt_id));

    if prompt_file.exists() {
        tracing::debug!("Loading prompt override from: {:?}", prompt_file);

        let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
            AppError::Prompt(format!(
                "Failed to read prompt file {:?}: {}",
                prompt_file, e
            ))
        })?;

        let definition = parse_prompt(&contents, &prompt_file.display().to_string())?;
        tracing::info!("Loaded prompt override: {} ({})", definition.id, definition.title);
        return Ok(definition);
    }

    load_builtin(prompt_id)
}

/// Load a built-in prompt definition.
pub fn load_builtin(prompt_id: &str) -> AppResult<PromptDefinition> {
    let (_, contents) = BUILTIN_PROMPTS
        .iter()
        .find(|(id, _)| *id == prompt_id)
        .ok_or_else(|| AppError::Prompt(format!("Unknown prompt: {}", prompt_id)))?;

    parse_prompt(contents, prompt_id)
}

/// List prompt IDs overridden in the workspace.
pub fn list_prompts(workspace_path: &Path) -> AppResult<Vec<String>> {
    let prompts_dir = prompts_dir(workspace_path);

    if !prompts_dir.exists() {
        return Ok(Vec::new());
    }

    let mut prompt_ids = Vec::new();

    for entry in walkdir::WalkDir::new(&prompts_dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("yml") {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                prompt_ids.push(stem.to_string());
            }
        }
    }

    prompt_ids.sort();
    Ok(prompt_ids)
}

fn prompts_dir(workspace_path: &Path) -> PathBuf {
    workspace_path.join(".docqa").join("prompts")
}

fn parse_prompt(contents: &str, origin: &str) -> AppResult<PromptDefinition> {
    let definition: PromptDefinition = serde_yaml::from_str(contents)
        .map_err(|e| AppError::Prompt(format!("Failed to parse prompt YAML {}: {}", origin, e)))?;

    validate_prompt(&definition)?;
    Ok(definition)
}

/// Validate a prompt definition.
fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.title.is_empty() {
        return Err(AppError::Prompt("Prompt title cannot be empty".to_string()));
    }

    if def.template.trim().is_empty() {
        return Err(AppError::Prompt(
            "Prompt template cannot be empty".to_string(),
        ));
    }

    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_override(dir: &Path, id: &str, contents: &str) {
        let prompts_dir = dir.join(".docqa/prompts");
        fs::create_dir_all(&prompts_dir).unwrap();
        fs::write(prompts_dir.join(format!("{}.yml", id)), contents).unwrap();
    }

    #[test]
    fn test_builtin_prompts_parse() {
        let draft = load_builtin(DRAFT_PROMPT_ID).unwrap();
        assert_eq!(draft.id, DRAFT_PROMPT_ID);
        assert!(draft.variables.contains(&"context".to_string()));

        let verify = load_builtin(VERIFY_PROMPT_ID).unwrap();
        assert!(verify.system.as_deref().unwrap().contains("VERDICT:"));
        assert!(verify.variables.contains(&"draft".to_string()));
    }

    #[test]
    fn test_falls_back_to_builtin() {
        let temp_dir = TempDir::new().unwrap();
        let prompt = load_prompt(temp_dir.path(), DRAFT_PROMPT_ID).unwrap();
        assert_eq!(prompt.id, DRAFT_PROMPT_ID);
    }

    #[test]
    fn test_workspace_override_wins() {
        let temp_dir = TempDir::new().unwrap();
        write_override(
            temp_dir.path(),
            DRAFT_PROMPT_ID,
            "id: qa.draft\ntitle: Custom\napiVersion: \"1.1\"\ntemplate: \"Q: {{question}}\"\n",
        );

        let prompt = load_prompt(temp_dir.path(), DRAFT_PROMPT_ID).unwrap();
        assert_eq!(prompt.title, "Custom");
        assert!(prompt.system.is_none());
    }

    #[test]
    fn test_load_unknown_prompt() {
        let temp_dir = TempDir::new().unwrap();
        assert!(load_prompt(temp_dir.path(), "nonexistent").is_err());
    }

    #[test]
    fn test_load_invalid_yaml() {
        let temp_dir = TempDir::new().unwrap();
        write_override(temp_dir.path(), "qa.verify", "invalid: yaml: content:");

        assert!(load_prompt(temp_dir.path(), "qa.verify").is_err());
    }

    #[test]
    fn test_list_prompts() {
        let temp_dir = TempDir::new().unwrap();
        assert!(list_prompts(temp_dir.path()).unwrap().is_empty());

        let body = "id: x\ntitle: X\napiVersion: \"1.0\"\ntemplate: t\n";
        write_override(temp_dir.path(), "qa.verify", body);
        write_override(temp_dir.path(), "qa.draft", body);

        let prompts = list_prompts(temp_dir.path()).unwrap();
        assert_eq!(prompts, vec!["qa.draft".to_string(), "qa.verify".to_string()]);
    }
}
