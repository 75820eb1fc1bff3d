//! Prompt system for DocQA.
//!
//! YAML prompt definitions rendered with Handlebars. The draft and
//! verification prompts are built in and can be overridden per workspace.

pub mod builder;
pub mod loader;
pub mod types;

pub use builder::build_prompt;
pub use loader::{list_prompts, load_builtin, load_prompt, DRAFT_PROMPT_ID, VERIFY_PROMPT_ID};
pub use types::{BuiltPrompt, BuiltPromptMetadata, PromptDefinition};
