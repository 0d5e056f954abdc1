use crate::error::{Result, StudioError};

/// Longest accepted prompt, in characters
pub const MAX_PROMPT_CHARS: usize = 500;

/// Trim `prompt` and check it is non-empty and within [`MAX_PROMPT_CHARS`]
pub fn validate_prompt(prompt: &str) -> Result<String> {
    let trimmed = prompt.trim();
    if trimmed.is_empty() {
        return Err(StudioError::validation("Prompt cannot be empty"));
    }
    let chars = trimmed.chars().count();
    if chars > MAX_PROMPT_CHARS {
        return Err(StudioError::validation(format!(
            "Prompt is {chars} characters long, the limit is {MAX_PROMPT_CHARS}"
        )));
    }
    Ok(trimmed.to_string())
}
