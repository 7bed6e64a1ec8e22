//! Prompt building utilities for LLM providers.

/// Append a JSON-only instruction to a prompt.
///
/// Used by providers without a native JSON response mode (Ollama) and for
/// OpenAI's system message.
pub fn build_json_instruction_prompt(user_prompt: &str, json_mode: bool) -> String {
    if !json_mode {
        return user_prompt.to_string();
    }

    format!(
        "{}\n\n---\n\nRespond ONLY with valid JSON, no explanation and no markdown fences.",
        user_prompt
    )
}
