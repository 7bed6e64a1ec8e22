//! AI Integration Layer
//!
//! Provider abstraction, prompt construction and strict response parsing
//! for the assessment and planning calls.

pub mod prompt;
pub mod provider;
pub mod validation;

pub use prompt::{PromptBuilder, PromptSection};
pub use provider::{
    ErrorCategory, ErrorClassifier, GenerationOptions, LlmError, LlmProvider, LlmResponse,
    SharedProvider, create_provider,
};
pub use validation::{extract_json, json_type_name};
