//! AI Response Validation
//!
//! Strict parsing of model output. Shape checks on the parsed value live with
//! the requester that knows which shape it asked for.

mod json_extract;

pub use json_extract::{extract_json, json_type_name};
