//! Locating JSON in free-form model output.
//!
//! Models wrap JSON in prose or code fences. These helpers take the span
//! from the first opening bracket to the last closing one, and fall back
//! to the whole text when there is no such span.

use regex::Regex;

use crate::error::AgentError;

const ARRAY_SPAN: &str = r"\[[\s\S]*\]";
const OBJECT_SPAN: &str = r"\{[\s\S]*\}";

fn first_span<'a>(content: &'a str, pattern: &str) -> Result<&'a str, AgentError> {
    let re = Regex::new(pattern).map_err(|e| AgentError::ResponseParse {
        message: format!("invalid span pattern: {e}"),
        content: String::new(),
    })?;
    Ok(re.find(content).map_or(content, |m| m.as_str()))
}

/// The outermost `[...]` span, or the whole content.
///
/// # Errors
///
/// Returns [`AgentError::ResponseParse`] only if the span pattern fails to
/// compile.
pub fn array_span(content: &str) -> Result<&str, AgentError> {
    first_span(content, ARRAY_SPAN)
}

/// The outermost `{...}` span, or the whole content.
///
/// # Errors
///
/// Returns [`AgentError::ResponseParse`] only if the span pattern fails to
/// compile.
pub fn object_span(content: &str) -> Result<&str, AgentError> {
    first_span(content, OBJECT_SPAN)
}
