//! Recovery of a structured payload from loosely formatted model output.
//!
//! The provider is a free-text generator, not a typed RPC, so "JSON-ish" text
//! is the expected case: fenced blocks, leading prose, trailing commentary.
//! Everything funnels through [`extract_structured`]; failure here is an
//! ordinary recoverable error, never a panic.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("no JSON object or array found in response text")]
    NoStructure,

    #[error("unbalanced JSON delimiters in response text")]
    Unbalanced,

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Pull the first complete JSON object or array out of `text`.
///
/// Strips optional markdown code fences, locates the first `{` or `[`, scans
/// to its balanced closing delimiter (string- and escape-aware), and parses
/// the slice.
pub fn extract_structured(text: &str) -> Result<Value, ExtractError> {
    let stripped = strip_code_fences(text);
    let region = balanced_region(stripped).ok_or_else(|| {
        if stripped.contains('{') || stripped.contains('[') {
            ExtractError::Unbalanced
        } else {
            ExtractError::NoStructure
        }
    })?;
    Ok(serde_json::from_str(region)?)
}

/// Remove a surrounding ``` fence (with or without a language tag) if present.
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the language tag line, e.g. "json"
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Locate the first balanced `{...}` or `[...]` region.
fn balanced_region(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let bytes = text.as_bytes();

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match byte {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' | b'[' if !in_string => depth += 1,
            b'}' | b']' if !in_string => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
