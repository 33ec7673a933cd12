//! Parsing of structured answers produced from the reconstructed text
//!
//! Downstream consumers (typically a language model prompted with the plain
//! text of a label) answer with a flat JSON object such as
//! `{"Состав": "молоко, сахар", "Жирность": 3.2}`. Every value is flattened
//! to a string.

use crate::error::{LayoutError, Result};
use serde_json::Value;
use std::collections::BTreeMap;

/// Field name to value, sorted by field name
pub type ExtractedFields = BTreeMap<String, String>;

/// Parse a downstream JSON answer
///
/// String values are kept verbatim; numbers, booleans, null, arrays and
/// objects keep their JSON text. A Markdown code fence around the object is
/// tolerated.
///
/// # Errors
///
/// Returns `LayoutError::ExtractionParse` when the text is not valid JSON or
/// its top-level value is not an object. No partial result is returned.
pub fn parse_extraction(text: &str) -> Result<ExtractedFields> {
    let body = strip_code_fence(text);
    let value: Value =
        serde_json::from_str(body).map_err(|e| LayoutError::ExtractionParse(e.to_string()))?;

    let map = match value {
        Value::Object(map) => map,
        other => {
            return Err(LayoutError::ExtractionParse(format!(
                "expected a JSON object, found {}",
                kind(&other)
            )))
        }
    };

    Ok(map
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            (key, value)
        })
        .collect())
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Remove a surrounding Markdown code fence, if any
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. "json") on the opening line
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}
