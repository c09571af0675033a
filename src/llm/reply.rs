//! Turning raw model output into collaborator reply types.
//!
//! Models asked for JSON still wrap it in markdown fences, prefix it with
//! prose or emit `<think>` blocks. Parsing strips those first, then takes the
//! outermost JSON object. Single-field replies fall back to using plain text
//! verbatim.

use crate::services::{ServiceError, ServiceResult};
use serde::de::DeserializeOwned;
use tracing::debug;

/// Parse `content` into `T`.
///
/// `plain_field` names the field to fill with the whole reply when the model
/// answered in plain text instead of JSON.
pub fn parse_reply<T: DeserializeOwned>(content: &str, plain_field: Option<&str>) -> ServiceResult<T> {
    let visible = strip_think_blocks(content);
    let cleaned = strip_markdown_fences(&visible).trim();
    if cleaned.is_empty() {
        return Err(ServiceError::EmptyResponse("model returned no content".into()));
    }

    if let Some(json) = extract_json_object(cleaned) {
        match serde_json::from_str::<serde_json::Value>(json) {
            Ok(value) => {
                return serde_json::from_value(value).map_err(|e| {
                    ServiceError::InvalidPayload(format!("unexpected reply shape: {e}"))
                });
            }
            // Braces in prose, not an object.
            Err(e) if plain_field.is_some() => {
                debug!(error = %e, "braced text is not JSON; using plain reply");
            }
            Err(e) => {
                return Err(ServiceError::InvalidPayload(format!("malformed JSON reply: {e}")));
            }
        }
    }

    match plain_field {
        Some(field) => {
            let mut object = serde_json::Map::new();
            object.insert(field.to_owned(), serde_json::Value::String(cleaned.to_owned()));
            serde_json::from_value(serde_json::Value::Object(object))
                .map_err(|e| ServiceError::InvalidPayload(e.to_string()))
        }
        None => Err(ServiceError::InvalidPayload(
            "reply did not contain a JSON object".into(),
        )),
    }
}

/// Remove `<think>...</think>` blocks (and an unterminated trailing one).
pub fn strip_think_blocks(text: &str) -> String {
    const OPEN: &str = "<think>";
    const CLOSE: &str = "</think>";

    let mut visible = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(OPEN) {
        visible.push_str(&rest[..start]);
        match rest[start + OPEN.len()..].find(CLOSE) {
            Some(end) => rest = &rest[start + OPEN.len() + end + CLOSE.len()..],
            None => return visible,
        }
    }
    visible.push_str(rest);
    visible
}

/// Unwrap a reply that is entirely one fenced block (```` ```json ```` or bare
/// ```` ``` ````). Anything else is returned trimmed but untouched.
pub fn strip_markdown_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(body) = trimmed
        .strip_prefix("```")
        .and_then(|rest| rest.strip_suffix("```"))
    else {
        return trimmed;
    };
    // Drop the info string on the opening line.
    match body.split_once('\n') {
        Some((_, code)) => code,
        None => body,
    }
}

/// Extract the outermost `{...}` object from `text`, honouring nested braces
/// and quoted strings. `None` if no balanced object is found.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth: i32 = 0;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in text[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
