//! Structural guards for payloads crossing the adapter boundary.
//!
//! Each `is_*` predicate is pure and only checks shape. The `parse_*` helpers
//! pair a predicate with deserialization and fail with `VALIDATION_ERROR`, so a
//! malformed payload never gets as far as the network.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{ProviderError, ProviderErrorCode};
use crate::provider::{Document, GenerationContext, GenerationOptions, VendorType};

fn optional(value: &Value, key: &str, check: impl Fn(&Value) -> bool) -> bool {
    match value.get(key) {
        None | Some(Value::Null) => true,
        Some(v) => check(v),
    }
}

fn is_non_negative_integer(value: &Value) -> bool {
    value.as_u64().is_some()
}

/// A known vendor name, e.g. `"openai"`.
pub fn is_vendor_type(value: &Value) -> bool {
    value
        .as_str()
        .is_some_and(|s| s.parse::<VendorType>().is_ok())
}

/// Generation options. Out-of-range numbers pass; they are clamped later.
pub fn is_generation_options(value: &Value) -> bool {
    value.is_object()
        && optional(value, "model", Value::is_string)
        && optional(value, "temperature", |v| {
            v.as_f64().is_some_and(|t| t.is_finite())
        })
        && optional(value, "max_tokens", |v| v.as_i64().is_some())
        && optional(value, "timeout_ms", is_non_negative_integer)
}

pub fn is_generation_context(value: &Value) -> bool {
    value.is_object()
        && optional(value, "system_instruction", Value::is_string)
        && optional(value, "style", Value::is_string)
        && optional(value, "modifiers", |v| {
            v.as_array()
                .is_some_and(|items| items.iter().all(Value::is_string))
        })
}

pub fn is_document(value: &Value) -> bool {
    if !value.get("content").is_some_and(Value::is_string) {
        return false;
    }
    optional(value, "metadata", |meta| {
        meta.is_object()
            && optional(meta, "source", Value::is_string)
            && optional(meta, "author", Value::is_string)
            && optional(meta, "timestamp", Value::is_string)
            && optional(meta, "relevance_score", Value::is_number)
    })
}

/// A normalized gateway response: `{text | image_url, usage?}`.
pub fn is_provider_response(value: &Value) -> bool {
    let has_payload = value.get("text").is_some_and(Value::is_string)
        || value.get("image_url").is_some_and(Value::is_string);
    has_payload
        && optional(value, "usage", |usage| {
            usage.is_object()
                && optional(usage, "input_tokens", is_non_negative_integer)
                && optional(usage, "output_tokens", is_non_negative_integer)
        })
}

/// A normalized `{code, message, details?}` error with a known code.
pub fn is_provider_error(value: &Value) -> bool {
    value
        .get("code")
        .and_then(Value::as_str)
        .is_some_and(|c| c.parse::<ProviderErrorCode>().is_ok())
        && value.get("message").is_some_and(Value::is_string)
}

/// Pull `(code, message)` out of a vendor error body.
///
/// Recognizes the `{"error": {"message", "type"|"code"|"status"}}` envelope
/// used by the chat vendors, the bare `{"error": "..."}` form, and the
/// `{"name", "message"}` form returned by Stability.
pub fn vendor_error_envelope(value: &Value) -> Option<(String, String)> {
    if let Some(error) = value.get("error") {
        if let Some(message) = error.as_str() {
            return Some(("error".to_string(), message.to_string()));
        }
        let message = error.get("message").and_then(Value::as_str)?;
        let code = ["code", "type", "status"]
            .iter()
            .find_map(|key| match error.get(*key) {
                Some(Value::String(s)) => Some(s.clone()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            })
            .unwrap_or_else(|| "error".to_string());
        return Some((code, message.to_string()));
    }
    let message = value.get("message").and_then(Value::as_str)?;
    let code = value
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or("error")
        .to_string();
    Some((code, message.to_string()))
}

fn parse_checked<T: DeserializeOwned>(
    value: &Value,
    what: &str,
    guard: fn(&Value) -> bool,
) -> Result<T, ProviderError> {
    if !guard(value) {
        return Err(ProviderError::validation(format!("invalid {what}")));
    }
    serde_json::from_value(value.clone())
        .map_err(|e| ProviderError::validation(format!("invalid {what}: {e}")))
}

pub fn parse_vendor_type(value: &Value) -> Result<VendorType, ProviderError> {
    value
        .as_str()
        .ok_or_else(|| ProviderError::validation("vendor type must be a string"))?
        .parse()
        .map_err(ProviderError::validation)
}

pub fn parse_generation_options(value: &Value) -> Result<GenerationOptions, ProviderError> {
    parse_checked(value, "generation options", is_generation_options)
}

pub fn parse_generation_context(value: &Value) -> Result<GenerationContext, ProviderError> {
    parse_checked(value, "generation context", is_generation_context)
}

pub fn parse_documents(value: &Value) -> Result<Vec<Document>, ProviderError> {
    let items = value
        .as_array()
        .ok_or_else(|| ProviderError::validation("documents must be an array"))?;
    items
        .iter()
        .enumerate()
        .map(|(i, item)| parse_checked(item, &format!("document at index {i}"), is_document))
        .collect()
}

/// Details are re-attached through `with_details`, so credential-like keys are
/// scrubbed like on any other error.
pub fn parse_provider_error(value: &Value) -> Result<ProviderError, ProviderError> {
    let ProviderError {
        code,
        message,
        details,
    } = parse_checked(value, "provider error", is_provider_error)?;
    let err = ProviderError::new(code, message);
    Ok(match details {
        Some(details) => err.with_details(details),
        None => err,
    })
}
