use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Stable error codes carried by every [`ProviderError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderErrorCode {
    /// Malformed input. Never retried, never reaches the network.
    ValidationError,
    /// No credential could be resolved for the adapter.
    CredentialMissing,
    /// The adapter does not have the capability for this operation.
    UnsupportedOperation,
    /// The vendor signaled throttling.
    RateLimited,
    /// Transport failure or non-success vendor response.
    VendorError,
    /// The caller cancelled the call or its deadline elapsed.
    Cancelled,
    /// Registry lookup miss.
    NotFound,
    /// Catch-all.
    UnknownError,
}

impl ProviderErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderErrorCode::ValidationError => "VALIDATION_ERROR",
            ProviderErrorCode::CredentialMissing => "CREDENTIAL_MISSING",
            ProviderErrorCode::UnsupportedOperation => "UNSUPPORTED_OPERATION",
            ProviderErrorCode::RateLimited => "RATE_LIMITED",
            ProviderErrorCode::VendorError => "VENDOR_ERROR",
            ProviderErrorCode::Cancelled => "CANCELLED",
            ProviderErrorCode::NotFound => "NOT_FOUND",
            ProviderErrorCode::UnknownError => "UNKNOWN_ERROR",
        }
    }
}

impl fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderErrorCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "VALIDATION_ERROR" => Ok(ProviderErrorCode::ValidationError),
            "CREDENTIAL_MISSING" => Ok(ProviderErrorCode::CredentialMissing),
            "UNSUPPORTED_OPERATION" => Ok(ProviderErrorCode::UnsupportedOperation),
            "RATE_LIMITED" => Ok(ProviderErrorCode::RateLimited),
            "VENDOR_ERROR" => Ok(ProviderErrorCode::VendorError),
            "CANCELLED" => Ok(ProviderErrorCode::Cancelled),
            "NOT_FOUND" => Ok(ProviderErrorCode::NotFound),
            "UNKNOWN_ERROR" => Ok(ProviderErrorCode::UnknownError),
            other => Err(format!("invalid provider error code: '{other}'")),
        }
    }
}

/// The only error shape that crosses the adapter boundary.
///
/// Vendor-specific error bodies, transport failures and resolver failures are
/// all normalized into `{code, message, details}` before reaching callers.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct ProviderError {
    pub code: ProviderErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Keys scrubbed from `details` before an error leaves the adapter.
const SENSITIVE_KEYS: &[&str] = &[
    "api_key",
    "apikey",
    "authorization",
    "credential",
    "password",
    "secret",
    "token",
    "x-api-key",
    "x-goog-api-key",
];

impl ProviderError {
    pub fn new(code: ProviderErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Attach structured details. Credential-like keys are replaced with `"***"`.
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(scrub(details));
        self
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::ValidationError, message)
    }

    pub fn credential_missing(vendor: impl fmt::Display) -> Self {
        Self::new(
            ProviderErrorCode::CredentialMissing,
            format!("no credential available for vendor '{vendor}'"),
        )
    }

    pub fn unsupported(adapter_id: &str, operation: &str) -> Self {
        Self::new(
            ProviderErrorCode::UnsupportedOperation,
            format!("adapter '{adapter_id}' does not support {operation}"),
        )
    }

    pub fn rate_limited(retry_after_ms: Option<u64>) -> Self {
        let err = Self::new(ProviderErrorCode::RateLimited, "vendor rate limit reached");
        match retry_after_ms {
            Some(ms) => err.with_details(serde_json::json!({ "retry_after_ms": ms })),
            None => err,
        }
    }

    /// A vendor failure wrapping the vendor's own code and message.
    pub fn vendor(vendor_code: impl Into<String>, message: impl Into<String>) -> Self {
        let vendor_code = vendor_code.into();
        Self::new(ProviderErrorCode::VendorError, message)
            .with_details(serde_json::json!({ "vendor_code": vendor_code }))
    }

    /// Mark a vendor error as not worth retrying (e.g. HTTP 400).
    pub fn permanent(mut self) -> Self {
        let mut details = match self.details.take() {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        details.insert("permanent".to_string(), Value::Bool(true));
        self.details = Some(Value::Object(details));
        self
    }

    pub fn cancelled(reason: &str) -> Self {
        Self::new(ProviderErrorCode::Cancelled, format!("request {reason}"))
    }

    pub fn not_found(what: impl fmt::Display) -> Self {
        Self::new(ProviderErrorCode::NotFound, format!("{what} not found"))
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::UnknownError, message)
    }

    /// Whether retrying the same request could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.code,
            ProviderErrorCode::RateLimited | ProviderErrorCode::VendorError
        ) && !self
            .details
            .as_ref()
            .and_then(|d| d.get("permanent"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

fn scrub(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let scrubbed: Map<String, Value> = map
                .into_iter()
                .map(|(k, v)| {
                    if SENSITIVE_KEYS.contains(&k.to_lowercase().as_str()) {
                        (k, Value::String("***".to_string()))
                    } else {
                        (k, scrub(v))
                    }
                })
                .collect();
            Value::Object(scrubbed)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(scrub).collect()),
        other => other,
    }
}
