//! Network gateway port.
//!
//! The gateway is a dumb transport: adapters build a fully formed
//! [`GatewayRequest`] (URL, headers, JSON body) and get back the raw status and
//! body. Turning that into a `ProviderError` happens here, in one place, so
//! every vendor classifies failures identically.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use secrecy::SecretString;
use serde_json::{Map, Value, json};
use thiserror::Error;

use omnigen_types::error::{ProviderError, ProviderErrorCode};
use omnigen_types::guards;
use omnigen_types::provider::VendorType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// Where the gateway puts the credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// `Authorization: Bearer <key>`
    Bearer,
    /// A vendor-specific header such as `x-api-key`.
    Header(&'static str),
}

/// A vendor call, ready to send.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayRequest {
    pub vendor: VendorType,
    /// Logical operation, e.g. `chat` or `image`. Used for logging only.
    pub operation: &'static str,
    pub method: HttpMethod,
    pub url: String,
    pub auth: AuthScheme,
    pub headers: Vec<(&'static str, String)>,
    pub body: Option<Value>,
}

impl GatewayRequest {
    pub fn post(
        vendor: VendorType,
        operation: &'static str,
        url: impl Into<String>,
        auth: AuthScheme,
        body: Value,
    ) -> Self {
        Self {
            vendor,
            operation,
            method: HttpMethod::Post,
            url: url.into(),
            auth,
            headers: Vec::new(),
            body: Some(body),
        }
    }

    pub fn get(
        vendor: VendorType,
        operation: &'static str,
        url: impl Into<String>,
        auth: AuthScheme,
    ) -> Self {
        Self {
            vendor,
            operation,
            method: HttpMethod::Get,
            url: url.into(),
            auth,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Binary { content_type: String, data: Vec<u8> },
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GatewayResponse {
    pub status: u16,
    /// Parsed `Retry-After`, when the vendor sent one.
    pub retry_after_ms: Option<u64>,
    pub body: ResponseBody,
}

impl GatewayResponse {
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            retry_after_ms: None,
            body: ResponseBody::Json(body),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Map a non-success response to a `ProviderError`; pass successes through.
    ///
    /// 429 becomes `RATE_LIMITED`. Other statuses become `VENDOR_ERROR` carrying
    /// the vendor's own code and message, unless the body is already a
    /// normalized error, which keeps its code. 4xx other than 408 are permanent.
    pub fn into_result(self) -> Result<ResponseBody, ProviderError> {
        if self.is_success() {
            return Ok(self.body);
        }

        let status = self.status;
        if status == 429 {
            return Err(ProviderError::rate_limited(self.retry_after_ms));
        }

        let value = match &self.body {
            ResponseBody::Json(value) => Some(value),
            _ => None,
        };

        let normalized = value
            .filter(|v| guards::is_provider_error(v))
            .and_then(|v| guards::parse_provider_error(v).ok());

        let err = match normalized {
            Some(err) => with_status(err, status),
            None => {
                let (vendor_code, message) = value
                    .and_then(guards::vendor_error_envelope)
                    .unwrap_or_else(|| (status.to_string(), format!("HTTP {status}")));
                ProviderError::new(ProviderErrorCode::VendorError, message).with_details(json!({
                    "status": status,
                    "vendor_code": vendor_code,
                }))
            }
        };
        if (400..500).contains(&status) && status != 408 {
            Err(err.permanent())
        } else {
            Err(err)
        }
    }
}

/// Rebuild an already-normalized error with the HTTP status merged into its
/// details. Going through `with_details` scrubs whatever the body carried.
fn with_status(err: ProviderError, status: u16) -> ProviderError {
    let ProviderError {
        code,
        message,
        details,
    } = err;
    let mut map = match details {
        Some(Value::Object(map)) => map,
        Some(other) => Map::from_iter([("vendor_details".to_string(), other)]),
        None => Map::new(),
    };
    map.insert("status".to_string(), json!(status));
    ProviderError::new(code, message).with_details(Value::Object(map))
}

/// Whether an error came from a rejected credential (HTTP 401 or 403).
pub fn is_auth_failure(err: &ProviderError) -> bool {
    err.details
        .as_ref()
        .and_then(|d| d.get("status"))
        .and_then(Value::as_u64)
        .is_some_and(|s| s == 401 || s == 403)
}

/// Transport-level failure: the request never produced an HTTP response.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,
}

impl From<GatewayError> for ProviderError {
    fn from(err: GatewayError) -> Self {
        let vendor_code = match err {
            GatewayError::Transport(_) => "transport",
            GatewayError::Timeout => "timeout",
        };
        ProviderError::vendor(vendor_code, err.to_string())
    }
}

/// Trait for vendor transports.
pub trait NetworkGateway: Send + Sync {
    fn send(
        &self,
        request: &GatewayRequest,
        credential: &SecretString,
    ) -> impl Future<Output = Result<GatewayResponse, GatewayError>> + Send;
}

/// Object-safe version of [`NetworkGateway`] with boxed futures.
pub trait NetworkGatewayDyn: Send + Sync {
    fn send_boxed<'a>(
        &'a self,
        request: &'a GatewayRequest,
        credential: &'a SecretString,
    ) -> Pin<Box<dyn Future<Output = Result<GatewayResponse, GatewayError>> + Send + 'a>>;
}

impl<T: NetworkGateway> NetworkGatewayDyn for T {
    fn send_boxed<'a>(
        &'a self,
        request: &'a GatewayRequest,
        credential: &'a SecretString,
    ) -> Pin<Box<dyn Future<Output = Result<GatewayResponse, GatewayError>> + Send + 'a>> {
        Box::pin(self.send(request, credential))
    }
}

/// Shared, type-erased gateway.
pub type DynNetworkGateway = Arc<dyn NetworkGatewayDyn>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_passes_body_through() {
        let body = GatewayResponse::json(200, json!({"ok": true}))
            .into_result()
            .unwrap();
        assert_eq!(body, ResponseBody::Json(json!({"ok": true})));
    }

    #[test]
    fn test_429_is_rate_limited_with_reset_hint() {
        let mut response = GatewayResponse::json(429, json!({}));
        response.retry_after_ms = Some(2_000);
        let err = response.into_result().unwrap_err();
        assert_eq!(err.code, ProviderErrorCode::RateLimited);
        assert_eq!(err.details.unwrap()["retry_after_ms"], json!(2_000));
    }

    #[test]
    fn test_server_error_is_transient() {
        let err = GatewayResponse::json(503, json!({"error": {"message": "overloaded", "type": "overloaded_error"}}))
            .into_result()
            .unwrap_err();
        assert_eq!(err.code, ProviderErrorCode::VendorError);
        assert_eq!(err.message, "overloaded");
        assert!(err.is_transient());
    }

    #[test]
    fn test_client_error_is_permanent_except_408() {
        let err = GatewayResponse::json(400, json!({"error": {"message": "bad", "type": "invalid_request_error"}}))
            .into_result()
            .unwrap_err();
        assert!(!err.is_transient());
        let details = err.details.unwrap();
        assert_eq!(details["vendor_code"], json!("invalid_request_error"));
        assert_eq!(details["status"], json!(400));

        let timeout = GatewayResponse::json(408, json!({})).into_result().unwrap_err();
        assert!(timeout.is_transient());
        assert_eq!(timeout.message, "HTTP 408");
    }

    #[test]
    fn test_auth_failure_detection() {
        let err = GatewayResponse::json(401, json!({"error": {"message": "invalid x-api-key"}}))
            .into_result()
            .unwrap_err();
        assert!(is_auth_failure(&err));
        assert!(!is_auth_failure(&ProviderError::vendor("500", "boom")));
    }

    #[test]
    fn test_normalized_error_body_is_kept() {
        let err = GatewayResponse::json(400, json!({"code": "VALIDATION_ERROR", "message": "prompt too long"}))
            .into_result()
            .unwrap_err();
        assert_eq!(err.code, ProviderErrorCode::ValidationError);
        assert_eq!(err.message, "prompt too long");
    }

    #[test]
    fn test_normalized_client_error_is_permanent() {
        let err = GatewayResponse::json(400, json!({"code": "VENDOR_ERROR", "message": "bad request"}))
            .into_result()
            .unwrap_err();
        assert_eq!(err.code, ProviderErrorCode::VendorError);
        assert!(!err.is_transient());
        assert_eq!(err.details.unwrap()["status"], json!(400));

        let server = GatewayResponse::json(502, json!({"code": "VENDOR_ERROR", "message": "upstream"}))
            .into_result()
            .unwrap_err();
        assert!(server.is_transient());
    }

    #[test]
    fn test_normalized_error_details_are_scrubbed() {
        let err = GatewayResponse::json(
            401,
            json!({
                "code": "VALIDATION_ERROR",
                "message": "rejected",
                "details": {"api_key": "sk-live-LEAK", "hint": "rotate"}
            }),
        )
        .into_result()
        .unwrap_err();
        assert!(is_auth_failure(&err));
        let details = err.details.clone().unwrap();
        assert_eq!(details["api_key"], json!("***"));
        assert_eq!(details["hint"], json!("rotate"));
        assert!(!serde_json::to_string(&err).unwrap().contains("sk-live-LEAK"));
    }

    #[test]
    fn test_normalized_error_with_scalar_details_keeps_them() {
        let err = GatewayResponse::json(500, json!({"code": "UNKNOWN_ERROR", "message": "x", "details": "trace-1"}))
            .into_result()
            .unwrap_err();
        let details = err.details.unwrap();
        assert_eq!(details["vendor_details"], json!("trace-1"));
        assert_eq!(details["status"], json!(500));
    }

    #[test]
    fn test_transport_error_maps_to_transient_vendor_error() {
        let err: ProviderError = GatewayError::Transport("connection reset".into()).into();
        assert_eq!(err.code, ProviderErrorCode::VendorError);
        assert!(err.is_transient());
    }
}
