//! reqwest-backed [`NetworkGateway`].
//!
//! The only place a credential is exposed: it is written into the auth header
//! (marked sensitive so it never shows in debug output) right before sending.
//! Request deadlines are enforced by the adapter pipeline; the client itself
//! only bounds connection setup.

use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, RETRY_AFTER};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};

use omnigen_core::gateway::{
    AuthScheme, GatewayError, GatewayRequest, GatewayResponse, HttpMethod, NetworkGateway,
    ResponseBody,
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT: &str = concat!("omnigen/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
}

impl HttpGateway {
    pub fn new() -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| GatewayError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Use a preconfigured client (proxies, custom TLS roots).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl NetworkGateway for HttpGateway {
    async fn send(
        &self,
        request: &GatewayRequest,
        credential: &SecretString,
    ) -> Result<GatewayResponse, GatewayError> {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };

        builder = match request.auth {
            AuthScheme::Bearer => builder.bearer_auth(credential.expose_secret()),
            AuthScheme::Header(name) => {
                let mut value = HeaderValue::from_str(credential.expose_secret()).map_err(|_| {
                    GatewayError::Transport("credential is not a valid header value".to_string())
                })?;
                value.set_sensitive(true);
                builder.header(name, value)
            }
        };

        for (name, value) in &request.headers {
            builder = builder.header(*name, value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        tracing::debug!(
            vendor = %request.vendor,
            operation = request.operation,
            method = ?request.method,
            "sending vendor request"
        );

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let retry_after_ms = retry_after_ms(response.headers());
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let bytes = response.bytes().await.map_err(map_reqwest_error)?;

        Ok(GatewayResponse {
            status,
            retry_after_ms,
            body: decode_body(status, &content_type, &bytes),
        })
    }
}

fn map_reqwest_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout
    } else {
        // URLs may carry query-string keys.
        GatewayError::Transport(err.without_url().to_string())
    }
}

/// `retry-after-ms` (milliseconds) wins over `retry-after` (whole seconds).
/// HTTP-date forms are ignored.
fn retry_after_ms(headers: &HeaderMap) -> Option<u64> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite() && *v >= 0.0)
    };
    header("retry-after-ms")
        .map(|ms| ms as u64)
        .or_else(|| header(RETRY_AFTER.as_str()).map(|secs| (secs * 1_000.0) as u64))
}

fn decode_body(status: u16, content_type: &str, bytes: &[u8]) -> ResponseBody {
    if bytes.is_empty() {
        return ResponseBody::Empty;
    }
    let looks_json = content_type.contains("json")
        || (content_type.is_empty() && matches!(bytes.first(), Some(b'{' | b'[')));
    if looks_json {
        if let Ok(value) = serde_json::from_slice::<Value>(bytes) {
            return ResponseBody::Json(value);
        }
    }
    if !(200..300).contains(&status) {
        // Plain-text error pages still carry a useful message.
        let text = String::from_utf8_lossy(bytes);
        return ResponseBody::Json(json!({ "error": text.trim() }));
    }
    ResponseBody::Binary {
        content_type: content_type.to_string(),
        data: bytes.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_after_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("3"));
        assert_eq!(retry_after_ms(&headers), Some(3_000));
    }

    #[test]
    fn test_retry_after_ms_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("3"));
        headers.insert("retry-after-ms", HeaderValue::from_static("250"));
        assert_eq!(retry_after_ms(&headers), Some(250));
    }

    #[test]
    fn test_retry_after_http_date_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2026 07:28:00 GMT"),
        );
        assert_eq!(retry_after_ms(&headers), None);
        assert_eq!(retry_after_ms(&HeaderMap::new()), None);
    }

    #[test]
    fn test_decode_json_body() {
        let body = decode_body(200, "application/json; charset=utf-8", br#"{"ok":true}"#);
        assert_eq!(body, ResponseBody::Json(json!({"ok": true})));
    }

    #[test]
    fn test_decode_binary_body() {
        let body = decode_body(200, "audio/mpeg", &[0xff, 0xfb, 0x90]);
        assert_eq!(
            body,
            ResponseBody::Binary {
                content_type: "audio/mpeg".to_string(),
                data: vec![0xff, 0xfb, 0x90],
            }
        );
    }

    #[test]
    fn test_decode_text_error_becomes_envelope() {
        let body = decode_body(502, "text/html", b" Bad Gateway \n");
        assert_eq!(body, ResponseBody::Json(json!({"error": "Bad Gateway"})));

        let err = GatewayResponse {
            status: 502,
            retry_after_ms: None,
            body,
        }
        .into_result()
        .unwrap_err();
        assert_eq!(err.message, "Bad Gateway");
        assert!(err.is_transient());
    }

    #[test]
    fn test_decode_empty_body() {
        assert_eq!(decode_body(204, "", b""), ResponseBody::Empty);
    }

    #[test]
    fn test_gateway_builds() {
        assert!(HttpGateway::new().is_ok());
    }
}
