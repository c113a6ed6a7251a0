//! Test doubles for the adapter and bootstrap tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};

use omnigen_core::credential::{KeyResolver, KeyResolverError};
use omnigen_core::gateway::{GatewayError, GatewayRequest, GatewayResponse, NetworkGateway, ResponseBody};
use omnigen_core::provider::cost::NoCost;
use omnigen_types::config::ResilienceConfig;
use omnigen_types::provider::{KeyKind, VendorType};

use crate::adapter::AdapterContext;

pub struct StaticResolver(pub Option<&'static str>);

impl KeyResolver for StaticResolver {
    async fn resolve(
        &self,
        _vendor: VendorType,
        _kind: KeyKind,
    ) -> Result<Option<SecretString>, KeyResolverError> {
        Ok(self.0.map(|k| SecretString::from(k.to_string())))
    }
}

/// Replays scripted responses in order; once the script runs dry every call
/// gets `fallback`. Records each request with the credential it carried.
pub struct RecordingGateway {
    script: Mutex<VecDeque<GatewayResponse>>,
    fallback: GatewayResponse,
    requests: Mutex<Vec<(GatewayRequest, String)>>,
}

impl RecordingGateway {
    pub fn replying(body: Value) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: GatewayResponse::json(200, body),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn replying_binary(content_type: &str, data: &[u8]) -> Self {
        let gateway = Self::replying(json!({}));
        Self {
            fallback: GatewayResponse {
                status: 200,
                retry_after_ms: None,
                body: ResponseBody::Binary {
                    content_type: content_type.to_string(),
                    data: data.to_vec(),
                },
            },
            ..gateway
        }
    }

    pub fn then(self, response: GatewayResponse) -> Self {
        self.script.lock().unwrap().push_back(response);
        self
    }

    pub fn requests(&self) -> Vec<GatewayRequest> {
        self.requests.lock().unwrap().iter().map(|(r, _)| r.clone()).collect()
    }

    pub fn last(&self) -> GatewayRequest {
        self.requests().pop().expect("no request was sent")
    }

    pub fn credentials(&self) -> Vec<String> {
        self.requests.lock().unwrap().iter().map(|(_, c)| c.clone()).collect()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl NetworkGateway for RecordingGateway {
    async fn send(
        &self,
        request: &GatewayRequest,
        credential: &SecretString,
    ) -> Result<GatewayResponse, GatewayError> {
        self.requests
            .lock()
            .unwrap()
            .push((request.clone(), credential.expose_secret().to_string()));
        let next = self.script.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| self.fallback.clone()))
    }
}

/// One attempt, no spacing: adapter tests check wire mapping, not resilience.
pub fn quick_resilience() -> ResilienceConfig {
    ResilienceConfig {
        max_retries: 1,
        retry_delay_ms: 0,
        rate_limit_interval_ms: 0,
    }
}

pub fn context(gateway: Arc<RecordingGateway>) -> AdapterContext {
    AdapterContext {
        resolver: Arc::new(StaticResolver(Some("test-key"))),
        gateway,
        pricing: Arc::new(NoCost),
    }
}
