//! Environment variable key resolver.
//!
//! Key resolution:
//! - Non-chat kinds first check `{VENDOR}_{KIND}_API_KEY` (e.g. `OPENAI_VOICE_API_KEY`)
//! - Every kind then falls back to `{VENDOR}_API_KEY` (e.g. `OPENAI_API_KEY`)
//!
//! Empty or non-Unicode values count as absent.

use secrecy::SecretString;

use omnigen_core::credential::{KeyResolver, KeyResolverError};
use omnigen_types::provider::{KeyKind, VendorType};

#[derive(Debug, Clone, Default)]
pub struct EnvKeyResolver {
    /// Prepended to every variable name, e.g. `MYAPP_` → `MYAPP_OPENAI_API_KEY`.
    prefix: String,
}

impl EnvKeyResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Variable names checked for a lookup, in order.
    pub fn candidates(&self, vendor: VendorType, kind: KeyKind) -> Vec<String> {
        let vendor = vendor.as_str().to_uppercase();
        let mut names = Vec::with_capacity(2);
        if kind != KeyKind::Chat {
            let kind = kind.to_string().to_uppercase();
            names.push(format!("{}{vendor}_{kind}_API_KEY", self.prefix));
        }
        names.push(format!("{}{vendor}_API_KEY", self.prefix));
        names
    }
}

impl KeyResolver for EnvKeyResolver {
    async fn resolve(
        &self,
        vendor: VendorType,
        kind: KeyKind,
    ) -> Result<Option<SecretString>, KeyResolverError> {
        for name in self.candidates(vendor, kind) {
            match std::env::var(&name) {
                Ok(value) if !value.trim().is_empty() => {
                    tracing::debug!(variable = %name, "key resolved from environment");
                    return Ok(Some(SecretString::from(value)));
                }
                Ok(_) | Err(std::env::VarError::NotPresent) => {}
                Err(std::env::VarError::NotUnicode(_)) => {
                    tracing::warn!(variable = %name, "ignoring non-unicode key variable");
                }
            }
        }
        Ok(None)
    }
}
