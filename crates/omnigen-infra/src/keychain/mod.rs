//! OS keychain key resolver.
//!
//! Uses the `keyring` crate to read keys via:
//! - macOS Keychain
//! - Linux Secret Service (GNOME Keyring, KDE Wallet)
//! - Windows Credential Manager
//!
//! Keys are stored under service `omnigen`, entry `{vendor}/{kind}`
//! (e.g. `openai/chat`).

use secrecy::SecretString;

use omnigen_core::credential::{KeyResolver, KeyResolverError};
use omnigen_types::provider::{KeyKind, VendorType};

pub const DEFAULT_SERVICE: &str = "omnigen";

#[derive(Debug, Clone)]
pub struct KeychainKeyResolver {
    service_name: String,
}

impl KeychainKeyResolver {
    /// Create a resolver with the default service name "omnigen".
    pub fn new() -> Self {
        Self {
            service_name: DEFAULT_SERVICE.to_string(),
        }
    }

    /// Create a resolver with a custom service name (useful for testing).
    pub fn with_service(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    pub fn entry_name(vendor: VendorType, kind: KeyKind) -> String {
        format!("{vendor}/{kind}")
    }

    /// Write a key. Used by setup tooling; adapters only read.
    pub fn store(
        &self,
        vendor: VendorType,
        kind: KeyKind,
        key: &str,
    ) -> Result<(), KeyResolverError> {
        let entry = keyring::Entry::new(&self.service_name, &Self::entry_name(vendor, kind))
            .map_err(|e| KeyResolverError::Unavailable(format!("keychain entry error: {e}")))?;
        entry
            .set_password(key)
            .map_err(|e| KeyResolverError::Lookup(format!("keychain set error: {e}")))
    }
}

impl Default for KeychainKeyResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyResolver for KeychainKeyResolver {
    async fn resolve(
        &self,
        vendor: VendorType,
        kind: KeyKind,
    ) -> Result<Option<SecretString>, KeyResolverError> {
        let service = self.service_name.clone();
        let name = Self::entry_name(vendor, kind);

        // Platform keychain calls block (D-Bus, Security.framework).
        let lookup = tokio::task::spawn_blocking(move || {
            let entry = keyring::Entry::new(&service, &name)
                .map_err(|e| KeyResolverError::Unavailable(format!("keychain entry error: {e}")))?;
            match entry.get_password() {
                Ok(value) => Ok(Some(SecretString::from(value))),
                Err(keyring::Error::NoEntry) => Ok(None),
                Err(keyring::Error::PlatformFailure(e) | keyring::Error::NoStorageAccess(e)) => Err(
                    KeyResolverError::Unavailable(format!("keychain unavailable: {e}")),
                ),
                Err(e) => Err(KeyResolverError::Lookup(format!("keychain get error: {e}"))),
            }
        });

        lookup
            .await
            .map_err(|e| KeyResolverError::Unavailable(format!("keychain task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_name() {
        assert_eq!(
            KeychainKeyResolver::entry_name(VendorType::OpenAi, KeyKind::Chat),
            "openai/chat"
        );
        assert_eq!(
            KeychainKeyResolver::entry_name(VendorType::Stability, KeyKind::Image),
            "stability/image"
        );
    }

    #[test]
    fn test_service_name() {
        assert_eq!(KeychainKeyResolver::new().service_name, "omnigen");
        assert_eq!(
            KeychainKeyResolver::with_service("omnigen-test").service_name,
            "omnigen-test"
        );
    }
}
