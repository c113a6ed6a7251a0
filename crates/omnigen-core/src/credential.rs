//! Key resolver port.
//!
//! Adapters never read credentials themselves; they ask a `KeyResolver` for
//! the key of a `(vendor, kind)` pair. Implementations (environment, OS
//! keychain, chains of both) live in omnigen-infra.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use secrecy::SecretString;
use thiserror::Error;

use omnigen_types::error::ProviderError;
use omnigen_types::provider::{KeyKind, VendorType};

/// Failure inside a resolver backend (not "key absent", which is `Ok(None)`).
#[derive(Debug, Error)]
pub enum KeyResolverError {
    #[error("key store unavailable: {0}")]
    Unavailable(String),

    #[error("key store lookup failed: {0}")]
    Lookup(String),
}

impl KeyResolverError {
    /// Adapters surface every resolver failure as a missing credential.
    pub fn into_provider_error(self, vendor: VendorType) -> ProviderError {
        ProviderError::credential_missing(vendor)
            .with_details(serde_json::json!({ "cause": self.to_string() }))
    }
}

/// Trait for credential sources.
pub trait KeyResolver: Send + Sync {
    /// Resolve the key for a vendor. `Ok(None)` means this source has no key.
    fn resolve(
        &self,
        vendor: VendorType,
        kind: KeyKind,
    ) -> impl Future<Output = Result<Option<SecretString>, KeyResolverError>> + Send;
}

/// Object-safe version of [`KeyResolver`] with boxed futures.
pub trait KeyResolverDyn: Send + Sync {
    fn resolve_boxed(
        &self,
        vendor: VendorType,
        kind: KeyKind,
    ) -> Pin<Box<dyn Future<Output = Result<Option<SecretString>, KeyResolverError>> + Send + '_>>;
}

impl<T: KeyResolver> KeyResolverDyn for T {
    fn resolve_boxed(
        &self,
        vendor: VendorType,
        kind: KeyKind,
    ) -> Pin<Box<dyn Future<Output = Result<Option<SecretString>, KeyResolverError>> + Send + '_>>
    {
        Box::pin(self.resolve(vendor, kind))
    }
}

/// Shared, type-erased key resolver.
pub type DynKeyResolver = Arc<dyn KeyResolverDyn>;
