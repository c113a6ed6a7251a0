//! Key resolver chain: asks resolvers in priority order, first hit wins.
//!
//! Default chain order: `[EnvKeyResolver, KeychainKeyResolver]`

use std::sync::Arc;

use secrecy::SecretString;

use omnigen_core::credential::{DynKeyResolver, KeyResolver, KeyResolverError};
use omnigen_types::provider::{KeyKind, VendorType};

use crate::keychain::KeychainKeyResolver;
use crate::secret::env::EnvKeyResolver;

/// Tries each resolver in order.
///
/// A backend failure does not stop the walk: later resolvers may still hold
/// the key. The first failure is returned only when no resolver had a key.
#[derive(Default)]
pub struct ChainKeyResolver {
    resolvers: Vec<DynKeyResolver>,
}

impl ChainKeyResolver {
    pub fn new(resolvers: Vec<DynKeyResolver>) -> Self {
        Self { resolvers }
    }

    pub fn push(mut self, resolver: DynKeyResolver) -> Self {
        self.resolvers.push(resolver);
        self
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

impl KeyResolver for ChainKeyResolver {
    async fn resolve(
        &self,
        vendor: VendorType,
        kind: KeyKind,
    ) -> Result<Option<SecretString>, KeyResolverError> {
        let mut first_error = None;
        for resolver in &self.resolvers {
            match resolver.resolve_boxed(vendor, kind).await {
                Ok(Some(key)) => return Ok(Some(key)),
                Ok(None) => {}
                Err(err) => {
                    tracing::debug!(%vendor, %kind, error = %err, "key resolver failed, trying next");
                    first_error.get_or_insert(err);
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(None),
        }
    }
}

/// Build the default resolution chain.
///
/// 1. Environment variables (if `include_env` is true)
/// 2. OS keychain (if `keychain` is Some; may be unavailable on headless servers)
pub fn build_default_chain(
    keychain: Option<KeychainKeyResolver>,
    include_env: bool,
) -> ChainKeyResolver {
    let mut chain = ChainKeyResolver::default();
    if include_env {
        chain = chain.push(Arc::new(EnvKeyResolver::new()));
    }
    if let Some(kc) = keychain {
        chain = chain.push(Arc::new(kc));
    }
    chain
}
