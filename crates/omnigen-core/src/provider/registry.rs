//! Provider registry for runtime adapter lookup.
//!
//! An explicit context object, built once at startup and shared behind an
//! `Arc`. Keeps adapters in registration order and tracks one default adapter
//! per category.

use std::sync::{Arc, PoisonError, RwLock};

use dashmap::DashMap;
use futures_util::future::join_all;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use omnigen_types::error::ProviderError;
use omnigen_types::guards;
use omnigen_types::provider::{AdapterStatusInfo, Category, VendorType};

use super::box_adapter::BoxProviderAdapter;

/// Shared handle to a registered adapter.
pub type AdapterHandle = Arc<BoxProviderAdapter>;

/// Registry of available adapters, indexed by id.
#[derive(Default)]
pub struct ProviderRegistry {
    adapters: RwLock<Vec<AdapterHandle>>,
    /// Category -> adapter id.
    defaults: DashMap<Category, String>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter. An adapter with the same id is replaced in place.
    pub fn register(&self, adapter: impl Into<AdapterHandle>) -> AdapterHandle {
        let adapter = adapter.into();
        let mut adapters = self.adapters.write().unwrap_or_else(PoisonError::into_inner);
        match adapters.iter_mut().find(|a| a.id() == adapter.id()) {
            Some(existing) => *existing = Arc::clone(&adapter),
            None => adapters.push(Arc::clone(&adapter)),
        }
        tracing::debug!(adapter = %adapter.id(), "adapter registered");
        adapter
    }

    /// Remove an adapter and any category default pointing at it.
    pub fn unregister(&self, id: &str) -> Option<AdapterHandle> {
        let removed = {
            let mut adapters = self.adapters.write().unwrap_or_else(PoisonError::into_inner);
            let index = adapters.iter().position(|a| a.id() == id)?;
            adapters.remove(index)
        };
        self.defaults.retain(|_, default_id| default_id != id);
        tracing::debug!(adapter = %id, "adapter unregistered");
        Some(removed)
    }

    pub fn get_by_id(&self, id: &str) -> Option<AdapterHandle> {
        self.adapters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|a| a.id() == id)
            .cloned()
    }

    /// First registered adapter for the vendor.
    pub fn get_by_vendor_type(&self, vendor: VendorType) -> Option<AdapterHandle> {
        self.adapters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|a| a.identity().vendor == vendor)
            .cloned()
    }

    /// Vendor lookup from an untyped boundary value such as `"openai"`.
    pub fn get_by_vendor_json(&self, value: &Value) -> Result<AdapterHandle, ProviderError> {
        let vendor = guards::parse_vendor_type(value)?;
        self.get_by_vendor_type(vendor)
            .ok_or_else(|| ProviderError::not_found(format!("adapter for vendor '{vendor}'")))
    }

    /// All adapters in registration order.
    pub fn get_all_adapters(&self) -> Vec<AdapterHandle> {
        self.adapters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get_adapters_by_category(&self, category: Category) -> Vec<AdapterHandle> {
        self.adapters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|a| a.identity().category == category)
            .cloned()
            .collect()
    }

    /// Make `adapter` the default for `category`, registering it if needed.
    pub fn set_default_adapter(&self, category: Category, adapter: AdapterHandle) {
        let id = adapter.id().to_string();
        if self.get_by_id(&id).is_none() {
            self.register(adapter);
        }
        tracing::debug!(%category, adapter = %id, "default adapter set");
        self.defaults.insert(category, id);
    }

    /// Make the registered adapter `id` the default for `category`.
    pub fn set_default_by_id(&self, category: Category, id: &str) -> Result<(), ProviderError> {
        let adapter = self
            .get_by_id(id)
            .ok_or_else(|| ProviderError::not_found(format!("adapter '{id}'")))?;
        self.set_default_adapter(category, adapter);
        Ok(())
    }

    pub fn get_default_adapter(&self, category: Category) -> Option<AdapterHandle> {
        let id = self.defaults.get(&category)?.value().clone();
        self.get_by_id(&id)
    }

    /// Run one real round trip on the adapter; the outcome lands in its status.
    pub async fn test_connection(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ProviderError> {
        let adapter = self
            .get_by_id(id)
            .ok_or_else(|| ProviderError::not_found(format!("adapter '{id}'")))?;
        let result = adapter.test_connection(cancel).await;
        match &result {
            Ok(()) => tracing::info!(adapter = %id, "connection test passed"),
            Err(err) => tracing::warn!(adapter = %id, error = %err, "connection test failed"),
        }
        result
    }

    /// Initialize every adapter concurrently. Failures are logged and
    /// returned, never fatal.
    pub async fn initialize_all(&self) -> Vec<(String, Result<(), ProviderError>)> {
        let adapters = self.get_all_adapters();
        let results = join_all(adapters.iter().map(|a| a.initialize())).await;
        adapters
            .iter()
            .zip(results)
            .map(|(adapter, result)| {
                if let Err(err) = &result {
                    tracing::warn!(adapter = %adapter.id(), error = %err, "adapter initialization failed");
                }
                (adapter.id().to_string(), result)
            })
            .collect()
    }

    /// Connection-test every adapter concurrently.
    pub async fn probe_all(
        &self,
        cancel: &CancellationToken,
    ) -> Vec<(String, Result<(), ProviderError>)> {
        let adapters = self.get_all_adapters();
        let results = join_all(adapters.iter().map(|a| a.test_connection(cancel))).await;
        adapters
            .iter()
            .zip(results)
            .map(|(adapter, result)| {
                if let Err(err) = &result {
                    tracing::warn!(adapter = %adapter.id(), error = %err, "adapter probe failed");
                }
                (adapter.id().to_string(), result)
            })
            .collect()
    }

    pub fn status_report(&self) -> Vec<AdapterStatusInfo> {
        self.get_all_adapters()
            .iter()
            .map(|a| a.status_info())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Consumer-facing names.

    pub fn get_provider(&self, id: &str) -> Option<AdapterHandle> {
        self.get_by_id(id)
    }

    pub fn get_default_provider(&self, category: Category) -> Option<AdapterHandle> {
        self.get_default_adapter(category)
    }

    pub fn get_all_providers(&self) -> Vec<AdapterHandle> {
        self.get_all_adapters()
    }

    pub fn get_providers_by_category(&self, category: Category) -> Vec<AdapterHandle> {
        self.get_adapters_by_category(category)
    }
}
