//! Cost estimation port.

use std::sync::Arc;

use omnigen_types::provider::{UsageMeta, VendorType};

/// Prices a vendor call in USD. Implemented by the pricing table in
/// omnigen-infra.
pub trait CostEstimator: Send + Sync {
    fn token_cost(&self, vendor: VendorType, model: &str, usage: &UsageMeta) -> f64;

    /// Cost of `items` generated artifacts (images, speech clips).
    fn item_cost(&self, vendor: VendorType, model: &str, items: u32) -> f64;
}

pub type DynCostEstimator = Arc<dyn CostEstimator>;

/// Prices everything at zero. Used when no pricing table is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCost;

impl CostEstimator for NoCost {
    fn token_cost(&self, _vendor: VendorType, _model: &str, _usage: &UsageMeta) -> f64 {
        0.0
    }

    fn item_cost(&self, _vendor: VendorType, _model: &str, _items: u32) -> f64 {
        0.0
    }
}
