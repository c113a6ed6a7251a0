//! Provider adapter abstractions.
//!
//! - `ProviderAdapter`: RPITIT trait vendor adapters implement
//! - `BoxProviderAdapter`: object-safe wrapper for dynamic dispatch
//! - `AdapterBase`: shared credential, resilience, status and usage state
//! - `ProviderRegistry`: runtime lookup and category defaults

pub mod adapter;
pub mod base;
pub mod box_adapter;
pub mod cost;
pub mod prompt;
pub mod registry;
pub mod resilience;
pub mod status;
