//! Shared domain types for omnigen.
//!
//! This crate contains the data model of the provider abstraction: adapter
//! identity and capabilities, generation options and context, documents,
//! status and usage snapshots, configuration, the normalized `ProviderError`,
//! and the JSON validation guards applied at every boundary crossing.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod config;
pub mod error;
pub mod guards;
pub mod provider;
