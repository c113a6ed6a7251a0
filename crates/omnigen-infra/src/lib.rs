//! Infrastructure layer for omnigen.
//!
//! Contains the concrete implementations behind the ports defined in
//! `omnigen-core`: the five vendor adapters, the reqwest-based network
//! gateway, key resolvers (environment, OS keychain, chains of both), the
//! TOML config loader, the pricing table, and the startup bootstrap that
//! assembles a ready `ProviderRegistry`.

pub mod adapter;
pub mod bootstrap;
pub mod config;
pub mod gateway;
pub mod keychain;
pub mod pricing;
pub mod secret;

#[cfg(test)]
pub(crate) mod testing;
