//! Provider abstraction core for omnigen.
//!
//! This crate defines the ports the infrastructure layer implements
//! (`KeyResolver`, `NetworkGateway`) and the shared adapter behavior every
//! vendor gets: option clamping, lazy single-flight credential resolution,
//! fixed-backoff retry, fixed-window rate limiting, status tracking and usage
//! metrics. It depends only on `omnigen-types`, never on `omnigen-infra`.

pub mod credential;
pub mod gateway;
pub mod provider;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;
