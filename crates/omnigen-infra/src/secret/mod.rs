//! Key resolvers: environment variables and chains of resolvers.
//!
//! The OS keychain resolver lives in [`crate::keychain`].

pub mod chain;
pub mod env;

pub use chain::{ChainKeyResolver, build_default_chain};
pub use env::EnvKeyResolver;
