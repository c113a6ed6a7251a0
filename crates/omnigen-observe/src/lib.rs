//! Observability setup for processes hosting omnigen adapters.
//!
//! Adapters emit `gen_ai.*` spans and `omnigen::usage` events through
//! `tracing`; this crate installs the subscriber that renders or exports them.

pub mod tracing_setup;
