//! `sitepick` crate (library surface).
//!
//! The primary entrypoint for end users is the `sitepick` binary. This module
//! re-exports the engine and its network adapters for embedding.

pub use sitepick_core as core;
pub use sitepick_local as local;
