//! Public facade crate for `sitepick`.
//!
//! Contains no IO or provider-specific logic; it re-exports the URL scoring,
//! classification and ranking engine from `sitepick-core`.

pub use sitepick_core::*;
