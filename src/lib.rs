//! Workspace entry crate.
//!
//! Re-exports the [`core_service`] façade so host applications can depend on
//! `media-player` alone and pick shims through the `desktop-shims` feature.

pub use core_service::*;
