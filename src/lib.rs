//! Workspace umbrella crate.
//!
//! Host applications can depend on `biliplayer-workspace` with the
//! `desktop-shims` feature instead of wiring `core-service` and the desktop
//! bridges individually.

#[cfg(feature = "desktop-shims")]
pub use core_service as service;
