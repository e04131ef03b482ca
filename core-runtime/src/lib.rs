//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the player core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! ## Overview
//!
//! Every other core crate depends on this one for its logging conventions,
//! the shared [`config::CoreConfig`] and the [`events::EventBus`] used to
//! notify the UI about resolution failures and library changes.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
