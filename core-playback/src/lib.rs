//! # Playback Module
//!
//! Lazily resolved playback queue on top of a host media player.
//!
//! ## Overview
//!
//! This module handles:
//! - Placeholder URLs for songs whose audio address is not known yet
//! - Single-flight resolution of placeholders to real audio addresses
//! - The queue controller (play, skip, toggle, auto-advance on failure)
//! - Play mode mapping and shuffle order
//! - The bridge from remote-control events to the controller

pub mod error;
pub mod placeholder;
pub mod play_mode;
pub mod queue;
pub mod remote;
pub mod resolver;

pub use error::{PlaybackError, Result};
pub use placeholder::{
    create_placeholder_url, is_placeholder_url, parse_placeholder_url, PlaceholderRef,
};
pub use play_mode::{native_repeat_mode, ShuffleOrder};
pub use queue::QueueController;
pub use remote::RemoteControlBridge;
pub use resolver::TrackResolver;
