//! # Host Bridge Traits
//!
//! Capabilities the player core needs from the host platform.
//!
//! ## Overview
//!
//! The core never talks to the network, the disk or the audio engine
//! directly. Each of those is a trait defined here and implemented once per
//! platform (desktop adapters live in `bridge-desktop`; mobile hosts inject
//! their own).
//!
//! ## Traits
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Async HTTP with optional retry/backoff
//!
//! ### Storage
//! - [`KeyValueStore`](storage::KeyValueStore) - String-keyed JSON persistence
//!
//! ### Playback
//! - [`MediaPlayer`](playback::MediaPlayer) - Continuous queue player plus
//!   remote-control event stream
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits return [`BridgeError`](error::BridgeError). Adapters
//! convert platform errors into it and keep the message actionable.
//!
//! ## Thread Safety
//!
//! Every trait requires `Send + Sync` so implementations can be shared as
//! `Arc<dyn Trait>` across tasks.

pub mod error;
pub mod http;
pub mod playback;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use playback::{
    MediaPlayer, NativeRepeatMode, PlayerCapability, PlayerEvent, PlayerOptions, PlayerState,
    Track,
};
pub use storage::{InMemoryKeyValueStore, KeyValueStore};
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, SystemClock};
