//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest` (rustls, pooled connections)
//! - `KeyValueStore` using a SQLite key-value table via `sqlx`
//!
//! The media player is never provided here: desktop hosts bring their own
//! audio engine and implement `MediaPlayer` themselves.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{default_store_path, ReqwestHttpClient, SqliteKeyValueStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     let http_client = ReqwestHttpClient::new();
//!     let store = SqliteKeyValueStore::new(default_store_path()).await.unwrap();
//!     // Hand both to core_runtime::config::CoreConfig::builder()
//! }
//! ```

mod http;
mod kv_store;

use std::path::PathBuf;

pub use http::ReqwestHttpClient;
pub use kv_store::SqliteKeyValueStore;

/// `<data dir>/biliplayer/storage.db`, falling back to the working directory
/// when the platform has no data directory.
pub fn default_store_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("biliplayer")
        .join("storage.db")
}
