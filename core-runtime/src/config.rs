//! # Core Configuration Module
//!
//! Configuration management for the player core.
//!
//! ## Overview
//!
//! A builder assembles a [`CoreConfig`] holding every bridge the core needs
//! plus the upstream endpoints and tuning knobs. Validation is fail-fast:
//! `build()` returns an actionable error instead of letting a half-configured
//! core start.
//!
//! ## Required Dependencies
//!
//! - `MediaPlayer` - always host-provided
//!
//! ## Dependencies with desktop defaults
//!
//! - `HttpClient` - `ReqwestHttpClient`
//! - `KeyValueStore` - `SqliteKeyValueStore` at `<data_dir>/biliplayer/storage.db`
//!
//! `Clock` defaults to the system clock; `LoggerSink` is optional.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .media_player(Arc::new(MyPlayer::new()))
//!     .store_path("/tmp/biliplayer/storage.db")
//!     .enable_lyrics(true)
//!     .build()
//!     .await?;
//! ```
//!
//! `build()` is async because the default SQLite store opens its pool on the
//! caller's runtime.

use crate::error::{Error, Result};
use bridge_traits::{Clock, HttpClient, KeyValueStore, LoggerSink, MediaPlayer, SystemClock};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Signing keys rotate daily upstream; refreshing twice a day is enough.
pub const DEFAULT_WBI_KEY_TTL: Duration = Duration::from_secs(12 * 60 * 60);

/// Core configuration for the player core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    pub http_client: Arc<dyn HttpClient>,
    pub kv_store: Arc<dyn KeyValueStore>,
    pub media_player: Arc<dyn MediaPlayer>,
    pub clock: Arc<dyn Clock>,
    pub logger_sink: Option<Arc<dyn LoggerSink>>,
    pub bili_api: BiliApiConfig,
    pub lyrics_api: LyricsApiConfig,
    pub playback: PlaybackConfig,
    pub features: FeatureFlags,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("http_client", &"HttpClient { ... }")
            .field("kv_store", &"KeyValueStore { ... }")
            .field("media_player", &"MediaPlayer { ... }")
            .field("clock", &"Clock { ... }")
            .field(
                "logger_sink",
                &self.logger_sink.as_ref().map(|_| "LoggerSink { ... }"),
            )
            .field("bili_api", &self.bili_api)
            .field("lyrics_api", &self.lyrics_api)
            .field("playback", &self.playback)
            .field("features", &self.features)
            .finish()
    }
}

/// Feature flags control optional functionality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Enable QQ-music lyric lookup
    pub enable_lyrics: bool,

    /// Keep a randomized play order when the mode is shuffle. When off,
    /// shuffle behaves like list loop.
    pub enable_shuffle_order: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            enable_lyrics: true,
            enable_shuffle_order: true,
        }
    }
}

/// Bilibili endpoints and request identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BiliApiConfig {
    /// Base for every `x/...` endpoint
    pub api_base: String,
    pub user_agent: String,
    pub referer: String,
    /// How long fetched WBI keys stay valid
    pub wbi_key_ttl: Duration,
}

impl Default for BiliApiConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.bilibili.com".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            referer: "https://www.bilibili.com/".to_string(),
            wbi_key_ttl: DEFAULT_WBI_KEY_TTL,
        }
    }
}

impl BiliApiConfig {
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_wbi_key_ttl(mut self, ttl: Duration) -> Self {
        self.wbi_key_ttl = ttl;
        self
    }

    /// Headers every Bilibili request (and the audio CDN) expects.
    pub fn default_headers(&self) -> Vec<(String, String)> {
        vec![
            ("User-Agent".to_string(), self.user_agent.clone()),
            ("Referer".to_string(), self.referer.clone()),
        ]
    }

    pub fn validate(&self) -> Result<()> {
        if !is_http_url(&self.api_base) {
            return Err(Error::Config(format!(
                "Bilibili API base must be an http(s) URL, got '{}'",
                self.api_base
            )));
        }

        if self.user_agent.trim().is_empty() {
            return Err(Error::Config("User agent cannot be empty".to_string()));
        }

        if self.wbi_key_ttl.is_zero() {
            return Err(Error::Config(
                "WBI key TTL must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// QQ-music lyric endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LyricsApiConfig {
    /// Smartbox search, `?key=` is appended
    pub search_url: String,
    /// Desktop search used when smartbox returns nothing
    pub search_fallback_url: String,
    /// Lyric endpoint, `?songmid=...` is appended
    pub lyric_url: String,
    pub referer: String,
}

impl Default for LyricsApiConfig {
    fn default() -> Self {
        Self {
            search_url: "https://c.y.qq.com/splcloud/fcgi-bin/smartbox_new.fcg".to_string(),
            search_fallback_url: "https://u.y.qq.com/cgi-bin/musicu.fcg".to_string(),
            lyric_url: "https://i.y.qq.com/lyric/fcgi-bin/fcg_query_lyric_new.fcg".to_string(),
            referer: "https://y.qq.com/".to_string(),
        }
    }
}

impl LyricsApiConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, url) in [
            ("search_url", &self.search_url),
            ("search_fallback_url", &self.search_fallback_url),
            ("lyric_url", &self.lyric_url),
        ] {
            if !is_http_url(url) {
                return Err(Error::Config(format!(
                    "Lyrics {} must be an http(s) URL, got '{}'",
                    name, url
                )));
            }
        }
        Ok(())
    }
}

/// Queue and resolution tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackConfig {
    pub event_buffer_size: usize,
    /// Remember failed resolutions for this long. Zero disables the cache and
    /// every attempt goes upstream again.
    pub resolution_negative_cache_ttl: Duration,
    /// Volume applied when no settings are stored yet
    pub default_volume: f32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            event_buffer_size: crate::events::DEFAULT_EVENT_BUFFER_SIZE,
            resolution_negative_cache_ttl: Duration::ZERO,
            default_volume: 0.5,
        }
    }
}

impl PlaybackConfig {
    pub fn validate(&self) -> Result<()> {
        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.event_buffer_size > 10_000 {
            return Err(Error::Config(
                "Event buffer size exceeds maximum of 10,000".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.default_volume) {
            return Err(Error::Config(format!(
                "Default volume must be within 0.0..=1.0, got {}",
                self.default_volume
            )));
        }

        Ok(())
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("https://") || url.starts_with("http://")
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<()> {
        self.bili_api.validate()?;
        self.lyrics_api.validate()?;
        self.playback.validate()?;
        Ok(())
    }
}

fn media_player_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "MediaPlayer".to_string(),
        message: "MediaPlayer implementation is required to drive playback. \
                  Desktop: wrap the audio backend in a MediaPlayer adapter. \
                  Mobile: inject the platform's background audio service."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn http_client_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "HttpClient implementation is required for metadata and play-address requests. \
                  Desktop: enable the 'desktop-shims' feature to use ReqwestHttpClient. \
                  Mobile: inject the platform HTTP stack."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn kv_store_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "KeyValueStore".to_string(),
        message: "KeyValueStore implementation is required for favorites and settings. \
                  Desktop: enable the 'desktop-shims' feature to use SqliteKeyValueStore. \
                  Mobile: inject AsyncStorage/UserDefaults-backed storage."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Ok(Arc::new(bridge_desktop::ReqwestHttpClient::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(http_client_missing_error())
}

#[cfg(feature = "desktop-shims")]
async fn provide_default_kv_store(
    path: Option<PathBuf>,
    clock: Arc<dyn Clock>,
) -> Result<Arc<dyn KeyValueStore>> {
    let path = path.unwrap_or_else(bridge_desktop::default_store_path);
    let store = bridge_desktop::SqliteKeyValueStore::new(path)
        .await
        .map_err(|e| Error::Internal(format!("Failed to initialize default KeyValueStore: {}", e)))?
        .with_clock(clock);
    Ok(Arc::new(store))
}

#[cfg(not(feature = "desktop-shims"))]
async fn provide_default_kv_store(
    _path: Option<PathBuf>,
    _clock: Arc<dyn Clock>,
) -> Result<Arc<dyn KeyValueStore>> {
    Err(kv_store_missing_error())
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    http_client: Option<Arc<dyn HttpClient>>,
    kv_store: Option<Arc<dyn KeyValueStore>>,
    store_path: Option<PathBuf>,
    media_player: Option<Arc<dyn MediaPlayer>>,
    clock: Option<Arc<dyn Clock>>,
    logger_sink: Option<Arc<dyn LoggerSink>>,
    bili_api: Option<BiliApiConfig>,
    lyrics_api: Option<LyricsApiConfig>,
    playback: Option<PlaybackConfig>,
    features: Option<FeatureFlags>,
}

impl CoreConfigBuilder {
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn kv_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.kv_store = Some(store);
        self
    }

    /// Location of the default SQLite store. Ignored when a `kv_store` is
    /// injected.
    pub fn store_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.store_path = Some(path.into());
        self
    }

    pub fn media_player(mut self, player: Arc<dyn MediaPlayer>) -> Self {
        self.media_player = Some(player);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    pub fn bili_api(mut self, config: BiliApiConfig) -> Self {
        self.bili_api = Some(config);
        self
    }

    pub fn lyrics_api(mut self, config: LyricsApiConfig) -> Self {
        self.lyrics_api = Some(config);
        self
    }

    pub fn playback(mut self, config: PlaybackConfig) -> Self {
        self.playback = Some(config);
        self
    }

    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = Some(features);
        self
    }

    pub fn enable_lyrics(mut self, enabled: bool) -> Self {
        self.features.get_or_insert_with(FeatureFlags::default).enable_lyrics = enabled;
        self
    }

    pub fn enable_shuffle_order(mut self, enabled: bool) -> Self {
        self.features
            .get_or_insert_with(FeatureFlags::default)
            .enable_shuffle_order = enabled;
        self
    }

    /// Builds the final `CoreConfig`.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] when the media player is absent, or when
    ///   the HTTP client or store is absent without `desktop-shims`
    /// - [`Error::Config`] when a section fails validation
    /// - [`Error::Internal`] when the default store cannot be opened
    pub async fn build(self) -> Result<CoreConfig> {
        let media_player = self.media_player.ok_or_else(media_player_missing_error)?;

        let bili_api = self.bili_api.unwrap_or_default();
        let lyrics_api = self.lyrics_api.unwrap_or_default();
        let playback = self.playback.unwrap_or_default();
        bili_api.validate()?;
        lyrics_api.validate()?;
        playback.validate()?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let kv_store = match self.kv_store {
            Some(store) => store,
            None => provide_default_kv_store(self.store_path, clock.clone()).await?,
        };

        Ok(CoreConfig {
            http_client,
            kv_store,
            media_player,
            clock,
            logger_sink: self.logger_sink,
            bili_api,
            lyrics_api,
            playback,
            features: self.features.unwrap_or_default(),
        })
    }
}
