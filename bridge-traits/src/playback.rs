//! Continuous media player bridge.
//!
//! The host owns the actual audio engine and the platform media session
//! (lock screen, notification, bluetooth controls). The core drives it through
//! [`MediaPlayer`] and listens to its transport events through
//! [`MediaPlayer::subscribe`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::broadcast;

use crate::error::Result;

/// One element of the player's queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Opaque identifier, the song's page id.
    pub id: String,
    /// Either a placeholder or a resolved, time-limited audio URL.
    pub url: String,
    pub title: String,
    pub artist: String,
    pub artwork: String,
    /// Duration in seconds; `0.0` until the player learns it.
    #[serde(default)]
    pub duration: f64,
    /// Request headers the audio host requires (user agent, referer).
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl Track {
    /// Same track pointing at a different URL.
    pub fn with_url(&self, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..self.clone()
        }
    }
}

/// Coarse playback state reported by the host player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerState {
    None,
    Ready,
    Loading,
    Buffering,
    Playing,
    Paused,
    Stopped,
    Ended,
    Error,
}

impl PlayerState {
    pub fn is_playing(&self) -> bool {
        matches!(self, PlayerState::Playing)
    }
}

/// The player's own three-way repeat primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NativeRepeatMode {
    Off,
    Track,
    Queue,
}

/// Transport controls exposed on the platform media session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerCapability {
    Play,
    Pause,
    SkipToNext,
    SkipToPrevious,
    Stop,
    SeekTo,
}

/// Options passed to [`MediaPlayer::setup`].
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerOptions {
    /// Let the player pause/duck on audio focus loss on its own.
    pub auto_handle_interruptions: bool,
    pub capabilities: Vec<PlayerCapability>,
    /// Keep playing when the host app is killed (Android).
    pub continue_when_app_killed: bool,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self {
            auto_handle_interruptions: true,
            capabilities: vec![
                PlayerCapability::Play,
                PlayerCapability::Pause,
                PlayerCapability::SkipToNext,
                PlayerCapability::SkipToPrevious,
                PlayerCapability::Stop,
                PlayerCapability::SeekTo,
            ],
            continue_when_app_killed: true,
        }
    }
}

/// Remote-control and lifecycle events emitted by the host player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum PlayerEvent {
    RemotePlay,
    RemotePause,
    /// Merged toggle; some platforms only ever send this one.
    RemotePlayPause,
    RemoteStop,
    RemoteNext,
    RemotePrevious,
    RemoteSeek {
        /// Target position in seconds.
        position: f64,
    },
    QueueEnded {
        /// Elapsed position of the last track, in seconds.
        position: f64,
        track: Option<usize>,
    },
    PlaybackError {
        message: String,
    },
    ActiveTrackChanged {
        index: Option<usize>,
    },
}

/// Continuous media player trait.
///
/// Every call may fail asynchronously; callers in the core log and swallow
/// those failures rather than propagating them to the UI.
#[async_trait]
pub trait MediaPlayer: Send + Sync {
    async fn setup(&self, options: PlayerOptions) -> Result<()>;

    /// Insert `tracks` before `at_index`, or append when `None`.
    async fn add(&self, tracks: Vec<Track>, at_index: Option<usize>) -> Result<()>;

    async fn remove(&self, index: usize) -> Result<()>;

    /// Replace the queue entry at `index`.
    ///
    /// The default removes then re-inserts; adapters with an atomic update
    /// primitive should override it.
    async fn replace(&self, index: usize, track: Track) -> Result<()> {
        self.remove(index).await?;
        self.add(vec![track], Some(index)).await
    }

    /// Move the playback cursor to `index`.
    async fn skip(&self, index: usize) -> Result<()>;

    async fn play(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    /// Stop playback and clear the queue.
    async fn reset(&self) -> Result<()>;

    async fn seek_to(&self, seconds: f64) -> Result<()>;

    async fn set_volume(&self, ratio: f32) -> Result<()>;

    async fn set_repeat_mode(&self, mode: NativeRepeatMode) -> Result<()>;

    async fn get_repeat_mode(&self) -> Result<NativeRepeatMode>;

    async fn get_queue(&self) -> Result<Vec<Track>>;

    async fn get_active_index(&self) -> Result<Option<usize>>;

    async fn get_playback_state(&self) -> Result<PlayerState>;

    /// Subscribe to transport and lifecycle events.
    fn subscribe(&self) -> broadcast::Receiver<PlayerEvent>;
}
