//! # Playback Error Types
//!
//! Errors produced while resolving and driving the player queue.
//!
//! `PlaybackError` is `Clone` because one resolution result is shared by every
//! caller waiting on the same queue position.

use bridge_traits::BridgeError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaybackError {
    // ========================================================================
    // Resolution Errors
    // ========================================================================
    /// Placeholder URL did not decode to a `(bvid, cid)` pair. Permanent.
    #[error("Invalid placeholder URL: {0}")]
    PlaceholderDecode(String),

    /// No audio address could be obtained for the entry.
    #[error("No play address for {bvid}/{cid}")]
    Unavailable { bvid: String, cid: String },

    /// The queue entry changed while its address was being fetched.
    #[error("Queue changed at position {index} during resolution")]
    QueueChanged { index: usize },

    #[error("Position {index} out of range for queue of {len}")]
    PositionOutOfRange { index: usize, len: usize },

    // ========================================================================
    // Player Errors
    // ========================================================================
    /// The host player rejected a call.
    #[error("Player error: {0}")]
    Player(String),

    /// Every queue position was tried and none could be played.
    #[error("No playable track after {attempted} attempts")]
    Exhausted { attempted: usize },
}

impl PlaybackError {
    /// Returns `true` when a later attempt at the same position may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PlaybackError::Unavailable { .. }
                | PlaybackError::QueueChanged { .. }
                | PlaybackError::Player(_)
        )
    }
}

impl From<BridgeError> for PlaybackError {
    fn from(e: BridgeError) -> Self {
        PlaybackError::Player(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PlaybackError>;
