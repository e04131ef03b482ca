//! # Remote Control Bridge
//!
//! Routes lock-screen, notification and headset events from the host player
//! to the [`QueueController`].
//!
//! | Event | Action |
//! |-------|--------|
//! | `RemotePlay` | resume |
//! | `RemotePause` | pause |
//! | `RemotePlayPause` | pause when playing, resume otherwise |
//! | `RemoteStop` | stop |
//! | `RemoteNext` / `RemotePrevious` | skip |
//! | `RemoteSeek` | seek |
//! | `QueueEnded` | restart unless repeat is off |
//! | `PlaybackError` | replay the active entry |
//! | `ActiveTrackChanged` | resolve-or-advance a placeholder entry |

use crate::queue::QueueController;
use bridge_traits::playback::{MediaPlayer, NativeRepeatMode, PlayerEvent};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub struct RemoteControlBridge {
    controller: Arc<QueueController>,
    player: Arc<dyn MediaPlayer>,
}

impl RemoteControlBridge {
    pub fn new(controller: Arc<QueueController>, player: Arc<dyn MediaPlayer>) -> Self {
        Self { controller, player }
    }

    /// Subscribe to the player's events and handle them until the channel
    /// closes. Must be called from within a Tokio runtime.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        let events = self.player.subscribe();
        tokio::spawn(self.run(events))
    }

    /// Event loop over an existing subscription.
    pub async fn run(self: Arc<Self>, mut events: broadcast::Receiver<PlayerEvent>) {
        info!("Remote control bridge started");
        loop {
            match events.recv().await {
                Ok(event) => self.handle(event).await,
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "Remote control bridge lagged behind player events");
                }
                Err(RecvError::Closed) => break,
            }
        }
        info!("Remote control bridge stopped");
    }

    pub async fn handle(&self, event: PlayerEvent) {
        debug!(?event, "Player event");
        match event {
            PlayerEvent::RemotePlay => self.controller.resume().await,
            PlayerEvent::RemotePause => self.controller.pause().await,
            // Some platforms only ever send the merged toggle.
            PlayerEvent::RemotePlayPause => self.controller.toggle_play_pause().await,
            PlayerEvent::RemoteStop => self.controller.stop().await,
            PlayerEvent::RemoteNext => self.controller.skip_next().await,
            PlayerEvent::RemotePrevious => self.controller.skip_previous().await,
            PlayerEvent::RemoteSeek { position } => self.controller.seek_to(position).await,
            PlayerEvent::QueueEnded { position, .. } => self.on_queue_ended(position).await,
            PlayerEvent::PlaybackError { message } => self.on_playback_error(&message).await,
            PlayerEvent::ActiveTrackChanged { index } => {
                if let Some(index) = index {
                    self.on_active_track_changed(index).await;
                }
            }
        }
    }

    async fn on_queue_ended(&self, position: f64) {
        // A zero position means nothing actually played.
        if position <= 0.0 {
            return;
        }

        let repeat = match self.player.get_repeat_mode().await {
            Ok(mode) => mode,
            Err(e) => {
                warn!(error = %e, "Could not read repeat mode");
                return;
            }
        };
        if repeat == NativeRepeatMode::Off {
            debug!("Queue ended with repeat off");
            return;
        }

        self.controller.restart().await;
    }

    async fn on_playback_error(&self, message: &str) {
        warn!(message = %message, "Player reported a playback error");
        if let Some(index) = self.controller.active_index().await {
            self.controller.play_at(index).await;
        }
    }

    async fn on_active_track_changed(&self, index: usize) {
        if self.controller.needs_resolution(index).await {
            debug!(index, "Player moved onto an unresolved entry");
            self.controller.play_at(index).await;
        }
    }
}
