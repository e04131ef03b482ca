//! # Playback Queue Controller
//!
//! Owns the mapping from songs to player queue entries and drives the host
//! player.
//!
//! ## Failure policy
//!
//! No method returns an error. Player failures are logged and swallowed;
//! resolution failures advance to the next position. [`QueueController::play_at`]
//! tries each position at most once per call, so a queue where nothing can be
//! resolved ends in [`PlaybackEvent::QueueExhausted`] rather than a loop.
//!
//! ## Usage
//!
//! ```ignore
//! let controller = QueueController::new(player, resolver);
//! controller.enqueue_fast(&songs, true).await;
//! controller.play_at(0).await;
//! ```

use crate::placeholder::{is_placeholder_url, placeholder_track};
use crate::play_mode::{native_repeat_mode, ShuffleOrder};
use crate::resolver::TrackResolver;
use bridge_traits::playback::{MediaPlayer, PlayerOptions, Track};
use core_library::{PlayMode, Song};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use futures::future::join_all;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub struct QueueController {
    player: Arc<dyn MediaPlayer>,
    resolver: Arc<TrackResolver>,
    event_bus: Option<EventBus>,
    shuffle_enabled: bool,
    initialized: AtomicBool,
    mode: Mutex<PlayMode>,
    shuffle: Mutex<Option<ShuffleOrder>>,
}

/// Logs a failed player call and yields `None`.
macro_rules! player_call {
    ($what:expr, $call:expr) => {
        match $call.await {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(error = %e, "Player {} failed", $what);
                None
            }
        }
    };
}

impl QueueController {
    pub fn new(player: Arc<dyn MediaPlayer>, resolver: Arc<TrackResolver>) -> Self {
        Self {
            player,
            resolver,
            event_bus: None,
            shuffle_enabled: true,
            initialized: AtomicBool::new(false),
            mode: Mutex::new(PlayMode::default()),
            shuffle: Mutex::new(None),
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// When disabled, shuffle mode only sets queue repeat and playback stays
    /// in insertion order.
    pub fn with_shuffle_order(mut self, enabled: bool) -> Self {
        self.shuffle_enabled = enabled;
        self
    }

    /// Set up the host player once. Later calls return `true` immediately.
    pub async fn setup(&self, options: PlayerOptions) -> bool {
        if self.initialized.load(Ordering::SeqCst) {
            return true;
        }
        match self.player.setup(options).await {
            Ok(()) => {
                self.initialized.store(true, Ordering::SeqCst);
                info!("Player set up");
                true
            }
            Err(e) => {
                error!(error = %e, "Player setup failed");
                false
            }
        }
    }

    // =========================================================================
    // Enqueueing
    // =========================================================================

    /// Append placeholder entries without any network calls.
    pub async fn enqueue_fast(&self, songs: &[Song], clear_first: bool) {
        if clear_first && player_call!("reset", self.player.reset()).is_none() {
            return;
        }

        let tracks: Vec<Track> = songs
            .iter()
            .map(|song| placeholder_track(song, self.resolver.headers()))
            .collect();
        let count = tracks.len();

        if player_call!("add", self.player.add(tracks, None)).is_some() {
            debug!(count, clear_first, "Enqueued placeholders");
            self.after_queue_change(clear_first).await;
        }
    }

    /// Resolve every song up front and enqueue only the playable ones.
    ///
    /// Returns how many songs were added.
    pub async fn enqueue_resolved(&self, songs: &[Song], clear_first: bool) -> usize {
        if clear_first && player_call!("reset", self.player.reset()).is_none() {
            return 0;
        }

        let resolved = join_all(songs.iter().map(|song| self.resolver.resolve_song(song))).await;
        let tracks: Vec<Track> = resolved.into_iter().flatten().collect();
        let count = tracks.len();
        if count < songs.len() {
            warn!(
                dropped = songs.len() - count,
                "Some songs had no play address and were not enqueued"
            );
        }
        if tracks.is_empty() {
            return 0;
        }

        if player_call!("add", self.player.add(tracks, None)).is_none() {
            return 0;
        }
        self.after_queue_change(clear_first).await;
        count
    }

    async fn after_queue_change(&self, replaced: bool) {
        let len = self.queue().await.len();
        if replaced {
            self.emit(PlaybackEvent::QueueReplaced { length: len });
        }
        self.reshuffle(len);
    }

    // =========================================================================
    // Playback
    // =========================================================================

    /// Play the entry at `index`, advancing past entries that cannot be
    /// resolved. Returns whether playback started.
    pub async fn play_at(&self, index: usize) -> bool {
        let len = self.queue().await.len();
        if index >= len {
            debug!(index, len, "play_at outside queue");
            return false;
        }

        let attempts = self.attempt_order(index, len);
        self.play_first_playable(&attempts, 0).await
    }

    /// Play the first of `attempts` that resolves. `failed` counts entries
    /// the caller already found unresolvable.
    async fn play_first_playable(&self, attempts: &[usize], failed: usize) -> bool {
        for (tried, position) in attempts.iter().copied().enumerate() {
            let track = match self.resolver.resolve(position).await {
                Ok(track) => track,
                Err(e) => {
                    debug!(position, attempt = failed + tried + 1, error = %e, "Advancing past entry");
                    continue;
                }
            };

            if player_call!("skip", self.player.skip(position)).is_none() {
                continue;
            }
            if player_call!("play", self.player.play()).is_none() {
                return false;
            }

            info!(position, song_id = %track.id, "Playing");
            self.emit(PlaybackEvent::TrackStarted {
                index: position,
                song_id: track.id,
                title: track.title,
            });
            return true;
        }

        let attempted = failed + attempts.len();
        error!(attempted, "No playable entry in queue");
        self.emit(PlaybackEvent::QueueExhausted { attempted });
        false
    }

    /// Play `song`, inserting it at the front of the queue when it is not
    /// already queued. Nothing changes when its address cannot be found.
    pub async fn play_song(&self, song: &Song) -> bool {
        let queue = self.queue().await;
        if let Some(index) = queue.iter().position(|track| track.id == song.id) {
            return self.play_at(index).await;
        }

        let track = match self.resolver.resolve_song(song).await {
            Some(track) => track,
            None => {
                warn!(song_id = %song.id, "No play address; song not queued");
                return false;
            }
        };

        if player_call!("add", self.player.add(vec![track.clone()], Some(0))).is_none() {
            return false;
        }
        self.reshuffle(queue.len() + 1);

        if player_call!("skip", self.player.skip(0)).is_none()
            || player_call!("play", self.player.play()).is_none()
        {
            return false;
        }
        self.emit(PlaybackEvent::TrackStarted {
            index: 0,
            song_id: track.id,
            title: track.title,
        });
        true
    }

    pub async fn toggle_play_pause(&self) {
        let playing = player_call!("state", self.player.get_playback_state())
            .map(|state| state.is_playing())
            .unwrap_or(false);

        if playing {
            self.pause().await;
        } else {
            self.resume().await;
        }
    }

    /// Resume at the active entry, resolving it first when needed. The cursor
    /// is not moved, so the playback position is kept.
    pub async fn resume(&self) {
        let active = player_call!("active index", self.player.get_active_index()).flatten();
        if let Some(index) = active {
            if let Err(e) = self.resolver.resolve(index).await {
                debug!(index, error = %e, "Active entry unresolvable, advancing");
                let len = self.queue().await.len();
                if len > 0 {
                    let rest: Vec<usize> = self
                        .attempt_order(self.next_index(index, len), len)
                        .into_iter()
                        .filter(|&position| position != index)
                        .collect();
                    self.play_first_playable(&rest, 1).await;
                }
                return;
            }
        }
        player_call!("play", self.player.play());
    }

    pub async fn pause(&self) {
        player_call!("pause", self.player.pause());
    }

    pub async fn stop(&self) {
        player_call!("stop", self.player.stop());
    }

    pub async fn skip_next(&self) {
        if let Some((active, len)) = self.cursor().await {
            self.play_at(self.next_index(active, len)).await;
        }
    }

    pub async fn skip_previous(&self) {
        if let Some((active, len)) = self.cursor().await {
            self.play_at(self.previous_index(active, len)).await;
        }
    }

    /// Start over from the first entry of the current play order.
    pub async fn restart(&self) -> bool {
        let len = self.queue().await.len();
        if len == 0 {
            return false;
        }
        let first = self
            .shuffle
            .lock()
            .as_ref()
            .filter(|order| order.len() == len)
            .and_then(ShuffleOrder::first)
            .unwrap_or(0);
        self.play_at(first).await
    }

    // =========================================================================
    // Pass-throughs
    // =========================================================================

    pub async fn seek_to(&self, seconds: f64) {
        player_call!("seek", self.player.seek_to(seconds));
    }

    pub async fn set_volume(&self, ratio: f32) {
        player_call!("volume", self.player.set_volume(ratio.clamp(0.0, 1.0)));
    }

    pub async fn remove_at(&self, index: usize) {
        if player_call!("remove", self.player.remove(index)).is_some() {
            self.after_queue_change(false).await;
        }
    }

    pub async fn clear(&self) {
        if player_call!("reset", self.player.reset()).is_some() {
            self.after_queue_change(true).await;
        }
    }

    pub async fn set_repeat_mode(&self, mode: PlayMode) {
        *self.mode.lock() = mode;
        player_call!(
            "repeat mode",
            self.player.set_repeat_mode(native_repeat_mode(mode))
        );

        let len = self.queue().await.len();
        self.reshuffle(len);
        info!(mode = %mode, "Play mode set");
        self.emit(PlaybackEvent::PlayModeChanged {
            mode: mode.to_string(),
        });
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn play_mode(&self) -> PlayMode {
        *self.mode.lock()
    }

    pub async fn queue(&self) -> Vec<Track> {
        player_call!("queue", self.player.get_queue()).unwrap_or_default()
    }

    pub async fn active_index(&self) -> Option<usize> {
        player_call!("active index", self.player.get_active_index()).flatten()
    }

    /// Whether the entry at `index` still needs resolving and nobody is on it.
    pub async fn needs_resolution(&self, index: usize) -> bool {
        if self.resolver.is_resolving(index) {
            return false;
        }
        self.queue()
            .await
            .get(index)
            .map(|track| is_placeholder_url(&track.url))
            .unwrap_or(false)
    }

    pub fn shuffle_order(&self) -> Option<ShuffleOrder> {
        self.shuffle.lock().clone()
    }

    // =========================================================================
    // Ordering
    // =========================================================================

    async fn cursor(&self) -> Option<(usize, usize)> {
        let active = self.active_index().await?;
        let len = self.queue().await.len();
        (len > 0).then_some((active, len))
    }

    fn shuffling(&self) -> bool {
        self.shuffle_enabled && *self.mode.lock() == PlayMode::Shuffle
    }

    fn reshuffle(&self, len: usize) {
        let order = self.shuffling().then(|| ShuffleOrder::new(len));
        *self.shuffle.lock() = order;
    }

    /// The shuffle order, only when it still matches the queue length.
    fn current_order(&self, len: usize) -> Option<ShuffleOrder> {
        self.shuffle
            .lock()
            .as_ref()
            .filter(|order| order.len() == len)
            .cloned()
    }

    fn next_index(&self, index: usize, len: usize) -> usize {
        self.current_order(len)
            .and_then(|order| order.next_after(index))
            .unwrap_or((index + 1) % len)
    }

    fn previous_index(&self, index: usize, len: usize) -> usize {
        self.current_order(len)
            .and_then(|order| order.previous_before(index))
            .unwrap_or((index + len - 1) % len)
    }

    fn attempt_order(&self, start: usize, len: usize) -> Vec<usize> {
        self.current_order(len)
            .and_then(|order| order.rotation_from(start))
            .unwrap_or_else(|| (0..len).map(|k| (start + k) % len).collect())
    }

    fn emit(&self, event: PlaybackEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Playback(event)).ok();
        }
    }
}
