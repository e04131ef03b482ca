//! Core service façade and bootstrap helpers.
//!
//! This crate wires the host-provided bridges from a [`CoreConfig`] into the
//! metadata clients, the favorites store and the playback queue, and keeps
//! the playing-list session that the UI renders. Desktop apps typically enable
//! the `desktop-shims` feature, which supplies a reqwest HTTP client and a
//! SQLite store when the host does not inject its own.
//!
//! ```ignore
//! let config = CoreConfig::builder().media_player(player).build().await?;
//! let core = CoreService::new(config);
//! core.initialize().await?;
//! core.play_list(songs, 0).await?;
//! ```

pub mod error;

pub use error::{CoreError, ErrorCategory, Result};

#[cfg(all(feature = "desktop-shims", not(target_arch = "wasm32")))]
pub use bridge_desktop::{ReqwestHttpClient, SqliteKeyValueStore};

use bridge_traits::playback::{MediaPlayer, PlayerOptions};
use core_library::{FavList, FavoritesStore, PlayMode, PlayerSettings, Song};
use core_metadata::{
    extract_song_name, BiliClient, LyricOption, LyricsClient, SearchResult, NO_LYRIC,
};
use core_playback::{QueueController, RemoteControlBridge, TrackResolver};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Primary façade exposed to host applications.
pub struct CoreService {
    player: Arc<dyn MediaPlayer>,
    bili: Arc<BiliClient>,
    lyrics: Option<LyricsClient>,
    store: FavoritesStore,
    controller: Arc<QueueController>,
    bridge: Arc<RemoteControlBridge>,
    event_bus: EventBus,
    /// Songs in the order the player queue was built from.
    playing_list: AsyncMutex<Vec<Song>>,
    bridge_task: Mutex<Option<JoinHandle<()>>>,
    initialized: AtomicBool,
    /// Volume used until the user has stored settings.
    default_volume: f32,
}

impl CoreService {
    pub fn new(config: CoreConfig) -> Self {
        let event_bus = EventBus::new(config.playback.event_buffer_size);
        let default_volume = config.playback.default_volume;

        let bili = Arc::new(BiliClient::new(
            config.http_client.clone(),
            config.clock.clone(),
            config.bili_api.clone(),
        ));
        let lyrics = config
            .features
            .enable_lyrics
            .then(|| LyricsClient::new(config.http_client.clone(), config.lyrics_api.clone()));

        let store = FavoritesStore::new(config.kv_store.clone())
            .with_song_list_provider(bili.clone())
            .with_event_bus(event_bus.clone());

        let headers: HashMap<String, String> =
            config.bili_api.default_headers().into_iter().collect();
        let resolver = TrackResolver::new(
            config.media_player.clone(),
            bili.clone(),
            config.clock.clone(),
            headers,
        )
        .with_event_bus(event_bus.clone())
        .with_negative_cache(config.playback.resolution_negative_cache_ttl);

        let controller = Arc::new(
            QueueController::new(config.media_player.clone(), Arc::new(resolver))
                .with_event_bus(event_bus.clone())
                .with_shuffle_order(config.features.enable_shuffle_order),
        );
        let bridge = Arc::new(RemoteControlBridge::new(
            controller.clone(),
            config.media_player.clone(),
        ));

        Self {
            player: config.media_player,
            bili,
            lyrics,
            store,
            controller,
            bridge,
            event_bus,
            playing_list: AsyncMutex::new(Vec::new()),
            bridge_task: Mutex::new(None),
            initialized: AtomicBool::new(false),
            default_volume,
        }
    }

    /// Startup flow. Sets up the player, restores settings and favorites,
    /// queues the last session and starts the remote control bridge.
    ///
    /// Later calls return immediately.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<()> {
        if self.initialized.load(Ordering::SeqCst) {
            return Ok(());
        }

        if !self.controller.setup(PlayerOptions::default()).await {
            return Err(CoreError::InitializationFailed(
                "media player setup failed".to_string(),
            ));
        }
        self.spawn_bridge();

        let settings = self.player_settings().await?;
        self.controller.set_repeat_mode(settings.play_mode).await;
        self.controller.set_volume(settings.default_volume).await;

        let lists = self.store.init_fav_lists().await?;
        let last = self.store.get_last_play_list().await?;
        let session = if !last.is_empty() {
            last
        } else {
            lists
                .into_iter()
                .next()
                .map(|list| list.song_list)
                .unwrap_or_default()
        };

        if !session.is_empty() {
            self.controller.enqueue_fast(&session, true).await;
            let len = session.len();
            *self.playing_list.lock().await = session;
            self.controller.play_at(0).await;
            info!(songs = len, "Restored playing list");
        }

        self.initialized.store(true, Ordering::SeqCst);
        info!("Core service initialized");
        Ok(())
    }

    fn spawn_bridge(&self) {
        let mut task = self.bridge_task.lock();
        if task.is_none() {
            *task = Some(self.bridge.clone().spawn());
        }
    }

    /// Stop handling remote control events.
    pub fn shutdown(&self) {
        if let Some(task) = self.bridge_task.lock().take() {
            task.abort();
            debug!("Remote control bridge aborted");
        }
    }

    // =========================================================================
    // Playing list
    // =========================================================================

    /// Replace the queue with `songs` and start at `start`.
    #[instrument(skip(self, songs), fields(count = songs.len()))]
    pub async fn play_list(&self, songs: Vec<Song>, start: usize) -> Result<bool> {
        self.controller.enqueue_fast(&songs, true).await;
        self.store.set_last_play_list(&songs).await?;
        *self.playing_list.lock().await = songs;
        Ok(self.controller.play_at(start).await)
    }

    /// Play one song. A song that starts and was not in the playing list is
    /// prepended to it.
    #[instrument(skip(self, song), fields(song_id = %song.id))]
    pub async fn play_song(&self, song: Song) -> Result<bool> {
        if !self.controller.play_song(&song).await {
            return Ok(false);
        }
        self.store.set_current_playing(&song).await?;

        let mut list = self.playing_list.lock().await;
        if !list.iter().any(|s| s.id == song.id) {
            list.insert(0, song);
            self.store.set_last_play_list(&list).await?;
        }
        Ok(true)
    }

    /// Append songs not already playing. Songs without a play address are
    /// dropped. Returns how many were queued.
    #[instrument(skip(self, songs), fields(count = songs.len()))]
    pub async fn add_to_queue(&self, songs: &[Song]) -> Result<usize> {
        let mut list = self.playing_list.lock().await;
        let known: HashSet<&str> = list.iter().map(|s| s.id.as_str()).collect();
        let fresh: Vec<Song> = songs
            .iter()
            .filter(|song| !known.contains(song.id.as_str()))
            .cloned()
            .collect();
        if fresh.is_empty() {
            return Ok(0);
        }

        let added = self.controller.enqueue_resolved(&fresh, false).await;
        if added == 0 {
            return Ok(0);
        }

        let queued: HashSet<String> = self
            .controller
            .queue()
            .await
            .into_iter()
            .map(|track| track.id)
            .collect();
        list.extend(fresh.into_iter().filter(|song| queued.contains(&song.id)));
        self.store.set_last_play_list(&list).await?;
        Ok(added)
    }

    pub async fn playing_list(&self) -> Vec<Song> {
        self.playing_list.lock().await.clone()
    }

    /// The playing-list entry for the player's active track.
    pub async fn current_song(&self) -> Option<Song> {
        let index = self.controller.active_index().await?;
        let track = self.controller.queue().await.into_iter().nth(index)?;
        self.playing_list
            .lock()
            .await
            .iter()
            .find(|song| song.id == track.id)
            .cloned()
    }

    pub async fn set_play_mode(&self, mode: PlayMode) -> Result<()> {
        self.controller.set_repeat_mode(mode).await;
        let mut settings = self.player_settings().await?;
        settings.play_mode = mode;
        self.store.set_player_settings(&settings).await?;
        Ok(())
    }

    /// Stored settings, or the defaults with the configured volume.
    async fn player_settings(&self) -> Result<PlayerSettings> {
        Ok(self
            .store
            .stored_player_settings()
            .await?
            .unwrap_or_else(|| PlayerSettings {
                default_volume: self.default_volume,
                ..PlayerSettings::default()
            }))
    }

    // =========================================================================
    // Search and lyrics
    // =========================================================================

    pub async fn search(&self, input: &str) -> SearchResult {
        self.bili.search(input).await
    }

    /// Search results wrapped as the transient search list.
    pub async fn search_list(&self, input: &str) -> (FavList, Option<String>) {
        let result = self.search(input).await;
        let mut list = FavList::with_songs(result.title, result.songs);
        list.info.id = SEARCH_LIST_ID.to_string();
        (list, result.error)
    }

    /// Lyric text for `song`. Uses the stored mapping when there is one;
    /// otherwise searches by song name and remembers the best match.
    pub async fn load_lyric(&self, song: &Song) -> Result<String> {
        let Some(lyrics) = &self.lyrics else {
            return Ok(NO_LYRIC.to_string());
        };

        if let Some(mapping) = self.store.get_lyric_detail(&song.id).await? {
            return Ok(lyrics.fetch_lyric(&mapping.lrc.song_mid).await);
        }

        let options = lyrics
            .search_lyric_options(extract_song_name(&song.name))
            .await;
        match options.into_iter().next() {
            Some(best) => self.select_lyric(&song.id, best).await,
            None => {
                warn!(song_id = %song.id, "No lyric candidates");
                Ok(NO_LYRIC.to_string())
            }
        }
    }

    /// Bind `option` to the song and return its lyric text.
    pub async fn select_lyric(&self, song_id: &str, option: LyricOption) -> Result<String> {
        let Some(lyrics) = &self.lyrics else {
            return Ok(NO_LYRIC.to_string());
        };
        let text = lyrics.fetch_lyric(&option.song_mid).await;
        self.store.set_lyric_detail(song_id, option.into()).await?;
        Ok(text)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn favorites(&self) -> &FavoritesStore {
        &self.store
    }

    pub fn controller(&self) -> &Arc<QueueController> {
        &self.controller
    }

    pub fn bili(&self) -> &Arc<BiliClient> {
        &self.bili
    }

    pub fn lyrics(&self) -> Option<&LyricsClient> {
        self.lyrics.as_ref()
    }

    pub fn player(&self) -> &Arc<dyn MediaPlayer> {
        &self.player
    }

    pub fn events(&self) -> broadcast::Receiver<CoreEvent> {
        self.event_bus.subscribe()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }
}

impl Drop for CoreService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Id of the transient list holding search results.
pub const SEARCH_LIST_ID: &str = "FavList-Search";
