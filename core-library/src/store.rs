//! # Favorites & Settings Store
//!
//! Persists favorite lists, the last played list, lyric mappings and player
//! settings as JSON values in a [`KeyValueStore`].
//!
//! ## Layout
//!
//! | Key | Value |
//! |-----|-------|
//! | `MyFavList` | ordered list ids |
//! | `<list id>` | one [`FavList`] per key |
//! | `LastPlayList` | `Song[]` |
//! | `LyricMappings` | `LyricMapping[]` |
//! | `PlayerSetting` | [`PlayerSettings`] |
//! | `CurrentPlaying` | [`Song`] |
//!
//! Values that fail to parse read as absent. Failures of the underlying
//! store are returned to the caller.

use crate::error::Result;
use crate::models::{
    FavList, LyricMapping, LyricSource, PlayerSettings, Song, DEFAULT_BVID,
    DEFAULT_FAV_LIST_TITLE,
};
use crate::sources::SongListProvider;
use bridge_traits::KeyValueStore;
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Storage keys
pub mod keys {
    pub const MY_FAV_LIST: &str = "MyFavList";
    pub const LAST_PLAY_LIST: &str = "LastPlayList";
    pub const LYRIC_MAPPINGS: &str = "LyricMappings";
    pub const PLAYER_SETTINGS: &str = "PlayerSetting";
    pub const CURRENT_PLAYING: &str = "CurrentPlaying";
}

pub struct FavoritesStore {
    pub(crate) kv: Arc<dyn KeyValueStore>,
    songs: Option<Arc<dyn SongListProvider>>,
    event_bus: Option<EventBus>,
}

impl FavoritesStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            songs: None,
            event_bus: None,
        }
    }

    /// Source for the default list seeded on first launch. Without one the
    /// default list starts empty.
    pub fn with_song_list_provider(mut self, provider: Arc<dyn SongListProvider>) -> Self {
        self.songs = Some(provider);
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    // =========================================================================
    // Favorite lists
    // =========================================================================

    /// Load every list named in the index, seeding the default list when the
    /// index is absent or empty.
    pub async fn init_fav_lists(&self) -> Result<Vec<FavList>> {
        let ids: Vec<String> = self.get_item(keys::MY_FAV_LIST).await?.unwrap_or_default();
        if ids.is_empty() {
            return self.init_with_default().await;
        }

        let mut lists = Vec::with_capacity(ids.len());
        for id in &ids {
            match self.get_item::<FavList>(id).await? {
                Some(list) => lists.push(list),
                None => debug!(list_id = %id, "Skipping missing favorite list"),
            }
        }
        Ok(lists)
    }

    async fn init_with_default(&self) -> Result<Vec<FavList>> {
        let songs = match &self.songs {
            Some(provider) => provider.song_list_from_bvid(DEFAULT_BVID).await,
            None => Vec::new(),
        };
        let list = FavList::with_songs(DEFAULT_FAV_LIST_TITLE, songs);

        self.set_item(&list.info.id, &list).await?;
        self.set_item(keys::MY_FAV_LIST, &vec![list.info.id.clone()])
            .await?;
        self.set_item(keys::LAST_PLAY_LIST, &Vec::<Song>::new()).await?;
        self.set_item(keys::LYRIC_MAPPINGS, &Vec::<LyricMapping>::new())
            .await?;

        info!(
            list_id = %list.info.id,
            songs = list.song_list.len(),
            "Seeded default favorite list"
        );
        self.emit(LibraryEvent::FavListCreated {
            list_id: list.info.id.clone(),
            title: list.info.title.clone(),
        });
        Ok(vec![list])
    }

    pub async fn fav_list_ids(&self) -> Result<Vec<String>> {
        Ok(self.get_item(keys::MY_FAV_LIST).await?.unwrap_or_default())
    }

    pub async fn get_fav_list(&self, id: &str) -> Result<Option<FavList>> {
        self.get_item(id).await
    }

    /// Create an empty list and append its id to the index.
    pub async fn add_fav_list(&self, name: &str) -> Result<FavList> {
        let list = FavList::new(name);
        self.set_item(&list.info.id, &list).await?;

        let mut ids = self.fav_list_ids().await?;
        ids.push(list.info.id.clone());
        self.set_item(keys::MY_FAV_LIST, &ids).await?;

        self.emit(LibraryEvent::FavListCreated {
            list_id: list.info.id.clone(),
            title: list.info.title.clone(),
        });
        Ok(list)
    }

    pub async fn delete_fav_list(&self, id: &str) -> Result<()> {
        self.kv.remove_key(id).await?;

        let ids: Vec<String> = self
            .fav_list_ids()
            .await?
            .into_iter()
            .filter(|list_id| list_id != id)
            .collect();
        self.set_item(keys::MY_FAV_LIST, &ids).await?;

        self.emit(LibraryEvent::FavListDeleted {
            list_id: id.to_string(),
        });
        Ok(())
    }

    pub async fn update_fav_list(&self, list: &FavList) -> Result<()> {
        self.set_item(&list.info.id, list).await?;
        self.emit_updated(list);
        Ok(())
    }

    /// Prepend `song` to the list.
    ///
    /// Returns `false` without writing when the list is missing or already
    /// holds a song with the same id.
    pub async fn add_song_to_fav_list(&self, list_id: &str, song: Song) -> Result<bool> {
        let Some(mut list) = self.get_fav_list(list_id).await? else {
            debug!(list_id, "Favorite list not found");
            return Ok(false);
        };

        if list.contains(&song.id) {
            return Ok(false);
        }

        list.song_list.insert(0, song);
        self.set_item(list_id, &list).await?;
        self.emit_updated(&list);
        Ok(true)
    }

    pub async fn remove_song_from_fav_list(&self, list_id: &str, song_id: &str) -> Result<()> {
        let Some(mut list) = self.get_fav_list(list_id).await? else {
            debug!(list_id, "Favorite list not found");
            return Ok(());
        };

        list.song_list.retain(|song| song.id != song_id);
        self.set_item(list_id, &list).await?;
        self.emit_updated(&list);
        Ok(())
    }

    // =========================================================================
    // Session state
    // =========================================================================

    pub async fn get_last_play_list(&self) -> Result<Vec<Song>> {
        Ok(self.get_item(keys::LAST_PLAY_LIST).await?.unwrap_or_default())
    }

    pub async fn set_last_play_list(&self, songs: &[Song]) -> Result<()> {
        self.set_item(keys::LAST_PLAY_LIST, songs).await
    }

    pub async fn get_current_playing(&self) -> Result<Option<Song>> {
        self.get_item(keys::CURRENT_PLAYING).await
    }

    pub async fn set_current_playing(&self, song: &Song) -> Result<()> {
        self.set_item(keys::CURRENT_PLAYING, song).await
    }

    pub async fn get_player_settings(&self) -> Result<PlayerSettings> {
        Ok(self.stored_player_settings().await?.unwrap_or_default())
    }

    /// Settings as stored, `None` before the first write.
    pub async fn stored_player_settings(&self) -> Result<Option<PlayerSettings>> {
        self.get_item(keys::PLAYER_SETTINGS).await
    }

    pub async fn set_player_settings(&self, settings: &PlayerSettings) -> Result<()> {
        self.set_item(keys::PLAYER_SETTINGS, settings).await
    }

    // =========================================================================
    // Lyric mappings
    // =========================================================================

    pub(crate) async fn lyric_mappings(&self) -> Result<Vec<LyricMapping>> {
        Ok(self.get_item(keys::LYRIC_MAPPINGS).await?.unwrap_or_default())
    }

    pub async fn get_lyric_detail(&self, song_id: &str) -> Result<Option<LyricMapping>> {
        Ok(self
            .lyric_mappings()
            .await?
            .into_iter()
            .find(|mapping| mapping.id == song_id))
    }

    /// Point `song_id` at a lyric source. An existing mapping keeps its offset.
    pub async fn set_lyric_detail(&self, song_id: &str, source: LyricSource) -> Result<()> {
        let mut mappings = self.lyric_mappings().await?;
        match mappings.iter_mut().find(|mapping| mapping.id == song_id) {
            Some(mapping) => mapping.lrc = source,
            None => mappings.push(LyricMapping {
                id: song_id.to_string(),
                lrc: source,
                lrc_offset: 0.0,
            }),
        }
        self.set_item(keys::LYRIC_MAPPINGS, &mappings).await
    }

    /// Returns `false` when the song has no mapping yet; nothing is written then.
    pub async fn set_lyric_offset(&self, song_id: &str, offset_ms: f64) -> Result<bool> {
        let mut mappings = self.lyric_mappings().await?;
        let Some(mapping) = mappings.iter_mut().find(|mapping| mapping.id == song_id) else {
            return Ok(false);
        };

        mapping.lrc_offset = offset_ms;
        self.set_item(keys::LYRIC_MAPPINGS, &mappings).await?;
        Ok(true)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    pub(crate) async fn get_item<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.kv.get_string(key).await? else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(key, error = %e, "Stored value is not valid JSON, treating as absent");
                Ok(None)
            }
        }
    }

    pub(crate) async fn set_item<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        self.kv.set_string(key, &json).await?;
        Ok(())
    }

    fn emit_updated(&self, list: &FavList) {
        self.emit(LibraryEvent::FavListUpdated {
            list_id: list.info.id.clone(),
            song_count: list.song_list.len(),
        });
    }

    pub(crate) fn emit(&self, event: LibraryEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Library(event));
        }
    }
}
