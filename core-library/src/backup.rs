//! Backup export and merge-import.
//!
//! Export dumps every stored key as one pretty-printed JSON object. Import
//! merges such a dump into the current store:
//!
//! - lists are matched by title; songs missing from a matching list are
//!   appended, unmatched lists are added under fresh ids
//! - lyric mappings already present win over imported ones
//! - settings are only taken when none are stored

use crate::error::{LibraryError, Result};
use crate::models::{new_fav_list_id, FavList, FavListInfo, LyricMapping, PlayerSettings};
use crate::store::{keys, FavoritesStore};
use core_runtime::events::LibraryEvent;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

/// Counts reported after a successful import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub lists_created: usize,
    pub lists_merged: usize,
    pub songs_added: usize,
}

impl FavoritesStore {
    /// Pretty-printed JSON object of every stored key.
    ///
    /// # Errors
    ///
    /// Fails when the store cannot be read or a stored value is not JSON.
    pub async fn export_all_data(&self) -> Result<String> {
        let stored_keys = self.kv.list_all_keys().await?;
        let pairs = self.kv.multi_get(&stored_keys).await?;

        let mut data = Map::new();
        for (key, value) in pairs {
            if let Some(raw) = value {
                data.insert(key, serde_json::from_str(&raw)?);
            }
        }

        info!(keys = data.len(), "Exported store");
        Ok(serde_json::to_string_pretty(&Value::Object(data))?)
    }

    /// Merge a backup produced by [`export_all_data`](Self::export_all_data).
    ///
    /// # Errors
    ///
    /// [`LibraryError::MalformedImport`] when `json` is not a JSON object or
    /// its list index is not an array of ids. Nothing is written in that case.
    pub async fn import_data(&self, json: &str) -> Result<ImportSummary> {
        let data: Map<String, Value> = serde_json::from_str(json)
            .map_err(|e| LibraryError::MalformedImport(e.to_string()))?;

        let imported_ids: Vec<String> = match data.get(keys::MY_FAV_LIST) {
            Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
                LibraryError::MalformedImport(format!("{} is not a list of ids: {}", keys::MY_FAV_LIST, e))
            })?,
            None => Vec::new(),
        };

        let existing_ids = self.fav_list_ids().await?;
        let mut title_to_id = HashMap::new();
        for id in &existing_ids {
            if let Some(list) = self.get_item::<FavList>(id).await? {
                title_to_id.insert(list.info.title, id.clone());
            }
        }

        let mut merged_ids = existing_ids;
        let mut summary = ImportSummary::default();

        for imported_id in &imported_ids {
            let Some(raw) = data.get(imported_id) else {
                continue;
            };
            let imported: FavList = match serde_json::from_value(raw.clone()) {
                Ok(list) => list,
                Err(e) => {
                    warn!(list_id = %imported_id, error = %e, "Skipping unreadable list in backup");
                    continue;
                }
            };

            if let Some(existing_id) = title_to_id.get(&imported.info.title) {
                let Some(mut existing) = self.get_item::<FavList>(existing_id).await? else {
                    continue;
                };
                let known: HashSet<String> =
                    existing.song_list.iter().map(|song| song.id.clone()).collect();
                let new_songs: Vec<_> = imported
                    .song_list
                    .into_iter()
                    .filter(|song| !known.contains(&song.id))
                    .collect();

                if !new_songs.is_empty() {
                    summary.songs_added += new_songs.len();
                    summary.lists_merged += 1;
                    existing.song_list.extend(new_songs);
                    self.set_item(existing_id, &existing).await?;
                }
            } else {
                let list = FavList {
                    info: FavListInfo {
                        id: new_fav_list_id(),
                        title: imported.info.title,
                    },
                    song_list: imported.song_list,
                };
                self.set_item(&list.info.id, &list).await?;

                summary.lists_created += 1;
                summary.songs_added += list.song_list.len();
                title_to_id.insert(list.info.title.clone(), list.info.id.clone());
                merged_ids.push(list.info.id);
            }
        }

        self.set_item(keys::MY_FAV_LIST, &merged_ids).await?;

        if let Some(raw) = data.get(keys::LYRIC_MAPPINGS) {
            match serde_json::from_value::<Vec<LyricMapping>>(raw.clone()) {
                Ok(imported) => {
                    let mut mappings = self.lyric_mappings().await?;
                    let known: HashSet<String> =
                        mappings.iter().map(|mapping| mapping.id.clone()).collect();
                    mappings.extend(imported.into_iter().filter(|m| !known.contains(&m.id)));
                    self.set_item(keys::LYRIC_MAPPINGS, &mappings).await?;
                }
                Err(e) => warn!(error = %e, "Skipping unreadable lyric mappings in backup"),
            }
        }

        if let Some(raw) = data.get(keys::PLAYER_SETTINGS) {
            if self
                .get_item::<PlayerSettings>(keys::PLAYER_SETTINGS)
                .await?
                .is_none()
            {
                match serde_json::from_value::<PlayerSettings>(raw.clone()) {
                    Ok(settings) => self.set_player_settings(&settings).await?,
                    Err(e) => warn!(error = %e, "Skipping unreadable settings in backup"),
                }
            }
        }

        info!(
            lists_created = summary.lists_created,
            lists_merged = summary.lists_merged,
            songs_added = summary.songs_added,
            "Imported backup"
        );
        self.emit(LibraryEvent::DataImported {
            lists_created: summary.lists_created,
            lists_merged: summary.lists_merged,
            songs_added: summary.songs_added,
        });
        Ok(summary)
    }
}
