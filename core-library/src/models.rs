//! Domain models for favorites, settings and lyric mappings
//!
//! Field names serialize in camelCase so stored JSON and backup files stay
//! compatible with data written by earlier clients.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Video used to seed the first favorite list on a fresh install.
pub const DEFAULT_BVID: &str = "BV1wr4y1v7TA";

/// Title of the seeded favorite list.
pub const DEFAULT_FAV_LIST_TITLE: &str = "【阿梓】2021精选翻唱50首【纯享】";

const FAV_LIST_ID_PREFIX: &str = "FavList-";

// =============================================================================
// Songs and lists
// =============================================================================

/// One playable page of a video.
///
/// `id` is the page's cid and is unique within any list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    pub id: String,
    pub bvid: String,
    pub name: String,
    pub singer: String,
    pub singer_id: String,
    pub cover: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lyric: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lyric_offset: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavListInfo {
    pub id: String,
    pub title: String,
}

/// A named, ordered favorite list. Stored under its own id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavList {
    pub info: FavListInfo,
    #[serde(default)]
    pub song_list: Vec<Song>,
}

impl FavList {
    /// Empty list with a fresh `FavList-<uuid>` id.
    pub fn new(title: impl Into<String>) -> Self {
        Self::with_songs(title, Vec::new())
    }

    pub fn with_songs(title: impl Into<String>, song_list: Vec<Song>) -> Self {
        Self {
            info: FavListInfo {
                id: new_fav_list_id(),
                title: title.into(),
            },
            song_list,
        }
    }

    pub fn contains(&self, song_id: &str) -> bool {
        self.song_list.iter().any(|song| song.id == song_id)
    }
}

pub fn new_fav_list_id() -> String {
    format!("{}{}", FAV_LIST_ID_PREFIX, Uuid::new_v4())
}

// =============================================================================
// Settings
// =============================================================================

/// User-facing play mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlayMode {
    #[default]
    Order,
    Shuffle,
    SingleLoop,
    ListLoop,
}

impl PlayMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayMode::Order => "order",
            PlayMode::Shuffle => "shuffle",
            PlayMode::SingleLoop => "singleLoop",
            PlayMode::ListLoop => "listLoop",
        }
    }
}

impl fmt::Display for PlayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlayMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "order" => Ok(PlayMode::Order),
            "shuffle" => Ok(PlayMode::Shuffle),
            "singleLoop" => Ok(PlayMode::SingleLoop),
            "listLoop" => Ok(PlayMode::ListLoop),
            other => Err(format!("unknown play mode '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSettings {
    pub play_mode: PlayMode,
    /// Volume ratio in `0.0..=1.0`
    pub default_volume: f32,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            play_mode: PlayMode::Order,
            default_volume: 0.5,
        }
    }
}

// =============================================================================
// Lyrics
// =============================================================================

/// Which QQ-music song a local song's lyrics come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LyricSource {
    pub song_mid: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LyricMapping {
    /// Song id the mapping belongs to
    pub id: String,
    pub lrc: LyricSource,
    /// Display offset in milliseconds
    #[serde(default)]
    pub lrc_offset: f64,
}
