//! # Library Module
//!
//! Owns the user's favorites, play history and settings.
//!
//! ## Overview
//!
//! This module manages:
//! - Domain models (`Song`, `FavList`, `PlayerSettings`, `LyricMapping`)
//! - The [`FavoritesStore`] over a host `KeyValueStore`
//! - Backup export and merge-import
//! - The upstream traits ([`SongListProvider`], [`PlayUrlSource`]) that the
//!   metadata client implements

pub mod backup;
pub mod error;
pub mod models;
pub mod sources;
pub mod store;

pub use backup::ImportSummary;
pub use error::{LibraryError, Result};
pub use models::{
    FavList, FavListInfo, LyricMapping, LyricSource, PlayMode, PlayerSettings, Song, DEFAULT_BVID,
};
pub use sources::{PlayUrlSource, SongListProvider};
pub use store::FavoritesStore;
