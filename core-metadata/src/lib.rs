//! # Metadata & Lyrics Module
//!
//! Talks to the upstream web APIs that back the player.
//!
//! ## Overview
//!
//! This module handles:
//! - WBI request signing with a cached, rotating key pair
//! - Video, series, collection and favorite-list lookups ([`BiliClient`])
//! - Audio stream address lookup for the playback queue
//! - Search box input parsing
//! - Lyric search and download

pub mod bilibili;
pub mod error;
pub mod lyrics;
pub mod models;
pub mod search;
pub mod wbi;

pub use bilibili::BiliClient;
pub use error::{MetadataError, Result};
pub use lyrics::{extract_song_name, LyricOption, LyricsClient, NO_LYRIC};
pub use models::{Uploader, VideoInfo, VideoPage};
pub use search::{SearchError, SearchResult, SearchTarget};
pub use wbi::{WbiKeys, WbiSigner};
