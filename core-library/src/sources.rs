//! Upstream capabilities the library and playback layers consume.
//!
//! Both are implemented by the Bilibili metadata client. Keeping the traits
//! here lets the store and the queue depend on behavior rather than on the
//! HTTP client crate.

use crate::models::Song;
use async_trait::async_trait;

/// Turns a video id into the songs it contains.
#[async_trait]
pub trait SongListProvider: Send + Sync {
    /// One song per page; empty when the video cannot be fetched.
    async fn song_list_from_bvid(&self, bvid: &str) -> Vec<Song>;
}

/// Looks up a time-limited audio URL for one page of a video.
#[async_trait]
pub trait PlayUrlSource: Send + Sync {
    /// `None` when upstream refuses, returns no audio stream or is unreachable.
    async fn fetch_play_url(&self, bvid: &str, cid: &str) -> Option<String>;
}
