//! Placeholder track URLs
//!
//! Songs are enqueued before their audio address is known. The queue entry
//! then carries `https://placeholder.bilibili/{bvid}/{cid}`, a URL under a
//! host no real resource uses, and is swapped for the real address when the
//! entry is about to play.

use crate::error::{PlaybackError, Result};
use bridge_traits::Track;
use core_library::Song;
use std::collections::HashMap;

pub const PLACEHOLDER_PREFIX: &str = "https://placeholder.bilibili/";

/// The `(bvid, cid)` pair a placeholder stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderRef {
    pub bvid: String,
    pub cid: String,
}

pub fn create_placeholder_url(bvid: &str, cid: &str) -> String {
    format!("{}{}/{}", PLACEHOLDER_PREFIX, bvid, cid)
}

pub fn is_placeholder_url(url: &str) -> bool {
    url.starts_with(PLACEHOLDER_PREFIX)
}

pub fn parse_placeholder_url(url: &str) -> Result<PlaceholderRef> {
    let rest = url
        .strip_prefix(PLACEHOLDER_PREFIX)
        .ok_or_else(|| PlaybackError::PlaceholderDecode(url.to_string()))?;

    let mut parts = rest.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(bvid), Some(cid), None) if !bvid.is_empty() && !cid.is_empty() => {
            Ok(PlaceholderRef {
                bvid: bvid.to_string(),
                cid: cid.to_string(),
            })
        }
        _ => Err(PlaybackError::PlaceholderDecode(url.to_string())),
    }
}

/// Queue entry for `song` that still needs resolving.
pub fn placeholder_track(song: &Song, headers: &HashMap<String, String>) -> Track {
    resolved_track(song, create_placeholder_url(&song.bvid, &song.id), headers)
}

pub fn resolved_track(song: &Song, url: String, headers: &HashMap<String, String>) -> Track {
    Track {
        id: song.id.clone(),
        url,
        title: song.name.clone(),
        artist: song.singer.clone(),
        artwork: song.cover.clone(),
        duration: 0.0,
        headers: headers.clone(),
    }
}
