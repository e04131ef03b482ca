//! # Lyric Lookup
//!
//! Searches QQ Music for lyric candidates and downloads LRC text.
//!
//! ## API Endpoints
//!
//! - `smartbox_new.fcg?key=` - quick search, tried first
//! - `musicu.fcg` (POST) - desktop search, used when quick search finds nothing
//! - `fcg_query_lyric_new.fcg?songmid=` - raw `{lyric, trans}` object, no envelope
//!
//! Lyric text is returned as-is; parsing and rendering belong to the UI.

use crate::error::{MetadataError, Result};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
use core_library::LyricSource;
use core_runtime::config::LyricsApiConfig;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const FALLBACK_PAGE_SIZE: u32 = 20;

/// Placeholder LRC shown when no lyric can be found.
pub const NO_LYRIC: &str = "[00:00.000] 无法找到歌词";

/// One selectable lyric candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LyricOption {
    pub key: String,
    pub song_mid: String,
    pub label: String,
}

impl From<LyricOption> for LyricSource {
    fn from(option: LyricOption) -> Self {
        LyricSource {
            song_mid: option.song_mid,
            label: option.label,
        }
    }
}

pub struct LyricsClient {
    http: Arc<dyn HttpClient>,
    config: LyricsApiConfig,
}

impl LyricsClient {
    pub fn new(http: Arc<dyn HttpClient>, config: LyricsApiConfig) -> Self {
        Self { http, config }
    }

    /// Candidates for `keyword`, labelled `"{index}. {name} / {singer}"`.
    pub async fn search_lyric_options(&self, keyword: &str) -> Vec<LyricOption> {
        if keyword.is_empty() {
            return Vec::new();
        }

        match self.quick_search(keyword).await {
            Ok(options) if !options.is_empty() => return options,
            Ok(_) => debug!(keyword = %keyword, "Quick lyric search found nothing"),
            Err(e) => warn!(keyword = %keyword, error = %e, "Quick lyric search failed"),
        }

        match self.desktop_search(keyword).await {
            Ok(options) => options,
            Err(e) => {
                warn!(keyword = %keyword, error = %e, "Fallback lyric search failed");
                Vec::new()
            }
        }
    }

    /// LRC text for `song_mid`, translation first when present.
    pub async fn fetch_lyric(&self, song_mid: &str) -> String {
        match self.try_fetch_lyric(song_mid).await {
            Ok(Some(lyric)) => lyric,
            Ok(None) => NO_LYRIC.to_string(),
            Err(e) => {
                warn!(song_mid = %song_mid, error = %e, "Lyric request failed");
                NO_LYRIC.to_string()
            }
        }
    }

    async fn quick_search(&self, keyword: &str) -> Result<Vec<LyricOption>> {
        let url = format!(
            "{}?key={}",
            self.config.search_url,
            urlencoding::encode(keyword)
        );
        let request = HttpRequest::get(url).timeout(REQUEST_TIMEOUT);
        let response = self
            .http
            .execute(request)
            .await
            .map_err(|e| MetadataError::Transport(e.to_string()))?;

        let resp: SmartboxResponse = response
            .json()
            .map_err(|e| MetadataError::Malformed(e.to_string()))?;

        let items = resp
            .data
            .and_then(|d| d.song)
            .and_then(|s| s.itemlist)
            .unwrap_or_default();

        Ok(items
            .into_iter()
            .enumerate()
            .map(|(index, item)| option(index, item.mid, &item.name, &item.singer))
            .collect())
    }

    async fn desktop_search(&self, keyword: &str) -> Result<Vec<LyricOption>> {
        let body = json!({
            "comm": { "ct": "19", "cv": "1859", "uin": "0" },
            "req": {
                "method": "DoSearchForQQMusicDesktop",
                "module": "music.search.SearchCgiService",
                "param": {
                    "grp": 1,
                    "num_per_page": FALLBACK_PAGE_SIZE,
                    "page_num": 1,
                    "query": keyword,
                    "search_type": 0
                }
            }
        });

        let request = HttpRequest::new(HttpMethod::Post, self.config.search_fallback_url.clone())
            .json(&body)
            .map_err(|e| MetadataError::Malformed(e.to_string()))?
            .timeout(REQUEST_TIMEOUT);

        let response = self
            .http
            .execute(request)
            .await
            .map_err(|e| MetadataError::Transport(e.to_string()))?;

        let resp: DesktopSearchResponse = response
            .json()
            .map_err(|e| MetadataError::Malformed(e.to_string()))?;

        let items = resp
            .req
            .and_then(|r| r.data)
            .and_then(|d| d.body)
            .and_then(|b| b.song)
            .and_then(|s| s.list)
            .unwrap_or_default();

        Ok(items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                let singer = item
                    .singer
                    .first()
                    .map(|s| s.name.as_str())
                    .unwrap_or("Unknown");
                option(index, item.mid.clone(), &item.name, singer)
            })
            .collect())
    }

    async fn try_fetch_lyric(&self, song_mid: &str) -> Result<Option<String>> {
        let url = format!(
            "{}?songmid={}&g_tk=5381&format=json&inCharset=utf8&outCharset=utf-8&nobase64=1",
            self.config.lyric_url,
            urlencoding::encode(song_mid)
        );
        let request = HttpRequest::get(url)
            .header("Referer", self.config.referer.clone())
            .timeout(REQUEST_TIMEOUT);

        let response = self
            .http
            .execute(request)
            .await
            .map_err(|e| MetadataError::Transport(e.to_string()))?;

        let resp: LyricResponse = response
            .json()
            .map_err(|e| MetadataError::Malformed(e.to_string()))?;

        let lyric = match resp.lyric.filter(|l| !l.is_empty()) {
            Some(lyric) => lyric,
            None => return Ok(None),
        };

        Ok(Some(match resp.trans.filter(|t| !t.is_empty()) {
            Some(trans) => format!("{}\n{}", trans, lyric),
            None => lyric,
        }))
    }
}

fn option(index: usize, mid: String, name: &str, singer: &str) -> LyricOption {
    LyricOption {
        key: mid.clone(),
        song_mid: mid,
        label: format!("{}. {} / {}", index, name, singer),
    }
}

/// Song name inside `《…》`, or the whole input when there are no brackets.
pub fn extract_song_name(name: &str) -> &str {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"《(.*)》").expect("title regex"));
    re.captures(name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(name)
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
struct SmartboxResponse {
    data: Option<SmartboxData>,
}

#[derive(Debug, Deserialize)]
struct SmartboxData {
    song: Option<SmartboxSong>,
}

#[derive(Debug, Deserialize)]
struct SmartboxSong {
    itemlist: Option<Vec<SmartboxItem>>,
}

#[derive(Debug, Deserialize)]
struct SmartboxItem {
    mid: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    singer: String,
}

#[derive(Debug, Deserialize)]
struct DesktopSearchResponse {
    req: Option<DesktopReq>,
}

#[derive(Debug, Deserialize)]
struct DesktopReq {
    data: Option<DesktopData>,
}

#[derive(Debug, Deserialize)]
struct DesktopData {
    body: Option<DesktopBody>,
}

#[derive(Debug, Deserialize)]
struct DesktopBody {
    song: Option<DesktopSong>,
}

#[derive(Debug, Deserialize)]
struct DesktopSong {
    list: Option<Vec<DesktopItem>>,
}

#[derive(Debug, Deserialize)]
struct DesktopItem {
    mid: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    singer: Vec<DesktopSinger>,
}

#[derive(Debug, Deserialize)]
struct DesktopSinger {
    name: String,
}

#[derive(Debug, Deserialize)]
struct LyricResponse {
    #[serde(default)]
    lyric: Option<String>,
    #[serde(default)]
    trans: Option<String>,
}
