//! Search box input parsing
//!
//! Users paste a video link, a space series/collection link, a bare BVID or a
//! numeric favorite-list id. [`SearchTarget::parse`] classifies the input and
//! [`BiliClient::search`] turns it into a titled song list.

use crate::bilibili::BiliClient;
use core_library::Song;
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchTarget {
    Video { bvid: String },
    Series { mid: String, sid: String },
    Collection { mid: String, sid: String },
    FavList { media_id: String },
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchError {
    #[error("请输入搜索内容")]
    Empty,
    #[error("无法识别的搜索格式")]
    Unrecognized,
}

struct Patterns {
    bvid_in_text: Regex,
    series: Regex,
    collection: Regex,
    bare_bvid: Regex,
    fav_id: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        bvid_in_text: Regex::new(r"BV[a-zA-Z0-9]{10}").expect("valid regex"),
        series: Regex::new(r".*\.com/(\d+)/channel/seriesdetail\?sid=(\d+).*").expect("valid regex"),
        collection: Regex::new(r".*\.com/(\d+)/channel/collectiondetail\?sid=(\d+).*")
            .expect("valid regex"),
        bare_bvid: Regex::new(r"^BV[a-zA-Z0-9]{10}$").expect("valid regex"),
        fav_id: Regex::new(r"^\d+$").expect("valid regex"),
    })
}

impl SearchTarget {
    pub fn parse(input: &str) -> Result<Self, SearchError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(SearchError::Empty);
        }

        let p = patterns();

        if let Some(m) = p.bvid_in_text.find(input) {
            return Ok(Self::Video {
                bvid: m.as_str().to_string(),
            });
        }
        if let Some(caps) = p.series.captures(input) {
            return Ok(Self::Series {
                mid: caps[1].to_string(),
                sid: caps[2].to_string(),
            });
        }
        if let Some(caps) = p.collection.captures(input) {
            return Ok(Self::Collection {
                mid: caps[1].to_string(),
                sid: caps[2].to_string(),
            });
        }
        if p.bare_bvid.is_match(input) {
            return Ok(Self::Video {
                bvid: input.to_string(),
            });
        }
        if p.fav_id.is_match(input) {
            return Ok(Self::FavList {
                media_id: input.to_string(),
            });
        }

        Err(SearchError::Unrecognized)
    }

    /// Display title for the resulting list.
    pub fn title(&self) -> String {
        match self {
            Self::Video { bvid } => format!("搜索: {}", bvid),
            Self::FavList { media_id } => format!("收藏夹: {}", media_id),
            Self::Series { .. } => "系列合集".to_string(),
            Self::Collection { .. } => "视频合集".to_string(),
        }
    }

    fn empty_message(&self) -> &'static str {
        match self {
            Self::Video { .. } => "未找到视频或获取失败",
            Self::FavList { .. } => "收藏夹为空或无法访问",
            Self::Series { .. } | Self::Collection { .. } => "合集为空或无法访问",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub songs: Vec<Song>,
    pub title: String,
    /// User-facing reason when `songs` is empty.
    pub error: Option<String>,
}

const DEFAULT_SEARCH_TITLE: &str = "搜索歌单";

impl BiliClient {
    pub async fn search(&self, input: &str) -> SearchResult {
        let target = match SearchTarget::parse(input) {
            Ok(target) => target,
            Err(e) => {
                debug!(error = %e, "Search input rejected");
                return SearchResult {
                    songs: Vec::new(),
                    title: DEFAULT_SEARCH_TITLE.to_string(),
                    error: Some(e.to_string()),
                };
            }
        };

        let songs = match &target {
            SearchTarget::Video { bvid } => self.song_list_from_bvid(bvid).await,
            SearchTarget::Series { mid, sid } => self.fetch_series_list(mid, sid).await,
            SearchTarget::Collection { mid, sid } => self.fetch_collection_list(mid, sid).await,
            SearchTarget::FavList { media_id } => self.fetch_fav_list(media_id).await,
        };

        let error = songs
            .is_empty()
            .then(|| target.empty_message().to_string());

        SearchResult {
            songs,
            title: target.title(),
            error,
        }
    }
}
