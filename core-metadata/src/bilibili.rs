//! # Bilibili Metadata Client
//!
//! Resolves video, series, collection and favorite-list ids into [`Song`]s and
//! looks up time-limited audio addresses.
//!
//! ## API Endpoints
//!
//! - `x/web-interface/view?bvid=` - video info and pages
//! - `x/player/pagelist?bvid=` - page cids
//! - `x/player/wbi/playurl?<signed>` - DASH audio streams (WBI-signed)
//! - `x/series/archives?mid=&series_id=&pn=&ps=` - series archives
//! - `x/polymer/space/seasons_archives_list?mid=&season_id=&page_num=&page_size=` - collection archives
//! - `x/v3/fav/resource/list?media_id=&pn=&ps=` - favorite-list medias
//!
//! ## Failure reporting
//!
//! Public lookups return `Option`/empty `Vec` sentinels. The underlying
//! [`MetadataError`] is logged, with transport failures, rejected envelopes
//! and HTML block pages each reported separately.
//!
//! ## Usage
//!
//! ```ignore
//! use core_metadata::BiliClient;
//!
//! let client = BiliClient::new(http_client, clock, BiliApiConfig::default());
//! let songs = client.song_list_from_bvid("BV1wr4y1v7TA").await;
//! ```

use crate::error::{MetadataError, Result};
use crate::models::{
    CollectionData, Envelope, FavData, PageData, PlayUrlData, SeriesData, VideoData, VideoInfo,
};
use crate::wbi::WbiSigner;
use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use bridge_traits::time::Clock;
use core_library::{PlayUrlSource, Song, SongListProvider};
use core_runtime::config::BiliApiConfig;
use futures::future::join_all;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

const SERIES_PAGE_SIZE: u64 = 30;
const COLLECTION_PAGE_SIZE: u64 = 30;
const FAV_PAGE_SIZE: u64 = 20;

/// Upper bound on pages fetched for one list, guarding against bogus totals.
const MAX_PAGES: u64 = 200;

pub struct BiliClient {
    http: Arc<dyn HttpClient>,
    signer: WbiSigner,
    config: BiliApiConfig,
}

impl BiliClient {
    pub fn new(http: Arc<dyn HttpClient>, clock: Arc<dyn Clock>, config: BiliApiConfig) -> Self {
        let signer = WbiSigner::new(http.clone(), clock, config.clone());
        Self {
            http,
            signer,
            config,
        }
    }

    pub fn signer(&self) -> &WbiSigner {
        &self.signer
    }

    // =========================================================================
    // Videos
    // =========================================================================

    /// Video info, or `None` when the video is unavailable.
    pub async fn fetch_video_info(&self, bvid: &str) -> Option<VideoInfo> {
        let url = format!(
            "{}/x/web-interface/view?bvid={}",
            self.config.api_base,
            urlencoding::encode(bvid)
        );

        match self.get_enveloped::<VideoData>(&url).await {
            Ok(data) => Some(VideoInfo::from_wire(data, bvid)),
            Err(e) => {
                log_failure("video info", bvid, &e);
                None
            }
        }
    }

    /// Cid of the first page of a video.
    pub async fn fetch_cid(&self, bvid: &str) -> Option<String> {
        let url = format!(
            "{}/x/player/pagelist?bvid={}&jsonp=jsonp",
            self.config.api_base,
            urlencoding::encode(bvid)
        );

        match self.get_enveloped::<Vec<PageData>>(&url).await {
            Ok(pages) => match pages.first() {
                Some(page) => Some(page.cid.to_string()),
                None => {
                    log_failure("page list", bvid, &MetadataError::EmptyResult("no pages".into()));
                    None
                }
            },
            Err(e) => {
                log_failure("page list", bvid, &e);
                None
            }
        }
    }

    /// Songs contained in one video; empty when the video is unavailable.
    pub async fn song_list_from_bvid(&self, bvid: &str) -> Vec<Song> {
        match self.fetch_video_info(bvid).await {
            Some(info) => info.into_songs(),
            None => Vec::new(),
        }
    }

    // =========================================================================
    // Play addresses
    // =========================================================================

    /// First DASH audio stream URL for one page of a video.
    pub async fn fetch_play_url(&self, bvid: &str, cid: &str) -> Option<String> {
        match self.try_fetch_play_url(bvid, cid).await {
            Ok(url) => {
                debug!(bvid = %bvid, cid = %cid, "Resolved play address");
                Some(url)
            }
            Err(e) => {
                log_failure("play address", bvid, &e);
                None
            }
        }
    }

    async fn try_fetch_play_url(&self, bvid: &str, cid: &str) -> Result<String> {
        let params = [
            ("bvid", bvid.to_string()),
            ("cid", cid.to_string()),
            ("qn", "64".to_string()),
            ("fnval", "16".to_string()),
            ("fnver", "0".to_string()),
            ("fourk", "1".to_string()),
        ];
        let query = self.signer.sign(&params).await?;
        let url = format!("{}/x/player/wbi/playurl?{}", self.config.api_base, query);

        let response = self.get(&url).await?;

        // Rate limiting and anti-bot checks answer with an HTML page.
        let body = response
            .text()
            .map_err(|e| MetadataError::Malformed(e.to_string()))?;
        if body.trim_start().starts_with('<') {
            return Err(MetadataError::Blocked);
        }

        let envelope: Envelope<PlayUrlData> = serde_json::from_str(&body)
            .map_err(|e| MetadataError::Malformed(format!("play url response: {}", e)))?;
        let data = unwrap_envelope(envelope)?;

        data.dash
            .and_then(|dash| dash.audio)
            .and_then(|audio| audio.into_iter().next())
            .and_then(|track| track.base_url)
            .ok_or_else(|| MetadataError::EmptyResult("no audio stream".to_string()))
    }

    // =========================================================================
    // Lists
    // =========================================================================

    /// Every song of a space series.
    pub async fn fetch_series_list(&self, mid: &str, sid: &str) -> Vec<Song> {
        let mut bvids = Vec::new();
        let mut pages = 1;
        let mut pn = 1;

        while pn <= pages {
            let url = format!(
                "{}/x/series/archives?mid={}&series_id={}&only_normal=true&sort=desc&pn={}&ps={}",
                self.config.api_base,
                urlencoding::encode(mid),
                urlencoding::encode(sid),
                pn,
                SERIES_PAGE_SIZE
            );

            match self.get_enveloped::<SeriesData>(&url).await {
                Ok(data) => {
                    if pn == 1 {
                        if let Some(page) = &data.page {
                            pages = page_count(page.total, page.size);
                        }
                    }
                    bvids.extend(data.archives.unwrap_or_default().into_iter().map(|a| a.bvid));
                }
                Err(e) if pn == 1 => {
                    log_failure("series", sid, &e);
                    return Vec::new();
                }
                Err(e) => log_failure("series page", sid, &e),
            }
            pn += 1;
        }

        info!(sid = %sid, videos = bvids.len(), "Fetched series");
        self.songs_from_bvids(bvids).await
    }

    /// Every song of a space collection (season).
    pub async fn fetch_collection_list(&self, mid: &str, sid: &str) -> Vec<Song> {
        let url = |page: u64| {
            format!(
                "{}/x/polymer/space/seasons_archives_list?mid={}&season_id={}&sort_reverse=false&page_num={}&page_size={}",
                self.config.api_base,
                urlencoding::encode(mid),
                urlencoding::encode(sid),
                page,
                COLLECTION_PAGE_SIZE
            )
        };

        let first = match self.get_enveloped::<CollectionData>(&url(1)).await {
            Ok(data) => data,
            Err(e) => {
                log_failure("collection", sid, &e);
                return Vec::new();
            }
        };

        let pages = page_count(first.meta.total, first.page.page_size);
        let mut bvids: Vec<String> = first
            .archives
            .unwrap_or_default()
            .into_iter()
            .map(|a| a.bvid)
            .collect();

        for page in 2..=pages {
            match self.get_enveloped::<CollectionData>(&url(page)).await {
                Ok(data) => {
                    bvids.extend(data.archives.unwrap_or_default().into_iter().map(|a| a.bvid))
                }
                Err(e) => log_failure("collection page", sid, &e),
            }
        }

        info!(sid = %sid, videos = bvids.len(), "Fetched collection");
        self.songs_from_bvids(bvids).await
    }

    /// Every song of a public favorite list.
    pub async fn fetch_fav_list(&self, media_id: &str) -> Vec<Song> {
        let url = |pn: u64| {
            format!(
                "{}/x/v3/fav/resource/list?media_id={}&pn={}&ps={}&keyword=&order=mtime&type=0&tid=0&platform=web",
                self.config.api_base,
                urlencoding::encode(media_id),
                pn,
                FAV_PAGE_SIZE
            )
        };

        let first = match self.get_enveloped::<FavData>(&url(1)).await {
            Ok(data) => data,
            Err(e) => {
                log_failure("favorite list", media_id, &e);
                return Vec::new();
            }
        };

        let pages = page_count(first.info.media_count, FAV_PAGE_SIZE);
        let mut bvids: Vec<String> = first
            .medias
            .unwrap_or_default()
            .into_iter()
            .map(|m| m.bvid)
            .collect();

        for pn in 2..=pages {
            match self.get_enveloped::<FavData>(&url(pn)).await {
                Ok(data) => bvids.extend(data.medias.unwrap_or_default().into_iter().map(|m| m.bvid)),
                Err(e) => log_failure("favorite list page", media_id, &e),
            }
        }

        info!(media_id = %media_id, videos = bvids.len(), "Fetched favorite list");
        self.songs_from_bvids(bvids).await
    }

    /// Fetch every video in parallel and flatten; unavailable videos drop out.
    async fn songs_from_bvids(&self, bvids: Vec<String>) -> Vec<Song> {
        let infos = join_all(bvids.iter().map(|bvid| self.fetch_video_info(bvid))).await;
        let dropped = infos.iter().filter(|info| info.is_none()).count();
        if dropped > 0 {
            warn!(dropped, total = bvids.len(), "Some videos were unavailable");
        }

        infos
            .into_iter()
            .flatten()
            .flat_map(VideoInfo::into_songs)
            .collect()
    }

    // =========================================================================
    // Transport
    // =========================================================================

    async fn get(&self, url: &str) -> Result<HttpResponse> {
        let request = HttpRequest::get(url)
            .headers(self.config.default_headers())
            .timeout(REQUEST_TIMEOUT);

        self.http
            .execute(request)
            .await
            .map_err(|e| MetadataError::Transport(e.to_string()))
    }

    async fn get_enveloped<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.get(url).await?;
        let envelope: Envelope<T> = response
            .json()
            .map_err(|e| MetadataError::Malformed(e.to_string()))?;
        unwrap_envelope(envelope)
    }
}

fn unwrap_envelope<T>(envelope: Envelope<T>) -> Result<T> {
    if envelope.code != 0 {
        return Err(MetadataError::UpstreamRejected {
            code: envelope.code,
            message: envelope.message,
        });
    }
    envelope
        .data
        .ok_or_else(|| MetadataError::EmptyResult("envelope has no data".to_string()))
}

fn page_count(total: u64, size: u64) -> u64 {
    if size == 0 {
        return 1;
    }
    total.div_ceil(size).clamp(1, MAX_PAGES)
}

fn log_failure(what: &str, id: &str, e: &MetadataError) {
    match e {
        MetadataError::Transport(reason) => {
            warn!(id = %id, reason = %reason, "Request for {} failed", what)
        }
        MetadataError::UpstreamRejected { code, message } => {
            warn!(id = %id, code, message = %message, "Upstream rejected {} request", what)
        }
        MetadataError::Blocked => {
            error!(id = %id, "Received HTML instead of JSON for {}", what)
        }
        MetadataError::Malformed(reason) => {
            warn!(id = %id, reason = %reason, "Malformed {} response", what)
        }
        MetadataError::EmptyResult(reason) => {
            debug!(id = %id, reason = %reason, "Empty {} result", what)
        }
    }
}

#[async_trait]
impl PlayUrlSource for BiliClient {
    async fn fetch_play_url(&self, bvid: &str, cid: &str) -> Option<String> {
        BiliClient::fetch_play_url(self, bvid, cid).await
    }
}

#[async_trait]
impl SongListProvider for BiliClient {
    async fn song_list_from_bvid(&self, bvid: &str) -> Vec<Song> {
        BiliClient::song_list_from_bvid(self, bvid).await
    }
}
