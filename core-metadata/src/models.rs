//! Bilibili wire types and the normalized video model.
//!
//! Wire structs mirror the JSON shapes of the web API and stay crate-private;
//! numeric ids (`mid`, `cid`) are converted to strings at the boundary.

use core_library::Song;
use serde::Deserialize;

// =============================================================================
// Public model
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uploader {
    pub name: String,
    pub mid: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoPage {
    pub bvid: String,
    pub part: String,
    pub cid: String,
}

/// Normalized `x/web-interface/view` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoInfo {
    pub bvid: String,
    pub title: String,
    pub desc: String,
    pub video_count: u32,
    pub cover: String,
    pub uploader: Uploader,
    pub pages: Vec<VideoPage>,
}

impl VideoInfo {
    pub(crate) fn from_wire(data: VideoData, bvid: &str) -> Self {
        Self {
            bvid: bvid.to_string(),
            title: data.title,
            desc: data.desc,
            video_count: data.videos,
            cover: data.pic,
            uploader: Uploader {
                name: data.owner.name,
                mid: data.owner.mid.to_string(),
            },
            pages: data
                .pages
                .into_iter()
                .map(|page| VideoPage {
                    bvid: bvid.to_string(),
                    part: page.part,
                    cid: page.cid.to_string(),
                })
                .collect(),
        }
    }

    /// A single-page video is one song named after the video; a multi-page
    /// video yields one song per page, named after the page.
    pub fn into_songs(self) -> Vec<Song> {
        let single = self.pages.len() == 1;
        let title = self.title;
        let uploader = self.uploader;
        let cover = self.cover;

        self.pages
            .into_iter()
            .map(|page| Song {
                id: page.cid,
                bvid: page.bvid,
                name: if single { title.clone() } else { page.part },
                singer: uploader.name.clone(),
                singer_id: uploader.mid.clone(),
                cover: cover.clone(),
                lyric: None,
                lyric_offset: None,
            })
            .collect()
    }
}

// =============================================================================
// Wire types
// =============================================================================

/// `{code, message, data}` wrapper used by every `api.bilibili.com` endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VideoData {
    pub title: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub videos: u32,
    #[serde(default)]
    pub pic: String,
    pub owner: OwnerData,
    #[serde(default)]
    pub pages: Vec<PageData>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OwnerData {
    pub name: String,
    pub mid: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PageData {
    #[serde(default)]
    pub part: String,
    pub cid: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PlayUrlData {
    pub dash: Option<DashData>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DashData {
    #[serde(default)]
    pub audio: Option<Vec<DashAudio>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DashAudio {
    #[serde(rename = "baseUrl", alias = "base_url")]
    pub base_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NavData {
    pub wbi_img: Option<WbiImg>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WbiImg {
    pub img_url: String,
    pub sub_url: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Archive {
    pub bvid: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SeriesData {
    #[serde(default)]
    pub archives: Option<Vec<Archive>>,
    pub page: Option<SeriesPage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SeriesPage {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub size: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CollectionData {
    #[serde(default)]
    pub archives: Option<Vec<Archive>>,
    pub meta: CollectionMeta,
    pub page: CollectionPage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CollectionMeta {
    pub total: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CollectionPage {
    pub page_size: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FavData {
    pub info: FavInfo,
    pub medias: Option<Vec<Archive>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FavInfo {
    pub media_count: u64,
}
