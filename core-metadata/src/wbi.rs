//! WBI request signing
//!
//! Several `api.bilibili.com` endpoints (play addresses among them) reject
//! requests that do not carry a `w_rid` signature. The signature is an MD5
//! over the sorted query plus a "mixin key" derived from two key fragments
//! published by the nav endpoint. The fragments rotate, so they are cached
//! for [`BiliApiConfig::wbi_key_ttl`] and refetched lazily afterwards.

use crate::error::{MetadataError, Result};
use crate::models::{Envelope, NavData};
use bridge_traits::http::{HttpClient, HttpRequest};
use bridge_traits::time::Clock;
use core_runtime::config::BiliApiConfig;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const MIXIN_KEY_ENC_TAB: [usize; 64] = [
    46, 47, 18, 2, 53, 8, 23, 32, 15, 50, 10, 31, 58, 3, 45, 35, 27, 43, 5, 49, 33, 9, 42, 19, 29,
    28, 14, 39, 12, 38, 41, 13, 37, 48, 7, 16, 24, 55, 40, 61, 26, 17, 0, 1, 60, 51, 30, 4, 22, 25,
    54, 21, 56, 59, 6, 63, 57, 62, 11, 36, 20, 34, 44, 52,
];

const MIXIN_KEY_LEN: usize = 32;
const NAV_TIMEOUT: Duration = Duration::from_secs(10);

/// The two key fragments published under `data.wbi_img`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WbiKeys {
    pub img_key: String,
    pub sub_key: String,
}

impl WbiKeys {
    pub fn mixin_key(&self) -> String {
        mixin_key(&self.img_key, &self.sub_key)
    }
}

#[derive(Debug, Clone)]
struct CachedKeys {
    keys: WbiKeys,
    fetched_at: i64,
}

/// Signs query parameters for WBI-protected endpoints.
///
/// The cache lock is held across the nav fetch, so concurrent callers that
/// find the cache stale wait for one refresh instead of issuing their own.
pub struct WbiSigner {
    http: Arc<dyn HttpClient>,
    clock: Arc<dyn Clock>,
    config: BiliApiConfig,
    cache: Mutex<Option<CachedKeys>>,
}

impl WbiSigner {
    pub fn new(http: Arc<dyn HttpClient>, clock: Arc<dyn Clock>, config: BiliApiConfig) -> Self {
        Self {
            http,
            clock,
            config,
            cache: Mutex::new(None),
        }
    }

    /// Signed query string (without a leading `?`) for `params`.
    pub async fn sign(&self, params: &[(&str, String)]) -> Result<String> {
        let keys = self.keys().await?;
        let wts = self.clock.unix_timestamp();
        Ok(sign_query(params, &keys.mixin_key(), wts))
    }

    /// Current key pair, refreshed when absent or older than the TTL.
    pub async fn keys(&self) -> Result<WbiKeys> {
        let mut cache = self.cache.lock().await;
        let now = self.clock.unix_timestamp();
        let ttl = self.config.wbi_key_ttl.as_secs() as i64;

        if let Some(cached) = cache.as_ref() {
            if now - cached.fetched_at < ttl {
                return Ok(cached.keys.clone());
            }
            debug!(age_secs = now - cached.fetched_at, "WBI keys expired");
        }

        let keys = self.fetch_keys().await?;
        *cache = Some(CachedKeys {
            keys: keys.clone(),
            fetched_at: now,
        });
        Ok(keys)
    }

    /// Drop the cached key pair so the next [`sign`](Self::sign) refetches it.
    pub async fn invalidate(&self) {
        *self.cache.lock().await = None;
    }

    async fn fetch_keys(&self) -> Result<WbiKeys> {
        let url = format!("{}/x/web-interface/nav", self.config.api_base);
        let request = HttpRequest::get(url)
            .headers(self.config.default_headers())
            .timeout(NAV_TIMEOUT);

        let response = self.http.execute(request).await.map_err(|e| {
            warn!(error = %e, "WBI key request failed");
            MetadataError::Transport(e.to_string())
        })?;

        // Logged-out sessions answer -101 but still publish the keys, so the
        // envelope code is not checked here.
        let envelope: Envelope<NavData> = response
            .json()
            .map_err(|e| MetadataError::Malformed(format!("nav response: {}", e)))?;

        let wbi_img = envelope
            .data
            .and_then(|data| data.wbi_img)
            .ok_or_else(|| MetadataError::Malformed("nav response has no wbi_img".to_string()))?;

        let img_key = key_from_url(&wbi_img.img_url)
            .ok_or_else(|| MetadataError::Malformed("unexpected img_url".to_string()))?;
        let sub_key = key_from_url(&wbi_img.sub_url)
            .ok_or_else(|| MetadataError::Malformed("unexpected sub_url".to_string()))?;

        info!("Fetched WBI keys");
        Ok(WbiKeys { img_key, sub_key })
    }
}

/// File stem of a key URL: `https://i0.hdslb.com/bfs/wbi/<key>.png` -> `<key>`.
fn key_from_url(url: &str) -> Option<String> {
    let file = url.rsplit('/').next()?;
    let stem = file.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(file);
    if stem.is_empty() {
        None
    } else {
        Some(stem.to_string())
    }
}

/// Permute `img_key + sub_key` through the fixed table and keep 32 chars.
pub fn mixin_key(img_key: &str, sub_key: &str) -> String {
    let raw: Vec<char> = img_key.chars().chain(sub_key.chars()).collect();
    MIXIN_KEY_ENC_TAB
        .iter()
        .filter_map(|&i| raw.get(i))
        .take(MIXIN_KEY_LEN)
        .collect()
}

fn filter_value(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, '!' | '\'' | '(' | ')' | '*'))
        .collect()
}

/// Build the signed query for `params` at time `wts`.
///
/// Pairs are sorted by key, so callers may pass them in any order.
pub fn sign_query(params: &[(&str, String)], mixin_key: &str, wts: i64) -> String {
    let mut sorted: BTreeMap<String, String> = params
        .iter()
        .map(|(k, v)| (k.to_string(), filter_value(v)))
        .collect();
    sorted.insert("wts".to_string(), wts.to_string());

    let query = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    let w_rid = format!("{:x}", md5::compute(format!("{}{}", query, mixin_key)));
    format!("{}&w_rid={}", query, w_rid)
}
