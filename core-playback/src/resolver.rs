//! # Track Resolution
//!
//! Turns a placeholder queue entry into a playable one.
//!
//! ## Single flight
//!
//! Resolutions are keyed by queue position. A caller asking for a position
//! that is already being resolved awaits the same shared future and gets the
//! same result; the upstream lookup runs once. The map entry is removed when
//! the attempt settles, so the next request starts fresh.
//!
//! ## Queue races
//!
//! The queue is re-read after the address lookup. If the entry at the
//! position is no longer the placeholder that was resolved, the result is
//! discarded with [`PlaybackError::QueueChanged`] instead of overwriting the
//! newer entry.

use crate::error::{PlaybackError, Result};
use crate::placeholder::{is_placeholder_url, parse_placeholder_url, resolved_track};
use bridge_traits::playback::{MediaPlayer, Track};
use bridge_traits::time::Clock;
use core_library::{PlayUrlSource, Song};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

type SharedResolution = Shared<BoxFuture<'static, Result<Track>>>;

pub struct TrackResolver {
    inner: Arc<ResolverInner>,
}

struct ResolverInner {
    player: Arc<dyn MediaPlayer>,
    source: Arc<dyn PlayUrlSource>,
    clock: Arc<dyn Clock>,
    headers: HashMap<String, String>,
    event_bus: Option<EventBus>,
    in_flight: Mutex<HashMap<usize, SharedResolution>>,
    /// Placeholder URL -> unix millis of the last failed lookup.
    failures: Mutex<HashMap<String, i64>>,
    negative_ttl: Duration,
}

impl TrackResolver {
    pub fn new(
        player: Arc<dyn MediaPlayer>,
        source: Arc<dyn PlayUrlSource>,
        clock: Arc<dyn Clock>,
        headers: HashMap<String, String>,
    ) -> Self {
        Self {
            inner: Arc::new(ResolverInner {
                player,
                source,
                clock,
                headers,
                event_bus: None,
                in_flight: Mutex::new(HashMap::new()),
                failures: Mutex::new(HashMap::new()),
                negative_ttl: Duration::ZERO,
            }),
        }
    }

    /// Builder-style; takes effect only before the first resolution.
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.event_bus = Some(event_bus);
        }
        self
    }

    /// Remember failed lookups for `ttl`; zero disables the cache.
    pub fn with_negative_cache(mut self, ttl: Duration) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.negative_ttl = ttl;
        }
        self
    }

    /// Headers attached to every track this resolver produces.
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.inner.headers
    }

    /// Resolve the queue entry at `index`, sharing any attempt in flight.
    pub async fn resolve(&self, index: usize) -> Result<Track> {
        let shared = {
            let mut in_flight = self.inner.in_flight.lock();
            match in_flight.get(&index) {
                Some(existing) => {
                    debug!(index, "Joining in-flight resolution");
                    existing.clone()
                }
                None => {
                    let inner = self.inner.clone();
                    let fut = async move {
                        let result = inner.resolve_position(index).await;
                        inner.in_flight.lock().remove(&index);
                        result
                    }
                    .boxed()
                    .shared();
                    in_flight.insert(index, fut.clone());
                    fut
                }
            }
        };

        shared.await
    }

    /// Whether a resolution for `index` is currently running.
    pub fn is_resolving(&self, index: usize) -> bool {
        self.inner.in_flight.lock().contains_key(&index)
    }

    /// Look up the audio address for a song that is not in the queue yet.
    pub async fn resolve_song(&self, song: &Song) -> Option<Track> {
        let url = self.inner.source.fetch_play_url(&song.bvid, &song.id).await?;
        Some(resolved_track(song, url, &self.inner.headers))
    }
}

impl ResolverInner {
    async fn resolve_position(&self, index: usize) -> Result<Track> {
        let result = self.try_resolve(index).await;
        match &result {
            Ok(track) => {
                if let Some(bus) = &self.event_bus {
                    bus.emit(CoreEvent::Playback(PlaybackEvent::TrackResolved {
                        index,
                        song_id: track.id.clone(),
                    }))
                    .ok();
                }
            }
            Err(e) => {
                warn!(index, error = %e, "Could not resolve queue entry");
                if let Some(bus) = &self.event_bus {
                    bus.emit(CoreEvent::Playback(PlaybackEvent::ResolutionFailed {
                        index,
                        song_id: self.song_id_at(index).await.unwrap_or_default(),
                        reason: e.to_string(),
                    }))
                    .ok();
                }
            }
        }
        result
    }

    async fn try_resolve(&self, index: usize) -> Result<Track> {
        let queue = self.player.get_queue().await?;
        let entry = queue
            .get(index)
            .cloned()
            .ok_or(PlaybackError::PositionOutOfRange {
                index,
                len: queue.len(),
            })?;

        if !is_placeholder_url(&entry.url) {
            return Ok(entry);
        }

        let placeholder = parse_placeholder_url(&entry.url)?;
        let unavailable = || PlaybackError::Unavailable {
            bvid: placeholder.bvid.clone(),
            cid: placeholder.cid.clone(),
        };

        if self.recently_failed(&entry.url) {
            debug!(index, url = %entry.url, "Skipping lookup, failed recently");
            return Err(unavailable());
        }

        let url = match self
            .source
            .fetch_play_url(&placeholder.bvid, &placeholder.cid)
            .await
        {
            Some(url) => url,
            None => {
                self.record_failure(&entry.url);
                return Err(unavailable());
            }
        };

        // The lookup may have taken a while; make sure the slot still holds
        // the entry we resolved before touching it.
        let queue = self.player.get_queue().await?;
        let current = match queue.get(index) {
            Some(current) if current.id == entry.id && current.url == entry.url => current,
            _ => return Err(PlaybackError::QueueChanged { index }),
        };

        let resolved = current.with_url(url);
        self.player.replace(index, resolved.clone()).await?;

        info!(index, song_id = %resolved.id, "Resolved queue entry");
        Ok(resolved)
    }

    async fn song_id_at(&self, index: usize) -> Option<String> {
        let queue = self.player.get_queue().await.ok()?;
        queue.get(index).map(|track| track.id.clone())
    }

    fn recently_failed(&self, url: &str) -> bool {
        if self.negative_ttl.is_zero() {
            return false;
        }
        let now = self.clock.unix_timestamp_millis();
        let ttl = self.negative_ttl.as_millis() as i64;
        let mut failures = self.failures.lock();
        failures.retain(|_, at| now - *at < ttl);
        failures.contains_key(url)
    }

    fn record_failure(&self, url: &str) {
        if self.negative_ttl.is_zero() {
            return;
        }
        self.failures
            .lock()
            .insert(url.to_string(), self.clock.unix_timestamp_millis());
    }
}
