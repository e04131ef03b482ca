//! Integration tests for the core service façade
//!
//! This test suite verifies:
//! - Startup restores settings and the last session
//! - Default favorite list seeding on first launch
//! - Playing-list bookkeeping for play_list, play_song and add_to_queue
//! - Play mode persistence
//! - Lyric lookup with mapping reuse

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use bridge_traits::playback::{
    MediaPlayer, NativeRepeatMode, PlayerEvent, PlayerOptions, PlayerState, Track,
};
use bridge_traits::InMemoryKeyValueStore;
use bytes::Bytes;
use core_library::{PlayMode, PlayerSettings, Song};
use core_runtime::config::{CoreConfig, PlaybackConfig};
use core_service::{CoreService, SEARCH_LIST_ID};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

const NAV: &str = r#"{"code":0,"data":{"wbi_img":{"img_url":"https://i0.hdslb.com/bfs/wbi/7cd084941338484aae1ad9425b84077c.png","sub_url":"https://i0.hdslb.com/bfs/wbi/4932caff0ff746eab6f01bf08b70ac45.png"}}}"#;

// ============================================================================
// Mock bridges
// ============================================================================

#[derive(Default)]
struct RoutingHttpClient {
    routes: Mutex<Vec<(String, String)>>,
    urls: Mutex<Vec<String>>,
}

impl RoutingHttpClient {
    fn new() -> Arc<Self> {
        let client = Arc::new(Self::default());
        client.route("/x/web-interface/nav", NAV.to_string());
        client.route(
            "/x/player/wbi/playurl",
            json!({"code": 0, "data": {"dash": {"audio": [
                {"baseUrl": "https://upos.bilivideo.com/audio.m4s"}
            ]}}})
            .to_string(),
        );
        client
    }

    fn route(&self, pattern: &str, body: String) {
        self.routes.lock().unwrap().push((pattern.to_string(), body));
    }

    fn route_json(&self, pattern: &str, body: Value) {
        self.route(pattern, body.to_string());
    }

    fn count(&self, pattern: &str) -> usize {
        self.urls
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.contains(pattern))
            .count()
    }
}

#[async_trait]
impl HttpClient for RoutingHttpClient {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        self.urls.lock().unwrap().push(request.url.clone());
        let routes = self.routes.lock().unwrap();
        let body = routes
            .iter()
            .find(|(pattern, _)| request.url.contains(pattern.as_str()))
            .map(|(_, body)| body.clone())
            .ok_or_else(|| BridgeError::OperationFailed(format!("unreachable: {}", request.url)))?;
        Ok(HttpResponse {
            status: 200,
            headers: HashMap::new(),
            body: Bytes::from(body),
        })
    }
}

#[derive(Default)]
struct FakeState {
    queue: Vec<Track>,
    active: Option<usize>,
    state: Option<PlayerState>,
    repeat: Option<NativeRepeatMode>,
    volume: Option<f32>,
    setups: usize,
}

struct FakePlayer {
    inner: Mutex<FakeState>,
    events: broadcast::Sender<PlayerEvent>,
}

impl FakePlayer {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(FakeState::default()),
            events: broadcast::channel(16).0,
        })
    }

    fn ids(&self) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .queue
            .iter()
            .map(|t| t.id.clone())
            .collect()
    }
}

#[async_trait]
impl MediaPlayer for FakePlayer {
    async fn setup(&self, _options: PlayerOptions) -> BridgeResult<()> {
        self.inner.lock().unwrap().setups += 1;
        Ok(())
    }

    async fn add(&self, tracks: Vec<Track>, at_index: Option<usize>) -> BridgeResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let at = at_index.unwrap_or(inner.queue.len()).min(inner.queue.len());
        for (offset, track) in tracks.into_iter().enumerate() {
            inner.queue.insert(at + offset, track);
        }
        Ok(())
    }

    async fn remove(&self, index: usize) -> BridgeResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if index < inner.queue.len() {
            inner.queue.remove(index);
        }
        Ok(())
    }

    async fn replace(&self, index: usize, track: Track) -> BridgeResult<()> {
        self.inner.lock().unwrap().queue[index] = track;
        Ok(())
    }

    async fn skip(&self, index: usize) -> BridgeResult<()> {
        self.inner.lock().unwrap().active = Some(index);
        Ok(())
    }

    async fn play(&self) -> BridgeResult<()> {
        self.inner.lock().unwrap().state = Some(PlayerState::Playing);
        Ok(())
    }

    async fn pause(&self) -> BridgeResult<()> {
        self.inner.lock().unwrap().state = Some(PlayerState::Paused);
        Ok(())
    }

    async fn stop(&self) -> BridgeResult<()> {
        self.inner.lock().unwrap().state = Some(PlayerState::Stopped);
        Ok(())
    }

    async fn reset(&self) -> BridgeResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.queue.clear();
        inner.active = None;
        Ok(())
    }

    async fn seek_to(&self, _seconds: f64) -> BridgeResult<()> {
        Ok(())
    }

    async fn set_volume(&self, ratio: f32) -> BridgeResult<()> {
        self.inner.lock().unwrap().volume = Some(ratio);
        Ok(())
    }

    async fn set_repeat_mode(&self, mode: NativeRepeatMode) -> BridgeResult<()> {
        self.inner.lock().unwrap().repeat = Some(mode);
        Ok(())
    }

    async fn get_repeat_mode(&self) -> BridgeResult<NativeRepeatMode> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .repeat
            .unwrap_or(NativeRepeatMode::Off))
    }

    async fn get_queue(&self) -> BridgeResult<Vec<Track>> {
        Ok(self.inner.lock().unwrap().queue.clone())
    }

    async fn get_active_index(&self) -> BridgeResult<Option<usize>> {
        Ok(self.inner.lock().unwrap().active)
    }

    async fn get_playback_state(&self) -> BridgeResult<PlayerState> {
        Ok(self.inner.lock().unwrap().state.unwrap_or(PlayerState::None))
    }

    fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn song(id: &str) -> Song {
    Song {
        id: id.to_string(),
        bvid: "BV1xx411c7mD".to_string(),
        name: format!("歌手 - 《歌{}》", id),
        singer: "TestUploader".to_string(),
        singer_id: "12345".to_string(),
        cover: String::new(),
        lyric: None,
        lyric_offset: None,
    }
}

fn songs(ids: &[&str]) -> Vec<Song> {
    ids.iter().map(|id| song(id)).collect()
}

fn default_video() -> Value {
    json!({
        "code": 0,
        "data": {
            "title": "精选",
            "desc": "",
            "videos": 2,
            "pic": "https://i0.hdslb.com/bfs/archive/cover.jpg",
            "owner": {"name": "阿梓", "mid": 7706705},
            "pages": [{"cid": 101, "part": "第一首"}, {"cid": 102, "part": "第二首"}]
        }
    })
}

struct Harness {
    core: CoreService,
    player: Arc<FakePlayer>,
    http: Arc<RoutingHttpClient>,
}

async fn harness() -> Harness {
    harness_with(PlaybackConfig::default()).await
}

async fn harness_with(playback: PlaybackConfig) -> Harness {
    let http = RoutingHttpClient::new();
    http.route_json("view?bvid=BV1wr4y1v7TA", default_video());
    let player = FakePlayer::new();

    let config = CoreConfig::builder()
        .http_client(http.clone())
        .kv_store(Arc::new(InMemoryKeyValueStore::new()))
        .media_player(player.clone())
        .playback(playback)
        .build()
        .await
        .unwrap();

    Harness {
        core: CoreService::new(config),
        player,
        http,
    }
}

// ============================================================================
// Startup
// ============================================================================

#[tokio::test]
async fn test_first_launch_seeds_default_list_and_plays_it() {
    let h = harness().await;

    h.core.initialize().await.unwrap();

    let lists = h.core.favorites().init_fav_lists().await.unwrap();
    assert_eq!(lists.len(), 1);
    assert_eq!(lists[0].song_list.len(), 2);

    assert_eq!(h.player.ids(), vec!["101", "102"]);
    assert_eq!(h.player.inner.lock().unwrap().active, Some(0));
    assert_eq!(h.core.playing_list().await.len(), 2);
    assert_eq!(h.http.count("playurl"), 1);
}

#[tokio::test]
async fn test_startup_restores_last_session_and_settings() {
    let h = harness().await;
    let store = h.core.favorites();
    store.init_fav_lists().await.unwrap();
    store
        .set_last_play_list(&songs(&["7", "8", "9"]))
        .await
        .unwrap();
    store
        .set_player_settings(&PlayerSettings {
            play_mode: PlayMode::SingleLoop,
            default_volume: 0.8,
        })
        .await
        .unwrap();

    h.core.initialize().await.unwrap();

    assert_eq!(h.player.ids(), vec!["7", "8", "9"]);
    let inner = h.player.inner.lock().unwrap();
    assert_eq!(inner.repeat, Some(NativeRepeatMode::Track));
    assert_eq!(inner.volume, Some(0.8));
    drop(inner);
    assert_eq!(h.core.controller().play_mode(), PlayMode::SingleLoop);
}

#[tokio::test]
async fn test_configured_volume_applies_until_settings_are_stored() {
    let h = harness_with(PlaybackConfig {
        default_volume: 0.2,
        ..PlaybackConfig::default()
    })
    .await;

    h.core.initialize().await.unwrap();
    assert_eq!(h.player.inner.lock().unwrap().volume, Some(0.2));

    h.core.set_play_mode(PlayMode::Shuffle).await.unwrap();
    let stored = h.core.favorites().get_player_settings().await.unwrap();
    assert_eq!(stored.play_mode, PlayMode::Shuffle);
    assert_eq!(stored.default_volume, 0.2);
}

#[tokio::test]
async fn test_initialize_is_idempotent() {
    let h = harness().await;

    h.core.initialize().await.unwrap();
    h.core.initialize().await.unwrap();

    assert_eq!(h.player.inner.lock().unwrap().setups, 1);
    assert_eq!(h.player.ids().len(), 2);
}

// ============================================================================
// Playing list
// ============================================================================

#[tokio::test]
async fn test_play_list_replaces_queue_and_persists() {
    let h = harness().await;

    assert!(h.core.play_list(songs(&["1", "2", "3"]), 1).await.unwrap());

    assert_eq!(h.player.ids(), vec!["1", "2", "3"]);
    assert_eq!(h.player.inner.lock().unwrap().active, Some(1));
    let saved = h.core.favorites().get_last_play_list().await.unwrap();
    assert_eq!(saved.len(), 3);
    assert_eq!(h.core.current_song().await.unwrap().id, "2");
}

#[tokio::test]
async fn test_play_song_prepends_new_song() {
    let h = harness().await;
    h.core.play_list(songs(&["1", "2"]), 0).await.unwrap();

    assert!(h.core.play_song(song("5")).await.unwrap());

    let list: Vec<_> = h.core.playing_list().await.into_iter().map(|s| s.id).collect();
    assert_eq!(list, vec!["5", "1", "2"]);
    let saved = h.core.favorites().get_last_play_list().await.unwrap();
    assert_eq!(saved[0].id, "5");
    let current = h.core.favorites().get_current_playing().await.unwrap();
    assert_eq!(current.unwrap().id, "5");
}

#[tokio::test]
async fn test_play_song_already_playing_keeps_list() {
    let h = harness().await;
    h.core.play_list(songs(&["1", "2"]), 0).await.unwrap();

    assert!(h.core.play_song(song("2")).await.unwrap());

    assert_eq!(h.core.playing_list().await.len(), 2);
    assert_eq!(h.player.inner.lock().unwrap().active, Some(1));
}

#[tokio::test]
async fn test_add_to_queue_skips_known_songs() {
    let h = harness().await;
    h.core.play_list(songs(&["1", "2"]), 0).await.unwrap();

    let added = h.core.add_to_queue(&songs(&["2", "3", "4"])).await.unwrap();

    assert_eq!(added, 2);
    assert_eq!(h.player.ids(), vec!["1", "2", "3", "4"]);
    let saved = h.core.favorites().get_last_play_list().await.unwrap();
    assert_eq!(saved.len(), 4);

    assert_eq!(h.core.add_to_queue(&songs(&["1"])).await.unwrap(), 0);
}

#[tokio::test]
async fn test_set_play_mode_persists() {
    let h = harness().await;

    h.core.set_play_mode(PlayMode::ListLoop).await.unwrap();

    let settings = h.core.favorites().get_player_settings().await.unwrap();
    assert_eq!(settings.play_mode, PlayMode::ListLoop);
    assert_eq!(settings.default_volume, 0.5);
    assert_eq!(
        h.player.inner.lock().unwrap().repeat,
        Some(NativeRepeatMode::Queue)
    );
}

// ============================================================================
// Search and lyrics
// ============================================================================

#[tokio::test]
async fn test_search_list_wraps_results() {
    let h = harness().await;

    let (list, error) = h.core.search_list("").await;

    assert_eq!(list.info.id, SEARCH_LIST_ID);
    assert!(list.song_list.is_empty());
    assert_eq!(error.as_deref(), Some("请输入搜索内容"));
}

#[tokio::test]
async fn test_lyric_lookup_stores_mapping_and_reuses_it() {
    let h = harness().await;
    h.http.route_json(
        "smartbox_new.fcg",
        json!({"code": 0, "data": {"song": {"itemlist": [
            {"mid": "003", "name": "歌1", "singer": "某人"}
        ]}}}),
    );
    h.http.route_json(
        "fcg_query_lyric_new.fcg?songmid=003",
        json!({"retcode": 0, "lyric": "[00:01.00]词"}),
    );

    let first = h.core.load_lyric(&song("1")).await.unwrap();
    assert_eq!(first, "[00:01.00]词");

    let mapping = h
        .core
        .favorites()
        .get_lyric_detail("1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(mapping.lrc.song_mid, "003");

    h.core.load_lyric(&song("1")).await.unwrap();
    assert_eq!(h.http.count("smartbox_new.fcg"), 1);
    assert_eq!(h.http.count("fcg_query_lyric_new.fcg"), 2);
}
