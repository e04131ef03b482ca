//! Tests for the queue controller and the remote control bridge
//!
//! This test suite verifies:
//! - Auto-advance past unresolvable entries and exhaustion
//! - play_song insertion rules
//! - Toggle, skip and repeat behavior
//! - Resume trying each queue position at most once
//! - Remote event dispatch
//! - Player failures being swallowed

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::playback::{
    MediaPlayer, NativeRepeatMode, PlayerEvent, PlayerOptions, PlayerState, Track,
};
use bridge_traits::SystemClock;
use core_library::{PlayMode, PlayUrlSource, Song};
use core_playback::{is_placeholder_url, QueueController, RemoteControlBridge, TrackResolver};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use mockall::mock;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

// ============================================================================
// Mock MediaPlayer
// ============================================================================

struct PlayerInner {
    queue: Vec<Track>,
    active: Option<usize>,
    state: PlayerState,
    repeat: NativeRepeatMode,
    calls: Vec<String>,
    fail_all: bool,
}

struct MockPlayer {
    inner: Mutex<PlayerInner>,
    events: broadcast::Sender<PlayerEvent>,
}

impl MockPlayer {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(PlayerInner {
                queue: Vec::new(),
                active: None,
                state: PlayerState::None,
                repeat: NativeRepeatMode::Off,
                calls: Vec::new(),
                fail_all: false,
            }),
            events: broadcast::channel(16).0,
        })
    }

    fn record(&self, call: impl Into<String>) -> BridgeResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(call.into());
        if inner.fail_all {
            return Err(BridgeError::Player("player unavailable".into()));
        }
        Ok(())
    }

    fn calls(&self) -> Vec<String> {
        self.inner.lock().unwrap().calls.clone()
    }

    fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == call).count()
    }

    fn queue(&self) -> Vec<Track> {
        self.inner.lock().unwrap().queue.clone()
    }

    fn set_active(&self, index: Option<usize>) {
        self.inner.lock().unwrap().active = index;
    }

    fn set_state(&self, state: PlayerState) {
        self.inner.lock().unwrap().state = state;
    }

    fn set_repeat(&self, repeat: NativeRepeatMode) {
        self.inner.lock().unwrap().repeat = repeat;
    }

    fn fail_all(&self) {
        self.inner.lock().unwrap().fail_all = true;
    }
}

#[async_trait]
impl MediaPlayer for MockPlayer {
    async fn setup(&self, _options: PlayerOptions) -> BridgeResult<()> {
        self.record("setup")
    }

    async fn add(&self, tracks: Vec<Track>, at_index: Option<usize>) -> BridgeResult<()> {
        self.record(format!("add@{:?}", at_index))?;
        let mut inner = self.inner.lock().unwrap();
        let at = at_index.unwrap_or(inner.queue.len()).min(inner.queue.len());
        for (offset, track) in tracks.into_iter().enumerate() {
            inner.queue.insert(at + offset, track);
        }
        Ok(())
    }

    async fn remove(&self, index: usize) -> BridgeResult<()> {
        self.record(format!("remove {}", index))?;
        let mut inner = self.inner.lock().unwrap();
        if index < inner.queue.len() {
            inner.queue.remove(index);
        }
        Ok(())
    }

    async fn replace(&self, index: usize, track: Track) -> BridgeResult<()> {
        self.record(format!("replace {}", index))?;
        self.inner.lock().unwrap().queue[index] = track;
        Ok(())
    }

    async fn skip(&self, index: usize) -> BridgeResult<()> {
        self.record(format!("skip {}", index))?;
        self.inner.lock().unwrap().active = Some(index);
        Ok(())
    }

    async fn play(&self) -> BridgeResult<()> {
        self.record("play")?;
        self.inner.lock().unwrap().state = PlayerState::Playing;
        Ok(())
    }

    async fn pause(&self) -> BridgeResult<()> {
        self.record("pause")?;
        self.inner.lock().unwrap().state = PlayerState::Paused;
        Ok(())
    }

    async fn stop(&self) -> BridgeResult<()> {
        self.record("stop")?;
        self.inner.lock().unwrap().state = PlayerState::Stopped;
        Ok(())
    }

    async fn reset(&self) -> BridgeResult<()> {
        self.record("reset")?;
        let mut inner = self.inner.lock().unwrap();
        inner.queue.clear();
        inner.active = None;
        Ok(())
    }

    async fn seek_to(&self, seconds: f64) -> BridgeResult<()> {
        self.record(format!("seek {}", seconds))
    }

    async fn set_volume(&self, ratio: f32) -> BridgeResult<()> {
        self.record(format!("volume {}", ratio))
    }

    async fn set_repeat_mode(&self, mode: NativeRepeatMode) -> BridgeResult<()> {
        self.record(format!("repeat {:?}", mode))?;
        self.inner.lock().unwrap().repeat = mode;
        Ok(())
    }

    async fn get_repeat_mode(&self) -> BridgeResult<NativeRepeatMode> {
        Ok(self.inner.lock().unwrap().repeat)
    }

    async fn get_queue(&self) -> BridgeResult<Vec<Track>> {
        Ok(self.queue())
    }

    async fn get_active_index(&self) -> BridgeResult<Option<usize>> {
        Ok(self.inner.lock().unwrap().active)
    }

    async fn get_playback_state(&self) -> BridgeResult<PlayerState> {
        Ok(self.inner.lock().unwrap().state)
    }

    fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }
}

// ============================================================================
// Play URL sources
// ============================================================================

/// Resolves every cid except the listed ones; counts lookups.
struct FakeSource {
    broken: HashSet<String>,
    lookups: Mutex<Vec<String>>,
}

impl FakeSource {
    fn new(broken: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            broken: broken.iter().map(|s| s.to_string()).collect(),
            lookups: Mutex::new(Vec::new()),
        })
    }

    fn lookups(&self) -> usize {
        self.lookups.lock().unwrap().len()
    }
}

#[async_trait]
impl PlayUrlSource for FakeSource {
    async fn fetch_play_url(&self, bvid: &str, cid: &str) -> Option<String> {
        self.lookups.lock().unwrap().push(cid.to_string());
        if self.broken.contains(cid) {
            None
        } else {
            Some(format!("https://upos.bilivideo.com/{}/{}.m4s", bvid, cid))
        }
    }
}

mock! {
    Source {}

    #[async_trait]
    impl PlayUrlSource for Source {
        async fn fetch_play_url(&self, bvid: &str, cid: &str) -> Option<String>;
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn song(id: &str) -> Song {
    Song {
        id: id.to_string(),
        bvid: "BV1wr4y1v7TA".to_string(),
        name: format!("Song {}", id),
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

fn controller_with(
    player: Arc<MockPlayer>,
    source: Arc<dyn PlayUrlSource>,
    bus: Option<EventBus>,
) -> Arc<QueueController> {
    let mut resolver = TrackResolver::new(
        player.clone(),
        source,
        Arc::new(SystemClock),
        HashMap::from([("Referer".to_string(), "https://www.bilibili.com/".to_string())]),
    );
    let mut controller_bus = None;
    if let Some(bus) = bus {
        resolver = resolver.with_event_bus(bus.clone());
        controller_bus = Some(bus);
    }

    let mut controller = QueueController::new(player, Arc::new(resolver));
    if let Some(bus) = controller_bus {
        controller = controller.with_event_bus(bus);
    }
    Arc::new(controller)
}

fn controller(player: Arc<MockPlayer>, source: Arc<FakeSource>) -> Arc<QueueController> {
    controller_with(player, source, None)
}

// ============================================================================
// Enqueue
// ============================================================================

#[tokio::test]
async fn test_enqueue_fast_makes_no_lookups() {
    let player = MockPlayer::new();
    let source = FakeSource::new(&[]);
    let controller = controller(player.clone(), source.clone());

    controller.enqueue_fast(&songs(&["1", "2", "3"]), false).await;

    let queue = player.queue();
    assert_eq!(queue.len(), 3);
    assert!(queue.iter().all(|t| is_placeholder_url(&t.url)));
    assert_eq!(queue[0].headers["Referer"], "https://www.bilibili.com/");
    assert_eq!(source.lookups(), 0);
}

#[tokio::test]
async fn test_enqueue_fast_clear_first_replaces_queue() {
    let player = MockPlayer::new();
    let controller = controller(player.clone(), FakeSource::new(&[]));

    controller.enqueue_fast(&songs(&["1", "2"]), false).await;
    controller.enqueue_fast(&songs(&["3"]), true).await;

    let ids: Vec<_> = player.queue().into_iter().map(|t| t.id).collect();
    assert_eq!(ids, vec!["3"]);
    assert_eq!(player.count("reset"), 1);
}

#[tokio::test]
async fn test_enqueue_resolved_drops_failures() {
    let player = MockPlayer::new();
    let controller = controller(player.clone(), FakeSource::new(&["2"]));

    let added = controller.enqueue_resolved(&songs(&["1", "2", "3"]), false).await;

    assert_eq!(added, 2);
    let queue = player.queue();
    let ids: Vec<_> = queue.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "3"]);
    assert!(queue.iter().all(|t| !is_placeholder_url(&t.url)));
}

// ============================================================================
// play_at
// ============================================================================

#[tokio::test]
async fn test_play_at_resolves_and_plays() {
    let player = MockPlayer::new();
    let source = FakeSource::new(&[]);
    let controller = controller(player.clone(), source.clone());
    controller.enqueue_fast(&songs(&["1", "2"]), false).await;

    assert!(controller.play_at(1).await);

    assert_eq!(
        player.queue()[1].url,
        "https://upos.bilivideo.com/BV1wr4y1v7TA/2.m4s"
    );
    assert!(is_placeholder_url(&player.queue()[0].url));
    let calls = player.calls();
    assert_eq!(&calls[calls.len() - 2..], ["skip 1", "play"]);
    assert_eq!(source.lookups(), 1);
}

#[tokio::test]
async fn test_play_at_advances_past_failures_and_wraps() {
    let player = MockPlayer::new();
    let controller = controller(player.clone(), FakeSource::new(&["3", "4"]));
    controller.enqueue_fast(&songs(&["1", "2", "3", "4"]), false).await;

    assert!(controller.play_at(2).await);

    assert_eq!(player.count("skip 0"), 1);
    assert_eq!(player.count("play"), 1);
}

#[tokio::test]
async fn test_play_at_exhaustion_terminates_without_playing() {
    let bus = EventBus::new(32);
    let mut events = bus.subscribe();
    let player = MockPlayer::new();
    let source = FakeSource::new(&["1", "2", "3"]);
    let controller = controller_with(player.clone(), source.clone(), Some(bus));
    controller.enqueue_fast(&songs(&["1", "2", "3"]), false).await;

    assert!(!controller.play_at(0).await);

    assert_eq!(source.lookups(), 3);
    assert_eq!(player.count("play"), 0);

    let mut failures = 0;
    let mut exhausted = None;
    while let Ok(event) = events.try_recv() {
        match event {
            CoreEvent::Playback(PlaybackEvent::ResolutionFailed { .. }) => failures += 1,
            CoreEvent::Playback(PlaybackEvent::QueueExhausted { attempted }) => {
                exhausted = Some(attempted)
            }
            _ => {}
        }
    }
    assert_eq!(failures, 3);
    assert_eq!(exhausted, Some(3));
}

#[tokio::test]
async fn test_play_at_out_of_range_is_noop() {
    let player = MockPlayer::new();
    let controller = controller(player.clone(), FakeSource::new(&[]));

    assert!(!controller.play_at(0).await);
    assert!(player.calls().is_empty());
}

// ============================================================================
// play_song
// ============================================================================

#[tokio::test]
async fn test_play_song_already_queued_plays_in_place() {
    let player = MockPlayer::new();
    let controller = controller(player.clone(), FakeSource::new(&[]));
    controller.enqueue_fast(&songs(&["1", "2", "3"]), false).await;

    assert!(controller.play_song(&song("3")).await);

    assert_eq!(player.queue().len(), 3);
    assert_eq!(player.count("skip 2"), 1);
}

#[tokio::test]
async fn test_play_song_new_is_inserted_at_front() {
    let player = MockPlayer::new();
    let controller = controller(player.clone(), FakeSource::new(&[]));
    controller.enqueue_fast(&songs(&["1", "2"]), false).await;

    assert!(controller.play_song(&song("9")).await);

    let queue = player.queue();
    assert_eq!(queue.len(), 3);
    assert_eq!(queue[0].id, "9");
    assert!(!is_placeholder_url(&queue[0].url));
    let calls = player.calls();
    assert_eq!(&calls[calls.len() - 3..], ["add@Some(0)", "skip 0", "play"]);
}

#[tokio::test]
async fn test_play_song_unresolvable_changes_nothing() {
    let mut source = MockSource::new();
    source.expect_fetch_play_url().times(1).returning(|_, _| None);

    let player = MockPlayer::new();
    let controller = controller_with(player.clone(), Arc::new(source), None);
    controller.enqueue_fast(&songs(&["1"]), false).await;
    let before = player.queue();

    assert!(!controller.play_song(&song("9")).await);

    assert_eq!(player.queue(), before);
    assert_eq!(player.count("play"), 0);
}

// ============================================================================
// Toggle and skip
// ============================================================================

#[tokio::test]
async fn test_toggle_pauses_when_playing() {
    let player = MockPlayer::new();
    let controller = controller(player.clone(), FakeSource::new(&[]));
    player.set_state(PlayerState::Playing);

    controller.toggle_play_pause().await;

    assert_eq!(player.calls(), vec!["pause"]);
}

#[tokio::test]
async fn test_toggle_resolves_active_without_skipping() {
    let player = MockPlayer::new();
    let source = FakeSource::new(&[]);
    let controller = controller(player.clone(), source.clone());
    controller.enqueue_fast(&songs(&["1", "2"]), false).await;
    player.set_active(Some(1));
    player.set_state(PlayerState::Paused);

    controller.toggle_play_pause().await;

    assert_eq!(source.lookups(), 1);
    assert!(!is_placeholder_url(&player.queue()[1].url));
    assert!(player.calls().iter().all(|c| !c.starts_with("skip")));
    assert_eq!(player.count("play"), 1);
}

#[tokio::test]
async fn test_toggle_advances_when_active_unresolvable() {
    let player = MockPlayer::new();
    let controller = controller(player.clone(), FakeSource::new(&["1"]));
    controller.enqueue_fast(&songs(&["1", "2"]), false).await;
    player.set_active(Some(0));
    player.set_state(PlayerState::Paused);

    controller.toggle_play_pause().await;

    assert_eq!(player.count("skip 1"), 1);
    assert_eq!(player.count("play"), 1);
}

#[tokio::test]
async fn test_toggle_tries_each_entry_once_when_all_unresolvable() {
    let bus = EventBus::new(32);
    let mut events = bus.subscribe();
    let player = MockPlayer::new();
    let source = FakeSource::new(&["1", "2", "3"]);
    let controller = controller_with(player.clone(), source.clone(), Some(bus));
    controller.enqueue_fast(&songs(&["1", "2", "3"]), false).await;
    player.set_active(Some(0));
    player.set_state(PlayerState::Paused);

    controller.toggle_play_pause().await;

    assert_eq!(source.lookups(), 3);
    assert_eq!(player.count("play"), 0);

    let mut exhausted = None;
    while let Ok(event) = events.try_recv() {
        if let CoreEvent::Playback(PlaybackEvent::QueueExhausted { attempted }) = event {
            exhausted = Some(attempted);
        }
    }
    assert_eq!(exhausted, Some(3));
}

#[tokio::test]
async fn test_skip_without_active_track_is_noop() {
    let player = MockPlayer::new();
    let source = FakeSource::new(&[]);
    let controller = controller(player.clone(), source.clone());
    controller.enqueue_fast(&songs(&["1", "2"]), false).await;

    controller.skip_next().await;
    controller.skip_previous().await;

    assert_eq!(source.lookups(), 0);
    assert_eq!(player.count("play"), 0);
}

#[tokio::test]
async fn test_skip_wraps_around() {
    let player = MockPlayer::new();
    let controller = controller(player.clone(), FakeSource::new(&[]));
    controller.enqueue_fast(&songs(&["1", "2", "3"]), false).await;

    player.set_active(Some(2));
    controller.skip_next().await;
    assert_eq!(player.count("skip 0"), 1);

    player.set_active(Some(0));
    controller.skip_previous().await;
    assert_eq!(player.count("skip 2"), 1);
}

// ============================================================================
// Play modes
// ============================================================================

#[tokio::test]
async fn test_repeat_mode_mapping_reaches_player() {
    let player = MockPlayer::new();
    let controller = controller(player.clone(), FakeSource::new(&[]));

    controller.set_repeat_mode(PlayMode::SingleLoop).await;
    controller.set_repeat_mode(PlayMode::Shuffle).await;
    controller.set_repeat_mode(PlayMode::Order).await;

    assert_eq!(
        player.calls(),
        vec!["repeat Track", "repeat Queue", "repeat Off"]
    );
    assert_eq!(controller.play_mode(), PlayMode::Order);
}

#[tokio::test]
async fn test_shuffle_skip_follows_shuffle_order() {
    let player = MockPlayer::new();
    let controller = controller(player.clone(), FakeSource::new(&[]));
    controller
        .enqueue_fast(&songs(&["1", "2", "3", "4", "5"]), false)
        .await;
    controller.set_repeat_mode(PlayMode::Shuffle).await;

    let order = controller.shuffle_order().unwrap();
    let positions = order.positions().to_vec();
    assert_eq!(positions.len(), 5);

    player.set_active(Some(positions[0]));
    controller.skip_next().await;
    assert_eq!(player.count(&format!("skip {}", positions[1])), 1);
}

#[tokio::test]
async fn test_shuffle_order_disabled() {
    let player = MockPlayer::new();
    let resolver = TrackResolver::new(
        player.clone(),
        FakeSource::new(&[]),
        Arc::new(SystemClock),
        HashMap::new(),
    );
    let controller =
        QueueController::new(player.clone(), Arc::new(resolver)).with_shuffle_order(false);
    controller.enqueue_fast(&songs(&["1", "2", "3"]), false).await;

    controller.set_repeat_mode(PlayMode::Shuffle).await;

    assert!(controller.shuffle_order().is_none());
    player.set_active(Some(0));
    controller.skip_next().await;
    assert_eq!(player.count("skip 1"), 1);
}

// ============================================================================
// Pass-throughs
// ============================================================================

#[tokio::test]
async fn test_player_failures_are_swallowed() {
    let player = MockPlayer::new();
    let controller = controller(player.clone(), FakeSource::new(&[]));
    player.fail_all();

    controller.seek_to(30.0).await;
    controller.set_volume(1.5).await;
    controller.remove_at(0).await;
    controller.clear().await;
    controller.enqueue_fast(&songs(&["1"]), false).await;
    assert!(!controller.setup(PlayerOptions::default()).await);

    assert!(player.calls().contains(&"volume 1".to_string()));
}

#[tokio::test]
async fn test_setup_runs_once() {
    let player = MockPlayer::new();
    let controller = controller(player.clone(), FakeSource::new(&[]));

    assert!(controller.setup(PlayerOptions::default()).await);
    assert!(controller.setup(PlayerOptions::default()).await);

    assert_eq!(player.count("setup"), 1);
}

// ============================================================================
// Remote control bridge
// ============================================================================

fn bridge(player: &Arc<MockPlayer>, controller: &Arc<QueueController>) -> RemoteControlBridge {
    RemoteControlBridge::new(controller.clone(), player.clone())
}

#[tokio::test]
async fn test_remote_play_pause_branches_on_state() {
    let player = MockPlayer::new();
    let controller = controller(player.clone(), FakeSource::new(&[]));
    let bridge = bridge(&player, &controller);

    player.set_state(PlayerState::Playing);
    bridge.handle(PlayerEvent::RemotePlayPause).await;
    assert_eq!(player.calls(), vec!["pause"]);

    bridge.handle(PlayerEvent::RemotePlayPause).await;
    assert_eq!(player.calls(), vec!["pause", "play"]);
}

#[tokio::test]
async fn test_remote_transport_events() {
    let player = MockPlayer::new();
    let controller = controller(player.clone(), FakeSource::new(&[]));
    let bridge = bridge(&player, &controller);

    bridge.handle(PlayerEvent::RemoteSeek { position: 42.5 }).await;
    bridge.handle(PlayerEvent::RemoteStop).await;
    bridge.handle(PlayerEvent::RemotePause).await;

    assert_eq!(player.calls(), vec!["seek 42.5", "stop", "pause"]);
}

#[tokio::test]
async fn test_queue_end_with_repeat_off_stops() {
    let player = MockPlayer::new();
    let controller = controller(player.clone(), FakeSource::new(&[]));
    controller.enqueue_fast(&songs(&["1", "2"]), false).await;
    let bridge = bridge(&player, &controller);

    bridge
        .handle(PlayerEvent::QueueEnded {
            position: 200.0,
            track: Some(1),
        })
        .await;

    assert_eq!(player.count("play"), 0);
}

#[tokio::test]
async fn test_queue_end_with_repeat_restarts_at_zero() {
    let player = MockPlayer::new();
    let controller = controller(player.clone(), FakeSource::new(&[]));
    controller.enqueue_fast(&songs(&["1", "2"]), false).await;
    player.set_repeat(NativeRepeatMode::Queue);
    let bridge = bridge(&player, &controller);

    bridge
        .handle(PlayerEvent::QueueEnded {
            position: 0.0,
            track: Some(1),
        })
        .await;
    assert_eq!(player.count("play"), 0);

    bridge
        .handle(PlayerEvent::QueueEnded {
            position: 200.0,
            track: Some(1),
        })
        .await;
    assert_eq!(player.count("skip 0"), 1);
    assert_eq!(player.count("play"), 1);
}

#[tokio::test]
async fn test_playback_error_replays_active_entry() {
    let player = MockPlayer::new();
    let controller = controller(player.clone(), FakeSource::new(&[]));
    controller.enqueue_fast(&songs(&["1", "2"]), false).await;
    let bridge = bridge(&player, &controller);

    bridge
        .handle(PlayerEvent::PlaybackError {
            message: "403".into(),
        })
        .await;
    assert_eq!(player.count("play"), 0);

    player.set_active(Some(1));
    bridge
        .handle(PlayerEvent::PlaybackError {
            message: "403".into(),
        })
        .await;
    assert_eq!(player.count("skip 1"), 1);
    assert_eq!(player.count("play"), 1);
}

#[tokio::test]
async fn test_active_track_change_resolves_placeholder_once() {
    let player = MockPlayer::new();
    let source = FakeSource::new(&[]);
    let controller = controller(player.clone(), source.clone());
    controller.enqueue_fast(&songs(&["1", "2"]), false).await;
    let bridge = bridge(&player, &controller);

    bridge
        .handle(PlayerEvent::ActiveTrackChanged { index: Some(1) })
        .await;
    // Already resolved now; a second change is ignored.
    bridge
        .handle(PlayerEvent::ActiveTrackChanged { index: Some(1) })
        .await;
    bridge
        .handle(PlayerEvent::ActiveTrackChanged { index: None })
        .await;

    assert_eq!(source.lookups(), 1);
    assert_eq!(player.count("play"), 1);
}

#[tokio::test]
async fn test_bridge_run_loop_handles_events_until_closed() {
    let player = MockPlayer::new();
    let controller = controller(player.clone(), FakeSource::new(&[]));
    let bridge = Arc::new(bridge(&player, &controller));

    let (tx, rx) = broadcast::channel(8);
    let handle = tokio::spawn(bridge.run(rx));

    tx.send(PlayerEvent::RemoteSeek { position: 5.0 }).unwrap();
    tx.send(PlayerEvent::RemoteStop).unwrap();
    drop(tx);

    handle.await.unwrap();
    assert_eq!(player.calls(), vec!["seek 5", "stop"]);
}
