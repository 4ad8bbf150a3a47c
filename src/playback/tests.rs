use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use super::*;
use crate::audio::{StreamEvent, StreamOutcome};
use crate::audio::testing::{Behavior, ScriptedPipeline};
use crate::config::AudioSettings;
use crate::error::Error;
use crate::library::{Track, TrackId};
use crate::listened::listened_seconds;
use crate::store::{self, EventStore, PlaybackSession, SqliteEventStore};

#[derive(Default)]
struct ManualClock(AtomicI64);

impl ManualClock {
    fn set(&self, millis: i64) {
        self.0.store(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

struct Harness {
    engine: Engine,
    pipeline: Arc<ScriptedPipeline>,
    store: Arc<SqliteEventStore>,
    clock: Arc<ManualClock>,
}

async fn harness(pipeline: ScriptedPipeline) -> Harness {
    let pool = store::open_in_memory().await.unwrap();
    let store = Arc::new(SqliteEventStore::new(pool));
    let pipeline = Arc::new(pipeline);
    let clock = Arc::new(ManualClock::default());
    let engine = Engine::with_clock(
        pipeline.clone(),
        store.clone(),
        clock.clone(),
        &AudioSettings::default(),
    );
    Harness {
        engine,
        pipeline,
        store,
        clock,
    }
}

/// 512-sample chunks of 256 Hz stereo: every chunk is one second.
fn track(id: TrackId) -> Arc<Track> {
    Arc::new(Track::new(id, format!("/music/{id}.flac"), format!("Track {id}"), 600.0, 256, 2))
}

fn ids(tracks: &[Arc<Track>]) -> Vec<TrackId> {
    tracks.iter().map(|t| t.id).collect()
}

async fn wait_until(mut done: impl FnMut() -> bool) {
    for _ in 0..500 {
        if done() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

async fn wait_for_state(engine: &Engine, current: Option<TrackId>, status: PlaybackStatus) {
    for _ in 0..500 {
        let now = engine.current_track().await.map(|t| t.id);
        if now == current && engine.status().await == status {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("engine never reached {current:?} / {status:?}");
}

async fn open_sessions(store: &SqliteEventStore, tracks: &[TrackId]) -> Vec<PlaybackSession> {
    let mut open = Vec::new();
    for id in tracks {
        for session in store.sessions(*id).await.unwrap() {
            if session.ended_at.is_none() {
                open.push(session);
            }
        }
    }
    open
}

#[tokio::test]
async fn monitor_requires_an_open_session() {
    let pool = store::open_in_memory().await.unwrap();
    let store = Arc::new(SqliteEventStore::new(pool));
    let mut monitor = PlaybackMonitor::new(store.clone(), Arc::new(ManualClock::default()));

    assert!(matches!(monitor.record_pause().await, Err(Error::NoOpenSession)));
    assert!(matches!(monitor.record_resume().await, Err(Error::NoOpenSession)));
    assert!(matches!(monitor.record_seek(1.0).await, Err(Error::NoOpenSession)));
    monitor.close_current_session().await.unwrap();
    assert!(store.sessions(1).await.unwrap().is_empty());
}

#[tokio::test]
async fn monitor_rotates_sessions_with_monotonic_stamps() {
    let pool = store::open_in_memory().await.unwrap();
    let store = Arc::new(SqliteEventStore::new(pool));
    let clock = Arc::new(ManualClock::default());
    let mut monitor = PlaybackMonitor::new(store.clone(), clock.clone());

    clock.set(5_000);
    let first = monitor.open_session(1).await.unwrap();
    // Wall clock stepping back must not reorder the ledger.
    clock.set(4_000);
    monitor.record_pause().await.unwrap();
    clock.set(9_000);
    let second = monitor.open_session(2).await.unwrap();
    assert_eq!(monitor.current_session(), Some(second));

    assert_eq!(store.pauses(first).await.unwrap()[0].timestamp, 5_000);
    assert_eq!(store.sessions(1).await.unwrap()[0].ended_at, Some(9_000));
    assert_eq!(store.sessions(2).await.unwrap()[0].ended_at, None);

    clock.set(12_000);
    monitor.close_current_session().await.unwrap();
    monitor.close_current_session().await.unwrap();
    assert_eq!(monitor.current_session(), None);
    assert_eq!(store.sessions(2).await.unwrap()[0].ended_at, Some(12_000));
}

#[tokio::test]
async fn operations_without_a_current_track_are_noops() {
    let h = harness(ScriptedPipeline::new(Behavior::Endless)).await;

    h.engine.pause().await.unwrap();
    h.engine.resume().await.unwrap();
    h.engine.seek(10.0).await.unwrap();
    h.engine.skip_next().await.unwrap();
    h.engine.skip_prev().await.unwrap();
    h.engine.clear_queue_keep_current().await;
    h.engine.play_tracks(Vec::new()).await.unwrap();

    assert_eq!(h.engine.status().await, PlaybackStatus::Idle);
    assert!(h.engine.current_track().await.is_none());
    assert_eq!(h.engine.progress(), 0.0);
    assert!(h.pipeline.opened().is_empty());
    h.engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn enqueue_after_play_now_keeps_first_track_current() {
    let h = harness(ScriptedPipeline::new(Behavior::Endless)).await;

    h.engine.play_now(track(0)).await.unwrap();
    for id in 1..=3 {
        h.engine.enqueue(track(id)).await.unwrap();
        assert_eq!(h.engine.current_track().await.unwrap().id, 0);
    }
    h.engine.enqueue_all(vec![track(4), track(5)]).await.unwrap();
    assert_eq!(h.engine.current_track().await.unwrap().id, 0);
    assert_eq!(h.engine.status().await, PlaybackStatus::Playing);

    let snapshot = h.engine.queue_snapshot().await;
    assert_eq!(ids(&snapshot.upcoming), vec![5, 4, 3, 2, 1, 0]);

    h.engine.skip_next().await.unwrap();
    assert_eq!(h.engine.current_track().await.unwrap().id, 1);

    wait_until(|| h.pipeline.opened().len() == 2).await;
    h.engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn enqueue_into_empty_queue_starts_playing() {
    let h = harness(ScriptedPipeline::new(Behavior::Endless)).await;

    h.engine.enqueue(track(3)).await.unwrap();
    assert_eq!(h.engine.status().await, PlaybackStatus::Playing);
    assert_eq!(h.store.sessions(3).await.unwrap().len(), 1);
    wait_until(|| h.pipeline.opened().len() == 1).await;
    assert_eq!(h.pipeline.opened()[0].start_seconds, 0.0);

    h.engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn play_tracks_replaces_the_queue() {
    let h = harness(ScriptedPipeline::new(Behavior::Endless)).await;

    h.engine.play_now(track(9)).await.unwrap();
    h.engine.enqueue(track(8)).await.unwrap();
    h.engine
        .play_tracks(vec![track(1), track(2), track(3)])
        .await
        .unwrap();

    let snapshot = h.engine.queue_snapshot().await;
    assert_eq!(ids(&snapshot.upcoming), vec![3, 2, 1]);
    assert!(snapshot.history.is_empty());
    assert!(h.store.sessions(9).await.unwrap()[0].ended_at.is_some());

    h.engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn exactly_one_session_is_open_across_play_now_and_skip_next() {
    let h = harness(ScriptedPipeline::new(Behavior::Endless)).await;
    let all = [1, 2, 3];

    h.clock.set(1_000);
    h.engine.play_now(track(1)).await.unwrap();
    assert_eq!(open_sessions(&h.store, &all).await.len(), 1);

    h.engine.enqueue(track(2)).await.unwrap();
    h.clock.set(2_000);
    h.engine.skip_next().await.unwrap();
    let open = open_sessions(&h.store, &all).await;
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].track_id, 2);
    assert_eq!(h.store.sessions(1).await.unwrap()[0].ended_at, Some(2_000));

    h.clock.set(3_000);
    h.engine.play_now(track(3)).await.unwrap();
    let open = open_sessions(&h.store, &all).await;
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].track_id, 3);

    h.clock.set(4_000);
    h.engine.shutdown().await.unwrap();
    assert!(open_sessions(&h.store, &all).await.is_empty());
    assert_eq!(h.store.sessions(3).await.unwrap()[0].ended_at, Some(4_000));
}

#[tokio::test]
async fn skip_next_on_last_track_replays_it() {
    let h = harness(ScriptedPipeline::new(Behavior::Endless)).await;

    h.engine.play_now(track(4)).await.unwrap();
    h.engine.skip_next().await.unwrap();

    assert_eq!(h.engine.current_track().await.unwrap().id, 4);
    assert_eq!(h.store.sessions(4).await.unwrap().len(), 2);
    wait_until(|| h.pipeline.opened().len() == 2).await;

    h.engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn skip_prev_swaps_with_the_previous_track() {
    let h = harness(ScriptedPipeline::new(Behavior::Endless)).await;

    h.engine.play_now(track(1)).await.unwrap();
    h.engine.enqueue(track(2)).await.unwrap();
    h.engine.enqueue(track(3)).await.unwrap();
    h.engine.skip_next().await.unwrap();
    h.engine.skip_next().await.unwrap();
    assert_eq!(h.engine.current_track().await.unwrap().id, 3);

    h.engine.skip_prev().await.unwrap();
    assert_eq!(h.engine.current_track().await.unwrap().id, 2);
    h.engine.skip_prev().await.unwrap();
    assert_eq!(h.engine.current_track().await.unwrap().id, 3);
    assert_eq!(ids(&h.engine.queue_snapshot().await.history), vec![2, 1]);

    h.engine.clear_queue_keep_current().await;
    let snapshot = h.engine.queue_snapshot().await;
    assert_eq!(ids(&snapshot.upcoming), vec![3]);
    assert!(snapshot.history.is_empty());
    assert_eq!(h.engine.status().await, PlaybackStatus::Playing);

    h.engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn pause_resume_and_seek_are_recorded() {
    let h = harness(ScriptedPipeline::new(Behavior::Endless)).await;
    let t = track(1);

    h.clock.set(1_000);
    h.engine.play_now(t.clone()).await.unwrap();
    h.clock.set(3_000);
    h.engine.pause().await.unwrap();
    assert_eq!(h.engine.status().await, PlaybackStatus::Paused);
    // A second pause is a no-op.
    h.engine.pause().await.unwrap();

    h.clock.set(5_000);
    h.engine.resume().await.unwrap();
    assert_eq!(h.engine.status().await, PlaybackStatus::Playing);
    h.engine.resume().await.unwrap();

    h.clock.set(6_000);
    h.engine.seek(30.0).await.unwrap();
    wait_until(|| {
        h.pipeline
            .opened()
            .last()
            .is_some_and(|spec| spec.start_seconds == 30.0)
    })
    .await;

    h.clock.set(10_000);
    h.engine.shutdown().await.unwrap();

    let sessions = h.store.sessions(1).await.unwrap();
    assert_eq!(sessions.len(), 1);
    let session = sessions[0].id;
    assert_eq!(h.store.pauses(session).await.unwrap().len(), 1);
    assert_eq!(h.store.resumes(session).await.unwrap().len(), 1);
    let seeks = h.store.seeks(session).await.unwrap();
    assert_eq!(seeks.len(), 1);
    assert_eq!(seeks[0].position_seconds, 30.0);
    assert_eq!(seeks[0].timestamp, 6_000);

    let listened = listened_seconds(h.store.as_ref(), 1).await.unwrap();
    assert!((listened - 7.0).abs() < 1e-9);
}

#[tokio::test]
async fn resume_continues_from_last_reported_position() {
    let h = harness(ScriptedPipeline::new(Behavior::Endless)).await;

    h.engine.play_now(track(1)).await.unwrap();
    wait_until(|| h.engine.progress() >= 3.0).await;
    h.engine.pause().await.unwrap();

    let position = h.engine.progress();
    let written = h.pipeline.chunks_written();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(h.engine.progress(), position);
    assert_eq!(h.pipeline.chunks_written(), written);

    h.engine.resume().await.unwrap();
    wait_until(|| h.pipeline.opened().len() == 2).await;
    assert_eq!(h.pipeline.opened()[1].start_seconds, position);

    h.engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn seek_while_paused_only_moves_the_position() {
    let h = harness(ScriptedPipeline::new(Behavior::Endless)).await;

    h.engine.play_now(track(1)).await.unwrap();
    wait_until(|| h.pipeline.opened().len() == 1).await;
    h.engine.pause().await.unwrap();

    h.engine.seek(12.5).await.unwrap();
    assert_eq!(h.engine.progress(), 12.5);
    assert_eq!(h.engine.status().await, PlaybackStatus::Paused);
    h.engine.seek(-4.0).await.unwrap();
    assert_eq!(h.engine.progress(), 0.0);
    h.engine.seek(12.5).await.unwrap();
    assert_eq!(h.pipeline.opened().len(), 1);

    h.engine.resume().await.unwrap();
    wait_until(|| h.pipeline.opened().len() == 2).await;
    assert_eq!(h.pipeline.opened()[1].start_seconds, 12.5);

    let session = h.store.sessions(1).await.unwrap()[0].id;
    assert_eq!(h.store.seeks(session).await.unwrap().len(), 3);
    h.engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn natural_completion_advances_to_the_next_track() {
    let pipeline = ScriptedPipeline::new(Behavior::Endless);
    pipeline.set_behavior("/music/1.flac", Behavior::Finite(3));
    let h = harness(pipeline).await;

    h.engine.play_tracks(vec![track(1), track(2)]).await.unwrap();
    wait_for_state(&h.engine, Some(2), PlaybackStatus::Playing).await;

    let snapshot = h.engine.queue_snapshot().await;
    assert_eq!(ids(&snapshot.upcoming), vec![2]);
    assert_eq!(ids(&snapshot.history), vec![1]);
    assert!(h.store.sessions(1).await.unwrap()[0].ended_at.is_some());
    assert_eq!(open_sessions(&h.store, &[1, 2]).await.len(), 1);
    assert_eq!(h.pipeline.drained(), 1);

    h.engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn stream_failure_pauses_without_advancing() {
    let pipeline = ScriptedPipeline::new(Behavior::Endless);
    pipeline.set_behavior("/music/1.flac", Behavior::FailAfter(2));
    let h = harness(pipeline).await;

    h.engine.play_tracks(vec![track(1), track(2)]).await.unwrap();
    wait_for_state(&h.engine, Some(1), PlaybackStatus::Paused).await;

    assert_eq!(ids(&h.engine.queue_snapshot().await.upcoming), vec![2, 1]);
    let sessions = h.store.sessions(1).await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(h.store.pauses(sessions[0].id).await.unwrap().len(), 1);
    assert!(h.store.sessions(2).await.unwrap().is_empty());

    h.engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn panicking_decoder_pauses_without_advancing() {
    let pipeline = ScriptedPipeline::new(Behavior::Endless);
    pipeline.set_behavior("/music/1.flac", Behavior::PanicOnOpen);
    let h = harness(pipeline).await;

    h.engine.play_tracks(vec![track(1), track(2)]).await.unwrap();
    wait_for_state(&h.engine, Some(1), PlaybackStatus::Paused).await;

    assert_eq!(ids(&h.engine.queue_snapshot().await.upcoming), vec![2, 1]);
    let sessions = h.store.sessions(1).await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(h.store.pauses(sessions[0].id).await.unwrap().len(), 1);

    // The engine keeps working after the worker died.
    h.engine.skip_next().await.unwrap();
    wait_until(|| h.pipeline.chunks_written() > 0).await;
    assert_eq!(h.engine.status().await, PlaybackStatus::Playing);
    assert_eq!(h.engine.current_track().await.unwrap().id, 2);

    h.engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn stale_stream_ends_are_ignored() {
    let h = harness(ScriptedPipeline::new(Behavior::Endless)).await;
    let stale = |generation| StreamEvent {
        generation,
        outcome: StreamOutcome::Completed,
    };
    let stale_failure = |generation| StreamEvent {
        generation,
        outcome: StreamOutcome::Failed("late decode error".into()),
    };

    h.engine.play_tracks(vec![track(1), track(2)]).await.unwrap();
    let first = h.engine.generation().await;
    h.engine.skip_next().await.unwrap();
    assert!(h.engine.generation().await > first);

    // Ends of the stream that played track 1 arrive after the skip.
    h.engine.handle_stream_end(stale(first)).await.unwrap();
    h.engine.handle_stream_end(stale_failure(first)).await.unwrap();

    let snapshot = h.engine.queue_snapshot().await;
    assert_eq!(ids(&snapshot.upcoming), vec![2]);
    assert_eq!(ids(&snapshot.history), vec![1]);
    assert_eq!(h.engine.status().await, PlaybackStatus::Playing);
    assert_eq!(h.store.sessions(1).await.unwrap().len(), 1);
    let playing = h.store.sessions(2).await.unwrap();
    assert_eq!(playing.len(), 1);
    assert!(h.store.pauses(playing[0].id).await.unwrap().is_empty());

    // Pausing retires the stream too; its late end must not advance.
    let before_pause = h.engine.generation().await;
    h.engine.pause().await.unwrap();
    h.engine.handle_stream_end(stale(before_pause)).await.unwrap();
    h.engine.handle_stream_end(stale_failure(before_pause)).await.unwrap();

    assert_eq!(h.engine.current_track().await.unwrap().id, 2);
    assert_eq!(h.engine.status().await, PlaybackStatus::Paused);
    assert_eq!(h.store.sessions(2).await.unwrap().len(), 1);
    assert_eq!(h.store.pauses(playing[0].id).await.unwrap().len(), 1);
    assert_eq!(open_sessions(&h.store, &[1, 2]).await.len(), 1);

    h.engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn shutdown_stops_streaming() {
    let h = harness(ScriptedPipeline::new(Behavior::Endless)).await;

    h.engine.play_now(track(1)).await.unwrap();
    wait_until(|| h.pipeline.chunks_written() > 2).await;
    h.engine.shutdown().await.unwrap();

    let written = h.pipeline.chunks_written();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(h.pipeline.chunks_written(), written);
    assert_eq!(h.engine.status().await, PlaybackStatus::Paused);
    assert!(open_sessions(&h.store, &[1]).await.is_empty());
}
