//! The control surface of the daemon.
//!
//! All state lives in one [`EngineState`] behind a single async mutex and
//! every control operation runs entirely inside it. The streaming worker
//! never takes that lock: it writes progress into a [`ProgressHandle`] and
//! reports its end on a channel, which a supervisor task drains. Streams are
//! numbered; an end report for anything but the latest stream is ignored.

use std::sync::{Arc, Weak};

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::audio::{Pipeline, ProgressHandle, StreamEvent, StreamOutcome, StreamSpec, StreamTask};
use crate::config::AudioSettings;
use crate::error::Result;
use crate::library::{Album, Track};
use crate::store::EventStore;

use super::monitor::{Clock, PlaybackMonitor, SystemClock};
use super::queue::{PlayQueue, QueueSnapshot};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlaybackStatus {
    /// Nothing has been played yet.
    #[default]
    Idle,
    Playing,
    Paused,
}

struct EngineState {
    queue: PlayQueue,
    status: PlaybackStatus,
    stream: Option<StreamTask>,
    monitor: PlaybackMonitor,
    /// Number of the latest stream started or stopped.
    generation: u64,
}

struct Shared {
    state: Mutex<EngineState>,
    pipeline: Arc<dyn Pipeline>,
    progress: ProgressHandle,
    events: mpsc::UnboundedSender<StreamEvent>,
    max_sample_rate: u32,
    supervisor: std::sync::Mutex<Option<JoinHandle<()>>>,
}

/// Cloneable handle to the playback engine.
///
/// Must be created inside a tokio runtime.
#[derive(Clone)]
pub struct Engine {
    shared: Arc<Shared>,
}

impl Engine {
    pub fn new(
        pipeline: Arc<dyn Pipeline>,
        store: Arc<dyn EventStore>,
        settings: &AudioSettings,
    ) -> Self {
        Self::with_clock(pipeline, store, Arc::new(SystemClock), settings)
    }

    pub fn with_clock(
        pipeline: Arc<dyn Pipeline>,
        store: Arc<dyn EventStore>,
        clock: Arc<dyn Clock>,
        settings: &AudioSettings,
    ) -> Self {
        let (events, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            state: Mutex::new(EngineState {
                queue: PlayQueue::new(),
                status: PlaybackStatus::Idle,
                stream: None,
                monitor: PlaybackMonitor::new(store, clock),
                generation: 0,
            }),
            pipeline,
            progress: ProgressHandle::default(),
            events,
            max_sample_rate: settings.max_sample_rate,
            supervisor: std::sync::Mutex::new(None),
        });

        let handle = tokio::spawn(supervise(Arc::downgrade(&shared), rx));
        if let Ok(mut slot) = shared.supervisor.lock() {
            *slot = Some(handle);
        }

        Self { shared }
    }

    /// Play `track` right away; the previous current track goes to history.
    pub async fn play_now(&self, track: Arc<Track>) -> Result<()> {
        let mut state = self.shared.state.lock().await;
        self.shared.play_now(&mut state, track).await
    }

    /// Replace the whole queue: play the first track, queue the rest.
    pub async fn play_tracks(&self, tracks: Vec<Arc<Track>>) -> Result<()> {
        let mut tracks = tracks.into_iter();
        let Some(first) = tracks.next() else {
            return Ok(());
        };

        let mut state = self.shared.state.lock().await;
        state.queue.clear();
        self.shared.play_now(&mut state, first).await?;
        for track in tracks {
            self.shared.enqueue(&mut state, track).await?;
        }
        Ok(())
    }

    pub async fn play_album(&self, album: &Album) -> Result<()> {
        self.play_tracks(album.tracks.clone()).await
    }

    pub async fn enqueue(&self, track: Arc<Track>) -> Result<()> {
        let mut state = self.shared.state.lock().await;
        self.shared.enqueue(&mut state, track).await
    }

    pub async fn enqueue_all(&self, tracks: Vec<Arc<Track>>) -> Result<()> {
        let mut state = self.shared.state.lock().await;
        for track in tracks {
            self.shared.enqueue(&mut state, track).await?;
        }
        Ok(())
    }

    pub async fn pause(&self) -> Result<()> {
        let mut state = self.shared.state.lock().await;
        if state.status != PlaybackStatus::Playing {
            return Ok(());
        }
        self.shared.stop_stream(&mut state).await;
        state.status = PlaybackStatus::Paused;
        debug!(position = self.shared.progress.position(), "paused");
        state.monitor.record_pause().await
    }

    /// Continue the current track from the last reported position.
    pub async fn resume(&self) -> Result<()> {
        let mut state = self.shared.state.lock().await;
        if state.status == PlaybackStatus::Playing {
            return Ok(());
        }
        let Some(track) = state.queue.current().cloned() else {
            return Ok(());
        };

        let position = self.shared.progress.position();
        self.shared.start_stream(&mut state, &track, position).await;
        state.status = PlaybackStatus::Playing;
        debug!(position, "resumed");
        state.monitor.record_resume().await
    }

    /// Move the current track to `position_seconds` (clamped at zero).
    ///
    /// While paused only the stored position moves; the next resume starts
    /// from there.
    pub async fn seek(&self, position_seconds: f64) -> Result<()> {
        let mut state = self.shared.state.lock().await;
        let Some(track) = state.queue.current().cloned() else {
            return Ok(());
        };

        let position = position_seconds.max(0.0);
        if state.status == PlaybackStatus::Playing {
            self.shared.start_stream(&mut state, &track, position).await;
        } else {
            self.shared.progress.set_position(position);
        }
        debug!(position, "seek");
        state.monitor.record_seek(position).await
    }

    pub async fn skip_next(&self) -> Result<()> {
        let mut state = self.shared.state.lock().await;
        self.shared.skip_next(&mut state).await
    }

    pub async fn skip_prev(&self) -> Result<()> {
        let mut state = self.shared.state.lock().await;
        let Some(track) = state.queue.step_back() else {
            return Ok(());
        };
        self.shared.switch_to(&mut state, track).await
    }

    /// Forget everything queued and played except the current track.
    pub async fn clear_queue_keep_current(&self) {
        let mut state = self.shared.state.lock().await;
        state.queue.keep_only_current();
    }

    pub async fn current_track(&self) -> Option<Arc<Track>> {
        let state = self.shared.state.lock().await;
        state.queue.current().cloned()
    }

    /// Position of the current track in seconds.
    pub fn progress(&self) -> f64 {
        self.shared.progress.position()
    }

    pub async fn status(&self) -> PlaybackStatus {
        self.shared.state.lock().await.status
    }

    pub async fn queue_snapshot(&self) -> QueueSnapshot {
        self.shared.state.lock().await.queue.snapshot()
    }

    /// Stop audio, close the open session and stop reacting to stream ends.
    pub async fn shutdown(&self) -> Result<()> {
        let result = {
            let mut state = self.shared.state.lock().await;
            self.shared.stop_stream(&mut state).await;
            if state.status == PlaybackStatus::Playing {
                state.status = PlaybackStatus::Paused;
            }
            state.monitor.close_current_session().await
        };

        if let Ok(mut slot) = self.shared.supervisor.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
        info!("playback engine stopped");
        result
    }
}

#[cfg(test)]
impl Engine {
    /// Number of the latest stream started or stopped.
    pub(super) async fn generation(&self) -> u64 {
        self.shared.state.lock().await.generation
    }

    /// Handle a stream end the way the supervisor does, and wait for it.
    pub(super) async fn handle_stream_end(&self, event: StreamEvent) -> Result<()> {
        self.shared.on_stream_end(event).await
    }
}

impl Shared {
    async fn play_now(&self, state: &mut EngineState, track: Arc<Track>) -> Result<()> {
        state.queue.push_current(track.clone());
        self.switch_to(state, track).await
    }

    async fn enqueue(&self, state: &mut EngineState, track: Arc<Track>) -> Result<()> {
        if state.queue.enqueue(track.clone()) {
            self.switch_to(state, track).await
        } else {
            debug!(track = track.id, "queued");
            Ok(())
        }
    }

    async fn skip_next(&self, state: &mut EngineState) -> Result<()> {
        let Some(track) = state.queue.advance() else {
            return Ok(());
        };
        self.switch_to(state, track).await
    }

    /// Start `track` from the beginning in a new session.
    async fn switch_to(&self, state: &mut EngineState, track: Arc<Track>) -> Result<()> {
        self.start_stream(state, &track, 0.0).await;
        state.status = PlaybackStatus::Playing;
        info!(track = track.id, title = %track.title, "now playing");
        state.monitor.open_session(track.id).await?;
        Ok(())
    }

    /// Terminate the active stream, if any, and wait for its worker to exit.
    async fn stop_stream(&self, state: &mut EngineState) {
        if let Some(stream) = state.stream.take() {
            stream.terminate().await;
        }
        state.generation += 1;
    }

    async fn start_stream(&self, state: &mut EngineState, track: &Track, start_seconds: f64) {
        self.stop_stream(state).await;

        let generation = state.generation;
        self.progress.reset(generation, start_seconds);

        let progress = self.progress.clone();
        let events = self.events.clone();
        let spec = StreamSpec {
            location: track.path.clone(),
            sample_rate: track.sample_rate,
            channels: track.channels,
            start_seconds,
        };
        state.stream = Some(StreamTask::spawn(
            self.pipeline.clone(),
            spec,
            self.max_sample_rate,
            move |position| progress.update(generation, position),
            move |outcome| {
                // The receiver only goes away once the engine is gone.
                let _ = events.send(StreamEvent {
                    generation,
                    outcome,
                });
            },
        ));
    }

    async fn on_stream_end(&self, event: StreamEvent) -> Result<()> {
        let mut state = self.state.lock().await;
        if event.generation != state.generation {
            debug!(generation = event.generation, "ignoring end of stale stream");
            return Ok(());
        }

        match event.outcome {
            StreamOutcome::Completed => {
                if state.status == PlaybackStatus::Playing {
                    self.skip_next(&mut state).await?;
                }
            }
            StreamOutcome::Failed(reason) => {
                if state.status != PlaybackStatus::Playing {
                    return Ok(());
                }
                self.stop_stream(&mut state).await;
                state.status = PlaybackStatus::Paused;
                warn!(
                    track = ?state.queue.current().map(|t| t.id),
                    %reason,
                    "playback failed, pausing"
                );
                state.monitor.record_pause().await?;
            }
            StreamOutcome::Cancelled => {}
        }
        Ok(())
    }
}

/// Reap stream ends for as long as the engine exists.
async fn supervise(shared: Weak<Shared>, mut events: mpsc::UnboundedReceiver<StreamEvent>) {
    while let Some(event) = events.recv().await {
        let Some(shared) = shared.upgrade() else {
            break;
        };
        if let Err(e) = shared.on_stream_end(event).await {
            warn!(error = %e, "failed to handle end of stream");
        }
    }
}
