//! Writes queue transitions into the playback ledger.
//!
//! At most one session is open at a time: opening a session closes the
//! previous one in the same store transaction.

use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, Result};
use crate::library::TrackId;
use crate::store::{EventStore, SessionId};

/// Source of ledger timestamps, in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

pub struct PlaybackMonitor {
    store: Arc<dyn EventStore>,
    clock: Arc<dyn Clock>,
    current: Option<SessionId>,
    last_stamp: i64,
}

impl PlaybackMonitor {
    pub fn new(store: Arc<dyn EventStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            current: None,
            last_stamp: i64::MIN,
        }
    }

    pub fn current_session(&self) -> Option<SessionId> {
        self.current
    }

    /// Never earlier than the previous stamp, even if the wall clock steps back.
    fn stamp(&mut self) -> i64 {
        let now = self.clock.now_millis().max(self.last_stamp);
        self.last_stamp = now;
        now
    }

    fn open(&self) -> Result<SessionId> {
        self.current.ok_or(Error::NoOpenSession)
    }

    /// Close the open session (if any) and open one for `track_id`.
    ///
    /// On failure the previous session stays current.
    pub async fn open_session(&mut self, track_id: TrackId) -> Result<SessionId> {
        let now = self.stamp();
        let id = self.store.rotate_session(self.current, track_id, now).await?;
        debug!(session = id, track = track_id, previous = ?self.current, "session opened");
        self.current = Some(id);
        Ok(id)
    }

    pub async fn record_pause(&mut self) -> Result<()> {
        let session = self.open()?;
        let now = self.stamp();
        self.store.insert_pause(session, now).await
    }

    pub async fn record_resume(&mut self) -> Result<()> {
        let session = self.open()?;
        let now = self.stamp();
        self.store.insert_resume(session, now).await
    }

    pub async fn record_seek(&mut self, position_seconds: f64) -> Result<()> {
        let session = self.open()?;
        let now = self.stamp();
        self.store.insert_seek(session, now, position_seconds).await
    }

    pub async fn close_current_session(&mut self) -> Result<()> {
        let Some(session) = self.current else {
            return Ok(());
        };
        let now = self.stamp();
        self.store.update_session_end(session, now).await?;
        self.current = None;
        debug!(session, "session closed");
        Ok(())
    }
}
