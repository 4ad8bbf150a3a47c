//! The playback ledger: sessions plus their pause, resume and seek events.
//!
//! Rows are appended once and never deleted; the only update is setting a
//! session's end time when it closes.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::error::Result;
use crate::library::TrackId;

pub type SessionId = i64;

/// One contiguous attempt at playing a track. Times are milliseconds since
/// the Unix epoch; `ended_at == None` means the session is still open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackSession {
    pub id: SessionId,
    pub track_id: TrackId,
    pub started_at: i64,
    pub ended_at: Option<i64>,
}

/// A pause or resume event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackMark {
    pub session_id: SessionId,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeekMark {
    pub session_id: SessionId,
    pub timestamp: i64,
    pub position_seconds: f64,
}

/// Storage for the playback ledger.
///
/// Event lists come back in timestamp order (insertion order breaks ties).
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn insert_session(
        &self,
        track_id: TrackId,
        started_at: i64,
        ended_at: Option<i64>,
    ) -> Result<SessionId>;

    async fn update_session_end(&self, session_id: SessionId, ended_at: i64) -> Result<()>;

    /// Close `previous` (if any) and open a new session for `track_id`, both
    /// stamped `now`. Implementations should make the pair atomic.
    async fn rotate_session(
        &self,
        previous: Option<SessionId>,
        track_id: TrackId,
        now: i64,
    ) -> Result<SessionId> {
        if let Some(previous) = previous {
            self.update_session_end(previous, now).await?;
        }
        self.insert_session(track_id, now, None).await
    }

    async fn insert_pause(&self, session_id: SessionId, timestamp: i64) -> Result<()>;
    async fn insert_resume(&self, session_id: SessionId, timestamp: i64) -> Result<()>;
    async fn insert_seek(&self, session_id: SessionId, timestamp: i64, position: f64)
    -> Result<()>;

    async fn sessions(&self, track_id: TrackId) -> Result<Vec<PlaybackSession>>;
    async fn pauses(&self, session_id: SessionId) -> Result<Vec<PlaybackMark>>;
    async fn resumes(&self, session_id: SessionId) -> Result<Vec<PlaybackMark>>;
    async fn seeks(&self, session_id: SessionId) -> Result<Vec<SeekMark>>;
}

#[derive(Clone)]
pub struct SqliteEventStore {
    pool: SqlitePool,
}

impl SqliteEventStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn marks(&self, table: &'static str, session_id: SessionId) -> Result<Vec<PlaybackMark>> {
        let sql = format!(
            "SELECT playback_id, time FROM {table} WHERE playback_id = ? ORDER BY time, id"
        );
        let rows = sqlx::query(&sql)
            .bind(session_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| PlaybackMark {
                session_id: row.get("playback_id"),
                timestamp: row.get("time"),
            })
            .collect())
    }
}

#[async_trait]
impl EventStore for SqliteEventStore {
    async fn insert_session(
        &self,
        track_id: TrackId,
        started_at: i64,
        ended_at: Option<i64>,
    ) -> Result<SessionId> {
        let result =
            sqlx::query("INSERT INTO playbacks (track_id, time_started, time_ended) VALUES (?, ?, ?)")
                .bind(track_id)
                .bind(started_at)
                .bind(ended_at)
                .execute(&self.pool)
                .await?;
        Ok(result.last_insert_rowid())
    }

    async fn update_session_end(&self, session_id: SessionId, ended_at: i64) -> Result<()> {
        // `time_ended IS NULL` keeps the end write-once.
        sqlx::query("UPDATE playbacks SET time_ended = ? WHERE id = ? AND time_ended IS NULL")
            .bind(ended_at)
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn rotate_session(
        &self,
        previous: Option<SessionId>,
        track_id: TrackId,
        now: i64,
    ) -> Result<SessionId> {
        let mut tx = self.pool.begin().await?;

        if let Some(previous) = previous {
            sqlx::query("UPDATE playbacks SET time_ended = ? WHERE id = ? AND time_ended IS NULL")
                .bind(now)
                .bind(previous)
                .execute(&mut *tx)
                .await?;
        }
        let result =
            sqlx::query("INSERT INTO playbacks (track_id, time_started, time_ended) VALUES (?, ?, NULL)")
                .bind(track_id)
                .bind(now)
                .execute(&mut *tx)
                .await?;

        tx.commit().await?;
        Ok(result.last_insert_rowid())
    }

    async fn insert_pause(&self, session_id: SessionId, timestamp: i64) -> Result<()> {
        sqlx::query("INSERT INTO pauses (playback_id, time) VALUES (?, ?)")
            .bind(session_id)
            .bind(timestamp)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_resume(&self, session_id: SessionId, timestamp: i64) -> Result<()> {
        sqlx::query("INSERT INTO resumes (playback_id, time) VALUES (?, ?)")
            .bind(session_id)
            .bind(timestamp)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_seek(
        &self,
        session_id: SessionId,
        timestamp: i64,
        position: f64,
    ) -> Result<()> {
        sqlx::query("INSERT INTO seeks (playback_id, time, position) VALUES (?, ?, ?)")
            .bind(session_id)
            .bind(timestamp)
            .bind(position)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn sessions(&self, track_id: TrackId) -> Result<Vec<PlaybackSession>> {
        let rows = sqlx::query(
            "SELECT id, track_id, time_started, time_ended FROM playbacks WHERE track_id = ? ORDER BY time_started, id",
        )
        .bind(track_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| PlaybackSession {
                id: row.get("id"),
                track_id: row.get("track_id"),
                started_at: row.get("time_started"),
                ended_at: row.get("time_ended"),
            })
            .collect())
    }

    async fn pauses(&self, session_id: SessionId) -> Result<Vec<PlaybackMark>> {
        self.marks("pauses", session_id).await
    }

    async fn resumes(&self, session_id: SessionId) -> Result<Vec<PlaybackMark>> {
        self.marks("resumes", session_id).await
    }

    async fn seeks(&self, session_id: SessionId) -> Result<Vec<SeekMark>> {
        let rows = sqlx::query(
            "SELECT playback_id, time, position FROM seeks WHERE playback_id = ? ORDER BY time, id",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| SeekMark {
                session_id: row.get("playback_id"),
                timestamp: row.get("time"),
                position_seconds: row.get("position"),
            })
            .collect())
    }
}
