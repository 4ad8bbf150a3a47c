//! Catalog tables written by the indexer and read back into the in-memory
//! library.
//!
//! Each track is indexed in its own transaction, so a scan never holds a
//! global lock and a failed file leaves no half-written rows behind.

use std::path::{Path, PathBuf};

use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use crate::error::Result;
use crate::library::{AlbumId, ScannedTrack, TrackId};

#[derive(Debug, Clone, PartialEq)]
pub struct TrackRow {
    pub id: TrackId,
    pub path: PathBuf,
    pub title: String,
    pub artist: Option<String>,
    pub album_id: Option<AlbumId>,
    pub album: Option<String>,
    pub index_in_album: Option<i64>,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub liked: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlbumRow {
    pub id: AlbumId,
    pub name: String,
    pub artist: Option<String>,
}

#[derive(Clone)]
pub struct CatalogStore {
    pool: SqlitePool,
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl CatalogStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn is_indexed(&self, path: &Path) -> Result<bool> {
        let exists: i64 =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM tracks WHERE audio_path = ?)")
                .bind(path.to_string_lossy().as_ref())
                .fetch_one(&self.pool)
                .await?;
        Ok(exists != 0)
    }

    /// Insert one scanned file with its artist and album, atomically.
    pub async fn index_track(&self, scanned: &ScannedTrack) -> Result<TrackId> {
        let mut tx = self.pool.begin().await?;

        let artist_id = match scanned.artist.as_deref() {
            Some(name) => Some(artist_id(&mut tx, name).await?),
            None => None,
        };
        let album_id = match scanned.album.as_deref() {
            Some(name) => Some(album_id(&mut tx, name, artist_id).await?),
            None => None,
        };

        let result = sqlx::query(
            r#"
            INSERT INTO tracks
                (title, audio_path, duration, sample_rate, channels,
                 artist_id, album_id, index_in_album, time)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&scanned.title)
        .bind(scanned.path.to_string_lossy().as_ref())
        .bind(scanned.duration_seconds)
        .bind(i64::from(scanned.sample_rate))
        .bind(i64::from(scanned.channels))
        .bind(artist_id)
        .bind(album_id)
        .bind(scanned.track_number.map(i64::from))
        .bind(now_millis())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn tracks(&self) -> Result<Vec<TrackRow>> {
        let rows = sqlx::query(
            r#"
            SELECT t.id, t.title, t.audio_path, t.duration, t.sample_rate, t.channels,
                   t.album_id, t.index_in_album,
                   ar.name AS artist_name, al.name AS album_name,
                   (l.track_id IS NOT NULL) AS liked
            FROM tracks t
            LEFT JOIN artists ar ON ar.id = t.artist_id
            LEFT JOIN albums al ON al.id = t.album_id
            LEFT JOIN liked_tracks l ON l.track_id = t.id
            ORDER BY t.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| TrackRow {
                id: row.get("id"),
                path: PathBuf::from(row.get::<String, _>("audio_path")),
                title: row.get("title"),
                artist: row.get("artist_name"),
                album_id: row.get("album_id"),
                album: row.get("album_name"),
                index_in_album: row.get("index_in_album"),
                duration_seconds: row.get("duration"),
                sample_rate: row.get::<i64, _>("sample_rate").try_into().unwrap_or(0),
                channels: row.get::<i64, _>("channels").try_into().unwrap_or(0),
                liked: row.get::<i64, _>("liked") != 0,
            })
            .collect())
    }

    pub async fn albums(&self) -> Result<Vec<AlbumRow>> {
        let rows = sqlx::query(
            r#"
            SELECT al.id, al.name, ar.name AS artist_name
            FROM albums al
            LEFT JOIN artists ar ON ar.id = al.artist_id
            ORDER BY al.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| AlbumRow {
                id: row.get("id"),
                name: row.get("name"),
                artist: row.get("artist_name"),
            })
            .collect())
    }

    /// Mark a track as liked. Returns `false` if it already was.
    pub async fn like(&self, track_id: TrackId) -> Result<bool> {
        let result = sqlx::query("INSERT OR IGNORE INTO liked_tracks (track_id, time) VALUES (?, ?)")
            .bind(track_id)
            .bind(now_millis())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

async fn artist_id(tx: &mut Transaction<'_, Sqlite>, name: &str) -> Result<i64> {
    sqlx::query("INSERT OR IGNORE INTO artists (name, time) VALUES (?, ?)")
        .bind(name)
        .bind(now_millis())
        .execute(&mut **tx)
        .await?;
    let id: i64 = sqlx::query_scalar("SELECT id FROM artists WHERE name = ?")
        .bind(name)
        .fetch_one(&mut **tx)
        .await?;
    Ok(id)
}

async fn album_id(
    tx: &mut Transaction<'_, Sqlite>,
    name: &str,
    artist_id: Option<i64>,
) -> Result<i64> {
    // UNIQUE(name, artist_id) does not fire for NULL artists, so look first.
    let existing: Option<i64> =
        sqlx::query_scalar("SELECT id FROM albums WHERE name = ? AND artist_id IS ?")
            .bind(name)
            .bind(artist_id)
            .fetch_optional(&mut **tx)
            .await?;
    if let Some(id) = existing {
        return Ok(id);
    }

    let result = sqlx::query("INSERT INTO albums (name, artist_id, time) VALUES (?, ?, ?)")
        .bind(name)
        .bind(artist_id)
        .bind(now_millis())
        .execute(&mut **tx)
        .await?;
    Ok(result.last_insert_rowid())
}
