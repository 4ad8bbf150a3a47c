//! Database schema.
//!
//! Applied statement by statement on every start; everything is
//! `IF NOT EXISTS`, so re-running is harmless.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::Result;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS artists (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        time INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS albums (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        artist_id INTEGER REFERENCES artists(id),
        time INTEGER NOT NULL,
        UNIQUE (name, artist_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tracks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        audio_path TEXT NOT NULL UNIQUE,
        duration REAL NOT NULL,
        sample_rate INTEGER NOT NULL,
        channels INTEGER NOT NULL,
        artist_id INTEGER REFERENCES artists(id),
        album_id INTEGER REFERENCES albums(id),
        index_in_album INTEGER,
        time INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS liked_tracks (
        track_id INTEGER PRIMARY KEY REFERENCES tracks(id),
        time INTEGER NOT NULL
    )
    "#,
    // The ledger deliberately has no foreign key to `tracks`: it must outlive
    // catalog rebuilds.
    r#"
    CREATE TABLE IF NOT EXISTS playbacks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        track_id INTEGER NOT NULL,
        time_started INTEGER NOT NULL,
        time_ended INTEGER
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS pauses (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        playback_id INTEGER NOT NULL REFERENCES playbacks(id),
        time INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS resumes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        playback_id INTEGER NOT NULL REFERENCES playbacks(id),
        time INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS seeks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        playback_id INTEGER NOT NULL REFERENCES playbacks(id),
        time INTEGER NOT NULL,
        position REAL NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_playbacks_track ON playbacks (track_id)",
    "CREATE INDEX IF NOT EXISTS idx_pauses_playback ON pauses (playback_id, time)",
    "CREATE INDEX IF NOT EXISTS idx_resumes_playback ON resumes (playback_id, time)",
    "CREATE INDEX IF NOT EXISTS idx_seeks_playback ON seeks (playback_id, time)",
];

pub async fn apply(pool: &SqlitePool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    debug!(statements = SCHEMA.len(), "schema applied");
    Ok(())
}
