//! SQLite persistence: the catalog written by the indexer and the
//! append-only playback ledger.

mod catalog;
mod events;
mod schema;

use std::path::Path;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use tracing::info;

use crate::error::Result;

pub use catalog::{AlbumRow, CatalogStore, TrackRow};
pub use events::{EventStore, PlaybackMark, PlaybackSession, SeekMark, SessionId, SqliteEventStore};

/// Open (creating if needed) the database at `path` and apply the schema.
pub async fn open(path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);
    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await?;

    schema::apply(&pool).await?;
    info!(path = %path.display(), "database ready");
    Ok(pool)
}

/// A private in-memory database. One connection, since every new
/// connection to `:memory:` would see an empty database.
#[cfg(test)]
pub async fn open_in_memory() -> Result<SqlitePool> {
    use std::str::FromStr;

    let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;
    schema::apply(&pool).await?;
    Ok(pool)
}
