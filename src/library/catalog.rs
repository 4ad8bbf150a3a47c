use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::LibrarySettings;
use crate::error::{Error, Result};
use crate::store::CatalogStore;

use super::model::{Album, AlbumId, Track, TrackId};
use super::scan::scan;

/// Outcome of one indexing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexReport {
    pub added: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Walk `dir` and add every audio file not yet in the catalog.
///
/// A file that fails to index is logged and counted; the pass carries on.
pub async fn index(
    store: &CatalogStore,
    dir: &Path,
    settings: &LibrarySettings,
) -> Result<IndexReport> {
    let root = dir.to_path_buf();
    let scan_settings = settings.clone();
    let scanned = tokio::task::spawn_blocking(move || scan(&root, &scan_settings))
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))?;

    let mut report = IndexReport::default();
    for track in &scanned {
        if store.is_indexed(&track.path).await? {
            report.skipped += 1;
            continue;
        }
        match store.index_track(track).await {
            Ok(id) => {
                debug!(id, path = %track.path.display(), "indexed");
                report.added += 1;
            }
            Err(e) => {
                warn!(path = %track.path.display(), error = %e, "failed to index track");
                report.failed += 1;
            }
        }
    }

    info!(
        dir = %dir.display(),
        added = report.added,
        skipped = report.skipped,
        failed = report.failed,
        "library indexed"
    );
    Ok(report)
}

/// Read-only view of the catalog, loaded once at startup.
///
/// The only mutation is liking a track, which goes to the store first and
/// then flips the flag on the shared handle.
pub struct Library {
    store: CatalogStore,
    tracks: BTreeMap<TrackId, Arc<Track>>,
    albums: BTreeMap<AlbumId, Album>,
}

impl Library {
    pub async fn load(store: CatalogStore) -> Result<Self> {
        let rows = store.tracks().await?;
        let album_rows = store.albums().await?;

        let mut tracks = BTreeMap::new();
        let mut members: BTreeMap<AlbumId, Vec<(Option<i64>, Arc<Track>)>> = BTreeMap::new();
        for row in rows {
            let track = Arc::new(
                Track::new(
                    row.id,
                    row.path,
                    row.title,
                    row.duration_seconds,
                    row.sample_rate,
                    row.channels,
                )
                .with_artist(row.artist)
                .with_album(row.album)
                .with_liked(row.liked),
            );
            if let Some(album_id) = row.album_id {
                members
                    .entry(album_id)
                    .or_default()
                    .push((row.index_in_album, Arc::clone(&track)));
            }
            tracks.insert(row.id, track);
        }

        let mut albums = BTreeMap::new();
        for row in album_rows {
            let mut entries = members.remove(&row.id).unwrap_or_default();
            // Untagged track numbers sort after numbered ones.
            entries.sort_by_key(|(index, track)| (index.is_none(), *index, track.id));
            albums.insert(
                row.id,
                Album {
                    id: row.id,
                    name: row.name,
                    artist: row.artist,
                    tracks: entries.into_iter().map(|(_, t)| t).collect(),
                },
            );
        }

        info!(tracks = tracks.len(), albums = albums.len(), "library loaded");
        Ok(Self {
            store,
            tracks,
            albums,
        })
    }

    pub fn track(&self, id: TrackId) -> Result<Arc<Track>> {
        self.tracks
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::not_found("track", id))
    }

    pub fn album(&self, id: AlbumId) -> Result<&Album> {
        self.albums
            .get(&id)
            .ok_or_else(|| Error::not_found("album", id))
    }

    /// All tracks in id order.
    pub fn tracks(&self) -> impl Iterator<Item = &Arc<Track>> {
        self.tracks.values()
    }

    pub fn albums(&self) -> impl Iterator<Item = &Album> {
        self.albums.values()
    }

    pub async fn like(&self, id: TrackId) -> Result<()> {
        let track = self.track(id)?;
        if self.store.like(id).await? {
            debug!(id, "track liked");
        }
        track.mark_liked();
        Ok(())
    }
}
