use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub type TrackId = i64;
pub type AlbumId = i64;

/// A playable track from the catalog.
///
/// Tracks are shared as `Arc<Track>`; the only mutable attribute, `liked`,
/// lives inside the handle so queued references never go stale.
#[derive(Debug)]
pub struct Track {
    pub id: TrackId,
    pub path: PathBuf,
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    liked: AtomicBool,
}

impl Track {
    pub fn new(
        id: TrackId,
        path: impl Into<PathBuf>,
        title: impl Into<String>,
        duration_seconds: f64,
        sample_rate: u32,
        channels: u16,
    ) -> Self {
        Self {
            id,
            path: path.into(),
            title: title.into(),
            artist: None,
            album: None,
            duration_seconds,
            sample_rate,
            channels,
            liked: AtomicBool::new(false),
        }
    }

    pub fn with_artist(mut self, artist: Option<String>) -> Self {
        self.artist = artist;
        self
    }

    pub fn with_album(mut self, album: Option<String>) -> Self {
        self.album = album;
        self
    }

    pub fn with_liked(self, liked: bool) -> Self {
        self.liked.store(liked, Ordering::Relaxed);
        self
    }

    pub fn is_liked(&self) -> bool {
        self.liked.load(Ordering::Relaxed)
    }

    pub(crate) fn mark_liked(&self) {
        self.liked.store(true, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone)]
pub struct Album {
    pub id: AlbumId,
    pub name: String,
    pub artist: Option<String>,
    /// In album order.
    pub tracks: Vec<Arc<Track>>,
}

/// What the scanner learned about one audio file.
#[derive(Debug, Clone, PartialEq)]
pub struct ScannedTrack {
    pub path: PathBuf,
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub track_number: Option<u32>,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
}
