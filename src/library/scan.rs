use std::path::Path;

use lofty::prelude::*;
use tracing::debug;
use walkdir::WalkDir;

use crate::config::LibrarySettings;

use super::model::ScannedTrack;

/// Format assumed when a file's properties cannot be read.
const FALLBACK_SAMPLE_RATE: u32 = 44_100;
const FALLBACK_CHANNELS: u16 = 2;

fn is_audio_file(path: &Path, settings: &LibrarySettings) -> bool {
    let exts: Vec<String> = settings
        .extensions
        .iter()
        .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .collect();

    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            exts.iter().any(|e| e == &ext)
        })
        .unwrap_or(false)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

fn non_empty(value: Option<std::borrow::Cow<'_, str>>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read tags and stream properties for one file. Missing tags fall back to
/// the file stem as title; unreadable files still produce an entry.
pub fn read_track(path: &Path) -> ScannedTrack {
    let mut track = ScannedTrack {
        path: path.to_path_buf(),
        title: path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("UNKNOWN")
            .to_string(),
        artist: None,
        album: None,
        track_number: None,
        duration_seconds: 0.0,
        sample_rate: FALLBACK_SAMPLE_RATE,
        channels: FALLBACK_CHANNELS,
    };

    let tagged = match lofty::read_from_path(path) {
        Ok(tagged) => tagged,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "no readable tags");
            return track;
        }
    };

    let properties = tagged.properties();
    track.duration_seconds = properties.duration().as_secs_f64();
    if let Some(rate) = properties.sample_rate().filter(|r| *r > 0) {
        track.sample_rate = rate;
    }
    if let Some(channels) = properties.channels().filter(|c| *c > 0) {
        track.channels = u16::from(channels);
    }

    if let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) {
        if let Some(title) = non_empty(tag.title()) {
            track.title = title;
        }
        track.artist = non_empty(tag.artist());
        track.album = non_empty(tag.album());
        track.track_number = tag.track();
    }

    track
}

pub fn scan(dir: &Path, settings: &LibrarySettings) -> Vec<ScannedTrack> {
    let mut tracks: Vec<ScannedTrack> = Vec::new();

    let mut walker = WalkDir::new(dir).follow_links(settings.follow_links);

    // Non-recursive = only the root directory.
    let depth_cap = if settings.recursive {
        settings.max_depth
    } else {
        Some(1)
    };
    if let Some(d) = depth_cap {
        walker = walker.max_depth(d);
    }

    for entry in walker
        .into_iter()
        .filter_entry(|e| settings.include_hidden || e.depth() == 0 || !is_hidden(e.path()))
        .filter_map(Result::ok)
    {
        let path = entry.path();
        if path.is_file()
            && (settings.include_hidden || !is_hidden(path))
            && is_audio_file(path, settings)
        {
            tracks.push(read_track(path));
        }
    }

    // Stable order so ids follow the directory layout on a fresh index.
    tracks.sort_by(|a, b| a.path.cmp(&b.path));
    tracks
}
