//! The music library: directory scanning, indexing into the catalog tables
//! and the in-memory catalog the engine and protocol read from.

mod catalog;
mod display;
mod model;
mod scan;

pub use catalog::{IndexReport, Library, index};
pub use display::track_display;
pub use model::{Album, AlbumId, ScannedTrack, Track, TrackId};
