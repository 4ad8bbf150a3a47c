//! Runs parsed commands against the engine and the library and renders the
//! reply lines.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::{LibrarySettings, TrackDisplayField};
use crate::error::Result;
use crate::library::{Library, Track, TrackId, track_display};
use crate::listened::listened_seconds;
use crate::playback::Engine;
use crate::store::EventStore;

use super::protocol::Command;

pub struct Dispatcher {
    engine: Engine,
    library: Arc<Library>,
    events: Arc<dyn EventStore>,
    display_fields: Vec<TrackDisplayField>,
    display_separator: String,
}

impl Dispatcher {
    pub fn new(
        engine: Engine,
        library: Arc<Library>,
        events: Arc<dyn EventStore>,
        settings: &LibrarySettings,
    ) -> Self {
        Self {
            engine,
            library,
            events,
            display_fields: settings.display_fields.clone(),
            display_separator: settings.display_separator.clone(),
        }
    }

    /// Parse and run one command line. Failures become a single
    /// `error: ...` line; nothing is changed when a command fails to parse
    /// or names an unknown id.
    pub async fn handle_line(&self, line: &str) -> Vec<String> {
        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(e) => {
                debug!(line = line.trim(), error = %e, "rejected command");
                return vec![format!("error: {e}")];
            }
        };

        debug!(?command, "command");
        match self.execute(command).await {
            Ok(lines) => lines,
            Err(e) => {
                warn!(line = line.trim(), error = %e, "command failed");
                vec![format!("error: {e}")]
            }
        }
    }

    pub async fn execute(&self, command: Command) -> Result<Vec<String>> {
        match command {
            Command::Pause => self.engine.pause().await?,
            Command::Resume => self.engine.resume().await?,
            Command::PlaySongs(ids) => {
                let tracks = self.tracks(&ids)?;
                self.engine.play_tracks(tracks).await?;
            }
            Command::PlayAlbum(id) => {
                let album = self.library.album(id)?;
                self.engine.play_album(album).await?;
            }
            Command::AddSongs(ids) => {
                let tracks = self.tracks(&ids)?;
                self.engine.enqueue_all(tracks).await?;
            }
            Command::AddAlbum(id) => {
                let album = self.library.album(id)?;
                self.engine.enqueue_all(album.tracks.clone()).await?;
            }
            Command::Next => self.engine.skip_next().await?,
            Command::Prev => self.engine.skip_prev().await?,
            Command::Seek(seconds) => self.engine.seek(seconds).await?,
            Command::Clear => self.engine.clear_queue_keep_current().await,
            Command::ListSongs => {
                return Ok(self.library.tracks().map(|t| self.line(t)).collect());
            }
            Command::ListLiked => {
                return Ok(self
                    .library
                    .tracks()
                    .filter(|t| t.is_liked())
                    .map(|t| self.line(t))
                    .collect());
            }
            Command::ListAlbums => {
                return Ok(self
                    .library
                    .albums()
                    .map(|album| match &album.artist {
                        Some(artist) => {
                            format!("{} {}{}{}", album.id, album.name, self.display_separator, artist)
                        }
                        None => format!("{} {}", album.id, album.name),
                    })
                    .collect());
            }
            Command::ListAlbum(id) => {
                let album = self.library.album(id)?;
                return Ok(album.tracks.iter().map(|t| self.line(t)).collect());
            }
            Command::Progress => {
                return Ok(match self.engine.current_track().await {
                    Some(track) => vec![format!(
                        "{:.2}/{:.2}",
                        self.engine.progress(),
                        track.duration_seconds
                    )],
                    None => Vec::new(),
                });
            }
            Command::Current => {
                return Ok(self
                    .engine
                    .current_track()
                    .await
                    .map(|t| self.line(&t))
                    .into_iter()
                    .collect());
            }
            Command::Queue => {
                let snapshot = self.engine.queue_snapshot().await;
                return Ok(snapshot
                    .upcoming
                    .iter()
                    .rev()
                    .chain(snapshot.history.iter().rev())
                    .map(|t| self.line(t))
                    .collect());
            }
            Command::Like(id) => self.library.like(id).await?,
            Command::IsLiked(id) => {
                return Ok(vec![self.library.track(id)?.is_liked().to_string()]);
            }
            Command::Listened(id) => {
                let seconds = listened_seconds(self.events.as_ref(), id).await?;
                return Ok(vec![format!("{seconds:.2}")]);
            }
        }
        Ok(Vec::new())
    }

    /// Resolve every id before anything is played, so one bad id changes
    /// nothing.
    fn tracks(&self, ids: &[TrackId]) -> Result<Vec<Arc<Track>>> {
        ids.iter().map(|id| self.library.track(*id)).collect()
    }

    fn line(&self, track: &Track) -> String {
        format!(
            "{} {}",
            track.id,
            track_display(track, &self.display_fields, &self.display_separator)
        )
    }
}
