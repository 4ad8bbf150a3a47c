use std::path::PathBuf;

use serde::Deserialize;

/// Top-level daemon settings loaded from `config.toml`.
///
/// File format: TOML
/// Default path (Linux/XDG): `$XDG_CONFIG_HOME/encore/config.toml` or `~/.config/encore/config.toml`
///
/// Precedence (highest wins):
/// 1) Command-line flags
/// 2) Environment variables (prefix `ENCORE__`, `__` as nested separator)
/// 3) Config file (if present)
/// 4) Struct defaults
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub audio: AudioSettings,
    pub server: ServerSettings,
    pub library: LibrarySettings,
    pub storage: StorageSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Highest sample rate handed to the decode pipeline and output device.
    /// Some 96 kHz files come out distorted on common devices, so the
    /// stream is resampled down to this rate.
    pub max_sample_rate: u32,
    /// Size of each raw PCM chunk pulled from the decoder (bytes of s16 samples).
    pub chunk_bytes: usize,
    /// How many chunks may sit in the output device queue before a write blocks.
    pub output_buffer_chunks: usize,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            max_sample_rate: 48_000,
            chunk_bytes: 1024,
            output_buffer_chunks: 8,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Address the command listener binds to.
    pub bind_address: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 5150,
        }
    }
}

#[derive(Debug, Copy, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrackDisplayField {
    Title,
    Artist,
    Album,
    Filename,
    Path,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LibrarySettings {
    /// Directory to index. Without it the daemon serves whatever is already
    /// in the database.
    pub music_dir: Option<PathBuf>,
    /// File extensions to treat as audio (case-insensitive, without dot).
    pub extensions: Vec<String>,
    /// Whether to follow symlinks during scanning.
    pub follow_links: bool,
    /// Whether to include hidden files/directories (dotfiles).
    pub include_hidden: bool,
    /// Whether to recurse into subdirectories.
    pub recursive: bool,
    /// Optional cap on directory recursion depth.
    pub max_depth: Option<usize>,
    /// Index new files in `music_dir` when the daemon starts.
    pub scan_on_startup: bool,

    /// Which fields make up a track line in listings.
    ///
    /// Example: ["title", "album", "artist"] -> "Title - Album - Artist"
    pub display_fields: Vec<TrackDisplayField>,
    /// Separator used to join `display_fields`.
    pub display_separator: String,
}

impl Default for LibrarySettings {
    fn default() -> Self {
        Self {
            music_dir: None,
            extensions: vec![
                "mp3".into(),
                "flac".into(),
                "opus".into(),
                "m4a".into(),
                "ogg".into(),
                "wav".into(),
            ],
            follow_links: true,
            include_hidden: false,
            recursive: true,
            max_depth: None,
            scan_on_startup: true,
            display_fields: vec![
                TrackDisplayField::Title,
                TrackDisplayField::Album,
                TrackDisplayField::Artist,
            ],
            display_separator: " - ".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// SQLite database holding the catalog and the playback ledger.
    /// Defaults to `$XDG_CACHE_HOME/encore/music.db`.
    pub database_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `tracing` filter directive; `RUST_LOG` takes precedence.
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "encore=info".to_string(),
        }
    }
}
