//! Error types for the daemon.
//!
//! Library code returns [`Result`]; the binary edge wraps these in `anyhow`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Database connection or query errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The decode pipeline could not open or read the audio source
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// The output device could not be opened or written
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    /// A ledger write needed an open playback session and there was none
    #[error("No playback session is open")]
    NoOpenSession,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
