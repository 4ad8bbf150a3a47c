//! Seams between the streaming task and the outside world.
//!
//! The streaming task never decodes or touches a device itself: it pulls
//! chunks from a [`PcmSource`] and pushes them into an [`AudioOutput`], both
//! produced by a [`Pipeline`].

use std::path::Path;

use crate::error::Result;

use super::types::PcmChunk;

/// Decoded audio, delivered in fixed-size chunks at the requested format.
pub trait PcmSource {
    /// Next chunk, or `None` once the source is exhausted. May block.
    fn next_chunk(&mut self) -> Result<Option<PcmChunk>>;
}

/// An audio output device session.
pub trait AudioOutput {
    /// Hand a chunk to the device. Blocks while the device is saturated.
    fn write(&mut self, chunk: &PcmChunk) -> Result<()>;

    /// Close the device. With `drain` the already queued audio plays out
    /// first; otherwise it is dropped.
    fn finish(&mut self, drain: bool);
}

/// Factory for decode sources and output sessions.
///
/// Both are opened on the streaming worker thread, so neither needs to be
/// `Send`.
pub trait Pipeline: Send + Sync {
    fn open_source(
        &self,
        location: &Path,
        sample_rate: u32,
        channels: u16,
        start_seconds: f64,
    ) -> Result<Box<dyn PcmSource>>;

    fn open_output(&self, sample_rate: u32, channels: u16) -> Result<Box<dyn AudioOutput>>;
}
