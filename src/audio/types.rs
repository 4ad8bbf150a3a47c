//! Audio-related small types and handles.
//!
//! This module defines the PCM chunk exchanged between the decode pipeline
//! and the output device, what a stream needs to start, how it ended, and
//! the progress handle shared with the control path.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Each sample is a signed 16-bit little-endian integer.
pub const BYTES_PER_SAMPLE: usize = 2;

/// A block of interleaved s16 PCM samples.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PcmChunk {
    pub samples: Vec<i16>,
}

impl PcmChunk {
    pub fn new(samples: Vec<i16>) -> Self {
        Self { samples }
    }

    pub fn byte_len(&self) -> usize {
        self.samples.len() * BYTES_PER_SAMPLE
    }

    /// Playback time covered by this chunk at the given format.
    pub fn seconds(&self, channels: u16, sample_rate: u32) -> f64 {
        self.byte_len() as f64 / BYTES_PER_SAMPLE as f64 / channels as f64 / sample_rate as f64
    }
}

/// What a streaming task needs to start.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSpec {
    pub location: PathBuf,
    pub sample_rate: u32,
    pub channels: u16,
    pub start_seconds: f64,
}

/// How a streaming task ended. Cancellation is never reported to callbacks.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamOutcome {
    /// The decoder ran dry without a cancel request.
    Completed,
    /// Decoding or output failed; the track did not play to its end.
    Failed(String),
    Cancelled,
}

/// Sent by a finished stream to whoever supervises it.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEvent {
    pub generation: u64,
    pub outcome: StreamOutcome,
}

#[derive(Debug, Clone, Copy, Default)]
/// Position reported by the streaming task, tagged with the stream it belongs to.
pub struct PlaybackInfo {
    pub generation: u64,
    pub position_seconds: f64,
}

/// Shared progress handle. The worker writes it after every chunk without
/// touching the engine lock.
#[derive(Debug, Clone, Default)]
pub struct ProgressHandle(Arc<Mutex<PlaybackInfo>>);

impl ProgressHandle {
    /// Start tracking a new stream at `position_seconds`.
    pub fn reset(&self, generation: u64, position_seconds: f64) {
        if let Ok(mut info) = self.0.lock() {
            *info = PlaybackInfo {
                generation,
                position_seconds,
            };
        }
    }

    /// Record progress for `generation`; updates from older streams are dropped.
    pub fn update(&self, generation: u64, position_seconds: f64) {
        if let Ok(mut info) = self.0.lock() {
            if info.generation == generation {
                info.position_seconds = position_seconds;
            }
        }
    }

    /// Move the position of the current stream, e.g. a seek while paused.
    pub fn set_position(&self, position_seconds: f64) {
        if let Ok(mut info) = self.0.lock() {
            info.position_seconds = position_seconds;
        }
    }

    pub fn position(&self) -> f64 {
        self.0.lock().map(|info| info.position_seconds).unwrap_or(0.0)
    }
}
