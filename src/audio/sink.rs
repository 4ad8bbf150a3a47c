//! `rodio`-backed decode pipeline and output device.
//!
//! Decoding uses `rodio::Decoder` with `skip_duration` as the seeking
//! primitive and `UniformSourceIterator` to deliver the requested sample rate
//! and channel count. Output appends each chunk to a `Sink` on the default
//! output stream.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::thread;
use std::time::Duration;

use rodio::buffer::SamplesBuffer;
use rodio::source::UniformSourceIterator;
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};

use crate::config::AudioSettings;
use crate::error::{Error, Result};

use super::pipeline::{AudioOutput, PcmSource, Pipeline};
use super::types::{BYTES_PER_SAMPLE, PcmChunk};

/// How long a blocked write waits before checking the device queue again.
const WRITE_POLL: Duration = Duration::from_millis(2);

pub struct RodioPipeline {
    chunk_samples: usize,
    output_buffer_chunks: usize,
}

impl RodioPipeline {
    pub fn new(settings: &AudioSettings) -> Self {
        Self {
            chunk_samples: (settings.chunk_bytes / BYTES_PER_SAMPLE).max(1),
            output_buffer_chunks: settings.output_buffer_chunks.max(1),
        }
    }
}

/// Offset to skip before the first sample. Positions too large for a
/// `Duration` are a decode error rather than a panic in the worker.
pub(super) fn seek_offset(start_seconds: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(start_seconds.max(0.0))
        .map_err(|e| Error::Decode(format!("cannot seek to {start_seconds}s: {e}")))
}

impl Pipeline for RodioPipeline {
    fn open_source(
        &self,
        location: &Path,
        sample_rate: u32,
        channels: u16,
        start_seconds: f64,
    ) -> Result<Box<dyn PcmSource>> {
        let file = File::open(location)?;
        let decoder = Decoder::new(BufReader::new(file))
            .map_err(|e| Error::Decode(format!("{}: {e}", location.display())))?;

        // `skip_duration` is our seeking primitive; even Duration::ZERO is fine.
        let skipped = decoder.skip_duration(seek_offset(start_seconds)?);
        let uniform = UniformSourceIterator::new(skipped, channels, sample_rate);

        Ok(Box::new(DecodedSource {
            samples: Box::new(uniform),
            chunk_samples: self.chunk_samples,
        }))
    }

    fn open_output(&self, sample_rate: u32, channels: u16) -> Result<Box<dyn AudioOutput>> {
        let mut stream = OutputStreamBuilder::open_default_stream()
            .map_err(|e| Error::AudioOutput(e.to_string()))?;
        // rodio logs to stderr when OutputStream is dropped, which happens on
        // every track change here.
        stream.log_on_drop(false);

        let sink = Sink::connect_new(stream.mixer());
        Ok(Box::new(DeviceOutput {
            _stream: stream,
            sink,
            sample_rate,
            channels,
            max_queued: self.output_buffer_chunks,
        }))
    }
}

struct DecodedSource {
    samples: Box<dyn Iterator<Item = f32>>,
    chunk_samples: usize,
}

impl PcmSource for DecodedSource {
    fn next_chunk(&mut self) -> Result<Option<PcmChunk>> {
        let samples: Vec<i16> = self
            .samples
            .by_ref()
            .take(self.chunk_samples)
            .map(to_i16)
            .collect();
        if samples.is_empty() {
            return Ok(None);
        }
        Ok(Some(PcmChunk::new(samples)))
    }
}

struct DeviceOutput {
    // Dropping the stream closes the device, so it lives as long as the sink.
    _stream: OutputStream,
    sink: Sink,
    sample_rate: u32,
    channels: u16,
    max_queued: usize,
}

impl AudioOutput for DeviceOutput {
    fn write(&mut self, chunk: &PcmChunk) -> Result<()> {
        while self.sink.len() >= self.max_queued {
            thread::sleep(WRITE_POLL);
        }
        let samples: Vec<f32> = chunk.samples.iter().copied().map(to_f32).collect();
        self.sink
            .append(SamplesBuffer::new(self.channels, self.sample_rate, samples));
        Ok(())
    }

    fn finish(&mut self, drain: bool) {
        if drain {
            self.sink.sleep_until_end();
        }
        self.sink.stop();
    }
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

fn to_f32(sample: i16) -> f32 {
    sample as f32 / i16::MAX as f32
}
