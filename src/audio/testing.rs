//! In-process pipeline double used by streaming and engine tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::error::{Error, Result};

use super::pipeline::{AudioOutput, PcmSource, Pipeline};
use super::types::{PcmChunk, StreamSpec};

#[derive(Debug, Clone, Copy)]
pub(crate) enum Behavior {
    /// Never runs dry; the stream only ends when cancelled.
    Endless,
    /// Yields this many chunks, then end of data.
    Finite(usize),
    FailOnOpen,
    /// Yields this many chunks, then a decode error.
    FailAfter(usize),
    /// The decoder panics while opening the source.
    PanicOnOpen,
}

pub(crate) struct ScriptedPipeline {
    default: Behavior,
    overrides: Mutex<HashMap<PathBuf, Behavior>>,
    chunk_samples: usize,
    write_delay: Duration,
    opened: Mutex<Vec<StreamSpec>>,
    written: Arc<AtomicUsize>,
    drained: Arc<AtomicUsize>,
}

impl ScriptedPipeline {
    pub(crate) fn new(default: Behavior) -> Self {
        Self {
            default,
            overrides: Mutex::new(HashMap::new()),
            chunk_samples: 512,
            write_delay: Duration::from_millis(1),
            opened: Mutex::new(Vec::new()),
            written: Arc::new(AtomicUsize::new(0)),
            drained: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn with_chunk_samples(mut self, chunk_samples: usize) -> Self {
        self.chunk_samples = chunk_samples;
        self
    }

    pub(crate) fn set_behavior(&self, path: impl Into<PathBuf>, behavior: Behavior) {
        self.overrides.lock().unwrap().insert(path.into(), behavior);
    }

    /// Every source opened so far, with the sample rate actually requested.
    pub(crate) fn opened(&self) -> Vec<StreamSpec> {
        self.opened.lock().unwrap().clone()
    }

    pub(crate) fn chunks_written(&self) -> usize {
        self.written.load(Ordering::SeqCst)
    }

    /// Outputs closed with `drain = true`, i.e. streams that played out.
    pub(crate) fn drained(&self) -> usize {
        self.drained.load(Ordering::SeqCst)
    }

    fn behavior_for(&self, location: &Path) -> Behavior {
        self.overrides
            .lock()
            .unwrap()
            .get(location)
            .copied()
            .unwrap_or(self.default)
    }
}

impl Pipeline for ScriptedPipeline {
    fn open_source(
        &self,
        location: &Path,
        sample_rate: u32,
        channels: u16,
        start_seconds: f64,
    ) -> Result<Box<dyn PcmSource>> {
        self.opened.lock().unwrap().push(StreamSpec {
            location: location.to_path_buf(),
            sample_rate,
            channels,
            start_seconds,
        });

        let (remaining, fail_at_end) = match self.behavior_for(location) {
            Behavior::Endless => (None, false),
            Behavior::Finite(n) => (Some(n), false),
            Behavior::FailAfter(n) => (Some(n), true),
            Behavior::FailOnOpen => {
                return Err(Error::Decode(format!("cannot open {}", location.display())));
            }
            Behavior::PanicOnOpen => panic!("decoder blew up on {}", location.display()),
        };
        Ok(Box::new(ScriptedSource {
            remaining,
            fail_at_end,
            chunk_samples: self.chunk_samples,
        }))
    }

    fn open_output(&self, _sample_rate: u32, _channels: u16) -> Result<Box<dyn AudioOutput>> {
        Ok(Box::new(ScriptedOutput {
            delay: self.write_delay,
            written: self.written.clone(),
            drained: self.drained.clone(),
        }))
    }
}

struct ScriptedSource {
    remaining: Option<usize>,
    fail_at_end: bool,
    chunk_samples: usize,
}

impl PcmSource for ScriptedSource {
    fn next_chunk(&mut self) -> Result<Option<PcmChunk>> {
        match self.remaining.as_mut() {
            Some(0) if self.fail_at_end => Err(Error::Decode("corrupt frame".into())),
            Some(0) => Ok(None),
            Some(n) => {
                *n -= 1;
                Ok(Some(PcmChunk::new(vec![0; self.chunk_samples])))
            }
            None => Ok(Some(PcmChunk::new(vec![0; self.chunk_samples]))),
        }
    }
}

struct ScriptedOutput {
    delay: Duration,
    written: Arc<AtomicUsize>,
    drained: Arc<AtomicUsize>,
}

impl AudioOutput for ScriptedOutput {
    fn write(&mut self, _chunk: &PcmChunk) -> Result<()> {
        thread::sleep(self.delay);
        self.written.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn finish(&mut self, drain: bool) {
        if drain {
            self.drained.fetch_add(1, Ordering::SeqCst);
        }
    }
}
