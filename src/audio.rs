//! Audio streaming: the decode/output seams and the cancellable task that
//! moves PCM chunks from one to the other.

mod pipeline;
mod sink;
mod stream;
mod types;

pub use pipeline::{AudioOutput, PcmSource, Pipeline};
pub use sink::RodioPipeline;
pub use stream::StreamTask;
pub use types::*;

#[cfg(test)]
pub(crate) mod testing;
