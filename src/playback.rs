//! The playback session engine: the queue state machine, the ledger writer
//! and the engine that ties both to the streaming task.

mod engine;
mod monitor;
mod queue;

pub use engine::{Engine, PlaybackStatus};
pub use monitor::{Clock, PlaybackMonitor, SystemClock};
pub use queue::{PlayQueue, QueueSnapshot};

#[cfg(test)]
mod tests;
