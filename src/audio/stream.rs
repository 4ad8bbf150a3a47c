//! The streaming task: one active audio output session at a time.
//!
//! The chunk loop runs on tokio's blocking pool. Cancellation is a plain
//! `AtomicBool` checked between chunk reads and writes, so a cancel request
//! never waits on in-flight I/O and takes effect after the current chunk.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::pipeline::Pipeline;
use super::types::{StreamOutcome, StreamSpec};

pub struct StreamTask {
    cancel: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

impl StreamTask {
    /// Start streaming `spec` through `pipeline`.
    ///
    /// `on_progress` receives the absolute position (seconds) after each chunk
    /// is written. `on_finish` is called at most once, from the worker, for
    /// [`StreamOutcome::Completed`] or [`StreamOutcome::Failed`]; a cancelled
    /// stream never calls it. A panic inside the pipeline counts as a failure.
    pub fn spawn<P, F>(
        pipeline: Arc<dyn Pipeline>,
        spec: StreamSpec,
        max_sample_rate: u32,
        on_progress: P,
        on_finish: F,
    ) -> Self
    where
        P: FnMut(f64) + Send + 'static,
        F: FnOnce(StreamOutcome) + Send + 'static,
    {
        let cancel = Arc::new(AtomicBool::new(false));
        let flag = cancel.clone();

        let join = tokio::task::spawn_blocking(move || {
            let location = spec.location.clone();
            let run = panic::catch_unwind(AssertUnwindSafe(|| {
                run_stream(pipeline.as_ref(), spec, max_sample_rate, &flag, on_progress)
            }));
            let outcome = match run {
                Ok(outcome) => outcome,
                Err(_) if flag.load(Ordering::SeqCst) => StreamOutcome::Cancelled,
                Err(payload) => StreamOutcome::Failed(format!(
                    "stream worker panicked: {}",
                    panic_message(payload.as_ref())
                )),
            };
            match outcome {
                StreamOutcome::Cancelled => {
                    debug!(path = %location.display(), "stream cancelled");
                }
                outcome => {
                    if let StreamOutcome::Failed(reason) = &outcome {
                        warn!(path = %location.display(), %reason, "stream failed");
                    } else {
                        debug!(path = %location.display(), "stream completed");
                    }
                    on_finish(outcome);
                }
            }
        });

        Self { cancel, join }
    }

    /// Request cooperative cancellation without waiting for the worker.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Cancel and wait until the worker has released the device.
    pub async fn terminate(self) {
        self.cancel();
        if let Err(e) = self.join.await {
            warn!(error = %e, "stream worker did not exit cleanly");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown cause")
}

/// The chunk loop. Returns how the stream ended.
fn run_stream<P>(
    pipeline: &dyn Pipeline,
    spec: StreamSpec,
    max_sample_rate: u32,
    cancel: &AtomicBool,
    mut on_progress: P,
) -> StreamOutcome
where
    P: FnMut(f64),
{
    let cancelled = || cancel.load(Ordering::SeqCst);

    let sample_rate = spec.sample_rate.min(max_sample_rate);
    let channels = spec.channels;
    if sample_rate == 0 || channels == 0 {
        return StreamOutcome::Failed(format!(
            "unsupported format: {sample_rate} Hz, {channels} channels"
        ));
    }

    let mut source =
        match pipeline.open_source(&spec.location, sample_rate, channels, spec.start_seconds) {
            Ok(source) => source,
            Err(e) => return StreamOutcome::Failed(e.to_string()),
        };
    let mut output = match pipeline.open_output(sample_rate, channels) {
        Ok(output) => output,
        Err(e) => return StreamOutcome::Failed(e.to_string()),
    };

    let mut progress = spec.start_seconds;
    loop {
        if cancelled() {
            output.finish(false);
            return StreamOutcome::Cancelled;
        }

        let chunk = match source.next_chunk() {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(e) => {
                output.finish(false);
                return StreamOutcome::Failed(e.to_string());
            }
        };

        if cancelled() {
            output.finish(false);
            return StreamOutcome::Cancelled;
        }
        if let Err(e) = output.write(&chunk) {
            output.finish(false);
            return StreamOutcome::Failed(e.to_string());
        }

        progress += chunk.seconds(channels, sample_rate);
        if !cancelled() {
            on_progress(progress);
        }
    }

    if cancelled() {
        output.finish(false);
        return StreamOutcome::Cancelled;
    }
    output.finish(true);
    StreamOutcome::Completed
}
