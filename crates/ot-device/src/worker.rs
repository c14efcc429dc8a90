//! Per-device background workers.
//!
//! One blocking thread per device polls its source and posts readouts
//! to a single-consumer channel. The consumer (the pipeline) is the
//! only writer of race state, so no further synchronization is needed.
//! Workers stop cooperatively: the flag is checked once per iteration
//! and readouts already queued are still delivered after a stop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use ot_core::RawReadout;

use crate::source::ReadoutSource;

/// A running device worker thread.
pub struct DeviceWorker {
    name: String,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl DeviceWorker {
    /// Spawns a worker polling `source` every `poll_interval` when idle.
    ///
    /// Readouts go into `sender`; the worker exits on its own when the
    /// receiving end is dropped.
    pub fn spawn(
        mut source: impl ReadoutSource + 'static,
        sender: Sender<RawReadout>,
        poll_interval: Duration,
    ) -> std::io::Result<Self> {
        let name = source.name().to_string();
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);

        let handle = thread::Builder::new()
            .name(format!("device-{name}"))
            .spawn(move || {
                while !flag.load(Ordering::Relaxed) {
                    match source.poll() {
                        Ok(Some(readout)) => {
                            debug!(device = source.name(), card = readout.card_number, "readout");
                            if sender.send(readout).is_err() {
                                // consumer gone
                                break;
                            }
                        }
                        Ok(None) => thread::sleep(poll_interval),
                        Err(error) => {
                            warn!(device = source.name(), %error, "source poll failed");
                            thread::sleep(poll_interval);
                        }
                    }
                }
            })?;

        Ok(Self {
            name,
            stop,
            handle: Some(handle),
        })
    }

    /// The device name this worker was spawned for.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Requests a stop and waits for the thread to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!(device = %self.name, "worker thread panicked");
            }
        }
    }
}

impl Drop for DeviceWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
