//! Background eviction thread.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use tracing::{debug, trace};

use crate::{CollectError, CollectResult, SnapshotBuffer};

/// Runs [`SnapshotBuffer::cleanup`] every `period` until stopped.
///
/// The first sweep happens after `2 * period` so consumers registered right
/// after start have a chance to place their cursors.
pub struct Janitor {
    stop_tx: Option<Sender<()>>,
    handle:  Option<JoinHandle<u64>>,
}

impl Janitor {
    pub fn spawn(buffer: Arc<SnapshotBuffer>, period: Duration) -> CollectResult<Self> {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let handle = thread::Builder::new()
            .name("ts-janitor".to_owned())
            .spawn(move || {
                let mut removed_total = 0u64;
                let mut wait = period * 2;
                loop {
                    match stop_rx.recv_timeout(wait) {
                        Err(RecvTimeoutError::Timeout) => {
                            let sweep = buffer.cleanup();
                            if sweep.removed > 0 {
                                trace!(removed = sweep.removed, remaining = sweep.remaining, "janitor sweep");
                            }
                            removed_total += sweep.removed as u64;
                            wait = period;
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!(removed_total, "janitor exiting");
                removed_total
            })
            .map_err(CollectError::Spawn)?;
        Ok(Self { stop_tx: Some(stop_tx), handle: Some(handle) })
    }

    /// Stop the thread and wait for it.  Returns the number of evicted snapshots.
    pub fn stop(mut self) -> u64 {
        self.shutdown()
    }

    fn shutdown(&mut self) -> u64 {
        // Dropping the sender disconnects the channel and wakes the thread.
        self.stop_tx.take();
        self.handle.take().and_then(|h| h.join().ok()).unwrap_or(0)
    }
}

impl Drop for Janitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}
