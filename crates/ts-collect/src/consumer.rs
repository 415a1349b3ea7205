//! Independently paced consumer threads.
//!
//! Each [`ConsumerHandle`] owns one OS thread that walks the buffer from its
//! own cursor.  A slow consumer never blocks the simulation; it only holds
//! back eviction.  Consumers are controlled over a crossbeam channel
//! (pause, resume, reset, stop) and exit on their own once the buffer is
//! closed and fully drained.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use tracing::{debug, error};

use ts_core::Tick;

use crate::{CollectError, CollectResult, ConsumerCursor, NextTick, SnapshotBuffer, TickSnapshot};

/// Error type returned by consumer sinks.
pub type SinkError = Box<dyn std::error::Error + Send + Sync>;

/// Something that processes sealed ticks on its own thread.
pub trait TickConsumer: Send + 'static {
    fn name(&self) -> &str;

    fn consume(&mut self, snapshot: &TickSnapshot) -> Result<(), SinkError>;

    /// Whether empty placeholder ticks are passed to [`consume`](Self::consume).
    fn wants_placeholders(&self) -> bool {
        false
    }

    /// Called once when the consumer thread exits normally.
    fn finish(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

impl<C: TickConsumer + ?Sized> TickConsumer for Box<C> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn consume(&mut self, snapshot: &TickSnapshot) -> Result<(), SinkError> {
        (**self).consume(snapshot)
    }

    fn wants_placeholders(&self) -> bool {
        (**self).wants_placeholders()
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        (**self).finish()
    }
}

/// Where a new consumer's cursor starts.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum StartAt {
    /// The first tick not yet sealed.
    #[default]
    Now,
    /// The oldest snapshot still in the buffer.
    Earliest,
    Tick(Tick),
}

#[derive(Clone, Debug)]
pub struct ConsumerOptions {
    pub start:  StartAt,
    /// Ticks between consumed snapshots (1 = every tick).
    pub stride: u64,
    /// Idle wait when no new tick is available.
    pub poll:   Duration,
}

impl Default for ConsumerOptions {
    fn default() -> Self {
        Self { start: StartAt::Now, stride: 1, poll: Duration::from_millis(20) }
    }
}

/// Totals reported when a consumer thread exits.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConsumerSummary {
    pub name:         String,
    pub consumed:     u64,
    pub placeholders: u64,
    pub last_tick:    Option<Tick>,
}

#[derive(Debug)]
enum Control {
    Pause,
    Resume,
    Reset(Tick),
    Stop,
}

// ── ConsumerHandle ────────────────────────────────────────────────────────────

pub struct ConsumerHandle {
    name:       String,
    control_tx: Sender<Control>,
    handle:     Option<JoinHandle<CollectResult<ConsumerSummary>>>,
}

impl ConsumerHandle {
    /// Register `consumer` with `buffer` and start its thread.
    ///
    /// The cursor is registered before this returns, so nothing the consumer
    /// is due to read can be evicted in between.
    pub fn spawn<C: TickConsumer>(
        buffer: &Arc<SnapshotBuffer>,
        consumer: C,
        options: ConsumerOptions,
    ) -> CollectResult<Self> {
        let start = match options.start {
            StartAt::Now      => buffer.last_sealed().map_or(Tick::ZERO, Tick::next),
            StartAt::Earliest => buffer.first_available().unwrap_or(Tick::ZERO),
            StartAt::Tick(t)  => t,
        };
        let cursor = buffer.register_consumer(Some(start));
        let name = consumer.name().to_owned();
        let (control_tx, control_rx) = unbounded();

        let worker = Worker {
            consumer,
            cursor,
            control_rx,
            stride: options.stride.max(1),
            poll: options.poll,
            paused: false,
            summary: ConsumerSummary { name: name.clone(), ..Default::default() },
        };
        let handle = thread::Builder::new()
            .name(format!("ts-consumer-{name}"))
            .spawn(move || worker.run())
            .map_err(CollectError::Spawn)?;

        debug!(consumer = %name, start = %start, "consumer started");
        Ok(Self { name, control_tx, handle: Some(handle) })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pause(&self) {
        let _ = self.control_tx.send(Control::Pause);
    }

    pub fn resume(&self) {
        let _ = self.control_tx.send(Control::Resume);
    }

    /// Move the cursor to `tick` (clamped to last sealed + 1).
    pub fn reset(&self, tick: Tick) {
        let _ = self.control_tx.send(Control::Reset(tick));
    }

    /// Ask the thread to exit without draining the buffer.
    pub fn stop(&self) {
        let _ = self.control_tx.send(Control::Stop);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Wait for the thread to exit.  It exits after [`stop`](Self::stop), or
    /// once the buffer is closed and drained.
    pub fn join(mut self) -> CollectResult<ConsumerSummary> {
        self.wait()
    }

    fn wait(&mut self) -> CollectResult<ConsumerSummary> {
        match self.handle.take() {
            Some(h) => h.join().map_err(|_| CollectError::ConsumerPanicked(self.name.clone()))?,
            None => Ok(ConsumerSummary { name: self.name.clone(), ..Default::default() }),
        }
    }
}

impl Drop for ConsumerHandle {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.stop();
            if let Err(e) = self.wait() {
                error!(consumer = %self.name, error = %e, "consumer ended with error");
            }
        }
    }
}

// ── Worker loop ───────────────────────────────────────────────────────────────

struct Worker<C> {
    consumer:   C,
    cursor:     ConsumerCursor,
    control_rx: Receiver<Control>,
    stride:     u64,
    poll:       Duration,
    paused:     bool,
    summary:    ConsumerSummary,
}

impl<C: TickConsumer> Worker<C> {
    /// Apply a control message.  Returns `false` when the loop should exit.
    fn apply(&mut self, msg: Control) -> bool {
        match msg {
            Control::Pause     => self.paused = true,
            Control::Resume    => self.paused = false,
            Control::Reset(t)  => {
                let at = self.cursor.advance_to(t);
                debug!(consumer = %self.summary.name, tick = %at, "consumer reset");
            }
            Control::Stop      => return false,
        }
        true
    }

    fn sink_error(&self, source: SinkError) -> CollectError {
        error!(consumer = %self.summary.name, error = %source, "consumer sink failed");
        CollectError::Sink { consumer: self.summary.name.clone(), source }
    }

    fn run(mut self) -> CollectResult<ConsumerSummary> {
        'outer: loop {
            loop {
                match self.control_rx.try_recv() {
                    Ok(msg) => {
                        if !self.apply(msg) {
                            break 'outer;
                        }
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => break 'outer,
                }
            }
            if self.paused {
                match self.control_rx.recv() {
                    Ok(msg) => {
                        if self.apply(msg) {
                            continue;
                        }
                        break;
                    }
                    Err(_) => break,
                }
            }

            let from = self.cursor.position().unwrap_or(Tick::ZERO);
            match self.cursor.buffer().next_tick(from) {
                NextTick::Ready(snap) => {
                    self.consumer.consume(&snap).map_err(|e| self.sink_error(e))?;
                    self.summary.consumed += 1;
                    self.summary.last_tick = Some(snap.tick());
                    self.cursor.advance_to(snap.tick() + self.stride);
                }
                NextTick::Placeholder(empty) => {
                    if self.consumer.wants_placeholders() {
                        self.consumer.consume(&empty).map_err(|e| self.sink_error(e))?;
                    }
                    self.summary.placeholders += 1;
                    self.cursor.advance_to(from + self.stride);
                }
                NextTick::NotReady => {
                    // Closed is set after the final seal, so re-checking
                    // afterwards cannot miss a tick.
                    if self.cursor.buffer().is_closed() {
                        if self.cursor.buffer().next_tick(from).is_ready() {
                            continue;
                        }
                        break;
                    }
                    match self.control_rx.recv_timeout(self.poll) {
                        Ok(msg) => {
                            if !self.apply(msg) {
                                break;
                            }
                        }
                        Err(RecvTimeoutError::Timeout) => {}
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            }
        }

        self.consumer.finish().map_err(|e| self.sink_error(e))?;
        debug!(
            consumer = %self.summary.name,
            consumed = self.summary.consumed,
            placeholders = self.summary.placeholders,
            "consumer exiting"
        );
        Ok(self.summary)
    }
}
