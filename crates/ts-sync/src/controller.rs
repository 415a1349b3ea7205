//! `SyncController`: the simulation thread's side of the control plane.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{select, unbounded, Receiver};
use serde_json::Value;
use tracing::{info, warn};

use ts_core::{DisconnectPolicy, SyncConfig, Tick};

use crate::protocol::{self, Inbound};
use crate::{ControlRequest, ControlServer, GateState, Outbox, SyncError, SyncGate, SyncResult};

/// Outcome of a `CTRL_<op>`: optional data on success, a message on failure.
pub type ControlReply = Result<Option<Value>, String>;

/// Serves forwarded control commands and queries.
///
/// Called only on the simulation thread, between ticks, so implementations
/// may touch world state freely.
pub trait ControlHandler {
    fn control(&mut self, op: &str, body: &Value) -> ControlReply;

    fn query(&mut self, what: &str, body: &Value) -> Result<Value, String>;
}

/// Result of waiting at a tick boundary.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AwaitOutcome {
    /// One unit was consumed; run the tick.
    Advance,
    /// The controller sent `CTRL_end`.
    EndRequested,
}

pub struct SyncController {
    gate:              Arc<SyncGate>,
    server:            ControlServer,
    outbox:            Outbox,
    requests_rx:       Receiver<ControlRequest>,
    nudge_timeout:     Duration,
    policy:            DisconnectPolicy,
    reconnect_timeout: Duration,
    end_requested:     bool,
    nudges:            u64,
    finished:          bool,
}

impl SyncController {
    /// Bind the control server described by `config`.
    pub fn bind(config: &SyncConfig) -> SyncResult<Self> {
        let gate = Arc::new(SyncGate::new(true));
        let (requests_tx, requests_rx) = unbounded();
        let server = ControlServer::bind(&config.listen_addr, Arc::clone(&gate), requests_tx)?;
        let outbox = server.outbox();
        Ok(Self {
            gate,
            server,
            outbox,
            requests_rx,
            nudge_timeout: Duration::from_millis(config.nudge_timeout_ms),
            policy: config.on_disconnect,
            reconnect_timeout: Duration::from_millis(config.reconnect_timeout_ms),
            end_requested: false,
            nudges: 0,
            finished: false,
        })
    }

    pub fn local_addr(&self) -> std::net::SocketAddr {
        self.server.local_addr()
    }

    pub fn gate(&self) -> &Arc<SyncGate> {
        &self.gate
    }

    pub fn outbox(&self) -> Outbox {
        self.outbox.clone()
    }

    /// Liveness nudges sent so far.
    pub fn nudges(&self) -> u64 {
        self.nudges
    }

    pub fn end_requested(&self) -> bool {
        self.end_requested
    }

    /// Setup is complete: greet the controller with `ANS_ready`.
    pub fn announce_ready(&self) {
        self.outbox.announce_ready();
        info!(addr = %self.local_addr(), "control plane ready");
    }

    /// Serve every queued control request without blocking.
    pub fn serve_pending(&mut self, handler: &mut dyn ControlHandler) -> usize {
        let mut served = 0;
        while let Ok(request) = self.requests_rx.try_recv() {
            self.dispatch(request, handler);
            served += 1;
        }
        served
    }

    fn dispatch(&mut self, request: ControlRequest, handler: &mut dyn ControlHandler) {
        match &request.inbound {
            Inbound::Ctrl { op, .. } if op == "end" => {
                info!(session = request.session.0, "controller requested end");
                self.end_requested = true;
            }
            Inbound::Ctrl { op, body } => {
                let outcome = handler.control(op, body);
                if let Err(err) = &outcome {
                    warn!(op = %op, error = %err, "control command failed");
                }
                request.respond(&protocol::ctrl_reply(op, &outcome));
            }
            Inbound::Query { what, body } => {
                let outcome = handler.query(what, body);
                request.respond(&protocol::query_reply(what, &outcome));
            }
            Inbound::Step { .. } => {}
        }
    }

    /// Block at the boundary before `tick` until the controller grants a step.
    ///
    /// Control requests are served while waiting.  After `nudge_timeout` with
    /// no command the current tick is re-announced; any command restarts that
    /// timer.  Without a session the wait continues indefinitely under
    /// [`DisconnectPolicy::Wait`], or fails after `reconnect_timeout` under
    /// [`DisconnectPolicy::Fail`].
    pub fn await_tick(&mut self, tick: Tick, handler: &mut dyn ControlHandler) -> SyncResult<AwaitOutcome> {
        self.gate.set_current_tick(tick);
        let gate = Arc::clone(&self.gate);
        let wake_rx = gate.wake_rx().clone();
        let requests_rx = self.requests_rx.clone();

        let mut deadline = Instant::now() + self.nudge_timeout;
        let mut lost_since: Option<Instant> = None;
        loop {
            self.serve_pending(handler);
            if self.end_requested {
                return Ok(AwaitOutcome::EndRequested);
            }
            if gate.consume() {
                return Ok(AwaitOutcome::Advance);
            }

            let now = Instant::now();
            let mut wait = deadline.saturating_duration_since(now);
            if gate.state() == GateState::AwaitingController {
                let since = *lost_since.get_or_insert_with(|| {
                    info!(tick = %tick, "waiting for controller");
                    now
                });
                if self.policy == DisconnectPolicy::Fail {
                    let waited = now.duration_since(since);
                    if waited >= self.reconnect_timeout {
                        return Err(SyncError::ControllerLost { waited_ms: waited.as_millis() as u64 });
                    }
                    wait = wait.min(self.reconnect_timeout - waited);
                }
            } else {
                lost_since = None;
            }

            select! {
                recv(wake_rx) -> _ => deadline = Instant::now() + self.nudge_timeout,
                recv(requests_rx) -> request => {
                    if let Ok(request) = request {
                        self.dispatch(request, handler);
                    }
                    deadline = Instant::now() + self.nudge_timeout;
                }
                default(wait) => {
                    if Instant::now() >= deadline {
                        if self.outbox.send(&protocol::nudge(tick)) {
                            self.nudges += 1;
                        }
                        deadline = Instant::now() + self.nudge_timeout;
                    }
                }
            }
        }
    }

    /// Send `CTRL_end` (`CODE:"KO"` when `ok` is false) and stop the server.
    pub fn finish(&mut self, ok: bool) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.outbox.send(&protocol::end(ok));
        self.server.shutdown();
        info!(ok, nudges = self.nudges, "control plane closed");
    }
}
