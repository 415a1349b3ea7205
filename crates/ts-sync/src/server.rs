//! `ControlServer`: TCP acceptor and per-session WebSocket threads.
//!
//! Each connection is upgraded with a WebSocket handshake on its own thread.
//! Only one session may hold the gate.  A second connection receives an
//! `ANS_rejected` frame and is closed; the first session is untouched.
//!
//! Outbound messages never touch the socket from the caller's thread: they
//! are queued on the session's bounded outbox and written by the session
//! thread between reads.

use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use serde_json::Value;
use tracing::{debug, info, warn};
use tungstenite::{Message, WebSocket};

use ts_core::SessionId;

use crate::protocol::{self, Inbound};
use crate::{SyncError, SyncGate, SyncResult};

/// Messages queued for one session before further sends are dropped.
pub const OUTBOX_CAPACITY: usize = 1024;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);
/// Read timeout between outbox drains.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

// ── Shared link state ─────────────────────────────────────────────────────────

struct SessionLink {
    id:      SessionId,
    peer:    Option<SocketAddr>,
    tx:      Sender<Value>,
    greeted: bool,
}

impl SessionLink {
    fn queue(&self, msg: &Value) -> bool {
        match self.tx.try_send(msg.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(session = self.id.0, "controller is not reading; message dropped");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

#[derive(Default)]
struct Link {
    session: Option<SessionLink>,
    ready:   bool,
}

struct Shared {
    gate:         Arc<SyncGate>,
    link:         Mutex<Link>,
    next_session: AtomicU64,
    shutdown:     AtomicBool,
    sessions:     Mutex<Vec<JoinHandle<()>>>,
}

impl Shared {
    fn link(&self) -> MutexGuard<'_, Link> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn stopping(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}

/// Cloneable handle for sending frames to the attached controller.
///
/// Sends only enqueue; they never block on the controller's socket.
#[derive(Clone)]
pub struct Outbox {
    shared: Arc<Shared>,
}

impl Outbox {
    /// Send to whichever session is attached.  `false` if none is, or its
    /// outbox is full.
    pub fn send(&self, msg: &Value) -> bool {
        match self.shared.link().session.as_ref() {
            Some(session) => session.queue(msg),
            None => false,
        }
    }

    /// Send only if session `id` is still the attached one.
    pub fn send_to(&self, id: SessionId, msg: &Value) -> bool {
        match self.shared.link().session.as_ref() {
            Some(session) if session.id == id => session.queue(msg),
            _ => false,
        }
    }

    pub fn has_session(&self) -> bool {
        self.shared.link().session.is_some()
    }

    /// Mark setup complete and greet the attached session (once per session).
    /// Sessions attaching later are greeted on attach.
    pub fn announce_ready(&self) {
        let mut link = self.shared.link();
        link.ready = true;
        if let Some(session) = link.session.as_mut().filter(|s| !s.greeted) {
            session.greeted = session.queue(&protocol::ready());
        }
    }
}

// ── ControlRequest ────────────────────────────────────────────────────────────

/// A `CTRL_*` or `QUERY_*` message waiting for the simulation thread.
pub struct ControlRequest {
    pub session: SessionId,
    pub inbound: Inbound,
    outbox:      Outbox,
}

impl ControlRequest {
    /// Reply to the session that sent the request.  Dropped if it has gone.
    pub fn respond(&self, msg: &Value) -> bool {
        self.outbox.send_to(self.session, msg)
    }
}

// ── ControlServer ─────────────────────────────────────────────────────────────

pub struct ControlServer {
    addr:     SocketAddr,
    outbox:   Outbox,
    acceptor: Option<JoinHandle<()>>,
}

impl ControlServer {
    /// Bind `addr` and start accepting.  Control requests are forwarded on
    /// `requests`.
    pub fn bind(addr: &str, gate: Arc<SyncGate>, requests: Sender<ControlRequest>) -> SyncResult<Self> {
        let bind_addr = addr
            .to_socket_addrs()
            .map_err(|source| SyncError::Bind { addr: addr.to_owned(), source })?
            .next()
            .ok_or_else(|| SyncError::BadAddress(addr.to_owned()))?;
        let listener = TcpListener::bind(bind_addr)
            .map_err(|source| SyncError::Bind { addr: addr.to_owned(), source })?;
        let local = listener
            .local_addr()
            .map_err(|source| SyncError::Io { addr: bind_addr, source })?;

        let shared = Arc::new(Shared {
            gate,
            link: Mutex::new(Link::default()),
            next_session: AtomicU64::new(1),
            shutdown: AtomicBool::new(false),
            sessions: Mutex::new(Vec::new()),
        });
        let outbox = Outbox { shared: Arc::clone(&shared) };

        let acceptor = {
            let outbox = outbox.clone();
            thread::Builder::new()
                .name("ts-sync-accept".to_owned())
                .spawn(move || accept_loop(listener, outbox, requests))
                .map_err(SyncError::Spawn)?
        };

        info!(addr = %local, "control server listening on ws://{local}/");
        Ok(Self { addr: local, outbox, acceptor: Some(acceptor) })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn outbox(&self) -> Outbox {
        self.outbox.clone()
    }

    /// Stop accepting, flush and close the attached session, and join all
    /// threads.
    pub fn shutdown(&mut self) {
        let Some(acceptor) = self.acceptor.take() else { return };
        let shared = &self.outbox.shared;
        shared.shutdown.store(true, Ordering::Release);

        // Unblock `accept` with a throwaway connection.
        let mut wake = self.addr;
        if wake.ip().is_unspecified() {
            wake.set_ip(IpAddr::V4(Ipv4Addr::LOCALHOST));
        }
        let _ = TcpStream::connect(wake);
        let _ = acceptor.join();

        let sessions = std::mem::take(&mut *shared.sessions.lock().unwrap_or_else(PoisonError::into_inner));
        for session in sessions {
            let _ = session.join();
        }
        debug!(addr = %self.addr, "control server stopped");
    }
}

impl Drop for ControlServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ── Threads ───────────────────────────────────────────────────────────────────

fn accept_loop(listener: TcpListener, outbox: Outbox, requests: Sender<ControlRequest>) {
    for conn in listener.incoming() {
        if outbox.shared.stopping() {
            break;
        }
        let stream = match conn {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, "accept failed");
                continue;
            }
        };
        let id = SessionId(outbox.shared.next_session.fetch_add(1, Ordering::Relaxed));
        let spawned = {
            let outbox = outbox.clone();
            let requests = requests.clone();
            thread::Builder::new()
                .name(format!("ts-sync-session-{}", id.0))
                .spawn(move || run_session(id, stream, outbox, requests))
        };
        match spawned {
            Ok(handle) => outbox.shared.sessions.lock().unwrap_or_else(PoisonError::into_inner).push(handle),
            Err(e) => warn!(session = id.0, error = %e, "cannot start session thread"),
        }
    }
}

fn run_session(id: SessionId, stream: TcpStream, outbox: Outbox, requests: Sender<ControlRequest>) {
    let shared = Arc::clone(&outbox.shared);
    let peer = stream.peer_addr().ok();

    if let Err(e) = stream.set_read_timeout(Some(HANDSHAKE_TIMEOUT)) {
        warn!(peer = ?peer, error = %e, "cannot configure controller socket");
        return;
    }
    let mut ws = match tungstenite::accept(stream) {
        Ok(ws) => ws,
        Err(e) => {
            warn!(peer = ?peer, error = %e, "websocket handshake failed");
            return;
        }
    };

    if !shared.gate.attach(id) {
        let reply = protocol::rejected("a controller session is already active");
        let _ = ws.send(Message::text(protocol::encode(&reply)));
        let _ = ws.close(None);
        let _ = ws.flush();
        warn!(peer = ?peer, "second controller session rejected");
        return;
    }

    let configured = ws
        .get_ref()
        .set_read_timeout(Some(POLL_INTERVAL))
        .and_then(|()| ws.get_ref().set_write_timeout(Some(WRITE_TIMEOUT)));
    if let Err(e) = configured {
        warn!(session = id.0, error = %e, "cannot configure controller socket");
        shared.gate.detach(id);
        return;
    }

    let (tx, rx) = crossbeam_channel::bounded(OUTBOX_CAPACITY);
    {
        let mut link = shared.link();
        let mut session = SessionLink { id, peer, tx, greeted: false };
        if link.ready {
            session.greeted = session.queue(&protocol::ready());
        }
        link.session = Some(session);
    }
    info!(session = id.0, peer = ?peer, "controller session accepted");

    serve(id, &mut ws, &rx, &outbox, &requests);
    let _ = ws.close(None);
    let _ = ws.flush();
    close_session(&shared, id);
}

/// Alternate between flushing the outbox and polling for inbound frames
/// until the peer leaves, a write fails, or the server stops.
fn serve(
    id: SessionId,
    ws: &mut WebSocket<TcpStream>,
    outgoing: &Receiver<Value>,
    outbox: &Outbox,
    requests: &Sender<ControlRequest>,
) {
    loop {
        // Anything queued before the stop flag was raised is still flushed.
        let stopping = outbox.shared.stopping();
        if !flush_outgoing(id, ws, outgoing) || stopping {
            return;
        }
        match ws.read() {
            Ok(Message::Text(text)) => handle_text(id, text.as_str(), outbox, requests),
            Ok(Message::Binary(_)) => warn!(session = id.0, "binary frame dropped"),
            Ok(Message::Close(_)) => return,
            Ok(_) => {}
            Err(tungstenite::Error::Io(e)) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => return,
            Err(e) => {
                warn!(session = id.0, error = %e, "controller read failed");
                return;
            }
        }
    }
}

fn flush_outgoing(id: SessionId, ws: &mut WebSocket<TcpStream>, outgoing: &Receiver<Value>) -> bool {
    for msg in outgoing.try_iter() {
        if let Err(e) = ws.send(Message::text(protocol::encode(&msg))) {
            warn!(session = id.0, error = %e, "send to controller failed");
            return false;
        }
    }
    true
}

fn handle_text(id: SessionId, text: &str, outbox: &Outbox, requests: &Sender<ControlRequest>) {
    let text = text.trim();
    if text.is_empty() {
        return;
    }
    match Inbound::parse(text) {
        Ok(Inbound::Step { tick, num }) => {
            let accepted = outbox.shared.gate.try_step(tick, num);
            outbox.send_to(id, &protocol::step_reply(accepted));
        }
        Ok(inbound) => {
            let request = ControlRequest { session: id, inbound, outbox: outbox.clone() };
            if requests.send(request).is_err() {
                debug!(session = id.0, "control request dropped: simulation gone");
            }
        }
        Err(e) => warn!(session = id.0, error = %e, "malformed control message dropped"),
    }
}

fn close_session(shared: &Shared, id: SessionId) {
    let peer = {
        let mut link = shared.link();
        match link.session.as_ref() {
            Some(s) if s.id == id => link.session.take().and_then(|s| s.peer),
            _ => None,
        }
    };
    shared.gate.detach(id);
    info!(session = id.0, peer = ?peer, "controller session closed");
}
