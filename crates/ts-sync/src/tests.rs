//! Tests for ts-sync.

use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver};
use serde_json::{json, Value};
use tungstenite::{Message, WebSocket};

use ts_core::{DisconnectPolicy, SessionId, SyncConfig, Tick};

use crate::*;

// ── Harness ───────────────────────────────────────────────────────────────────

fn config(nudge_ms: u64) -> SyncConfig {
    SyncConfig {
        enabled: true,
        listen_addr: "127.0.0.1:0".to_owned(),
        nudge_timeout_ms: nudge_ms,
        ..SyncConfig::default()
    }
}

/// Answers `CTRL_speed` and `QUERY_state`; rejects everything else.
struct Echo;

impl ControlHandler for Echo {
    fn control(&mut self, op: &str, body: &Value) -> ControlReply {
        match op {
            "speed" => Ok(Some(json!({ "applied": body["VALUE"] }))),
            "noop" => Ok(None),
            other => Err(format!("unknown operation `{other}`")),
        }
    }

    fn query(&mut self, what: &str, _body: &Value) -> Result<Value, String> {
        match what {
            "state" => Ok(json!({ "vehicles": 12 })),
            other => Err(format!("unknown query `{other}`")),
        }
    }
}

/// A miniature tick loop driven only by the gate.
struct Loop {
    addr:     SocketAddr,
    gate:     Arc<SyncGate>,
    advanced: Receiver<Tick>,
    handle:   JoinHandle<SyncResult<u64>>,
}

fn spawn_loop(config: SyncConfig) -> Loop {
    let mut ctrl = SyncController::bind(&config).unwrap();
    let addr = ctrl.local_addr();
    let gate = Arc::clone(ctrl.gate());
    let (tx, advanced) = unbounded();
    let handle = thread::spawn(move || {
        let mut handler = Echo;
        ctrl.announce_ready();
        let mut tick = Tick(0);
        loop {
            match ctrl.await_tick(tick, &mut handler) {
                Ok(AwaitOutcome::Advance) => {
                    let _ = tx.send(tick);
                    tick = tick.next();
                }
                Ok(AwaitOutcome::EndRequested) => break,
                Err(e) => {
                    ctrl.finish(false);
                    return Err(e);
                }
            }
        }
        ctrl.finish(true);
        Ok(ctrl.nudges())
    });
    Loop { addr, gate, advanced, handle }
}

struct Client {
    ws: WebSocket<TcpStream>,
}

impl Client {
    fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        let (ws, _) = tungstenite::client::client(format!("ws://{addr}/"), stream).unwrap();
        Self { ws }
    }

    fn send(&mut self, msg: Value) {
        self.send_raw(&msg.to_string());
    }

    fn send_raw(&mut self, text: &str) {
        self.ws.send(Message::text(text)).unwrap();
    }

    fn recv(&mut self) -> Value {
        loop {
            match self.ws.read().unwrap() {
                Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
                Message::Close(_) => panic!("connection closed"),
                _ => {}
            }
        }
    }

    /// Next message that is not a liveness nudge.
    fn recv_reply(&mut self) -> Value {
        loop {
            let msg = self.recv();
            if msg.get("MSG_TYPE").is_none() {
                return msg;
            }
        }
    }

    /// `None` if nothing arrives within `wait`, or the server closed.
    fn try_recv(&mut self, wait: Duration) -> Option<Value> {
        self.ws.get_ref().set_read_timeout(Some(wait)).unwrap();
        let got = loop {
            match self.ws.read() {
                Ok(Message::Text(text)) => break Some(serde_json::from_str(text.as_str()).unwrap()),
                Ok(Message::Close(_)) | Err(_) => break None,
                Ok(_) => {}
            }
        };
        let _ = self.ws.get_ref().set_read_timeout(Some(Duration::from_secs(5)));
        got
    }

    fn step(&mut self, tick: u64, num: u64) -> Value {
        self.send(json!({ "TYPE": "STEP_x", "TICK": tick, "NUM": num }));
        self.recv_reply()
    }

    fn end(mut self, lp: Loop) -> SyncResult<u64> {
        self.send(json!({ "TYPE": "CTRL_end" }));
        assert_eq!(self.recv_reply(), json!({ "TYPE": "CTRL_end", "CODE": "OK" }));
        lp.handle.join().unwrap()
    }
}

fn wait_for<F: Fn() -> bool>(cond: F) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "condition not reached");
        thread::sleep(Duration::from_millis(5));
    }
}

// ── Protocol ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod protocol_tests {
    use super::*;
    use crate::protocol;

    #[test]
    fn parse_step() {
        let msg = Inbound::parse(r#"{"TYPE":"STEP_x","TICK":12,"NUM":3}"#).unwrap();
        assert_eq!(msg, Inbound::Step { tick: Tick(12), num: 3 });
    }

    #[test]
    fn parse_step_with_string_numbers() {
        let msg = Inbound::parse(r#"{"TYPE":"STEP","TICK":"4","NUM":"1"}"#).unwrap();
        assert_eq!(msg, Inbound::Step { tick: Tick(4), num: 1 });
    }

    #[test]
    fn parse_ctrl_and_query_keep_body() {
        match Inbound::parse(r#"{"TYPE":"CTRL_accel","ID":3}"#).unwrap() {
            Inbound::Ctrl { op, body } => {
                assert_eq!(op, "accel");
                assert_eq!(body["ID"], json!(3));
            }
            other => panic!("unexpected {other:?}"),
        }
        match Inbound::parse(r#"{"TYPE":"QUERY_vehicles"}"#).unwrap() {
            Inbound::Query { what, .. } => assert_eq!(what, "vehicles"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn malformed_messages_are_errors() {
        assert!(matches!(Inbound::parse("nope"), Err(ProtocolError::Json(_))));
        assert!(matches!(Inbound::parse("[1,2]"), Err(ProtocolError::NotAnObject)));
        assert!(matches!(Inbound::parse(r#"{"TICK":1}"#), Err(ProtocolError::MissingField("TYPE"))));
        assert!(matches!(
            Inbound::parse(r#"{"TYPE":"STEP_x","TICK":1}"#),
            Err(ProtocolError::MissingField("NUM"))
        ));
        assert!(matches!(
            Inbound::parse(r#"{"TYPE":"STEP_x","TICK":-1,"NUM":1}"#),
            Err(ProtocolError::BadField { field: "TICK", .. })
        ));
        assert!(matches!(Inbound::parse(r#"{"TYPE":"HELLO"}"#), Err(ProtocolError::UnknownType(_))));
    }

    #[test]
    fn outbound_shapes() {
        assert_eq!(protocol::step_reply(true), json!("OK"));
        assert_eq!(protocol::nudge(Tick(7)), json!({ "MSG_TYPE": "STEP", "TICK": 7 }));
        assert_eq!(protocol::end(false), json!({ "TYPE": "CTRL_end", "CODE": "KO" }));
        assert_eq!(
            protocol::ctrl_reply("route", &Err("no such vehicle".to_owned())),
            json!({ "TYPE": "CTRL_route", "CODE": "KO", "ERR": "no such vehicle" })
        );
        assert_eq!(protocol::encode(&json!("OK")), "\"OK\"");
    }

    #[test]
    fn tick_msg_renames_tick() {
        let msg = protocol::tick_msg(json!({ "tick": 3, "link": { "1": 2 } }));
        assert_eq!(msg, json!({ "TYPE": "TICK_MSG", "TICK": 3, "link": { "1": 2 } }));
    }
}

// ── Gate ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod gate_tests {
    use super::*;

    #[test]
    fn disabled_gate_reports_disabled() {
        assert_eq!(SyncGate::new(false).state(), GateState::Disabled);
    }

    #[test]
    fn state_machine() {
        let gate = SyncGate::new(true);
        assert_eq!(gate.state(), GateState::AwaitingController);
        assert!(gate.attach(SessionId(1)));
        assert!(!gate.attach(SessionId(2)));
        assert_eq!(gate.state(), GateState::Armed);

        assert!(gate.try_step(Tick(0), 2));
        assert_eq!(gate.state(), GateState::Stepping);
        assert!(gate.consume());
        assert!(gate.consume());
        assert!(!gate.consume());
        assert_eq!(gate.state(), GateState::Armed);

        gate.detach(SessionId(2));
        assert_eq!(gate.session(), Some(SessionId(1)));
        gate.detach(SessionId(1));
        assert_eq!(gate.state(), GateState::AwaitingController);
    }

    #[test]
    fn stale_or_zero_step_leaves_counter() {
        let gate = SyncGate::new(true);
        gate.set_current_tick(Tick(5));
        assert!(!gate.try_step(Tick(4), 3));
        assert!(!gate.try_step(Tick(5), 0));
        assert_eq!(gate.counter(), 0);
        assert!(gate.try_step(Tick(5), 3));
        assert_eq!(gate.counter(), 3);
    }
}

// ── End-to-end over WebSocket ────────────────────────────────────────────────

#[cfg(test)]
mod session_tests {
    use super::*;

    #[test]
    fn ready_step_then_single_nudge() {
        let lp = spawn_loop(config(300));
        let mut client = Client::connect(lp.addr);
        assert_eq!(client.recv(), json!({ "TYPE": "ANS_ready" }));

        assert_eq!(client.step(0, 1), json!("OK"));
        assert_eq!(lp.advanced.recv_timeout(Duration::from_secs(5)), Ok(Tick(0)));
        let reached = Instant::now();

        let nudge = client.recv();
        assert!(reached.elapsed() >= Duration::from_millis(250), "nudge came early");
        assert_eq!(nudge, json!({ "MSG_TYPE": "STEP", "TICK": 1 }));
        assert!(client.try_recv(Duration::from_millis(150)).is_none(), "more than one nudge");
        assert!(lp.advanced.try_recv().is_err());

        let nudges = client.end(lp).unwrap();
        assert!(nudges >= 1);
    }

    #[test]
    fn second_session_is_rejected() {
        let lp = spawn_loop(config(5_000));
        let mut first = Client::connect(lp.addr);
        assert_eq!(first.recv()["TYPE"], json!("ANS_ready"));

        let mut second = Client::connect(lp.addr);
        let reply = second.recv();
        assert_eq!(reply["TYPE"], json!("ANS_rejected"));
        assert_eq!(reply["CODE"], json!("KO"));
        assert!(second.try_recv(Duration::from_millis(500)).is_none());

        assert_eq!(lp.gate.state(), GateState::Armed);
        assert_eq!(first.step(0, 2), json!("OK"));
        assert_eq!(lp.advanced.recv_timeout(Duration::from_secs(5)), Ok(Tick(0)));
        assert_eq!(lp.advanced.recv_timeout(Duration::from_secs(5)), Ok(Tick(1)));
        first.end(lp).unwrap();
    }

    #[test]
    fn stale_step_rejected_then_three_ticks() {
        let lp = spawn_loop(config(5_000));
        let mut client = Client::connect(lp.addr);
        client.recv();

        assert_eq!(client.step(5, 1), json!("KO"));
        assert_eq!(lp.gate.counter(), 0);
        assert!(lp.advanced.recv_timeout(Duration::from_millis(100)).is_err());

        assert_eq!(client.step(0, 3), json!("OK"));
        for t in 0..3 {
            assert_eq!(lp.advanced.recv_timeout(Duration::from_secs(5)), Ok(Tick(t)));
        }
        assert!(lp.advanced.recv_timeout(Duration::from_millis(150)).is_err());
        wait_for(|| lp.gate.current_tick() == Tick(3));
        assert_eq!(lp.gate.state(), GateState::Armed);

        // A duplicate of the old command is now stale.
        assert_eq!(client.step(0, 3), json!("KO"));
        assert_eq!(client.step(3, 1), json!("OK"));
        assert_eq!(lp.advanced.recv_timeout(Duration::from_secs(5)), Ok(Tick(3)));
        client.end(lp).unwrap();
    }

    #[test]
    fn control_and_query_are_served_while_armed() {
        let lp = spawn_loop(config(5_000));
        let mut client = Client::connect(lp.addr);
        client.recv();

        client.send(json!({ "TYPE": "CTRL_speed", "VALUE": 3 }));
        assert_eq!(
            client.recv_reply(),
            json!({ "TYPE": "CTRL_speed", "CODE": "OK", "DATA": { "applied": 3 } })
        );

        client.send(json!({ "TYPE": "CTRL_teleport" }));
        let reply = client.recv_reply();
        assert_eq!(reply["CODE"], json!("KO"));
        assert!(reply["ERR"].as_str().unwrap().contains("teleport"));

        client.send(json!({ "TYPE": "QUERY_state" }));
        assert_eq!(
            client.recv_reply(),
            json!({ "TYPE": "ANS_state", "CODE": "OK", "DATA": { "vehicles": 12 } })
        );
        assert!(lp.advanced.try_recv().is_err());
        client.end(lp).unwrap();
    }

    #[test]
    fn malformed_frames_are_dropped() {
        let lp = spawn_loop(config(5_000));
        let mut client = Client::connect(lp.addr);
        client.recv();

        client.send_raw("this is not json");
        client.send_raw(r#"{"TYPE":"GREETING"}"#);
        assert_eq!(client.step(0, 1), json!("OK"));
        assert_eq!(lp.advanced.recv_timeout(Duration::from_secs(5)), Ok(Tick(0)));
        client.end(lp).unwrap();
    }

    #[test]
    fn upgrade_handshake_follows_rfc_6455() {
        let lp = spawn_loop(config(5_000));
        let mut raw = TcpStream::connect(lp.addr).unwrap();
        raw.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        write!(
            raw,
            "GET / HTTP/1.1\r\nHost: {}\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\
             Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\nSec-WebSocket-Version: 13\r\n\r\n",
            lp.addr
        )
        .unwrap();

        let mut reader = BufReader::new(raw.try_clone().unwrap());
        let mut head = Vec::new();
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            if line.trim().is_empty() {
                break;
            }
            head.push(line.trim().to_owned());
        }
        assert!(head[0].starts_with("HTTP/1.1 101"), "status line: {}", head[0]);
        assert!(
            head.iter().any(|h| h.eq_ignore_ascii_case("sec-websocket-accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=")),
            "headers: {head:?}"
        );
        wait_for(|| lp.gate.state() == GateState::Armed);
        drop(reader);
        drop(raw);
        wait_for(|| lp.gate.state() == GateState::AwaitingController);

        let mut client = Client::connect(lp.addr);
        client.recv();
        client.end(lp).unwrap();
    }

    #[test]
    fn bare_json_lines_do_not_open_a_session() {
        let lp = spawn_loop(config(5_000));
        let mut raw = TcpStream::connect(lp.addr).unwrap();
        raw.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        raw.write_all(b"{\"TYPE\":\"STEP_x\",\"TICK\":0,\"NUM\":1}\n").unwrap();

        let mut rest = String::new();
        let _ = BufReader::new(&raw).read_line(&mut rest);
        assert!(!rest.contains("ANS_ready"));
        assert_eq!(lp.gate.state(), GateState::AwaitingController);
        assert!(lp.advanced.recv_timeout(Duration::from_millis(150)).is_err());

        let mut client = Client::connect(lp.addr);
        assert_eq!(client.recv(), json!({ "TYPE": "ANS_ready" }));
        client.end(lp).unwrap();
    }

    #[test]
    fn stalled_controller_does_not_block_senders() {
        let gate = Arc::new(SyncGate::new(true));
        let (tx, _rx) = unbounded();
        let server = ControlServer::bind("127.0.0.1:0", gate, tx).unwrap();
        // Connected, but never reads.
        let _stalled = Client::connect(server.local_addr());
        wait_for(|| server.outbox().has_session());

        let outbox = server.outbox();
        let payload = json!({ "TYPE": "TICK_MSG", "blob": "x".repeat(32 * 1024) });
        let started = Instant::now();
        let queued = (0..4_000).filter(|_| outbox.send(&payload)).count();

        assert!(started.elapsed() < Duration::from_secs(4), "send blocked for {:?}", started.elapsed());
        assert!(queued < 4_000, "every frame was accepted");
        assert!(queued >= server::OUTBOX_CAPACITY);
    }

    #[test]
    fn reconnect_resumes_under_wait_policy() {
        let lp = spawn_loop(config(5_000));
        let mut first = Client::connect(lp.addr);
        first.recv();
        assert_eq!(first.step(0, 1), json!("OK"));
        assert_eq!(lp.advanced.recv_timeout(Duration::from_secs(5)), Ok(Tick(0)));
        drop(first);
        wait_for(|| lp.gate.state() == GateState::AwaitingController);

        let mut second = Client::connect(lp.addr);
        assert_eq!(second.recv(), json!({ "TYPE": "ANS_ready" }));
        assert_eq!(second.step(1, 1), json!("OK"));
        assert_eq!(lp.advanced.recv_timeout(Duration::from_secs(5)), Ok(Tick(1)));
        second.end(lp).unwrap();
    }

    #[test]
    fn fail_policy_gives_up_without_controller() {
        let cfg = SyncConfig {
            on_disconnect: DisconnectPolicy::Fail,
            reconnect_timeout_ms: 150,
            ..config(5_000)
        };
        let lp = spawn_loop(cfg);
        match lp.handle.join().unwrap() {
            Err(SyncError::ControllerLost { waited_ms }) => assert!(waited_ms >= 150),
            other => panic!("expected ControllerLost, got {other:?}"),
        }
    }
}

#[cfg(test)]
mod streamer_tests {
    use super::*;
    use ts_collect::{ConsumerHandle, ConsumerOptions, DataCollector, SnapshotBuffer, StartAt};
    use ts_core::FactKind;

    #[test]
    fn sealed_ticks_are_streamed() {
        let gate = Arc::new(SyncGate::new(true));
        let (tx, _rx) = unbounded();
        let server = ControlServer::bind("127.0.0.1:0", gate, tx).unwrap();
        let mut viewer = Client::connect(server.local_addr());
        wait_for(|| server.outbox().has_session());

        let buffer = SnapshotBuffer::new();
        let opts = ConsumerOptions {
            start: StartAt::Tick(Tick(0)),
            poll: Duration::from_millis(2),
            ..Default::default()
        };
        let handle = ConsumerHandle::spawn(&buffer, TickStreamer::new(server.outbox()), opts).unwrap();

        let mut collector = DataCollector::new(Arc::clone(&buffer));
        collector.start().unwrap();
        collector.open(Tick(0)).unwrap();
        collector.record(FactKind::Link, 4, json!({ "flow": 9 })).unwrap();
        collector.stop().unwrap();
        assert_eq!(handle.join().unwrap().consumed, 1);

        assert_eq!(
            viewer.recv(),
            json!({ "TYPE": "TICK_MSG", "TICK": 0, "link": { "4": { "flow": 9 } } })
        );
    }

    #[test]
    fn streaming_without_session_drops_ticks() {
        let gate = Arc::new(SyncGate::new(true));
        let (tx, _rx) = unbounded();
        let server = ControlServer::bind("127.0.0.1:0", gate, tx).unwrap();
        let mut streamer = TickStreamer::new(server.outbox());
        let mut snap = ts_collect::TickSnapshot::new(Tick(2));
        let mut sink = ts_core::FactSink::new();
        sink.record(FactKind::Bus, 1, json!(1));
        snap.absorb(&mut sink);

        ts_collect::TickConsumer::consume(&mut streamer, &snap).unwrap();
        assert_eq!((streamer.sent(), streamer.dropped()), (0, 1));
    }
}
