//! Wire format: one JSON object per WebSocket text frame.
//!
//! Inbound types are matched by prefix: `STEP*`, `CTRL_<op>`, `QUERY_<what>`.
//! `TICK` and `NUM` are accepted as JSON integers or decimal strings.

use serde_json::{json, Map, Value};

use ts_core::Tick;

use crate::{ProtocolError, ProtocolResult};

pub const CODE_OK: &str = "OK";
pub const CODE_KO: &str = "KO";

/// A parsed controller message.
#[derive(Clone, Debug, PartialEq)]
pub enum Inbound {
    /// Advance `num` ticks, valid only when `tick` is the current tick.
    Step { tick: Tick, num: u64 },
    /// Operational command; `body` is the whole message.
    Ctrl { op: String, body: Value },
    /// Point-in-time state query; `body` is the whole message.
    Query { what: String, body: Value },
}

impl Inbound {
    pub fn parse(text: &str) -> ProtocolResult<Self> {
        let value: Value = serde_json::from_str(text)?;
        let obj = value.as_object().ok_or(ProtocolError::NotAnObject)?;
        let ty = obj
            .get("TYPE")
            .and_then(Value::as_str)
            .ok_or(ProtocolError::MissingField("TYPE"))?;

        if ty.starts_with("STEP") {
            let tick = Tick(int_field(obj, "TICK")?);
            let num = int_field(obj, "NUM")?;
            return Ok(Inbound::Step { tick, num });
        }
        if let Some(op) = ty.strip_prefix("CTRL_") {
            let op = op.to_owned();
            return Ok(Inbound::Ctrl { op, body: value });
        }
        if let Some(what) = ty.strip_prefix("QUERY_") {
            let what = what.to_owned();
            return Ok(Inbound::Query { what, body: value });
        }
        Err(ProtocolError::UnknownType(ty.to_owned()))
    }
}

fn int_field(obj: &Map<String, Value>, field: &'static str) -> ProtocolResult<u64> {
    match obj.get(field) {
        None | Some(Value::Null) => Err(ProtocolError::MissingField(field)),
        Some(Value::Number(n)) => n.as_u64().ok_or_else(|| ProtocolError::BadField {
            field,
            reason: format!("must be a non-negative integer, got {n}"),
        }),
        Some(Value::String(s)) => s.trim().parse().map_err(|_| ProtocolError::BadField {
            field,
            reason: format!("must be a non-negative integer, got {s:?}"),
        }),
        Some(other) => Err(ProtocolError::BadField {
            field,
            reason: format!("must be a non-negative integer, got {other}"),
        }),
    }
}

// ── Outbound ──────────────────────────────────────────────────────────────────

fn code(ok: bool) -> &'static str {
    if ok { CODE_OK } else { CODE_KO }
}

/// Sent once per session after setup completes.
pub fn ready() -> Value {
    json!({ "TYPE": "ANS_ready" })
}

/// Liveness nudge re-announcing the tick the scheduler is blocked on.
pub fn nudge(tick: Tick) -> Value {
    json!({ "MSG_TYPE": "STEP", "TICK": tick.0 })
}

/// Reply to a `STEP_x` command: the bare string `"OK"` or `"KO"`.
pub fn step_reply(accepted: bool) -> Value {
    Value::from(code(accepted))
}

pub fn ctrl_reply(op: &str, outcome: &Result<Option<Value>, String>) -> Value {
    let mut msg = json!({ "TYPE": format!("CTRL_{op}"), "CODE": code(outcome.is_ok()) });
    match outcome {
        Ok(Some(data)) => msg["DATA"] = data.clone(),
        Ok(None) => {}
        Err(err) => msg["ERR"] = Value::from(err.as_str()),
    }
    msg
}

pub fn query_reply(what: &str, outcome: &Result<Value, String>) -> Value {
    let mut msg = json!({ "TYPE": format!("ANS_{what}"), "CODE": code(outcome.is_ok()) });
    match outcome {
        Ok(data) => msg["DATA"] = data.clone(),
        Err(err) => msg["ERR"] = Value::from(err.as_str()),
    }
    msg
}

/// Sent at termination; `ok = false` after a fatal error.
pub fn end(ok: bool) -> Value {
    json!({ "TYPE": "CTRL_end", "CODE": code(ok) })
}

/// Sent to a second connection before it is closed.
pub fn rejected(reason: &str) -> Value {
    json!({ "TYPE": "ANS_rejected", "CODE": CODE_KO, "ERR": reason })
}

/// `{TYPE:"TICK_MSG", TICK, <kind>: {...}, event: [...]}` from a snapshot's JSON view.
pub fn tick_msg(snapshot_json: Value) -> Value {
    let mut msg = match snapshot_json {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("data".to_owned(), other);
            map
        }
    };
    if let Some(tick) = msg.remove("tick") {
        msg.insert("TICK".to_owned(), tick);
    }
    msg.insert("TYPE".to_owned(), Value::from("TICK_MSG"));
    Value::Object(msg)
}

/// Serialise one message as the payload of a text frame.
pub fn encode(msg: &Value) -> String {
    msg.to_string()
}
