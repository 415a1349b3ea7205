//! `TickSnapshot`: everything observed during one tick.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use ts_core::{Fact, FactKind, FactSink, Tick};

/// The record of one tick's observable output.
///
/// Keyed facts are stored once per `(kind, id)`; a later record for the same
/// key replaces the earlier one.  Events are kept in arrival order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickSnapshot {
    tick:   Tick,
    keyed:  BTreeMap<(FactKind, u64), Value>,
    events: Vec<Value>,
}

impl TickSnapshot {
    pub fn new(tick: Tick) -> Self {
        Self { tick, keyed: BTreeMap::new(), events: Vec::new() }
    }

    #[inline]
    pub fn tick(&self) -> Tick {
        self.tick
    }

    pub fn record(&mut self, fact: Fact) {
        if fact.kind.is_event() {
            self.events.push(fact.data);
        } else {
            self.keyed.insert((fact.kind, fact.id), fact.data);
        }
    }

    /// Move every fact out of `sink` into this snapshot.
    pub fn absorb(&mut self, sink: &mut FactSink) {
        for fact in sink.drain() {
            self.record(fact);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keyed.is_empty() && self.events.is_empty()
    }

    /// Total facts held (keyed records plus events).
    pub fn len(&self) -> usize {
        self.keyed.len() + self.events.len()
    }

    pub fn get(&self, kind: FactKind, id: u64) -> Option<&Value> {
        self.keyed.get(&(kind, id))
    }

    /// Ids recorded for one keyed category, ascending.
    pub fn ids(&self, kind: FactKind) -> impl Iterator<Item = u64> + '_ {
        self.keyed.keys().filter(move |(k, _)| *k == kind).map(|(_, id)| *id)
    }

    pub fn count(&self, kind: FactKind) -> usize {
        if kind.is_event() {
            self.events.len()
        } else {
            self.ids(kind).count()
        }
    }

    pub fn events(&self) -> &[Value] {
        &self.events
    }

    /// Keyed records in `(kind, id)` order.
    pub fn records(&self) -> impl Iterator<Item = (FactKind, u64, &Value)> + '_ {
        self.keyed.iter().map(|((k, id), v)| (*k, *id, v))
    }

    /// JSON view: `{"tick": n, "<kind>": {"<id>": data, ...}, "event": [...]}`.
    pub fn to_json(&self) -> Value {
        let mut root = Map::new();
        root.insert("tick".to_owned(), Value::from(self.tick.0));
        for ((kind, id), data) in &self.keyed {
            let group = root
                .entry(kind.as_str().to_owned())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(map) = group {
                map.insert(id.to_string(), data.clone());
            }
        }
        if !self.events.is_empty() {
            root.insert(FactKind::Event.as_str().to_owned(), Value::Array(self.events.clone()));
        }
        Value::Object(root)
    }
}
