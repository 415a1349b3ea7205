//! Observational facts produced while a tick executes.
//!
//! Agents never write into the open snapshot directly.  Each stepping task
//! receives its own [`FactSink`]; the simulation thread moves the sinks into
//! the open snapshot after the partition join, so the snapshot keeps a single
//! writer.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Category of a recorded fact.
///
/// Keyed categories hold at most one record per `(kind, id)` in a snapshot
/// (later records overwrite earlier ones).  [`FactKind::Event`] records are
/// appended in order instead.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactKind {
    Vehicle,
    ElectricVehicle,
    Bus,
    Link,
    Event,
}

impl FactKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FactKind::Vehicle         => "vehicle",
            FactKind::ElectricVehicle => "electric_vehicle",
            FactKind::Bus             => "bus",
            FactKind::Link            => "link",
            FactKind::Event           => "event",
        }
    }

    /// `true` for categories that are appended rather than keyed by id.
    #[inline]
    pub fn is_event(self) -> bool {
        matches!(self, FactKind::Event)
    }
}

impl fmt::Display for FactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observation.  The payload is opaque to the substrate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    pub kind: FactKind,
    pub id:   u64,
    pub data: Value,
}

/// An append-only list of facts owned by one writer.
///
/// Event facts carry a sequence number in `id`, counted per sink.  Appending
/// another sink renumbers its events after this sink's, so merged partition
/// sinks keep one gap-free sequence.
#[derive(Clone, Debug, Default)]
pub struct FactSink {
    facts:  Vec<Fact>,
    events: u64,
}

impl FactSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a keyed fact.
    pub fn record(&mut self, kind: FactKind, id: u64, data: Value) {
        self.facts.push(Fact { kind, id, data });
    }

    /// Record a network event (closures, incidents, ...).
    pub fn event(&mut self, data: Value) {
        let id = self.next_event_id();
        self.facts.push(Fact { kind: FactKind::Event, id, data });
    }

    /// Push a fact as is.  An event's `id` is replaced by the next sequence
    /// number.
    pub fn push(&mut self, mut fact: Fact) {
        if fact.kind.is_event() {
            fact.id = self.next_event_id();
        }
        self.facts.push(fact);
    }

    /// Move every fact of `other` to the end of `self`.
    pub fn append(&mut self, other: &mut FactSink) {
        for fact in other.facts.iter_mut().filter(|f| f.kind.is_event()) {
            fact.id += self.events;
        }
        self.events += std::mem::take(&mut other.events);
        self.facts.append(&mut other.facts);
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Number of event facts held.
    pub fn event_count(&self) -> u64 {
        self.events
    }

    pub fn iter(&self) -> impl Iterator<Item = &Fact> {
        self.facts.iter()
    }

    /// Remove and return all facts, leaving the sink empty and reusable.
    pub fn drain(&mut self) -> std::vec::Drain<'_, Fact> {
        self.events = 0;
        self.facts.drain(..)
    }

    pub fn into_facts(self) -> Vec<Fact> {
        self.facts
    }

    fn next_event_id(&mut self) -> u64 {
        let id = self.events;
        self.events += 1;
        id
    }
}
