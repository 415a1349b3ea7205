//! Tests for ts-collect.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;

use ts_core::{FactKind, FactSink, Tick};

use crate::*;

/// Seal `ticks` one after another; ticks listed in `empty` get no facts.
fn sealed(buffer: &Arc<SnapshotBuffer>, ticks: std::ops::Range<u64>, empty: &[u64]) -> DataCollector {
    let mut collector = DataCollector::new(Arc::clone(buffer));
    collector.start().unwrap();
    for t in ticks {
        collector.open(Tick(t)).unwrap();
        if !empty.contains(&t) {
            collector.record(FactKind::Link, 1, json!({ "tick": t })).unwrap();
        }
        collector.seal().unwrap();
    }
    collector
}

/// Consumer that remembers the ticks it saw.
struct Recorder {
    name:         String,
    seen:         Arc<Mutex<Vec<u64>>>,
    placeholders: bool,
    fail_at:      Option<u64>,
}

impl Recorder {
    fn new(name: &str) -> (Self, Arc<Mutex<Vec<u64>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let r = Self { name: name.to_owned(), seen: Arc::clone(&seen), placeholders: false, fail_at: None };
        (r, seen)
    }
}

impl TickConsumer for Recorder {
    fn name(&self) -> &str {
        &self.name
    }

    fn consume(&mut self, snapshot: &TickSnapshot) -> Result<(), SinkError> {
        if self.fail_at == Some(snapshot.tick().0) {
            return Err("disk full".into());
        }
        self.seen.lock().unwrap().push(snapshot.tick().0);
        Ok(())
    }

    fn wants_placeholders(&self) -> bool {
        self.placeholders
    }
}

fn fast() -> ConsumerOptions {
    ConsumerOptions { start: StartAt::Tick(Tick(0)), stride: 1, poll: Duration::from_millis(2) }
}

#[cfg(test)]
mod snapshot_tests {
    use super::*;

    #[test]
    fn later_record_replaces_earlier() {
        let mut snap = TickSnapshot::new(Tick(3));
        let mut sink = FactSink::new();
        sink.record(FactKind::Vehicle, 7, json!({ "speed": 10 }));
        sink.record(FactKind::Vehicle, 7, json!({ "speed": 12 }));
        sink.record(FactKind::Bus, 2, json!({ "load": 30 }));
        sink.event(json!({ "type": "accident" }));
        snap.absorb(&mut sink);

        assert!(sink.is_empty());
        assert_eq!(snap.len(), 3);
        assert_eq!(snap.get(FactKind::Vehicle, 7), Some(&json!({ "speed": 12 })));
        assert_eq!(snap.count(FactKind::Event), 1);
    }

    #[test]
    fn json_groups_by_kind() {
        let mut snap = TickSnapshot::new(Tick(5));
        let mut sink = FactSink::new();
        sink.record(FactKind::Link, 1, json!(4));
        sink.record(FactKind::Link, 2, json!(6));
        snap.absorb(&mut sink);

        let v = snap.to_json();
        assert_eq!(v["tick"], json!(5));
        assert_eq!(v["link"]["2"], json!(6));
        assert!(v.get("event").is_none());
    }
}

#[cfg(test)]
mod buffer_tests {
    use super::*;

    #[test]
    fn next_tick_ready_placeholder_not_ready() {
        let buffer = SnapshotBuffer::new();
        assert!(matches!(buffer.next_tick(Tick(0)), NextTick::NotReady));

        let mut collector = sealed(&buffer, 0..3, &[1, 2]);
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.last_sealed(), Some(Tick(2)));

        assert_eq!(buffer.next_tick(Tick(0)).tick(), Some(Tick(0)));
        match buffer.next_tick(Tick(1)) {
            NextTick::Placeholder(p) => {
                assert_eq!(p.tick(), Tick(1));
                assert!(p.is_empty());
            }
            other => panic!("expected placeholder, got {other:?}"),
        }
        assert!(matches!(buffer.next_tick(Tick(3)), NextTick::NotReady));

        // Once tick 3 is stored, the gap is skipped to the first stored tick.
        collector.open(Tick(3)).unwrap();
        collector.record(FactKind::Link, 1, json!(3)).unwrap();
        collector.seal().unwrap();
        match buffer.next_tick(Tick(1)) {
            NextTick::Ready(s) => assert_eq!(s.tick(), Tick(3)),
            other => panic!("expected ready, got {other:?}"),
        }
    }

    #[test]
    fn eviction_stops_at_slowest_cursor() {
        let buffer = SnapshotBuffer::new();
        let _c = sealed(&buffer, 0..10, &[]);
        let a = buffer.register_consumer(Some(Tick(5)));
        let b = buffer.register_consumer(Some(Tick(9)));

        assert_eq!(buffer.retention_floor(), Some(Tick(5)));
        let sweep = buffer.cleanup();
        assert_eq!(sweep, Sweep { floor: Some(Tick(5)), removed: 5, remaining: 5 });
        assert_eq!(buffer.first_available(), Some(Tick(5)));

        drop(a);
        assert_eq!(buffer.consumer_count(), 1);
        assert_eq!(buffer.cleanup().removed, 4);
        assert_eq!(b.position(), Some(Tick(9)));
    }

    #[test]
    fn unstarted_consumer_pins_everything() {
        let buffer = SnapshotBuffer::new();
        let _c = sealed(&buffer, 0..4, &[]);
        let cursor = buffer.register_consumer(None);
        assert_eq!(buffer.retention_floor(), None);
        assert_eq!(buffer.cleanup().removed, 0);
        assert!(matches!(cursor.peek(), NextTick::NotReady));

        cursor.advance_to(Tick(2));
        assert_eq!(buffer.cleanup().removed, 2);
    }

    #[test]
    fn no_consumers_keeps_previous_tick() {
        let buffer = SnapshotBuffer::new();
        let _c = sealed(&buffer, 0..10, &[]);
        buffer.set_current_tick(Tick(10));
        let sweep = buffer.cleanup();
        assert_eq!(sweep.floor, Some(Tick(9)));
        assert_eq!(sweep.remaining, 1);
        assert!(buffer.get(Tick(9)).is_some());
    }

    #[test]
    fn cursor_is_clamped_to_next_unsealed() {
        let buffer = SnapshotBuffer::new();
        let early = buffer.register_consumer(Some(Tick(50)));
        assert_eq!(early.position(), Some(Tick(0)));

        let _c = sealed(&buffer, 0..3, &[]);
        assert_eq!(early.advance_to(Tick(100)), Tick(3));
    }
}

#[cfg(test)]
mod collector_tests {
    use super::*;

    #[test]
    fn ticks_must_increase() {
        let buffer = SnapshotBuffer::new();
        let mut collector = sealed(&buffer, 0..2, &[]);
        assert!(matches!(collector.open(Tick(1)), Err(CollectError::TickOutOfOrder { .. })));
        collector.open(Tick(2)).unwrap();
        assert!(matches!(
            collector.open(Tick(3)),
            Err(CollectError::SnapshotAlreadyOpen { open: Tick(2), requested: Tick(3) })
        ));
    }

    #[test]
    fn record_without_open_tick_fails() {
        let mut collector = DataCollector::new(SnapshotBuffer::new());
        collector.start().unwrap();
        assert!(matches!(
            collector.record(FactKind::Bus, 1, json!(null)),
            Err(CollectError::NoOpenSnapshot)
        ));
        assert!(matches!(collector.seal(), Err(CollectError::NoOpenSnapshot)));
    }

    #[test]
    fn paused_collector_seals_empty_ticks() {
        let buffer = SnapshotBuffer::new();
        let mut collector = DataCollector::new(Arc::clone(&buffer));
        collector.start().unwrap();
        collector.pause();
        collector.open(Tick(0)).unwrap();
        let mut sink = FactSink::new();
        sink.record(FactKind::Vehicle, 1, json!(1));
        collector.absorb(&mut sink).unwrap();
        assert!(sink.is_empty());
        assert!(collector.seal().unwrap().is_none());
        assert_eq!(buffer.last_sealed(), Some(Tick(0)));

        collector.resume();
        collector.open(Tick(1)).unwrap();
        collector.record(FactKind::Vehicle, 1, json!(2)).unwrap();
        assert_eq!(collector.seal().unwrap().map(|s| s.tick()), Some(Tick(1)));
    }

    #[test]
    fn stop_seals_open_tick_and_closes_buffer() {
        let buffer = SnapshotBuffer::new();
        let mut collector = DataCollector::new(Arc::clone(&buffer));
        collector.start().unwrap();
        collector.open(Tick(0)).unwrap();
        collector.record(FactKind::Link, 4, json!(1)).unwrap();
        collector.stop().unwrap();

        assert!(buffer.is_closed());
        assert!(buffer.get(Tick(0)).is_some());
        assert_eq!(collector.state(), CollectionState::Stopped);
        assert!(matches!(collector.open(Tick(1)), Err(CollectError::Stopped)));
        assert!(matches!(collector.start(), Err(CollectError::Stopped)));
    }
}

#[cfg(test)]
mod janitor_tests {
    use super::*;

    #[test]
    fn janitor_evicts_in_background() {
        let buffer = SnapshotBuffer::new();
        let _c = sealed(&buffer, 0..20, &[]);
        buffer.set_current_tick(Tick(20));

        let janitor = Janitor::spawn(Arc::clone(&buffer), Duration::from_millis(5)).unwrap();
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while buffer.len() > 1 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(janitor.stop(), 19);
        assert_eq!(buffer.first_available(), Some(Tick(19)));
    }
}

#[cfg(test)]
mod consumer_tests {
    use super::*;

    #[test]
    fn consumer_drains_closed_buffer() {
        let buffer = SnapshotBuffer::new();
        let mut collector = sealed(&buffer, 0..5, &[2]);
        let (rec, seen) = Recorder::new("rec");
        let handle = ConsumerHandle::spawn(&buffer, rec, fast()).unwrap();
        collector.stop().unwrap();

        let summary = handle.join().unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 3, 4]);
        assert_eq!(summary.consumed, 4);
        assert_eq!(summary.last_tick, Some(Tick(4)));
        assert_eq!(buffer.consumer_count(), 0);
    }

    #[test]
    fn consumer_follows_live_sealing() {
        let buffer = SnapshotBuffer::new();
        let (rec, seen) = Recorder::new("live");
        let handle = ConsumerHandle::spawn(&buffer, rec, fast()).unwrap();

        let mut collector = sealed(&buffer, 0..50, &[]);
        collector.stop().unwrap();
        handle.join().unwrap();
        assert_eq!(*seen.lock().unwrap(), (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn placeholders_reach_consumers_that_want_them() {
        let buffer = SnapshotBuffer::new();
        let mut collector = sealed(&buffer, 0..4, &[2, 3]);
        let (mut rec, seen) = Recorder::new("ph");
        rec.placeholders = true;
        let handle = ConsumerHandle::spawn(&buffer, rec, fast()).unwrap();
        collector.stop().unwrap();

        let summary = handle.join().unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3]);
        assert_eq!(summary.placeholders, 2);
    }

    #[test]
    fn stride_skips_ticks() {
        let buffer = SnapshotBuffer::new();
        let mut collector = sealed(&buffer, 0..10, &[]);
        let (rec, seen) = Recorder::new("stride");
        let opts = ConsumerOptions { stride: 3, ..fast() };
        let handle = ConsumerHandle::spawn(&buffer, rec, opts).unwrap();
        collector.stop().unwrap();
        handle.join().unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![0, 3, 6, 9]);
    }

    #[test]
    fn sink_failure_is_reported() {
        let buffer = SnapshotBuffer::new();
        let mut collector = sealed(&buffer, 0..5, &[]);
        let (mut rec, seen) = Recorder::new("broken");
        rec.fail_at = Some(2);
        let handle = ConsumerHandle::spawn(&buffer, rec, fast()).unwrap();
        collector.stop().unwrap();

        match handle.join() {
            Err(CollectError::Sink { consumer, .. }) => assert_eq!(consumer, "broken"),
            other => panic!("expected sink error, got {other:?}"),
        }
        assert_eq!(*seen.lock().unwrap(), vec![0, 1]);
    }

    #[test]
    fn paused_consumer_holds_until_resumed() {
        let buffer = SnapshotBuffer::new();
        let (rec, seen) = Recorder::new("paused");
        let handle = ConsumerHandle::spawn(&buffer, rec, fast()).unwrap();
        handle.pause();
        std::thread::sleep(Duration::from_millis(20));

        let mut collector = sealed(&buffer, 0..3, &[]);
        std::thread::sleep(Duration::from_millis(50));
        assert!(seen.lock().unwrap().is_empty());
        assert!(!handle.is_finished());

        // Control messages are still applied while paused.
        handle.reset(Tick(1));
        handle.resume();
        collector.stop().unwrap();
        let summary = handle.join().unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
        assert_eq!(summary.consumed, 2);
    }

    #[test]
    fn stop_exits_open_buffer() {
        let buffer = SnapshotBuffer::new();
        let _c = sealed(&buffer, 0..3, &[]);
        let (rec, _seen) = Recorder::new("stopper");
        let handle = ConsumerHandle::spawn(&buffer, rec, fast()).unwrap();
        handle.pause();
        handle.stop();
        handle.join().unwrap();
        assert!(!buffer.is_closed());
        assert_eq!(buffer.consumer_count(), 0);
    }
}
