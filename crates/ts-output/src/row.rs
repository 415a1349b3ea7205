//! Plain data row types written by output backends.

use ts_collect::TickSnapshot;
use ts_core::FactKind;

/// One keyed fact of one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct FactRow {
    pub tick:    u64,
    pub kind:    &'static str,
    pub id:      u64,
    /// The fact's data, JSON encoded.
    pub payload: String,
}

impl FactRow {
    /// Keyed facts in `(kind, id)` order, then events (id = arrival order).
    pub fn from_snapshot(snapshot: &TickSnapshot) -> Vec<FactRow> {
        let tick = snapshot.tick().0;
        let keyed = snapshot.records().map(|(kind, id, data)| FactRow {
            tick,
            kind: kind.as_str(),
            id,
            payload: data.to_string(),
        });
        let events = snapshot.events().iter().enumerate().map(|(i, data)| FactRow {
            tick,
            kind: FactKind::Event.as_str(),
            id: i as u64,
            payload: data.to_string(),
        });
        keyed.chain(events).collect()
    }
}

/// Aggregated counts for one simulation tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickSummaryRow {
    pub tick:              u64,
    pub unix_time_secs:    i64,
    pub vehicles:          u64,
    pub electric_vehicles: u64,
    pub buses:             u64,
    pub links:             u64,
    pub events:            u64,
}

impl TickSummaryRow {
    pub fn from_snapshot(snapshot: &TickSnapshot, unix_time_secs: i64) -> Self {
        let count = |kind| snapshot.count(kind) as u64;
        Self {
            tick:              snapshot.tick().0,
            unix_time_secs,
            vehicles:          count(FactKind::Vehicle),
            electric_vehicles: count(FactKind::ElectricVehicle),
            buses:             count(FactKind::Bus),
            links:             count(FactKind::Link),
            events:            count(FactKind::Event),
        }
    }
}
