//! A synthetic arterial corridor: roads in a line, origin zones feeding
//! them, a few chargers and signals.
//!
//! Roads are partition-stepped, so everything the simulation thread needs to
//! touch between passes (arrivals, closures) goes through a shared
//! [`RoadGauge`] of atomics.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde_json::{Value, json};
use tracing::debug;

use ts_core::{AgentKind, FactKind, FactSink, StepContext, StepFailure, Steppable, Tick};
use ts_sim::World;

/// Roads per junction; every junction road is stepped sequentially.
pub const BLOCK: usize = 8;

const FREE_SPEED_KMH: f64 = 60.0;
const SPILLBACK: u32 = 30;

// ── Shared road state ─────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct RoadGauge {
    arrivals: AtomicU32,
    vehicles: AtomicU32,
    closed:   AtomicBool,
}

impl RoadGauge {
    pub fn vehicles(&self) -> u32 {
        self.vehicles.load(Ordering::Relaxed)
    }
}

// ── Agents ────────────────────────────────────────────────────────────────────

struct Road {
    id:       u64,
    capacity: u32,
    gauge:    Arc<RoadGauge>,
    /// Junction roads discharge at half rate on red.
    signal:   Option<Arc<AtomicBool>>,
}

impl Steppable for Road {
    fn step(&mut self, _ctx: &StepContext, facts: &mut FactSink) -> Result<(), StepFailure> {
        let arrived = self.gauge.arrivals.swap(0, Ordering::Relaxed);
        let on_road = self.gauge.vehicles.load(Ordering::Relaxed) + arrived;
        let green = self.signal.as_ref().is_none_or(|g| g.load(Ordering::Relaxed));
        let rate = if green { self.capacity / 4 } else { self.capacity / 8 };
        let discharge = if self.gauge.closed.load(Ordering::Relaxed) { 0 } else { on_road.min(rate) };
        let remaining = on_road - discharge;
        self.gauge.vehicles.store(remaining, Ordering::Relaxed);

        // BPR-style slowdown.
        let ratio = f64::from(remaining) / f64::from(self.capacity.max(1));
        let speed = FREE_SPEED_KMH / (1.0 + 0.15 * ratio.powi(4));
        facts.record(
            FactKind::Link,
            self.id,
            json!({ "vehicles": remaining, "discharged": discharge, "speed_kmh": speed }),
        );
        Ok(())
    }
}

struct Charger {
    id:        u64,
    plugs:     u32,
    occupied:  u32,
    delivered: f64,
}

impl Steppable for Charger {
    fn step(&mut self, ctx: &StepContext, facts: &mut FactSink) -> Result<(), StepFailure> {
        // Plugs turn over slowly with a daily swell.
        self.occupied = ((ctx.tick.0 / 60 + self.id) % u64::from(self.plugs + 1)) as u32;
        self.delivered += f64::from(self.occupied) * 0.05;
        if self.occupied > 0 {
            facts.record(
                FactKind::ElectricVehicle,
                self.id,
                json!({ "station": self.id, "charging": self.occupied, "kwh": self.delivered }),
            );
        }
        Ok(())
    }
}

struct Signal {
    cycle: u64,
    green: Arc<AtomicBool>,
}

impl Steppable for Signal {
    fn step(&mut self, ctx: &StepContext, _facts: &mut FactSink) -> Result<(), StepFailure> {
        self.green.store((ctx.tick.0 % self.cycle) < self.cycle / 2, Ordering::Relaxed);
        Ok(())
    }
}

/// Watches its origin road for queues spilling back into the zone.
struct Zone {
    id:      u64,
    origin:  Arc<RoadGauge>,
    spilled: bool,
}

impl Steppable for Zone {
    fn step(&mut self, _ctx: &StepContext, facts: &mut FactSink) -> Result<(), StepFailure> {
        let queued = self.origin.vehicles();
        let spilling = queued > SPILLBACK;
        if spilling != self.spilled {
            self.spilled = spilling;
            let kind = if spilling { "spillback" } else { "spillback_cleared" };
            facts.event(json!({ "type": kind, "zone": self.id, "queued": queued }));
        }
        Ok(())
    }
}

// ── World ─────────────────────────────────────────────────────────────────────

/// A scheduled road closure.
#[derive(Clone, Copy, Debug)]
pub struct Incident {
    pub road:  usize,
    pub from:  Tick,
    pub until: Tick,
}

pub struct Corridor {
    roads:     Vec<Box<dyn Steppable>>,
    zones:     Vec<Box<dyn Steppable>>,
    chargers:  Vec<Box<dyn Steppable>>,
    signals:   Vec<Box<dyn Steppable>>,
    gauges:    Vec<Arc<RoadGauge>>,
    incidents: Vec<Incident>,
    rng:       SmallRng,
    /// Mean trips released per origin road per tick.
    demand:    f64,
    released:  u64,
}

impl Corridor {
    pub fn new(roads: usize, seed: u64) -> Self {
        let gauges: Vec<Arc<RoadGauge>> = (0..roads).map(|_| Arc::default()).collect();
        let junctions = roads.div_ceil(BLOCK);
        let lights: Vec<Arc<AtomicBool>> = (0..junctions).map(|_| Arc::new(AtomicBool::new(true))).collect();

        let road_agents = gauges
            .iter()
            .enumerate()
            .map(|(i, gauge)| {
                let signal = (i % BLOCK == BLOCK - 1).then(|| Arc::clone(&lights[i / BLOCK]));
                Box::new(Road { id: i as u64, capacity: 40, gauge: Arc::clone(gauge), signal }) as Box<dyn Steppable>
            })
            .collect();
        let zones = gauges
            .iter()
            .step_by(BLOCK)
            .enumerate()
            .map(|(id, origin)| {
                Box::new(Zone { id: id as u64, origin: Arc::clone(origin), spilled: false }) as Box<dyn Steppable>
            })
            .collect();
        let signals = lights
            .into_iter()
            .map(|green| Box::new(Signal { cycle: 90, green }) as Box<dyn Steppable>)
            .collect();

        Self {
            roads:     road_agents,
            zones,
            chargers:  (0..junctions as u64)
                .map(|id| Box::new(Charger { id, plugs: 4, occupied: 0, delivered: 0.0 }) as Box<dyn Steppable>)
                .collect(),
            signals,
            gauges,
            incidents: Vec::new(),
            rng:       SmallRng::seed_from_u64(seed),
            demand:    2.0,
            released:  0,
        }
    }

    pub fn with_incident(mut self, incident: Incident) -> Self {
        self.incidents.push(incident);
        self
    }

    pub fn vehicles(&self) -> u64 {
        self.gauges.iter().map(|g| u64::from(g.vehicles())).sum()
    }

    pub fn released(&self) -> u64 {
        self.released
    }
}

impl World for Corridor {
    fn agents_mut(&mut self, kind: AgentKind) -> &mut [Box<dyn Steppable>] {
        match kind {
            AgentKind::Road            => &mut self.roads,
            AgentKind::Zone            => &mut self.zones,
            AgentKind::ChargingStation => &mut self.chargers,
            AgentKind::Signal          => &mut self.signals,
        }
    }

    fn count(&self, kind: AgentKind) -> usize {
        match kind {
            AgentKind::Road            => self.roads.len(),
            AgentKind::Zone            => self.zones.len(),
            AgentKind::ChargingStation => self.chargers.len(),
            AgentKind::Signal          => self.signals.len(),
        }
    }

    /// The last road of every block joins two blocks.
    fn boundary_hints(&self, kind: AgentKind) -> Vec<usize> {
        match kind {
            AgentKind::Road => (BLOCK - 1..self.roads.len()).step_by(BLOCK).collect(),
            _ => Vec::new(),
        }
    }

    fn load(&self) -> usize {
        self.vehicles() as usize
    }

    fn handle_events(&mut self, tick: Tick, facts: &mut FactSink) -> Result<(), StepFailure> {
        for incident in &self.incidents {
            let Some(gauge) = self.gauges.get(incident.road) else {
                return Err(StepFailure::new(format!("incident on unknown road {}", incident.road)));
            };
            if tick == incident.from {
                gauge.closed.store(true, Ordering::Relaxed);
                facts.event(json!({ "type": "closure", "road": incident.road }));
            } else if tick == incident.until {
                gauge.closed.store(false, Ordering::Relaxed);
                facts.event(json!({ "type": "reopen", "road": incident.road }));
            }
        }
        Ok(())
    }

    fn load_demand(&mut self, _tick: Tick, _facts: &mut FactSink) -> Result<(), StepFailure> {
        if self.demand <= 0.0 {
            return Ok(());
        }
        // Origins sit at the first road of each block.
        for gauge in self.gauges.iter().step_by(BLOCK) {
            let trips = self.rng.gen_range(0.0..2.0 * self.demand).round() as u32;
            gauge.arrivals.fetch_add(trips, Ordering::Relaxed);
            self.released += u64::from(trips);
        }
        Ok(())
    }

    fn refresh_speeds(&mut self, tick: Tick) -> Result<(), StepFailure> {
        let closed = self.gauges.iter().filter(|g| g.closed.load(Ordering::Relaxed)).count();
        debug!(%tick, closed, "speeds refreshed");
        Ok(())
    }

    fn metrics(&self, _tick: Tick) -> Option<Value> {
        Some(json!({ "vehicles": self.vehicles(), "released": self.released }))
    }

    fn control(&mut self, op: &str, body: &Value) -> Result<Option<Value>, String> {
        match op {
            "demand" => {
                let rate = body["VALUE"].as_f64().filter(|v| *v >= 0.0).ok_or("VALUE must be a non-negative number")?;
                self.demand = rate;
                Ok(Some(json!({ "demand": rate })))
            }
            "close" | "open" => {
                let road = body["ROAD"].as_u64().ok_or("ROAD must be a road index")? as usize;
                let gauge = self.gauges.get(road).ok_or_else(|| format!("no road {road}"))?;
                gauge.closed.store(op == "close", Ordering::Relaxed);
                Ok(None)
            }
            other => Err(format!("unsupported operation `{other}`")),
        }
    }

    fn query(&mut self, what: &str, _body: &Value) -> Result<Value, String> {
        match what {
            "network" => Ok(json!({
                "vehicles": self.vehicles(),
                "closed": self
                    .gauges
                    .iter()
                    .enumerate()
                    .filter(|(_, g)| g.closed.load(Ordering::Relaxed))
                    .map(|(i, _)| i)
                    .collect::<Vec<_>>(),
            })),
            other => Err(format!("unsupported query `{other}`")),
        }
    }
}
