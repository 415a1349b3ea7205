//! The `World` trait: the physical model the scheduler drives.

use serde_json::Value;

use ts_core::{AgentKind, FactSink, StepFailure, Steppable, Tick};
use ts_sync::ControlReply;

/// The external traffic model: vehicles, roads, zones, energy.
///
/// Every method is called on the simulation thread.  Only the populations
/// returned by [`agents_mut`](Self::agents_mut) are stepped in parallel, and
/// only within the partition they are assigned to.
pub trait World {
    /// The steppable population of one kind, in stable index order.
    fn agents_mut(&mut self, kind: AgentKind) -> &mut [Box<dyn Steppable>];

    /// Population size of one kind.
    fn count(&self, kind: AgentKind) -> usize;

    /// Indices the partition provider should keep out of partitions.
    fn boundary_hints(&self, _kind: AgentKind) -> Vec<usize> {
        Vec::new()
    }

    /// Network load indicator (vehicles on roads), read by the re-partition
    /// cadence.
    fn load(&self) -> usize {
        0
    }

    /// Apply scheduled incidents and closures due at `tick`.
    fn handle_events(&mut self, _tick: Tick, _facts: &mut FactSink) -> Result<(), StepFailure> {
        Ok(())
    }

    /// Release trip demand due at `tick`.
    fn load_demand(&mut self, _tick: Tick, _facts: &mut FactSink) -> Result<(), StepFailure> {
        Ok(())
    }

    /// Recompute link speeds and travel times.
    fn refresh_speeds(&mut self, _tick: Tick) -> Result<(), StepFailure> {
        Ok(())
    }

    /// Metrics for the periodic progress line.
    fn metrics(&self, _tick: Tick) -> Option<Value> {
        None
    }

    /// A `CTRL_<op>` forwarded from the controller.
    fn control(&mut self, op: &str, _body: &Value) -> ControlReply {
        Err(format!("unsupported operation `{op}`"))
    }

    /// A `QUERY_<what>` forwarded from the controller.
    fn query(&mut self, what: &str, _body: &Value) -> Result<Value, String> {
        Err(format!("unsupported query `{what}`"))
    }
}
