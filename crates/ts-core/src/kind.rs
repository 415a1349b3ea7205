//! Categories of steppable agents.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The agent categories the global scheduler steps as separate passes.
///
/// Each kind has its own population, its own partition assignment and its
/// own timing statistics.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Road,
    Zone,
    ChargingStation,
    Signal,
}

impl AgentKind {
    /// Every kind, in stepping-table order.
    pub const ALL: [AgentKind; 4] = [
        AgentKind::Road,
        AgentKind::Zone,
        AgentKind::ChargingStation,
        AgentKind::Signal,
    ];

    /// Number of kinds; the length of per-kind arrays.
    pub const COUNT: usize = 4;

    /// Dense index for per-kind arrays.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            AgentKind::Road            => 0,
            AgentKind::Zone            => 1,
            AgentKind::ChargingStation => 2,
            AgentKind::Signal          => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AgentKind::Road            => "road",
            AgentKind::Zone            => "zone",
            AgentKind::ChargingStation => "charging_station",
            AgentKind::Signal          => "signal",
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
