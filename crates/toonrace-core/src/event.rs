//! What happened during a tick, for renderers and logs.

use std::time::Duration;

use serde::Serialize;

use crate::agent::{AgentId, Archetype};
use crate::grid::Position;

/// A state change produced by one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RaceEvent {
    Moved {
        agent: AgentId,
        archetype: Archetype,
        to: Position,
    },
    /// Runner bonus step.
    Burst {
        agent: AgentId,
        archetype: Archetype,
        to: Position,
    },
    /// Chaser hop over a blocked cell.
    Jumped {
        agent: AgentId,
        archetype: Archetype,
        to: Position,
    },
    Shot {
        shooter: AgentId,
        target: AgentId,
        target_archetype: Archetype,
        frozen_for: Duration,
    },
    Won {
        agent: AgentId,
        archetype: Archetype,
    },
    StepCapReached {
        total_steps: u64,
    },
}

/// How far a tick got.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickStatus {
    /// The race was already decided; the agent did nothing.
    Halted,
    /// The agent is frozen and only waits.
    Frozen,
    /// The agent proposed and resolved a move.
    Active,
}

/// Outcome of one agent tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub status: TickStatus,
    pub events: Vec<RaceEvent>,
}

impl TickReport {
    #[must_use]
    pub const fn idle(status: TickStatus) -> Self {
        Self {
            status,
            events: Vec::new(),
        }
    }

    /// Whether the board changed and should be redrawn.
    #[must_use]
    pub fn changed(&self) -> bool {
        !self.events.is_empty()
    }

    /// Number of committed position changes in this tick.
    #[must_use]
    pub fn committed_moves(&self) -> usize {
        self.events
            .iter()
            .filter(|event| {
                matches!(
                    event,
                    RaceEvent::Moved { .. } | RaceEvent::Burst { .. } | RaceEvent::Jumped { .. }
                )
            })
            .count()
    }
}
