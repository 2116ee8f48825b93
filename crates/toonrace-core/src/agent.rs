//! Agent roster and per-agent mutable state.

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::grid::Position;

/// Maximum number of racers; one per archetype.
pub const MAX_AGENTS: usize = 3;

/// Index of an agent in the fixed roster. Slot `n` always holds archetype `n`.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub struct AgentId(pub usize);

impl AgentId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Behavioural role deciding which special ability an agent carries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Archetype {
    /// Fast mover with an occasional bonus step toward the goal.
    Runner,
    /// Hops over whatever blocks its path.
    Chaser,
    /// Freezes the nearest rival, then waits out a cooldown.
    Shooter,
}

impl Archetype {
    /// Roster order: slot 0 is the Runner, 1 the Chaser, 2 the Shooter.
    pub const ROSTER: [Self; MAX_AGENTS] = [Self::Runner, Self::Chaser, Self::Shooter];

    #[must_use]
    pub fn for_slot(id: AgentId) -> Option<Self> {
        Self::ROSTER.get(id.index()).copied()
    }

    /// Board marker.
    #[must_use]
    pub const fn marker(self) -> char {
        match self {
            Self::Runner => 'R',
            Self::Chaser => 'C',
            Self::Shooter => 'S',
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Runner => "Runner",
            Self::Chaser => "Chaser",
            Self::Shooter => "Shooter",
        }
    }
}

impl fmt::Display for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Mutable per-agent record. Only touched while the race lock is held.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentState {
    pub archetype: Archetype,
    pub position: Position,
    /// Committed moves, bonus and jump moves included.
    pub steps: u64,
    /// The agent is immobile while `now < frozen_until`.
    pub frozen_until: Option<Instant>,
    /// Earliest instant the agent may fire again.
    pub fire_ready_at: Option<Instant>,
}

impl AgentState {
    #[must_use]
    pub const fn new(archetype: Archetype, position: Position) -> Self {
        Self {
            archetype,
            position,
            steps: 0,
            frozen_until: None,
            fire_ready_at: None,
        }
    }

    #[must_use]
    pub fn is_frozen(&self, now: Instant) -> bool {
        self.frozen_until.is_some_and(|until| now < until)
    }

    /// Freeze until `now + duration`.
    pub fn freeze(&mut self, now: Instant, duration: Duration) {
        self.frozen_until = Some(now + duration);
    }

    #[must_use]
    pub fn on_cooldown(&self, now: Instant) -> bool {
        self.fire_ready_at.is_some_and(|ready| now < ready)
    }

    pub fn start_cooldown(&mut self, now: Instant, duration: Duration) {
        self.fire_ready_at = Some(now + duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roster_maps_slots_to_archetypes() {
        assert_eq!(Archetype::for_slot(AgentId(0)), Some(Archetype::Runner));
        assert_eq!(Archetype::for_slot(AgentId(1)), Some(Archetype::Chaser));
        assert_eq!(Archetype::for_slot(AgentId(2)), Some(Archetype::Shooter));
        assert_eq!(Archetype::for_slot(AgentId(3)), None);
        let markers: String = Archetype::ROSTER.iter().map(|a| a.marker()).collect();
        assert_eq!(markers, "RCS");
    }

    #[test]
    fn freeze_expires_exactly_at_deadline() {
        let now = Instant::now();
        let mut agent = AgentState::new(Archetype::Chaser, Position::new(0, 0));
        assert!(!agent.is_frozen(now));
        agent.freeze(now, Duration::from_millis(1000));
        assert!(agent.is_frozen(now));
        assert!(agent.is_frozen(now + Duration::from_millis(999)));
        assert!(!agent.is_frozen(now + Duration::from_millis(1000)));
    }

    #[test]
    fn cooldown_tracks_ready_instant() {
        let now = Instant::now();
        let mut agent = AgentState::new(Archetype::Shooter, Position::new(0, 0));
        assert!(!agent.on_cooldown(now));
        agent.start_cooldown(now, Duration::from_millis(1500));
        assert!(agent.on_cooldown(now + Duration::from_millis(1499)));
        assert!(!agent.on_cooldown(now + Duration::from_millis(1500)));
    }
}
