//! Shared race state guarded by the race lock.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::agent::{AgentId, AgentState, Archetype};
use crate::grid::{CellKind, Grid, GridSnapshot, Position};

/// Terminal result of a race.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "agent", rename_all = "snake_case")]
pub enum Outcome {
    /// The agent reached the goal or the last column before the boundary.
    Winner(AgentId),
    /// The global step budget ran out first.
    StepCapReached,
    /// The stop signal fired first.
    Aborted,
}

/// Every agent's position, freeze and step bookkeeping plus the global
/// counters. Each multi-field read-modify-write happens on one `&mut`
/// borrow, i.e. under one acquisition of the race lock.
#[derive(Debug, Clone)]
pub struct RaceState {
    agents: Vec<AgentState>,
    total_steps: u64,
    max_steps: u64,
    outcome: Option<Outcome>,
}

impl RaceState {
    /// Wrap already-placed agents. Callers guarantee distinct positions.
    #[must_use]
    pub fn new(agents: Vec<AgentState>, max_steps: u64) -> Self {
        Self {
            agents,
            total_steps: 0,
            max_steps,
            outcome: None,
        }
    }

    /// Place each roster entry on a distinct open cell, drawn uniformly among
    /// non-wall, non-goal cells in the spawn columns.
    pub fn spawn<R: Rng>(
        grid: &Grid,
        roster: impl IntoIterator<Item = Archetype>,
        max_steps: u64,
        rng: &mut R,
    ) -> Self {
        let mut candidates: Vec<Position> = (0..grid.rows())
            .flat_map(|row| (0..=grid.spawn_max_col()).map(move |col| Position::new(row, col)))
            .filter(|pos| grid.cell_kind(*pos) == CellKind::Open)
            .collect();
        let mut agents = Vec::new();
        for archetype in roster {
            if candidates.is_empty() {
                break;
            }
            let pick = rng.random_range(0..candidates.len());
            agents.push(AgentState::new(archetype, candidates.swap_remove(pick)));
        }
        Self::new(agents, max_steps)
    }

    #[must_use]
    pub fn agents(&self) -> &[AgentState] {
        &self.agents
    }

    #[must_use]
    pub fn agent(&self, id: AgentId) -> &AgentState {
        &self.agents[id.index()]
    }

    #[must_use]
    pub fn agent_mut(&mut self, id: AgentId) -> &mut AgentState {
        &mut self.agents[id.index()]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = AgentId> + use<> {
        (0..self.agents.len()).map(AgentId)
    }

    /// Committed moves across all agents.
    #[must_use]
    pub const fn total_steps(&self) -> u64 {
        self.total_steps
    }

    #[must_use]
    pub const fn max_steps(&self) -> u64 {
        self.max_steps
    }

    #[must_use]
    pub const fn is_over(&self) -> bool {
        self.outcome.is_some()
    }

    #[must_use]
    pub const fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    #[must_use]
    pub fn winner(&self) -> Option<AgentId> {
        match self.outcome {
            Some(Outcome::Winner(id)) => Some(id),
            _ => None,
        }
    }

    /// Whether any agent other than `excluding` stands on `pos`.
    #[must_use]
    pub fn is_occupied(&self, pos: Position, excluding: Option<AgentId>) -> bool {
        self.agents
            .iter()
            .enumerate()
            .any(|(idx, agent)| Some(AgentId(idx)) != excluding && agent.position == pos)
    }

    /// Destination check shared by normal moves, bursts and jumps.
    #[must_use]
    pub fn can_enter(&self, grid: &Grid, id: AgentId, dest: Position) -> bool {
        grid.is_passable(dest) && !self.is_occupied(dest, Some(id))
    }

    /// Move `id` to `dest` and count the step. Legality is checked by the caller.
    pub(crate) fn commit_move(&mut self, id: AgentId, dest: Position) {
        let agent = &mut self.agents[id.index()];
        agent.position = dest;
        agent.steps += 1;
        self.total_steps += 1;
    }

    /// Win test for `id`: on the goal, or on the last column before the boundary.
    #[must_use]
    pub fn has_reached_finish(&self, grid: &Grid, id: AgentId) -> bool {
        let pos = self.agent(id).position;
        pos == grid.goal() || pos.col >= grid.finish_col() - 1
    }

    #[must_use]
    pub const fn step_cap_reached(&self) -> bool {
        self.total_steps >= self.max_steps
    }

    /// Record the terminal outcome. Only the first call takes effect.
    pub fn finish(&mut self, outcome: Outcome) -> bool {
        if self.outcome.is_some() {
            return false;
        }
        self.outcome = Some(outcome);
        true
    }

    /// Every agent is frozen at `now`.
    #[must_use]
    pub fn all_frozen(&self, now: std::time::Instant) -> bool {
        !self.agents.is_empty() && self.agents.iter().all(|agent| agent.is_frozen(now))
    }

    /// Overlay boundary, goal and agent markers onto the static layout.
    #[must_use]
    pub fn snapshot(&self, grid: &Grid) -> GridSnapshot {
        let mut cells = grid.layout_glyphs();
        for agent in &self.agents {
            if grid.in_bounds(agent.position) {
                cells[grid.offset(agent.position)] = agent.archetype.marker();
            }
        }
        GridSnapshot::new(
            grid.rows() as usize,
            grid.cols() as usize,
            self.total_steps,
            cells,
        )
    }
}
