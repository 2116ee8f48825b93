//! Archetype abilities: Runner burst, Chaser jump and Shooter freeze shot.

use std::time::Instant;

use rand::Rng;
use tracing::debug;

use crate::agent::{AgentId, Archetype};
use crate::config::RaceConfig;
use crate::event::RaceEvent;
use crate::grid::{Grid, Step};
use crate::movement::{MoveResult, apply_step, random_step, toward_goal};
use crate::state::RaceState;

/// Runner bonus step after a successful move: one cell toward the goal on
/// the misaligned axis, or a random step when already aligned.
pub fn runner_burst<R: Rng>(
    state: &mut RaceState,
    grid: &Grid,
    id: AgentId,
    config: &RaceConfig,
    rng: &mut R,
) -> Option<RaceEvent> {
    if !rng.random_bool(config.runner_burst_chance) {
        return None;
    }
    let from = state.agent(id).position;
    let step = toward_goal(from, grid.goal()).unwrap_or_else(|| random_step(rng));
    match apply_step(state, grid, id, step) {
        MoveResult::Moved(to) => {
            debug!(agent = %id, row = to.row, col = to.col, "runner burst");
            Some(RaceEvent::Burst {
                agent: id,
                archetype: Archetype::Runner,
                to,
            })
        }
        MoveResult::Blocked(_) | MoveResult::Stayed => None,
    }
}

/// Chaser hop when its move was blocked: two cells along the original step.
pub fn chaser_jump<R: Rng>(
    state: &mut RaceState,
    grid: &Grid,
    id: AgentId,
    step: Step,
    config: &RaceConfig,
    rng: &mut R,
) -> Option<RaceEvent> {
    if step.is_stay() || !rng.random_bool(config.chaser_jump_chance) {
        return None;
    }
    match apply_step(state, grid, id, step.scaled(2)) {
        MoveResult::Moved(to) => {
            debug!(agent = %id, row = to.row, col = to.col, "chaser jump");
            Some(RaceEvent::Jumped {
                agent: id,
                archetype: Archetype::Chaser,
                to,
            })
        }
        MoveResult::Blocked(_) | MoveResult::Stayed => None,
    }
}

/// Nearest other agent that is not frozen at `now`. Ties keep the lowest index.
#[must_use]
pub fn nearest_target(state: &RaceState, shooter: AgentId, now: Instant) -> Option<AgentId> {
    let origin = state.agent(shooter).position;
    let mut best: Option<(AgentId, i32)> = None;
    for id in state.ids() {
        let agent = state.agent(id);
        if id == shooter || agent.is_frozen(now) {
            continue;
        }
        let distance = origin.manhattan(agent.position);
        if best.is_none_or(|(_, best_distance)| distance < best_distance) {
            best = Some((id, distance));
        }
    }
    best.map(|(id, _)| id)
}

/// Shooter freeze shot. Fires only when off cooldown, the chance roll passes
/// and an unfrozen rival exists; only a shot that lands starts the cooldown.
pub fn shooter_fire<R: Rng>(
    state: &mut RaceState,
    id: AgentId,
    config: &RaceConfig,
    rng: &mut R,
    now: Instant,
) -> Option<RaceEvent> {
    if state.agent(id).on_cooldown(now) || !rng.random_bool(config.shooter_fire_chance) {
        return None;
    }
    let target = nearest_target(state, id, now)?;
    let frozen_for = config.freeze_duration();
    state.agent_mut(target).freeze(now, frozen_for);
    state.agent_mut(id).start_cooldown(now, config.shooter_cooldown());
    let target_archetype = state.agent(target).archetype;
    debug!(shooter = %id, target = %target, ?frozen_for, "freeze shot landed");
    Some(RaceEvent::Shot {
        shooter: id,
        target,
        target_archetype,
        frozen_for,
    })
}
