//! Goal-biased step selection and validated move commits.

use rand::Rng;
use tracing::debug;

use crate::agent::AgentId;
use crate::grid::{Grid, Position, Step};
use crate::state::RaceState;

/// Result of trying to apply a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveResult {
    /// Committed; holds the new position.
    Moved(Position),
    /// Destination was illegal; nothing changed.
    Blocked(Position),
    /// The step was `Step::STAY`; nothing to validate or commit.
    Stayed,
}

impl MoveResult {
    #[must_use]
    pub const fn is_moved(self) -> bool {
        matches!(self, Self::Moved(_))
    }
}

/// Uniform pick among the four cardinal steps and staying put.
pub fn random_step<R: Rng>(rng: &mut R) -> Step {
    Step::CHOICES[rng.random_range(0..Step::CHOICES.len())]
}

/// Single-axis step toward `goal`, preferring the row axis. `None` once aligned on both.
#[must_use]
pub fn toward_goal(from: Position, goal: Position) -> Option<Step> {
    let d_row = (goal.row - from.row).signum();
    let d_col = (goal.col - from.col).signum();
    if d_row != 0 {
        Some(Step::new(d_row, 0))
    } else if d_col != 0 {
        Some(Step::new(0, d_col))
    } else {
        None
    }
}

/// Directional intent shared by every movement kind.
///
/// With probability `bias` pick the row or column axis with even odds and step
/// toward the goal along it, switching to the other axis when the chosen one is
/// already aligned. Otherwise, or when aligned on both axes, fall back to
/// [`random_step`].
pub fn propose_step<R: Rng>(from: Position, goal: Position, bias: f64, rng: &mut R) -> Step {
    if rng.random_bool(bias) {
        let d_row = (goal.row - from.row).signum();
        let d_col = (goal.col - from.col).signum();
        let prefer_row = rng.random_bool(0.5);
        let row_step = (d_row != 0).then(|| Step::new(d_row, 0));
        let col_step = (d_col != 0).then(|| Step::new(0, d_col));
        let chosen = if prefer_row {
            row_step.or(col_step)
        } else {
            col_step.or(row_step)
        };
        if let Some(step) = chosen {
            return step;
        }
    }
    random_step(rng)
}

/// Validate and commit one move of `id` by `step`.
///
/// The destination must lie inside the grid, strictly left of the finish
/// boundary, off any wall and free of other agents. Nothing is committed once
/// the race is over.
pub fn apply_step(state: &mut RaceState, grid: &Grid, id: AgentId, step: Step) -> MoveResult {
    if step.is_stay() {
        return MoveResult::Stayed;
    }
    let dest = state.agent(id).position.offset(step);
    if state.is_over() || !state.can_enter(grid, id, dest) {
        return MoveResult::Blocked(dest);
    }
    state.commit_move(id, dest);
    debug!(agent = %id, row = dest.row, col = dest.col, "move committed");
    MoveResult::Moved(dest)
}
