//! Core of Toon Race: a shared grid, three archetype racers driven by their
//! own threads, timed abilities and a race-to-goal termination protocol.
//!
//! All mutable race data lives in one [`RaceState`] behind a single lock held
//! for the whole of each agent tick. Rendering goes through a [`FrameSink`]
//! behind a second, independent lock.

pub mod ability;
pub mod agent;
pub mod config;
mod error;
pub mod event;
pub mod grid;
pub mod movement;
pub mod race;
pub mod state;

pub use agent::{AgentId, AgentState, Archetype, MAX_AGENTS};
pub use config::RaceConfig;
pub use error::RaceError;
pub use event::{RaceEvent, TickReport, TickStatus};
pub use grid::{CellKind, Grid, GridSnapshot, MAX_COLS, MAX_ROWS, Position, Step};
pub use movement::{MoveResult, apply_step, propose_step};
pub use race::{
    AgentSummary, FrameSink, NullSink, Race, RaceSummary, StopSignal, resolve_tick, run_tick,
};
pub use state::{Outcome, RaceState};
