//! Race coordination: per-agent ticks, worker threads, winner election and shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rand::{Rng, SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::ability::{chaser_jump, runner_burst, shooter_fire};
use crate::agent::{AgentId, Archetype};
use crate::config::RaceConfig;
use crate::error::RaceError;
use crate::event::{RaceEvent, TickReport, TickStatus};
use crate::grid::{Grid, GridSnapshot, Position, Step};
use crate::movement::{MoveResult, apply_step, propose_step};
use crate::state::{Outcome, RaceState};

/// How often the supervisor re-checks the stop signal while waiting.
const SUPERVISOR_SLICE: Duration = Duration::from_millis(25);

/// Receives a frame whenever the board changes. Called under the output lock,
/// never under the race lock.
pub trait FrameSink: Send {
    fn frame(&mut self, snapshot: &GridSnapshot, events: &[RaceEvent]);
}

impl<F> FrameSink for F
where
    F: FnMut(&GridSnapshot, &[RaceEvent]) + Send,
{
    fn frame(&mut self, snapshot: &GridSnapshot, events: &[RaceEvent]) {
        self(snapshot, events);
    }
}

/// Sink that drops every frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl FrameSink for NullSink {
    fn frame(&mut self, _snapshot: &GridSnapshot, _events: &[RaceEvent]) {}
}

/// Process-wide cancellation token. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Final per-agent numbers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentSummary {
    pub id: AgentId,
    pub archetype: Archetype,
    pub steps: u64,
    pub position: Position,
}

/// Result of a completed race.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RaceSummary {
    pub seed: u64,
    pub outcome: Outcome,
    pub total_steps: u64,
    pub agents: Vec<AgentSummary>,
}

impl RaceSummary {
    fn from_state(state: &RaceState, seed: u64) -> Self {
        Self {
            seed,
            outcome: state.outcome().unwrap_or(Outcome::Aborted),
            total_steps: state.total_steps(),
            agents: state
                .ids()
                .map(|id| {
                    let agent = state.agent(id);
                    AgentSummary {
                        id,
                        archetype: agent.archetype,
                        steps: agent.steps,
                        position: agent.position,
                    }
                })
                .collect(),
        }
    }

    #[must_use]
    pub fn winner(&self) -> Option<&AgentSummary> {
        match self.outcome {
            Outcome::Winner(id) => self.agents.get(id.index()),
            Outcome::StepCapReached | Outcome::Aborted => None,
        }
    }
}

/// Run one tick for `id`: freeze gate, directional intent, then resolution.
pub fn run_tick<R: Rng>(
    grid: &Grid,
    config: &RaceConfig,
    state: &mut RaceState,
    id: AgentId,
    rng: &mut R,
    now: Instant,
) -> TickReport {
    if state.is_over() {
        return TickReport::idle(TickStatus::Halted);
    }
    if state.agent(id).is_frozen(now) {
        return TickReport::idle(TickStatus::Frozen);
    }
    let from = state.agent(id).position;
    let step = propose_step(from, grid.goal(), config.goal_bias, rng);
    resolve_tick(grid, config, state, id, step, rng, now)
}

/// Resolve an already-chosen `step` for `id`, including its archetype's ability
/// and the win and step-cap checks. The freeze gate is the caller's job.
pub fn resolve_tick<R: Rng>(
    grid: &Grid,
    config: &RaceConfig,
    state: &mut RaceState,
    id: AgentId,
    step: Step,
    rng: &mut R,
    now: Instant,
) -> TickReport {
    if state.is_over() {
        return TickReport::idle(TickStatus::Halted);
    }
    let archetype = state.agent(id).archetype;
    let mut events = Vec::new();

    match apply_step(state, grid, id, step) {
        MoveResult::Moved(to) => {
            events.push(RaceEvent::Moved {
                agent: id,
                archetype,
                to,
            });
            if !settle(state, grid, id, &mut events)
                && archetype == Archetype::Runner
                && let Some(event) = runner_burst(state, grid, id, config, rng)
            {
                events.push(event);
                settle(state, grid, id, &mut events);
            }
        }
        MoveResult::Blocked(_) if archetype == Archetype::Chaser => {
            if let Some(event) = chaser_jump(state, grid, id, step, config, rng) {
                events.push(event);
                settle(state, grid, id, &mut events);
            }
        }
        MoveResult::Blocked(_) | MoveResult::Stayed => {}
    }

    if archetype == Archetype::Shooter
        && !state.is_over()
        && let Some(event) = shooter_fire(state, id, config, rng, now)
    {
        events.push(event);
    }

    TickReport {
        status: TickStatus::Active,
        events,
    }
}

/// Win and step-cap check after a position change. Returns whether the race is over.
fn settle(state: &mut RaceState, grid: &Grid, id: AgentId, events: &mut Vec<RaceEvent>) -> bool {
    if state.has_reached_finish(grid, id) {
        if state.finish(Outcome::Winner(id)) {
            let archetype = state.agent(id).archetype;
            info!(agent = %id, %archetype, total_steps = state.total_steps(), "winner decided");
            events.push(RaceEvent::Won {
                agent: id,
                archetype,
            });
        }
    } else if state.step_cap_reached() && state.finish(Outcome::StepCapReached) {
        let total_steps = state.total_steps();
        info!(total_steps, "step cap reached without a winner");
        events.push(RaceEvent::StepCapReached { total_steps });
    }
    state.is_over()
}

struct Shared {
    config: RaceConfig,
    grid: Grid,
    seed: u64,
    state: Mutex<RaceState>,
    wake: Condvar,
    output: Mutex<Box<dyn FrameSink>>,
    stop: StopSignal,
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, RaceState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("race state lock poisoned; continuing with inner state");
            poisoned.into_inner()
        })
    }

    /// Output lock. Always taken while the state lock is held and kept past
    /// its release, so frames reach the sink in commit order.
    fn lock_output(&self) -> MutexGuard<'_, Box<dyn FrameSink>> {
        self.output.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish_current(&self) {
        let state = self.lock_state();
        let snapshot = state.snapshot(&self.grid);
        let mut sink = self.lock_output();
        drop(state);
        sink.frame(&snapshot, &[]);
    }

    fn should_stop(&self, state: &RaceState) -> bool {
        state.is_over() || self.stop.is_triggered()
    }

    /// Sleep up to `duration`, waking early once the race is over.
    /// Returns whether the caller should leave its loop.
    fn pause(&self, duration: Duration) -> bool {
        let guard = self.lock_state();
        let (guard, _) = self
            .wake
            .wait_timeout_while(guard, duration, |state| !self.should_stop(state))
            .unwrap_or_else(PoisonError::into_inner);
        self.should_stop(&guard)
    }

    /// Block until the race is decided, the stop signal fires or every worker is gone.
    fn supervise(&self, workers: &[(Archetype, JoinHandle<()>)]) {
        let mut state = self.lock_state();
        loop {
            if state.is_over() {
                break;
            }
            if self.stop.is_triggered() {
                info!("stop signal observed; aborting race");
                state.finish(Outcome::Aborted);
                break;
            }
            if workers.iter().all(|(_, handle)| handle.is_finished()) {
                warn!("all workers exited before the race was decided");
                state.finish(Outcome::Aborted);
                break;
            }
            state = self
                .wake
                .wait_timeout(state, SUPERVISOR_SLICE)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        drop(state);
        self.wake.notify_all();
    }

    fn drive_agent(&self, id: AgentId) {
        let mut rng = RaceConfig::agent_rng(self.seed, id);
        let archetype = self.lock_state().agent(id).archetype;
        debug!(agent = %id, %archetype, "worker started");

        loop {
            if self.stop.is_triggered() {
                break;
            }
            let (report, frame) = {
                let mut state = self.lock_state();
                if state.is_over() {
                    break;
                }
                let report = run_tick(
                    &self.grid,
                    &self.config,
                    &mut state,
                    id,
                    &mut rng,
                    Instant::now(),
                );
                if state.is_over() {
                    self.wake.notify_all();
                }
                let frame = report
                    .changed()
                    .then(|| (state.snapshot(&self.grid), self.lock_output()));
                (report, frame)
            };

            if let Some((snapshot, mut sink)) = frame {
                sink.frame(&snapshot, &report.events);
            }

            let pace = match report.status {
                TickStatus::Frozen => self.config.frozen_pace(archetype),
                TickStatus::Active | TickStatus::Halted => self.config.delay(),
            };
            if self.pause(pace) {
                break;
            }
        }
        debug!(agent = %id, %archetype, "worker stopped");
    }
}

/// Join every worker, logging each panic. The first panic becomes the error.
fn join_workers(workers: Vec<(Archetype, JoinHandle<()>)>) -> Option<RaceError> {
    let mut failure = None;
    for (archetype, handle) in workers {
        if handle.join().is_err() {
            error!(%archetype, "worker panicked");
            failure.get_or_insert(RaceError::WorkerPanicked { archetype });
        }
    }
    failure
}

/// A prepared race: layout, placed agents, output sink and stop signal.
pub struct Race {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Race {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Race")
            .field("seed", &self.shared.seed)
            .field("config", &self.shared.config)
            .finish()
    }
}

impl Race {
    /// Build the layout and starting positions from `config`.
    pub fn new(config: RaceConfig, sink: Box<dyn FrameSink>, stop: StopSignal) -> Self {
        let config = config.sanitized();
        let seed = config.resolve_seed();
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut grid = Grid::new(config.rows, config.cols);
        grid.scatter_walls(&mut rng, config.wall_count());
        let state = RaceState::spawn(
            &grid,
            config.roster().map(|(_, archetype)| archetype),
            config.max_steps,
            &mut rng,
        );
        info!(
            seed,
            rows = config.rows,
            cols = config.cols,
            agents = state.len(),
            "race prepared"
        );
        Self::with_layout(config, grid, state, seed, sink, stop)
    }

    /// Race over a caller-built layout and placement.
    pub fn with_layout(
        config: RaceConfig,
        grid: Grid,
        state: RaceState,
        seed: u64,
        sink: Box<dyn FrameSink>,
        stop: StopSignal,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                config: config.sanitized(),
                grid,
                seed,
                state: Mutex::new(state),
                wake: Condvar::new(),
                output: Mutex::new(sink),
                stop,
            }),
        }
    }

    #[must_use]
    pub fn seed(&self) -> u64 {
        self.shared.seed
    }

    #[must_use]
    pub fn grid(&self) -> &Grid {
        &self.shared.grid
    }

    #[must_use]
    pub fn config(&self) -> &RaceConfig {
        &self.shared.config
    }

    /// Current board.
    #[must_use]
    pub fn snapshot(&self) -> GridSnapshot {
        self.shared.lock_state().snapshot(&self.shared.grid)
    }

    /// Spawn one worker per agent, wait for the race to end and join them all.
    pub fn run(self) -> Result<RaceSummary, RaceError> {
        let shared = self.shared;
        shared.publish_current();

        let roster: Vec<(AgentId, Archetype)> = {
            let state = shared.lock_state();
            state.ids().map(|id| (id, state.agent(id).archetype)).collect()
        };
        info!(seed = shared.seed, agents = roster.len(), "race started");

        let mut workers = Vec::with_capacity(roster.len());
        for (id, archetype) in roster {
            let worker = Arc::clone(&shared);
            let spawned = thread::Builder::new()
                .name(format!("toonrace-{}", archetype.name().to_ascii_lowercase()))
                .spawn(move || worker.drive_agent(id));
            match spawned {
                Ok(handle) => workers.push((archetype, handle)),
                Err(source) => {
                    error!(%archetype, %source, "worker spawn failed");
                    shared.lock_state().finish(Outcome::Aborted);
                    shared.wake.notify_all();
                    join_workers(workers);
                    return Err(RaceError::Spawn { archetype, source });
                }
            }
        }

        shared.supervise(&workers);

        if let Some(err) = join_workers(workers) {
            return Err(err);
        }

        let summary = RaceSummary::from_state(&shared.lock_state(), shared.seed);
        shared.publish_current();
        info!(
            outcome = ?summary.outcome,
            total_steps = summary.total_steps,
            "race finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentState;

    fn config() -> RaceConfig {
        RaceConfig {
            rng_seed: Some(9),
            ..RaceConfig::default()
        }
    }

    fn rng() -> SmallRng {
        SmallRng::seed_from_u64(9)
    }

    fn trio(runner: Position, chaser: Position, shooter: Position) -> RaceState {
        RaceState::new(
            vec![
                AgentState::new(Archetype::Runner, runner),
                AgentState::new(Archetype::Chaser, chaser),
                AgentState::new(Archetype::Shooter, shooter),
            ],
            10_000,
        )
    }

    #[test]
    fn chaser_jumps_over_wall_ahead() {
        let mut grid = Grid::new(5, 20);
        grid.set_wall(Position::new(2, 5));
        let mut state = trio(Position::new(0, 0), Position::new(2, 4), Position::new(4, 0));
        let config = RaceConfig {
            chaser_jump_chance: 1.0,
            ..config()
        };

        let report = resolve_tick(
            &grid,
            &config,
            &mut state,
            AgentId(1),
            Step::RIGHT,
            &mut rng(),
            Instant::now(),
        );

        assert_eq!(state.agent(AgentId(1)).position, Position::new(2, 6));
        assert_eq!(state.agent(AgentId(1)).steps, 1);
        assert_eq!(state.total_steps(), 1);
        assert_eq!(report.committed_moves(), 1);
        assert!(matches!(report.events[0], RaceEvent::Jumped { .. }));
    }

    #[test]
    fn blocked_runner_does_not_jump() {
        let mut grid = Grid::new(5, 20);
        grid.set_wall(Position::new(2, 5));
        let mut state = trio(Position::new(2, 4), Position::new(0, 0), Position::new(4, 0));
        let config = RaceConfig {
            chaser_jump_chance: 1.0,
            runner_burst_chance: 1.0,
            ..config()
        };
        let report = resolve_tick(
            &grid,
            &config,
            &mut state,
            AgentId(0),
            Step::RIGHT,
            &mut rng(),
            Instant::now(),
        );
        assert!(!report.changed());
        assert_eq!(state.agent(AgentId(0)).position, Position::new(2, 4));
    }

    #[test]
    fn runner_burst_adds_a_second_counted_step() {
        let grid = Grid::new(5, 20);
        let mut state = trio(Position::new(0, 1), Position::new(4, 0), Position::new(4, 2));
        let config = RaceConfig {
            runner_burst_chance: 1.0,
            ..config()
        };
        let report = resolve_tick(
            &grid,
            &config,
            &mut state,
            AgentId(0),
            Step::RIGHT,
            &mut rng(),
            Instant::now(),
        );
        assert_eq!(report.committed_moves(), 2);
        assert_eq!(state.agent(AgentId(0)).position, Position::new(1, 2));
        assert_eq!(state.agent(AgentId(0)).steps, 2);
        assert_eq!(state.total_steps(), 2);
    }

    #[test]
    fn shooter_freezes_nearest_then_waits_for_cooldown() {
        let grid = Grid::new(5, 20);
        let mut state = trio(Position::new(0, 3), Position::new(4, 10), Position::new(0, 0));
        let config = RaceConfig {
            shooter_fire_chance: 1.0,
            ..config()
        };
        let shooter = AgentId(2);
        let now = Instant::now();
        let mut rng = rng();

        let report = resolve_tick(&grid, &config, &mut state, shooter, Step::STAY, &mut rng, now);
        assert_eq!(
            report.events,
            vec![RaceEvent::Shot {
                shooter,
                target: AgentId(0),
                target_archetype: Archetype::Runner,
                frozen_for: config.freeze_duration(),
            }]
        );
        let frozen_until = now + config.freeze_duration();
        assert_eq!(state.agent(AgentId(0)).frozen_until, Some(frozen_until));

        let soon = now + Duration::from_millis(10);
        let report = resolve_tick(&grid, &config, &mut state, shooter, Step::STAY, &mut rng, soon);
        assert!(report.events.is_empty());
        assert_eq!(state.agent(AgentId(0)).frozen_until, Some(frozen_until));
        assert_eq!(state.agent(AgentId(1)).frozen_until, None);

        let ready = now + config.shooter_cooldown();
        let report = resolve_tick(&grid, &config, &mut state, shooter, Step::STAY, &mut rng, ready);
        assert!(matches!(
            report.events.as_slice(),
            [RaceEvent::Shot { target: AgentId(0), .. }]
        ));
    }

    #[test]
    fn frozen_agent_waits_until_expiry() {
        let grid = Grid::new(5, 20);
        let mut state = trio(Position::new(0, 1), Position::new(4, 0), Position::new(4, 2));
        let config = RaceConfig {
            goal_bias: 1.0,
            runner_burst_chance: 0.0,
            ..config()
        };
        let start = Instant::now();
        let freeze = Duration::from_millis(1_000);
        state.agent_mut(AgentId(0)).freeze(start, freeze);
        let mut rng = rng();

        for offset in [0, 1, 500, 999] {
            let now = start + Duration::from_millis(offset);
            let report = run_tick(&grid, &config, &mut state, AgentId(0), &mut rng, now);
            assert_eq!(report.status, TickStatus::Frozen);
            assert!(!report.changed());
        }
        assert_eq!(state.agent(AgentId(0)).position, Position::new(0, 1));
        assert_eq!(state.agent(AgentId(0)).steps, 0);

        let report = run_tick(&grid, &config, &mut state, AgentId(0), &mut rng, start + freeze);
        assert_eq!(report.status, TickStatus::Active);
        assert_eq!(state.agent(AgentId(0)).steps, 1);
    }

    #[test]
    fn all_frozen_means_no_progress() {
        let grid = Grid::new(5, 20);
        let mut state = trio(Position::new(0, 1), Position::new(4, 0), Position::new(4, 2));
        let config = config();
        let now = Instant::now();
        for id in state.ids() {
            state.agent_mut(id).freeze(now, Duration::from_millis(50));
        }
        assert!(state.all_frozen(now));
        let mut rng = rng();
        for _ in 0..20 {
            for id in state.ids() {
                let report = run_tick(&grid, &config, &mut state, id, &mut rng, now);
                assert_eq!(report.status, TickStatus::Frozen);
            }
        }
        assert_eq!(state.total_steps(), 0);
        assert!(!state.is_over());
        assert!(!state.all_frozen(now + Duration::from_millis(50)));
    }

    #[test]
    fn first_finisher_wins_and_later_moves_are_refused() {
        let grid = Grid::new(5, 20);
        let mut state = trio(Position::new(2, 17), Position::new(0, 17), Position::new(4, 0));
        let config = config();
        let now = Instant::now();
        let mut rng = rng();

        let report = resolve_tick(&grid, &config, &mut state, AgentId(0), Step::RIGHT, &mut rng, now);
        assert_eq!(state.winner(), Some(AgentId(0)));
        assert!(report.events.contains(&RaceEvent::Won {
            agent: AgentId(0),
            archetype: Archetype::Runner,
        }));

        let report = resolve_tick(&grid, &config, &mut state, AgentId(1), Step::RIGHT, &mut rng, now);
        assert_eq!(report.status, TickStatus::Halted);
        assert_eq!(state.agent(AgentId(1)).position, Position::new(0, 17));
        assert_eq!(state.winner(), Some(AgentId(0)));
        assert_eq!(state.total_steps(), 1);
    }

    #[test]
    fn step_cap_ends_without_winner() {
        let grid = Grid::new(5, 20);
        let mut state = RaceState::new(
            vec![AgentState::new(Archetype::Chaser, Position::new(0, 0))],
            3,
        );
        let config = config();
        let now = Instant::now();
        let mut rng = rng();
        let mut events = Vec::new();
        for step in [Step::DOWN, Step::UP, Step::DOWN, Step::UP] {
            events.extend(
                resolve_tick(&grid, &config, &mut state, AgentId(0), step, &mut rng, now).events,
            );
        }
        assert_eq!(state.outcome(), Some(Outcome::StepCapReached));
        assert_eq!(state.winner(), None);
        assert_eq!(state.total_steps(), 3);
        assert!(events.contains(&RaceEvent::StepCapReached { total_steps: 3 }));
    }

    #[test]
    fn lone_agent_reaches_goal_on_open_grid() {
        let grid = Grid::new(5, 20);
        let goal = grid.goal();
        let mut state = RaceState::new(
            vec![AgentState::new(Archetype::Runner, Position::new(goal.row, 0))],
            10_000,
        );
        let config = config();
        let mut rng = rng();
        let now = Instant::now();
        let mut ticks = 0;
        while !state.is_over() && ticks < 2_000 {
            run_tick(&grid, &config, &mut state, AgentId(0), &mut rng, now);
            ticks += 1;
        }
        assert_eq!(state.outcome(), Some(Outcome::Winner(AgentId(0))));
        let pos = state.agent(AgentId(0)).position;
        assert!(pos.col >= grid.finish_col() - 1 && pos.col < grid.finish_col());
    }

    #[test]
    fn stop_signal_is_shared_between_clones() {
        let stop = StopSignal::new();
        let remote = stop.clone();
        assert!(!stop.is_triggered());
        remote.trigger();
        assert!(stop.is_triggered());
    }

    #[test]
    fn joining_reports_first_worker_panic() {
        let calm = thread::spawn(|| {});
        let crashed = thread::spawn(|| panic!("worker blew up"));
        let failure = join_workers(vec![
            (Archetype::Runner, calm),
            (Archetype::Chaser, crashed),
        ]);
        assert!(matches!(
            failure,
            Some(RaceError::WorkerPanicked {
                archetype: Archetype::Chaser
            })
        ));
        assert!(join_workers(vec![(Archetype::Shooter, thread::spawn(|| {}))]).is_none());
    }
}
