//! Race configuration snapshot.

use std::time::Duration;

use rand::{SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::agent::{AgentId, Archetype, MAX_AGENTS};
use crate::grid::{MAX_COLS, MAX_ROWS};

const MIN_ROWS: u32 = 5;
const MIN_COLS: u32 = 20;
const MIN_STEPS: u64 = 100;
/// One wall draw per this many cells.
const WALL_DENSITY_DIVISOR: u32 = 30;
/// Multiplier mixing the agent slot into its private RNG seed.
const AGENT_SEED_STRIDE: u64 = 777;

/// Static configuration for one race. Read once at startup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RaceConfig {
    /// Grid height in cells.
    pub rows: u32,
    /// Grid width in cells, finish boundary included.
    pub cols: u32,
    /// Number of racers, taken from the roster in order.
    pub agents: usize,
    /// Global committed-move budget before the race ends without a winner.
    pub max_steps: u64,
    /// Optional RNG seed for reproducible layouts and decisions.
    pub rng_seed: Option<u64>,
    /// Pause after every active tick.
    pub delay_ms: u64,
    /// Probability of a goal-directed step instead of a random one.
    pub goal_bias: f64,
    /// Runner: chance of a bonus step after a successful move.
    pub runner_burst_chance: f64,
    /// Chaser: chance of hopping when the move is blocked.
    pub chaser_jump_chance: f64,
    /// Shooter: chance of firing on a tick where it is ready.
    pub shooter_fire_chance: f64,
    /// Shooter: minimum interval between shots.
    pub shooter_cooldown_ms: u64,
    /// How long a hit keeps the target frozen.
    pub freeze_ms: u64,
    /// Wait between checks while frozen, per archetype.
    pub runner_pace_ms: u64,
    pub chaser_pace_ms: u64,
    pub shooter_pace_ms: u64,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            rows: 18,
            cols: 36,
            agents: MAX_AGENTS,
            max_steps: 10_000,
            rng_seed: None,
            delay_ms: 120,
            goal_bias: 0.70,
            runner_burst_chance: 0.15,
            chaser_jump_chance: 0.25,
            shooter_fire_chance: 0.15,
            shooter_cooldown_ms: 1_500,
            freeze_ms: 1_000,
            runner_pace_ms: 35,
            chaser_pace_ms: 60,
            shooter_pace_ms: 75,
        }
    }
}

impl RaceConfig {
    /// Clamp every field into its usable range. Malformed values degrade to
    /// the nearest valid setting instead of failing.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();

        let agents = self.agents.clamp(1, MAX_AGENTS);
        if agents != self.agents {
            warn!(requested = self.agents, clamped = agents, "agent count clamped");
            self.agents = agents;
        }
        if self.rows < MIN_ROWS {
            warn!(requested = self.rows, clamped = MIN_ROWS, "grid rows raised");
            self.rows = MIN_ROWS;
        }
        if self.cols < MIN_COLS {
            warn!(requested = self.cols, clamped = MIN_COLS, "grid columns raised");
            self.cols = MIN_COLS;
        }
        if self.rows > MAX_ROWS {
            warn!(requested = self.rows, clamped = MAX_ROWS, "grid rows lowered");
            self.rows = MAX_ROWS;
        }
        if self.cols > MAX_COLS {
            warn!(requested = self.cols, clamped = MAX_COLS, "grid columns lowered");
            self.cols = MAX_COLS;
        }
        if self.max_steps < MIN_STEPS {
            warn!(requested = self.max_steps, clamped = MIN_STEPS, "step cap raised");
            self.max_steps = MIN_STEPS;
        }

        self.goal_bias = clamp_probability("goal_bias", self.goal_bias, defaults.goal_bias);
        self.runner_burst_chance = clamp_probability(
            "runner_burst_chance",
            self.runner_burst_chance,
            defaults.runner_burst_chance,
        );
        self.chaser_jump_chance = clamp_probability(
            "chaser_jump_chance",
            self.chaser_jump_chance,
            defaults.chaser_jump_chance,
        );
        self.shooter_fire_chance = clamp_probability(
            "shooter_fire_chance",
            self.shooter_fire_chance,
            defaults.shooter_fire_chance,
        );
        self
    }

    /// Number of wall draws for the configured grid.
    #[must_use]
    pub fn wall_count(&self) -> usize {
        (self.rows.saturating_mul(self.cols) / WALL_DENSITY_DIVISOR) as usize
    }

    /// Racers taking part, in roster order.
    pub fn roster(&self) -> impl Iterator<Item = (AgentId, Archetype)> {
        Archetype::ROSTER
            .into_iter()
            .take(self.agents.clamp(1, MAX_AGENTS))
            .enumerate()
            .map(|(idx, archetype)| (AgentId(idx), archetype))
    }

    /// The configured seed, or a fresh one drawn from entropy.
    #[must_use]
    pub fn resolve_seed(&self) -> u64 {
        self.rng_seed.unwrap_or_else(rand::random)
    }

    /// Private RNG for one agent derived from the race seed.
    #[must_use]
    pub fn agent_rng(seed: u64, id: AgentId) -> SmallRng {
        let salt = AGENT_SEED_STRIDE.wrapping_mul(id.index() as u64 + 1);
        SmallRng::seed_from_u64(seed.wrapping_add(salt))
    }

    #[must_use]
    pub const fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    #[must_use]
    pub const fn freeze_duration(&self) -> Duration {
        Duration::from_millis(self.freeze_ms)
    }

    #[must_use]
    pub const fn shooter_cooldown(&self) -> Duration {
        Duration::from_millis(self.shooter_cooldown_ms)
    }

    /// How long a frozen agent of `archetype` waits before checking again.
    #[must_use]
    pub const fn frozen_pace(&self, archetype: Archetype) -> Duration {
        Duration::from_millis(match archetype {
            Archetype::Runner => self.runner_pace_ms,
            Archetype::Chaser => self.chaser_pace_ms,
            Archetype::Shooter => self.shooter_pace_ms,
        })
    }
}

fn clamp_probability(field: &'static str, value: f64, fallback: f64) -> f64 {
    if value.is_nan() {
        warn!(field, fallback, "probability was NaN; using default");
        return fallback;
    }
    let clamped = value.clamp(0.0, 1.0);
    if clamped != value {
        warn!(field, requested = value, clamped, "probability clamped");
    }
    clamped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_survive_sanitizing() {
        let config = RaceConfig::default();
        assert_eq!(config.clone().sanitized(), config);
        assert_eq!(config.wall_count(), 18 * 36 / 30);
    }

    #[test]
    fn malformed_values_degrade_to_minimums() {
        let config = RaceConfig {
            rows: 1,
            cols: 3,
            agents: 9,
            max_steps: 5,
            goal_bias: f64::NAN,
            runner_burst_chance: 4.0,
            chaser_jump_chance: -1.0,
            ..RaceConfig::default()
        }
        .sanitized();

        assert_eq!(config.rows, 5);
        assert_eq!(config.cols, 20);
        assert_eq!(config.agents, 3);
        assert_eq!(config.max_steps, 100);
        assert_eq!(config.goal_bias, 0.70);
        assert_eq!(config.runner_burst_chance, 1.0);
        assert_eq!(config.chaser_jump_chance, 0.0);

        let zero = RaceConfig {
            agents: 0,
            ..RaceConfig::default()
        }
        .sanitized();
        assert_eq!(zero.agents, 1);
    }

    #[test]
    fn oversized_grid_is_capped() {
        let config = RaceConfig {
            rows: u32::MAX,
            cols: 100_000,
            ..RaceConfig::default()
        }
        .sanitized();
        assert_eq!(config.rows, MAX_ROWS);
        assert_eq!(config.cols, MAX_COLS);
        assert_eq!(config.wall_count(), (512 * 512 / 30) as usize);
    }

    #[test]
    fn roster_follows_agent_count() {
        let config = RaceConfig {
            agents: 2,
            ..RaceConfig::default()
        };
        let roster: Vec<_> = config.roster().collect();
        assert_eq!(
            roster,
            vec![
                (AgentId(0), Archetype::Runner),
                (AgentId(1), Archetype::Chaser)
            ]
        );
    }

    #[test]
    fn config_round_trips_through_json_with_partial_fields() {
        let parsed: RaceConfig =
            serde_json::from_str(r#"{ "rows": 12, "rng_seed": 7 }"#).expect("parse");
        assert_eq!(parsed.rows, 12);
        assert_eq!(parsed.rng_seed, Some(7));
        assert_eq!(parsed.cols, RaceConfig::default().cols);
    }

    #[test]
    fn agent_rngs_differ_per_slot() {
        use rand::Rng;
        let mut a = RaceConfig::agent_rng(42, AgentId(0));
        let mut b = RaceConfig::agent_rng(42, AgentId(1));
        let mut a_again = RaceConfig::agent_rng(42, AgentId(0));
        let first: u64 = a.random();
        assert_eq!(first, a_again.random::<u64>());
        assert_ne!(first, b.random::<u64>());
    }
}
