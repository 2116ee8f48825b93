//! Command-line surface and configuration layering.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use toonrace_core::RaceConfig;

/// When to colour board markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorChoice {
    /// Colour when stdout supports it.
    #[default]
    Auto,
    Always,
    Never,
}

#[derive(Parser, Debug)]
#[command(
    name = "toonrace",
    version,
    about = "Three toons race across a shared grid, one thread each"
)]
pub struct Cli {
    /// JSON file holding a race configuration; flags below override it.
    #[arg(long, env = "TOONRACE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Grid height (minimum 5).
    #[arg(long, env = "TOONRACE_ROWS")]
    pub rows: Option<u32>,

    /// Grid width including the finish boundary (minimum 20).
    #[arg(long, env = "TOONRACE_COLS")]
    pub cols: Option<u32>,

    /// Number of racers, 1 to 3: Runner, Chaser, Shooter.
    #[arg(long, alias = "toons", env = "TOONRACE_AGENTS")]
    pub agents: Option<usize>,

    /// Total committed moves before the race ends without a winner (minimum 100).
    #[arg(long, env = "TOONRACE_MAX_STEPS")]
    pub max_steps: Option<u64>,

    /// RNG seed; drawn from entropy when omitted.
    #[arg(long, env = "TOONRACE_SEED")]
    pub seed: Option<u64>,

    /// Pause after each agent tick, in milliseconds.
    #[arg(long, env = "TOONRACE_DELAY_MS")]
    pub delay_ms: Option<u64>,

    /// Shooter fire probability per ready tick.
    #[arg(long)]
    pub shoot_chance: Option<f64>,

    /// Shooter cooldown in milliseconds.
    #[arg(long)]
    pub shoot_cooldown: Option<u64>,

    /// Freeze duration of a landed shot, in milliseconds.
    #[arg(long)]
    pub freeze_ms: Option<u64>,

    /// Chaser jump probability when blocked.
    #[arg(long)]
    pub jump_chance: Option<f64>,

    /// Runner bonus-step probability after a move.
    #[arg(long)]
    pub burst_chance: Option<f64>,

    /// Colour board markers.
    #[arg(long, value_enum, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Skip frame output; only print the final summary.
    #[arg(long)]
    pub quiet: bool,

    /// Write the final race summary as JSON to this path.
    #[arg(long, env = "TOONRACE_REPORT")]
    pub report: Option<PathBuf>,
}

impl Cli {
    /// Defaults, then the optional config file, then flags; clamped at the end.
    pub fn race_config(&self) -> Result<RaceConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let raw = fs::read_to_string(path)
                    .with_context(|| format!("failed to read config {}", path.display()))?;
                serde_json::from_str::<RaceConfig>(&raw)
                    .with_context(|| format!("failed to parse config {}", path.display()))?
            }
            None => RaceConfig::default(),
        };

        if let Some(rows) = self.rows {
            config.rows = rows;
        }
        if let Some(cols) = self.cols {
            config.cols = cols;
        }
        if let Some(agents) = self.agents {
            config.agents = agents;
        }
        if let Some(max_steps) = self.max_steps {
            config.max_steps = max_steps;
        }
        if self.seed.is_some() {
            config.rng_seed = self.seed;
        }
        if let Some(delay_ms) = self.delay_ms {
            config.delay_ms = delay_ms;
        }
        if let Some(chance) = self.shoot_chance {
            config.shooter_fire_chance = chance;
        }
        if let Some(cooldown) = self.shoot_cooldown {
            config.shooter_cooldown_ms = cooldown;
        }
        if let Some(freeze_ms) = self.freeze_ms {
            config.freeze_ms = freeze_ms;
        }
        if let Some(chance) = self.jump_chance {
            config.chaser_jump_chance = chance;
        }
        if let Some(chance) = self.burst_chance {
            config.runner_burst_chance = chance;
        }

        Ok(config.sanitized())
    }
}
