//! Plain-text board renderer.

use std::io::{self, Write};

use owo_colors::OwoColorize;
use supports_color::{Stream, on_cached};
use toonrace_core::{FrameSink, GridSnapshot, Outcome, RaceEvent, RaceSummary};
use tracing::warn;

use crate::cli::ColorChoice;

/// Decides whether glyphs get ANSI colours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    enabled: bool,
}

impl Palette {
    #[must_use]
    pub fn from_choice(choice: ColorChoice) -> Self {
        let enabled = match choice {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => on_cached(Stream::Stdout).is_some(),
        };
        Self { enabled }
    }

    #[must_use]
    pub const fn plain() -> Self {
        Self { enabled: false }
    }

    fn paint(&self, glyph: char, out: &mut String) {
        if !self.enabled {
            out.push(glyph);
            return;
        }
        let painted = match glyph {
            'R' => glyph.yellow().bold().to_string(),
            'C' => glyph.red().bold().to_string(),
            'S' => glyph.magenta().bold().to_string(),
            'F' => glyph.green().bold().to_string(),
            '#' => glyph.dimmed().to_string(),
            '|' => glyph.cyan().to_string(),
            _ => glyph.to_string(),
        };
        out.push_str(&painted);
    }
}

/// Writes framed boards, event lines and the final summary to `W`.
pub struct TextRenderer<W> {
    out: W,
    palette: Palette,
}

impl<W: Write> TextRenderer<W> {
    pub fn new(out: W, palette: Palette) -> Self {
        Self { out, palette }
    }

    /// Text of one frame. Pure function of its inputs.
    #[must_use]
    pub fn format_frame(&self, snapshot: &GridSnapshot, events: &[RaceEvent]) -> String {
        let border = format!("+{}+\n", "-".repeat(snapshot.cols));
        let mut text = String::with_capacity((snapshot.cols + 3) * (snapshot.rows + 4));
        text.push_str(&border);
        for row in 0..snapshot.rows {
            text.push('|');
            for &glyph in snapshot.row(row).unwrap_or_default() {
                self.palette.paint(glyph, &mut text);
            }
            text.push_str("|\n");
        }
        text.push_str(&border);
        text.push_str(&format!("steps: {}\n\n", snapshot.total_steps));
        for line in events.iter().filter_map(describe_event) {
            text.push_str(&line);
            text.push_str("\n\n");
        }
        text
    }

    pub fn write_frame(&mut self, snapshot: &GridSnapshot, events: &[RaceEvent]) -> io::Result<()> {
        let text = self.format_frame(snapshot, events);
        self.out.write_all(text.as_bytes())?;
        self.out.flush()
    }

    pub fn write_summary(&mut self, summary: &RaceSummary) -> io::Result<()> {
        writeln!(self.out, "=== Final Summary ===")?;
        for agent in &summary.agents {
            writeln!(
                self.out,
                "{} ({}) steps: {}",
                agent.archetype,
                agent.archetype.marker(),
                agent.steps
            )?;
        }
        match (summary.outcome, summary.winner()) {
            (Outcome::Winner(_), Some(winner)) => writeln!(self.out, "Winner: {}", winner.archetype)?,
            (Outcome::StepCapReached, _) => writeln!(self.out, "No winner (step cap reached)")?,
            _ => writeln!(self.out, "No winner (aborted)")?,
        }
        writeln!(self.out, "seed: {}", summary.seed)?;
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> FrameSink for TextRenderer<W> {
    fn frame(&mut self, snapshot: &GridSnapshot, events: &[RaceEvent]) {
        if let Err(err) = self.write_frame(snapshot, events) {
            warn!(?err, "failed to write frame");
        }
    }
}

/// Log line for events worth announcing; plain moves are only drawn.
fn describe_event(event: &RaceEvent) -> Option<String> {
    match event {
        RaceEvent::Moved { .. } => None,
        RaceEvent::Burst { archetype, to, .. } => Some(format!(
            "[Update] {archetype} bursts to ({},{})",
            to.row, to.col
        )),
        RaceEvent::Jumped { archetype, to, .. } => Some(format!(
            "[Update] {archetype} jumps to ({},{})",
            to.row, to.col
        )),
        RaceEvent::Shot {
            target_archetype,
            frozen_for,
            ..
        } => Some(format!(
            "[Update] Shooter shoots {target_archetype} - frozen for {} ms",
            frozen_for.as_millis()
        )),
        RaceEvent::Won { archetype, .. } => Some(format!("[Update] {archetype} reaches the finish")),
        RaceEvent::StepCapReached { total_steps } => Some(format!(
            "[Update] step cap reached after {total_steps} steps"
        )),
    }
}
