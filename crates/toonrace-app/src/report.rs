//! JSON export of the final race summary.

use std::fs::{self, File};
use std::path::Path;

use anyhow::{Context, Result};
use toonrace_core::RaceSummary;

/// Write `summary` as pretty JSON, creating parent directories as needed.
pub fn write_report(path: &Path, summary: &RaceSummary) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let file = File::create(path)
        .with_context(|| format!("failed to create report {}", path.display()))?;
    serde_json::to_writer_pretty(file, summary).context("failed to serialize race report")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use toonrace_core::{AgentId, AgentSummary, Archetype, Outcome, Position};

    #[test]
    fn report_round_trips_through_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("race.json");
        let summary = RaceSummary {
            seed: 42,
            outcome: Outcome::Winner(AgentId(1)),
            total_steps: 3,
            agents: vec![AgentSummary {
                id: AgentId(1),
                archetype: Archetype::Chaser,
                steps: 3,
                position: Position::new(4, 18),
            }],
        };
        write_report(&path, &summary).expect("write report");

        let raw = fs::read_to_string(&path).expect("read report");
        let parsed: RaceSummary = serde_json::from_str(&raw).expect("parse report");
        assert_eq!(parsed, summary);
        assert!(raw.contains("\"kind\": \"winner\""));
    }
}
