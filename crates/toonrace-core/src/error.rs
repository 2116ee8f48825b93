use thiserror::Error;

use crate::agent::Archetype;

/// Failures of the thread plumbing around a race. Moves themselves never error.
#[derive(Debug, Error)]
pub enum RaceError {
    /// The OS refused to start a worker thread.
    #[error("failed to spawn worker thread for {archetype}")]
    Spawn {
        archetype: Archetype,
        #[source]
        source: std::io::Error,
    },
    /// A worker thread panicked before it could be joined cleanly.
    #[error("worker thread for {archetype} panicked")]
    WorkerPanicked { archetype: Archetype },
}
