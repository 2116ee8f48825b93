//! Ctrl-C wiring into the race stop signal.

use std::thread;

use anyhow::{Context, Result};
use toonrace_core::StopSignal;
use tracing::{info, warn};

/// Trigger `stop` on the first interrupt. The listener runs on a detached
/// helper thread with its own single-threaded runtime.
pub fn forward_ctrl_c(stop: StopSignal) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build signal runtime")?;

    thread::Builder::new()
        .name("toonrace-signal".to_string())
        .spawn(move || {
            runtime.block_on(async {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        info!("interrupt received; stopping race");
                        stop.trigger();
                    }
                    Err(err) => warn!(?err, "failed to listen for ctrl-c"),
                }
            });
        })
        .context("failed to spawn signal thread")?;
    Ok(())
}
