use std::io;

use anyhow::{Context, Result};
use clap::Parser;
use toonrace_app::{Cli, Palette, TextRenderer, report, signal};
use toonrace_core::{FrameSink, NullSink, Race, StopSignal};
use tracing::info;

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = cli.race_config()?;
    let palette = Palette::from_choice(cli.color);

    let sink: Box<dyn FrameSink> = if cli.quiet {
        Box::new(NullSink)
    } else {
        Box::new(TextRenderer::new(io::stdout(), palette))
    };

    let stop = StopSignal::new();
    signal::forward_ctrl_c(stop.clone())?;

    let race = Race::new(config, sink, stop);
    info!(seed = race.seed(), "Starting Toon Race");
    let summary = race.run().context("race did not complete")?;

    TextRenderer::new(io::stdout().lock(), palette)
        .write_summary(&summary)
        .context("failed to print summary")?;

    if let Some(path) = &cli.report {
        report::write_report(path, &summary)?;
        info!(path = %path.display(), "race report written");
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .try_init();
}
