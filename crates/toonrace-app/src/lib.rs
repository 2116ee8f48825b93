//! Terminal front-end plumbing for Toon Race: CLI, rendering, signals and reports.

pub mod cli;
pub mod render;
pub mod report;
pub mod signal;

pub use cli::{Cli, ColorChoice};
pub use render::{Palette, TextRenderer};
