//! Tooling
//!
//! Command-line front end for inspecting a lazy tree: page lookups through the
//! tiers, visible-range rendering, expansion and scroll simulation.

pub mod cli;

pub use cli::{Cli, CliContext, Commands, OutputFormat};
