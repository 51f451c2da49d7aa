//! Tooling & Integration Layer
//!
//! CLI entry points over the coordination runtime.

pub mod cli;

pub use cli::{Cli, CliContext, Commands};
