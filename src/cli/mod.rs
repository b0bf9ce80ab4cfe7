//! Command-line surface
//!
//! Argument structures live in [`args`], the per-command implementations in
//! [`commands`], and [`router`] connects the two.

pub mod args;
pub mod commands;
pub mod context;
pub mod router;

pub use args::{Cli, Commands};
pub use context::CommandContext;
pub use router::execute_command;
