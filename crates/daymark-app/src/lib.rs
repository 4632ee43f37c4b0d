//! Command layer for daymark.
//!
//! This crate turns `(CommandKind, arguments)` pairs coming from a front end
//! into validated commands, runs them against the journaled database and
//! reports the outcome as a presentation-agnostic [`Response`].

pub mod command;
/// Configuration loaded from the data directory.
pub mod config;
pub mod engine;
pub mod error;
pub mod render;
pub mod response;

// Re-exports for convenience
pub use command::{Command, CommandKind, ViewScope, parse_instant, parse_when};
pub use config::{ClockStyle, DisplayConfig, JournalConfig, ProjectConfig};
pub use engine::Engine;
pub use error::CommandError;
pub use render::{describe_when, format_instant, render_table, truncate_with_ellipsis};
pub use response::Response;
