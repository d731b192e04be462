//! Command-line interface definitions and handlers for the paperdex CLI.

pub mod args;
pub mod build;
pub mod inspect;
pub mod validate;

pub use args::{Cli, Commands, InspectCommands};
