//! CLI module for the incident-graph command-line interface.
//!
//! Command handlers live in `commands`; `output` formats their results as
//! JSON or human-readable text.

mod commands;
mod output;

pub use commands::*;
