//! Command-line interface for urlharvest.

mod commands;

pub use commands::{is_verbose, run};
