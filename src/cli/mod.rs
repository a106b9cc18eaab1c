//! CLI layer for sift.
//!
//! Provides the command-line interface using clap, the validated
//! session [`Options`], and the non-interactive filter mode.

pub mod filter;
pub mod parser;

pub use parser::{Cli, Options};
