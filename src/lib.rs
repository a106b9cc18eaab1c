//! sift: an interactive fuzzy finder.
//!
//! The crate is a concurrent search engine binding four long-lived
//! actors: a [`reader`] that streams candidate lines from a pipe or a
//! child command into the [`chunk::ChunkStore`], a parallel
//! [`matcher`] that filters and ranks snapshots of the store against a
//! live [`pattern::Pattern`], and a [`terminal`] that owns the query,
//! the selection, and the redraw loop. The actors communicate through
//! coalescing, condition-variable-backed [`event::EventBox`] mailboxes
//! and cooperate on cancellation through a single atomic flag checked
//! at chunk boundaries.
//!
//! Interactive sessions are driven by [`orchestrator::run`]; the
//! non-interactive `--filter` pipeline mode lives in [`cli::filter`].

pub mod algo;
pub mod ansi;
pub mod chunk;
pub mod cli;
pub mod error;
pub mod event;
pub mod field;
pub mod history;
pub mod item;
pub mod matcher;
pub mod orchestrator;
pub mod pattern;
pub mod reader;
pub mod server;
pub mod term;
pub mod terminal;

pub use cli::{Cli, Options};
pub use error::{Error, Result};
pub use terminal::{Outcome, TermOutput};
