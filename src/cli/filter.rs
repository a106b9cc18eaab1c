//! Non-interactive filter mode (`--filter`).
//!
//! Runs one synchronous pass of the engine — read everything, match
//! once, print ranked results — without touching the terminal. This is
//! the pipeline-friendly twin of the interactive session and shares
//! the sequential match kernel with the parallel scanner.

use std::io::BufRead;
use std::sync::Arc;

use crate::chunk::ChunkStore;
use crate::error::{EXIT_NO_MATCH, EXIT_OK, Result};
use crate::event::EventBox;
use crate::item::MatchedItem;
use crate::matcher::{MatcherConfig, match_chunk_items};
use crate::pattern::{MatchScratch, Pattern};
use crate::reader::Reader;

use super::Options;

/// Reads all records from `input`, matches them against the filter
/// query, and returns the ranked output lines plus the exit code.
pub fn run(options: &Options, query: &str, input: impl BufRead) -> Result<(Vec<String>, i32)> {
    let store = Arc::new(ChunkStore::new(options.item_builder()));
    let sink = Arc::new(EventBox::new());
    let reader = Reader::new(Arc::clone(&store), sink, options.read0);
    reader
        .consume(input)
        .map_err(|e| std::io::Error::other(e.to_string()))?;

    let pattern = Pattern::build(&options.pattern_config, query);
    let config = MatcherConfig {
        criteria: options.criteria.clone(),
        tac: options.tac,
    };
    let snapshot = store.snapshot();
    let mut scratch = MatchScratch::default();
    let mut matched: Vec<MatchedItem> = Vec::new();
    for chunk in &snapshot.chunks {
        matched.extend(match_chunk_items(chunk, &pattern, &config, &mut scratch));
    }

    if options.sort {
        matched.sort_unstable();
    } else if options.tac {
        matched.reverse();
    }

    let lines: Vec<String> = matched.iter().map(|m| m.item.text().to_string()).collect();
    let code = if lines.is_empty() { EXIT_NO_MATCH } else { EXIT_OK };
    Ok((lines, code))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Cursor;

    fn options(args: &[&str]) -> Options {
        let cli = super::super::Cli::parse_from(std::iter::once(&"sift").chain(args));
        Options::from_cli(&cli).unwrap_or_else(|e| panic!("options rejected: {e}"))
    }

    fn filter(args: &[&str], query: &str, input: &str) -> (Vec<String>, i32) {
        run(&options(args), query, Cursor::new(input.as_bytes().to_vec()))
            .unwrap_or_else(|e| panic!("filter failed: {e}"))
    }

    #[test]
    fn test_filter_ranks_matches() {
        let (lines, code) = filter(&[], "abc", "abc\nxaxbxc\nnothing\na b c\n");
        assert_eq!(code, EXIT_OK);
        // The tight match outranks the scattered ones.
        assert_eq!(lines[0], "abc");
        assert_eq!(lines.len(), 3);
        assert!(!lines.contains(&"nothing".to_string()));
    }

    #[test]
    fn test_filter_no_match_exit_code() {
        let (lines, code) = filter(&[], "zzz", "aaa\nbbb\n");
        assert!(lines.is_empty());
        assert_eq!(code, EXIT_NO_MATCH);
    }

    #[test]
    fn test_filter_no_sort_keeps_input_order() {
        let (lines, _) = filter(&["--no-sort"], "a", "apple z\nlater a\nabc\n");
        assert_eq!(lines, vec!["apple z", "later a", "abc"]);
    }

    #[test]
    fn test_filter_no_sort_tac_reverses() {
        let (lines, _) = filter(&["--no-sort", "--tac"], "a", "a1\na2\na3\n");
        assert_eq!(lines, vec!["a3", "a2", "a1"]);
    }

    #[test]
    fn test_filter_extended_query() {
        let (lines, _) = filter(&[], "apple !tart", "apple pie\napple tart\nbanana pie\n");
        assert_eq!(lines, vec!["apple pie"]);
    }

    #[test]
    fn test_filter_nth_scope() {
        let (lines, _) = filter(&["--nth", "2"], "beta", "alpha beta\nbeta alpha\n");
        assert_eq!(lines, vec!["alpha beta"]);
    }

    #[test]
    fn test_filter_read0() {
        let (lines, _) = filter(&["--read0"], "two", "one\0two words\0");
        assert_eq!(lines, vec!["two words"]);
    }
}
