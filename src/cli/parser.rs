//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros, plus the
//! resolved [`Options`] the engine actually consumes. All value
//! validation (tie-break lists, field ranges, delimiter regexes)
//! happens in [`Options::from_cli`] before any thread starts; failures
//! exit with code 2.

use clap::Parser;
use std::path::PathBuf;

use crate::error::OptionsError;
use crate::field::{Delimiter, FieldRange};
use crate::history::{DEFAULT_HISTORY_SIZE, History};
use crate::item::{ItemBuilder, RankCriteria};
use crate::pattern::{Case, PatternConfig};

/// sift: an interactive fuzzy finder.
///
/// Reads candidate lines from standard input (or a producer command
/// when stdin is a terminal), matches them against a live query, and
/// prints the selection on exit.
#[derive(Parser, Debug)]
#[command(name = "sift")]
#[command(version, about, long_about = None)]
#[command(after_help = r#"Examples:
  find . -type f | sift                     # Pick a file
  sift --multi --print0 | xargs -0 rm       # Pick several, NUL-safe
  git log --oneline | sift --no-sort        # Keep input order
  ps aux | sift --nth 11.. --multi          # Match on the command only
  sift --filter "src spec" < files.txt      # Non-interactive filtering
  sift --listen 6266 &                      # Drive via curl localhost:6266
"#)]
pub struct Cli {
    /// Initial query string.
    #[arg(short = 'q', long, default_value = "")]
    pub query: String,

    /// Filter mode: print matches for the query and exit (no TTY).
    #[arg(short = 'f', long)]
    pub filter: Option<String>,

    /// Enable multi-select (tab / shift-tab toggle).
    #[arg(short = 'm', long)]
    pub multi: bool,

    /// Do not sort the result; keep input order.
    #[arg(long)]
    pub no_sort: bool,

    /// Reverse the input order (newest lines first).
    #[arg(long)]
    pub tac: bool,

    /// Comma-separated tie-break criteria: score, length, begin, end,
    /// index.
    #[arg(long, default_value = "score")]
    pub tiebreak: String,

    /// Exact-match mode (fuzzy off; quote a term to re-enable).
    #[arg(short = 'e', long)]
    pub exact: bool,

    /// Disable extended-search syntax (the query is one term).
    #[arg(long)]
    pub no_extended: bool,

    /// Case-insensitive matching.
    #[arg(short = 'i', long, conflicts_with = "respect_case")]
    pub ignore_case: bool,

    /// Case-sensitive matching (default: smart case).
    #[arg(long)]
    pub respect_case: bool,

    /// Normalize latin diacritics before matching.
    #[arg(long)]
    pub normalize: bool,

    /// Restrict matching to these fields (e.g. "2,-1", "3..").
    #[arg(short = 'n', long)]
    pub nth: Option<String>,

    /// Restrict display to these fields.
    #[arg(long)]
    pub with_nth: Option<String>,

    /// Field delimiter: a literal string or a regex (default: AWK
    /// style).
    #[arg(short = 'd', long)]
    pub delimiter: Option<String>,

    /// Read input delimited by NUL instead of newline.
    #[arg(long)]
    pub read0: bool,

    /// Print output delimited by NUL instead of newline.
    #[arg(long)]
    pub print0: bool,

    /// Parse ANSI color codes in the input.
    #[arg(long)]
    pub ansi: bool,

    /// Comma-separated keys that accept and are reported on the first
    /// output line (e.g. "ctrl-o,f1").
    #[arg(long)]
    pub expect: Option<String>,

    /// Print the final query as the first output line.
    #[arg(long)]
    pub print_query: bool,

    /// Automatically select the only match once reading finishes.
    #[arg(short = '1', long = "select-1")]
    pub select_1: bool,

    /// Exit with code 1 when nothing matches once reading finishes.
    #[arg(short = '0', long = "exit-0")]
    pub exit_0: bool,

    /// Prompt string.
    #[arg(long, default_value = "> ")]
    pub prompt: String,

    /// History file; enables ctrl-p / ctrl-n history navigation.
    #[arg(long, env = "SIFT_HISTORY")]
    pub history: Option<PathBuf>,

    /// Maximum number of history entries kept.
    #[arg(long, default_value_t = DEFAULT_HISTORY_SIZE)]
    pub history_size: usize,

    /// Serve the HTTP admin endpoint on this localhost port.
    #[arg(long)]
    pub listen: Option<u16>,
}

/// Validated session options.
#[derive(Debug, Clone)]
pub struct Options {
    /// Pattern grammar and case configuration.
    pub pattern_config: PatternConfig,
    /// Tie-break criteria.
    pub criteria: Vec<RankCriteria>,
    /// Reverse the index tie-breaker.
    pub tac: bool,
    /// Rank-sort results.
    pub sort: bool,
    /// Multi-select mode.
    pub multi: bool,
    /// NUL-delimited input.
    pub read0: bool,
    /// NUL-delimited output.
    pub print0: bool,
    /// ANSI stripping.
    pub ansi: bool,
    /// Field delimiter.
    pub delimiter: Delimiter,
    /// `--nth` match scope.
    pub nth: Vec<FieldRange>,
    /// `--with-nth` display scope.
    pub with_nth: Vec<FieldRange>,
    /// Accepting key names.
    pub expect: Vec<String>,
    /// Print the query first.
    pub print_query: bool,
    /// Auto-select a sole match.
    pub select_1: bool,
    /// Exit 1 on an empty final result.
    pub exit_0: bool,
    /// Prompt string.
    pub prompt: String,
    /// Initial query.
    pub query: String,
    /// Filter-mode query.
    pub filter: Option<String>,
    /// Admin listener port.
    pub listen: Option<u16>,
    /// History file.
    pub history_path: Option<PathBuf>,
    /// History cap.
    pub history_size: usize,
}

impl Options {
    /// Validates raw CLI values into session options.
    pub fn from_cli(cli: &Cli) -> Result<Self, OptionsError> {
        let criteria = RankCriteria::parse_list(&cli.tiebreak)?;
        // Anchoring the tie-break on the match end flips the preferred
        // scan direction.
        let forward = criteria.first() != Some(&RankCriteria::End);
        let case = if cli.ignore_case {
            Case::Ignore
        } else if cli.respect_case {
            Case::Respect
        } else {
            Case::Smart
        };
        let delimiter = match cli.delimiter.as_deref() {
            Some(raw) => Delimiter::parse(raw)?,
            None => Delimiter::AwkStyle,
        };
        let nth = match cli.nth.as_deref() {
            Some(raw) => FieldRange::parse_list(raw)?,
            None => Vec::new(),
        };
        let with_nth = match cli.with_nth.as_deref() {
            Some(raw) => FieldRange::parse_list(raw)?,
            None => Vec::new(),
        };
        let expect = cli
            .expect
            .as_deref()
            .map(|raw| {
                raw.split(',')
                    .map(|k| k.trim().to_lowercase())
                    .filter(|k| !k.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        if let Some(ref path) = cli.history
            && path.as_os_str().is_empty()
        {
            return Err(OptionsError::History {
                path: path.display().to_string(),
                message: "empty path".to_string(),
            });
        }

        Ok(Self {
            pattern_config: PatternConfig {
                extended: !cli.no_extended,
                fuzzy: !cli.exact,
                case,
                normalize: cli.normalize,
                forward,
            },
            criteria,
            tac: cli.tac,
            sort: !cli.no_sort,
            multi: cli.multi,
            read0: cli.read0,
            print0: cli.print0,
            ansi: cli.ansi,
            delimiter,
            nth,
            with_nth,
            expect,
            print_query: cli.print_query,
            select_1: cli.select_1,
            exit_0: cli.exit_0,
            prompt: cli.prompt.clone(),
            query: cli.query.clone(),
            filter: cli.filter.clone(),
            listen: cli.listen,
            history_path: cli.history.clone(),
            history_size: cli.history_size,
        })
    }

    /// Builds the item builder for this configuration.
    #[must_use]
    pub fn item_builder(&self) -> ItemBuilder {
        ItemBuilder::new()
            .ansi(self.ansi)
            .delimiter(self.delimiter.clone())
            .nth(self.nth.clone())
            .with_nth(self.with_nth.clone())
    }

    /// Loads the configured history, if any.
    #[must_use]
    pub fn history(&self) -> Option<History> {
        self.history_path
            .as_ref()
            .map(|path| History::load(path.clone(), self.history_size))
    }

    /// The output record terminator.
    #[must_use]
    pub const fn output_delimiter(&self) -> u8 {
        if self.print0 { b'\0' } else { b'\n' }
    }
}
