//! Error taxonomy for the finder.
//!
//! Only unrecoverable errors reach the exit path (exit code 2).
//! Recoverable errors — a failed producer command, history-file I/O —
//! are folded into status strings rendered on the info line and never
//! abort the session.

use thiserror::Error;

/// Process exit code for a successful run with at least one emitted item.
pub const EXIT_OK: i32 = 0;
/// Process exit code when nothing matched.
pub const EXIT_NO_MATCH: i32 = 1;
/// Process exit code for unrecoverable errors.
pub const EXIT_ERROR: i32 = 2;
/// Process exit code for user interrupt (SIGINT/SIGTERM or abort key).
pub const EXIT_INTERRUPT: i32 = 130;

/// Errors produced while validating command-line options.
///
/// These are detected before any thread starts and always map to exit
/// code 2.
#[derive(Debug, Error)]
pub enum OptionsError {
    /// An unknown tie-break criterion was supplied to `--tiebreak`.
    #[error("invalid tiebreak criterion: {0}")]
    Tiebreak(String),

    /// A tie-break criterion was listed twice.
    #[error("duplicate tiebreak criterion: {0}")]
    DuplicateTiebreak(String),

    /// A field range for `--nth` / `--with-nth` could not be parsed.
    #[error("invalid field range expression: {0}")]
    FieldRange(String),

    /// The `--delimiter` regex failed to compile.
    #[error("invalid delimiter regex: {0}")]
    Delimiter(#[from] regex::Error),

    /// `--history` points at a path that cannot be used.
    #[error("invalid history file {path}: {message}")]
    History {
        /// Offending path.
        path: String,
        /// Reason the path was rejected.
        message: String,
    },
}

/// Errors raised by the reader while consuming the producer stream.
///
/// Reader errors terminate the reader but not the program: the failure
/// marker travels with `ReadFin` and matching continues on whatever was
/// already ingested.
#[derive(Debug, Error)]
pub enum ReaderError {
    /// The producer command could not be spawned.
    #[error("command failed: {0}")]
    Spawn(String),

    /// The producer stream failed mid-read.
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the terminal backend. Fatal (exit 2).
#[derive(Debug, Error)]
pub enum TerminalError {
    /// The controlling terminal could not be initialised.
    #[error("failed to initialize terminal: {0}")]
    Init(String),

    /// A backend call failed mid-session.
    #[error("terminal backend error: {0}")]
    Backend(#[from] std::io::Error),
}

/// Errors raised by the admin listener. Per-connection failures are
/// answered over the wire; only bind failures surface here.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listener socket could not be bound.
    #[error("failed to bind listener on port {port}: {source}")]
    Bind {
        /// Requested port.
        port: u16,
        /// Underlying socket error.
        source: std::io::Error,
    },
}

/// Top-level error for the library surface.
#[derive(Debug, Error)]
pub enum Error {
    /// Option validation failed.
    #[error(transparent)]
    Options(#[from] OptionsError),

    /// Terminal initialisation or backend failure.
    #[error(transparent)]
    Terminal(#[from] TerminalError),

    /// Admin listener failure.
    #[error(transparent)]
    Server(#[from] ServerError),

    /// Miscellaneous I/O outside the reader (e.g. writing results).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Maps this error onto the documented process exit code.
    ///
    /// Every unrecoverable error exits 2; recoverable conditions never
    /// become an [`Error`] in the first place.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        EXIT_ERROR
    }
}
