//! The reader actor: streams producer records into the chunk store.
//!
//! Records come from standard input or, when stdin is a TTY, from a
//! child command run under the shell (`$SIFT_DEFAULT_COMMAND`, with a
//! `find` walk as fallback). Each record becomes one item; the reader
//! posts coalesced `ReadNew` notifications at whatever rate the
//! producer sustains and exactly one `ReadFin` at end-of-stream. A
//! producer failure terminates the reader but not the program: the
//! failure marker rides on `ReadFin` and matching continues over what
//! was already ingested.

use std::io::{BufRead, BufReader};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread::JoinHandle;

use tracing::{debug, warn};

use crate::chunk::ChunkStore;
use crate::error::ReaderError;
use crate::event::{CoreEvent, EventBox, EventType};

/// Producer command used when stdin is a TTY and the environment does
/// not specify one.
pub const DEFAULT_COMMAND: &str =
    r#"find * -path "*/\.*" -prune -o -type f -print -o -type l -print 2> /dev/null"#;

/// Environment variable overriding [`DEFAULT_COMMAND`].
pub const DEFAULT_COMMAND_ENV: &str = "SIFT_DEFAULT_COMMAND";

/// Streams records into a [`ChunkStore`].
pub struct Reader {
    store: Arc<ChunkStore>,
    out: Arc<EventBox<EventType, CoreEvent>>,
    delimiter: u8,
}

impl Reader {
    /// Creates a reader splitting records on newline, or on NUL when
    /// `read0` is set.
    #[must_use]
    pub fn new(store: Arc<ChunkStore>, out: Arc<EventBox<EventType, CoreEvent>>, read0: bool) -> Self {
        Self {
            store,
            out,
            delimiter: if read0 { b'\0' } else { b'\n' },
        }
    }

    /// Spawns the reader over standard input.
    #[must_use]
    pub fn start_stdin(self) -> JoinHandle<()> {
        spawn_named("sift-reader", move || {
            let result = self.consume(std::io::stdin().lock());
            self.finish(result.err().map(|e| e.to_string()));
        })
    }

    /// Spawns the reader over the stdout of `command` run under `sh`.
    #[must_use]
    pub fn start_command(self, command: String) -> JoinHandle<()> {
        spawn_named("sift-reader", move || {
            debug!(command = command.as_str(), "spawning producer");
            let child = Command::new("sh")
                .arg("-c")
                .arg(&command)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::null())
                .spawn();
            let mut child = match child {
                Ok(child) => child,
                Err(e) => {
                    warn!(error = %e, "producer spawn failed");
                    self.finish(Some(ReaderError::Spawn(e.to_string()).to_string()));
                    return;
                }
            };
            let failure = match child.stdout.take() {
                Some(stdout) => self.consume(BufReader::new(stdout)).err().map(|e| e.to_string()),
                None => Some(ReaderError::Spawn("no pipe from producer".to_string()).to_string()),
            };
            let failure = failure.or_else(|| match child.wait() {
                Ok(status) if status.success() => None,
                Ok(status) => Some(format!("command failed: {status}")),
                Err(e) => Some(format!("command failed: {e}")),
            });
            self.finish(failure);
        })
    }

    /// Reads records until end-of-stream, pushing each into the store.
    /// Returns the number of accepted records.
    pub(crate) fn consume(&self, mut input: impl BufRead) -> Result<usize, ReaderError> {
        let mut buf: Vec<u8> = Vec::with_capacity(256);
        let mut accepted = 0usize;
        loop {
            buf.clear();
            let n = read_record(&mut input, self.delimiter, &mut buf)?;
            if n == 0 {
                break;
            }
            strip_terminator(&mut buf, self.delimiter);
            if self.store.push(&buf) {
                accepted += 1;
                self.out.set(EventType::ReadNew, CoreEvent::Notify);
            }
        }
        Ok(accepted)
    }

    fn finish(&self, failure: Option<String>) {
        if let Some(ref message) = failure {
            warn!(message = message.as_str(), "producer finished with failure");
        } else {
            debug!(count = self.store.count(), "producer finished");
        }
        self.out
            .set(EventType::ReadFin, CoreEvent::ReadFinished { failure });
    }
}

/// Resolves the producer command for TTY sessions.
#[must_use]
pub fn default_command() -> String {
    match std::env::var(DEFAULT_COMMAND_ENV) {
        Ok(cmd) if !cmd.is_empty() => cmd,
        _ => DEFAULT_COMMAND.to_string(),
    }
}

fn spawn_named(name: &str, f: impl FnOnce() + Send + 'static) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name(name.to_string())
        .spawn(f)
        .unwrap_or_else(|_| std::process::abort())
}

fn read_record(input: &mut impl BufRead, delimiter: u8, buf: &mut Vec<u8>) -> Result<usize, ReaderError> {
    let n = input.read_until(delimiter, buf)?;
    Ok(n)
}

/// Drops the trailing delimiter, and a CR preceding a newline.
fn strip_terminator(buf: &mut Vec<u8>, delimiter: u8) {
    if buf.last() == Some(&delimiter) {
        buf.pop();
        if delimiter == b'\n' && buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
}

/// Adapter exposing raw bytes as `BufRead` for tests and filter mode.
pub(crate) fn reader_over(bytes: Vec<u8>) -> impl BufRead {
    BufReader::new(std::io::Cursor::new(bytes))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::item::ItemBuilder;

    fn setup() -> (Arc<ChunkStore>, Arc<EventBox<EventType, CoreEvent>>) {
        (
            Arc::new(ChunkStore::new(ItemBuilder::new())),
            Arc::new(EventBox::new()),
        )
    }

    fn texts(store: &ChunkStore) -> Vec<String> {
        store
            .snapshot()
            .chunks
            .iter()
            .flat_map(|c| c.items().iter().map(|i| i.text().to_string()))
            .collect()
    }

    #[test]
    fn test_consume_newline_records() {
        let (store, out) = setup();
        let reader = Reader::new(Arc::clone(&store), out, false);
        let n = reader
            .consume(reader_over(b"alpha\nbeta\ngamma".to_vec()))
            .unwrap_or_else(|e| panic!("consume failed: {e}"));
        assert_eq!(n, 3);
        assert_eq!(texts(&store), vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn test_consume_strips_carriage_returns() {
        let (store, out) = setup();
        let reader = Reader::new(Arc::clone(&store), out, false);
        let _ = reader
            .consume(reader_over(b"one\r\ntwo\r\n".to_vec()))
            .unwrap_or_else(|e| panic!("consume failed: {e}"));
        assert_eq!(texts(&store), vec!["one", "two"]);
    }

    #[test]
    fn test_consume_nul_delimited_keeps_newlines() {
        let (store, out) = setup();
        let reader = Reader::new(Arc::clone(&store), out, true);
        let _ = reader
            .consume(reader_over(b"multi\nline\0second\0".to_vec()))
            .unwrap_or_else(|e| panic!("consume failed: {e}"));
        assert_eq!(texts(&store), vec!["multi\nline", "second"]);
    }

    #[test]
    fn test_consume_posts_read_new() {
        let (store, out) = setup();
        let reader = Reader::new(store, Arc::clone(&out), false);
        let _ = reader
            .consume(reader_over(b"a\nb\n".to_vec()))
            .unwrap_or_else(|e| panic!("consume failed: {e}"));
        // Coalesced: at least the latest notification is pending.
        assert!(out.peek(EventType::ReadNew));
    }

    #[test]
    fn test_finish_posts_read_fin_with_failure() {
        let (store, out) = setup();
        let reader = Reader::new(store, Arc::clone(&out), false);
        reader.finish(Some("command failed: exit status: 1".to_string()));
        match out.try_take(EventType::ReadFin) {
            Some(CoreEvent::ReadFinished { failure: Some(msg) }) => {
                assert!(msg.contains("command failed"));
            }
            _ => panic!("expected ReadFin with failure"),
        }
    }

    #[test]
    fn test_default_command_env_override() {
        // Guard: the fallback is used when the variable is absent.
        if std::env::var(DEFAULT_COMMAND_ENV).is_err() {
            assert_eq!(default_command(), DEFAULT_COMMAND);
        }
    }
}
