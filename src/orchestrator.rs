//! The global coordinator: wires the actors together and runs the
//! session's main loop.
//!
//! The coordinator owns the pattern cache and arbitrates between the
//! reader, the matcher, and the terminal: read notifications and query
//! changes both become matcher resets (cancelling in-flight work only
//! for query changes), progress and completion events flow to the
//! terminal, and a `Quit` event ends the session. While the reader is
//! still producing, the loop debounces with an adaptive delay so bulk
//! ingestion repaints at roughly 10 Hz instead of per line — unless a
//! `SearchNew` is pending, because the user is typing.

use std::collections::HashMap;
use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use signal_hook::consts::{SIGCONT, SIGINT, SIGTERM, SIGWINCH};
use signal_hook::iterator::Signals;
use tracing::{debug, warn};

use crate::chunk::ChunkStore;
use crate::cli::Options;
use crate::error::Result;
use crate::event::{CoreEvent, EventBox, EventType};
use crate::matcher::{Matcher, MatcherConfig};
use crate::pattern::PatternCache;
use crate::reader::{Reader, default_command};
use crate::server;
use crate::term::backend_pair;
use crate::terminal::{TermConfig, TermOutput, Terminal};

/// Debounce step per consecutive read tick.
const COORDINATOR_DELAY_STEP: Duration = Duration::from_millis(10);
/// Debounce ceiling (~10 Hz refresh during bulk reads).
const COORDINATOR_DELAY_MAX: Duration = Duration::from_millis(100);

/// Runs one interactive session to completion.
///
/// Spawns the reader, the matcher, the terminal loops, the signal
/// watcher, and (when configured) the admin listener, then coordinates
/// them until the user accepts or aborts.
pub fn run(options: Options) -> Result<TermOutput> {
    let global: Arc<EventBox<EventType, CoreEvent>> = Arc::new(EventBox::new());
    let store = Arc::new(ChunkStore::new(options.item_builder()));

    let matcher = Matcher::new(
        MatcherConfig {
            criteria: options.criteria.clone(),
            tac: options.tac,
        },
        Arc::clone(&global),
    )?;
    let _matcher_handle = matcher.start();

    let reader = Reader::new(Arc::clone(&store), Arc::clone(&global), options.read0);
    let _reader_handle = if std::io::stdin().is_terminal() {
        reader.start_command(default_command())
    } else {
        reader.start_stdin()
    };

    let terminal = Terminal::new(
        TermConfig {
            prompt: options.prompt.clone(),
            multi: options.multi,
            expect: options.expect.clone(),
            initial_query: options.query.clone(),
            history: options.history(),
        },
        Arc::clone(&global),
    );

    let (mut screen, events) = backend_pair();
    let _input_handle = terminal.start_input_loop(Box::new(events));
    let painter = Arc::clone(&terminal);
    let paint_handle = std::thread::Builder::new()
        .name("sift-paint".to_string())
        .spawn(move || painter.run_paint_loop(&mut screen))
        .unwrap_or_else(|_| std::process::abort());

    spawn_signal_watcher(&terminal);

    if let Some(port) = options.listen {
        match server::start(port, Arc::clone(&terminal)) {
            Ok((bound, _handle)) => debug!(port = bound, "admin listener started"),
            Err(e) => warn!(error = %e, "admin listener failed to start"),
        }
    }

    coordinate(&options, &global, &store, &matcher, &terminal);

    match paint_handle.join() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => warn!("paint loop panicked"),
    }
    Ok(terminal.take_output())
}

/// The coordinator loop proper.
fn coordinate(
    options: &Options,
    global: &EventBox<EventType, CoreEvent>,
    store: &ChunkStore,
    matcher: &Matcher,
    terminal: &Terminal,
) {
    let mut patterns = PatternCache::new(options.pattern_config.clone());
    let mut reading = true;
    let mut final_checked = false;
    let mut read_ticks: u32 = 0;

    loop {
        let events: HashMap<EventType, CoreEvent> =
            global.wait(|events| events.drain().collect());

        let mut reset_needed = false;
        let mut cancel = false;
        let mut saw_read = false;
        for (event_type, payload) in events {
            match (event_type, payload) {
                (EventType::ReadNew, _) => {
                    saw_read = true;
                    reset_needed = true;
                }
                (EventType::ReadFin, CoreEvent::ReadFinished { failure }) => {
                    reading = false;
                    if failure.is_some() {
                        terminal.set_failure(failure);
                    }
                    reset_needed = true;
                }
                (EventType::SearchNew, _) => {
                    reset_needed = true;
                    cancel = true;
                }
                (EventType::SearchProgress, CoreEvent::Progress(fraction)) => {
                    terminal.set_progress(fraction);
                }
                (EventType::SearchFin, CoreEvent::SearchFinished(merger)) => {
                    let is_final = merger.is_final();
                    let matched = merger.len();
                    terminal.set_merger(merger);
                    if is_final && !final_checked {
                        final_checked = true;
                        if options.exit_0 && matched == 0 {
                            terminal.exit_no_match();
                        } else if options.select_1 && matched == 1 {
                            terminal.auto_accept();
                        }
                    }
                }
                (EventType::Quit, CoreEvent::Quit(code)) => {
                    debug!(code, "coordinator quitting");
                    return;
                }
                _ => {}
            }
        }

        if reset_needed {
            let snapshot = store.snapshot();
            terminal.set_count(snapshot.count, reading);
            let pattern = patterns.get(&terminal.query());
            matcher.reset(snapshot, pattern, !reading, options.sort, cancel);
        }

        // Adaptive latency: debounce bulk reads, but never while the
        // user is typing. Notifications landing during the sleep
        // coalesce into a single pending event, so one reset covers
        // the whole burst.
        if saw_read && reading && !global.peek(EventType::SearchNew) {
            read_ticks += 1;
            std::thread::sleep(COORDINATOR_DELAY_MAX.min(COORDINATOR_DELAY_STEP * read_ticks));
        } else {
            read_ticks = 0;
        }
    }
}

fn spawn_signal_watcher(terminal: &Arc<Terminal>) {
    let Ok(mut signals) = Signals::new([SIGWINCH, SIGINT, SIGTERM, SIGCONT]) else {
        warn!("signal watcher unavailable");
        return;
    };
    let terminal = Arc::clone(terminal);
    let _ = std::thread::Builder::new()
        .name("sift-signals".to_string())
        .spawn(move || {
            for signal in signals.forever() {
                match signal {
                    SIGWINCH => terminal.request_redraw(),
                    SIGCONT => terminal.request_reinit(),
                    SIGINT | SIGTERM => terminal.abort(),
                    _ => {}
                }
            }
        });
}
