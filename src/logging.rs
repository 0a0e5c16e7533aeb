//! Logging setup and the event sink handed to core components.
//!
//! The binary installs an `env_logger` backend once at startup. Library
//! components never reach for that global logger on their own: they are
//! given an [`EventSink`] and report through it. [`LogSink`] forwards to the
//! `log` facade, [`MemorySink`] keeps events in memory for tests.
//!
//! Level selection when initialising:
//!
//! 1. `RUST_LOG` environment variable (if set)
//! 2. `--quiet` (errors only) or `-v`/`-vv` (debug/trace)
//! 3. Default: info

use env_logger::Builder;
use log::{Level, LevelFilter};
use std::env;
use std::io::Write;
use std::sync::{Arc, Mutex};

/// Destination for messages emitted by the scanner, finder, organizer and
/// filesystem backends.
pub trait EventSink: Send + Sync {
    fn emit(&self, level: Level, message: &str);

    fn debug(&self, message: &str) {
        self.emit(Level::Debug, message);
    }

    fn info(&self, message: &str) {
        self.emit(Level::Info, message);
    }

    fn warn(&self, message: &str) {
        self.emit(Level::Warn, message);
    }

    fn error(&self, message: &str) {
        self.emit(Level::Error, message);
    }
}

/// Forwards events to the `log` facade under a fixed target.
#[derive(Debug, Clone, Copy)]
pub struct LogSink {
    target: &'static str,
}

impl LogSink {
    pub fn new(target: &'static str) -> Self {
        Self { target }
    }

    /// Convenience for the common `Arc<dyn EventSink>` form.
    pub fn shared(target: &'static str) -> Arc<dyn EventSink> {
        Arc::new(Self::new(target))
    }
}

impl EventSink for LogSink {
    fn emit(&self, level: Level, message: &str) {
        log::log!(target: self.target, level, "{}", message);
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _level: Level, _message: &str) {}
}

/// Records events so tests can assert on what was reported.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<(Level, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far.
    pub fn events(&self) -> Vec<(Level, String)> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// All messages joined by newlines, handy for `contains` checks.
    pub fn text(&self) -> String {
        self.events()
            .into_iter()
            .map(|(_, message)| message)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl EventSink for MemorySink {
    fn emit(&self, level: Level, message: &str) {
        if let Ok(mut events) = self.events.lock() {
            events.push((level, message.to_string()));
        }
    }
}

/// Initialize the `env_logger` backend from CLI verbosity flags.
///
/// Must be called at most once per process.
pub fn init_logging(verbose: u8, quiet: bool) {
    let mut builder = Builder::new();

    if env::var("RUST_LOG").is_ok() {
        builder.parse_default_env();
    } else {
        builder.filter_level(determine_level(verbose, quiet));
    }

    builder.format(move |buf, record| {
        let level = record.level();
        let style = buf.default_level_style(level);
        if verbose >= 1 {
            writeln!(
                buf,
                "{style}{:<5}{style:#} [{}] {}",
                level,
                record.target(),
                record.args()
            )
        } else {
            writeln!(buf, "{style}{:<5}{style:#} {}", level, record.args())
        }
    });

    builder.init();
    log::debug!("Logging initialized at level: {:?}", log::max_level());
}

fn determine_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}
