//! Event notification seam.
//!
//! Components report through an injected [`Notifier`] rather than a global
//! emitter, so tests can capture events and the binary can route them to the
//! tracing subscriber.

use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Fatal,
}

pub trait Notifier: Send + Sync {
    fn notify(&self, level: Level, message: &str);

    fn debug(&self, message: &str) {
        self.notify(Level::Debug, message);
    }
    fn info(&self, message: &str) {
        self.notify(Level::Info, message);
    }
    fn warn(&self, message: &str) {
        self.notify(Level::Warn, message);
    }
    fn fatal(&self, message: &str) {
        self.notify(Level::Fatal, message);
    }
}

/// Routes events to the `tracing` subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, level: Level, message: &str) {
        match level {
            Level::Debug => tracing::debug!("{message}"),
            Level::Info => tracing::info!("{message}"),
            Level::Warn => tracing::warn!("{message}"),
            Level::Fatal => tracing::error!("{message}"),
        }
    }
}

/// Captures events in memory for assertions.
#[derive(Debug, Default)]
pub struct CapturingNotifier {
    events: Mutex<Vec<(Level, String)>>,
}

impl CapturingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(Level, String)> {
        self.events.lock().expect("notifier lock").clone()
    }

    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.events()
            .iter()
            .any(|(l, m)| *l == level && m.contains(needle))
    }
}

impl Notifier for CapturingNotifier {
    fn notify(&self, level: Level, message: &str) {
        self.events
            .lock()
            .expect("notifier lock")
            .push((level, message.to_string()));
    }
}
