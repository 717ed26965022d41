//! Reporting for inputs that do not line up with the training columns.
//!
//! The feature builder never fails on a mismatch between what the user
//! selected and what the model was trained on. It substitutes a fallback and
//! reports a [`DriftEvent`] to whichever [`DriftHook`] the caller injected, so
//! staying quiet is a choice made at the call site.

use std::cell::RefCell;
use std::fmt;

use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub enum DriftEvent {
    UnknownAmenity(String),
    /// The one-hot column for the selected location is not a training column.
    UnknownLocationColumn(String),
    /// Area, bedrooms, distance or a coordinate has no training column.
    UnknownNumericColumn(String),
    /// No reference row for the location; mean coordinates were used.
    LocationNotInDataset(String),
}

impl fmt::Display for DriftEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriftEvent::UnknownAmenity(name) => {
                write!(f, "amenity `{name}` not in training columns; dropped")
            }
            DriftEvent::UnknownLocationColumn(column) => {
                write!(f, "`{column}` not in training columns; no location signal")
            }
            DriftEvent::UnknownNumericColumn(column) => {
                write!(f, "numeric `{column}` not in training columns; dropped")
            }
            DriftEvent::LocationNotInDataset(location) => {
                write!(f, "unknown location `{location}`; using mean coordinates")
            }
        }
    }
}

pub trait DriftHook {
    fn record(&self, event: DriftEvent);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SilentDrift;

impl DriftHook for SilentDrift {
    fn record(&self, _event: DriftEvent) {}
}

/// Emits each event as a `tracing` warning.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDrift;

impl DriftHook for LogDrift {
    fn record(&self, event: DriftEvent) {
        warn!("{event}");
    }
}

#[derive(Debug, Default)]
pub struct CollectDrift {
    events: RefCell<Vec<DriftEvent>>,
}

impl CollectDrift {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DriftEvent> {
        self.events.borrow().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }
}

impl DriftHook for CollectDrift {
    fn record(&self, event: DriftEvent) {
        self.events.borrow_mut().push(event);
    }
}

// Runs `f` under a plain-text subscriber and returns what it logged.
#[cfg(test)]
pub(crate) fn capture_logs(f: impl FnOnce()) -> String {
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    let buffer = Buffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();
    tracing::subscriber::with_default(subscriber, f);

    let bytes = buffer.0.lock().unwrap().clone();
    String::from_utf8(bytes).unwrap()
}
