//! Recording observer for run-loop assertions

use std::cell::RefCell;
use std::rc::Rc;

use scopebridge_core::error::ErrorKind;
use scopebridge_core::runloop::{Observer, StatusSnapshot};

/// One observer notification
#[derive(Debug, Clone)]
pub enum Event {
    /// `on_file_captured`
    FileCaptured {
        /// Generated name
        name: String,
        /// Bytes persisted
        bytes: usize,
    },
    /// `on_error`
    Error {
        /// Error kind
        kind: ErrorKind,
        /// Where it happened
        detail: String,
    },
    /// `on_status_tick`
    Status(StatusSnapshot),
}

/// Observer that records every notification
#[derive(Clone, Default)]
pub struct RecordingObserver {
    events: Rc<RefCell<Vec<Event>>>,
}

impl RecordingObserver {
    /// An empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far
    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    /// Names of captured files, in order
    pub fn captured_files(&self) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                Event::FileCaptured { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    /// Errors observed, in order
    pub fn errors(&self) -> Vec<(ErrorKind, String)> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                Event::Error { kind, detail } => Some((*kind, detail.clone())),
                _ => None,
            })
            .collect()
    }

    /// Status snapshots observed, in order
    pub fn status_ticks(&self) -> Vec<StatusSnapshot> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                Event::Status(s) => Some(*s),
                _ => None,
            })
            .collect()
    }

    /// Drop everything recorded
    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

impl Observer for RecordingObserver {
    fn on_file_captured(&mut self, name: &str, bytes: usize) {
        self.events.borrow_mut().push(Event::FileCaptured {
            name: name.to_string(),
            bytes,
        });
    }

    fn on_error(&mut self, kind: ErrorKind, detail: &str) {
        self.events.borrow_mut().push(Event::Error {
            kind,
            detail: detail.to_string(),
        });
    }

    fn on_status_tick(&mut self, snapshot: &StatusSnapshot) {
        self.events.borrow_mut().push(Event::Status(*snapshot));
    }
}
