//! Event journal recorded by the mock driver.
//!
//! Every construction, close, drop, `srand`, `config` and AER registration is
//! appended here so tests can assert counts and ordering of handle lifecycles.

use nvme_core::ConfigWord;
use parking_lot::Mutex;
use std::sync::Arc;

/// Kind of driver handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    /// Controller handle
    Controller,
    /// Subsystem handle
    Subsystem,
    /// PCIe handle
    Pcie,
    /// Namespace handle
    Namespace,
    /// Buffer handle
    Buffer,
}

/// One recorded driver interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverEvent {
    /// A handle was constructed
    Constructed {
        /// Handle kind
        kind: HandleKind,
        /// Instance id, unique per driver
        id: u64,
    },
    /// A namespace was closed
    Closed {
        /// Instance id of the namespace
        id: u64,
    },
    /// A handle was dropped
    Released {
        /// Handle kind
        kind: HandleKind,
        /// Instance id
        id: u64,
    },
    /// `srand` was called
    Srand {
        /// Seed value
        seed: u32,
    },
    /// `config` was called
    Config {
        /// Requested verify state
        verify: bool,
        /// Resulting config word
        word: ConfigWord,
    },
    /// An AER callback was installed or cleared
    AerRegistered {
        /// Controller instance id
        controller: u64,
        /// Callback name, `None` when cleared
        callback: Option<String>,
    },
}

/// Shared, append-only event log.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    events: Arc<Mutex<Vec<DriverEvent>>>,
}

impl Journal {
    /// Empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, event: DriverEvent) {
        self.events.lock().push(event);
    }

    /// Snapshot of all events so far.
    pub fn events(&self) -> Vec<DriverEvent> {
        self.events.lock().clone()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.events.lock().clear();
    }

    /// Number of handles of `kind` constructed.
    pub fn constructed(&self, kind: HandleKind) -> usize {
        self.count(|e| matches!(e, DriverEvent::Constructed { kind: k, .. } if *k == kind))
    }

    /// Number of handles of `kind` dropped.
    pub fn released(&self, kind: HandleKind) -> usize {
        self.count(|e| matches!(e, DriverEvent::Released { kind: k, .. } if *k == kind))
    }

    /// Number of namespace closes.
    pub fn closed(&self) -> usize {
        self.count(|e| matches!(e, DriverEvent::Closed { .. }))
    }

    /// Instance ids of every constructed handle of `kind`, in order.
    pub fn instances(&self, kind: HandleKind) -> Vec<u64> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                DriverEvent::Constructed { kind: k, id } if *k == kind => Some(*id),
                _ => None,
            })
            .collect()
    }

    /// Seeds passed to `srand`, in order.
    pub fn seeds(&self) -> Vec<u32> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                DriverEvent::Srand { seed } => Some(*seed),
                _ => None,
            })
            .collect()
    }

    /// AER registrations, in order (`None` = cleared).
    pub fn aer_registrations(&self) -> Vec<Option<String>> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                DriverEvent::AerRegistered { callback, .. } => Some(callback.clone()),
                _ => None,
            })
            .collect()
    }

    /// Index of the first event matching `pred`.
    pub fn position(&self, pred: impl Fn(&DriverEvent) -> bool) -> Option<usize> {
        self.events.lock().iter().position(pred)
    }

    fn count(&self, pred: impl Fn(&DriverEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| pred(e)).count()
    }
}
