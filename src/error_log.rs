//! Process-visible log of swallowed errors.
//!
//! Dispatch never propagates a bad payload or a panicking handler upward; it records the
//! failure here instead so it can be inspected later. The log is bounded: once full, the
//! oldest entries are evicted and counted.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// What produced a recorded error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorSource {
    /// A gateway payload failed to parse.
    Parse,
    /// An event handler panicked.
    Handler,
    /// A REST call failed.
    Rest,
}

impl fmt::Display for ErrorSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSource::Parse => write!(f, "parse"),
            ErrorSource::Handler => write!(f, "handler"),
            ErrorSource::Rest => write!(f, "rest"),
        }
    }
}

/// One recorded failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedError {
    pub source: ErrorSource,
    /// Where it happened (event name, route key, handler tag).
    pub context: String,
    pub message: String,
    /// Epoch millis at which it was recorded.
    pub at_millis: u64,
}

/// Bounded, shared error collection. Clones share storage.
#[derive(Clone, Debug)]
pub struct ErrorLog {
    entries: Arc<Mutex<VecDeque<LoggedError>>>,
    capacity: usize,
    evicted: Arc<AtomicU64>,
}

impl ErrorLog {
    /// Creates a log holding at most `capacity` entries (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::new())),
            capacity: capacity.max(1),
            evicted: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn record(&self, entry: LoggedError) {
        let mut guard = self.entries.lock().expect("error log poisoned");
        guard.push_back(entry);
        while guard.len() > self.capacity {
            guard.pop_front();
            self.evicted.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Snapshot of the retained entries, oldest first.
    pub fn entries(&self) -> Vec<LoggedError> {
        self.entries.lock().expect("error log poisoned").iter().cloned().collect()
    }

    /// Retained entries from one source.
    pub fn by_source(&self, source: ErrorSource) -> Vec<LoggedError> {
        self.entries().into_iter().filter(|e| e.source == source).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("error log poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().expect("error log poisoned").clear();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// How many entries have been dropped to respect the capacity.
    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }
}

impl Default for ErrorLog {
    fn default() -> Self {
        Self::with_capacity(1_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(n: u64) -> LoggedError {
        LoggedError {
            source: if n % 2 == 0 { ErrorSource::Parse } else { ErrorSource::Handler },
            context: format!("ctx-{n}"),
            message: "boom".into(),
            at_millis: n,
        }
    }

    #[test]
    fn evicts_oldest_past_capacity() {
        let log = ErrorLog::with_capacity(2);
        for n in 0..5 {
            log.record(entry(n));
        }
        let kept: Vec<u64> = log.entries().iter().map(|e| e.at_millis).collect();
        assert_eq!(kept, vec![3, 4]);
        assert_eq!(log.evicted(), 3);
    }

    #[test]
    fn filters_by_source_and_clears() {
        let log = ErrorLog::default();
        for n in 0..4 {
            log.record(entry(n));
        }
        assert_eq!(log.by_source(ErrorSource::Parse).len(), 2);
        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn zero_capacity_is_clamped() {
        assert_eq!(ErrorLog::with_capacity(0).capacity(), 1);
    }
}
