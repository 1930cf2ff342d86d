//! Timeline of what happened during a simulation.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde::Serialize;

use crate::request::{RequestId, Variant};
use crate::runtime::PageEvent;
use crate::sim::page::NodeId;

/// One observable step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TraceEvent {
    /// The host fired a window event
    Event { kind: PageEvent, delivered: bool },
    /// A throttled scan was scheduled
    ScanScheduled,
    /// A throttled scan ran
    ScanFired,
    /// An image fetch was issued
    FetchStarted { request: RequestId, url: String, variant: Variant, attempt: u32 },
    /// An in-flight fetch was aborted
    FetchAborted { request: RequestId },
    /// An element now shows a variant
    Loaded { element: NodeId, variant: Variant },
    /// An element was marked failed
    Failed { element: NodeId, url: String, error: String },
    /// Every candidate resolved
    Complete,
    Listening,
    Unlistened,
}

/// A trace event stamped with virtual time (ms).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceEntry {
    pub at: u64,
    #[serde(flatten)]
    pub event: TraceEvent,
}

/// Shared, clock-aware trace log.
///
/// The virtual runtime and the recording hooks both hold a clone, so entries
/// from either side land in one ordered list.
#[derive(Debug, Clone, Default)]
pub struct Trace {
    clock: Rc<Cell<u64>>,
    entries: Rc<RefCell<Vec<TraceEntry>>>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> u64 {
        self.clock.get()
    }

    pub(crate) fn set_now(&self, at: u64) {
        self.clock.set(at);
    }

    pub fn record(&self, event: TraceEvent) {
        let at = self.now();
        self.entries.borrow_mut().push(TraceEntry { at, event });
    }

    pub fn entries(&self) -> Vec<TraceEntry> {
        self.entries.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of entries matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&TraceEvent) -> bool) -> usize {
        self.entries.borrow().iter().filter(|e| predicate(&e.event)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_are_stamped_with_clock() {
        let trace = Trace::new();
        trace.record(TraceEvent::Listening);
        trace.set_now(250);
        trace.clone().record(TraceEvent::Complete);

        let entries = trace.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].at, 0);
        assert_eq!(entries[1], TraceEntry { at: 250, event: TraceEvent::Complete });
        assert_eq!(trace.count(|e| matches!(e, TraceEvent::Complete)), 1);
    }

    #[test]
    fn test_serializes_flat() {
        let entry = TraceEntry { at: 5, event: TraceEvent::ScanFired };
        assert_eq!(serde_json::to_string(&entry).unwrap(), r#"{"at":5,"type":"scanFired"}"#);
    }
}
