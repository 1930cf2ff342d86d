//! A loader wired to an in-memory page and a virtual clock.

use std::cell::RefCell;
use std::rc::Rc;

use crate::config::Options;
use crate::hooks::Hooks;
use crate::loader::Loader;
use crate::runtime::{PageEvent, Task};
use crate::sim::page::{MemoryPage, NodeId};
use crate::sim::runtime::{FetchScript, Scheduled, VirtualRuntime};
use crate::sim::trace::{Trace, TraceEntry, TraceEvent};
use crate::status::LoadStatus;

/// Upper bound on deliveries in [`Simulation::settle`], so a misbehaving
/// loader cannot spin forever.
const MAX_DELIVERIES: usize = 100_000;

/// Drives a [`Loader`] deterministically.
///
/// Window events only reach the loader while its listeners are attached, as
/// in a browser. Scrolling a container does not fire a window event either.
#[derive(Debug)]
pub struct Simulation {
    loader: Loader<MemoryPage, VirtualRuntime>,
    trace: Trace,
}

impl Simulation {
    pub fn new(page: MemoryPage, options: Options, script: FetchScript) -> Self {
        Self::with_hooks(page, options, script, Hooks::new())
    }

    /// Like [`Simulation::new`], also calling `hooks` after recording each
    /// callback in the trace.
    pub fn with_hooks(
        page: MemoryPage,
        options: Options,
        script: FetchScript,
        hooks: Hooks<NodeId>,
    ) -> Self {
        let trace = Trace::new();
        let runtime = VirtualRuntime::new(script, trace.clone());
        let loader = Loader::new(page, runtime, options).with_hooks(recording(hooks, &trace));
        Self { loader, trace }
    }

    pub fn activate(&mut self) {
        self.loader.activate();
    }

    pub fn scan(&mut self) {
        self.loader.scan();
    }

    pub fn refresh(&mut self) -> usize {
        self.loader.refresh()
    }

    pub fn deactivate(&mut self) {
        self.loader.deactivate();
    }

    /// Fire a window event. Returns whether it scheduled a scan.
    pub fn fire(&mut self, kind: PageEvent) -> bool {
        let delivered = self.loader.runtime().is_listening();
        self.trace.record(TraceEvent::Event { kind, delivered });
        delivered && self.loader.handle_event(kind)
    }

    /// Scroll the window and fire `scroll`.
    pub fn scroll_to(&mut self, y: f64) -> bool {
        self.loader.page_mut().scroll_window_to(y);
        self.fire(PageEvent::Scroll)
    }

    /// Scroll a container. No window event is fired.
    pub fn scroll_container(&mut self, container: NodeId, top: f64) {
        self.loader.page_mut().scroll_container_to(container, top);
    }

    /// Resize the viewport and fire `resize`.
    pub fn resize(&mut self, width: f64, height: f64) -> bool {
        self.loader.page_mut().set_viewport(width, height);
        self.fire(PageEvent::Resize)
    }

    /// Deliver everything due in the next `ms` milliseconds.
    pub fn advance(&mut self, ms: u64) {
        let target = self.now().saturating_add(ms);
        while let Some(item) = self.loader.runtime_mut().pop_due(target) {
            self.deliver(item);
        }
        self.loader.runtime_mut().advance_to(target);
    }

    /// Deliver queued items until none remain. Returns `false` if the
    /// delivery cap was hit.
    pub fn settle(&mut self) -> bool {
        for _ in 0..MAX_DELIVERIES {
            match self.loader.runtime_mut().pop_next() {
                Some(item) => self.deliver(item),
                None => return true,
            }
        }
        false
    }

    fn deliver(&mut self, item: Scheduled) {
        match item {
            Scheduled::Timer(_, task) => {
                if task == Task::Scan {
                    self.trace.record(TraceEvent::ScanFired);
                }
                self.loader.run_task(task);
            }
            Scheduled::Fetch(id, outcome) => self.loader.fetch_complete(id, outcome),
        }
    }

    /// Current virtual time (ms).
    pub fn now(&self) -> u64 {
        self.trace.now()
    }

    pub fn status(&self, element: NodeId) -> LoadStatus {
        self.loader.status_of(&element)
    }

    pub fn page(&self) -> &MemoryPage {
        self.loader.page()
    }

    pub fn page_mut(&mut self) -> &mut MemoryPage {
        self.loader.page_mut()
    }

    pub fn loader(&self) -> &Loader<MemoryPage, VirtualRuntime> {
        &self.loader
    }

    pub fn loader_mut(&mut self) -> &mut Loader<MemoryPage, VirtualRuntime> {
        &mut self.loader
    }

    pub fn runtime(&self) -> &VirtualRuntime {
        self.loader.runtime()
    }

    pub fn runtime_mut(&mut self) -> &mut VirtualRuntime {
        self.loader.runtime_mut()
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    pub fn entries(&self) -> Vec<TraceEntry> {
        self.trace.entries()
    }

    /// How many times the completion callback fired.
    pub fn completions(&self) -> usize {
        self.trace.count(|e| matches!(e, TraceEvent::Complete))
    }
}

/// Wrap `inner` so every callback is recorded before it runs.
fn recording(inner: Hooks<NodeId>, trace: &Trace) -> Hooks<NodeId> {
    let inner = Rc::new(RefCell::new(inner));

    let (on_load_inner, on_load_trace) = (Rc::clone(&inner), trace.clone());
    let (complete_inner, complete_trace) = (Rc::clone(&inner), trace.clone());
    let (error_inner, error_trace) = (inner, trace.clone());

    Hooks::new()
        .on_load(move |element, variant| {
            on_load_trace.record(TraceEvent::Loaded { element: *element, variant });
            on_load_inner.borrow_mut().loaded(element, variant);
        })
        .on_load_complete(move || {
            complete_trace.record(TraceEvent::Complete);
            complete_inner.borrow_mut().completed();
        })
        .on_error(move |element, failure| {
            error_trace.record(TraceEvent::Failed {
                element: *element,
                url: failure.url.clone(),
                error: failure.error.to_string(),
            });
            error_inner.borrow_mut().failed(element, failure);
        })
}
