//! Virtual-clock runtime with scripted fetch outcomes.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::request::{FetchError, FetchRequest, RequestId, Variant};
use crate::runtime::{Runtime, RuntimeError, Task, TimerHandle};
use crate::sim::trace::{Trace, TraceEvent};

/// Default fetch latency in milliseconds
pub const DEFAULT_LATENCY_MS: u64 = 50;

/// How the fake network answers for one URL.
///
/// - no fields: succeeds after the script's default latency
/// - `status` outside 2xx: always fails with that status
/// - `failTimes: n`: fails the first `n` attempts, then succeeds
/// - `refuse: true`: the runtime cannot even start the fetch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FetchBehaviour {
    /// Latency override (ms)
    pub latency: Option<u64>,
    pub status: Option<u16>,
    pub fail_times: Option<u32>,
    pub refuse: bool,
}

impl FetchBehaviour {
    pub fn status(status: u16) -> Self {
        Self { status: Some(status), ..Default::default() }
    }

    pub fn flaky(fail_times: u32) -> Self {
        Self { fail_times: Some(fail_times), ..Default::default() }
    }

    pub fn slow(latency: u64) -> Self {
        Self { latency: Some(latency), ..Default::default() }
    }

    pub fn refused() -> Self {
        Self { refuse: true, ..Default::default() }
    }

    fn outcome(&self, attempt: u32) -> Result<(), FetchError> {
        let bad_status = self.status.filter(|s| !(200..300).contains(s));
        let failing = match self.fail_times {
            Some(n) => attempt < n,
            None => bad_status.is_some(),
        };
        if !failing {
            return Ok(());
        }
        match bad_status {
            Some(status) => Err(FetchError::Status { status }),
            None => Err(FetchError::Network { message: "connection reset".to_string() }),
        }
    }
}

/// Per-URL fetch behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FetchScript {
    /// Default latency (ms)
    pub latency: u64,
    pub urls: BTreeMap<String, FetchBehaviour>,
}

impl Default for FetchScript {
    fn default() -> Self {
        Self { latency: DEFAULT_LATENCY_MS, urls: BTreeMap::new() }
    }
}

impl FetchScript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latency(mut self, latency: u64) -> Self {
        self.latency = latency;
        self
    }

    pub fn url(mut self, url: &str, behaviour: FetchBehaviour) -> Self {
        self.urls.insert(url.to_string(), behaviour);
        self
    }

    fn refuses(&self, url: &str) -> bool {
        self.urls.get(url).is_some_and(|b| b.refuse)
    }

    fn answer(&self, url: &str, attempt: u32) -> (u64, Result<(), FetchError>) {
        match self.urls.get(url) {
            Some(behaviour) => (behaviour.latency.unwrap_or(self.latency), behaviour.outcome(attempt)),
            None => (self.latency, Ok(())),
        }
    }
}

/// Something due on the virtual clock.
#[derive(Debug, Clone, PartialEq)]
pub enum Scheduled {
    Timer(TimerHandle, Task),
    Fetch(RequestId, Result<(), FetchError>),
}

/// A fetch the runtime was asked to perform.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchRecord {
    pub at: u64,
    pub request: RequestId,
    pub url: String,
    pub variant: Variant,
    pub attempt: u32,
}

/// Deterministic [`Runtime`]: timers and fetch completions sit in one queue
/// ordered by due time, then by scheduling order.
#[derive(Debug)]
pub struct VirtualRuntime {
    seq: u64,
    queue: BTreeMap<(u64, u64), Scheduled>,
    script: FetchScript,
    refuse_timers: bool,
    listening: bool,
    fetches: Vec<FetchRecord>,
    aborted: Vec<RequestId>,
    trace: Trace,
}

impl VirtualRuntime {
    pub fn new(script: FetchScript, trace: Trace) -> Self {
        Self {
            seq: 0,
            queue: BTreeMap::new(),
            script,
            refuse_timers: false,
            listening: false,
            fetches: Vec::new(),
            aborted: Vec::new(),
            trace,
        }
    }

    pub fn now(&self) -> u64 {
        self.trace.now()
    }

    /// Move the clock forward without delivering anything.
    pub fn advance_to(&mut self, at: u64) {
        if at > self.now() {
            self.trace.set_now(at);
        }
    }

    fn schedule(&mut self, due: u64, item: Scheduled) -> u64 {
        let seq = self.seq;
        self.seq += 1;
        self.queue.insert((due, seq), item);
        seq
    }

    /// Take the earliest item due at or before `until`, advancing the clock
    /// to its due time.
    pub fn pop_due(&mut self, until: u64) -> Option<Scheduled> {
        let (&key, _) = self.queue.iter().next()?;
        if key.0 > until {
            return None;
        }
        let item = self.queue.remove(&key)?;
        self.advance_to(key.0);
        Some(item)
    }

    /// Take the earliest item regardless of its due time.
    pub fn pop_next(&mut self) -> Option<Scheduled> {
        self.pop_due(u64::MAX)
    }

    /// Number of queued timers and fetch completions.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    /// Make every later `set_timeout` fail, as a host without timers would.
    pub fn refuse_timers(&mut self, refuse: bool) {
        self.refuse_timers = refuse;
    }

    pub fn fetches(&self) -> &[FetchRecord] {
        &self.fetches
    }

    pub fn aborted(&self) -> &[RequestId] {
        &self.aborted
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }
}

impl Runtime for VirtualRuntime {
    fn set_timeout(&mut self, delay: Duration, task: Task) -> Result<TimerHandle, RuntimeError> {
        if self.refuse_timers {
            return Err(RuntimeError::Timer("timers refused".to_string()));
        }
        if task == Task::Scan {
            self.trace.record(TraceEvent::ScanScheduled);
        }
        let delay = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        let due = self.now().saturating_add(delay);
        // Handles share the sequence counter, so they are unique
        let handle = TimerHandle(self.seq);
        self.schedule(due, Scheduled::Timer(handle, task));
        Ok(handle)
    }

    fn clear_timeout(&mut self, handle: TimerHandle) {
        self.queue.retain(|_, item| !matches!(item, Scheduled::Timer(h, _) if *h == handle));
    }

    fn fetch(&mut self, request: &FetchRequest) -> Result<(), RuntimeError> {
        if self.script.refuses(&request.url) {
            return Err(RuntimeError::Fetch(format!("{} refused", request.url)));
        }
        let (latency, outcome) = self.script.answer(&request.url, request.attempt);
        self.trace.record(TraceEvent::FetchStarted {
            request: request.id,
            url: request.url.clone(),
            variant: request.variant,
            attempt: request.attempt,
        });
        self.fetches.push(FetchRecord {
            at: self.now(),
            request: request.id,
            url: request.url.clone(),
            variant: request.variant,
            attempt: request.attempt,
        });
        let due = self.now().saturating_add(latency);
        self.schedule(due, Scheduled::Fetch(request.id, outcome));
        Ok(())
    }

    fn abort_fetch(&mut self, id: RequestId) {
        self.queue.retain(|_, item| !matches!(item, Scheduled::Fetch(r, _) if *r == id));
        self.aborted.push(id);
        self.trace.record(TraceEvent::FetchAborted { request: id });
    }

    fn listen(&mut self) {
        self.listening = true;
        self.trace.record(TraceEvent::Listening);
    }

    fn unlisten(&mut self) {
        self.listening = false;
        self.trace.record(TraceEvent::Unlistened);
    }
}
