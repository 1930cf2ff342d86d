//! The event loop seen from the loader's side.
//!
//! The loader never blocks and never spawns. It asks its [`Runtime`] for
//! timers, fetches and listeners, and the host calls back into
//! [`Loader::run_task`](crate::Loader::run_task) when a timer fires and
//! [`Loader::fetch_complete`](crate::Loader::fetch_complete) when a fetch
//! settles.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::request::{FetchError, FetchRequest, RequestId};

/// Handle returned by [`Runtime::set_timeout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimerHandle(pub u64);

/// Work the loader schedules for later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// Throttled re-scan
    Scan,
    /// Issue the fetch for a delayed request
    StartFetch(RequestId),
}

/// Window events the loader listens to while active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageEvent {
    Scroll,
    Resize,
    Load,
}

impl PageEvent {
    pub const ALL: [PageEvent; 3] = [PageEvent::Scroll, PageEvent::Resize, PageEvent::Load];

    /// DOM event name
    pub fn name(self) -> &'static str {
        match self {
            PageEvent::Scroll => "scroll",
            PageEvent::Resize => "resize",
            PageEvent::Load => "load",
        }
    }
}

/// The host could not provide a service the loader asked for.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum RuntimeError {
    #[error("could not schedule timer: {0}")]
    Timer(String),
    #[error("could not start fetch: {0}")]
    Fetch(String),
}

impl From<RuntimeError> for FetchError {
    fn from(e: RuntimeError) -> Self {
        FetchError::Host { message: e.to_string() }
    }
}

/// Single-threaded host services.
pub trait Runtime {
    /// Run `task` after `delay`.
    fn set_timeout(&mut self, delay: Duration, task: Task) -> Result<TimerHandle, RuntimeError>;

    /// Cancel a timer. Unknown or already-fired handles are ignored.
    fn clear_timeout(&mut self, handle: TimerHandle);

    /// Start fetching an image; report back through `fetch_complete`.
    ///
    /// An error means no completion will ever be reported for `request`.
    fn fetch(&mut self, request: &FetchRequest) -> Result<(), RuntimeError>;

    /// Stop an in-flight fetch. Its completion must not be reported.
    fn abort_fetch(&mut self, id: RequestId);

    /// Attach the scroll, resize and load listeners.
    fn listen(&mut self);

    /// Detach all three listeners.
    fn unlisten(&mut self);
}
