//! Load requests: which variant to fetch, and how to call it off.

use std::cell::Cell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::runtime::TimerHandle;

/// The two quality tiers a candidate may offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Small,
    Full,
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Variant::Small => f.write_str("small"),
            Variant::Full => f.write_str("full"),
        }
    }
}

/// How a candidate gets to its full-resolution image.
///
/// The plan is fixed when the candidate is first dispatched, based on the
/// viewport width at that moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoadPlan {
    /// Fetch the full variant straight away
    FullOnly,
    /// Show the small variant now; a later scan on a wide viewport fetches
    /// the full one
    SmallThenFull,
}

impl LoadPlan {
    pub fn first_variant(self) -> Variant {
        match self {
            LoadPlan::FullOnly => Variant::Full,
            LoadPlan::SmallThenFull => Variant::Small,
        }
    }
}

/// Identifies one request for the lifetime of a loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(pub u64);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Shared flag telling a fetch its result is no longer wanted.
///
/// The loader keeps one half and hands a clone to the runtime with every
/// fetch, so a runtime can drop late completions before calling back.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Rc<Cell<bool>>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }
}

/// Why an image could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
#[non_exhaustive]
pub enum FetchError {
    /// The candidate does not carry the URL attribute for this variant
    #[error("missing attribute '{attribute}'")]
    MissingSource { attribute: String },
    /// The server answered with a non-success status
    #[error("HTTP status {status}")]
    Status { status: u16 },
    /// Connection problems, or a browser `error` event without detail
    #[error("network error: {message}")]
    Network { message: String },
    /// The host refused to start the fetch or its timer
    #[error("host error: {message}")]
    Host { message: String },
}

/// A request that ran out of attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadFailure {
    pub url: String,
    pub variant: Variant,
    /// Attempts made, including the first
    pub attempts: u32,
    pub error: FetchError,
}

impl std::fmt::Display for LoadFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} variant '{}' failed after {} attempt(s): {}",
            self.variant, self.url, self.attempts, self.error
        )
    }
}

/// What the runtime is asked to fetch.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub id: RequestId,
    pub url: String,
    pub variant: Variant,
    /// Zero-based attempt counter
    pub attempt: u32,
    pub token: CancelToken,
}

/// Where a live request currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    /// Waiting on the start delay (or a retry backoff)
    Delayed(TimerHandle),
    /// Handed to the runtime
    Fetching,
}

/// The authoritative request for one candidate.
#[derive(Debug, Clone)]
pub(crate) struct LoadRequest {
    pub id: RequestId,
    pub candidate: usize,
    pub variant: Variant,
    pub url: String,
    pub attempt: u32,
    pub token: CancelToken,
    pub phase: Phase,
}

impl LoadRequest {
    pub fn fetch_request(&self) -> FetchRequest {
        FetchRequest {
            id: self.id,
            url: self.url.clone(),
            variant: self.variant,
            attempt: self.attempt,
            token: self.token.clone(),
        }
    }
}
