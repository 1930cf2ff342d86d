//! Deterministic off-browser host for the loader.
//!
//! [`MemoryPage`] stands in for the DOM, [`VirtualRuntime`] for the event
//! loop and the network, and [`Simulation`] ties both to a [`Loader`](crate::Loader)
//! so scroll/resize sequences can be replayed with exact timing.

mod page;
mod runtime;
mod simulation;
mod trace;

pub use page::{MemoryPage, NodeId, NodeSpec};
pub use runtime::{FetchBehaviour, FetchRecord, FetchScript, Scheduled, VirtualRuntime, DEFAULT_LATENCY_MS};
pub use simulation::Simulation;
pub use trace::{Trace, TraceEntry, TraceEvent};
