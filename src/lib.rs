//! progressive - viewport-driven lazy image loading
//!
//! This library provides functionality to:
//! - Find image placeholders marked for progressive loading
//! - Decide which of them are visible, including inside nested scroll containers
//! - Swap in small or full-resolution sources as they come into view
//! - Throttle re-checks against scroll, resize and load events
//!
//! The [`Loader`] engine is host-agnostic: it reaches the document through
//! [`Page`] and the event loop through [`Runtime`]. The `sim` module hosts it
//! off-browser with a virtual clock; the `wasm` feature hosts it on `web-sys`.

pub mod cli;
pub mod config;
pub mod geometry;
pub mod hooks;
pub mod loader;
pub mod page;
pub mod request;
pub mod runtime;
pub mod scenario;
pub mod sim;
pub mod status;
pub mod visibility;

#[cfg(feature = "wasm")]
pub mod wasm;
#[cfg(feature = "wasm")]
pub mod web;

pub use config::{MarkupConfig, Options, RetryConfig};
pub use hooks::Hooks;
pub use loader::{Loader, LoaderState};
pub use page::{Page, Surface};
pub use request::{CancelToken, FetchError, FetchRequest, LoadFailure, LoadPlan, RequestId, Variant};
pub use runtime::{PageEvent, Runtime, RuntimeError, Task, TimerHandle};
pub use status::LoadStatus;
pub use visibility::in_view;
