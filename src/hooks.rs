//! Callbacks invoked by the loader.

use crate::request::{LoadFailure, Variant};

type LoadFn<E> = Box<dyn FnMut(&E, Variant)>;
type ErrorFn<E> = Box<dyn FnMut(&E, &LoadFailure)>;
type CompleteFn = Box<dyn FnMut()>;

/// Optional callbacks, all defaulting to no-ops.
///
/// ```
/// use progressive::Hooks;
///
/// let hooks: Hooks<u32> = Hooks::new()
///     .on_load(|element, variant| println!("{element} showed its {variant} image"))
///     .on_load_complete(|| println!("all images resolved"));
/// ```
pub struct Hooks<E> {
    on_load: Option<LoadFn<E>>,
    on_load_complete: Option<CompleteFn>,
    on_error: Option<ErrorFn<E>>,
}

impl<E> Default for Hooks<E> {
    fn default() -> Self {
        Self { on_load: None, on_load_complete: None, on_error: None }
    }
}

impl<E> Hooks<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called after every successful swap, once for the small variant (if
    /// any) and once for the full one.
    pub fn on_load(mut self, f: impl FnMut(&E, Variant) + 'static) -> Self {
        self.on_load = Some(Box::new(f));
        self
    }

    /// Called once when every candidate has been resolved.
    pub fn on_load_complete(mut self, f: impl FnMut() + 'static) -> Self {
        self.on_load_complete = Some(Box::new(f));
        self
    }

    /// Called when an element is marked failed.
    pub fn on_error(mut self, f: impl FnMut(&E, &LoadFailure) + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    pub(crate) fn loaded(&mut self, element: &E, variant: Variant) {
        if let Some(f) = self.on_load.as_mut() {
            f(element, variant);
        }
    }

    pub(crate) fn completed(&mut self) {
        if let Some(f) = self.on_load_complete.as_mut() {
            f();
        }
    }

    pub(crate) fn failed(&mut self, element: &E, failure: &LoadFailure) {
        if let Some(f) = self.on_error.as_mut() {
            f(element, failure);
        }
    }
}

impl<E> std::fmt::Debug for Hooks<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("on_load", &self.on_load.is_some())
            .field("on_load_complete", &self.on_load_complete.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}
