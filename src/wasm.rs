//! WASM API module for browser/JS interop
//!
//! Exposes [`ProgressiveLoader`], a handle that drives the loader against the
//! live document.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use js_sys::Function;
use log::warn;
use wasm_bindgen::prelude::*;
use web_sys::Element;

use crate::config::options_from_json;
use crate::hooks::Hooks;
use crate::loader::LoaderState;
use crate::request::{LoadFailure, Variant};
use crate::web::{self, SharedLoader};

/// Initialize panic hook and console logging
#[wasm_bindgen(start)]
pub fn init_panic_hook() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::new(log::Level::Info));
}

/// A hook invocation waiting for the loader borrow to be released.
enum Notice {
    Loaded(Element, Variant),
    Failed(Element, LoadFailure),
    Complete,
}

struct Callbacks {
    on_load: Option<Function>,
    on_load_complete: Option<Function>,
    on_error: Option<Function>,
}

impl Callbacks {
    fn deliver(&self, notice: Notice) {
        let result = match notice {
            Notice::Loaded(element, variant) => self
                .on_load
                .as_ref()
                .map(|f| f.call2(&JsValue::NULL, &element, &JsValue::from_str(&variant.to_string()))),
            Notice::Failed(element, failure) => self
                .on_error
                .as_ref()
                .map(|f| f.call2(&JsValue::NULL, &element, &JsValue::from_str(&failure.to_string()))),
            Notice::Complete => self.on_load_complete.as_ref().map(|f| f.call0(&JsValue::NULL)),
        };
        if let Some(Err(e)) = result {
            warn!("callback threw: {:?}", e);
        }
    }
}

type Queue = Rc<RefCell<VecDeque<Notice>>>;

fn flush(queue: &Queue, callbacks: &Callbacks) {
    loop {
        let next = queue.borrow_mut().pop_front();
        match next {
            Some(notice) => callbacks.deliver(notice),
            None => break,
        }
    }
}

/// Lazy loader bound to the current document.
#[wasm_bindgen]
pub struct ProgressiveLoader {
    loader: SharedLoader,
}

#[wasm_bindgen]
impl ProgressiveLoader {
    /// Create a loader from JSON options and activate it.
    ///
    /// `on_load(element, variant)` fires after each swap, `on_error(element,
    /// message)` when an element is marked failed, and `on_load_complete()`
    /// once every candidate has resolved.
    pub fn init(
        options_json: &str,
        on_load: Option<Function>,
        on_load_complete: Option<Function>,
        on_error: Option<Function>,
    ) -> Result<ProgressiveLoader, JsError> {
        let options = options_from_json(options_json)?;
        let loader = web::create(options).ok_or_else(|| JsError::new("no window or document available"))?;

        let queue: Queue = Rc::default();
        let callbacks = Rc::new(Callbacks { on_load, on_load_complete, on_error });

        let (loaded, failed, complete) = (queue.clone(), queue.clone(), queue.clone());
        let hooks = Hooks::new()
            .on_load(move |el: &Element, variant| {
                loaded.borrow_mut().push_back(Notice::Loaded(el.clone(), variant));
            })
            .on_error(move |el: &Element, failure: &LoadFailure| {
                failed.borrow_mut().push_back(Notice::Failed(el.clone(), failure.clone()));
            })
            .on_load_complete(move || complete.borrow_mut().push_back(Notice::Complete));

        {
            let mut guard = loader.borrow_mut();
            guard.set_hooks(hooks);
            guard.runtime_mut().set_idle(move || flush(&queue, &callbacks));
        }

        web::drive(&loader, |l| l.activate());
        Ok(ProgressiveLoader { loader })
    }

    /// Pick up newly added candidates and scan immediately.
    ///
    /// After `dropListeners()` this still loads what is visible now, but
    /// scroll and resize stay ignored. Returns the number of new candidates
    /// found.
    pub fn render(&self) -> usize {
        web::drive(&self.loader, |l| match l.state() {
            LoaderState::Idle => {
                l.activate();
                l.candidates().count()
            }
            LoaderState::Active | LoaderState::Completed | LoaderState::Deactivated => l.refresh(),
        })
        .unwrap_or(0)
    }

    /// Fire completion if every candidate has resolved.
    pub fn check(&self) -> bool {
        web::drive(&self.loader, |l| l.check()).unwrap_or(false)
    }

    /// Detach listeners and cancel pending work.
    #[wasm_bindgen(js_name = dropListeners)]
    pub fn drop_listeners(&self) {
        web::drive(&self.loader, |l| l.deactivate());
    }

    /// One of `idle`, `active`, `completed`, `deactivated`, or `busy` when
    /// read from inside a loader callback.
    #[wasm_bindgen(getter)]
    pub fn state(&self) -> String {
        web::peek_state(&self.loader).map_or("busy", state_name).to_string()
    }
}

fn state_name(state: LoaderState) -> &'static str {
    match state {
        LoaderState::Idle => "idle",
        LoaderState::Active => "active",
        LoaderState::Completed => "completed",
        LoaderState::Deactivated => "deactivated",
    }
}
