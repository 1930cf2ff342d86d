//! `web-sys` host for the loader.
//!
//! [`WebPage`] reads and mutates the live document. [`WebRuntime`] maps
//! timers, image fetches and window listeners onto browser APIs and calls
//! back into the shared loader through a weak handle, so dropping the last
//! strong reference tears everything down.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::time::Duration;

use log::{debug, warn};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, Event, HtmlElement, HtmlImageElement, Window};

use crate::config::{MarkupConfig, Options};
use crate::geometry::{Rect, Viewport};
use crate::loader::{Loader, LoaderState};
use crate::page::{css_url, Page};
use crate::request::{FetchError, FetchRequest, RequestId};
use crate::runtime::{PageEvent, Runtime, RuntimeError, Task, TimerHandle};

/// The loader as hosted in a browser.
pub type WebLoader = Loader<WebPage, WebRuntime>;

/// Shared handle the JS callbacks reach the loader through.
pub type SharedLoader = Rc<RefCell<WebLoader>>;

/// The live document.
#[derive(Debug, Clone)]
pub struct WebPage {
    window: Window,
    document: Document,
}

impl WebPage {
    /// `None` outside a browsing context (workers, node).
    pub fn from_window() -> Option<Self> {
        let window = web_sys::window()?;
        let document = window.document()?;
        Some(Self { window, document })
    }

    fn is_body(&self, element: &Element) -> bool {
        self.document
            .body()
            .is_some_and(|body| AsRef::<Element>::as_ref(&body) == element)
    }
}

impl Page for WebPage {
    type Element = Element;

    fn query_candidates(&self, markup: &MarkupConfig) -> Vec<Element> {
        let list = match self.document.query_selector_all(&markup.selector()) {
            Ok(list) => list,
            Err(e) => {
                warn!("selector query failed: {:?}", e);
                return Vec::new();
            }
        };
        (0..list.length())
            .filter_map(|i| list.get(i))
            .filter_map(|node| node.dyn_into::<Element>().ok())
            .collect()
    }

    fn is_hidden(&self, element: &Element) -> bool {
        element
            .dyn_ref::<HtmlElement>()
            .is_some_and(|el| el.offset_parent().is_none())
    }

    fn bounding_rect(&self, element: &Element) -> Rect {
        let r = element.get_bounding_client_rect();
        Rect::new(r.x(), r.y(), r.width(), r.height())
    }

    fn parent(&self, element: &Element) -> Option<Element> {
        let parent = element.parent_element()?;
        if self.is_body(&parent) {
            None
        } else {
            Some(parent)
        }
    }

    fn viewport(&self) -> Viewport {
        let root = self.document.document_element();
        let client_width = root.as_ref().map_or(0.0, |r| f64::from(r.client_width()));
        let client_height = root.as_ref().map_or(0.0, |r| f64::from(r.client_height()));
        let inner_width = self
            .window
            .inner_width()
            .ok()
            .and_then(|w| w.as_f64())
            .unwrap_or(0.0);
        Viewport::new(client_width.max(inner_width), client_height)
    }

    fn has_class(&self, element: &Element, class: &str) -> bool {
        element.class_list().contains(class)
    }

    fn add_class(&mut self, element: &Element, class: &str) {
        if let Err(e) = element.class_list().add_1(class) {
            warn!("could not add class '{}': {:?}", class, e);
        }
    }

    fn remove_class(&mut self, element: &Element, class: &str) {
        if let Err(e) = element.class_list().remove_1(class) {
            warn!("could not remove class '{}': {:?}", class, e);
        }
    }

    fn attribute(&self, element: &Element, name: &str) -> Option<String> {
        element.get_attribute(name)
    }

    fn set_source(&mut self, element: &Element, url: &str) {
        match element.dyn_ref::<HtmlImageElement>() {
            Some(img) => img.set_src(url),
            None => {
                if let Err(e) = element.set_attribute("src", url) {
                    warn!("could not set src: {:?}", e);
                }
            }
        }
    }

    fn set_background_image(&mut self, element: &Element, url: &str) {
        let Some(el) = element.dyn_ref::<HtmlElement>() else {
            warn!("background candidate is not an HTML element");
            return;
        };
        if let Err(e) = el.style().set_property("background-image", &css_url(url)) {
            warn!("could not set background-image: {:?}", e);
        }
    }
}

struct Timer {
    id: i32,
    _callback: Closure<dyn FnMut()>,
}

struct PendingImage {
    image: HtmlImageElement,
    _callback: Closure<dyn FnMut(Event)>,
}

struct Listener {
    event: PageEvent,
    callback: Closure<dyn FnMut()>,
}

/// Browser event loop services.
pub struct WebRuntime {
    window: Window,
    loader: Weak<RefCell<WebLoader>>,
    next_timer: u64,
    timers: HashMap<TimerHandle, Timer>,
    images: HashMap<RequestId, PendingImage>,
    listeners: Vec<Listener>,
    idle: Option<Rc<dyn Fn()>>,
}

impl std::fmt::Debug for WebRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebRuntime")
            .field("timers", &self.timers.len())
            .field("images", &self.images.len())
            .field("listening", &!self.listeners.is_empty())
            .finish()
    }
}

impl WebRuntime {
    fn new(window: Window, loader: Weak<RefCell<WebLoader>>) -> Self {
        Self {
            window,
            loader,
            next_timer: 0,
            timers: HashMap::new(),
            images: HashMap::new(),
            listeners: Vec::new(),
            idle: None,
        }
    }

    /// Run `idle` every time a browser callback has finished with the loader.
    ///
    /// Hooks fire while the loader is borrowed; this is the point where
    /// deferred work that re-enters the loader can run.
    pub fn set_idle(&mut self, idle: impl Fn() + 'static) {
        self.idle = Some(Rc::new(idle));
    }

    pub fn is_listening(&self) -> bool {
        !self.listeners.is_empty()
    }
}

/// Create a loader bound to the current window. `None` outside a browser.
pub fn create(options: Options) -> Option<SharedLoader> {
    let page = WebPage::from_window()?;
    let window = page.window.clone();
    Some(Rc::new_cyclic(|weak| {
        RefCell::new(Loader::new(page, WebRuntime::new(window, weak.clone()), options))
    }))
}

/// Borrow the loader for `f`, then run the idle callback once the borrow is
/// released. Returns `None` if the loader is already borrowed.
pub fn drive<T>(loader: &SharedLoader, f: impl FnOnce(&mut WebLoader) -> T) -> Option<T> {
    let (value, idle) = {
        let Ok(mut guard) = loader.try_borrow_mut() else {
            warn!("loader re-entered from a callback; call ignored");
            return None;
        };
        let value = f(&mut guard);
        (value, guard.runtime().idle.clone())
    };
    if let Some(idle) = idle {
        idle();
    }
    Some(value)
}

/// The loader's state, or `None` while a callback holds the loader.
pub fn peek_state(loader: &SharedLoader) -> Option<LoaderState> {
    loader.try_borrow().ok().map(|l| l.state())
}

fn drive_weak(loader: &Weak<RefCell<WebLoader>>, f: impl FnOnce(&mut WebLoader)) {
    if let Some(loader) = loader.upgrade() {
        drive(&loader, f);
    }
}

impl Runtime for WebRuntime {
    fn set_timeout(&mut self, delay: Duration, task: Task) -> Result<TimerHandle, RuntimeError> {
        self.next_timer += 1;
        let handle = TimerHandle(self.next_timer);
        let loader = self.loader.clone();
        let callback = Closure::<dyn FnMut()>::new(move || {
            drive_weak(&loader, |l| {
                l.runtime_mut().timers.remove(&handle);
                l.run_task(task);
            });
        });

        let ms = i32::try_from(delay.as_millis()).unwrap_or(i32::MAX);
        let id = self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(callback.as_ref().unchecked_ref(), ms)
            .map_err(|e| RuntimeError::Timer(format!("{:?}", e)))?;
        self.timers.insert(handle, Timer { id, _callback: callback });
        Ok(handle)
    }

    fn clear_timeout(&mut self, handle: TimerHandle) {
        if let Some(timer) = self.timers.remove(&handle) {
            self.window.clear_timeout_with_handle(timer.id);
        }
    }

    fn fetch(&mut self, request: &FetchRequest) -> Result<(), RuntimeError> {
        let image = HtmlImageElement::new().map_err(|e| RuntimeError::Fetch(format!("{:?}", e)))?;

        let id = request.id;
        let token = request.token.clone();
        let loader = self.loader.clone();
        let callback = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
            drive_weak(&loader, |l| {
                if l.runtime_mut().images.remove(&id).is_none() || token.is_cancelled() {
                    return;
                }
                let outcome = if event.type_() == "load" {
                    Ok(())
                } else {
                    Err(FetchError::Network {
                        message: "image failed to load".to_string(),
                    })
                };
                l.fetch_complete(id, outcome);
            });
        });

        image.set_onload(Some(callback.as_ref().unchecked_ref()));
        image.set_onerror(Some(callback.as_ref().unchecked_ref()));
        image.set_src(&request.url);
        debug!("fetch {} {} ({})", request.id, request.url, request.variant);
        self.images.insert(id, PendingImage { image, _callback: callback });
        Ok(())
    }

    fn abort_fetch(&mut self, id: RequestId) {
        if let Some(pending) = self.images.remove(&id) {
            pending.image.set_onload(None);
            pending.image.set_onerror(None);
            pending.image.set_src("");
        }
    }

    fn listen(&mut self) {
        if self.is_listening() {
            return;
        }
        for event in PageEvent::ALL {
            let loader = self.loader.clone();
            let callback = Closure::<dyn FnMut()>::new(move || {
                drive_weak(&loader, |l| {
                    l.handle_event(event);
                });
            });
            match self
                .window
                .add_event_listener_with_callback(event.name(), callback.as_ref().unchecked_ref())
            {
                Ok(()) => self.listeners.push(Listener { event, callback }),
                Err(e) => warn!("could not listen for {}: {:?}", event.name(), e),
            }
        }
    }

    fn unlisten(&mut self) {
        for listener in self.listeners.drain(..) {
            if let Err(e) = self.window.remove_event_listener_with_callback(
                listener.event.name(),
                listener.callback.as_ref().unchecked_ref(),
            ) {
                warn!("could not remove {} listener: {:?}", listener.event.name(), e);
            }
        }
    }
}

impl Drop for WebRuntime {
    fn drop(&mut self) {
        self.unlisten();
        for (_, timer) in self.timers.drain() {
            self.window.clear_timeout_with_handle(timer.id);
        }
        for (_, pending) in self.images.drain() {
            pending.image.set_onload(None);
            pending.image.set_onerror(None);
        }
    }
}
