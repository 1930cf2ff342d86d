//! The progressive loader engine.
//!
//! A [`Loader`] owns one page, one runtime and its pending lists. It is driven
//! entirely from outside: the host forwards window events to
//! [`Loader::handle_event`], fired timers to [`Loader::run_task`] and settled
//! fetches to [`Loader::fetch_complete`]. Nothing here blocks or keeps global
//! state, so any number of loaders can share a page.

use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};

use crate::config::Options;
use crate::hooks::Hooks;
use crate::page::{Page, Surface};
use crate::request::{
    CancelToken, FetchError, LoadFailure, LoadPlan, LoadRequest, Phase, RequestId, Variant,
};
use crate::runtime::{PageEvent, Runtime, Task, TimerHandle};
use crate::status::LoadStatus;
use crate::visibility::in_view;

/// Lifecycle of a loader instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoaderState {
    /// Constructed, not yet activated
    Idle,
    /// Listening for events and dispatching loads
    Active,
    /// Every candidate resolved; listeners detached
    Completed,
    /// Stopped by the host before completion
    Deactivated,
}

#[derive(Debug, Clone)]
struct Candidate<E> {
    element: E,
    plan: Option<LoadPlan>,
}

/// Viewport-driven image loader over a [`Page`] and a [`Runtime`].
pub struct Loader<P: Page, R> {
    page: P,
    runtime: R,
    options: Options,
    hooks: Hooks<P::Element>,
    candidates: Vec<Candidate<P::Element>>,
    /// Candidates not dispatched yet, in capture order
    full_pending: Vec<usize>,
    /// Candidates showing (or fetching) the small variant, full fetch not issued
    small_pending: Vec<usize>,
    /// At most one live request per candidate
    in_flight: Vec<LoadRequest>,
    poll: Option<TimerHandle>,
    listening: bool,
    next_request: u64,
    state: LoaderState,
}

impl<P: Page, R: Runtime> Loader<P, R> {
    pub fn new(page: P, runtime: R, options: Options) -> Self {
        Self {
            page,
            runtime,
            options,
            hooks: Hooks::new(),
            candidates: Vec::new(),
            full_pending: Vec::new(),
            small_pending: Vec::new(),
            in_flight: Vec::new(),
            poll: None,
            listening: false,
            next_request: 0,
            state: LoaderState::Idle,
        }
    }

    pub fn with_hooks(mut self, hooks: Hooks<P::Element>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn set_hooks(&mut self, hooks: Hooks<P::Element>) {
        self.hooks = hooks;
    }

    /// Capture candidates, scan once, then attach the throttled listeners.
    ///
    /// Activating a deactivated loader resumes it with its remaining pending
    /// elements plus any candidates added to the page since. Activating a
    /// completed loader only does something if new candidates appeared.
    pub fn activate(&mut self) {
        if self.state == LoaderState::Active {
            return;
        }

        let added = self.collect_candidates();
        if self.state == LoaderState::Completed && added == 0 {
            debug!("activate: no new candidates, staying completed");
            return;
        }

        self.state = LoaderState::Active;
        info!(
            "activated with {} candidate(s), {} pending",
            self.candidates.len(),
            self.full_pending.len() + self.small_pending.len()
        );

        self.scan();

        if self.state == LoaderState::Active && !self.listening {
            self.runtime.listen();
            self.listening = true;
        }
    }

    /// Pick up candidates added to the page since activation, then scan.
    ///
    /// Returns the number of new candidates. A completed loader with new
    /// candidates becomes active again.
    pub fn refresh(&mut self) -> usize {
        let added = self.collect_candidates();
        if added > 0 && self.state == LoaderState::Completed {
            self.state = LoaderState::Active;
            if !self.listening {
                self.runtime.listen();
                self.listening = true;
            }
        }
        self.scan();
        added
    }

    fn collect_candidates(&mut self) -> usize {
        let found = self.page.query_candidates(&self.options.markup);
        let mut added = 0;
        for element in found {
            if self.candidates.iter().any(|c| c.element == element) {
                continue;
            }
            // Already resolved (or never marked) elements would never leave the pending list
            if !LoadStatus::read(&self.page, &element, &self.options.markup).is_loadable() {
                trace!("skipping {:?}: not in a loadable state", element);
                continue;
            }
            self.full_pending.push(self.candidates.len());
            self.candidates.push(Candidate { element, plan: None });
            added += 1;
        }
        added
    }

    /// Re-evaluate pending elements and dispatch loads for the visible ones.
    pub fn scan(&mut self) {
        if self.state == LoaderState::Completed {
            trace!("scan skipped: already completed");
            return;
        }

        let narrow = self.options.is_narrow(self.page.viewport().width);

        for i in (0..self.full_pending.len()).rev() {
            let index = self.full_pending[i];
            if !self.is_ready(index) {
                continue;
            }
            self.full_pending.remove(i);

            let plan = self.plan_for(index, narrow);
            self.candidates[index].plan = Some(plan);
            if plan == LoadPlan::SmallThenFull {
                self.small_pending.push(index);
            }
            self.dispatch(index, plan.first_variant());
        }

        if !narrow {
            for j in (0..self.small_pending.len()).rev() {
                let index = self.small_pending[j];
                if !self.is_ready(index) {
                    continue;
                }
                self.small_pending.remove(j);
                self.dispatch(index, Variant::Full);
            }
        }

        self.check();
    }

    /// Fire the completion callback and deactivate once everything resolved.
    ///
    /// Returns `true` only on the call that completed the loader; later calls
    /// are no-ops.
    pub fn check(&mut self) -> bool {
        if !matches!(self.state, LoaderState::Active | LoaderState::Deactivated) {
            return false;
        }
        if !self.full_pending.is_empty()
            || !self.small_pending.is_empty()
            || !self.in_flight.is_empty()
        {
            return false;
        }

        info!("all {} candidate(s) resolved", self.candidates.len());
        self.hooks.completed();
        self.deactivate();
        self.state = LoaderState::Completed;
        true
    }

    /// Detach listeners, cancel the scan timer and every live request.
    ///
    /// Cancelled candidates go back to their pending list, so activating
    /// again picks them up.
    pub fn deactivate(&mut self) {
        if self.listening {
            self.runtime.unlisten();
            self.listening = false;
        }
        if let Some(poll) = self.poll.take() {
            self.runtime.clear_timeout(poll);
        }
        for request in std::mem::take(&mut self.in_flight) {
            debug!("cancelling {} {} on deactivate", request.variant, request.id);
            self.cancel(&request);
            self.requeue(&request);
        }
        if self.state == LoaderState::Active {
            self.state = LoaderState::Deactivated;
        }
    }

    /// Throttle a window event into a scan.
    ///
    /// The first event while the timer is idle schedules a scan after the
    /// throttle interval; further events before it fires are dropped.
    /// Returns whether the event led to a scan. If the host cannot provide
    /// the timer, the scan runs immediately.
    pub fn handle_event(&mut self, event: PageEvent) -> bool {
        if self.state != LoaderState::Active {
            trace!("{} ignored: loader is {:?}", event.name(), self.state);
            return false;
        }
        if self.poll.is_some() {
            return false;
        }
        match self.runtime.set_timeout(self.options.throttle_interval(), Task::Scan) {
            Ok(handle) => self.poll = Some(handle),
            Err(e) => {
                warn!("{}; scanning without throttle", e);
                self.scan();
            }
        }
        true
    }

    /// Run a task whose timer fired.
    pub fn run_task(&mut self, task: Task) {
        match task {
            Task::Scan => {
                self.poll = None;
                self.scan();
            }
            Task::StartFetch(id) => {
                self.start_fetch(id);
                self.check();
            }
        }
    }

    /// Report the outcome of a fetch started through [`Runtime::fetch`].
    ///
    /// Completions for superseded or cancelled requests are ignored.
    pub fn fetch_complete(&mut self, id: RequestId, outcome: Result<(), FetchError>) {
        let Some(pos) = self
            .in_flight
            .iter()
            .position(|r| r.id == id && r.phase == Phase::Fetching && !r.token.is_cancelled())
        else {
            debug!("ignoring completion of stale request {}", id);
            return;
        };

        match outcome {
            Ok(()) => {
                let request = self.in_flight.remove(pos);
                self.show(&request);
            }
            Err(error) => self.handle_failure(pos, error),
        }

        self.check();
    }

    fn start_fetch(&mut self, id: RequestId) {
        let Some(pos) = self.in_flight.iter().position(|r| r.id == id) else {
            trace!("start timer for stale request {}", id);
            return;
        };
        let request = &mut self.in_flight[pos];
        request.phase = Phase::Fetching;
        let fetch = request.fetch_request();
        debug!("fetching {} {} (attempt {}): {}", fetch.variant, fetch.id, fetch.attempt + 1, fetch.url);
        if let Err(e) = self.runtime.fetch(&fetch) {
            warn!("{} {}: {}", fetch.variant, fetch.id, e);
            self.handle_failure(pos, e.into());
        }
    }

    fn is_ready(&self, index: usize) -> bool {
        let element = &self.candidates[index].element;
        if !LoadStatus::read(&self.page, element, &self.options.markup).is_loadable() {
            return false;
        }
        let visible = in_view(&self.page, element);
        trace!("{:?} visible: {}", element, visible);
        visible
    }

    fn plan_for(&self, index: usize, narrow: bool) -> LoadPlan {
        if !narrow {
            return LoadPlan::FullOnly;
        }
        let element = &self.candidates[index].element;
        let small = self.page.attribute(element, &self.options.markup.small_attribute());
        if small.is_some_and(|url| !url.is_empty()) {
            LoadPlan::SmallThenFull
        } else {
            LoadPlan::FullOnly
        }
    }

    /// Schedule a fetch for `variant`, superseding any live request for the
    /// same candidate.
    fn dispatch(&mut self, index: usize, variant: Variant) {
        self.supersede(index);

        let element = self.candidates[index].element.clone();
        let attribute = match variant {
            Variant::Small => self.options.markup.small_attribute(),
            Variant::Full => self.options.markup.full_attribute(),
        };
        let Some(url) = self.page.attribute(&element, &attribute).filter(|url| !url.is_empty())
        else {
            let failure = LoadFailure {
                url: String::new(),
                variant,
                attempts: 0,
                error: FetchError::MissingSource { attribute },
            };
            self.give_up(index, failure);
            return;
        };

        let id = RequestId(self.next_request);
        self.next_request += 1;

        let phase = match self.runtime.set_timeout(self.options.load_delay(), Task::StartFetch(id)) {
            Ok(timer) => Phase::Delayed(timer),
            Err(e) => {
                warn!("{}; fetching {} without delay", e, id);
                Phase::Fetching
            }
        };
        debug!("dispatched {} {} for {:?}: {}", variant, id, element, url);
        self.in_flight.push(LoadRequest {
            id,
            candidate: index,
            variant,
            url,
            attempt: 0,
            token: CancelToken::new(),
            phase,
        });
        if phase == Phase::Fetching {
            self.start_fetch(id);
        }
    }

    fn supersede(&mut self, index: usize) {
        if let Some(pos) = self.in_flight.iter().position(|r| r.candidate == index) {
            let request = self.in_flight.remove(pos);
            debug!("{} {} superseded", request.variant, request.id);
            self.cancel(&request);
        }
    }

    fn cancel(&mut self, request: &LoadRequest) {
        request.token.cancel();
        match request.phase {
            Phase::Delayed(timer) => self.runtime.clear_timeout(timer),
            Phase::Fetching => self.runtime.abort_fetch(request.id),
        }
    }

    fn requeue(&mut self, request: &LoadRequest) {
        let index = request.candidate;
        match request.variant {
            Variant::Small => {
                self.small_pending.retain(|&i| i != index);
                self.candidates[index].plan = None;
                self.full_pending.push(index);
            }
            Variant::Full => {
                let element = &self.candidates[index].element;
                let status = LoadStatus::read(&self.page, element, &self.options.markup);
                if status == LoadStatus::LoadedSmall {
                    self.small_pending.push(index);
                } else {
                    self.full_pending.push(index);
                }
            }
        }
    }

    fn show(&mut self, request: &LoadRequest) {
        let element = self.candidates[request.candidate].element.clone();
        let markup = &self.options.markup;
        let surface = Surface::of(&self.page, &element, markup);

        match request.variant {
            Variant::Small => {
                self.page.add_class(&element, &markup.loaded_sm_class());
            }
            Variant::Full => {
                self.page.remove_class(&element, &markup.not_loaded_class());
                self.page.remove_class(&element, &markup.loaded_sm_class());
                self.page.add_class(&element, &markup.is_loaded_class());
            }
        }
        surface.apply(&mut self.page, &element, &request.url);

        debug!("{:?} shows {} variant {}", element, request.variant, request.url);
        self.hooks.loaded(&element, request.variant);
    }

    fn handle_failure(&mut self, pos: usize, error: FetchError) {
        let max_retries = self.options.retry.max_retries;
        if self.in_flight[pos].attempt < max_retries {
            let id = self.in_flight[pos].id;
            match self.runtime.set_timeout(self.options.retry.backoff(), Task::StartFetch(id)) {
                Ok(timer) => {
                    let request = &mut self.in_flight[pos];
                    request.attempt += 1;
                    request.phase = Phase::Delayed(timer);
                    warn!(
                        "{} {} failed ({}), retry {}/{}",
                        request.variant, request.id, error, request.attempt, max_retries
                    );
                    return;
                }
                Err(e) => warn!("{} failed ({}) and cannot be retried: {}", id, error, e),
            }
        }

        let request = self.in_flight.remove(pos);
        match request.variant {
            Variant::Small => {
                warn!("small variant {} failed ({}), falling back to full", request.url, error);
                let index = request.candidate;
                self.small_pending.retain(|&i| i != index);
                self.candidates[index].plan = Some(LoadPlan::FullOnly);
                self.dispatch(index, Variant::Full);
            }
            Variant::Full => {
                let failure = LoadFailure {
                    url: request.url,
                    variant: request.variant,
                    attempts: request.attempt + 1,
                    error,
                };
                self.give_up(request.candidate, failure);
            }
        }
    }

    fn give_up(&mut self, index: usize, failure: LoadFailure) {
        let element = self.candidates[index].element.clone();
        warn!("giving up on {:?}: {}", element, failure);

        self.small_pending.retain(|&i| i != index);
        let markup = &self.options.markup;
        self.page.remove_class(&element, &markup.not_loaded_class());
        self.page.remove_class(&element, &markup.loaded_sm_class());
        self.page.add_class(&element, &markup.failed_class());

        self.hooks.failed(&element, &failure);
    }

    pub fn state(&self) -> LoaderState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == LoaderState::Active
    }

    pub fn is_completed(&self) -> bool {
        self.state == LoaderState::Completed
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn page(&self) -> &P {
        &self.page
    }

    pub fn page_mut(&mut self) -> &mut P {
        &mut self.page
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn runtime_mut(&mut self) -> &mut R {
        &mut self.runtime
    }

    /// Captured candidates, in capture order.
    pub fn candidates(&self) -> impl Iterator<Item = &P::Element> {
        self.candidates.iter().map(|c| &c.element)
    }

    /// Number of candidates not dispatched yet.
    pub fn pending_full(&self) -> usize {
        self.full_pending.len()
    }

    /// Number of candidates waiting on their full fetch after the small one.
    pub fn pending_small(&self) -> usize {
        self.small_pending.len()
    }

    /// Number of live requests (delayed or fetching).
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Whether a throttled scan is scheduled.
    pub fn scan_scheduled(&self) -> bool {
        self.poll.is_some()
    }

    /// Status of an element, read from its classes.
    pub fn status_of(&self, element: &P::Element) -> LoadStatus {
        LoadStatus::read(&self.page, element, &self.options.markup)
    }

    /// The plan fixed for a candidate when it was dispatched.
    pub fn plan_of(&self, element: &P::Element) -> Option<LoadPlan> {
        self.candidates.iter().find(|c| &c.element == element).and_then(|c| c.plan)
    }
}

impl<P: Page, R> std::fmt::Debug for Loader<P, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader")
            .field("state", &self.state)
            .field("candidates", &self.candidates.len())
            .field("full_pending", &self.full_pending)
            .field("small_pending", &self.small_pending)
            .field("in_flight", &self.in_flight.len())
            .field("listening", &self.listening)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MarkupConfig;
    use crate::geometry::Rect;
    use crate::sim::{FetchScript, MemoryPage, NodeId, NodeSpec, Scheduled, Trace, VirtualRuntime};

    fn loader_with(page: MemoryPage) -> Loader<MemoryPage, VirtualRuntime> {
        let runtime = VirtualRuntime::new(FetchScript::default(), Trace::new());
        Loader::new(page, runtime, Options::default())
    }

    fn one_image(small: Option<&str>) -> (MemoryPage, NodeId) {
        let mut page = MemoryPage::new(1024.0, 768.0);
        let rect = Rect::new(0.0, 0.0, 100.0, 100.0);
        let spec = NodeSpec::image(&MarkupConfig::default(), rect, "/full.jpg", small);
        let el = page.append(page.body(), spec);
        (page, el)
    }

    #[test]
    fn test_activate_dispatches_visible_element_after_delay() {
        let (page, el) = one_image(Some("/small.jpg"));
        let mut loader = loader_with(page);
        loader.activate();

        assert_eq!(loader.state(), LoaderState::Active);
        assert_eq!(loader.pending_full(), 0);
        assert_eq!(loader.in_flight(), 1);
        assert_eq!(loader.plan_of(&el), Some(LoadPlan::FullOnly));
        // Nothing fetched until the delay elapses
        assert!(loader.runtime().fetches().is_empty());
        assert!(loader.runtime().is_listening());
    }

    #[test]
    fn test_stale_completion_is_ignored() {
        let (page, el) = one_image(None);
        let mut loader = loader_with(page);
        loader.activate();

        loader.fetch_complete(RequestId(42), Ok(()));
        assert_eq!(loader.status_of(&el), LoadStatus::NotLoaded);
        assert_eq!(loader.in_flight(), 1);
    }

    #[test]
    fn test_completion_before_fetch_started_is_ignored() {
        let (page, el) = one_image(None);
        let mut loader = loader_with(page);
        loader.activate();

        // Request 0 is still waiting on its delay timer
        loader.fetch_complete(RequestId(0), Ok(()));
        assert_eq!(loader.status_of(&el), LoadStatus::NotLoaded);
    }

    #[test]
    fn test_full_cycle_by_hand() {
        let (page, el) = one_image(None);
        let mut loader = loader_with(page);
        loader.activate();

        let Some(Scheduled::Timer(_, task)) = loader.runtime_mut().pop_next() else {
            panic!("expected the delay timer");
        };
        assert_eq!(task, Task::StartFetch(RequestId(0)));
        loader.run_task(task);
        assert_eq!(loader.runtime().fetches().len(), 1);

        loader.fetch_complete(RequestId(0), Ok(()));
        assert_eq!(loader.status_of(&el), LoadStatus::Loaded);
        assert_eq!(loader.page().source(el), Some("/full.jpg"));
        assert!(loader.is_completed());
        assert!(!loader.runtime().is_listening());
    }

    #[test]
    fn test_missing_full_source_fails_immediately() {
        let mut page = MemoryPage::new(1024.0, 768.0);
        let markup = MarkupConfig::default();
        let spec = NodeSpec::container(Rect::new(0.0, 0.0, 10.0, 10.0))
            .with_class(&markup.image_class())
            .with_class(&markup.not_loaded_class());
        let el = page.append(page.body(), spec);

        let mut loader = loader_with(page);
        loader.activate();
        assert_eq!(loader.status_of(&el), LoadStatus::Failed);
        assert!(loader.is_completed());
    }

    #[test]
    fn test_throttle_reuses_pending_timer() {
        let mut page = MemoryPage::new(1024.0, 768.0);
        let rect = Rect::new(0.0, 2000.0, 10.0, 10.0);
        let spec = NodeSpec::image(&MarkupConfig::default(), rect, "/a.jpg", None);
        page.append(page.body(), spec);
        let mut loader = loader_with(page);
        loader.activate();

        assert!(loader.handle_event(PageEvent::Scroll));
        assert!(!loader.handle_event(PageEvent::Scroll));
        assert!(!loader.handle_event(PageEvent::Resize));
        assert!(loader.scan_scheduled());

        loader.run_task(Task::Scan);
        assert!(!loader.scan_scheduled());
        assert!(loader.handle_event(PageEvent::Load));
    }

    #[test]
    fn test_deactivate_cancels_and_requeues() {
        let (page, el) = one_image(None);
        let mut loader = loader_with(page);
        loader.activate();
        assert_eq!(loader.in_flight(), 1);

        loader.deactivate();
        assert_eq!(loader.state(), LoaderState::Deactivated);
        assert_eq!(loader.in_flight(), 0);
        assert_eq!(loader.pending_full(), 1);
        assert_eq!(loader.runtime().pending(), 0);
        assert!(!loader.handle_event(PageEvent::Scroll));

        // Resuming dispatches it again
        loader.activate();
        assert_eq!(loader.in_flight(), 1);
        assert_eq!(loader.status_of(&el), LoadStatus::NotLoaded);
    }
}
