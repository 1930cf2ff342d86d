//! Scripted scroll/resize scenarios replayed through the simulator.
//!
//! Scenario files are JSON5 (comments and trailing commas allowed):
//!
//! ```json5
//! {
//!   name: "gallery",
//!   viewport: { width: 1280, height: 720 },
//!   options: { throttle: 100, smBreakpoint: 600 },
//!   fetch: { latency: 40, urls: { "/broken.jpg": { status: 404 } } },
//!   page: [
//!     { name: "hero", kind: "image", rect: [0, 0, 1280, 400], full: "/hero.jpg" },
//!     { name: "feed", rect: [0, 400, 1280, 300], children: [
//!       { name: "card", kind: "background", rect: [0, 900, 400, 200], full: "/card.jpg" },
//!     ]},
//!   ],
//!   steps: [
//!     { do: "wait", ms: 200 },
//!     { do: "scrollContainer", name: "feed", top: 500 },
//!     { do: "scroll", y: 10 },
//!     { do: "settle" },
//!   ],
//! }
//! ```

use std::collections::HashSet;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{ConfigError, Options};
use crate::geometry::{Rect, Viewport};
use crate::loader::LoaderState;
use crate::page::Surface;
use crate::runtime::PageEvent;
use crate::sim::{FetchScript, MemoryPage, NodeId, NodeSpec, Simulation, TraceEntry, TraceEvent};
use crate::status::LoadStatus;

/// Error loading or running a scenario.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ScenarioError {
    #[error("Failed to read scenario: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse scenario: {0}")]
    Parse(#[from] json5::Error),
    #[error("Scenario step refers to unknown element '{0}'")]
    UnknownElement(String),
    #[error("Element name '{0}' is used more than once")]
    DuplicateName(String),
    #[error("Scenario did not settle within the delivery limit")]
    Unsettled,
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// What kind of node an element spec describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    #[default]
    Container,
    Image,
    Background,
}

/// One node of the scenario page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementSpec {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub kind: ElementKind,
    /// `[x, y, width, height]` in document coordinates
    pub rect: [f64; 4],
    #[serde(default)]
    pub full: Option<String>,
    #[serde(default)]
    pub small: Option<String>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub children: Vec<ElementSpec>,
}

/// One scripted action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "do", rename_all = "camelCase")]
pub enum Step {
    /// Scroll the window and fire `scroll`
    Scroll { y: f64 },
    /// Scroll a named container (no window event)
    ScrollContainer { name: String, top: f64 },
    /// Resize the viewport and fire `resize`
    Resize { width: f64, height: f64 },
    /// Fire a window event without changing anything
    Event { kind: PageEvent },
    /// Let virtual time pass
    Wait { ms: u64 },
    /// Deliver everything still queued
    Settle,
    /// Manual re-scan
    Scan,
    /// Pick up appended candidates
    Refresh,
    Deactivate,
    Activate,
    /// Toggle an element's rendered box
    SetHidden { name: String, hidden: bool },
    /// Append an element under `parent` (the body when omitted)
    Append {
        #[serde(default)]
        parent: Option<String>,
        element: ElementSpec,
    },
}

/// A full scenario file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    #[serde(default)]
    pub name: Option<String>,
    pub viewport: Viewport,
    /// Replaces file-level options when present
    #[serde(default)]
    pub options: Option<Options>,
    #[serde(default)]
    pub fetch: FetchScript,
    pub page: Vec<ElementSpec>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn parse(source: &str) -> Result<Self, ScenarioError> {
        Ok(json5::from_str(source)?)
    }

    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let source = fs::read_to_string(path)?;
        Self::parse(&source)
    }

    /// Build the page, activate a loader and replay the steps.
    pub fn run(&self, options: Options) -> Result<Report, ScenarioError> {
        let errors = options.validate();
        if !errors.is_empty() {
            let messages = errors.into_iter().map(|e| e.to_string()).collect();
            return Err(ConfigError::Validation(messages).into());
        }

        let mut page = MemoryPage::new(self.viewport.width, self.viewport.height);
        let body = page.body();
        let mut names = HashSet::new();
        for spec in &self.page {
            build(&mut page, body, spec, &options, &mut names)?;
        }

        let mut sim = Simulation::new(page, options.clone(), self.fetch.clone());
        sim.activate();

        for step in &self.steps {
            self.apply(&mut sim, step, &options, &mut names)?;
        }

        Ok(Report::new(self.name.clone(), &sim))
    }

    fn apply(
        &self,
        sim: &mut Simulation,
        step: &Step,
        options: &Options,
        names: &mut HashSet<String>,
    ) -> Result<(), ScenarioError> {
        match step {
            Step::Scroll { y } => {
                sim.scroll_to(*y);
            }
            Step::ScrollContainer { name, top } => {
                let id = lookup(sim.page(), name)?;
                sim.scroll_container(id, *top);
            }
            Step::Resize { width, height } => {
                sim.resize(*width, *height);
            }
            Step::Event { kind } => {
                sim.fire(*kind);
            }
            Step::Wait { ms } => sim.advance(*ms),
            Step::Settle => {
                if !sim.settle() {
                    return Err(ScenarioError::Unsettled);
                }
            }
            Step::Scan => sim.scan(),
            Step::Refresh => {
                sim.refresh();
            }
            Step::Deactivate => sim.deactivate(),
            Step::Activate => sim.activate(),
            Step::SetHidden { name, hidden } => {
                let id = lookup(sim.page(), name)?;
                sim.page_mut().set_hidden(id, *hidden);
            }
            Step::Append { parent, element } => {
                let parent = match parent {
                    Some(name) => lookup(sim.page(), name)?,
                    None => sim.page().body(),
                };
                build(sim.page_mut(), parent, element, options, names)?;
            }
        }
        Ok(())
    }
}

fn lookup(page: &MemoryPage, name: &str) -> Result<NodeId, ScenarioError> {
    page.find(name).ok_or_else(|| ScenarioError::UnknownElement(name.to_string()))
}

fn build(
    page: &mut MemoryPage,
    parent: NodeId,
    spec: &ElementSpec,
    options: &Options,
    names: &mut HashSet<String>,
) -> Result<(), ScenarioError> {
    let [x, y, width, height] = spec.rect;
    let rect = Rect::new(x, y, width, height);
    let markup = &options.markup;

    let (full, small) = (spec.full.as_deref(), spec.small.as_deref());

    let mut node = match spec.kind {
        ElementKind::Container => NodeSpec::container(rect),
        ElementKind::Image => NodeSpec::candidate(markup, Surface::Image, rect, full, small),
        ElementKind::Background => NodeSpec::candidate(markup, Surface::Background, rect, full, small),
    };
    if let Some(name) = &spec.name {
        if !names.insert(name.clone()) {
            return Err(ScenarioError::DuplicateName(name.clone()));
        }
        node = node.named(name.clone());
    }
    if spec.hidden {
        node = node.hidden();
    }

    let id = page.append(parent, node);
    for child in &spec.children {
        build(page, id, child, options, names)?;
    }
    Ok(())
}

/// Final state of one candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementReport {
    pub id: NodeId,
    pub name: Option<String>,
    pub status: LoadStatus,
    /// URL currently displayed, if any
    pub shown: Option<String>,
}

/// Outcome of a scenario run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub name: Option<String>,
    /// Virtual time at the end of the run (ms)
    pub elapsed: u64,
    pub state: LoaderState,
    /// How many times the completion callback fired
    pub completions: usize,
    pub fetches: usize,
    pub timeline: Vec<TraceEntry>,
    pub elements: Vec<ElementReport>,
}

impl Report {
    fn new(name: Option<String>, sim: &Simulation) -> Self {
        let page = sim.page();
        let elements = sim
            .loader()
            .candidates()
            .map(|&id| ElementReport {
                id,
                name: page.name(id).map(str::to_string),
                status: sim.status(id),
                shown: page.displayed_url(id).map(str::to_string),
            })
            .collect();

        Self {
            name,
            elapsed: sim.now(),
            state: sim.loader().state(),
            completions: sim.completions(),
            fetches: sim.runtime().fetches().len(),
            timeline: sim.entries(),
            elements,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.state == LoaderState::Completed
    }

    fn label(&self, id: NodeId) -> String {
        self.elements
            .iter()
            .find(|e| e.id == id)
            .and_then(|e| e.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    /// Human-readable rendering for the terminal.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let title = self.name.as_deref().unwrap_or("scenario");
        let _ = writeln!(out, "{}: {:?} after {} ms", title, self.state, self.elapsed);

        for entry in &self.timeline {
            let line = match &entry.event {
                TraceEvent::Event { kind, delivered } => {
                    if *delivered {
                        format!("{} event", kind.name())
                    } else {
                        format!("{} event (no listener)", kind.name())
                    }
                }
                TraceEvent::ScanScheduled => "scan scheduled".to_string(),
                TraceEvent::ScanFired => "scan".to_string(),
                TraceEvent::FetchStarted { request, url, variant, attempt } => {
                    format!("fetch {} {} {} (attempt {})", request, variant, url, attempt + 1)
                }
                TraceEvent::FetchAborted { request } => format!("abort {}", request),
                TraceEvent::Loaded { element, variant } => {
                    format!("{} shows {}", self.label(*element), variant)
                }
                TraceEvent::Failed { element, url, error } => {
                    format!("{} failed: {} ({})", self.label(*element), url, error)
                }
                TraceEvent::Complete => "complete".to_string(),
                TraceEvent::Listening => "listeners attached".to_string(),
                TraceEvent::Unlistened => "listeners detached".to_string(),
            };
            let _ = writeln!(out, "  {:>6} ms  {}", entry.at, line);
        }

        let _ = writeln!(out, "elements:");
        for element in &self.elements {
            let _ = writeln!(
                out,
                "  {:<16} {:<12} {}",
                self.label(element.id),
                element.status.as_str(),
                element.shown.as_deref().unwrap_or("-")
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GALLERY: &str = r#"{
        // two images, one below the fold
        name: "gallery",
        viewport: { width: 1024, height: 768 },
        page: [
            { name: "top", kind: "image", rect: [0, 0, 100, 100], full: "/top.jpg" },
            { name: "below", kind: "image", rect: [0, 2000, 100, 100], full: "/below.jpg" },
        ],
        steps: [
            { do: "settle" },
            { do: "scroll", y: 1500 },
            { do: "settle" },
        ],
    }"#;

    #[test]
    fn test_parse_json5() {
        let scenario = Scenario::parse(GALLERY).unwrap();
        assert_eq!(scenario.name.as_deref(), Some("gallery"));
        assert_eq!(scenario.page.len(), 2);
        assert_eq!(scenario.page[0].kind, ElementKind::Image);
        assert_eq!(scenario.steps[1], Step::Scroll { y: 1500.0 });
        assert!(scenario.options.is_none());
    }

    #[test]
    fn test_run_gallery() {
        let report = Scenario::parse(GALLERY).unwrap().run(Options::default()).unwrap();
        assert!(report.is_complete());
        assert_eq!(report.completions, 1);
        assert_eq!(report.fetches, 2);
        for element in &report.elements {
            assert_eq!(element.status, LoadStatus::Loaded);
        }
        assert_eq!(report.elements[1].shown.as_deref(), Some("/below.jpg"));

        let text = report.to_text();
        assert!(text.starts_with("gallery: Completed"));
        assert!(text.contains("below shows full"));
    }

    #[test]
    fn test_unknown_element() {
        let source = r#"{
            viewport: { width: 800, height: 600 },
            page: [],
            steps: [{ do: "scrollContainer", name: "nope", top: 10 }],
        }"#;
        let err = Scenario::parse(source).unwrap().run(Options::default()).unwrap_err();
        assert!(matches!(err, ScenarioError::UnknownElement(name) if name == "nope"));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let source = r#"{
            viewport: { width: 800, height: 600 },
            page: [
                { name: "a", rect: [0, 0, 1, 1] },
                { name: "a", rect: [0, 0, 1, 1] },
            ],
        }"#;
        let err = Scenario::parse(source).unwrap().run(Options::default()).unwrap_err();
        assert!(matches!(err, ScenarioError::DuplicateName(_)));
    }

    #[test]
    fn test_invalid_options_rejected() {
        let scenario = Scenario::parse(GALLERY).unwrap();
        let mut options = Options::default();
        options.markup.prefix.clear();
        assert!(matches!(scenario.run(options), Err(ScenarioError::Config(_))));
    }
}
