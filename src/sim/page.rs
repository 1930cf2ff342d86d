//! In-memory document used by the simulator and the tests.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::MarkupConfig;
use crate::geometry::{Rect, Viewport};
use crate::page::{css_url, Page, Surface};

/// Handle to a node in a [`MemoryPage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Description of a node to append.
///
/// `rect` is the node's layout box in document coordinates, before any
/// scrolling is applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeSpec {
    pub name: Option<String>,
    pub rect: Rect,
    pub hidden: bool,
    pub classes: Vec<String>,
    pub attributes: BTreeMap<String, String>,
}

impl NodeSpec {
    /// A plain box, typically used as a scroll container.
    pub fn container(rect: Rect) -> Self {
        Self { rect, ..Default::default() }
    }

    /// A candidate `<img>` in the not-loaded state.
    pub fn image(markup: &MarkupConfig, rect: Rect, full: &str, small: Option<&str>) -> Self {
        Self::candidate(markup, Surface::Image, rect, Some(full), small)
    }

    /// A candidate with a CSS background in the not-loaded state.
    pub fn background(markup: &MarkupConfig, rect: Rect, full: &str, small: Option<&str>) -> Self {
        Self::candidate(markup, Surface::Background, rect, Some(full), small)
    }

    /// A candidate whose URL attributes may be absent.
    pub fn candidate(
        markup: &MarkupConfig,
        surface: Surface,
        rect: Rect,
        full: Option<&str>,
        small: Option<&str>,
    ) -> Self {
        let variant_class = match surface {
            Surface::Image => markup.image_class(),
            Surface::Background => markup.background_class(),
        };
        let mut spec = Self::container(rect)
            .with_class(&variant_class)
            .with_class(&markup.not_loaded_class());
        if let Some(full) = full {
            spec = spec.with_attribute(&markup.full_attribute(), full);
        }
        if let Some(small) = small {
            spec = spec.with_attribute(&markup.small_attribute(), small);
        }
        spec
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn with_class(mut self, class: &str) -> Self {
        if !self.classes.iter().any(|c| c == class) {
            self.classes.push(class.to_string());
        }
        self
    }

    pub fn with_attribute(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }
}

#[derive(Debug, Clone)]
struct Node {
    spec: NodeSpec,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    scroll_top: f64,
    source: Option<String>,
    background_image: Option<String>,
}

/// A document of nested boxes with window and container scrolling.
#[derive(Debug, Clone)]
pub struct MemoryPage {
    nodes: Vec<Node>,
    viewport: Viewport,
    scroll_y: f64,
}

impl MemoryPage {
    /// An empty document with a viewport of the given size.
    pub fn new(width: f64, height: f64) -> Self {
        let body = Node {
            spec: NodeSpec::container(Rect::new(0.0, 0.0, width, height)).named("body"),
            parent: None,
            children: Vec::new(),
            scroll_top: 0.0,
            source: None,
            background_image: None,
        };
        Self { nodes: vec![body], viewport: Viewport::new(width, height), scroll_y: 0.0 }
    }

    pub fn body(&self) -> NodeId {
        NodeId(0)
    }

    /// Append a node as the last child of `parent`.
    pub fn append(&mut self, parent: NodeId, spec: NodeSpec) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            spec,
            parent: Some(parent),
            children: Vec::new(),
            scroll_top: 0.0,
            source: None,
            background_image: None,
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Look up a node by name.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.nodes.iter().position(|n| n.spec.name.as_deref() == Some(name)).map(NodeId)
    }

    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.nodes[id.0].spec.name.as_deref()
    }

    /// Name if the node has one, `#index` otherwise.
    pub fn label(&self, id: NodeId) -> String {
        self.name(id).map(str::to_string).unwrap_or_else(|| id.to_string())
    }

    /// All nodes except the body, in document order.
    pub fn nodes(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len().saturating_sub(1));
        let mut stack: Vec<NodeId> = self.nodes[0].children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.nodes[id.0].children.iter().rev().copied());
        }
        order
    }

    pub fn scroll_y(&self) -> f64 {
        self.scroll_y
    }

    pub fn scroll_window_to(&mut self, y: f64) {
        self.scroll_y = y.max(0.0);
    }

    pub fn scroll_container_to(&mut self, id: NodeId, top: f64) {
        self.nodes[id.0].scroll_top = top.max(0.0);
    }

    pub fn set_viewport(&mut self, width: f64, height: f64) {
        self.viewport = Viewport::new(width, height);
    }

    pub fn set_hidden(&mut self, id: NodeId, hidden: bool) {
        self.nodes[id.0].spec.hidden = hidden;
    }

    pub fn classes(&self, id: NodeId) -> &[String] {
        &self.nodes[id.0].spec.classes
    }

    /// Current `src`, if one was set.
    pub fn source(&self, id: NodeId) -> Option<&str> {
        self.nodes[id.0].source.as_deref()
    }

    /// Current `background-image` style value, if one was set.
    pub fn background_image(&self, id: NodeId) -> Option<&str> {
        self.nodes[id.0].background_image.as_deref()
    }

    /// The URL the node currently displays, whether through `src` or its
    /// background.
    pub fn displayed_url(&self, id: NodeId) -> Option<&str> {
        if let Some(source) = self.source(id) {
            return Some(source);
        }
        self.background_image(id)
            .and_then(|style| style.strip_prefix("url(\""))
            .and_then(|rest| rest.strip_suffix("\")"))
    }

    fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.nodes[id.0].parent, move |p| self.nodes[p.0].parent)
    }
}

impl Page for MemoryPage {
    type Element = NodeId;

    fn query_candidates(&self, markup: &MarkupConfig) -> Vec<NodeId> {
        let image = markup.image_class();
        let background = markup.background_class();
        self.nodes()
            .into_iter()
            .filter(|&id| {
                let classes = self.classes(id);
                classes.iter().any(|c| *c == image || *c == background)
            })
            .collect()
    }

    fn is_hidden(&self, element: &NodeId) -> bool {
        self.nodes[element.0].spec.hidden || self.ancestors(*element).any(|a| self.nodes[a.0].spec.hidden)
    }

    fn bounding_rect(&self, element: &NodeId) -> Rect {
        let scrolled: f64 = self.ancestors(*element).map(|a| self.nodes[a.0].scroll_top).sum();
        self.nodes[element.0].spec.rect.translate(0.0, -(self.scroll_y + scrolled))
    }

    fn parent(&self, element: &NodeId) -> Option<NodeId> {
        self.nodes[element.0].parent.filter(|p| *p != self.body())
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn has_class(&self, element: &NodeId, class: &str) -> bool {
        self.classes(*element).iter().any(|c| c == class)
    }

    fn add_class(&mut self, element: &NodeId, class: &str) {
        let classes = &mut self.nodes[element.0].spec.classes;
        if !classes.iter().any(|c| c == class) {
            classes.push(class.to_string());
        }
    }

    fn remove_class(&mut self, element: &NodeId, class: &str) {
        self.nodes[element.0].spec.classes.retain(|c| c != class);
    }

    fn attribute(&self, element: &NodeId, name: &str) -> Option<String> {
        self.nodes[element.0].spec.attributes.get(name).cloned()
    }

    fn set_source(&mut self, element: &NodeId, url: &str) {
        self.nodes[element.0].source = Some(url.to_string());
    }

    fn set_background_image(&mut self, element: &NodeId, url: &str) {
        self.nodes[element.0].background_image = Some(css_url(url));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_order() {
        let mut page = MemoryPage::new(800.0, 600.0);
        let a = page.append(page.body(), NodeSpec::container(Rect::default()).named("a"));
        let b = page.append(page.body(), NodeSpec::container(Rect::default()).named("b"));
        let a1 = page.append(a, NodeSpec::container(Rect::default()).named("a1"));

        assert_eq!(page.nodes(), vec![a, a1, b]);
        assert_eq!(page.find("a1"), Some(a1));
        assert_eq!(page.label(b), "b");
    }

    #[test]
    fn test_query_candidates_filters_by_variant_class() {
        let markup = MarkupConfig::default();
        let mut page = MemoryPage::new(800.0, 600.0);
        let img = page.append(page.body(), NodeSpec::image(&markup, Rect::default(), "/a.jpg", None));
        page.append(page.body(), NodeSpec::container(Rect::default()));
        let bg = page.append(page.body(), NodeSpec::background(&markup, Rect::default(), "/b.jpg", None));

        assert_eq!(page.query_candidates(&markup), vec![img, bg]);
        assert!(page.query_candidates(&MarkupConfig { prefix: "other".to_string() }).is_empty());
    }

    #[test]
    fn test_bounding_rect_applies_scroll() {
        let mut page = MemoryPage::new(800.0, 600.0);
        let scroller = page.append(page.body(), NodeSpec::container(Rect::new(0.0, 100.0, 800.0, 200.0)));
        let child = page.append(scroller, NodeSpec::container(Rect::new(0.0, 400.0, 50.0, 50.0)));

        page.scroll_window_to(50.0);
        page.scroll_container_to(scroller, 120.0);

        // The container only moves with the window
        assert_eq!(page.bounding_rect(&scroller).top(), 50.0);
        assert_eq!(page.bounding_rect(&child).top(), 230.0);
    }

    #[test]
    fn test_parent_stops_at_body() {
        let mut page = MemoryPage::new(800.0, 600.0);
        let outer = page.append(page.body(), NodeSpec::container(Rect::default()));
        let inner = page.append(outer, NodeSpec::container(Rect::default()));

        assert_eq!(page.parent(&inner), Some(outer));
        assert_eq!(page.parent(&outer), None);
    }

    #[test]
    fn test_displayed_url_for_background() {
        let markup = MarkupConfig::default();
        let mut page = MemoryPage::new(800.0, 600.0);
        let bg = page.append(page.body(), NodeSpec::background(&markup, Rect::default(), "/b.jpg", None));

        page.set_background_image(&bg, "/b.jpg");
        assert_eq!(page.background_image(bg), Some("url(\"/b.jpg\")"));
        assert_eq!(page.displayed_url(bg), Some("/b.jpg"));
        assert_eq!(page.source(bg), None);
    }
}
