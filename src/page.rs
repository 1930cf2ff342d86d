//! Abstraction over the document the loader reads and mutates.
//!
//! The loader never touches a DOM directly; it goes through [`Page`], which
//! the browser binding implements over `web_sys` and the simulator implements
//! over an in-memory node arena.

use std::fmt::Debug;

use crate::config::MarkupConfig;
use crate::geometry::{Rect, Viewport};

/// A document holding candidate elements.
pub trait Page {
    /// Handle to a single element. Cheap to clone, compared by identity.
    type Element: Clone + PartialEq + Debug;

    /// All elements matching `markup.selector()`, in document order.
    fn query_candidates(&self, markup: &MarkupConfig) -> Vec<Self::Element>;

    /// Whether the element has no rendered box (`offsetParent === null`).
    fn is_hidden(&self, element: &Self::Element) -> bool;

    /// Border box relative to the viewport.
    fn bounding_rect(&self, element: &Self::Element) -> Rect;

    /// The element's parent, or `None` once the document body is reached.
    fn parent(&self, element: &Self::Element) -> Option<Self::Element>;

    /// Current root viewport dimensions.
    fn viewport(&self) -> Viewport;

    fn has_class(&self, element: &Self::Element, class: &str) -> bool;

    fn add_class(&mut self, element: &Self::Element, class: &str);

    fn remove_class(&mut self, element: &Self::Element, class: &str);

    fn attribute(&self, element: &Self::Element, name: &str) -> Option<String>;

    /// Set the `src` of an image element.
    fn set_source(&mut self, element: &Self::Element, url: &str);

    /// Set `background-image: url("...")` on an element.
    fn set_background_image(&mut self, element: &Self::Element, url: &str);
}

/// How a candidate displays its image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    /// `<img>` whose `src` is swapped
    Image,
    /// Any element whose CSS background is swapped
    Background,
}

impl Surface {
    /// Background candidates are recognised by the background class; anything
    /// else is treated as an image.
    pub fn of<P: Page>(page: &P, element: &P::Element, markup: &MarkupConfig) -> Self {
        if page.has_class(element, &markup.background_class()) {
            Surface::Background
        } else {
            Surface::Image
        }
    }

    /// Show `url` on the element.
    pub fn apply<P: Page>(self, page: &mut P, element: &P::Element, url: &str) {
        match self {
            Surface::Image => page.set_source(element, url),
            Surface::Background => page.set_background_image(element, url),
        }
    }
}

/// Format a URL the way it is written into `background-image`.
pub fn css_url(url: &str) -> String {
    format!("url(\"{}\")", url.replace('"', "\\\""))
}
