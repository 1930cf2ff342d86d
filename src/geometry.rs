//! Rectangles and viewport dimensions in CSS pixels.

use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle, as returned by `getBoundingClientRect()`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn top(&self) -> f64 {
        self.y
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// The same rectangle moved by `(dx, dy)`.
    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        Self { x: self.x + dx, y: self.y + dy, ..*self }
    }

    /// Whether `self` is at least partially inside `clip` along the vertical axis.
    ///
    /// An element whose top touches the clip's bottom edge still counts as
    /// overlapping; one whose bottom touches the clip's top edge does not.
    pub fn overlaps_vertically(&self, clip: &Rect) -> bool {
        self.top() <= clip.bottom() && self.bottom() > clip.top()
    }
}

/// Dimensions of the root viewport.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Viewport {
    /// `max(documentElement.clientWidth, window.innerWidth)`
    pub width: f64,
    /// `documentElement.clientHeight`
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}
