//! Per-element load status, encoded in class membership.

use serde::{Deserialize, Serialize};

use crate::config::MarkupConfig;
use crate::page::Page;

/// Where a candidate is in its lifecycle.
///
/// ```text
/// NotLoaded ──► LoadedSmall ──► Loaded
///     │              │
///     └──────────────┴────────► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoadStatus {
    /// Waiting for any image
    NotLoaded,
    /// Small variant shown, full variant still pending
    #[serde(rename = "loaded-sm")]
    LoadedSmall,
    /// Full variant shown (terminal)
    #[serde(rename = "is-loaded")]
    Loaded,
    /// Gave up after the retry budget was spent (terminal)
    Failed,
    /// Carries none of the status classes
    Untracked,
}

impl LoadStatus {
    /// Read the status from the element's classes.
    ///
    /// Terminal classes win over pending ones, so a stale `not-loaded` next to
    /// `is-loaded` still reads as loaded.
    pub fn read<P: Page>(page: &P, element: &P::Element, markup: &MarkupConfig) -> Self {
        if page.has_class(element, &markup.is_loaded_class()) {
            LoadStatus::Loaded
        } else if page.has_class(element, &markup.failed_class()) {
            LoadStatus::Failed
        } else if page.has_class(element, &markup.loaded_sm_class()) {
            LoadStatus::LoadedSmall
        } else if page.has_class(element, &markup.not_loaded_class()) {
            LoadStatus::NotLoaded
        } else {
            LoadStatus::Untracked
        }
    }

    /// Whether a scan may dispatch a load for this element.
    pub fn is_loadable(self) -> bool {
        matches!(self, LoadStatus::NotLoaded | LoadStatus::LoadedSmall)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, LoadStatus::Loaded | LoadStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LoadStatus::NotLoaded => "not-loaded",
            LoadStatus::LoadedSmall => "loaded-sm",
            LoadStatus::Loaded => "is-loaded",
            LoadStatus::Failed => "failed",
            LoadStatus::Untracked => "untracked",
        }
    }
}

impl std::fmt::Display for LoadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loadable_and_terminal_are_disjoint() {
        for status in [
            LoadStatus::NotLoaded,
            LoadStatus::LoadedSmall,
            LoadStatus::Loaded,
            LoadStatus::Failed,
            LoadStatus::Untracked,
        ] {
            assert!(!(status.is_loadable() && status.is_terminal()), "{status}");
        }
        assert!(!LoadStatus::Untracked.is_loadable());
    }

    #[test]
    fn test_serializes_as_class_suffix() {
        for status in [LoadStatus::NotLoaded, LoadStatus::LoadedSmall, LoadStatus::Loaded] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }
}
