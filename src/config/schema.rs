//! Configuration schema types for the progressive loader
//!
//! Defines the option record accepted at activation, the markup contract it
//! reads from the page, and the validation rules for both. Field names follow
//! the JavaScript option object (`smBreakpoint`), with snake_case aliases so
//! `progressive.toml` reads naturally.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound for `throttle`, `delay` and `retry.delay`, in milliseconds.
pub const MAX_INTERVAL_MS: u64 = 60_000;

/// Upper bound for `retry.maxRetries`.
pub const MAX_RETRIES: u32 = 16;

/// Loader options, merged from caller overrides onto the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Options {
    /// Milliseconds between a scroll/resize/load event and the re-scan it triggers
    pub throttle: u64,
    /// Milliseconds to wait before a dispatched load issues its fetch
    pub delay: u64,
    /// Viewport width (px) below which the small variant is preferred
    #[serde(alias = "sm_breakpoint")]
    pub sm_breakpoint: u32,
    /// Retry policy for failed fetches
    pub retry: RetryConfig,
    /// Class and attribute names read from the page
    pub markup: MarkupConfig,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            throttle: 300,
            delay: 100,
            sm_breakpoint: 600,
            retry: RetryConfig::default(),
            markup: MarkupConfig::default(),
        }
    }
}

impl Options {
    /// Throttle interval as a `Duration`
    pub fn throttle_interval(&self) -> Duration {
        Duration::from_millis(self.throttle)
    }

    /// Per-load start delay as a `Duration`
    pub fn load_delay(&self) -> Duration {
        Duration::from_millis(self.delay)
    }

    /// Whether a viewport of the given width counts as narrow.
    pub fn is_narrow(&self, viewport_width: f64) -> bool {
        viewport_width < f64::from(self.sm_breakpoint)
    }

    /// Validate the options and return any errors
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();

        if self.throttle > MAX_INTERVAL_MS {
            errors.push(ConfigValidationError::new(
                "throttle",
                format!("must be at most {} ms", MAX_INTERVAL_MS),
            ));
        }
        if self.delay > MAX_INTERVAL_MS {
            errors.push(ConfigValidationError::new(
                "delay",
                format!("must be at most {} ms", MAX_INTERVAL_MS),
            ));
        }
        if self.sm_breakpoint == 0 {
            errors.push(ConfigValidationError::new("smBreakpoint", "must be greater than 0"));
        }
        if self.retry.max_retries > MAX_RETRIES {
            errors.push(ConfigValidationError::new(
                "retry.maxRetries",
                format!("must be at most {}", MAX_RETRIES),
            ));
        }
        if self.retry.delay > MAX_INTERVAL_MS {
            errors.push(ConfigValidationError::new(
                "retry.delay",
                format!("must be at most {} ms", MAX_INTERVAL_MS),
            ));
        }

        let prefix = &self.markup.prefix;
        if prefix.is_empty() {
            errors.push(ConfigValidationError::new("markup.prefix", "must be a non-empty string"));
        } else if !prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            errors.push(ConfigValidationError::new(
                "markup.prefix",
                "may only contain ASCII letters, digits, '-' and '_'",
            ));
        }

        errors
    }
}

/// What to do when an image fetch fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetryConfig {
    /// Extra attempts after the first failure; 0 fails on the first error
    #[serde(alias = "max_retries")]
    pub max_retries: u32,
    /// Milliseconds between a failure and the next attempt
    pub delay: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_retries: 0, delay: 1000 }
    }
}

impl RetryConfig {
    /// Backoff before the next attempt
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.delay)
    }
}

/// Markup contract: the class and attribute names candidates carry.
///
/// Every name is derived from a single prefix, so the default prefix
/// `progressive` yields:
///
/// | Role                 | Name                        |
/// |----------------------|-----------------------------|
/// | image variant        | `progressive__img`          |
/// | background variant   | `progressive__bg`           |
/// | waiting              | `progressive--not-loaded`   |
/// | small variant shown  | `progressive--loaded-sm`    |
/// | full variant shown   | `progressive--is-loaded`    |
/// | gave up              | `progressive--failed`       |
/// | full-resolution URL  | `data-progressive`          |
/// | small-resolution URL | `data-progressive-sm`       |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkupConfig {
    pub prefix: String,
}

impl Default for MarkupConfig {
    fn default() -> Self {
        Self { prefix: "progressive".to_string() }
    }
}

impl MarkupConfig {
    pub fn image_class(&self) -> String {
        format!("{}__img", self.prefix)
    }

    pub fn background_class(&self) -> String {
        format!("{}__bg", self.prefix)
    }

    pub fn not_loaded_class(&self) -> String {
        format!("{}--not-loaded", self.prefix)
    }

    pub fn loaded_sm_class(&self) -> String {
        format!("{}--loaded-sm", self.prefix)
    }

    pub fn is_loaded_class(&self) -> String {
        format!("{}--is-loaded", self.prefix)
    }

    pub fn failed_class(&self) -> String {
        format!("{}--failed", self.prefix)
    }

    pub fn full_attribute(&self) -> String {
        format!("data-{}", self.prefix)
    }

    pub fn small_attribute(&self) -> String {
        format!("data-{}-sm", self.prefix)
    }

    /// CSS selector matching every candidate element.
    pub fn selector(&self) -> String {
        format!(".{}, .{}", self.image_class(), self.background_class())
    }
}

/// Configuration validation error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "retry.maxRetries")
    pub field: String,
    /// Error message
    pub message: String,
}

impl ConfigValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field: field.into(), message: message.into() }
    }
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "'{}' {}", self.field, self.message)
    }
}
