//! Result and error types for pageview.
//!
//! Every fallible operation in the crate returns [`ViewResult`]. The error kinds
//! follow the failure model of the runtime:
//!
//! - **Retriable**: [`ViewError::StaleElement`], retried once inside the operation
//! - **Surfaced**: everything a caller can act on (not found, ambiguous,
//!   navigation failures, timeouts, flash assertions)
//! - **Fatal**: [`ViewError::SessionLost`] and [`ViewError::PageNotSafe`]

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// Result type for pageview operations
pub type ViewResult<T> = Result<T, ViewError>;

/// Errors that can occur while driving views, widgets and navigation
#[derive(Debug, Error)]
pub enum ViewError {
    /// Locator matched nothing when one element was required
    #[error("Locator {locator} matched no element (widget {widget})")]
    LocatorNotFound {
        /// Redacted locator string
        locator: String,
        /// Path of the widget that resolved it
        widget: String,
    },

    /// Locator matched several visible elements when one was required
    #[error("Locator {locator} is ambiguous: {count} elements matched")]
    AmbiguousLocator {
        /// Redacted locator string
        locator: String,
        /// Number of matches
        count: usize,
    },

    /// Element became invalid in the middle of an operation
    #[error("Stale element reference for {locator}")]
    StaleElement {
        /// Redacted locator string (or element id)
        locator: String,
    },

    /// Destination view did not display after its step ran
    #[error(
        "Navigation to {destination} failed for {entity} via [{}]: {reason} (url: {url}, title: {title})",
        .path.join(" -> ")
    )]
    NavigationFailed {
        /// Destination name
        destination: String,
        /// Entity identity
        entity: String,
        /// Destinations traversed, outermost prerequisite first
        path: Vec<String>,
        /// Last known URL
        url: String,
        /// Last known page title
        title: String,
        /// What went wrong
        reason: String,
    },

    /// No step registered for the entity class chain and destination
    #[error("No destination {destination} registered for {entity}")]
    DestinationNotFound {
        /// Entity class or identity
        entity: String,
        /// Destination name
        destination: String,
    },

    /// Prerequisite edges form a cycle
    #[error("Navigation prerequisites form a cycle: {}", .path.join(" -> "))]
    NavigationCycle {
        /// The cycle, starting and ending at the same destination
        path: Vec<String>,
    },

    /// A tree path segment was absent
    #[error(
        "message: {message}, path: [{}], cause: {}",
        .path.join(", "),
        .cause.as_deref().unwrap_or("None")
    )]
    CandidateNotFound {
        /// First segment that could not be found
        segment: String,
        /// Full path attempted
        path: Vec<String>,
        /// Human readable message
        message: String,
        /// Optional additional cause
        cause: Option<String>,
    },

    /// A polled condition never became true
    #[error("Timed out after {timeout_ms}ms waiting for {message}")]
    TimedOut {
        /// What was waited for
        message: String,
        /// Timeout in milliseconds
        timeout_ms: u64,
    },

    /// Flash message assertion failed
    #[error("Flash assertion failed: {message}")]
    FlashAssertion {
        /// Error message
        message: String,
    },

    /// Widget does not produce a value; composite reads skip it
    #[error("Widget {widget} is not readable")]
    NotReadable {
        /// Widget path
        widget: String,
    },

    /// Widget does not accept a value
    #[error("Widget {widget} is not fillable")]
    NotFillable {
        /// Widget path
        widget: String,
    },

    /// Fill mapping named a widget the view does not declare
    #[error("View {view} has no widget named {name}")]
    UnknownWidget {
        /// View path
        view: String,
        /// Requested widget name
        name: String,
    },

    /// Value has the wrong shape for the widget
    #[error("Invalid value for {widget}: {message}")]
    InvalidValue {
        /// Widget path
        widget: String,
        /// Error message
        message: String,
    },

    /// Parametrized locator referenced an unbound name
    #[error("Parameter {name} is not bound for locator template {template}")]
    UnboundParameter {
        /// Missing parameter name
        name: String,
        /// The template being resolved
        template: String,
    },

    /// A subview was addressed while another one is live
    #[error("Subview {requested} is not live (live subview: {live})")]
    InactiveSubview {
        /// Requested subview
        requested: String,
        /// Currently live subview
        live: String,
    },

    /// No registered subview matches the reference value and there is no default
    #[error("No subview registered for {reference} = {value}")]
    NoMatchingSubview {
        /// Reference widget path
        reference: String,
        /// Reference value read
        value: String,
    },

    /// VersionPick has no entry at or below the version
    #[error("No version pick entry matches version {version}")]
    VersionUnmatched {
        /// Product version
        version: String,
    },

    /// An alert appeared where none was expected
    #[error("Unexpected alert present: {text}")]
    UnexpectedAlert {
        /// Alert text
        text: String,
    },

    /// An alert was expected but none appeared
    #[error("No alert present")]
    NoAlert,

    /// Dropdown button is disabled
    #[error("Dropdown \"{text}\" is not enabled")]
    DropdownDisabled {
        /// Dropdown text
        text: String,
    },

    /// Dropdown item is disabled
    #[error("Item \"{item}\" of dropdown \"{dropdown}\" is disabled")]
    DropdownItemDisabled {
        /// Item text
        item: String,
        /// Dropdown text
        dropdown: String,
    },

    /// Tree node has no checkbox
    #[error("Tree node {} is not checkable", .path.join("/"))]
    TreeNodeNotCheckable {
        /// Path of the node
        path: Vec<String>,
    },

    /// The page never quiesced within the hard limit
    #[error("Page did not become safe within {timeout_ms}ms")]
    PageNotSafe {
        /// Hard limit in milliseconds
        timeout_ms: u64,
    },

    /// Browser session is gone
    #[error("Browser session lost: {message}")]
    SessionLost {
        /// Error message
        message: String,
    },

    /// Other driver failure
    #[error("Driver error: {message}")]
    Driver {
        /// Error message
        message: String,
    },

    /// Configuration is invalid
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl ViewError {
    /// Build a not-found error with a redacted locator
    pub fn not_found(locator: &str, widget: impl Into<String>) -> Self {
        Self::LocatorNotFound {
            locator: redact_locator(locator),
            widget: widget.into(),
        }
    }

    /// Build an ambiguity error with a redacted locator
    pub fn ambiguous(locator: &str, count: usize) -> Self {
        Self::AmbiguousLocator {
            locator: redact_locator(locator),
            count,
        }
    }

    /// Build a stale-element error with a redacted locator
    pub fn stale(locator: &str) -> Self {
        Self::StaleElement {
            locator: redact_locator(locator),
        }
    }

    /// Build an invalid-value error
    pub fn invalid(widget: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            widget: widget.into(),
            message: message.into(),
        }
    }

    /// Attach the widget path to a not-found error raised below the widget layer
    #[must_use]
    pub fn with_widget(self, path: &str) -> Self {
        match self {
            Self::LocatorNotFound { locator, widget } if widget.is_empty() => {
                Self::LocatorNotFound {
                    locator,
                    widget: path.to_string(),
                }
            }
            other => other,
        }
    }

    /// Whether the operation may be retried once transparently
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::StaleElement { .. })
    }

    /// Whether the error ends the session (never swallowed by waits)
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::SessionLost { .. } | Self::PageNotSafe { .. })
    }

    /// Whether composite reads omit the widget instead of failing
    #[must_use]
    pub const fn is_skip(&self) -> bool {
        matches!(
            self,
            Self::NotReadable { .. } | Self::InactiveSubview { .. } | Self::LocatorNotFound { .. }
        )
    }
}

fn literal_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r#"'[^']*'|"[^"]*""#).ok())
        .as_ref()
}

fn mentions_secret(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    ["password", "secret", "token", "key"]
        .iter()
        .any(|word| lower.contains(word))
}

/// Mask quoted literals that follow secret-looking words in a locator.
///
/// `.//input[@name='password' and @value='hunter2']` keeps its shape but the
/// literal compared after `password` becomes `'***'`.
#[must_use]
pub fn redact_locator(locator: &str) -> String {
    let Some(pattern) = literal_pattern() else {
        return locator.to_string();
    };
    let mut out = String::with_capacity(locator.len());
    let mut last = 0;
    let mut armed = false;
    for literal in pattern.find_iter(locator) {
        let between = &locator[last..literal.start()];
        out.push_str(between);
        armed |= mentions_secret(between);
        let text = literal.as_str();
        if armed {
            let quote = &text[..1];
            out.push_str(quote);
            out.push_str("***");
            out.push_str(quote);
            armed = false;
        } else {
            out.push_str(text);
            armed = mentions_secret(&text[1..text.len() - 1]);
        }
        last = literal.end();
    }
    out.push_str(&locator[last..]);
    out
}
