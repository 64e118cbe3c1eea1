//! Browser alert handling.
//!
//! Clicks that may raise a JavaScript alert take an [`AlertHandling`] policy.
//! `Forbid` treats any alert as an error; `Accept` and `Dismiss` wait for the
//! alert and close it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How to close an open alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertAction {
    /// OK / Yes / Leave
    Accept,
    /// Cancel / No / Stay
    Dismiss,
}

impl fmt::Display for AlertAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accept => write!(f, "accept"),
            Self::Dismiss => write!(f, "dismiss"),
        }
    }
}

/// Alert policy for a click
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AlertHandling {
    /// An alert after the click is an error
    #[default]
    Forbid,
    /// Accept the alert raised by the click
    Accept,
    /// Dismiss the alert raised by the click
    Dismiss,
}

impl AlertHandling {
    /// The action to take, if any
    #[must_use]
    pub const fn action(self) -> Option<AlertAction> {
        match self {
            Self::Forbid => None,
            Self::Accept => Some(AlertAction::Accept),
            Self::Dismiss => Some(AlertAction::Dismiss),
        }
    }
}

impl From<bool> for AlertHandling {
    /// `true` accepts, `false` forbids
    fn from(handle_alert: bool) -> Self {
        if handle_alert {
            Self::Accept
        } else {
            Self::Forbid
        }
    }
}

/// Record of an alert closed during the session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandledAlert {
    /// Alert text
    pub text: String,
    /// What was done with it
    pub action: AlertAction,
}

impl HandledAlert {
    /// Create a record
    #[must_use]
    pub fn new(text: impl Into<String>, action: AlertAction) -> Self {
        Self {
            text: text.into(),
            action,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handling_from_bool() {
        assert_eq!(AlertHandling::from(true), AlertHandling::Accept);
        assert_eq!(AlertHandling::from(false), AlertHandling::Forbid);
        assert_eq!(AlertHandling::default().action(), None);
        assert_eq!(AlertHandling::Dismiss.action(), Some(AlertAction::Dismiss));
    }

    #[test]
    fn test_action_display() {
        assert_eq!(AlertAction::Accept.to_string(), "accept");
        assert_eq!(HandledAlert::new("Abandon changes?", AlertAction::Dismiss).action, AlertAction::Dismiss);
    }
}
