//! Flash message area.
//!
//! Messages are the visible `alert` divs under the area; the severity comes
//! from the `alert-*` class and the icon from a `pficon-*` class.

use crate::driver::ElementHandle;
use crate::locator::Locator;
use crate::result::{ViewError, ViewResult};
use crate::widget::{Node, Placeholder, Widget};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

const MESSAGES: &str = "./div[contains(@class, \"alert\")]";
const TEXT: &str = "./strong";
const ICON: &str = "./span[contains(@class, \"pficon\")]";
const CLOSE: &str = "./button[contains(@class, \"close\")]";

/// Severity of a flash message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashKind {
    /// `alert-success`
    Success,
    /// `alert-info`
    Info,
    /// `alert-warning`
    Warning,
    /// `alert-danger`
    Error,
}

impl FlashKind {
    /// Kind for an `alert-*` CSS class
    #[must_use]
    pub fn from_class(class: &str) -> Option<Self> {
        match class {
            "alert-success" => Some(Self::Success),
            "alert-info" => Some(Self::Info),
            "alert-warning" => Some(Self::Warning),
            "alert-danger" => Some(Self::Error),
            _ => None,
        }
    }

    /// Whether the kind does not indicate a problem
    #[must_use]
    pub const fn is_benign(self) -> bool {
        matches!(self, Self::Success | Self::Info)
    }
}

impl fmt::Display for FlashKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Success => "success",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// One message as read from the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    /// Severity
    #[serde(rename = "type")]
    pub kind: FlashKind,
    /// Message text
    pub text: String,
    /// Icon name without the `pficon-` prefix
    pub icon: Option<String>,
}

/// Flash message area
#[derive(Debug)]
pub struct FlashMessages {
    node: Node,
}

impl FlashMessages {
    /// Area at `locator`
    pub fn new(locator: impl Into<Locator>) -> Placeholder<Self> {
        Placeholder::located(locator, |node| Self { node })
    }

    fn message_elements(&self) -> ViewResult<Vec<ElementHandle>> {
        match self.node.find_all_visible(MESSAGES) {
            Err(ViewError::LocatorNotFound { .. }) => Ok(Vec::new()),
            other => other,
        }
    }

    fn read_message(&self, div: &ElementHandle) -> ViewResult<FlashMessage> {
        let browser = self.node.browser();
        let classes = browser.classes(div)?;
        let kind = classes
            .iter()
            .find_map(|c| FlashKind::from_class(c))
            .ok_or_else(|| {
                ViewError::invalid(self.node.path(), format!("no alert type among classes {classes:?}"))
            })?;
        let text = match self.node.find_all_in(div, TEXT)?.first() {
            Some(strong) => browser.text(strong)?,
            None => browser.text(div)?,
        };
        let mut icon = None;
        if let Some(span) = self.node.find_all_in(div, ICON)?.first() {
            icon = browser
                .classes(span)?
                .iter()
                .find_map(|c| c.strip_prefix("pficon-").map(ToString::to_string));
        }
        Ok(FlashMessage { kind, text, icon })
    }

    /// Visible messages in page order
    pub fn messages(&self) -> ViewResult<Vec<FlashMessage>> {
        self.message_elements()?
            .iter()
            .map(|div| self.read_message(div))
            .collect()
    }

    /// Close every visible message
    pub fn dismiss(&self) -> ViewResult<()> {
        let browser = self.node.browser();
        for div in self.message_elements()? {
            if let Some(close) = self.node.find_all_in(&div, CLOSE)?.first() {
                tracing::info!(message = %self.read_message(&div)?.text, "dismiss flash");
                browser.click(close)?;
            }
        }
        Ok(())
    }

    /// Fail when any message is neither success nor info
    pub fn assert_no_error(&self) -> ViewResult<()> {
        tracing::info!("asserting there are no error messages");
        for message in self.messages()? {
            if message.kind.is_benign() {
                tracing::info!(kind = %message.kind, text = %message.text, "flash");
            } else {
                tracing::error!(kind = %message.kind, text = %message.text, "flash");
                return Err(ViewError::FlashAssertion {
                    message: format!("assert_no_error: {}: {}", message.kind, message.text),
                });
            }
        }
        Ok(())
    }

    /// Fail unless a message with `text` (and `kind`, when given) is shown
    pub fn assert_message(&self, text: &str, kind: Option<FlashKind>) -> ViewResult<()> {
        tracing::info!(text, ?kind, "asserting flash message is present");
        let found = self
            .messages()?
            .iter()
            .any(|m| m.text == text && kind.map_or(true, |k| k == m.kind));
        if found {
            return Ok(());
        }
        let expected = match kind {
            Some(kind) => format!("{kind}: {text}"),
            None => text.to_string(),
        };
        Err(ViewError::FlashAssertion {
            message: format!("assert_message: {expected}"),
        })
    }
}

impl Widget for FlashMessages {
    fn node(&self) -> &Node {
        &self.node
    }

    fn read(&self) -> ViewResult<Value> {
        Ok(serde_json::to_value(self.messages()?)?)
    }
}
