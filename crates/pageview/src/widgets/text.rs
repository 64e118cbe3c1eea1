use crate::locator::Locator;
use crate::result::ViewResult;
use crate::widget::{Clickable, Node, Placeholder, Widget};
use serde_json::Value;

/// Read-only text of an element
#[derive(Debug)]
pub struct Text {
    node: Node,
}

impl Text {
    /// Declare a text widget
    pub fn new(locator: impl Into<Locator>) -> Placeholder<Self> {
        Placeholder::located(locator, |node| Self { node })
    }

    /// Visible text
    pub fn text(&self) -> ViewResult<String> {
        self.node.text()
    }
}

impl Widget for Text {
    fn node(&self) -> &Node {
        &self.node
    }

    fn read(&self) -> ViewResult<Value> {
        Ok(Value::String(self.text()?))
    }
}

impl Clickable for Text {}
