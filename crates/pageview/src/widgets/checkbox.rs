use crate::locator::{quote, Locator};
use crate::result::{ViewError, ViewResult};
use crate::widget::{Clickable, Node, Placeholder, Widget};
use serde_json::Value;

/// HTML checkbox
#[derive(Debug)]
pub struct Checkbox {
    node: Node,
}

impl Checkbox {
    /// Checkbox at an explicit locator
    pub fn located(locator: impl Into<Locator>) -> Placeholder<Self> {
        Placeholder::located(locator, |node| Self { node })
    }

    /// Checkbox by `id`
    pub fn by_id(id: &str) -> Placeholder<Self> {
        Self::located(format!(".//input[@type='checkbox' and @id={}]", quote(id)))
    }

    /// Checkbox by `name`
    pub fn by_name(name: &str) -> Placeholder<Self> {
        Self::located(format!(".//input[@type='checkbox' and @name={}]", quote(name)))
    }

    /// Whether the box is checked
    pub fn is_checked(&self) -> ViewResult<bool> {
        self.node.is_selected()
    }
}

impl Widget for Checkbox {
    fn node(&self) -> &Node {
        &self.node
    }

    fn read(&self) -> ViewResult<Value> {
        Ok(Value::Bool(self.is_checked()?))
    }

    fn fill_value(&self, value: &Value) -> ViewResult<bool> {
        let Value::Bool(wanted) = value else {
            return Err(ViewError::invalid(self.node.path(), format!("expected a boolean, got {value}")));
        };
        if self.is_checked()? == *wanted {
            return Ok(false);
        }
        tracing::info!(widget = %self.node.path(), checked = wanted, "toggle");
        self.node.click()?;
        Ok(true)
    }
}

impl Clickable for Checkbox {}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::mock::MockElement;
    use crate::widget::Bind;
    use crate::widgets::testing::setup;

    #[test]
    fn test_fill_toggles_only_when_different() {
        let (mock, _browser, root) = setup();
        let el = mock.add(
            None,
            ".//input[@type='checkbox' and @id='masterToggle']",
            MockElement::input("checkbox"),
        );
        let checkbox = Checkbox::by_id("masterToggle").bind(&root, "check_all");
        assert_eq!(checkbox.read().unwrap(), Value::Bool(false));
        assert!(checkbox.fill(&Value::Bool(true)).unwrap());
        assert!(mock.get_selected(&el));
        mock.clear_history();
        assert!(!checkbox.fill(&Value::Bool(true)).unwrap());
        assert!(!mock.was_called("click"));
    }

    #[test]
    fn test_rejects_non_boolean() {
        let (mock, _browser, root) = setup();
        mock.add(None, ".//input[@type='checkbox' and @name='enabled']", MockElement::input("checkbox"));
        let checkbox = Checkbox::by_name("enabled").bind(&root, "enabled");
        assert!(matches!(checkbox.fill(&Value::from("yes")), Err(ViewError::InvalidValue { .. })));
    }
}
