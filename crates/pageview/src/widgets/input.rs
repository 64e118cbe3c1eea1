use super::scalar_text;
use crate::locator::{quote, Locator};
use crate::result::{ViewError, ViewResult};
use crate::widget::{Node, Placeholder, Widget};
use serde_json::Value;

/// Script firing a bubbling `change` event on `arguments[0]`
pub const CHANGE_EVENT: &str =
    "arguments[0].dispatchEvent(new Event('change', {bubbles: true}));";

/// Text input or textarea
#[derive(Debug)]
pub struct TextInput {
    node: Node,
    secret: bool,
}

/// PatternFly input; same as [`TextInput`], which carries the help block
pub type Input = TextInput;

impl TextInput {
    fn declare(locator: impl Into<Locator>) -> Placeholder<Self> {
        Placeholder::located(locator, |node| Self {
            node,
            secret: false,
        })
    }

    /// Input or textarea by `name`
    pub fn by_name(name: &str) -> Placeholder<Self> {
        Self::declare(format!(
            ".//*[(self::input or self::textarea) and @name={}]",
            quote(name)
        ))
    }

    /// Input or textarea by `id`
    pub fn by_id(id: &str) -> Placeholder<Self> {
        Self::declare(format!(
            ".//*[(self::input or self::textarea) and @id={}]",
            quote(id)
        ))
    }

    /// Input at an explicit locator
    pub fn located(locator: impl Into<Locator>) -> Placeholder<Self> {
        Self::declare(locator)
    }

    /// Input whose value never reaches the logs
    pub fn secret(placeholder: Placeholder<Self>) -> Placeholder<Self> {
        placeholder.map(|mut input| {
            input.secret = true;
            input
        })
    }

    /// Whether the value is masked in logs
    #[must_use]
    pub const fn is_secret(&self) -> bool {
        self.secret
    }

    /// Current `value` attribute
    pub fn value(&self) -> ViewResult<String> {
        Ok(self.node.attribute("value")?.unwrap_or_default())
    }

    /// Text of the help block following the input, if any
    pub fn help_block(&self) -> ViewResult<Option<String>> {
        match self.node.find("./following-sibling::span") {
            Ok(el) => Ok(Some(self.node.browser().text(&el)?)),
            Err(ViewError::LocatorNotFound { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn shown<'a>(&self, text: &'a str) -> &'a str {
        if self.secret {
            "***"
        } else {
            text
        }
    }
}

impl Widget for TextInput {
    fn node(&self) -> &Node {
        &self.node
    }

    fn read(&self) -> ViewResult<Value> {
        Ok(Value::String(self.value()?))
    }

    fn fill_value(&self, value: &Value) -> ViewResult<bool> {
        let text = scalar_text(&self.node.path(), value)?;
        if self.value()? == text {
            tracing::debug!(widget = %self.node.path(), value = %self.shown(&text), "already set");
            return Ok(false);
        }
        tracing::info!(widget = %self.node.path(), value = %self.shown(&text), "fill");
        self.node.clear()?;
        self.node.send_keys(&text)?;
        let el = self.node.element()?;
        self.node
            .browser()
            .execute_script(CHANGE_EVENT, &[el.to_value()])?;
        Ok(true)
    }
}
