use crate::alert::AlertHandling;
use crate::locator::quote;
use crate::result::ViewResult;
use crate::widget::{Clickable, Node, Placeholder, Widget};

/// PatternFly/Bootstrap button (`a`, `button` or button-typed `input` with `btn`)
#[derive(Debug)]
pub struct Button {
    node: Node,
}

impl Button {
    /// Locator of a button matching an XPath condition
    #[must_use]
    pub fn locator_for(conditions: &str) -> String {
        format!(
            ".//*[(self::a or self::button or (self::input and (@type=\"button\" or @type=\"submit\"))) \
             and contains(@class, \"btn\") and ({conditions})]"
        )
    }

    fn declare(conditions: &str) -> Placeholder<Self> {
        Placeholder::located(Self::locator_for(conditions), |node| Self { node })
    }

    /// Button whose normalized text equals `text`
    pub fn text(text: &str) -> Placeholder<Self> {
        Self::declare(&format!("normalize-space(.)={}", quote(text)))
    }

    /// Button whose normalized text contains `text`
    pub fn contains(text: &str) -> Placeholder<Self> {
        Self::declare(&format!("contains(normalize-space(.), {})", quote(text)))
    }

    /// Button matching every attribute
    pub fn with_attrs(attrs: &[(&str, &str)]) -> Placeholder<Self> {
        let conditions = attrs
            .iter()
            .map(|(name, value)| format!("@{name}={}", quote(value)))
            .collect::<Vec<_>>()
            .join(" and ");
        Self::declare(&conditions)
    }

    /// Whether the button carries the `active` class
    pub fn active(&self) -> ViewResult<bool> {
        self.node.has_class("active")
    }

    /// Whether the button is disabled
    pub fn disabled(&self) -> ViewResult<bool> {
        Ok(self.node.attribute("disabled")?.as_deref() == Some("disabled")
            || self.node.has_class("disabled")?)
    }

    /// Click and handle the alert the click raises
    pub fn click_handling_alert(&self, handling: AlertHandling) -> ViewResult<()> {
        self.node.click_handling_alert(handling)
    }
}

impl Widget for Button {
    fn node(&self) -> &Node {
        &self.node
    }
}

impl Clickable for Button {}
