use crate::locator::quote;
use crate::result::ViewResult;
use crate::view::{CreateView, FillStrategy, View};
use crate::widget::{value_as_text, Node, Placeholder, Widget};
use serde_json::Value;
use std::ops::Deref;

/// Bootstrap tab: a `nav-tabs` entry and the view it reveals.
///
/// Reading selects the tab first. Filling selects it only when the content
/// does not already hold the requested values. The content view is reachable
/// through `Deref`.
#[derive(Debug)]
pub struct Tab<V> {
    node: Node,
    name: String,
    content: V,
}

impl<V: CreateView> Tab<V> {
    /// Tab labelled `name` whose content is `V`
    pub fn named(name: &str) -> Placeholder<Self> {
        let name = name.to_string();
        Placeholder::new(V::root_locator(), move |node| Self {
            content: V::create(node.clone()),
            node,
            name,
        })
    }

    /// Selector of the tab entry labelled `name`
    #[must_use]
    pub fn tab_locator(name: &str) -> String {
        format!(
            ".//ul[contains(@class, \"nav-tabs\")]/li[normalize-space(.)={}]",
            quote(name)
        )
    }

    /// Tab label
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn entry_node(&self) -> &Node {
        self.node.parent().unwrap_or(&self.node)
    }

    /// Whether this tab is the active one
    pub fn is_active(&self) -> ViewResult<bool> {
        let el = self.entry_node().find(&Self::tab_locator(&self.name))?;
        Ok(self.node.browser().classes(&el)?.iter().any(|c| c == "active"))
    }

    /// Activate the tab unless it already is
    pub fn select(&self) -> ViewResult<()> {
        if self.is_active()? {
            return Ok(());
        }
        tracing::info!(tab = %self.name, widget = %self.node.path(), "select tab");
        let el = self.entry_node().find(&format!("{}/a", Self::tab_locator(&self.name)))?;
        self.node.browser().click(&el)
    }

    /// The content view
    pub const fn content(&self) -> &V {
        &self.content
    }

    /// Whether the content already reads as `value`, without selecting the tab
    fn holds(&self, value: &Value) -> bool {
        self.content
            .read()
            .is_ok_and(|current| covers(&current, value))
    }
}

/// `current` agrees with every non-null entry of `wanted`; scalars compare as text
fn covers(current: &Value, wanted: &Value) -> bool {
    match (current, wanted) {
        (_, Value::Null) => true,
        (Value::Object(have), Value::Object(want)) => want
            .iter()
            .all(|(key, v)| v.is_null() || have.get(key).is_some_and(|h| covers(h, v))),
        (Value::Array(have), Value::Array(want)) => {
            have.len() == want.len() && have.iter().zip(want).all(|(h, w)| covers(h, w))
        }
        (Value::Object(_) | Value::Array(_), _) | (_, Value::Object(_) | Value::Array(_)) => false,
        (have, want) => value_as_text(have) == value_as_text(want),
    }
}

impl<V> Deref for Tab<V> {
    type Target = V;

    fn deref(&self) -> &V {
        &self.content
    }
}

impl<V: CreateView> Widget for Tab<V> {
    fn node(&self) -> &Node {
        &self.node
    }

    fn is_displayed(&self) -> bool {
        let entry = self.entry_node().find(&Self::tab_locator(&self.name));
        entry.is_ok_and(|el| self.node.browser().is_displayed(&el).unwrap_or(false))
    }

    fn read(&self) -> ViewResult<Value> {
        self.select()?;
        self.content.read()
    }

    fn fill_value(&self, value: &Value) -> ViewResult<bool> {
        if self.holds(value) {
            tracing::debug!(tab = %self.name, widget = %self.node.path(), "already set");
            return Ok(false);
        }
        self.select()?;
        self.content.fill(value)
    }
}

impl<V: CreateView> View for Tab<V> {
    fn widgets(&self) -> Vec<(&'static str, &dyn Widget)> {
        self.content.widgets()
    }

    fn fill_strategy(&self) -> FillStrategy {
        self.content.fill_strategy()
    }
}
