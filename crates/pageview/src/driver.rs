//! Driver - the browser capability the runtime sits on.
//!
//! Everything above this trait (browser facade, widgets, views, navigation) is
//! written against [`Driver`], so a WebDriver client and the in-memory
//! [`crate::mock::MockDriver`] are interchangeable.
//!
//! Driver calls are synchronous and take `&self`: one logical test drives one
//! browser at a time, so implementations keep their session state behind
//! interior mutability.

use crate::alert::AlertAction;
use crate::locator::Selector;
use crate::result::ViewResult;
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Key of a W3C WebDriver element reference
pub const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Opaque reference to a DOM node.
///
/// Handles are only valid within one operation; after a page change the driver
/// reports them as stale.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementHandle {
    id: String,
}

impl ElementHandle {
    /// Wrap a driver-assigned id
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// Driver-assigned id
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The handle as a script argument
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut map = serde_json::Map::new();
        map.insert(ELEMENT_KEY.to_string(), Value::String(self.id.clone()));
        Value::Object(map)
    }

    /// Recognize an element reference in a script result
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        value
            .get(ELEMENT_KEY)
            .and_then(Value::as_str)
            .map(Self::new)
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

impl Serialize for ElementHandle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(ELEMENT_KEY, &self.id)?;
        map.end()
    }
}

struct HandleVisitor;

impl<'de> Visitor<'de> for HandleVisitor {
    type Value = ElementHandle;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a WebDriver element reference")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut id = None;
        while let Some(key) = map.next_key::<String>()? {
            if key == ELEMENT_KEY {
                id = Some(map.next_value::<String>()?);
            } else {
                map.next_value::<de::IgnoredAny>()?;
            }
        }
        id.map(ElementHandle::new)
            .ok_or_else(|| de::Error::missing_field(ELEMENT_KEY))
    }
}

impl<'de> Deserialize<'de> for ElementHandle {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(HandleVisitor)
    }
}

/// Synchronous browser automation capability.
///
/// Errors use the crate's kinds: a handle that no longer exists is
/// [`crate::ViewError::StaleElement`], a dead session is
/// [`crate::ViewError::SessionLost`], anything else is
/// [`crate::ViewError::Driver`].
pub trait Driver {
    /// Elements matching `selector`, searched under `parent` or the document
    fn find_elements(
        &self,
        selector: &Selector,
        parent: Option<&ElementHandle>,
    ) -> ViewResult<Vec<ElementHandle>>;

    /// Whether the element is visible
    fn is_displayed(&self, el: &ElementHandle) -> ViewResult<bool>;

    /// Selection state of options, checkboxes and radios
    fn is_selected(&self, el: &ElementHandle) -> ViewResult<bool>;

    /// Platform click
    fn click(&self, el: &ElementHandle) -> ViewResult<()>;

    /// Visible text
    fn text(&self, el: &ElementHandle) -> ViewResult<String>;

    /// Attribute or property value
    fn attribute(&self, el: &ElementHandle, name: &str) -> ViewResult<Option<String>>;

    /// Lowercase tag name
    fn tag_name(&self, el: &ElementHandle) -> ViewResult<String>;

    /// Type into the element
    fn send_keys(&self, el: &ElementHandle, text: &str) -> ViewResult<()>;

    /// Clear an input
    fn clear(&self, el: &ElementHandle) -> ViewResult<()>;

    /// Move the pointer over the element
    fn move_to_element(&self, el: &ElementHandle) -> ViewResult<()>;

    /// Move the pointer relative to its current position
    fn move_by_offset(&self, dx: i32, dy: i32) -> ViewResult<()>;

    /// Run JavaScript with `arguments` bound to `args`
    fn execute_script(&self, source: &str, args: &[Value]) -> ViewResult<Value>;

    /// Reload the current page
    fn refresh(&self) -> ViewResult<()>;

    /// Current URL
    fn current_url(&self) -> ViewResult<String>;

    /// Current page title
    fn title(&self) -> ViewResult<String>;

    /// Text of the open alert, `None` when there is none
    fn alert_text(&self) -> ViewResult<Option<String>>;

    /// Close the open alert
    fn handle_alert(&self, action: AlertAction) -> ViewResult<()>;

    /// CSS classes of the element
    fn classes(&self, el: &ElementHandle) -> ViewResult<Vec<String>> {
        Ok(self
            .attribute(el, "class")?
            .unwrap_or_default()
            .split_whitespace()
            .map(ToString::to_string)
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_serializes_as_element_reference() {
        let handle = ElementHandle::new("e7");
        let json = serde_json::to_value(&handle).unwrap();
        assert_eq!(json, serde_json::json!({ ELEMENT_KEY: "e7" }));
        assert_eq!(json, handle.to_value());
    }

    #[test]
    fn test_handle_from_script_result() {
        let value = serde_json::json!({ ELEMENT_KEY: "e9", "extra": 1 });
        let handle: ElementHandle = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(handle.id(), "e9");
        assert_eq!(ElementHandle::from_value(&value), Some(handle));
        assert_eq!(ElementHandle::from_value(&Value::Bool(false)), None);
    }
}
