use crate::alert::AlertHandling;
use crate::driver::ElementHandle;
use crate::locator::Locator;
use crate::result::{ViewError, ViewResult};
use crate::widget::{Node, Placeholder, Widget};
use serde_json::Value;

const ELEMENTS: &str = ".//li";

/// Breadcrumb trail
#[derive(Debug)]
pub struct BreadCrumb {
    node: Node,
}

impl BreadCrumb {
    /// Default location of the trail
    pub const ROOT: &'static str = "//ol[@class=\"breadcrumb\"]";

    /// Trail at the default location
    pub fn new() -> Placeholder<Self> {
        Self::located(Self::ROOT)
    }

    /// Trail at an explicit locator
    pub fn located(locator: impl Into<Locator>) -> Placeholder<Self> {
        Placeholder::located(locator, |node| Self { node })
    }

    fn path_elements(&self) -> ViewResult<Vec<(ElementHandle, String)>> {
        let browser = self.node.browser();
        self.node
            .find_all(ELEMENTS)?
            .into_iter()
            .map(|el| {
                let text = browser.text(&el)?;
                Ok((el, text))
            })
            .collect()
    }

    /// Location names, outermost first
    pub fn locations(&self) -> ViewResult<Vec<String>> {
        Ok(self.path_elements()?.into_iter().map(|(_, text)| text).collect())
    }

    /// Name of the `active` location
    pub fn active_location(&self) -> ViewResult<Option<String>> {
        let browser = self.node.browser();
        for (el, text) in self.path_elements()? {
            if browser.classes(&el)?.iter().any(|c| c == "active") {
                return Ok(Some(text));
            }
        }
        Ok(None)
    }

    /// Click the location called `name`
    pub fn click_location(&self, name: &str, handling: AlertHandling) -> ViewResult<()> {
        let (el, _) = self
            .path_elements()?
            .into_iter()
            .find(|(_, text)| text == name)
            .ok_or_else(|| ViewError::not_found(&format!("{ELEMENTS}[{name}]"), self.node.path()))?;
        tracing::info!(breadcrumb = %self.node.path(), location = name, "click location");
        self.node.browser().click_handling_alert(&el, handling)
    }
}

impl Widget for BreadCrumb {
    fn node(&self) -> &Node {
        &self.node
    }

    fn read(&self) -> ViewResult<Value> {
        Ok(Value::from(self.locations()?))
    }
}
