use super::text_list;
use crate::driver::ElementHandle;
use crate::locator::{quote, Locator};
use crate::result::{ViewError, ViewResult};
use crate::widget::{Node, Placeholder, Widget};
use serde_json::Value;

const OPTIONS: &str = ".//option";

/// HTML `select`, single or multiple
#[derive(Debug)]
pub struct Select {
    node: Node,
}

impl Select {
    /// Select at an explicit locator
    pub fn new(locator: impl Into<Locator>) -> Placeholder<Self> {
        Placeholder::located(locator, |node| Self { node })
    }

    /// Select by `id`
    pub fn by_id(id: &str) -> Placeholder<Self> {
        Self::new(format!(".//select[@id={}]", quote(id)))
    }

    /// Select by `name`
    pub fn by_name(name: &str) -> Placeholder<Self> {
        Self::new(format!(".//select[@name={}]", quote(name)))
    }

    /// Whether several options may be selected
    pub fn is_multiple(&self) -> ViewResult<bool> {
        Ok(self.node.attribute("multiple")?.is_some())
    }

    fn options(&self) -> ViewResult<Vec<(ElementHandle, String)>> {
        let browser = self.node.browser();
        self.node
            .find_all(OPTIONS)?
            .into_iter()
            .map(|el| {
                let text = browser.text(&el)?;
                Ok((el, text))
            })
            .collect()
    }

    /// Texts of every option
    pub fn all_options(&self) -> ViewResult<Vec<String>> {
        Ok(self.options()?.into_iter().map(|(_, text)| text).collect())
    }

    /// Texts of the selected options
    pub fn selected_options(&self) -> ViewResult<Vec<String>> {
        let browser = self.node.browser();
        let mut selected = Vec::new();
        for (el, text) in self.options()? {
            if browser.is_selected(&el)? {
                selected.push(text);
            }
        }
        Ok(selected)
    }

    /// Make exactly `items` selected; returns whether anything was clicked
    pub fn select_by_visible_text(&self, items: &[String]) -> ViewResult<bool> {
        let multiple = self.is_multiple()?;
        if items.len() > 1 && !multiple {
            return Err(ViewError::invalid(
                self.node.path(),
                "select does not allow multiple selections",
            ));
        }
        let browser = self.node.browser();
        let options = self.options()?;
        for item in items {
            if !options.iter().any(|(_, text)| text == item) {
                let locator = format!("{OPTIONS}[normalize-space(.)={}]", quote(item));
                return Err(ViewError::not_found(&locator, self.node.path()));
            }
        }
        let mut clicked = false;
        for (el, text) in &options {
            let wanted = items.contains(text);
            let selected = browser.is_selected(el)?;
            let needs_click = if multiple { wanted != selected } else { wanted && !selected };
            if needs_click {
                tracing::info!(widget = %self.node.path(), option = %text, "select");
                browser.click(el)?;
                clicked = true;
            }
        }
        Ok(clicked)
    }
}

impl Widget for Select {
    fn node(&self) -> &Node {
        &self.node
    }

    fn read(&self) -> ViewResult<Value> {
        let selected = self.selected_options()?;
        if self.is_multiple()? {
            return Ok(Value::from(selected));
        }
        Ok(selected.into_iter().next().map_or(Value::Null, Value::String))
    }

    fn fill_value(&self, value: &Value) -> ViewResult<bool> {
        let items = text_list(&self.node.path(), value)?;
        self.select_by_visible_text(&items)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::mock::{MockDriver, MockElement};
    use crate::widget::Bind;
    use crate::widgets::testing::setup;
    use serde_json::json;

    fn page(mock: &MockDriver, multiple: bool) -> Vec<ElementHandle> {
        let select = if multiple {
            MockElement::new("select").attr("multiple", "multiple")
        } else {
            MockElement::new("select")
        };
        let select = mock.add(None, ".//select[@id='zone']", select);
        ["default", "east", "west"]
            .iter()
            .map(|label| {
                mock.add(
                    Some(&select),
                    OPTIONS,
                    MockElement::new("option").text(*label).selected(*label == "default"),
                )
            })
            .collect()
    }

    #[test]
    fn test_single_select_round_trip() {
        let (mock, _browser, root) = setup();
        let options = page(&mock, false);
        let zone = Select::by_id("zone").bind(&root, "zone");
        assert_eq!(zone.read().unwrap(), json!("default"));
        assert!(zone.fill(&json!("east")).unwrap());
        assert!(mock.get_selected(&options[1]));
        assert!(!mock.get_selected(&options[0]));
        assert_eq!(zone.read().unwrap(), json!("east"));
        mock.clear_history();
        assert!(!zone.fill(&json!("east")).unwrap());
        assert!(!mock.was_called("click"));
    }

    #[test]
    fn test_multiple_select() {
        let (mock, _browser, root) = setup();
        page(&mock, true);
        let zone = Select::by_id("zone").bind(&root, "zone");
        assert!(zone.fill(&json!(["east", "west"])).unwrap());
        assert_eq!(zone.read().unwrap(), json!(["east", "west"]));
        assert_eq!(zone.all_options().unwrap(), ["default", "east", "west"]);
    }

    #[test]
    fn test_unknown_option() {
        let (mock, _browser, root) = setup();
        page(&mock, false);
        let zone = Select::by_id("zone").bind(&root, "zone");
        assert!(matches!(zone.fill(&json!("north")), Err(ViewError::LocatorNotFound { .. })));
        assert!(matches!(zone.fill(&json!(["east", "west"])), Err(ViewError::InvalidValue { .. })));
    }
}
