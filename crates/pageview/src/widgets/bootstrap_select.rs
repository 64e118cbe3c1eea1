use super::text_list;
use crate::locator::{quote, Locator};
use crate::result::{ViewError, ViewResult};
use crate::widget::{Node, Placeholder, Widget};
use serde_json::Value;
use std::collections::BTreeSet;

const SELECTED: &str = "./div/ul/li[contains(@class, \"selected\")]/a/span[contains(@class, \"text\")]";
const ALL_OPTIONS: &str = "./div/ul/li/a/span[contains(@class, \"text\")]";

/// `bootstrap-select` dropdown replacing a hidden `select`
#[derive(Debug)]
pub struct BootstrapSelect {
    node: Node,
}

impl BootstrapSelect {
    /// Locator of the widget whose button has `data-id`
    #[must_use]
    pub fn locator_for(data_id: &str) -> String {
        format!(".//button[normalize-space(@data-id)={}]/..", quote(data_id))
    }

    /// Selector of the item labelled `text`
    #[must_use]
    pub fn item_locator(text: &str) -> String {
        format!(
            "./div/ul/li/a[./span[contains(@class, \"text\") and normalize-space(.)={}]]",
            quote(text)
        )
    }

    /// Widget by the `data-id` of its button
    pub fn by_id(data_id: &str) -> Placeholder<Self> {
        Self::located(Self::locator_for(data_id))
    }

    /// Widget at an explicit locator
    pub fn located(locator: impl Into<Locator>) -> Placeholder<Self> {
        Placeholder::located(locator, |node| Self { node })
    }

    /// Whether the menu is open
    pub fn is_open(&self) -> ViewResult<bool> {
        self.node.has_class("open")
    }

    /// Whether several items may be selected
    pub fn is_multiple(&self) -> ViewResult<bool> {
        self.node.has_class("show-tick")
    }

    /// Open the menu
    pub fn open(&self) -> ViewResult<()> {
        if !self.is_open()? {
            self.node.click()?;
        }
        Ok(())
    }

    /// Close the menu
    pub fn close(&self) -> ViewResult<()> {
        if self.is_open()? {
            self.node.click()?;
        }
        Ok(())
    }

    fn texts(&self, selector: &str) -> ViewResult<Vec<String>> {
        let browser = self.node.browser();
        self.node
            .find_all(selector)?
            .iter()
            .map(|el| browser.text(el))
            .collect()
    }

    /// Labels of every item
    pub fn all_options(&self) -> ViewResult<Vec<String>> {
        self.texts(ALL_OPTIONS)
    }

    /// Labels of the selected items
    pub fn all_selected_options(&self) -> ViewResult<Vec<String>> {
        self.texts(SELECTED)
    }

    /// Click the items in order, opening the menu first
    pub fn select_by_visible_text(&self, items: &[String]) -> ViewResult<()> {
        self.open()?;
        for item in items {
            tracing::info!(widget = %self.node.path(), item = %item, "select");
            let el = self.node.find(&Self::item_locator(item))?;
            self.node.browser().click(&el)?;
            // single selection closes the menu on each click
            if !self.is_multiple()? {
                break;
            }
        }
        self.close()
    }

    fn selection(&self) -> ViewResult<BTreeSet<String>> {
        Ok(self.all_selected_options()?.into_iter().collect())
    }

    /// Click what differs between the current selection and `items`
    fn apply(&self, items: &[String]) -> ViewResult<()> {
        let current = self.selection()?;
        let mut clicks: Vec<String> = Vec::new();
        if self.is_multiple()? {
            clicks.extend(current.iter().filter(|c| !items.contains(c)).cloned());
        }
        clicks.extend(items.iter().filter(|i| !current.contains(*i)).cloned());
        self.select_by_visible_text(&clicks)
    }
}

impl Widget for BootstrapSelect {
    fn node(&self) -> &Node {
        &self.node
    }

    fn read(&self) -> ViewResult<Value> {
        let selected = self.all_selected_options()?;
        if self.is_multiple()? {
            return Ok(Value::from(selected));
        }
        Ok(selected.into_iter().next().map_or(Value::Null, Value::String))
    }

    fn fill_value(&self, value: &Value) -> ViewResult<bool> {
        let items = text_list(&self.node.path(), value)?;
        let wanted: BTreeSet<String> = items.iter().cloned().collect();
        if self.selection()? == wanted {
            return Ok(false);
        }
        if items.len() > 1 && !self.is_multiple()? {
            return Err(ViewError::invalid(
                self.node.path(),
                "widget does not allow multiple selections",
            ));
        }
        self.apply(&items)?;
        if self.selection()? != wanted {
            tracing::warn!(widget = %self.node.path(), "selection did not stick, retrying");
            self.apply(&items)?;
            let got = self.selection()?;
            if got != wanted {
                return Err(ViewError::invalid(
                    self.node.path(),
                    format!("selected {got:?} instead of {wanted:?}"),
                ));
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::driver::ElementHandle;
    use crate::mock::{MockDriver, MockElement};
    use crate::widget::Bind;
    use crate::widgets::testing::setup;
    use serde_json::json;
    use std::rc::Rc;

    // Clicking an item anchor toggles its label in the selected list; single
    // selection also clears the others and closes the menu.
    fn page(mock: &Rc<MockDriver>, multiple: bool) -> Vec<ElementHandle> {
        let mut widget = MockElement::new("div").class("bootstrap-select");
        if multiple {
            widget = widget.class("show-tick");
        }
        let root = mock.add(None, &BootstrapSelect::locator_for("ppsetting"), widget);
        let toggled = root.clone();
        mock.on_click(&root, move |m| {
            if m.get_attribute(&toggled, "class").is_some_and(|c| c.contains("open")) {
                m.remove_class(&toggled, "open");
            } else {
                m.add_class(&toggled, "open");
            }
        });
        let labels: Vec<(ElementHandle, ElementHandle)> = ["5", "10", "20"]
            .iter()
            .map(|label| {
                let a = mock.add(Some(&root), &BootstrapSelect::item_locator(label), MockElement::new("a"));
                let span = mock.add(Some(&root), ALL_OPTIONS, MockElement::new("span").text(*label));
                (a, span)
            })
            .collect();
        let spans: Vec<ElementHandle> = labels.iter().map(|(_, span)| span.clone()).collect();
        for (a, span) in &labels {
            let (span, root, spans) = (span.clone(), root.clone(), spans.clone());
            mock.on_click(a, move |m| {
                let now = !multiple || !m.get_selected(&span);
                if !multiple {
                    spans.iter().for_each(|s| m.set_selected(s, false));
                    m.remove_class(&root, "open");
                }
                m.set_selected(&span, now);
                m.detach_all(Some(&root), SELECTED);
                for s in spans.iter().filter(|s| m.get_selected(s)) {
                    m.attach(Some(&root), SELECTED, s);
                }
            });
        }
        labels.into_iter().map(|(a, _)| a).collect()
    }

    #[test]
    fn test_single_fill_and_read() {
        let (mock, _browser, root) = setup();
        let anchors = page(&mock, false);
        let select = BootstrapSelect::by_id("ppsetting").bind(&root, "items_on_page");
        assert_eq!(select.read().unwrap(), Value::Null);
        assert!(select.fill(&json!("10")).unwrap());
        assert_eq!(select.read().unwrap(), json!("10"));
        assert!(mock.was_called(&format!("click:{}", anchors[1])));
        assert!(!select.is_open().unwrap());
        mock.clear_history();
        assert!(!select.fill(&json!("10")).unwrap());
        assert!(!mock.was_called("click"));
        assert_eq!(select.all_options().unwrap(), ["5", "10", "20"]);
    }

    #[test]
    fn test_multiple_fill_replaces_selection() {
        let (mock, _browser, root) = setup();
        page(&mock, true);
        let select = BootstrapSelect::by_id("ppsetting").bind(&root, "zones");
        assert!(select.fill(&json!(["5", "20"])).unwrap());
        assert_eq!(select.read().unwrap(), json!(["5", "20"]));
        assert!(select.fill(&json!(["10"])).unwrap());
        assert_eq!(select.read().unwrap(), json!(["10"]));
    }

    #[test]
    fn test_unknown_item() {
        let (mock, _browser, root) = setup();
        page(&mock, false);
        let select = BootstrapSelect::by_id("ppsetting").bind(&root, "items_on_page");
        assert!(matches!(select.fill(&json!("1000")), Err(ViewError::LocatorNotFound { .. })));
    }

    #[test]
    fn test_selection_that_does_not_stick() {
        let (mock, _browser, root) = setup();
        let el = mock.add(None, &BootstrapSelect::locator_for("broken"), MockElement::new("div"));
        mock.add(Some(&el), &BootstrapSelect::item_locator("x"), MockElement::new("a"));
        let select = BootstrapSelect::by_id("broken").bind(&root, "broken");
        assert!(matches!(select.fill(&json!("x")), Err(ViewError::InvalidValue { .. })));
    }
}
