use crate::alert::AlertHandling;
use crate::driver::ElementHandle;
use crate::locator::quote;
use crate::result::{ViewError, ViewResult};
use crate::widget::{Node, Placeholder, Widget};

const BUTTON: &str = "./button";
const ITEMS: &str = "./ul/li/a";

/// PatternFly/Bootstrap dropdown identified by its button text or title
#[derive(Debug)]
pub struct Dropdown {
    node: Node,
    text: String,
}

impl Dropdown {
    /// Locator of the dropdown whose button reads or is titled `text`
    #[must_use]
    pub fn locator_for(text: &str) -> String {
        format!(
            ".//div[contains(@class, \"dropdown\") and ./button[normalize-space(.)={0} or normalize-space(@title)={0}]]",
            quote(text)
        )
    }

    /// Selector of the item labelled `item`
    #[must_use]
    pub fn item_locator(item: &str) -> String {
        format!("./ul/li/a[normalize-space(.)={}]", quote(item))
    }

    /// Dropdown by button text or title
    pub fn new(text: &str) -> Placeholder<Self> {
        let text = text.to_string();
        Placeholder::located(Self::locator_for(&text), move |node| Self { node, text })
    }

    /// Button text
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whether the dropdown button is interactive
    pub fn is_enabled(&self) -> ViewResult<bool> {
        let button = self.node.find(BUTTON)?;
        Ok(!self.node.browser().classes(&button)?.iter().any(|c| c == "disabled"))
    }

    fn verify_enabled(&self) -> ViewResult<()> {
        if self.is_enabled()? {
            Ok(())
        } else {
            Err(ViewError::DropdownDisabled {
                text: self.text.clone(),
            })
        }
    }

    /// Whether the menu is open
    pub fn is_open(&self) -> ViewResult<bool> {
        self.node.has_class("open")
    }

    /// Open the menu
    pub fn open(&self) -> ViewResult<()> {
        self.verify_enabled()?;
        if !self.is_open()? {
            self.node.click()?;
        }
        Ok(())
    }

    /// Close the menu; `ignore_nonpresent` tolerates a vanished dropdown
    pub fn close(&self, ignore_nonpresent: bool) -> ViewResult<()> {
        let closed = self.verify_enabled().and_then(|()| {
            if self.is_open()? {
                self.node.click()?;
            }
            Ok(())
        });
        match closed {
            Err(ViewError::LocatorNotFound { .. }) if ignore_nonpresent => Ok(()),
            other => other,
        }
    }

    /// Labels of every item
    pub fn items(&self) -> ViewResult<Vec<String>> {
        let browser = self.node.browser();
        self.node.find_all(ITEMS)?.iter().map(|el| browser.text(el)).collect()
    }

    /// Whether `item` is present
    pub fn has_item(&self, item: &str) -> ViewResult<bool> {
        Ok(self.items()?.iter().any(|i| i == item))
    }

    fn item_element(&self, item: &str) -> ViewResult<ElementHandle> {
        self.node.find(&Self::item_locator(item))
    }

    /// Whether `item` can be selected
    pub fn item_enabled(&self, item: &str) -> ViewResult<bool> {
        self.verify_enabled()?;
        let el = self.item_element(item)?;
        let li = self
            .node
            .find_all_in(&el, "..")?
            .into_iter()
            .next()
            .ok_or_else(|| ViewError::not_found("..", self.node.path()))?;
        Ok(!self.node.browser().classes(&li)?.iter().any(|c| c == "disabled"))
    }

    /// Open the menu and click `item`, closing the menu afterwards
    pub fn item_select(&self, item: &str, handling: AlertHandling) -> ViewResult<()> {
        tracing::info!(dropdown = %self.text, item = %item, "select item");
        let selected = self.click_item(item, handling);
        match self.close(true) {
            Ok(()) => {}
            Err(ViewError::UnexpectedAlert { text }) => {
                tracing::warn!(alert = %text, "unexpected alert present while closing dropdown");
            }
            Err(err) if selected.is_ok() => return Err(err),
            Err(err) => tracing::debug!(error = %err, "closing dropdown failed"),
        }
        selected
    }

    fn click_item(&self, item: &str, handling: AlertHandling) -> ViewResult<()> {
        self.open()?;
        if !self.item_enabled(item)? {
            return Err(ViewError::DropdownItemDisabled {
                item: item.to_string(),
                dropdown: self.text.clone(),
            });
        }
        let el = self.item_element(item)?;
        self.node.browser().click_handling_alert(&el, handling)
    }
}

impl Widget for Dropdown {
    fn node(&self) -> &Node {
        &self.node
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::mock::{MockDriver, MockElement};
    use crate::widget::Bind;
    use crate::widgets::testing::setup;

    struct Menu {
        root: ElementHandle,
        button: ElementHandle,
        items: Vec<ElementHandle>,
    }

    fn menu(mock: &MockDriver) -> Menu {
        let root = mock.add(None, &Dropdown::locator_for("Configuration"), MockElement::new("div").class("dropdown"));
        let button = mock.add(Some(&root), BUTTON, MockElement::new("button").text("Configuration"));
        let toggled = root.clone();
        mock.on_click(&root, move |m| {
            if m.get_attribute(&toggled, "class").is_some_and(|c| c.contains("open")) {
                m.remove_class(&toggled, "open");
            } else {
                m.add_class(&toggled, "open");
            }
        });
        let items = [("Edit", false), ("Remove", false), ("Migrate", true)]
            .iter()
            .map(|(label, disabled)| {
                let a = mock.add(Some(&root), ITEMS, MockElement::new("a").text(*label));
                mock.attach(Some(&root), &Dropdown::item_locator(label), &a);
                let li = if *disabled {
                    MockElement::new("li").class("disabled")
                } else {
                    MockElement::new("li")
                };
                mock.add(Some(&a), "..", li);
                a
            })
            .collect();
        Menu { root, button, items }
    }

    #[test]
    fn test_items_and_enablement() {
        let (mock, _browser, root) = setup();
        menu(&mock);
        let dropdown = Dropdown::new("Configuration").bind(&root, "configuration");
        assert_eq!(dropdown.items().unwrap(), ["Edit", "Remove", "Migrate"]);
        assert!(dropdown.has_item("Remove").unwrap());
        assert!(dropdown.item_enabled("Edit").unwrap());
        assert!(!dropdown.item_enabled("Migrate").unwrap());
    }

    #[test]
    fn test_item_select_opens_clicks_and_closes() {
        let (mock, _browser, root) = setup();
        let page = menu(&mock);
        let dropdown = Dropdown::new("Configuration").bind(&root, "configuration");
        dropdown.item_select("Edit", AlertHandling::Forbid).unwrap();
        assert!(mock.was_called(&format!("click:{}", page.items[0])));
        assert_eq!(mock.call_count(&format!("click:{}", page.root)), 2);
        assert!(!dropdown.is_open().unwrap());
    }

    #[test]
    fn test_item_select_with_alert() {
        let (mock, _browser, root) = setup();
        let page = menu(&mock);
        mock.on_click(&page.items[1], |m| m.set_alert("Remove this item?"));
        let dropdown = Dropdown::new("Configuration").bind(&root, "configuration");
        dropdown.item_select("Remove", AlertHandling::Accept).unwrap();
        assert_eq!(mock.handled_alerts().len(), 1);
    }

    #[test]
    fn test_disabled_item_and_dropdown() {
        let (mock, _browser, root) = setup();
        let page = menu(&mock);
        let dropdown = Dropdown::new("Configuration").bind(&root, "configuration");
        let err = dropdown.item_select("Migrate", AlertHandling::Forbid).unwrap_err();
        assert!(matches!(err, ViewError::DropdownItemDisabled { ref item, .. } if item == "Migrate"));
        assert!(!dropdown.is_open().unwrap());

        mock.add_class(&page.button, "disabled");
        assert!(!dropdown.is_enabled().unwrap());
        assert!(matches!(dropdown.open(), Err(ViewError::DropdownDisabled { .. })));
    }

    #[test]
    fn test_close_tolerates_missing_dropdown() {
        let (_mock, _browser, root) = setup();
        let dropdown = Dropdown::new("Lifecycle").bind(&root, "lifecycle");
        dropdown.close(true).unwrap();
        assert!(dropdown.close(false).is_err());
    }
}
