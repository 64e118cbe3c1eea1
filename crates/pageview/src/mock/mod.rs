//! In-memory driver for testing views, widgets and navigation without a browser.
//!
//! [`MockDriver`] holds a tiny DOM: elements are registered under a parent (or
//! the document) and an exact selector string, and `find_elements` returns what
//! was registered for that pair. Click and script handlers let a test model page
//! behaviour; every driver call lands in a history that tests inspect.
//!
//! ## Example
//!
//! ```
//! use pageview::mock::{MockDriver, MockElement};
//! use pageview::Driver;
//!
//! let mock = MockDriver::new();
//! let form = mock.add(None, ".//form", MockElement::new("form"));
//! let name = mock.add(Some(&form), ".//input[@name='name']", MockElement::input("text"));
//!
//! mock.send_keys(&name, "foo").unwrap();
//! assert_eq!(mock.get_attribute(&name, "value").as_deref(), Some("foo"));
//! assert!(mock.was_called("send_keys"));
//! ```

use crate::alert::AlertAction;
use crate::driver::{Driver, ElementHandle};
use crate::locator::Selector;
use crate::result::{ViewError, ViewResult};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

pub mod trees;

/// Behaviour attached to clicking an element
pub type ClickHandler = Rc<dyn Fn(&MockDriver)>;

/// Behaviour attached to scripts containing a given fragment
pub type ScriptHandler = Rc<dyn Fn(&MockDriver, &[Value]) -> Value>;

/// Behaviour attached to page refresh
pub type RefreshHandler = Rc<dyn Fn(&MockDriver)>;

/// A DOM node in the mock page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockElement {
    /// Lowercase tag name
    pub tag: String,
    /// Visible text
    pub text: String,
    /// Attributes, including `class` and `value`
    pub attributes: BTreeMap<String, String>,
    /// Visibility
    pub displayed: bool,
    /// Selection state
    pub selected: bool,
}

impl MockElement {
    /// Visible element with the given tag
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            displayed: true,
            ..Self::default()
        }
    }

    /// `<input type=...>` with an empty value
    #[must_use]
    pub fn input(input_type: &str) -> Self {
        Self::new("input").attr("type", input_type).attr("value", "")
    }

    /// Set the text
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Set an attribute
    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Add a CSS class
    #[must_use]
    pub fn class(mut self, class: &str) -> Self {
        let classes = self.attributes.entry("class".to_string()).or_default();
        if !classes.split_whitespace().any(|c| c == class) {
            if !classes.is_empty() {
                classes.push(' ');
            }
            classes.push_str(class);
        }
        self
    }

    /// Make it invisible
    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.displayed = false;
        self
    }

    /// Set the selection state
    #[must_use]
    pub const fn selected(mut self, selected: bool) -> Self {
        self.selected = selected;
        self
    }

    fn is_toggle(&self) -> bool {
        self.tag == "input"
            && matches!(
                self.attributes.get("type").map(String::as_str),
                Some("checkbox" | "radio")
            )
    }
}

#[derive(Default)]
struct Dom {
    next_id: u64,
    elements: HashMap<String, MockElement>,
    parents: HashMap<String, Option<String>>,
    children: HashMap<(Option<String>, String), Vec<String>>,
    removed: HashSet<String>,
    stale_once: HashSet<String>,
    session_lost: Option<String>,
    alert: Option<String>,
    url: String,
    title: String,
    history: Vec<String>,
    handled_alerts: Vec<(String, AlertAction)>,
    click_handlers: HashMap<String, ClickHandler>,
    script_handlers: Vec<(String, ScriptHandler)>,
    refresh_handler: Option<RefreshHandler>,
}

/// In-memory implementation of [`Driver`]
#[derive(Default)]
pub struct MockDriver {
    dom: RefCell<Dom>,
}

impl fmt::Debug for MockDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dom = self.dom.borrow();
        f.debug_struct("MockDriver")
            .field("elements", &dom.elements.len())
            .field("url", &dom.url)
            .field("alert", &dom.alert)
            .field("calls", &dom.history.len())
            .finish_non_exhaustive()
    }
}

impl MockDriver {
    /// Empty page
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // -------------------------------------------------------------------------
    // Page construction
    // -------------------------------------------------------------------------

    /// Register `element` as the match of `selector` under `parent`
    pub fn add(
        &self,
        parent: Option<&ElementHandle>,
        selector: &str,
        element: MockElement,
    ) -> ElementHandle {
        let mut dom = self.dom.borrow_mut();
        dom.next_id += 1;
        let id = format!("e{}", dom.next_id);
        let parent_id = parent.map(|p| p.id().to_string());
        dom.elements.insert(id.clone(), element);
        dom.parents.insert(id.clone(), parent_id.clone());
        dom.children
            .entry((parent_id, selector.to_string()))
            .or_default()
            .push(id.clone());
        ElementHandle::new(id)
    }

    /// Also expose an existing element as a match of `selector` under `parent`
    pub fn attach(&self, parent: Option<&ElementHandle>, selector: &str, el: &ElementHandle) {
        let mut dom = self.dom.borrow_mut();
        let key = (parent.map(|p| p.id().to_string()), selector.to_string());
        let list = dom.children.entry(key).or_default();
        if !list.iter().any(|id| id == el.id()) {
            list.push(el.id().to_string());
        }
    }

    /// Remove an element; later operations on it are stale
    pub fn remove(&self, el: &ElementHandle) {
        let mut dom = self.dom.borrow_mut();
        dom.removed.insert(el.id().to_string());
        for list in dom.children.values_mut() {
            list.retain(|id| id != el.id());
        }
    }

    /// Drop every match of `selector` under `parent` (the elements stay alive)
    pub fn detach_all(&self, parent: Option<&ElementHandle>, selector: &str) {
        let key = (parent.map(|p| p.id().to_string()), selector.to_string());
        self.dom.borrow_mut().children.remove(&key);
    }

    fn update(&self, el: &ElementHandle, f: impl FnOnce(&mut MockElement)) {
        if let Some(element) = self.dom.borrow_mut().elements.get_mut(el.id()) {
            f(element);
        }
    }

    /// Replace the text
    pub fn set_text(&self, el: &ElementHandle, text: &str) {
        self.update(el, |e| e.text = text.to_string());
    }

    /// Set or replace an attribute
    pub fn set_attribute(&self, el: &ElementHandle, name: &str, value: &str) {
        self.update(el, |e| {
            e.attributes.insert(name.to_string(), value.to_string());
        });
    }

    /// Remove an attribute
    pub fn remove_attribute(&self, el: &ElementHandle, name: &str) {
        self.update(el, |e| {
            e.attributes.remove(name);
        });
    }

    /// Add a CSS class
    pub fn add_class(&self, el: &ElementHandle, class: &str) {
        self.update(el, |e| *e = std::mem::take(e).class(class));
    }

    /// Remove a CSS class
    pub fn remove_class(&self, el: &ElementHandle, class: &str) {
        self.update(el, |e| {
            if let Some(classes) = e.attributes.get_mut("class") {
                *classes = classes
                    .split_whitespace()
                    .filter(|c| *c != class)
                    .collect::<Vec<_>>()
                    .join(" ");
            }
        });
    }

    /// Show or hide
    pub fn set_displayed(&self, el: &ElementHandle, displayed: bool) {
        self.update(el, |e| e.displayed = displayed);
    }

    /// Select or deselect
    pub fn set_selected(&self, el: &ElementHandle, selected: bool) {
        self.update(el, |e| e.selected = selected);
    }

    /// Set the URL
    pub fn set_url(&self, url: &str) {
        self.dom.borrow_mut().url = url.to_string();
    }

    /// Set the page title
    pub fn set_title(&self, title: &str) {
        self.dom.borrow_mut().title = title.to_string();
    }

    /// Open an alert
    pub fn set_alert(&self, text: &str) {
        self.dom.borrow_mut().alert = Some(text.to_string());
    }

    // -------------------------------------------------------------------------
    // Behaviour
    // -------------------------------------------------------------------------

    /// Run `handler` after every click on `el`
    pub fn on_click(&self, el: &ElementHandle, handler: impl Fn(&Self) + 'static) {
        self.dom
            .borrow_mut()
            .click_handlers
            .insert(el.id().to_string(), Rc::new(handler));
    }

    /// Answer scripts whose source contains `fragment`; later registrations win
    pub fn on_script(
        &self,
        fragment: &str,
        handler: impl Fn(&Self, &[Value]) -> Value + 'static,
    ) {
        self.dom
            .borrow_mut()
            .script_handlers
            .insert(0, (fragment.to_string(), Rc::new(handler)));
    }

    /// Run `handler` on refresh
    pub fn on_refresh(&self, handler: impl Fn(&Self) + 'static) {
        self.dom.borrow_mut().refresh_handler = Some(Rc::new(handler));
    }

    /// The next operation on `el` fails as stale, once
    pub fn mark_stale_once(&self, el: &ElementHandle) {
        self.dom.borrow_mut().stale_once.insert(el.id().to_string());
    }

    /// Every later call fails with `SessionLost`
    pub fn set_session_lost(&self, message: &str) {
        self.dom.borrow_mut().session_lost = Some(message.to_string());
    }

    // -------------------------------------------------------------------------
    // Inspection
    // -------------------------------------------------------------------------

    /// Calls made so far
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.dom.borrow().history.clone()
    }

    /// Whether a call starting with `prefix` was made
    #[must_use]
    pub fn was_called(&self, prefix: &str) -> bool {
        self.dom.borrow().history.iter().any(|c| c.starts_with(prefix))
    }

    /// Number of calls starting with `prefix`
    #[must_use]
    pub fn call_count(&self, prefix: &str) -> usize {
        self.dom
            .borrow()
            .history
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    /// Forget recorded calls
    pub fn clear_history(&self) {
        self.dom.borrow_mut().history.clear();
    }

    /// Current attribute value
    #[must_use]
    pub fn get_attribute(&self, el: &ElementHandle, name: &str) -> Option<String> {
        self.dom
            .borrow()
            .elements
            .get(el.id())
            .and_then(|e| e.attributes.get(name).cloned())
    }

    /// Current text
    #[must_use]
    pub fn get_text(&self, el: &ElementHandle) -> Option<String> {
        self.dom.borrow().elements.get(el.id()).map(|e| e.text.clone())
    }

    /// Live elements registered for `selector` under `parent`, without recording a call
    #[must_use]
    pub fn find_registered(&self, parent: Option<&ElementHandle>, selector: &str) -> Vec<ElementHandle> {
        let dom = self.dom.borrow();
        let key = (parent.map(|p| p.id().to_string()), selector.to_string());
        dom.children
            .get(&key)
            .map(|ids| {
                ids.iter()
                    .filter(|id| !dom.removed.contains(*id))
                    .map(ElementHandle::new)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Current selection state
    #[must_use]
    pub fn get_selected(&self, el: &ElementHandle) -> bool {
        self.dom
            .borrow()
            .elements
            .get(el.id())
            .is_some_and(|e| e.selected)
    }

    /// Alerts closed so far
    #[must_use]
    pub fn handled_alerts(&self) -> Vec<(String, AlertAction)> {
        self.dom.borrow().handled_alerts.clone()
    }

    /// Whether an alert is open
    #[must_use]
    pub fn alert_open(&self) -> bool {
        self.dom.borrow().alert.is_some()
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn record(&self, call: String) {
        self.dom.borrow_mut().history.push(call);
    }

    fn check_session(&self) -> ViewResult<()> {
        match &self.dom.borrow().session_lost {
            Some(message) => Err(ViewError::SessionLost {
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }

    fn live(&self, el: &ElementHandle) -> ViewResult<MockElement> {
        self.check_session()?;
        let mut dom = self.dom.borrow_mut();
        if dom.stale_once.remove(el.id()) || dom.removed.contains(el.id()) {
            return Err(ViewError::stale(el.id()));
        }
        dom.elements
            .get(el.id())
            .cloned()
            .ok_or_else(|| ViewError::stale(el.id()))
    }

    fn default_click(&self, el: &ElementHandle, element: &MockElement) {
        if element.is_toggle() {
            let radio = element.attributes.get("type").map(String::as_str) == Some("radio");
            self.update(el, |e| e.selected = radio || !e.selected);
        } else if element.tag == "option" {
            let mut dom = self.dom.borrow_mut();
            let parent = dom.parents.get(el.id()).cloned().flatten();
            let multiple = parent
                .as_ref()
                .and_then(|p| dom.elements.get(p))
                .is_some_and(|p| p.attributes.contains_key("multiple"));
            if !multiple {
                let siblings: Vec<String> = dom
                    .parents
                    .iter()
                    .filter(|(_, p)| **p == parent)
                    .map(|(id, _)| id.clone())
                    .collect();
                for id in siblings {
                    if let Some(e) = dom.elements.get_mut(&id) {
                        if e.tag == "option" {
                            e.selected = false;
                        }
                    }
                }
            }
            if let Some(e) = dom.elements.get_mut(el.id()) {
                e.selected = if multiple { !e.selected } else { true };
            }
        }
    }
}

impl Driver for MockDriver {
    fn find_elements(
        &self,
        selector: &Selector,
        parent: Option<&ElementHandle>,
    ) -> ViewResult<Vec<ElementHandle>> {
        if let Some(parent) = parent {
            self.live(parent)?;
        } else {
            self.check_session()?;
        }
        self.record(format!("find:{selector}"));
        let dom = self.dom.borrow();
        let key = (parent.map(|p| p.id().to_string()), selector.as_str().to_string());
        Ok(dom
            .children
            .get(&key)
            .map(|ids| {
                ids.iter()
                    .filter(|id| !dom.removed.contains(*id))
                    .map(ElementHandle::new)
                    .collect()
            })
            .unwrap_or_default())
    }

    fn is_displayed(&self, el: &ElementHandle) -> ViewResult<bool> {
        Ok(self.live(el)?.displayed)
    }

    fn is_selected(&self, el: &ElementHandle) -> ViewResult<bool> {
        Ok(self.live(el)?.selected)
    }

    fn click(&self, el: &ElementHandle) -> ViewResult<()> {
        let element = self.live(el)?;
        self.record(format!("click:{el}"));
        self.default_click(el, &element);
        let handler = self.dom.borrow().click_handlers.get(el.id()).cloned();
        if let Some(handler) = handler {
            handler(self);
        }
        Ok(())
    }

    fn text(&self, el: &ElementHandle) -> ViewResult<String> {
        Ok(self.live(el)?.text)
    }

    fn attribute(&self, el: &ElementHandle, name: &str) -> ViewResult<Option<String>> {
        Ok(self.live(el)?.attributes.get(name).cloned())
    }

    fn tag_name(&self, el: &ElementHandle) -> ViewResult<String> {
        Ok(self.live(el)?.tag)
    }

    fn send_keys(&self, el: &ElementHandle, text: &str) -> ViewResult<()> {
        self.live(el)?;
        self.record(format!("send_keys:{el}:{text}"));
        self.update(el, |e| {
            e.attributes.entry("value".to_string()).or_default().push_str(text);
        });
        Ok(())
    }

    fn clear(&self, el: &ElementHandle) -> ViewResult<()> {
        self.live(el)?;
        self.record(format!("clear:{el}"));
        self.update(el, |e| {
            e.attributes.insert("value".to_string(), String::new());
        });
        Ok(())
    }

    fn move_to_element(&self, el: &ElementHandle) -> ViewResult<()> {
        self.live(el)?;
        self.record(format!("move:{el}"));
        Ok(())
    }

    fn move_by_offset(&self, dx: i32, dy: i32) -> ViewResult<()> {
        self.check_session()?;
        self.record(format!("move_by:{dx},{dy}"));
        Ok(())
    }

    fn execute_script(&self, source: &str, args: &[Value]) -> ViewResult<Value> {
        self.check_session()?;
        let first_line = source.trim().lines().next().unwrap_or_default().trim();
        self.record(format!("script:{first_line}"));
        let handler = self
            .dom
            .borrow()
            .script_handlers
            .iter()
            .find(|(fragment, _)| source.contains(fragment.as_str()))
            .map(|(_, h)| Rc::clone(h));
        Ok(handler.map_or(Value::Null, |h| h(self, args)))
    }

    fn refresh(&self) -> ViewResult<()> {
        self.check_session()?;
        self.record("refresh".to_string());
        let handler = self.dom.borrow().refresh_handler.clone();
        if let Some(handler) = handler {
            handler(self);
        }
        Ok(())
    }

    fn current_url(&self) -> ViewResult<String> {
        self.check_session()?;
        Ok(self.dom.borrow().url.clone())
    }

    fn title(&self) -> ViewResult<String> {
        self.check_session()?;
        Ok(self.dom.borrow().title.clone())
    }

    fn alert_text(&self) -> ViewResult<Option<String>> {
        self.check_session()?;
        Ok(self.dom.borrow().alert.clone())
    }

    fn handle_alert(&self, action: AlertAction) -> ViewResult<()> {
        self.check_session()?;
        let mut dom = self.dom.borrow_mut();
        let text = dom.alert.take().ok_or(ViewError::NoAlert)?;
        dom.history.push(format!("alert:{action}"));
        dom.handled_alerts.push((text, action));
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn sel(s: &str) -> Selector {
        Selector::parse(s)
    }

    mod dom_tests {
        use super::*;

        #[test]
        fn test_find_under_parent() {
            let mock = MockDriver::new();
            let form = mock.add(None, ".//form", MockElement::new("form"));
            let a = mock.add(Some(&form), ".//a", MockElement::new("a").text("one"));
            mock.add(None, ".//a", MockElement::new("a"));

            let found = mock.find_elements(&sel(".//a"), Some(&form)).unwrap();
            assert_eq!(found, vec![a.clone()]);
            assert_eq!(mock.text(&a).unwrap(), "one");
            assert_eq!(mock.find_elements(&sel(".//a"), None).unwrap().len(), 1);
            assert!(mock.find_elements(&sel(".//b"), None).unwrap().is_empty());
        }

        #[test]
        fn test_attach_exposes_same_element() {
            let mock = MockDriver::new();
            let a = mock.add(None, ".//a", MockElement::new("a"));
            mock.attach(None, "//a[1]", &a);
            assert_eq!(mock.find_elements(&sel("//a[1]"), None).unwrap(), vec![a]);
        }

        #[test]
        fn test_classes() {
            let mock = MockDriver::new();
            let li = mock.add(None, "li", MockElement::new("li").class("active").class("tab"));
            assert_eq!(mock.classes(&li).unwrap(), vec!["active", "tab"]);
            mock.remove_class(&li, "active");
            assert_eq!(mock.classes(&li).unwrap(), vec!["tab"]);
        }

        #[test]
        fn test_removed_is_stale() {
            let mock = MockDriver::new();
            let a = mock.add(None, ".//a", MockElement::new("a"));
            mock.remove(&a);
            assert!(matches!(mock.click(&a), Err(ViewError::StaleElement { .. })));
            assert!(mock.find_elements(&sel(".//a"), None).unwrap().is_empty());
        }

        #[test]
        fn test_stale_once() {
            let mock = MockDriver::new();
            let a = mock.add(None, ".//a", MockElement::new("a").text("x"));
            mock.mark_stale_once(&a);
            assert!(mock.text(&a).is_err());
            assert_eq!(mock.text(&a).unwrap(), "x");
        }

        #[test]
        fn test_session_lost() {
            let mock = MockDriver::new();
            mock.set_session_lost("gone");
            assert!(matches!(mock.current_url(), Err(ViewError::SessionLost { .. })));
        }
    }

    mod behaviour_tests {
        use super::*;

        #[test]
        fn test_checkbox_toggles() {
            let mock = MockDriver::new();
            let cb = mock.add(None, "cb", MockElement::input("checkbox"));
            mock.click(&cb).unwrap();
            assert!(mock.is_selected(&cb).unwrap());
            mock.click(&cb).unwrap();
            assert!(!mock.is_selected(&cb).unwrap());
        }

        #[test]
        fn test_option_click_is_exclusive() {
            let mock = MockDriver::new();
            let select = mock.add(None, "select", MockElement::new("select"));
            let a = mock.add(Some(&select), ".//option", MockElement::new("option").selected(true));
            let b = mock.add(Some(&select), ".//option", MockElement::new("option"));
            mock.click(&b).unwrap();
            assert!(!mock.get_selected(&a));
            assert!(mock.get_selected(&b));
        }

        #[test]
        fn test_click_handler_runs() {
            let mock = MockDriver::new();
            let button = mock.add(None, "button", MockElement::new("button"));
            let clicks = Rc::new(Cell::new(0));
            let seen = Rc::clone(&clicks);
            mock.on_click(&button, move |m| {
                seen.set(seen.get() + 1);
                m.set_title("clicked");
            });
            mock.click(&button).unwrap();
            assert_eq!(clicks.get(), 1);
            assert_eq!(mock.title().unwrap(), "clicked");
        }

        #[test]
        fn test_script_handler_and_default() {
            let mock = MockDriver::new();
            assert_eq!(mock.execute_script("return 1;", &[]).unwrap(), Value::Null);
            mock.on_script("readyState", |_, _| serde_json::json!({"document": true}));
            let out = mock.execute_script("return {document: document.readyState};", &[]).unwrap();
            assert_eq!(out["document"], Value::Bool(true));
        }

        #[test]
        fn test_typing() {
            let mock = MockDriver::new();
            let input = mock.add(None, "in", MockElement::input("text").attr("value", "old"));
            mock.clear(&input).unwrap();
            mock.send_keys(&input, "new").unwrap();
            assert_eq!(mock.get_attribute(&input, "value").as_deref(), Some("new"));
            assert_eq!(mock.call_count("send_keys"), 1);
        }

        #[test]
        fn test_alerts() {
            let mock = MockDriver::new();
            assert!(matches!(mock.handle_alert(AlertAction::Accept), Err(ViewError::NoAlert)));
            mock.set_alert("Are you sure?");
            assert_eq!(mock.alert_text().unwrap().as_deref(), Some("Are you sure?"));
            mock.handle_alert(AlertAction::Dismiss).unwrap();
            assert!(!mock.alert_open());
            assert_eq!(mock.handled_alerts()[0].1, AlertAction::Dismiss);
        }
    }
}
