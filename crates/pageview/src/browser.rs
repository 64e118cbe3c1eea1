//! Browser facade over a [`Driver`].
//!
//! [`Browser`] is what widgets talk to. It owns the driver, the page plugin,
//! the product version and the runtime configuration, and adds the semantics
//! widgets rely on: single-element resolution with visibility disambiguation,
//! page-safety waits before reads and after clicks, alert policies, and
//! keyboard-input hooks.
//!
//! Cloning a `Browser` is cheap; all clones share one session.

use crate::alert::{AlertAction, AlertHandling, HandledAlert};
use crate::config::RuntimeConfig;
use crate::driver::{Driver, ElementHandle};
use crate::locator::Selector;
use crate::result::{ViewError, ViewResult};
use crate::version::Version;
use crate::view::CreateView;
use crate::wait::{wait_for, WaitOptions};
use crate::widget::ViewContext;
use serde_json::Value;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

// =============================================================================
// PAGE PLUGIN
// =============================================================================

/// Page-level hooks around browser operations
pub trait PagePlugin {
    /// Block until the page has no in-flight asynchronous work
    fn ensure_page_safe(&self, browser: &Browser) -> ViewResult<()>;

    /// Runs before every click
    fn before_click(&self, _browser: &Browser, _el: &ElementHandle) -> ViewResult<()> {
        Ok(())
    }

    /// Runs after every click, before the alert check
    fn after_click(&self, _browser: &Browser, _el: &ElementHandle) -> ViewResult<()> {
        Ok(())
    }

    /// Runs before typing into an element
    fn before_keyboard_input(
        &self,
        _browser: &Browser,
        _el: &ElementHandle,
        _text: &str,
    ) -> ViewResult<()> {
        Ok(())
    }

    /// Runs after typing into an element
    fn after_keyboard_input(
        &self,
        _browser: &Browser,
        _el: &ElementHandle,
        _text: &str,
    ) -> ViewResult<()> {
        Ok(())
    }
}

/// Readiness script: every value must be truthy for the page to be safe
pub const ENSURE_PAGE_SAFE: &str = r#"return {
    jquery: (typeof jQuery === "undefined") ? true : jQuery.active < 1,
    prototype: (typeof Ajax === "undefined") ? true : Ajax.activeRequestCount < 1,
    document: document.readyState == "complete"
};"#;

/// Attributes marking inputs the server observes while typing
pub const OBSERVED_FIELD_MARKERS: [&str; 3] = [
    "data-miq_observe",
    "data-miq_observe_date",
    "data-miq_observe_checkbox",
];

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Whether a readiness script result means "settled"
#[must_use]
pub fn page_is_safe(result: &Value) -> bool {
    match result {
        Value::Object(map) => map.values().all(is_truthy),
        Value::Bool(b) => *b,
        _ => true,
    }
}

/// Plugin polling [`ENSURE_PAGE_SAFE`] and pausing after observed-field input
#[derive(Debug, Clone, Default)]
pub struct DefaultPlugin {
    script: Option<String>,
}

impl DefaultPlugin {
    /// Plugin with the standard readiness script
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Plugin with an application-specific readiness script
    #[must_use]
    pub fn with_script(script: impl Into<String>) -> Self {
        Self {
            script: Some(script.into()),
        }
    }

    fn script(&self) -> &str {
        self.script.as_deref().unwrap_or(ENSURE_PAGE_SAFE)
    }

    fn observed_interval(browser: &Browser, el: &ElementHandle) -> ViewResult<Option<Duration>> {
        let floor = browser.config().observed_field_wait_ms;
        for marker in OBSERVED_FIELD_MARKERS {
            let Some(raw) = browser.driver().attribute(el, marker)? else {
                continue;
            };
            let interval_ms = serde_json::from_str::<Value>(&raw)
                .ok()
                .and_then(|v| v.get("interval").and_then(Value::as_f64))
                .map_or(floor, |secs| {
                    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                    let ms = (secs * 1000.0).max(0.0) as u64;
                    ms.max(floor)
                });
            return Ok(Some(Duration::from_millis(interval_ms)));
        }
        Ok(None)
    }
}

impl PagePlugin for DefaultPlugin {
    fn ensure_page_safe(&self, browser: &Browser) -> ViewResult<()> {
        let driver = browser.driver();
        if let Some(text) = driver.alert_text()? {
            if browser.config().auto_accepts(&text) {
                tracing::info!(alert = %text, "accepting alert before page-safety check");
                driver.handle_alert(AlertAction::Accept)?;
                browser.record_alert(HandledAlert::new(text, AlertAction::Accept));
            } else {
                // Scripts cannot run while an alert is open.
                return Ok(());
            }
        }

        let config = browser.config();
        let options = WaitOptions::bounded(config.page_safe_timeout_ms, config.page_safe_poll_ms)
            .with_message("page to become safe")
            .with_handle_exception(true);
        let outcome = wait_for(
            || {
                let result = driver.execute_script(self.script(), &[])?;
                Ok(page_is_safe(&result).then_some(()))
            },
            &options,
        );
        match outcome {
            Ok(_) => Ok(()),
            Err(ViewError::TimedOut { timeout_ms, .. }) => {
                tracing::warn!(timeout_ms, "page never became safe");
                Err(ViewError::PageNotSafe { timeout_ms })
            }
            Err(err) => Err(err),
        }
    }

    fn after_keyboard_input(
        &self,
        browser: &Browser,
        el: &ElementHandle,
        _text: &str,
    ) -> ViewResult<()> {
        if let Some(pause) = Self::observed_interval(browser, el)? {
            tracing::debug!(pause_ms = pause.as_millis(), "observed field, pausing");
            std::thread::sleep(pause);
            self.ensure_page_safe(browser)?;
        }
        Ok(())
    }
}

// =============================================================================
// BROWSER
// =============================================================================

struct BrowserInner {
    driver: Rc<dyn Driver>,
    plugin: Box<dyn PagePlugin>,
    version: Version,
    config: RuntimeConfig,
    handled_alerts: RefCell<Vec<HandledAlert>>,
}

/// Shared handle to one browser session
#[derive(Clone)]
pub struct Browser {
    inner: Rc<BrowserInner>,
}

impl fmt::Debug for Browser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Browser")
            .field("version", &self.inner.version)
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Browser`]
pub struct BrowserBuilder {
    driver: Rc<dyn Driver>,
    plugin: Box<dyn PagePlugin>,
    version: Version,
    config: RuntimeConfig,
}

impl fmt::Debug for BrowserBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrowserBuilder")
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl BrowserBuilder {
    /// Use a custom page plugin
    #[must_use]
    pub fn plugin(mut self, plugin: impl PagePlugin + 'static) -> Self {
        self.plugin = Box::new(plugin);
        self
    }

    /// Set the product version
    #[must_use]
    pub fn product_version(mut self, version: impl Into<Version>) -> Self {
        self.version = version.into();
        self
    }

    /// Set the runtime configuration
    #[must_use]
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the browser
    #[must_use]
    pub fn build(self) -> Browser {
        Browser {
            inner: Rc::new(BrowserInner {
                driver: self.driver,
                plugin: self.plugin,
                version: self.version,
                config: self.config,
                handled_alerts: RefCell::new(Vec::new()),
            }),
        }
    }
}

impl Browser {
    /// Start building a browser around `driver`
    #[must_use]
    pub fn builder(driver: Rc<dyn Driver>) -> BrowserBuilder {
        BrowserBuilder {
            driver,
            plugin: Box::new(DefaultPlugin::new()),
            version: Version::Latest,
            config: RuntimeConfig::default(),
        }
    }

    /// Browser with the default plugin and configuration
    #[must_use]
    pub fn new(driver: Rc<dyn Driver>, version: impl Into<Version>) -> Self {
        Self::builder(driver).product_version(version).build()
    }

    /// The underlying driver
    #[must_use]
    pub fn driver(&self) -> &dyn Driver {
        self.inner.driver.as_ref()
    }

    /// Runtime configuration
    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Product version used by version picks
    #[must_use]
    pub fn product_version(&self) -> &Version {
        &self.inner.version
    }

    /// Whether two handles share one session
    #[must_use]
    pub fn same_session(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // -------------------------------------------------------------------------
    // Readiness
    // -------------------------------------------------------------------------

    /// Block until the page is settled
    pub fn ensure_page_safe(&self) -> ViewResult<()> {
        self.inner.plugin.ensure_page_safe(self)
    }

    /// Request the page to settle before checking a post-condition
    pub fn quiesce(&self) -> ViewResult<()> {
        tracing::trace!("quiesce");
        self.ensure_page_safe()
    }

    // -------------------------------------------------------------------------
    // Element resolution
    // -------------------------------------------------------------------------

    /// All elements matching `selector`; absolute selectors ignore `parent`
    pub fn elements(
        &self,
        selector: &Selector,
        parent: Option<&ElementHandle>,
        check_visibility: bool,
    ) -> ViewResult<Vec<ElementHandle>> {
        self.ensure_page_safe()?;
        let parent = if selector.is_absolute() { None } else { parent };
        let found = self.driver().find_elements(selector, parent)?;
        if !check_visibility {
            return Ok(found);
        }
        let mut visible = Vec::with_capacity(found.len());
        for el in found {
            if self.driver().is_displayed(&el)? {
                visible.push(el);
            }
        }
        Ok(visible)
    }

    /// The one element matching `selector`.
    ///
    /// Several matches resolve to the single visible one; otherwise the
    /// locator is ambiguous.
    pub fn element(
        &self,
        selector: &Selector,
        parent: Option<&ElementHandle>,
        check_visibility: bool,
    ) -> ViewResult<ElementHandle> {
        let mut found = self.elements(selector, parent, check_visibility)?;
        match found.len() {
            0 => Err(ViewError::not_found(selector.as_str(), "")),
            1 => Ok(found.remove(0)),
            count => {
                let mut visible = Vec::new();
                for el in found {
                    if self.driver().is_displayed(&el)? {
                        visible.push(el);
                    }
                }
                if visible.len() == 1 {
                    Ok(visible.remove(0))
                } else {
                    Err(ViewError::ambiguous(selector.as_str(), count))
                }
            }
        }
    }

    // -------------------------------------------------------------------------
    // Element operations
    // -------------------------------------------------------------------------

    /// Click, failing on any alert the click raises
    pub fn click(&self, el: &ElementHandle) -> ViewResult<()> {
        self.click_handling_alert(el, AlertHandling::Forbid)
    }

    /// Click and apply `handling` to an alert the click raises
    pub fn click_handling_alert(
        &self,
        el: &ElementHandle,
        handling: AlertHandling,
    ) -> ViewResult<()> {
        let plugin = &self.inner.plugin;
        plugin.before_click(self, el)?;
        self.driver().move_to_element(el)?;
        self.driver().click(el)?;
        tracing::debug!(element = %el, ?handling, "clicked");
        plugin.after_click(self, el)?;

        match handling.action() {
            None => {
                if let Some(text) = self.driver().alert_text()? {
                    return Err(ViewError::UnexpectedAlert { text });
                }
            }
            Some(action) => {
                let options = WaitOptions::bounded(self.config().alert_wait_ms, 100)
                    .with_message("alert to appear");
                match wait_for(|| self.driver().alert_text(), &options) {
                    Ok(found) => {
                        self.driver().handle_alert(action)?;
                        tracing::info!(alert = %found.value, %action, "handled alert");
                        self.record_alert(HandledAlert::new(found.value, action));
                    }
                    Err(ViewError::TimedOut { .. }) => {
                        tracing::debug!("no alert appeared after click");
                    }
                    Err(err) => return Err(err),
                }
            }
        }
        self.ensure_page_safe()
    }

    /// Type into an element, running the keyboard-input hooks
    pub fn send_keys(&self, el: &ElementHandle, text: &str) -> ViewResult<()> {
        let plugin = &self.inner.plugin;
        plugin.before_keyboard_input(self, el, text)?;
        self.driver().send_keys(el, text)?;
        plugin.after_keyboard_input(self, el, text)
    }

    /// Clear an input
    pub fn clear(&self, el: &ElementHandle) -> ViewResult<()> {
        self.driver().clear(el)
    }

    /// Visible text, trimmed
    pub fn text(&self, el: &ElementHandle) -> ViewResult<String> {
        Ok(self.driver().text(el)?.trim().to_string())
    }

    /// Attribute value
    pub fn get_attribute(&self, el: &ElementHandle, name: &str) -> ViewResult<Option<String>> {
        self.driver().attribute(el, name)
    }

    /// CSS classes
    pub fn classes(&self, el: &ElementHandle) -> ViewResult<Vec<String>> {
        self.driver().classes(el)
    }

    /// Lowercase tag name
    pub fn tag(&self, el: &ElementHandle) -> ViewResult<String> {
        Ok(self.driver().tag_name(el)?.to_lowercase())
    }

    /// Visibility of an already resolved element
    pub fn is_displayed(&self, el: &ElementHandle) -> ViewResult<bool> {
        self.driver().is_displayed(el)
    }

    /// Selection state
    pub fn is_selected(&self, el: &ElementHandle) -> ViewResult<bool> {
        self.driver().is_selected(el)
    }

    /// Hover the element
    pub fn move_to_element(&self, el: &ElementHandle) -> ViewResult<()> {
        self.driver().move_to_element(el)
    }

    /// Move the pointer by an offset
    pub fn move_by_offset(&self, dx: i32, dy: i32) -> ViewResult<()> {
        self.driver().move_by_offset(dx, dy)
    }

    /// Run a script once the page is safe
    pub fn execute_script(&self, source: &str, args: &[Value]) -> ViewResult<Value> {
        self.ensure_page_safe()?;
        self.driver().execute_script(source, args)
    }

    /// Reload the page and wait for it to settle
    pub fn refresh(&self) -> ViewResult<()> {
        tracing::info!("refreshing page");
        self.driver().refresh()?;
        self.ensure_page_safe()
    }

    /// Current URL
    pub fn current_url(&self) -> ViewResult<String> {
        self.driver().current_url()
    }

    /// Current title
    pub fn title(&self) -> ViewResult<String> {
        self.driver().title()
    }

    // -------------------------------------------------------------------------
    // Alerts
    // -------------------------------------------------------------------------

    /// Whether an alert is open
    pub fn alert_present(&self) -> ViewResult<bool> {
        Ok(self.driver().alert_text()?.is_some())
    }

    /// Close the open alert, returning its text
    pub fn handle_alert(&self, action: AlertAction) -> ViewResult<String> {
        let text = self.driver().alert_text()?.ok_or(ViewError::NoAlert)?;
        self.driver().handle_alert(action)?;
        tracing::info!(alert = %text, %action, "handled alert");
        self.record_alert(HandledAlert::new(text.clone(), action));
        Ok(text)
    }

    /// Alerts handled during this session
    #[must_use]
    pub fn handled_alerts(&self) -> Vec<HandledAlert> {
        self.inner.handled_alerts.borrow().clone()
    }

    pub(crate) fn record_alert(&self, alert: HandledAlert) {
        self.inner.handled_alerts.borrow_mut().push(alert);
    }

    // -------------------------------------------------------------------------
    // Views
    // -------------------------------------------------------------------------

    /// Bind a view to the current page
    #[must_use]
    pub fn create_view<V: CreateView>(&self) -> V {
        V::new(self)
    }

    /// Bind a view with a context (typically the navigation object)
    #[must_use]
    pub fn create_view_with<V: CreateView>(&self, context: ViewContext) -> V {
        V::with_context(self, context)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::mock::{MockDriver, MockElement};
    use serde_json::json;

    fn fast_config() -> RuntimeConfig {
        RuntimeConfig::builder()
            .page_safe_timeout_ms(30)
            .page_safe_poll_ms(1)
            .alert_wait_ms(20)
            .observed_field_wait_ms(1)
            .build()
            .unwrap()
    }

    fn setup() -> (Rc<MockDriver>, Browser) {
        let mock = Rc::new(MockDriver::new());
        let browser = Browser::builder(mock.clone())
            .config(fast_config())
            .product_version("5.10.1")
            .build();
        (mock, browser)
    }

    mod safety_tests {
        use super::*;

        #[test]
        fn test_result_shapes() {
            assert!(page_is_safe(&Value::Null));
            assert!(page_is_safe(&json!({"jquery": true, "document": true})));
            assert!(!page_is_safe(&json!({"jquery": false, "document": true})));
            assert!(!page_is_safe(&Value::Bool(false)));
        }

        #[test]
        fn test_never_safe_is_fatal() {
            let (mock, browser) = setup();
            mock.on_script("readyState", |_, _| json!({"document": false}));
            let err = browser.ensure_page_safe().unwrap_err();
            assert!(matches!(err, ViewError::PageNotSafe { timeout_ms: 30 }));
            assert!(err.is_fatal());
        }

        #[test]
        fn test_abandon_changes_alert_is_accepted() {
            let (mock, browser) = setup();
            mock.set_alert("Abandon changes?");
            browser.ensure_page_safe().unwrap();
            assert!(!mock.alert_open());
            assert_eq!(browser.handled_alerts()[0].text, "Abandon changes?");
        }

        #[test]
        fn test_other_alerts_skip_scripts() {
            let (mock, browser) = setup();
            mock.set_alert("Delete?");
            browser.ensure_page_safe().unwrap();
            assert!(mock.alert_open());
            assert!(!mock.was_called("script"));
        }
    }

    mod resolution_tests {
        use super::*;

        #[test]
        fn test_element_not_found() {
            let (_mock, browser) = setup();
            let err = browser.element(&Selector::parse(".//a"), None, false).unwrap_err();
            assert!(matches!(err, ViewError::LocatorNotFound { .. }));
        }

        #[test]
        fn test_single_visible_wins() {
            let (mock, browser) = setup();
            mock.add(None, ".//a", MockElement::new("a").hidden());
            let shown = mock.add(None, ".//a", MockElement::new("a"));
            assert_eq!(browser.element(&Selector::parse(".//a"), None, false).unwrap(), shown);
        }

        #[test]
        fn test_ambiguous() {
            let (mock, browser) = setup();
            mock.add(None, ".//a", MockElement::new("a"));
            mock.add(None, ".//a", MockElement::new("a"));
            let err = browser.element(&Selector::parse(".//a"), None, false).unwrap_err();
            assert!(matches!(err, ViewError::AmbiguousLocator { count: 2, .. }));
        }

        #[test]
        fn test_absolute_ignores_parent() {
            let (mock, browser) = setup();
            let parent = mock.add(None, ".//div", MockElement::new("div"));
            let body = mock.add(None, "//body", MockElement::new("body"));
            let found = browser.element(&Selector::parse("//body"), Some(&parent), false).unwrap();
            assert_eq!(found, body);
        }

        #[test]
        fn test_visibility_filter() {
            let (mock, browser) = setup();
            mock.add(None, ".//a", MockElement::new("a").hidden());
            mock.add(None, ".//a", MockElement::new("a"));
            assert_eq!(browser.elements(&Selector::parse(".//a"), None, true).unwrap().len(), 1);
        }
    }

    mod click_tests {
        use super::*;

        #[test]
        fn test_unexpected_alert() {
            let (mock, browser) = setup();
            let button = mock.add(None, "button", MockElement::new("button"));
            mock.on_click(&button, |m| m.set_alert("Are you sure?"));
            let err = browser.click(&button).unwrap_err();
            assert!(matches!(err, ViewError::UnexpectedAlert { ref text } if text == "Are you sure?"));
        }

        #[test]
        fn test_handled_alert() {
            let (mock, browser) = setup();
            let button = mock.add(None, "button", MockElement::new("button"));
            mock.on_click(&button, |m| m.set_alert("Are you sure?"));
            browser.click_handling_alert(&button, AlertHandling::Dismiss).unwrap();
            assert_eq!(mock.handled_alerts(), vec![("Are you sure?".to_string(), AlertAction::Dismiss)]);
        }

        #[test]
        fn test_handling_without_alert_is_quiet() {
            let (mock, browser) = setup();
            let button = mock.add(None, "button", MockElement::new("button"));
            browser.click_handling_alert(&button, AlertHandling::Accept).unwrap();
            assert!(browser.handled_alerts().is_empty());
        }

        #[test]
        fn test_observed_field_waits_for_page() {
            let (mock, browser) = setup();
            let input = mock.add(
                None,
                "in",
                MockElement::input("text").attr("data-miq_observe", r#"{"interval":"0.0"}"#),
            );
            mock.clear_history();
            browser.send_keys(&input, "abc").unwrap();
            assert!(mock.was_called("script"));
        }

        #[test]
        fn test_handle_alert_without_alert() {
            let (_mock, browser) = setup();
            assert!(matches!(browser.handle_alert(AlertAction::Accept), Err(ViewError::NoAlert)));
        }
    }
}
