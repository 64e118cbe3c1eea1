//! Widget protocol.
//!
//! Every widget sits on a [`Node`]: its position in the widget tree (parent,
//! name, locator, parameter bindings, attributes and the shared view context).
//! Nodes never hold element handles; each operation resolves the locator
//! against the live page, anchored at the nearest ancestor that has a locator.
//!
//! Widgets are declared with [`Placeholder`]s and materialized by [`Bind`],
//! which is how a view struct turns its declarations into bound children.

use crate::alert::AlertHandling;
use crate::browser::Browser;
use crate::driver::ElementHandle;
use crate::locator::{Locator, Selector};
use crate::result::{ViewError, ViewResult};
use serde_json::Value;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

// =============================================================================
// VIEW CONTEXT
// =============================================================================

/// Data shared by every node of one view tree
#[derive(Clone, Default)]
pub struct ViewContext {
    object: Option<Rc<dyn Any>>,
    values: BTreeMap<String, Value>,
}

impl fmt::Debug for ViewContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewContext")
            .field("has_object", &self.object.is_some())
            .field("values", &self.values)
            .finish()
    }
}

impl ViewContext {
    /// Empty context
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Context carrying the object a view was navigated for
    #[must_use]
    pub fn with_object(mut self, object: Rc<dyn Any>) -> Self {
        self.object = Some(object);
        self
    }

    /// Add a free-form value
    #[must_use]
    pub fn with_value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.values.insert(key.into(), value);
        self
    }

    /// The object, if it is a `T`
    #[must_use]
    pub fn object<T: Any>(&self) -> Option<&T> {
        self.object.as_ref()?.downcast_ref::<T>()
    }

    /// The object, untyped
    #[must_use]
    pub fn object_any(&self) -> Option<&Rc<dyn Any>> {
        self.object.as_ref()
    }

    /// A free-form value
    #[must_use]
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }
}

// =============================================================================
// NODE
// =============================================================================

struct NodeInner {
    browser: Browser,
    parent: Option<Node>,
    name: String,
    locator: Option<Locator>,
    params: BTreeMap<String, Value>,
    attrs: BTreeMap<String, String>,
    context: Rc<ViewContext>,
}

/// Position of a widget in the tree
#[derive(Clone)]
pub struct Node {
    inner: Rc<NodeInner>,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("path", &self.path())
            .field("locator", &self.inner.locator)
            .field("params", &self.inner.params)
            .finish_non_exhaustive()
    }
}

impl Node {
    /// Root of a view tree
    #[must_use]
    pub fn root(
        browser: &Browser,
        name: impl Into<String>,
        locator: Option<Locator>,
        context: ViewContext,
    ) -> Self {
        Self {
            inner: Rc::new(NodeInner {
                browser: browser.clone(),
                parent: None,
                name: name.into(),
                locator,
                params: BTreeMap::new(),
                attrs: BTreeMap::new(),
                context: Rc::new(context),
            }),
        }
    }

    /// Child node
    #[must_use]
    pub fn child(&self, name: &str, locator: Option<Locator>) -> Self {
        self.child_with(name, locator, BTreeMap::new(), BTreeMap::new())
    }

    /// Child node with widget attributes and parameter bindings
    #[must_use]
    pub fn child_with(
        &self,
        name: &str,
        locator: Option<Locator>,
        attrs: BTreeMap<String, String>,
        params: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            inner: Rc::new(NodeInner {
                browser: self.inner.browser.clone(),
                parent: Some(self.clone()),
                name: name.to_string(),
                locator,
                params,
                attrs,
                context: Rc::clone(&self.inner.context),
            }),
        }
    }

    /// The browser session
    #[must_use]
    pub fn browser(&self) -> &Browser {
        &self.inner.browser
    }

    /// Parent node
    #[must_use]
    pub fn parent(&self) -> Option<&Self> {
        self.inner.parent.as_ref()
    }

    /// Name under the parent
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Dotted path from the root view (`form.credential_form.access_key`)
    #[must_use]
    pub fn path(&self) -> String {
        let mut names = Vec::new();
        let mut current = Some(self);
        while let Some(node) = current {
            if node.parent().is_some() {
                names.push(node.name());
            }
            current = node.parent();
        }
        if names.is_empty() {
            return self.name().to_string();
        }
        names.reverse();
        names.join(".")
    }

    /// Unresolved locator
    #[must_use]
    pub fn locator(&self) -> Option<&Locator> {
        self.inner.locator.as_ref()
    }

    /// Shared view context
    #[must_use]
    pub fn context(&self) -> &ViewContext {
        &self.inner.context
    }

    /// Parameter binding, nearest first
    #[must_use]
    pub fn param(&self, name: &str) -> Option<Value> {
        self.ancestors().find_map(|n| n.inner.params.get(name).cloned())
    }

    /// Widget attribute, nearest first
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<String> {
        self.ancestors().find_map(|n| n.inner.attrs.get(name).cloned())
    }

    /// This node and its ancestors, nearest first
    pub fn ancestors(&self) -> impl Iterator<Item = &Self> {
        std::iter::successors(Some(self), |n| n.parent())
    }

    fn anchor(&self) -> Option<&Self> {
        self.ancestors().skip(1).find(|n| n.locator().is_some())
    }

    fn anchor_element(&self) -> ViewResult<Option<ElementHandle>> {
        self.anchor().map(Self::element).transpose()
    }

    /// Resolved selector, `None` for locator-less nodes
    pub fn selector(&self) -> ViewResult<Option<Selector>> {
        self.locator().map(|l| l.resolve(self)).transpose()
    }

    fn resolve_element(&self) -> ViewResult<ElementHandle> {
        let Some(selector) = self.selector()? else {
            return match self.anchor() {
                Some(anchor) => anchor.element(),
                None => Err(ViewError::not_found("<document>", self.path())),
            };
        };
        let parent = if selector.is_absolute() {
            None
        } else {
            self.anchor_element()?
        };
        self.browser()
            .element(&selector, parent.as_ref(), false)
            .map_err(|e| e.with_widget(&self.path()))
    }

    /// Scope element for relative lookups: own element, else the anchor's
    fn scope(&self) -> ViewResult<Option<ElementHandle>> {
        if self.locator().is_some() {
            self.element().map(Some)
        } else {
            self.anchor_element()
        }
    }

    /// Run `op`, retrying once when an element went stale
    pub fn retry<T>(&self, mut op: impl FnMut() -> ViewResult<T>) -> ViewResult<T> {
        match op() {
            Err(err) if err.is_retriable() => {
                tracing::debug!(widget = %self.path(), error = %err, "stale element, retrying");
                op()
            }
            other => other,
        }
    }

    // -------------------------------------------------------------------------
    // Element operations
    // -------------------------------------------------------------------------

    /// The element this node resolves to
    pub fn element(&self) -> ViewResult<ElementHandle> {
        self.retry(|| self.resolve_element())
    }

    /// Whether the element exists and is visible; never fails
    #[must_use]
    pub fn is_displayed(&self) -> bool {
        if self.locator().is_none() {
            return self.anchor().map_or(true, Self::is_displayed);
        }
        let shown = self.retry(|| {
            let el = self.resolve_element()?;
            self.browser().is_displayed(&el)
        });
        match shown {
            Ok(shown) => shown,
            Err(err) => {
                tracing::trace!(widget = %self.path(), error = %err, "not displayed");
                false
            }
        }
    }

    /// Click the element
    pub fn click(&self) -> ViewResult<()> {
        self.click_handling_alert(AlertHandling::Forbid)
    }

    /// Click the element with an alert policy
    pub fn click_handling_alert(&self, handling: AlertHandling) -> ViewResult<()> {
        tracing::info!(widget = %self.path(), "click");
        self.retry(|| {
            let el = self.resolve_element()?;
            self.browser().click_handling_alert(&el, handling)
        })
    }

    /// Visible text
    pub fn text(&self) -> ViewResult<String> {
        self.retry(|| self.browser().text(&self.resolve_element()?))
    }

    /// Attribute value
    pub fn attribute(&self, name: &str) -> ViewResult<Option<String>> {
        self.retry(|| self.browser().get_attribute(&self.resolve_element()?, name))
    }

    /// CSS classes
    pub fn classes(&self) -> ViewResult<Vec<String>> {
        self.retry(|| self.browser().classes(&self.resolve_element()?))
    }

    /// Whether the element carries `class`
    pub fn has_class(&self, class: &str) -> ViewResult<bool> {
        Ok(self.classes()?.iter().any(|c| c == class))
    }

    /// Selection state
    pub fn is_selected(&self) -> ViewResult<bool> {
        self.retry(|| self.browser().is_selected(&self.resolve_element()?))
    }

    /// Tag name
    pub fn tag(&self) -> ViewResult<String> {
        self.retry(|| self.browser().tag(&self.resolve_element()?))
    }

    /// Type into the element
    pub fn send_keys(&self, text: &str) -> ViewResult<()> {
        self.retry(|| self.browser().send_keys(&self.resolve_element()?, text))
    }

    /// Clear the element
    pub fn clear(&self) -> ViewResult<()> {
        self.retry(|| self.browser().clear(&self.resolve_element()?))
    }

    /// Hover the element
    pub fn move_to(&self) -> ViewResult<()> {
        self.retry(|| self.browser().move_to_element(&self.resolve_element()?))
    }

    /// First element matching `selector` under this node
    pub fn find(&self, selector: &str) -> ViewResult<ElementHandle> {
        let selector = Selector::parse(selector);
        self.retry(|| {
            let scope = self.scope()?;
            self.browser()
                .element(&selector, scope.as_ref(), false)
                .map_err(|e| e.with_widget(&self.path()))
        })
    }

    /// All elements matching `selector` under this node
    pub fn find_all(&self, selector: &str) -> ViewResult<Vec<ElementHandle>> {
        self.find_all_filtered(selector, false)
    }

    /// Visible elements matching `selector` under this node
    pub fn find_all_visible(&self, selector: &str) -> ViewResult<Vec<ElementHandle>> {
        self.find_all_filtered(selector, true)
    }

    fn find_all_filtered(&self, selector: &str, visible: bool) -> ViewResult<Vec<ElementHandle>> {
        let selector = Selector::parse(selector);
        self.retry(|| {
            let scope = self.scope()?;
            self.browser().elements(&selector, scope.as_ref(), visible)
        })
    }

    /// Elements matching `selector` under an already resolved element
    pub fn find_all_in(
        &self,
        parent: &ElementHandle,
        selector: &str,
    ) -> ViewResult<Vec<ElementHandle>> {
        self.browser()
            .elements(&Selector::parse(selector), Some(parent), false)
    }
}

// =============================================================================
// WIDGET TRAIT
// =============================================================================

/// Upcast to [`Any`] for downcasting trait objects.
///
/// On a `Box<dyn Widget>` call `(*boxed).as_any()`; calling it on the box
/// itself yields the box.
pub trait AsAny: Any {
    /// Borrow as `Any`
    fn as_any(&self) -> &dyn Any;

    /// Convert a box into `Box<dyn Any>`
    fn into_any(self: Box<Self>) -> Box<dyn Any>;

    /// Convert a shared pointer into `Rc<dyn Any>`
    fn into_any_rc(self: Rc<Self>) -> Rc<dyn Any>;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn into_any_rc(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

/// The widget contract
pub trait Widget: AsAny {
    /// Position in the tree
    fn node(&self) -> &Node;

    /// Whether the widget is visible; absence is `false`, never an error
    fn is_displayed(&self) -> bool {
        self.node().is_displayed()
    }

    /// Current semantic value; `NotReadable` means composite reads skip it
    fn read(&self) -> ViewResult<Value> {
        Err(ViewError::NotReadable {
            widget: self.node().path(),
        })
    }

    /// Set the value, returning whether anything changed
    fn fill_value(&self, _value: &Value) -> ViewResult<bool> {
        Err(ViewError::NotFillable {
            widget: self.node().path(),
        })
    }

    /// Hook run before [`Widget::fill_value`]
    fn before_fill(&self, _value: &Value) -> ViewResult<()> {
        Ok(())
    }

    /// Hook run after [`Widget::fill_value`]; may alter the reported change
    fn after_fill(&self, changed: bool) -> ViewResult<bool> {
        Ok(changed)
    }

    /// `before_fill`, `fill_value`, `after_fill`
    fn fill(&self, value: &Value) -> ViewResult<bool> {
        self.before_fill(value)?;
        let changed = self.fill_value(value)?;
        self.after_fill(changed)
    }

    /// Unresolved locator
    fn locator(&self) -> Option<&Locator> {
        self.node().locator()
    }

    /// Dotted widget path
    fn path(&self) -> String {
        self.node().path()
    }
}

/// Widgets that can be clicked
pub trait Clickable: Widget {
    /// Click the widget
    fn click(&self) -> ViewResult<()> {
        self.node().click()
    }
}

// =============================================================================
// DECLARATION
// =============================================================================

/// Turns a declaration into a widget bound under a parent node
pub trait Bind {
    /// The bound widget
    type Output;

    /// Bind as child `name` of `parent`
    fn bind(self, parent: &Node, name: &str) -> Self::Output;
}

/// Declaration of a widget: locator, attributes and constructor.
///
/// Building a placeholder touches no DOM.
pub struct Placeholder<W> {
    locator: Option<Locator>,
    attrs: BTreeMap<String, String>,
    build: Box<dyn FnOnce(Node) -> W>,
}

impl<W> fmt::Debug for Placeholder<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Placeholder")
            .field("widget", &std::any::type_name::<W>())
            .field("locator", &self.locator)
            .field("attrs", &self.attrs)
            .finish_non_exhaustive()
    }
}

impl<W> Placeholder<W> {
    /// Declare a widget
    pub fn new(locator: Option<Locator>, build: impl FnOnce(Node) -> W + 'static) -> Self {
        Self {
            locator,
            attrs: BTreeMap::new(),
            build: Box::new(build),
        }
    }

    /// Declare a widget with a locator
    pub fn located(locator: impl Into<Locator>, build: impl FnOnce(Node) -> W + 'static) -> Self {
        Self::new(Some(locator.into()), build)
    }

    /// Add a widget attribute (visible to `{@name}` templates)
    #[must_use]
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// Replace the locator
    #[must_use]
    pub fn with_locator(mut self, locator: impl Into<Locator>) -> Self {
        self.locator = Some(locator.into());
        self
    }

    /// Post-process the widget once it is built
    #[must_use]
    pub fn map<U>(self, f: impl FnOnce(W) -> U + 'static) -> Placeholder<U>
    where
        W: 'static,
    {
        let build = self.build;
        Placeholder {
            locator: self.locator,
            attrs: self.attrs,
            build: Box::new(move |node| f(build(node))),
        }
    }

    /// Bind with extra parameter bindings
    pub fn bind_with_params(self, parent: &Node, name: &str, params: BTreeMap<String, Value>) -> W {
        let node = parent.child_with(name, self.locator, self.attrs, params);
        (self.build)(node)
    }
}

impl<W> Bind for Placeholder<W> {
    type Output = W;

    fn bind(self, parent: &Node, name: &str) -> W {
        self.bind_with_params(parent, name, BTreeMap::new())
    }
}

/// Value to text the way widgets compare fill values
#[must_use]
pub fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
