//! View composition.
//!
//! A view is a widget whose behaviour is its ordered children. Views are
//! normally declared with `#[derive(View)]`; the traits and helpers here are
//! what the derive expands to and can be implemented by hand:
//!
//! ```
//! use pageview::mock::{MockDriver, MockElement};
//! use pageview::widgets::TextInput;
//! use pageview::{fill_view, read_view, Bind, Browser, CreateView, Node, View, ViewResult, Widget};
//! use serde_json::{json, Value};
//! use std::rc::Rc;
//!
//! struct LoginForm {
//!     node: Node,
//!     username: TextInput,
//! }
//!
//! impl Widget for LoginForm {
//!     fn node(&self) -> &Node {
//!         &self.node
//!     }
//!     fn read(&self) -> ViewResult<Value> {
//!         read_view(self)
//!     }
//!     fn fill_value(&self, value: &Value) -> ViewResult<bool> {
//!         fill_view(self, value)
//!     }
//! }
//!
//! impl View for LoginForm {
//!     fn widgets(&self) -> Vec<(&'static str, &dyn Widget)> {
//!         vec![("username", &self.username)]
//!     }
//! }
//!
//! impl CreateView for LoginForm {
//!     fn create(node: Node) -> Self {
//!         let username = TextInput::by_name("user_name").bind(&node, "username");
//!         Self { node, username }
//!     }
//! }
//!
//! let mock = Rc::new(MockDriver::new());
//! mock.add(None, ".//*[(self::input or self::textarea) and @name='user_name']", MockElement::input("text"));
//! let browser = Browser::new(mock, "5.10");
//! let form = LoginForm::new(&browser);
//! assert!(form.fill(&json!({"username": "admin"})).unwrap());
//! assert_eq!(form.read().unwrap(), json!({"username": "admin"}));
//! ```

use crate::browser::Browser;
use crate::locator::Locator;
use crate::result::{ViewError, ViewResult};
use crate::wait::{wait_until, WaitOptions};
use crate::widget::{value_as_text, Bind, Node, Placeholder, ViewContext, Widget};
use serde_json::{Map, Value};
use std::any::TypeId;
use std::fmt;
use std::marker::PhantomData;

/// Polling interval of the wait fill strategy
pub const FILL_WAIT_POLL_MS: u64 = 100;

// =============================================================================
// VIEW TRAITS
// =============================================================================

/// How a view fills its children
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FillStrategy {
    /// Fill every child immediately
    #[default]
    Eager,
    /// Wait for each child to display before filling it
    Wait {
        /// Per-child timeout; `None` uses `fill_wait_timeout_ms`
        timeout_ms: Option<u64>,
    },
}

/// A widget made of ordered, named children
pub trait View: Widget {
    /// Children in declaration order
    fn widgets(&self) -> Vec<(&'static str, &dyn Widget)>;

    /// Child by name
    fn widget(&self, name: &str) -> Option<&dyn Widget> {
        self.widgets()
            .into_iter()
            .find(|(n, _)| *n == name)
            .map(|(_, w)| w)
    }

    /// Child names in declaration order
    fn widget_names(&self) -> Vec<&'static str> {
        self.widgets().into_iter().map(|(n, _)| n).collect()
    }

    /// Fill strategy
    fn fill_strategy(&self) -> FillStrategy {
        FillStrategy::Eager
    }
}

/// Views that can be built from a node
pub trait CreateView: View + Sized + 'static {
    /// Root locator; `None` shares the parent's scope
    fn root_locator() -> Option<Locator> {
        None
    }

    /// Bind the children under `node`
    fn create(node: Node) -> Self;

    /// Bind to the current page
    fn new(browser: &Browser) -> Self {
        Self::with_context(browser, ViewContext::new())
    }

    /// Bind to the current page with a context
    fn with_context(browser: &Browser, context: ViewContext) -> Self {
        let node = Node::root(browser, view_name::<Self>(), Self::root_locator(), context);
        Self::create(node)
    }

    /// Declaration of this view as a nested child
    fn placeholder() -> Placeholder<Self> {
        Placeholder::new(Self::root_locator(), Self::create)
    }
}

/// Short type name used as a root node name
#[must_use]
pub fn view_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

// =============================================================================
// COMPOSITE READ / FILL
// =============================================================================

/// Ordered mapping of child reads, omitting children that signal skip
pub fn read_view<V: View + ?Sized>(view: &V) -> ViewResult<Value> {
    let mut values = Map::new();
    for (name, widget) in view.widgets() {
        match widget.read() {
            Ok(value) => {
                values.insert(name.to_string(), value);
            }
            Err(err) if err.is_skip() => {
                tracing::trace!(widget = %widget.path(), reason = %err, "read skipped");
            }
            Err(err) => return Err(err),
        }
    }
    Ok(Value::Object(values))
}

/// Fill children from a mapping in declaration order; `true` if any changed
pub fn fill_view<V: View + ?Sized>(view: &V, value: &Value) -> ViewResult<bool> {
    let Value::Object(mapping) = value else {
        return Err(ViewError::invalid(view.path(), "expected a mapping of widget names"));
    };
    let names = view.widget_names();
    if let Some(unknown) = mapping.keys().find(|k| !names.contains(&k.as_str())) {
        return Err(ViewError::UnknownWidget {
            view: view.path(),
            name: unknown.clone(),
        });
    }

    let wait = match view.fill_strategy() {
        FillStrategy::Eager => None,
        FillStrategy::Wait { timeout_ms } => {
            let timeout = timeout_ms.unwrap_or(view.node().browser().config().fill_wait_timeout_ms);
            Some(WaitOptions::bounded(timeout, FILL_WAIT_POLL_MS))
        }
    };

    let mut changed = false;
    for (name, widget) in view.widgets() {
        let Some(child_value) = mapping.get(name) else {
            continue;
        };
        if child_value.is_null() {
            continue;
        }
        if let Some(options) = &wait {
            let options = options
                .clone()
                .with_message(format!("{} to display", widget.path()));
            wait_until(|| Ok(widget.is_displayed()), &options)?;
        }
        let child_changed = widget.fill(child_value)?;
        tracing::debug!(widget = %widget.path(), changed = child_changed, "filled");
        changed |= child_changed;
    }
    Ok(changed)
}

// =============================================================================
// PARAMETRIZED VIEW
// =============================================================================

/// A view template instantiated per parameter tuple
pub trait Parametrized: CreateView {
    /// Parameter names, bound positionally by [`ParametrizedView::get`]
    const PARAMETERS: &'static [&'static str];

    /// Every valid parameter tuple; without it the template is neither
    /// readable nor fillable
    fn all(parent: &Node) -> ViewResult<Vec<Vec<Value>>> {
        Err(ViewError::NotReadable {
            widget: parent.path(),
        })
    }
}

/// Bound template producing one `V` per parameter tuple
pub struct ParametrizedView<V> {
    node: Node,
    _view: PhantomData<fn() -> V>,
}

impl<V> fmt::Debug for ParametrizedView<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParametrizedView")
            .field("view", &view_name::<V>())
            .field("path", &self.node.path())
            .finish()
    }
}

impl<V: Parametrized> ParametrizedView<V> {
    /// Declare the template as a child
    #[must_use]
    pub fn declare() -> Placeholder<Self> {
        Placeholder::new(None, |node| Self {
            node,
            _view: PhantomData,
        })
    }

    /// Instance bound to `args`, positionally matched to `V::PARAMETERS`
    pub fn get(&self, args: &[Value]) -> ViewResult<V> {
        if args.len() != V::PARAMETERS.len() {
            return Err(ViewError::invalid(
                self.node.path(),
                format!(
                    "expected {} arguments ({}), got {}",
                    V::PARAMETERS.len(),
                    V::PARAMETERS.join(", "),
                    args.len()
                ),
            ));
        }
        let params = V::PARAMETERS
            .iter()
            .map(|p| (*p).to_string())
            .zip(args.iter().cloned())
            .collect();
        let name = args.iter().map(value_as_text).collect::<Vec<_>>().join(",");
        Ok(V::placeholder().bind_with_params(&self.node, &name, params))
    }

    /// Instance for a single-parameter template
    pub fn get_one(&self, arg: impl Into<Value>) -> ViewResult<V> {
        self.get(&[arg.into()])
    }

    /// Every valid parameter tuple
    pub fn all(&self) -> ViewResult<Vec<Vec<Value>>> {
        V::all(&self.node)
    }

    fn key_for(args: &[Value]) -> String {
        match args {
            [single] => value_as_text(single),
            many => Value::Array(many.to_vec()).to_string(),
        }
    }

    fn args_for(&self, key: &str) -> ViewResult<Vec<Value>> {
        if V::PARAMETERS.len() == 1 {
            return Ok(vec![Value::String(key.to_string())]);
        }
        serde_json::from_str::<Vec<Value>>(key).map_err(|e| {
            ViewError::invalid(self.node.path(), format!("key {key} is not a JSON array: {e}"))
        })
    }
}

impl<V: Parametrized> Widget for ParametrizedView<V> {
    fn node(&self) -> &Node {
        &self.node
    }

    fn read(&self) -> ViewResult<Value> {
        let mut values = Map::new();
        for args in self.all()? {
            let instance = self.get(&args)?;
            values.insert(Self::key_for(&args), instance.read()?);
        }
        Ok(Value::Object(values))
    }

    fn fill_value(&self, value: &Value) -> ViewResult<bool> {
        let Value::Object(mapping) = value else {
            return Err(ViewError::invalid(self.node.path(), "expected a mapping of parameter keys"));
        };
        if let Err(err) = self.all() {
            return Err(match err {
                ViewError::NotReadable { widget } => ViewError::NotFillable { widget },
                other => other,
            });
        }
        let mut changed = false;
        for (key, child_value) in mapping {
            let instance = self.get(&self.args_for(key)?)?;
            changed |= instance.fill(child_value)?;
        }
        Ok(changed)
    }
}

// =============================================================================
// CONDITIONAL SWITCHABLE VIEW
// =============================================================================

type ReferenceBuild = Box<dyn FnOnce(&Node, &str) -> Box<dyn Widget>>;
type SubviewBuild = Box<dyn FnOnce(&Node, &str) -> Box<dyn Widget>>;

struct SubviewDecl {
    key: String,
    type_id: TypeId,
    type_name: &'static str,
    build: SubviewBuild,
}

/// Declaration of a [`ConditionalSwitchableView`]
pub struct SwitchableDecl {
    reference_name: String,
    reference: ReferenceBuild,
    subviews: Vec<SubviewDecl>,
    default: Option<usize>,
}

impl fmt::Debug for SwitchableDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SwitchableDecl")
            .field("reference", &self.reference_name)
            .field(
                "keys",
                &self.subviews.iter().map(|s| s.key.as_str()).collect::<Vec<_>>(),
            )
            .field("default", &self.default)
            .finish_non_exhaustive()
    }
}

impl SwitchableDecl {
    fn push<V: CreateView>(&mut self, key: String) -> usize {
        self.subviews.push(SubviewDecl {
            key,
            type_id: TypeId::of::<V>(),
            type_name: view_name::<V>(),
            build: Box::new(|parent: &Node, name: &str| {
                let view: Box<dyn Widget> = Box::new(V::placeholder().bind(parent, name));
                view
            }),
        });
        self.subviews.len() - 1
    }

    /// Register `V` as live when the reference reads `key`
    #[must_use]
    pub fn register<V: CreateView>(mut self, key: impl Into<String>) -> Self {
        self.push::<V>(key.into());
        self
    }

    /// Register `V` under `key` and as the fallback for unknown values
    #[must_use]
    pub fn register_default<V: CreateView>(mut self, key: impl Into<String>) -> Self {
        let index = self.push::<V>(key.into());
        self.default = Some(index);
        self
    }
}

impl Bind for SwitchableDecl {
    type Output = ConditionalSwitchableView;

    fn bind(self, parent: &Node, name: &str) -> ConditionalSwitchableView {
        let reference = (self.reference)(parent, &self.reference_name);
        let subviews = self
            .subviews
            .into_iter()
            .map(|decl| Subview {
                key: decl.key,
                type_id: decl.type_id,
                type_name: decl.type_name,
                view: (decl.build)(parent, name),
            })
            .collect();
        ConditionalSwitchableView {
            node: parent.child(name, None),
            reference,
            subviews,
            default: self.default,
        }
    }
}

struct Subview {
    key: String,
    type_id: TypeId,
    type_name: &'static str,
    view: Box<dyn Widget>,
}

/// One of several registered subviews, chosen by a reference widget's value
pub struct ConditionalSwitchableView {
    node: Node,
    reference: Box<dyn Widget>,
    subviews: Vec<Subview>,
    default: Option<usize>,
}

impl fmt::Debug for ConditionalSwitchableView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionalSwitchableView")
            .field("path", &self.node.path())
            .field("reference", &self.reference.path())
            .field("keys", &self.registered_keys())
            .finish_non_exhaustive()
    }
}

impl ConditionalSwitchableView {
    /// Start a declaration whose reference is the sibling `name`.
    ///
    /// `placeholder` must declare the same widget as the sibling; it is bound
    /// at the sibling's position.
    pub fn reference<W: Widget>(name: &str, placeholder: Placeholder<W>) -> SwitchableDecl {
        SwitchableDecl {
            reference_name: name.to_string(),
            reference: Box::new(move |parent: &Node, name: &str| {
                let widget: Box<dyn Widget> = Box::new(placeholder.bind(parent, name));
                widget
            }),
            subviews: Vec::new(),
            default: None,
        }
    }

    /// Registered keys in registration order
    #[must_use]
    pub fn registered_keys(&self) -> Vec<&str> {
        self.subviews.iter().map(|s| s.key.as_str()).collect()
    }

    /// Current value of the reference widget
    pub fn reference_value(&self) -> ViewResult<String> {
        Ok(value_as_text(&self.reference.read()?))
    }

    fn live(&self) -> ViewResult<&Subview> {
        let value = self.reference_value()?;
        if let Some(subview) = self.subviews.iter().find(|s| s.key == value) {
            return Ok(subview);
        }
        match self.default.and_then(|i| self.subviews.get(i)) {
            Some(subview) => {
                tracing::debug!(reference = %self.reference.path(), %value, fallback = %subview.key, "using default subview");
                Ok(subview)
            }
            None => Err(ViewError::NoMatchingSubview {
                reference: self.reference.path(),
                value,
            }),
        }
    }

    /// Key of the live subview
    pub fn live_key(&self) -> ViewResult<String> {
        Ok(self.live()?.key.clone())
    }

    /// The live subview as `V`; `InactiveSubview` when another one is live
    pub fn active<V: CreateView>(&self) -> ViewResult<&V> {
        let live = self.live()?;
        let inactive = || ViewError::InactiveSubview {
            requested: view_name::<V>().to_string(),
            live: format!("{} ({})", live.key, live.type_name),
        };
        if live.type_id != TypeId::of::<V>() {
            return Err(inactive());
        }
        (*live.view).as_any().downcast_ref::<V>().ok_or_else(inactive)
    }

    /// Fill `V`, which must be the live subview
    pub fn fill_as<V: CreateView>(&self, value: &Value) -> ViewResult<bool> {
        self.active::<V>()?.fill(value)
    }
}

impl Widget for ConditionalSwitchableView {
    fn node(&self) -> &Node {
        &self.node
    }

    fn is_displayed(&self) -> bool {
        self.live().is_ok_and(|s| s.view.is_displayed())
    }

    fn read(&self) -> ViewResult<Value> {
        self.live()?.view.read()
    }

    fn fill_value(&self, value: &Value) -> ViewResult<bool> {
        let live = self.live()?;
        tracing::debug!(widget = %self.node.path(), subview = %live.key, "filling live subview");
        live.view.fill(value)
    }
}
