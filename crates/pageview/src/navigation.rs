//! Navigation graph and traversal.
//!
//! Steps are registered per entity type and destination name. Each step names
//! a prerequisite destination (on the same entity, or on an entity reached
//! through a dotted attribute path), performs the UI actions that lead from the
//! prerequisite's view to its own, and declares the view it arrives at.
//!
//! ```text
//! navigate_to(credential, "Edit")
//!   └─ Credential/Details          (sibling prerequisite)
//!        └─ Server/AnsibleCredentials   (attribute prerequisite "appliance.server")
//!             └─ Server/LoggedIn
//! ```
//!
//! The registry is assembled with [`NavigatorBuilder`] and is immutable once
//! built; `build()` rejects missing prerequisites and cycles among the edges it
//! can see statically. Edges through untyped attributes are guarded at runtime.

use crate::alert::AlertAction;
use crate::browser::Browser;
use crate::result::{ViewError, ViewResult};
use crate::version::Version;
use crate::view::{view_name, CreateView};
use crate::wait::{wait_for, WaitOptions};
use crate::widget::{AsAny, ViewContext, Widget};
use serde_json::Value;
use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::rc::Rc;
use std::time::Instant;
use uuid::Uuid;

/// Name of the implicit first segment of attribute paths that reaches the appliance
pub const APPLIANCE_ATTRIBUTE: &str = "appliance";

// =============================================================================
// ENTITIES AND APPLIANCE
// =============================================================================

/// An object navigation is performed for.
///
/// Identity (for messages and the runtime cycle guard) is the `Debug` text.
pub trait Entity: AsAny + fmt::Debug {
    /// The appliance this entity lives on
    fn appliance(&self) -> &Appliance;

    /// Related entity reachable as `name`, for attribute prerequisites
    fn attribute(&self, _name: &str) -> Option<Rc<dyn Entity>> {
        None
    }
}

/// Builds a named appliance service on demand
pub type ServiceFactory = Rc<dyn Fn(&Appliance) -> Rc<dyn Entity>>;

struct ApplianceInner {
    browser: Browser,
    navigator: Navigator,
    services: BTreeMap<String, ServiceFactory>,
}

/// Shared services of one product instance: the browser, its product
/// version, the navigator and named service entities
#[derive(Clone)]
pub struct Appliance {
    inner: Rc<ApplianceInner>,
}

impl fmt::Debug for Appliance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Appliance")
            .field("version", self.version())
            .field("services", &self.inner.services.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Appliance {
    /// Appliance without services
    #[must_use]
    pub fn new(browser: Browser, navigator: Navigator) -> Self {
        Self::builder(browser, navigator).build()
    }

    /// Builder for an appliance with services
    #[must_use]
    pub fn builder(browser: Browser, navigator: Navigator) -> ApplianceBuilder {
        ApplianceBuilder {
            browser,
            navigator,
            services: BTreeMap::new(),
        }
    }

    /// The browser session
    #[must_use]
    pub fn browser(&self) -> &Browser {
        &self.inner.browser
    }

    /// Product version
    #[must_use]
    pub fn version(&self) -> &Version {
        self.inner.browser.product_version()
    }

    /// The navigation registry
    #[must_use]
    pub fn navigator(&self) -> &Navigator {
        &self.inner.navigator
    }

    /// Service entity `name`, built fresh by its factory
    #[must_use]
    pub fn service(&self, name: &str) -> Option<Rc<dyn Entity>> {
        self.inner.services.get(name).map(|factory| factory(self))
    }
}

/// Builder for [`Appliance`]
pub struct ApplianceBuilder {
    browser: Browser,
    navigator: Navigator,
    services: BTreeMap<String, ServiceFactory>,
}

impl fmt::Debug for ApplianceBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplianceBuilder")
            .field("services", &self.services.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl ApplianceBuilder {
    /// Register service `name` (reachable as `appliance.<name>`)
    #[must_use]
    pub fn service(mut self, name: impl Into<String>, factory: impl Fn(&Appliance) -> Rc<dyn Entity> + 'static) -> Self {
        self.services.insert(name.into(), Rc::new(factory));
        self
    }

    /// Build the appliance
    #[must_use]
    pub fn build(self) -> Appliance {
        Appliance {
            inner: Rc::new(ApplianceInner {
                browser: self.browser,
                navigator: self.navigator,
                services: self.services,
            }),
        }
    }
}

// =============================================================================
// PREREQUISITES
// =============================================================================

/// Statically known entity type of an attribute target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityType {
    id: TypeId,
    name: &'static str,
}

impl EntityType {
    /// Type of `E`
    #[must_use]
    pub fn of<E: Entity>() -> Self {
        Self {
            id: TypeId::of::<E>(),
            name: view_name::<E>(),
        }
    }

    /// Short type name
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

/// What must be navigated before a step runs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Prerequisite {
    /// Root step
    #[default]
    None,
    /// Destination on the same entity
    Sibling(String),
    /// Destination on the entity at a dotted attribute path
    Attribute {
        /// Dotted path, e.g. `appliance.server`
        path: String,
        /// Destination on the resolved entity
        destination: String,
        /// Target type when known, so `build()` can check the edge
        target: Option<EntityType>,
    },
}

impl Prerequisite {
    /// Destination `name` on the same entity
    #[must_use]
    pub fn sibling(name: impl Into<String>) -> Self {
        Self::Sibling(name.into())
    }

    /// Destination on the entity at `path`, type unknown until runtime
    #[must_use]
    pub fn attribute(path: impl Into<String>, destination: impl Into<String>) -> Self {
        Self::Attribute {
            path: path.into(),
            destination: destination.into(),
            target: None,
        }
    }

    /// Destination on the `E` at `path`
    #[must_use]
    pub fn attribute_of<E: Entity>(path: impl Into<String>, destination: impl Into<String>) -> Self {
        Self::Attribute {
            path: path.into(),
            destination: destination.into(),
            target: Some(EntityType::of::<E>()),
        }
    }
}

// =============================================================================
// STEPS
// =============================================================================

/// One destination of an entity
pub trait NavigateStep: 'static {
    /// View the step arrives at
    type View: CreateView;

    /// What to navigate first
    fn prerequisite(&self) -> Prerequisite {
        Prerequisite::None
    }

    /// UI actions leading from the prerequisite view to this one
    fn step(&self, ctx: &StepContext<'_>) -> ViewResult<()>;

    /// Whether [`NavigateStep::resetter`] does anything
    fn has_resetter(&self) -> bool {
        false
    }

    /// Bring the arrived view to a known state
    fn resetter(&self, _ctx: &StepContext<'_>, _view: &Self::View) -> ViewResult<()> {
        Ok(())
    }

    /// Runs before anything else for this destination
    fn pre_navigate(&self, _ctx: &StepContext<'_>) -> ViewResult<()> {
        Ok(())
    }

    /// Runs after arrival and the resetter
    fn post_navigate(&self, _ctx: &StepContext<'_>) -> ViewResult<()> {
        Ok(())
    }

    /// Opt in to returning early when the view is already displayed
    fn can_skip(&self) -> bool {
        false
    }

    /// Arrival check, polled after the step
    fn am_i_here(&self, _ctx: &StepContext<'_>, view: &Self::View) -> ViewResult<bool> {
        Ok(view.is_displayed())
    }
}

/// What a step sees while it runs
pub struct StepContext<'a> {
    navigator: &'a Navigator,
    obj: &'a Rc<dyn Entity>,
    destination: &'a str,
    args: &'a [Value],
    prerequisite_view: Option<Box<dyn Any>>,
    trace_id: Uuid,
}

impl fmt::Debug for StepContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepContext")
            .field("obj", self.obj)
            .field("destination", &self.destination)
            .field("args", &self.args)
            .field("has_prerequisite_view", &self.prerequisite_view.is_some())
            .field("trace_id", &self.trace_id)
            .finish_non_exhaustive()
    }
}

impl<'a> StepContext<'a> {
    /// The entity as a `T`
    #[must_use]
    pub fn obj<T: Entity>(&self) -> Option<&T> {
        (**self.obj).as_any().downcast_ref::<T>()
    }

    /// The entity
    #[must_use]
    pub const fn entity(&self) -> &'a Rc<dyn Entity> {
        self.obj
    }

    /// The entity's appliance
    #[must_use]
    pub fn appliance(&self) -> &Appliance {
        self.obj.appliance()
    }

    /// The browser session
    #[must_use]
    pub fn browser(&self) -> &Browser {
        self.obj.appliance().browser()
    }

    /// The navigator running this step
    #[must_use]
    pub const fn navigator(&self) -> &'a Navigator {
        self.navigator
    }

    /// View the prerequisite arrived at, if it is a `V`
    pub fn prerequisite_view<V: CreateView>(&self) -> ViewResult<&V> {
        self.prerequisite_view
            .as_deref()
            .and_then(|view| view.downcast_ref::<V>())
            .ok_or_else(|| ViewError::Config {
                message: format!(
                    "destination {} has no {} prerequisite view",
                    self.destination,
                    view_name::<V>()
                ),
            })
    }

    /// Extra arguments passed to `navigate_to_with`
    #[must_use]
    pub const fn args(&self) -> &'a [Value] {
        self.args
    }

    /// Destination being navigated
    #[must_use]
    pub const fn destination(&self) -> &'a str {
        self.destination
    }

    /// Id shared by every step of one navigation
    #[must_use]
    pub const fn trace_id(&self) -> Uuid {
        self.trace_id
    }
}

trait ErasedStep {
    fn view_name(&self) -> &'static str;
    fn prerequisite(&self) -> Prerequisite;
    fn step(&self, ctx: &StepContext<'_>) -> ViewResult<()>;
    fn has_resetter(&self) -> bool;
    fn resetter(&self, ctx: &StepContext<'_>, view: &dyn Any) -> ViewResult<()>;
    fn pre_navigate(&self, ctx: &StepContext<'_>) -> ViewResult<()>;
    fn post_navigate(&self, ctx: &StepContext<'_>) -> ViewResult<()>;
    fn can_skip(&self) -> bool;
    fn am_i_here(&self, ctx: &StepContext<'_>, view: &dyn Any) -> ViewResult<bool>;
    fn create_view(&self, ctx: &StepContext<'_>) -> Box<dyn Any>;
}

struct Erased<S>(S);

impl<S: NavigateStep> Erased<S> {
    fn typed<'v>(&self, view: &'v dyn Any) -> ViewResult<&'v S::View> {
        view.downcast_ref::<S::View>().ok_or_else(|| ViewError::Config {
            message: format!("expected a {} view", view_name::<S::View>()),
        })
    }
}

impl<S: NavigateStep> ErasedStep for Erased<S> {
    fn view_name(&self) -> &'static str {
        view_name::<S::View>()
    }

    fn prerequisite(&self) -> Prerequisite {
        self.0.prerequisite()
    }

    fn step(&self, ctx: &StepContext<'_>) -> ViewResult<()> {
        self.0.step(ctx)
    }

    fn has_resetter(&self) -> bool {
        self.0.has_resetter()
    }

    fn resetter(&self, ctx: &StepContext<'_>, view: &dyn Any) -> ViewResult<()> {
        self.0.resetter(ctx, self.typed(view)?)
    }

    fn pre_navigate(&self, ctx: &StepContext<'_>) -> ViewResult<()> {
        self.0.pre_navigate(ctx)
    }

    fn post_navigate(&self, ctx: &StepContext<'_>) -> ViewResult<()> {
        self.0.post_navigate(ctx)
    }

    fn can_skip(&self) -> bool {
        self.0.can_skip()
    }

    fn am_i_here(&self, ctx: &StepContext<'_>, view: &dyn Any) -> ViewResult<bool> {
        self.0.am_i_here(ctx, self.typed(view)?)
    }

    fn create_view(&self, ctx: &StepContext<'_>) -> Box<dyn Any> {
        let context = ViewContext::new()
            .with_object(Rc::clone(ctx.obj).into_any_rc())
            .with_value("destination", Value::from(ctx.destination));
        Box::new(S::View::with_context(ctx.browser(), context))
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

type StepKey = (TypeId, String);

struct Registered {
    entity: &'static str,
    step: Box<dyn ErasedStep>,
}

#[derive(Default)]
struct Registry {
    steps: HashMap<StepKey, Registered>,
    parents: HashMap<TypeId, TypeId>,
    names: HashMap<TypeId, &'static str>,
}

impl Registry {
    fn chain(&self, entity: TypeId) -> Vec<TypeId> {
        let mut chain = vec![entity];
        let mut seen = HashSet::from([entity]);
        let mut current = entity;
        while let Some(&parent) = self.parents.get(&current) {
            if !seen.insert(parent) {
                break;
            }
            chain.push(parent);
            current = parent;
        }
        chain
    }

    fn lookup(&self, entity: TypeId, destination: &str) -> Option<(StepKey, &Registered)> {
        self.chain(entity).into_iter().find_map(|ty| {
            let key = (ty, destination.to_string());
            self.steps.get(&key).map(|registered| (key, registered))
        })
    }

    fn type_name(&self, entity: TypeId) -> &'static str {
        self.names.get(&entity).copied().unwrap_or("<entity>")
    }
}

/// Collects steps and class chains, then validates them
pub struct NavigatorBuilder {
    registry: Registry,
    problems: Vec<ViewError>,
}

impl fmt::Debug for NavigatorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NavigatorBuilder")
            .field("steps", &self.registry.steps.len())
            .field("problems", &self.problems)
            .finish()
    }
}

impl NavigatorBuilder {
    /// Register `step` as `destination` of entity type `E`
    #[must_use]
    pub fn register<E: Entity, S: NavigateStep>(mut self, destination: impl Into<String>, step: S) -> Self {
        let destination = destination.into();
        let entity = view_name::<E>();
        self.registry.names.insert(TypeId::of::<E>(), entity);
        let key = (TypeId::of::<E>(), destination.clone());
        if self.registry.steps.contains_key(&key) {
            self.problems.push(ViewError::Config {
                message: format!("destination {destination} registered twice for {entity}"),
            });
        }
        tracing::trace!(entity, destination = %destination, view = view_name::<S::View>(), "register step");
        self.registry.steps.insert(
            key,
            Registered {
                entity,
                step: Box::new(Erased(step)),
            },
        );
        self
    }

    /// Let `Child` look up destinations it does not register on `Parent`
    #[must_use]
    pub fn inherit<Child: Entity, Parent: Entity>(mut self) -> Self {
        self.registry.names.insert(TypeId::of::<Child>(), view_name::<Child>());
        self.registry.names.insert(TypeId::of::<Parent>(), view_name::<Parent>());
        self.registry.parents.insert(TypeId::of::<Child>(), TypeId::of::<Parent>());
        self
    }

    /// Validate and freeze the registry
    pub fn build(mut self) -> ViewResult<Navigator> {
        if let Some(problem) = self.problems.pop() {
            return Err(problem);
        }
        let edges = self.static_edges()?;
        find_cycle(&self.registry, &edges)?;
        tracing::debug!(steps = self.registry.steps.len(), "navigator built");
        Ok(Navigator {
            registry: Rc::new(self.registry),
        })
    }

    fn static_edges(&self) -> ViewResult<HashMap<StepKey, StepKey>> {
        let registry = &self.registry;
        let mut edges = HashMap::new();
        for (key, registered) in &registry.steps {
            let (owner, destination) = key;
            let target = match registered.step.prerequisite() {
                Prerequisite::None => continue,
                Prerequisite::Sibling(name) => (*owner, name),
                Prerequisite::Attribute {
                    target: Some(target),
                    destination: name,
                    ..
                } => (target.id, name),
                Prerequisite::Attribute { target: None, .. } => continue,
            };
            let (found, _) = registry.lookup(target.0, &target.1).ok_or_else(|| {
                tracing::error!(
                    entity = registered.entity,
                    destination = %destination,
                    prerequisite = %target.1,
                    "prerequisite is not registered"
                );
                ViewError::DestinationNotFound {
                    entity: registry.type_name(target.0).to_string(),
                    destination: target.1.clone(),
                }
            })?;
            edges.insert(key.clone(), found);
        }
        Ok(edges)
    }
}

fn describe(registry: &Registry, key: &StepKey) -> String {
    format!("{}/{}", registry.type_name(key.0), key.1)
}

/// Depth-first search over prerequisite edges; every node has at most one
/// outgoing edge, so following it until a finished node or a repeat suffices.
fn find_cycle(registry: &Registry, edges: &HashMap<StepKey, StepKey>) -> ViewResult<()> {
    let mut done: HashSet<&StepKey> = HashSet::new();
    let mut starts: Vec<&StepKey> = registry.steps.keys().collect();
    starts.sort_by_key(|key| describe(registry, key));
    for start in starts {
        let mut trail: Vec<&StepKey> = Vec::new();
        let mut current = Some(start);
        while let Some(key) = current {
            if done.contains(key) {
                break;
            }
            if let Some(pos) = trail.iter().position(|k| *k == key) {
                let mut path: Vec<String> = trail[pos..].iter().map(|k| describe(registry, k)).collect();
                path.push(describe(registry, key));
                return Err(ViewError::NavigationCycle { path });
            }
            trail.push(key);
            current = edges.get(key);
        }
        done.extend(trail);
    }
    Ok(())
}

// =============================================================================
// NAVIGATOR
// =============================================================================

/// Options of one navigation
#[derive(Debug, Clone, PartialEq)]
pub struct NavOptions {
    /// Run the destination's resetter after arrival
    pub use_resetter: bool,
    /// Arguments handed to the destination step
    pub args: Vec<Value>,
}

impl Default for NavOptions {
    fn default() -> Self {
        Self {
            use_resetter: true,
            args: Vec::new(),
        }
    }
}

impl NavOptions {
    /// Defaults: resetter on, no arguments
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip the resetter
    #[must_use]
    pub const fn without_resetter(mut self) -> Self {
        self.use_resetter = false;
        self
    }

    /// Pass `args` to the destination step
    #[must_use]
    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }
}

/// State of one top-level navigation
struct Traversal {
    trace_id: Uuid,
    /// (step, entity identity) pairs currently being navigated
    active: Vec<(StepKey, String)>,
    /// Destinations whose step ran, in order
    executed: Vec<String>,
}

/// Immutable navigation registry
#[derive(Clone)]
pub struct Navigator {
    registry: Rc<Registry>,
}

impl fmt::Debug for Navigator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Navigator")
            .field("steps", &self.registry.steps.len())
            .finish_non_exhaustive()
    }
}

impl Navigator {
    /// Empty builder
    #[must_use]
    pub fn builder() -> NavigatorBuilder {
        NavigatorBuilder {
            registry: Registry::default(),
            problems: Vec::new(),
        }
    }

    /// Destinations available to `E`, own registrations first, sorted
    #[must_use]
    pub fn destinations<E: Entity>(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for ty in self.registry.chain(TypeId::of::<E>()) {
            let mut own: Vec<String> = self
                .registry
                .steps
                .keys()
                .filter(|(owner, name)| *owner == ty && !out.contains(name))
                .map(|(_, name)| name.clone())
                .collect();
            own.sort();
            out.extend(own);
        }
        out
    }

    /// Navigate `obj` to `destination` and return the arrived view
    pub fn navigate<V: CreateView>(
        &self,
        obj: &Rc<dyn Entity>,
        destination: &str,
        options: &NavOptions,
    ) -> ViewResult<V> {
        let mut traversal = Traversal {
            trace_id: Uuid::new_v4(),
            active: Vec::new(),
            executed: Vec::new(),
        };
        let view = self.navigate_any(obj, destination, options, &mut traversal)?;
        view.downcast::<V>().map(|view| *view).map_err(|_| ViewError::Config {
            message: format!("destination {destination} does not arrive at a {} view", view_name::<V>()),
        })
    }

    fn navigate_any(
        &self,
        obj: &Rc<dyn Entity>,
        destination: &str,
        options: &NavOptions,
        traversal: &mut Traversal,
    ) -> ViewResult<Box<dyn Any>> {
        let entity_type = Any::type_id((**obj).as_any());
        let (key, registered) = self.registry.lookup(entity_type, destination).ok_or_else(|| {
            ViewError::DestinationNotFound {
                entity: format!("{obj:?}"),
                destination: destination.to_string(),
            }
        })?;

        let identity = format!("{obj:?}");
        if traversal.active.iter().any(|(k, id)| *k == key && *id == identity) {
            let mut path: Vec<String> = traversal
                .active
                .iter()
                .map(|(k, _)| describe(&self.registry, k))
                .collect();
            path.push(describe(&self.registry, &key));
            return Err(ViewError::NavigationCycle { path });
        }

        traversal.active.push((key, identity));
        let result = self.navigate_with_retries(obj, destination, registered, options, traversal);
        traversal.active.pop();
        result
    }

    fn navigate_with_retries(
        &self,
        obj: &Rc<dyn Entity>,
        destination: &str,
        registered: &Registered,
        options: &NavOptions,
        traversal: &mut Traversal,
    ) -> ViewResult<Box<dyn Any>> {
        let browser = obj.appliance().browser();
        let retries = browser.config().navigation_retries;
        let mut attempt = 0;
        loop {
            match self.attempt(obj, destination, registered, options, traversal) {
                Err(ViewError::UnexpectedAlert { text }) if attempt < retries => {
                    attempt += 1;
                    tracing::warn!(
                        trace_id = %traversal.trace_id,
                        destination,
                        alert = %text,
                        attempt,
                        "unexpected alert during navigation, accepting and retrying"
                    );
                    match browser.handle_alert(AlertAction::Accept) {
                        Ok(_) | Err(ViewError::NoAlert) => {}
                        Err(err) => return Err(err),
                    }
                }
                other => return other,
            }
        }
    }

    fn attempt(
        &self,
        obj: &Rc<dyn Entity>,
        destination: &str,
        registered: &Registered,
        options: &NavOptions,
        traversal: &mut Traversal,
    ) -> ViewResult<Box<dyn Any>> {
        let step = registered.step.as_ref();
        let browser = obj.appliance().browser();
        let started = Instant::now();
        let mut ctx = StepContext {
            navigator: self,
            obj,
            destination,
            args: &options.args,
            prerequisite_view: None,
            trace_id: traversal.trace_id,
        };
        tracing::info!(
            trace_id = %traversal.trace_id,
            entity = registered.entity,
            destination,
            "beginning navigation"
        );

        step.pre_navigate(&ctx)?;
        let resetter_due = options.use_resetter && step.has_resetter();

        if step.can_skip() && !resetter_due {
            let view = step.create_view(&ctx);
            match step.am_i_here(&ctx, view.as_ref()) {
                Ok(true) => {
                    step.post_navigate(&ctx)?;
                    log_arrival(traversal, registered, destination, true, false, started);
                    return Ok(view);
                }
                Ok(false) => {}
                Err(err) => {
                    tracing::debug!(destination, error = %err, "arrival check failed, navigating");
                }
            }
        }

        ctx.prerequisite_view = match step.prerequisite() {
            Prerequisite::None => None,
            Prerequisite::Sibling(name) => {
                Some(self.navigate_any(obj, &name, &NavOptions::default(), traversal)?)
            }
            Prerequisite::Attribute {
                path, destination: name, ..
            } => {
                let target = resolve_attribute(obj, &path)?;
                Some(self.navigate_any(&target, &name, &NavOptions::default(), traversal)?)
            }
        };

        match step.step(&ctx) {
            Err(err @ ViewError::CandidateNotFound { .. }) => {
                tracing::warn!(destination, error = %err, "item missing during step, refreshing");
                browser.refresh()?;
                step.step(&ctx)?;
            }
            other => other?,
        }
        traversal.executed.push(format!("{}/{destination}", registered.entity));

        let view = step.create_view(&ctx);
        let config = browser.config();
        let options_wait = WaitOptions::bounded(config.navigation_timeout_ms, config.navigation_poll_ms)
            .with_message(format!("view {} to display", step.view_name()))
            .with_handle_exception(true);
        let arrived = wait_for(|| Ok(step.am_i_here(&ctx, view.as_ref())?.then_some(())), &options_wait);
        if let Err(err) = arrived {
            return Err(match err {
                ViewError::TimedOut { .. } => {
                    navigation_failed(obj, destination, traversal, step.view_name(), browser)
                }
                other => other,
            });
        }

        if resetter_due {
            step.resetter(&ctx, view.as_ref())?;
        }
        step.post_navigate(&ctx)?;
        log_arrival(traversal, registered, destination, false, resetter_due, started);
        Ok(view)
    }
}

fn navigation_failed(
    obj: &Rc<dyn Entity>,
    destination: &str,
    traversal: &Traversal,
    view: &str,
    browser: &Browser,
) -> ViewError {
    let url = browser.current_url().unwrap_or_default();
    let title = browser.title().unwrap_or_default();
    tracing::error!(
        trace_id = %traversal.trace_id,
        destination,
        entity = ?obj,
        %url,
        "view {view} did not display"
    );
    ViewError::NavigationFailed {
        destination: destination.to_string(),
        entity: format!("{obj:?}"),
        path: traversal.executed.clone(),
        url,
        title,
        reason: format!("{view} not displayed"),
    }
}

fn log_arrival(
    traversal: &Traversal,
    registered: &Registered,
    destination: &str,
    already_here: bool,
    resetter_used: bool,
    started: Instant,
) {
    tracing::info!(
        trace_id = %traversal.trace_id,
        entity = registered.entity,
        destination,
        already_here,
        resetter_used,
        elapsed_ms = started.elapsed().as_millis(),
        "navigation finished"
    );
}

/// Follow a dotted attribute path from `obj`; the segment `appliance` switches
/// lookups to appliance services
pub fn resolve_attribute(obj: &Rc<dyn Entity>, path: &str) -> ViewResult<Rc<dyn Entity>> {
    let mut current = Rc::clone(obj);
    let mut on_appliance = false;
    for segment in path.split('.') {
        if !on_appliance && segment == APPLIANCE_ATTRIBUTE {
            on_appliance = true;
            continue;
        }
        let next = if on_appliance {
            current.appliance().service(segment)
        } else {
            current.attribute(segment)
        };
        on_appliance = false;
        current = next.ok_or_else(|| ViewError::DestinationNotFound {
            entity: format!("{current:?}"),
            destination: path.to_string(),
        })?;
    }
    if on_appliance {
        return Err(ViewError::Config {
            message: format!("attribute path {path} ends at the appliance, not an entity"),
        });
    }
    Ok(current)
}

/// Navigate `obj` to `destination` with default options
pub fn navigate_to<V: CreateView, E: Entity>(obj: &Rc<E>, destination: &str) -> ViewResult<V> {
    navigate_to_with(obj, destination, &NavOptions::default())
}

/// Navigate `obj` to `destination`
pub fn navigate_to_with<V: CreateView, E: Entity>(
    obj: &Rc<E>,
    destination: &str,
    options: &NavOptions,
) -> ViewResult<V> {
    let obj: Rc<dyn Entity> = Rc::clone(obj) as Rc<dyn Entity>;
    let navigator = obj.appliance().navigator().clone();
    navigator.navigate(&obj, destination, options)
}
