//! Pageview: page objects, widgets and navigation graphs for browser-driven
//! end-to-end tests.
//!
//! Pages are modelled as trees of widgets. Each widget owns a lazily resolved
//! locator relative to its parent; views group widgets and read or fill them
//! as one JSON mapping; a navigation registry knows how to reach every view of
//! every entity from a logged-in start.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      PAGEVIEW Architecture                        │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌────────────┐    ┌────────────┐    ┌────────────┐               │
//! │  │ Navigator  │───►│ Views      │───►│ Browser    │──► Driver     │
//! │  │ (steps,    │    │ (widgets,  │    │ (retries,  │   (WebDriver  │
//! │  │  prereqs)  │    │  read/fill)│    │  alerts)   │    or mock)   │
//! │  └────────────┘    └────────────┘    └────────────┘               │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The [`Driver`] trait is the only seam to a real browser; [`mock::MockDriver`]
//! implements it over an in-memory page for tests.

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::large_stack_arrays, clippy::large_stack_frames))]

// `#[derive(View)]` expands to `::pageview::...` paths, also inside this crate.
extern crate self as pageview;

mod alert;
mod browser;
mod config;
mod driver;
mod locator;
mod logging;
mod result;
mod version;
mod view;
mod widget;

/// Navigation registry, steps and traversal
pub mod navigation;

/// Polling waits
pub mod wait;

/// In-memory driver for tests
pub mod mock;

/// Common widgets
pub mod widgets;

pub use alert::{AlertAction, AlertHandling, HandledAlert};
pub use browser::{
    page_is_safe, Browser, BrowserBuilder, DefaultPlugin, PagePlugin, ENSURE_PAGE_SAFE,
    OBSERVED_FIELD_MARKERS,
};
pub use config::{
    RuntimeConfig, RuntimeConfigBuilder, ABANDON_CHANGES_ALERT, DEFAULT_NAVIGATION_TIMEOUT_MS,
    DEFAULT_PAGE_SAFE_TIMEOUT_MS, DEFAULT_POLL_MS,
};
pub use driver::{Driver, ElementHandle, ELEMENT_KEY};
pub use locator::{quote, Locator, LocatorFn, ParametrizedLocator, Selector};
pub use logging::{init_json_tracing, init_tracing};
pub use navigation::{
    navigate_to, navigate_to_with, Appliance, ApplianceBuilder, Entity, EntityType,
    NavOptions, NavigateStep, Navigator, NavigatorBuilder, Prerequisite, StepContext,
};
pub use result::{redact_locator, ViewError, ViewResult};
pub use version::{Component, Version, VersionPick};
pub use view::{
    fill_view, read_view, view_name, ConditionalSwitchableView, CreateView, FillStrategy,
    Parametrized, ParametrizedView, SwitchableDecl, View, FILL_WAIT_POLL_MS,
};
pub use wait::{wait_for, wait_for_with_fail, wait_until, WaitOptions, WaitResult};
pub use widget::{
    value_as_text, AsAny, Bind, Clickable, Node, Placeholder, ViewContext, Widget,
};

#[cfg(feature = "derive")]
pub use pageview_derive::View;

#[doc(hidden)]
pub mod __private {
    pub use serde_json::Value;
}

/// Everything a page module usually needs
pub mod prelude {
    pub use super::navigation::*;
    pub use super::widgets::*;
    pub use super::{
        fill_view, quote, read_view, wait_for, wait_until, AlertHandling, Bind, Browser, Clickable,
        ConditionalSwitchableView, CreateView, FillStrategy, Locator, Node, Parametrized,
        ParametrizedLocator, ParametrizedView, Placeholder, Selector, Version, VersionPick, View,
        ViewContext, ViewError, ViewResult, WaitOptions, Widget,
    };
}
