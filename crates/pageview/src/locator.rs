//! Locators: selectors, parametrized templates and version-picked selectors.
//!
//! A widget's locator is resolved against its node every time the widget
//! touches the DOM. Resolution is where templates get their parameter values
//! and version picks get the product version.

use crate::result::{ViewError, ViewResult};
use crate::version::VersionPick;
use crate::widget::Node;
use regex::{Captures, Regex};
use serde_json::Value;
use std::fmt;
use std::rc::Rc;
use std::sync::OnceLock;

// =============================================================================
// SELECTOR
// =============================================================================

/// A concrete selector handed to the driver
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// XPath expression
    XPath(String),
    /// CSS selector
    Css(String),
}

impl Selector {
    /// Classify a selector string: XPath when it starts with `/`, `./`, `..` or `(`
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim_start();
        if trimmed.starts_with('/')
            || trimmed.starts_with("./")
            || trimmed.starts_with("..")
            || trimmed.starts_with('(')
        {
            Self::XPath(text.to_string())
        } else {
            Self::Css(text.to_string())
        }
    }

    /// XPath selector
    #[must_use]
    pub fn xpath(text: impl Into<String>) -> Self {
        Self::XPath(text.into())
    }

    /// CSS selector
    #[must_use]
    pub fn css(text: impl Into<String>) -> Self {
        Self::Css(text.into())
    }

    /// Raw selector text
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::XPath(s) | Self::Css(s) => s,
        }
    }

    /// Absolute selectors resolve from the document, ignoring the parent element
    #[must_use]
    pub fn is_absolute(&self) -> bool {
        match self {
            Self::XPath(s) => {
                let s = s.trim_start();
                s.starts_with('/') || s.starts_with('(')
            }
            Self::Css(_) => false,
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Selector {
    fn from(text: &str) -> Self {
        Self::parse(text)
    }
}

impl From<String> for Selector {
    fn from(text: String) -> Self {
        Self::parse(&text)
    }
}

// =============================================================================
// QUOTING
// =============================================================================

/// Quote a string as an XPath literal.
///
/// ```
/// use pageview::quote;
///
/// assert_eq!(quote("Amazon"), "'Amazon'");
/// assert_eq!(quote("it's"), "\"it's\"");
/// assert_eq!(quote(r#"a'b"c"#), r#"concat('a', "'", 'b"c')"#);
/// ```
#[must_use]
pub fn quote(text: &str) -> String {
    if !text.contains('\'') {
        format!("'{text}'")
    } else if !text.contains('"') {
        format!("\"{text}\"")
    } else {
        format!("concat('{}')", text.split('\'').collect::<Vec<_>>().join("', \"'\", '"))
    }
}

// =============================================================================
// PARAMETRIZED LOCATOR
// =============================================================================

fn placeholder_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\{(@?)([A-Za-z_][A-Za-z0-9_.]*)(?:\|([a-z]+))?\}").ok())
        .as_ref()
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Locator template filled from parameter bindings and widget attributes.
///
/// `{name}` looks the name up in the nearest parameter binding, then in widget
/// attributes; `{@name}` only in widget attributes. `|quote` XPath-quotes the
/// value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParametrizedLocator {
    template: String,
}

impl ParametrizedLocator {
    /// Create from a template
    #[must_use]
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// The unresolved template
    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Fill the template using `lookup(name, attribute_only)`
    pub fn render(
        &self,
        mut lookup: impl FnMut(&str, bool) -> Option<String>,
    ) -> ViewResult<String> {
        let Some(pattern) = placeholder_pattern() else {
            return Ok(self.template.clone());
        };
        let mut missing = None;
        let rendered = pattern.replace_all(&self.template, |caps: &Captures<'_>| {
            let attribute_only = !caps[1].is_empty();
            let name = &caps[2];
            match lookup(name, attribute_only) {
                Some(value) => match caps.get(3).map(|m| m.as_str()) {
                    Some("quote") => quote(&value),
                    _ => value,
                },
                None => {
                    missing.get_or_insert_with(|| name.to_string());
                    String::new()
                }
            }
        });
        match missing {
            Some(name) => Err(ViewError::UnboundParameter {
                name,
                template: self.template.clone(),
            }),
            None => Ok(rendered.into_owned()),
        }
    }

    /// Resolve against a node's parameter bindings and attributes
    pub fn resolve(&self, node: &Node) -> ViewResult<Selector> {
        let text = self.render(|name, attribute_only| {
            if attribute_only {
                node.attr(name)
            } else {
                node.param(name)
                    .map(|v| value_text(&v))
                    .or_else(|| node.attr(name))
            }
        })?;
        Ok(Selector::parse(&text))
    }
}

// =============================================================================
// LOCATOR
// =============================================================================

/// Function computing a selector from the node being resolved
pub type LocatorFn = Rc<dyn Fn(&Node) -> ViewResult<Selector>>;

/// Unresolved locator of a widget
#[derive(Clone)]
pub enum Locator {
    /// Constant selector
    Static(Selector),
    /// Template resolved from bindings
    Parametrized(ParametrizedLocator),
    /// Computed at resolution time
    Dynamic(LocatorFn),
    /// Chosen by product version
    Picked(VersionPick<Selector>),
}

impl Locator {
    /// Locator computed by a closure
    pub fn dynamic(f: impl Fn(&Node) -> ViewResult<Selector> + 'static) -> Self {
        Self::Dynamic(Rc::new(f))
    }

    /// Parametrized template
    #[must_use]
    pub fn parametrized(template: impl Into<String>) -> Self {
        Self::Parametrized(ParametrizedLocator::new(template))
    }

    /// Version-picked selector strings
    #[must_use]
    pub fn picked(pick: VersionPick<&str>) -> Self {
        Self::Picked(pick.map(Selector::parse))
    }

    /// Resolve to a concrete selector for `node`
    pub fn resolve(&self, node: &Node) -> ViewResult<Selector> {
        match self {
            Self::Static(selector) => Ok(selector.clone()),
            Self::Parametrized(template) => template.resolve(node),
            Self::Dynamic(f) => f(node),
            Self::Picked(pick) => pick.resolve(node.browser()).cloned(),
        }
    }

    /// Text used in logs and errors before resolution
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Static(selector) => selector.to_string(),
            Self::Parametrized(template) => template.template().to_string(),
            Self::Dynamic(_) => "<computed>".to_string(),
            Self::Picked(pick) => {
                let versions: Vec<String> = pick.versions().map(ToString::to_string).collect();
                format!("<picked at {}>", versions.join(", "))
            }
        }
    }
}

impl fmt::Debug for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(s) => f.debug_tuple("Static").field(s).finish(),
            Self::Parametrized(p) => f.debug_tuple("Parametrized").field(p).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
            Self::Picked(p) => f.debug_tuple("Picked").field(p).finish(),
        }
    }
}

impl From<&str> for Locator {
    fn from(text: &str) -> Self {
        Self::Static(Selector::parse(text))
    }
}

impl From<String> for Locator {
    fn from(text: String) -> Self {
        Self::Static(Selector::parse(&text))
    }
}

impl From<Selector> for Locator {
    fn from(selector: Selector) -> Self {
        Self::Static(selector)
    }
}

impl From<ParametrizedLocator> for Locator {
    fn from(template: ParametrizedLocator) -> Self {
        Self::Parametrized(template)
    }
}

impl From<VersionPick<Selector>> for Locator {
    fn from(pick: VersionPick<Selector>) -> Self {
        Self::Picked(pick)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod selector_tests {
        use super::*;

        #[test]
        fn test_xpath_detection() {
            assert!(matches!(Selector::parse(".//div"), Selector::XPath(_)));
            assert!(matches!(Selector::parse("//div"), Selector::XPath(_)));
            assert!(matches!(Selector::parse("(//a)[1]"), Selector::XPath(_)));
            assert!(matches!(Selector::parse("../span"), Selector::XPath(_)));
            assert!(matches!(Selector::parse("div.alert"), Selector::Css(_)));
            assert!(matches!(Selector::parse("#main"), Selector::Css(_)));
        }

        #[test]
        fn test_absolute() {
            assert!(Selector::parse("//div").is_absolute());
            assert!(Selector::parse("(//div)[2]").is_absolute());
            assert!(!Selector::parse(".//div").is_absolute());
            assert!(!Selector::parse("div").is_absolute());
        }
    }

    mod quote_tests {
        use super::*;

        #[test]
        fn test_plain() {
            assert_eq!(quote("All PXE Servers"), "'All PXE Servers'");
        }

        #[test]
        fn test_single_quote() {
            assert_eq!(quote("Bob's"), "\"Bob's\"");
        }

        #[test]
        fn test_both_quotes() {
            assert_eq!(quote(r#"'"'"#), r#"concat('', "'", '"', "'", '')"#);
        }
    }

    mod template_tests {
        use super::*;
        use std::collections::HashMap;

        fn render(template: &str, params: &[(&str, &str)], attrs: &[(&str, &str)]) -> ViewResult<String> {
            let params: HashMap<_, _> = params.iter().copied().collect();
            let attrs: HashMap<_, _> = attrs.iter().copied().collect();
            ParametrizedLocator::new(template).render(|name, attribute_only| {
                let from_attrs = attrs.get(name).map(|s| (*s).to_string());
                if attribute_only {
                    from_attrs
                } else {
                    params.get(name).map(|s| (*s).to_string()).or(from_attrs)
                }
            })
        }

        #[test]
        fn test_param_with_quote() {
            let out = render(".//h3[normalize-space(.)={title|quote}]", &[("title", "Bob's")], &[]).unwrap();
            assert_eq!(out, ".//h3[normalize-space(.)=\"Bob's\"]");
        }

        #[test]
        fn test_attribute_only() {
            let out = render(".//div[@id={@search_root|quote}]", &[("search_root", "x")], &[("search_root", "search")]).unwrap();
            assert_eq!(out, ".//div[@id='search']");
        }

        #[test]
        fn test_param_wins_over_attribute() {
            let out = render("{name}", &[("name", "p")], &[("name", "a")]).unwrap();
            assert_eq!(out, "p");
        }

        #[test]
        fn test_unbound() {
            let err = render(".//a[{missing}]", &[], &[]).unwrap_err();
            assert!(matches!(err, ViewError::UnboundParameter { ref name, .. } if name == "missing"));
        }

        #[test]
        fn test_attribute_only_ignores_params() {
            let err = render("{@only}", &[("only", "p")], &[]).unwrap_err();
            assert!(matches!(err, ViewError::UnboundParameter { .. }));
        }
    }

    mod describe_tests {
        use super::*;

        #[test]
        fn test_describe() {
            assert_eq!(Locator::from(".//a").describe(), ".//a");
            assert_eq!(Locator::parametrized("{x}").describe(), "{x}");
            let picked = Locator::picked(VersionPick::lowest(".//a").since("5.10", ".//b"));
            assert_eq!(picked.describe(), "<picked at lowest, 5.10>");
        }
    }
}

#[cfg(test)]
mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Quoting never leaves the literal ambiguous
        #[test]
        fn prop_quote_shapes(text in "[a-z'\" ]{0,12}") {
            let quoted = quote(&text);
            if !text.contains('\'') {
                prop_assert_eq!(quoted, format!("'{text}'"));
            } else if !text.contains('"') {
                prop_assert_eq!(quoted, format!("\"{text}\""));
            } else {
                prop_assert!(quoted.starts_with("concat('"));
                prop_assert!(quoted.ends_with("')"));
            }
        }
    }
}
