//! Loose product versions and version-picked values.
//!
//! A [`Version`] is a sequence of numeric and alphabetic components
//! (`5.10.1`, `5.9.0.22`, `2.0b1`). Numbers compare numerically, words
//! lexically, and a number always sorts before a word at the same position.
//! Two sentinels bracket every release: [`Version::Lowest`] and
//! [`Version::Latest`] (`"master"` and `"latest"` parse as the latter).
//!
//! [`VersionPick`] maps minimum versions to values and picks the entry with the
//! greatest key at or below the product version.

use crate::browser::Browser;
use crate::result::{ViewError, ViewResult};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

/// One component of a loose version
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Component {
    /// Numeric run
    Num(u64),
    /// Anything else (letters, separators other than `.`)
    Alpha(String),
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(n) => write!(f, "{n}"),
            Self::Alpha(s) => f.write_str(s),
        }
    }
}

fn component_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\d+|[a-z]+|\.").ok())
        .as_ref()
}

fn push_chunk(out: &mut Vec<Component>, chunk: &str) {
    if chunk.is_empty() || chunk == "." {
        return;
    }
    match chunk.parse::<u64>() {
        Ok(n) => out.push(Component::Num(n)),
        Err(_) => out.push(Component::Alpha(chunk.to_string())),
    }
}

fn tokenize(text: &str) -> Vec<Component> {
    let mut out = Vec::new();
    let Some(pattern) = component_pattern() else {
        push_chunk(&mut out, text);
        return out;
    };
    let mut last = 0;
    for m in pattern.find_iter(text) {
        push_chunk(&mut out, &text[last..m.start()]);
        push_chunk(&mut out, m.as_str());
        last = m.end();
    }
    push_chunk(&mut out, &text[last..]);
    out
}

/// A loose product version
#[derive(Debug, Clone)]
pub enum Version {
    /// Below every release
    Lowest,
    /// A concrete release
    Release {
        /// Parsed components
        components: Vec<Component>,
        /// Text it was parsed from
        text: String,
    },
    /// Above every release (upstream / master builds)
    Latest,
}

impl Version {
    /// Parse a version string. Never fails: any text is a loose version.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.starts_with("master") || trimmed == "latest" {
            return Self::Latest;
        }
        if trimmed == "lowest" || trimmed == "oldest" || trimmed == "default" {
            return Self::Lowest;
        }
        Self::Release {
            components: tokenize(trimmed),
            text: trimmed.to_string(),
        }
    }

    /// The lowest sentinel
    #[must_use]
    pub const fn lowest() -> Self {
        Self::Lowest
    }

    /// The latest sentinel
    #[must_use]
    pub const fn latest() -> Self {
        Self::Latest
    }

    const fn rank(&self) -> i8 {
        match self {
            Self::Lowest => -1,
            Self::Release { .. } => 0,
            Self::Latest => 1,
        }
    }

    /// Parsed components (empty for sentinels)
    #[must_use]
    pub fn components(&self) -> &[Component] {
        match self {
            Self::Release { components, .. } => components,
            Self::Lowest | Self::Latest => &[],
        }
    }

    /// Whether this version belongs to `series` (`5.2.5.2` is in `5.2`).
    ///
    /// Sentinels are only in their own series.
    #[must_use]
    pub fn is_in_series(&self, series: &Self) -> bool {
        match (self, series) {
            (Self::Release { components, .. }, Self::Release { components: prefix, .. }) => {
                components.starts_with(prefix)
            }
            _ => self == series,
        }
    }

    /// The first `n` dot-separated parts (`5.10.1.2` -> `5.10` for `n = 2`)
    #[must_use]
    pub fn series(&self, n: usize) -> String {
        self.to_string()
            .split('.')
            .take(n)
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::Latest
    }
}

impl From<&str> for Version {
    fn from(text: &str) -> Self {
        Self::parse(text)
    }
}

impl From<String> for Version {
    fn from(text: String) -> Self {
        Self::parse(&text)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lowest => f.write_str("lowest"),
            Self::Release { text, .. } => f.write_str(text),
            Self::Latest => f.write_str("latest"),
        }
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank()
            .cmp(&other.rank())
            .then_with(|| self.components().cmp(other.components()))
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Ok(Self::parse(&text))
    }
}

/// A value chosen by product version
///
/// ```
/// use pageview::{Version, VersionPick};
///
/// let name = VersionPick::lowest("quadicons_ems").since("5.10", "quadicons_infra_manager");
/// assert_eq!(name.pick(&Version::parse("5.9.3")), Some(&"quadicons_ems"));
/// assert_eq!(name.pick(&Version::parse("5.11.0")), Some(&"quadicons_infra_manager"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct VersionPick<T> {
    entries: BTreeMap<Version, T>,
}

impl<T> Default for VersionPick<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<T> VersionPick<T> {
    /// Empty pick
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick whose first entry applies to every version
    #[must_use]
    pub fn lowest(value: T) -> Self {
        Self::new().since(Version::Lowest, value)
    }

    /// Add an entry applying from `version` upwards
    #[must_use]
    pub fn since(mut self, version: impl Into<Version>, value: T) -> Self {
        self.entries.insert(version.into(), value);
        self
    }

    /// Entry with the greatest key at or below `version`
    #[must_use]
    pub fn pick(&self, version: &Version) -> Option<&T> {
        self.entries
            .range(..=version.clone())
            .next_back()
            .map(|(_, value)| value)
    }

    /// Pick against the browser's product version
    pub fn resolve(&self, browser: &Browser) -> ViewResult<&T> {
        let version = browser.product_version();
        self.pick(version).ok_or_else(|| ViewError::VersionUnmatched {
            version: version.to_string(),
        })
    }

    /// Registered versions in ascending order
    pub fn versions(&self) -> impl Iterator<Item = &Version> {
        self.entries.keys()
    }

    /// Convert every value, keeping the version keys
    #[must_use]
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> VersionPick<U> {
        VersionPick {
            entries: self.entries.into_iter().map(|(v, t)| (v, f(t))).collect(),
        }
    }
}

impl<T, V: Into<Version>> FromIterator<(V, T)> for VersionPick<T> {
    fn from_iter<I: IntoIterator<Item = (V, T)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(v, t)| (v.into(), t)).collect(),
        }
    }
}


#[cfg(test)]
mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    fn release() -> impl Strategy<Value = Vec<u64>> {
        proptest::collection::vec(0u64..30, 1..5)
    }

    fn render(parts: &[u64]) -> String {
        parts
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(".")
    }

    proptest! {
        /// Numeric releases order like their component vectors
        #[test]
        fn prop_release_order_matches_components(a in release(), b in release()) {
            let va = Version::parse(&render(&a));
            let vb = Version::parse(&render(&b));
            prop_assert_eq!(va.cmp(&vb), a.cmp(&b));
        }

        /// Sentinels bracket every release
        #[test]
        fn prop_sentinels_bracket(a in release()) {
            let va = Version::parse(&render(&a));
            prop_assert!(Version::Lowest < va);
            prop_assert!(va < Version::Latest);
        }

        /// A product version at or above a later key never gets the earlier value
        #[test]
        fn prop_pick_monotonic(a in release(), b in release(), c in release()) {
            let mut keys = [a, b, c];
            keys.sort();
            let (v1, v2, product) = (&keys[0], &keys[1], &keys[2]);
            prop_assume!(v1 != v2);
            let pick = VersionPick::new()
                .since(render(v1), "first")
                .since(render(v2), "second");
            prop_assert_eq!(pick.pick(&Version::parse(&render(product))), Some(&"second"));
        }
    }
}
