//! Navigation trees.
//!
//! Two implementations exist, selected by product version: [`DynaTree`] for
//! older builds and [`BootstrapTreeview`] from [`TREE_SWITCH_VERSION`] on.
//! [`Tree`] and [`CheckableTree`] make that choice when bound and expose the
//! common [`TreeNavigation`] surface.
//!
//! Paths are lists of node texts from the root down, matched exactly. A
//! missing segment fails with `CandidateNotFound` naming the segment and the
//! whole path.

use crate::driver::ElementHandle;
use crate::locator::quote;
use crate::result::{ViewError, ViewResult};
use crate::version::VersionPick;
use crate::wait::{wait_for, wait_until, WaitOptions};
use crate::widget::{Node, Placeholder, Widget};
use serde_json::Value;
use std::fmt;

/// First version that renders Bootstrap Treeview instead of DynaTree
pub const TREE_SWITCH_VERSION: &str = "5.7.0.1";

/// Shared surface of every tree implementation
pub trait TreeNavigation: fmt::Debug {
    /// Expand every ancestor of `path` and return the leaf element
    fn expand_path(&self, path: &[&str]) -> ViewResult<ElementHandle>;

    /// Expand `path` and click its leaf
    fn click_path(&self, path: &[&str]) -> ViewResult<ElementHandle>;

    /// Texts of the selected node and its ancestors, root first
    fn currently_selected(&self) -> ViewResult<Vec<String>>;

    /// Whole tree as nested names: a leaf is a string, a branch `[name, [children]]`
    fn read_contents(&self) -> ViewResult<Value>;
}

/// Trees whose nodes carry checkboxes
pub trait CheckableNavigation: TreeNavigation {
    /// Set the checkbox of the node at `path`; returns whether it was clicked
    fn set_node_checked(&self, path: &[&str], check: bool) -> ViewResult<bool>;

    /// Whether the node at `path` is checked; non-checkable nodes are not
    fn node_checked(&self, path: &[&str]) -> ViewResult<bool>;

    /// Check the node at `path`
    fn check_node(&self, path: &[&str]) -> ViewResult<bool> {
        self.set_node_checked(path, true)
    }

    /// Uncheck the node at `path`
    fn uncheck_node(&self, path: &[&str]) -> ViewResult<bool> {
        self.set_node_checked(path, false)
    }
}

fn candidate_not_found(segment: &str, path: &[&str], message: String, cause: Option<String>) -> ViewError {
    ViewError::CandidateNotFound {
        segment: segment.to_string(),
        path: path.iter().map(ToString::to_string).collect(),
        message,
        cause,
    }
}

fn path_value(value: &Value, widget: &str) -> ViewResult<Vec<String>> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|v| match v {
                Value::String(s) => Ok(s.clone()),
                other => Err(ViewError::invalid(widget, format!("path segment {other} is not a string"))),
            })
            .collect(),
        other => Err(ViewError::invalid(widget, format!("expected a path list, got {other}"))),
    }
}

fn fill_path(tree: &dyn TreeNavigation, widget: &str, value: &Value) -> ViewResult<bool> {
    let path = path_value(value, widget)?;
    if tree.currently_selected()? == path {
        return Ok(false);
    }
    let segments: Vec<&str> = path.iter().map(String::as_str).collect();
    tree.click_path(&segments)?;
    Ok(true)
}

fn tree_locator(tree_id: &str) -> String {
    format!("#{tree_id}")
}

// =============================================================================
// DYNATREE
// =============================================================================

/// Helper evaluated in the page: reads the dynatree under `arguments[0]`.
///
/// Returns `false` while a lazy load is in flight, `null` for an empty tree.
pub const READ_TREE: &str = r#"
function node_name(node, by_id) {
    if (by_id) { return node.li.getAttribute("id"); }
    var a = node.li.querySelector(":scope > span > a");
    return a === null ? null : a.textContent;
}
function load(node) {
    var expander = node.li.querySelector(":scope > span > span.dynatree-expander");
    if (expander !== null && !node.bExpanded) {
        node.expand();
        if (node.childList === null && node.data.isLazy) { return false; }
    }
    return true;
}
function walk(node, by_id, top) {
    if (!load(node)) { return false; }
    var children = node.childList === null ? [] : node.childList;
    var out = [];
    for (var i = 0; i < children.length; i++) {
        var sub = walk(children[i], by_id, false);
        if (sub === false) { return false; }
        out.push(sub);
    }
    if (top) { return out.length === 0 ? null : out; }
    var name = node_name(node, by_id);
    return out.length === 0 ? name : [name, out];
}
function read_tree(selector, by_id) {
    var root = null;
    try { root = $(selector).dynatree("getRoot"); } catch (err) { return false; }
    return root === null ? null : walk(root, by_id, true);
}
"#;

/// Script-backed tree of older builds
#[derive(Debug)]
pub struct DynaTree {
    node: Node,
    tree_id: String,
}

impl DynaTree {
    /// Top level item
    pub const ROOT_ITEM: &'static str = "./ul/li";
    /// Anchors of the active node and its ancestors
    pub const SELECTED: &'static str = ".//li[.//span[contains(@class, \"dynatree-active\")]]/span/a";
    /// Checkbox, under a node span
    pub const CHECKBOX: &'static str = "./span[contains(@class, \"dynatree-checkbox\")]";
    /// Checked marker, under a node span
    pub const CHECKED: &'static str = "./../span[contains(@class, \"dynatree-selected\")]";

    /// Tree in the element with id `tree_id`
    pub fn new(tree_id: &str) -> Placeholder<Self> {
        let tree_id = tree_id.to_string();
        Placeholder::located(tree_locator(&tree_id), move |node| Self { node, tree_id })
    }

    fn on(node: Node, tree_id: &str) -> Self {
        Self {
            node,
            tree_id: tree_id.to_string(),
        }
    }

    /// Id of the hosting element
    #[must_use]
    pub fn tree_id(&self) -> &str {
        &self.tree_id
    }

    /// XPath of the node at `path`, relative to the tree
    #[must_use]
    pub fn path_xpath(path: &[&str]) -> String {
        let steps: Vec<String> = path
            .iter()
            .map(|item| format!("ul/li[./span/a[normalize-space(.)={}]]", quote(item)))
            .collect();
        format!("./{}", steps.join("/"))
    }

    /// Span of the item with `id`
    #[must_use]
    pub fn item_span_locator(id: &str) -> String {
        format!(".//li[@id={}]/span", quote(id))
    }

    /// Expander of the item with `id`
    #[must_use]
    pub fn expander_locator(id: &str) -> String {
        format!(
            ".//li[@id={}]/span/span[contains(@class, \"dynatree-expander\")]",
            quote(id)
        )
    }

    /// Children of the item with `id`
    #[must_use]
    pub fn children_locator(id: &str) -> String {
        format!(".//li[@id={}]/ul/li", quote(id))
    }

    fn wait_options(&self, timeout_ms: u64, message: String) -> WaitOptions {
        WaitOptions::bounded(timeout_ms, self.node.browser().config().page_safe_poll_ms).with_message(message)
    }

    fn item_expanded(&self, id: &str) -> ViewResult<bool> {
        let span = self.node.find(&Self::item_span_locator(id))?;
        Ok(self.node.browser().classes(&span)?.iter().any(|c| c == "dynatree-expanded"))
    }

    fn item_expandable(&self, id: &str) -> ViewResult<bool> {
        Ok(!self.node.find_all(&Self::expander_locator(id))?.is_empty())
    }

    /// Expand the item with `id` and wait for its children to load
    pub fn expand_id(&self, id: &str) -> ViewResult<()> {
        let browser = self.node.browser();
        browser.ensure_page_safe()?;
        if self.item_expanded(id)? || !self.item_expandable(id)? {
            return Ok(());
        }
        tracing::debug!(tree = %self.tree_id, id, "expanding node");
        browser.click(&self.node.find(&Self::expander_locator(id))?)?;
        let options = self.wait_options(
            browser.config().tree_expand_timeout_ms,
            format!("tree node {id} to expand"),
        );
        wait_until(|| self.item_expanded(id), &options)?;
        Ok(())
    }

    /// Texts of the children of the item with `id`, expanding it first
    pub fn child_items(&self, id: &str) -> ViewResult<Vec<String>> {
        self.expand_id(id)?;
        let browser = self.node.browser();
        let mut names = Vec::new();
        for item in self.node.find_all(&Self::children_locator(id))? {
            if let Some(a) = self.node.find_all_in(&item, "./span/a")?.first() {
                names.push(browser.text(a)?);
            }
        }
        Ok(names)
    }

    fn id_of(&self, el: &ElementHandle) -> ViewResult<String> {
        Ok(self.node.browser().get_attribute(el, "id")?.unwrap_or_default())
    }

    fn first_in(&self, el: &ElementHandle, selector: &str) -> ViewResult<Option<ElementHandle>> {
        Ok(self.node.find_all_in(el, selector)?.into_iter().next())
    }
}

impl TreeNavigation for DynaTree {
    fn expand_path(&self, path: &[&str]) -> ViewResult<ElementHandle> {
        tracing::info!(tree = %self.tree_id, path = %path.join("/"), "expanding path");
        let mut last_id = None;
        let mut leaf = None;
        for (depth, item) in path.iter().enumerate() {
            let id = match last_id.take() {
                Some(id) => id,
                None => self.id_of(&self.node.find(Self::ROOT_ITEM)?)?,
            };
            self.expand_id(&id)?;
            let xpath = Self::path_xpath(&path[..=depth]);
            let found = match self.node.find(&xpath) {
                Ok(found) => found,
                Err(ViewError::LocatorNotFound { .. }) => {
                    return Err(candidate_not_found(
                        item,
                        path,
                        format!("{item}: could not be found in the tree."),
                        None,
                    ))
                }
                Err(err) => return Err(err),
            };
            last_id = Some(self.id_of(&found)?);
            leaf = Some(found);
        }
        let leaf = leaf.ok_or_else(|| ViewError::invalid(self.node.path(), "empty tree path"))?;
        if let Some(id) = last_id {
            self.expand_id(&id)?;
        }
        self.first_in(&leaf, "./span")?
            .ok_or_else(|| ViewError::not_found("./span", self.node.path()))
    }

    fn click_path(&self, path: &[&str]) -> ViewResult<ElementHandle> {
        let leaf = self.expand_path(path)?;
        let browser = self.node.browser();
        let title = self
            .first_in(&leaf, "./a")?
            .ok_or_else(|| ViewError::not_found("./a", self.node.path()))?;
        tracing::info!(tree = %self.tree_id, item = %browser.text(&title)?, "clicking tree item");
        browser.ensure_page_safe()?;
        browser.click(&title)?;
        if let Some(checkbox) = self.first_in(&leaf, DynaTree::CHECKBOX)? {
            if browser.is_displayed(&checkbox)? {
                browser.click(&checkbox)?;
            }
        }
        Ok(leaf)
    }

    fn currently_selected(&self) -> ViewResult<Vec<String>> {
        let browser = self.node.browser();
        self.node
            .find_all_visible(Self::SELECTED)?
            .iter()
            .map(|a| browser.text(a))
            .collect()
    }

    fn read_contents(&self) -> ViewResult<Value> {
        let browser = self.node.browser();
        let script = format!("{READ_TREE}\nreturn read_tree(arguments[0], arguments[1]);");
        let args = [Value::from(tree_locator(&self.tree_id)), Value::Bool(false)];
        let options = self.wait_options(
            browser.config().tree_load_timeout_ms,
            format!("tree {} to finish loading", self.tree_id),
        );
        let read = wait_for(
            || {
                browser.ensure_page_safe()?;
                let result = browser.execute_script(&script, &args)?;
                Ok((result != Value::Bool(false)).then_some(result))
            },
            &options,
        )?;
        Ok(read.value)
    }
}

impl Widget for DynaTree {
    fn node(&self) -> &Node {
        &self.node
    }

    fn read(&self) -> ViewResult<Value> {
        Ok(Value::from(self.currently_selected()?))
    }

    fn fill_value(&self, value: &Value) -> ViewResult<bool> {
        fill_path(self, &self.node.path(), value)
    }
}

/// DynaTree whose nodes carry checkboxes
#[derive(Debug)]
pub struct CheckableDynaTree {
    tree: DynaTree,
}

impl CheckableDynaTree {
    /// Checkable tree in the element with id `tree_id`
    pub fn new(tree_id: &str) -> Placeholder<Self> {
        DynaTree::new(tree_id).map(|tree| Self { tree })
    }

    /// The underlying tree
    #[must_use]
    pub const fn tree(&self) -> &DynaTree {
        &self.tree
    }

    fn is_checkable(&self, leaf: &ElementHandle) -> ViewResult<bool> {
        Ok(!self.tree.node.find_all_in(leaf, DynaTree::CHECKBOX)?.is_empty())
    }

    fn is_checked(&self, leaf: &ElementHandle) -> ViewResult<bool> {
        Ok(!self.tree.node.find_all_in(leaf, DynaTree::CHECKED)?.is_empty())
    }
}

impl TreeNavigation for CheckableDynaTree {
    fn expand_path(&self, path: &[&str]) -> ViewResult<ElementHandle> {
        self.tree.expand_path(path)
    }

    fn click_path(&self, path: &[&str]) -> ViewResult<ElementHandle> {
        self.tree.click_path(path)
    }

    fn currently_selected(&self) -> ViewResult<Vec<String>> {
        self.tree.currently_selected()
    }

    fn read_contents(&self) -> ViewResult<Value> {
        self.tree.read_contents()
    }
}

impl CheckableNavigation for CheckableDynaTree {
    fn set_node_checked(&self, path: &[&str], check: bool) -> ViewResult<bool> {
        let leaf = self.tree.expand_path(path)?;
        if !self.is_checkable(&leaf)? {
            return Err(ViewError::TreeNodeNotCheckable {
                path: path.iter().map(ToString::to_string).collect(),
            });
        }
        if self.is_checked(&leaf)? == check {
            return Ok(false);
        }
        tracing::info!(tree = %self.tree.tree_id, item = path.last().copied().unwrap_or_default(), check, "toggle tree node");
        let checkbox = self
            .tree
            .first_in(&leaf, DynaTree::CHECKBOX)?
            .ok_or_else(|| ViewError::not_found(DynaTree::CHECKBOX, self.tree.node.path()))?;
        self.tree.node.browser().click(&checkbox)?;
        Ok(true)
    }

    fn node_checked(&self, path: &[&str]) -> ViewResult<bool> {
        let leaf = self.tree.expand_path(path)?;
        Ok(self.is_checkable(&leaf)? && self.is_checked(&leaf)?)
    }
}

impl Widget for CheckableDynaTree {
    fn node(&self) -> &Node {
        &self.tree.node
    }

    fn fill_value(&self, value: &Value) -> ViewResult<bool> {
        fill_checked(self, &self.tree.node.path(), value)
    }
}

fn fill_checked(tree: &dyn CheckableNavigation, widget: &str, value: &Value) -> ViewResult<bool> {
    let path = path_value(value, widget)?;
    let segments: Vec<&str> = path.iter().map(String::as_str).collect();
    if tree.node_checked(&segments)? {
        return Ok(false);
    }
    tree.check_node(&segments)
}

// =============================================================================
// BOOTSTRAP TREEVIEW
// =============================================================================

/// DOM-driven tree of newer builds, addressed by `data-nodeid`
#[derive(Debug)]
pub struct BootstrapTreeview {
    node: Node,
    tree_id: String,
}

impl BootstrapTreeview {
    /// Top item
    pub const ROOT_ITEM: &'static str = "./ul/li[1]";
    /// Selected item
    pub const SELECTED_ITEM: &'static str = "./ul/li[contains(@class, \"node-selected\")]";
    /// Expand arrow, under an item
    pub const IS_EXPANDABLE: &'static str = "./span[contains(@class, \"expand-icon\")]";
    /// Expanded arrow, under an item
    pub const IS_EXPANDED: &'static str =
        "./span[contains(@class, \"expand-icon\") and contains(@class, \"fa-angle-down\")]";
    /// Checkbox, under an item
    pub const IS_CHECKABLE: &'static str = "./span[contains(@class, \"check-icon\")]";
    /// Checked checkbox, under an item
    pub const IS_CHECKED: &'static str =
        "./span[contains(@class, \"check-icon\") and contains(@class, \"fa-check-square-o\")]";
    /// Loading spinner, under an item
    pub const IS_LOADING: &'static str =
        "./span[contains(@class, \"expand-icon\") and contains(@class, \"fa-spinner\")]";
    /// Indentation markers, under an item
    pub const INDENT: &'static str = "./span[contains(@class, \"indent\")]";

    /// Tree in the element with id `tree_id`
    pub fn new(tree_id: &str) -> Placeholder<Self> {
        let tree_id = tree_id.to_string();
        Placeholder::located(tree_locator(&tree_id), move |node| Self { node, tree_id })
    }

    fn on(node: Node, tree_id: &str) -> Self {
        Self {
            node,
            tree_id: tree_id.to_string(),
        }
    }

    /// Id of the hosting element
    #[must_use]
    pub fn tree_id(&self) -> &str {
        &self.tree_id
    }

    /// Selector of the item with `nodeid`
    #[must_use]
    pub fn item_locator(nodeid: &str) -> String {
        format!("./ul/li[@data-nodeid={}]", quote(nodeid))
    }

    /// Selector of the direct children of `nodeid` at `indent`
    #[must_use]
    pub fn child_items_locator(nodeid: &str, indent: usize) -> String {
        let id = quote(nodeid);
        format!(
            "./ul/li[starts-with(@data-nodeid, {id}) and not(@data-nodeid={id}) and count(./span[contains(@class, \"indent\")])={indent}]"
        )
    }

    /// Selector of the direct children of `nodeid` at `indent` containing `text`
    #[must_use]
    pub fn child_items_with_text_locator(nodeid: &str, text: &str, indent: usize) -> String {
        let id = quote(nodeid);
        format!(
            "./ul/li[starts-with(@data-nodeid, {id}) and not(@data-nodeid={id}) and contains(normalize-space(text()), {}) and count(./span[contains(@class, \"indent\")])={indent}]",
            quote(text)
        )
    }

    fn has(&self, item: &ElementHandle, selector: &str) -> ViewResult<bool> {
        Ok(!self.node.find_all_in(item, selector)?.is_empty())
    }

    /// Data node id of an item
    pub fn nodeid(&self, item: &ElementHandle) -> ViewResult<String> {
        Ok(self
            .node
            .browser()
            .get_attribute(item, "data-nodeid")?
            .unwrap_or_default())
    }

    /// Item with `nodeid`
    pub fn item_by_nodeid(&self, nodeid: &str) -> ViewResult<ElementHandle> {
        match self.node.find(&Self::item_locator(nodeid)) {
            Err(ViewError::LocatorNotFound { .. }) => Err(candidate_not_found(
                nodeid,
                &[],
                format!("Could not find the item with nodeid {nodeid} in Bootstrap tree {}", self.tree_id),
                None,
            )),
            other => other,
        }
    }

    fn indents(&self, item: &ElementHandle) -> ViewResult<usize> {
        Ok(self.node.find_all_in(item, Self::INDENT)?.len())
    }

    /// Whether the item has an expand arrow
    pub fn is_expandable(&self, item: &ElementHandle) -> ViewResult<bool> {
        self.has(item, Self::IS_EXPANDABLE)
    }

    /// Whether the item is expanded
    pub fn is_expanded(&self, item: &ElementHandle) -> ViewResult<bool> {
        self.has(item, Self::IS_EXPANDED)
    }

    /// Whether the item is loading its children
    pub fn is_loading(&self, item: &ElementHandle) -> ViewResult<bool> {
        self.has(item, Self::IS_LOADING)
    }

    /// Whether the item is the selected one
    pub fn is_selected(&self, item: &ElementHandle) -> ViewResult<bool> {
        Ok(self.node.browser().classes(item)?.iter().any(|c| c == "node-selected"))
    }

    fn toggle_node(&self, nodeid: &str, expand: bool) -> ViewResult<bool> {
        let item = self.item_by_nodeid(nodeid)?;
        if !self.is_expandable(&item)? {
            return Ok(false);
        }
        if self.is_expanded(&item)? == expand {
            return Ok(true);
        }
        tracing::debug!(tree = %self.tree_id, nodeid, expand, "toggling node");
        let browser = self.node.browser();
        let arrow = self
            .node
            .find_all_in(&item, Self::IS_EXPANDABLE)?
            .into_iter()
            .next()
            .ok_or_else(|| ViewError::not_found(Self::IS_EXPANDABLE, self.node.path()))?;
        browser.click(&arrow)?;
        let poll = browser.config().page_safe_poll_ms;
        if expand {
            let loaded = WaitOptions::bounded(browser.config().tree_load_timeout_ms, poll)
                .with_message(format!("tree node {nodeid} to load"));
            wait_until(|| Ok(!self.is_loading(&self.item_by_nodeid(nodeid)?)?), &loaded)?;
        }
        let settled = WaitOptions::bounded(browser.config().tree_expand_timeout_ms, poll)
            .with_message(format!("tree node {nodeid} to {}", if expand { "expand" } else { "collapse" }));
        wait_until(|| Ok(self.is_expanded(&self.item_by_nodeid(nodeid)?)? == expand), &settled)?;
        Ok(true)
    }

    /// Expand the item with `nodeid`; `false` when it cannot expand
    pub fn expand_node(&self, nodeid: &str) -> ViewResult<bool> {
        self.toggle_node(nodeid, true)
    }

    /// Collapse the item with `nodeid`; `false` when it cannot expand
    pub fn collapse_node(&self, nodeid: &str) -> ViewResult<bool> {
        self.toggle_node(nodeid, false)
    }

    /// Direct children of an item
    pub fn child_items(&self, item: &ElementHandle) -> ViewResult<Vec<ElementHandle>> {
        let selector = Self::child_items_locator(&self.nodeid(item)?, self.indents(item)? + 1);
        self.node.find_all(&selector)
    }

    fn child_items_with_text(&self, item: &ElementHandle, text: &str) -> ViewResult<Vec<ElementHandle>> {
        let selector =
            Self::child_items_with_text_locator(&self.nodeid(item)?, text, self.indents(item)? + 1);
        self.node.find_all(&selector)
    }

    fn not_found(&self, segment: &str, path: &[&str], tried: usize, cause: String) -> ViewError {
        candidate_not_found(
            segment,
            path,
            format!(
                "Could not find the item {} in Bootstrap tree {}",
                path[..tried].join("/"),
                self.tree_id
            ),
            Some(cause),
        )
    }

    fn read_from(&self, nodeid: &str) -> ViewResult<Value> {
        let item = self.item_by_nodeid(nodeid)?;
        self.expand_node(nodeid)?;
        let mut children = Vec::new();
        for child in self.child_items(&item)? {
            children.push(self.read_from(&self.nodeid(&child)?)?);
        }
        let name = Value::String(self.node.browser().text(&item)?);
        if children.is_empty() {
            Ok(name)
        } else {
            Ok(Value::Array(vec![name, Value::Array(children)]))
        }
    }
}

impl TreeNavigation for BootstrapTreeview {
    fn expand_path(&self, path: &[&str]) -> ViewResult<ElementHandle> {
        let browser = self.node.browser();
        browser.ensure_page_safe()?;
        tracing::info!(tree = %self.tree_id, path = %path.join("/"), "expanding path");
        let (first, rest) = path
            .split_first()
            .ok_or_else(|| ViewError::invalid(self.node.path(), "empty tree path"))?;
        let mut node = self.node.find(Self::ROOT_ITEM)?;
        if browser.text(&node)? != *first {
            return Err(self.not_found(first, path, 1, format!("Root node did not match {first}")));
        }
        for (i, step) in rest.iter().enumerate() {
            let tried = i + 2;
            if !self.expand_node(&self.nodeid(&node)?)? {
                return Err(self.not_found(step, path, tried, format!("Could not expand the {step} node")));
            }
            let mut found = None;
            for child in self.child_items_with_text(&node, step)? {
                if browser.text(&child)? == *step {
                    found = Some(child);
                    break;
                }
            }
            node = found.ok_or_else(|| {
                self.not_found(step, path, tried, format!("Was not found in {}", path[tried - 2]))
            })?;
        }
        Ok(node)
    }

    fn click_path(&self, path: &[&str]) -> ViewResult<ElementHandle> {
        let node = self.expand_path(path)?;
        tracing::info!(tree = %self.tree_id, item = path.last().copied().unwrap_or_default(), "clicking node");
        self.node.browser().click(&node)?;
        Ok(node)
    }

    fn currently_selected(&self) -> ViewResult<Vec<String>> {
        let selected = match self.node.find(Self::SELECTED_ITEM) {
            Ok(selected) => selected,
            Err(ViewError::LocatorNotFound { .. }) => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };
        let nodeid = self.nodeid(&selected)?;
        let parts: Vec<&str> = nodeid.split('.').collect();
        let root_len = self.nodeid(&self.node.find(Self::ROOT_ITEM)?)?.split('.').count();
        let browser = self.node.browser();
        (root_len..=parts.len())
            .map(|end| browser.text(&self.item_by_nodeid(&parts[..end].join("."))?))
            .collect()
    }

    fn read_contents(&self) -> ViewResult<Value> {
        let root = self.node.find(Self::ROOT_ITEM)?;
        self.read_from(&self.nodeid(&root)?)
    }
}

impl Widget for BootstrapTreeview {
    fn node(&self) -> &Node {
        &self.node
    }

    fn read(&self) -> ViewResult<Value> {
        Ok(Value::from(self.currently_selected()?))
    }

    fn fill_value(&self, value: &Value) -> ViewResult<bool> {
        fill_path(self, &self.node.path(), value)
    }
}

/// Bootstrap Treeview whose nodes carry checkboxes
#[derive(Debug)]
pub struct CheckableBootstrapTreeview {
    tree: BootstrapTreeview,
}

impl CheckableBootstrapTreeview {
    /// Checkable tree in the element with id `tree_id`
    pub fn new(tree_id: &str) -> Placeholder<Self> {
        BootstrapTreeview::new(tree_id).map(|tree| Self { tree })
    }

    /// The underlying tree
    #[must_use]
    pub const fn tree(&self) -> &BootstrapTreeview {
        &self.tree
    }
}

impl TreeNavigation for CheckableBootstrapTreeview {
    fn expand_path(&self, path: &[&str]) -> ViewResult<ElementHandle> {
        self.tree.expand_path(path)
    }

    fn click_path(&self, path: &[&str]) -> ViewResult<ElementHandle> {
        self.tree.click_path(path)
    }

    fn currently_selected(&self) -> ViewResult<Vec<String>> {
        self.tree.currently_selected()
    }

    fn read_contents(&self) -> ViewResult<Value> {
        self.tree.read_contents()
    }
}

impl CheckableNavigation for CheckableBootstrapTreeview {
    fn set_node_checked(&self, path: &[&str], check: bool) -> ViewResult<bool> {
        let leaf = self.tree.expand_path(path)?;
        if !self.tree.has(&leaf, BootstrapTreeview::IS_CHECKABLE)? {
            return Err(ViewError::TreeNodeNotCheckable {
                path: path.iter().map(ToString::to_string).collect(),
            });
        }
        if self.tree.has(&leaf, BootstrapTreeview::IS_CHECKED)? == check {
            return Ok(false);
        }
        tracing::info!(tree = %self.tree.tree_id, item = path.last().copied().unwrap_or_default(), check, "toggle tree node");
        let checkbox = self
            .tree
            .node
            .find_all_in(&leaf, BootstrapTreeview::IS_CHECKABLE)?
            .into_iter()
            .next()
            .ok_or_else(|| ViewError::not_found(BootstrapTreeview::IS_CHECKABLE, self.tree.node.path()))?;
        self.tree.node.browser().click(&checkbox)?;
        Ok(true)
    }

    fn node_checked(&self, path: &[&str]) -> ViewResult<bool> {
        let leaf = self.tree.expand_path(path)?;
        Ok(self.tree.has(&leaf, BootstrapTreeview::IS_CHECKABLE)?
            && self.tree.has(&leaf, BootstrapTreeview::IS_CHECKED)?)
    }
}

impl Widget for CheckableBootstrapTreeview {
    fn node(&self) -> &Node {
        &self.tree.node
    }

    fn fill_value(&self, value: &Value) -> ViewResult<bool> {
        fill_checked(self, &self.tree.node.path(), value)
    }
}

// =============================================================================
// VERSION-PICKED TREES
// =============================================================================

/// Which implementation a product version renders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeKind {
    /// Script-backed dynatree
    DynaTree,
    /// DOM-driven Bootstrap Treeview
    BootstrapTreeview,
}

impl TreeKind {
    /// Implementation per product version
    #[must_use]
    pub fn pick() -> VersionPick<Self> {
        VersionPick::lowest(Self::DynaTree).since(TREE_SWITCH_VERSION, Self::BootstrapTreeview)
    }

    fn for_node(node: &Node) -> Self {
        Self::pick()
            .pick(node.browser().product_version())
            .copied()
            .unwrap_or(Self::DynaTree)
    }
}

#[derive(Debug)]
enum Picked {
    Dyna(DynaTree),
    Bootstrap(BootstrapTreeview),
}

/// Tree whose implementation follows the product version
#[derive(Debug)]
pub struct Tree {
    inner: Picked,
}

impl Tree {
    /// Tree in the element with id `tree_id`
    pub fn new(tree_id: &str) -> Placeholder<Self> {
        let tree_id = tree_id.to_string();
        Placeholder::located(tree_locator(&tree_id), move |node| {
            let inner = match TreeKind::for_node(&node) {
                TreeKind::DynaTree => Picked::Dyna(DynaTree::on(node, &tree_id)),
                TreeKind::BootstrapTreeview => Picked::Bootstrap(BootstrapTreeview::on(node, &tree_id)),
            };
            Self { inner }
        })
    }

    /// Implementation in use
    #[must_use]
    pub const fn kind(&self) -> TreeKind {
        match self.inner {
            Picked::Dyna(_) => TreeKind::DynaTree,
            Picked::Bootstrap(_) => TreeKind::BootstrapTreeview,
        }
    }

    fn navigation(&self) -> &dyn TreeNavigation {
        match &self.inner {
            Picked::Dyna(tree) => tree,
            Picked::Bootstrap(tree) => tree,
        }
    }
}

impl TreeNavigation for Tree {
    fn expand_path(&self, path: &[&str]) -> ViewResult<ElementHandle> {
        self.navigation().expand_path(path)
    }

    fn click_path(&self, path: &[&str]) -> ViewResult<ElementHandle> {
        self.navigation().click_path(path)
    }

    fn currently_selected(&self) -> ViewResult<Vec<String>> {
        self.navigation().currently_selected()
    }

    fn read_contents(&self) -> ViewResult<Value> {
        self.navigation().read_contents()
    }
}

impl Widget for Tree {
    fn node(&self) -> &Node {
        match &self.inner {
            Picked::Dyna(tree) => &tree.node,
            Picked::Bootstrap(tree) => &tree.node,
        }
    }

    fn read(&self) -> ViewResult<Value> {
        Ok(Value::from(self.currently_selected()?))
    }

    fn fill_value(&self, value: &Value) -> ViewResult<bool> {
        fill_path(self, &self.node().path(), value)
    }
}

#[derive(Debug)]
enum PickedCheckable {
    Dyna(CheckableDynaTree),
    Bootstrap(CheckableBootstrapTreeview),
}

/// Checkable tree whose implementation follows the product version
#[derive(Debug)]
pub struct CheckableTree {
    inner: PickedCheckable,
}

impl CheckableTree {
    /// Checkable tree in the element with id `tree_id`
    pub fn new(tree_id: &str) -> Placeholder<Self> {
        let tree_id = tree_id.to_string();
        Placeholder::located(tree_locator(&tree_id), move |node| {
            let inner = match TreeKind::for_node(&node) {
                TreeKind::DynaTree => PickedCheckable::Dyna(CheckableDynaTree {
                    tree: DynaTree::on(node, &tree_id),
                }),
                TreeKind::BootstrapTreeview => PickedCheckable::Bootstrap(CheckableBootstrapTreeview {
                    tree: BootstrapTreeview::on(node, &tree_id),
                }),
            };
            Self { inner }
        })
    }

    /// Implementation in use
    #[must_use]
    pub const fn kind(&self) -> TreeKind {
        match self.inner {
            PickedCheckable::Dyna(_) => TreeKind::DynaTree,
            PickedCheckable::Bootstrap(_) => TreeKind::BootstrapTreeview,
        }
    }

    fn navigation(&self) -> &dyn CheckableNavigation {
        match &self.inner {
            PickedCheckable::Dyna(tree) => tree,
            PickedCheckable::Bootstrap(tree) => tree,
        }
    }
}

impl TreeNavigation for CheckableTree {
    fn expand_path(&self, path: &[&str]) -> ViewResult<ElementHandle> {
        self.navigation().expand_path(path)
    }

    fn click_path(&self, path: &[&str]) -> ViewResult<ElementHandle> {
        self.navigation().click_path(path)
    }

    fn currently_selected(&self) -> ViewResult<Vec<String>> {
        self.navigation().currently_selected()
    }

    fn read_contents(&self) -> ViewResult<Value> {
        self.navigation().read_contents()
    }
}

impl CheckableNavigation for CheckableTree {
    fn set_node_checked(&self, path: &[&str], check: bool) -> ViewResult<bool> {
        self.navigation().set_node_checked(path, check)
    }

    fn node_checked(&self, path: &[&str]) -> ViewResult<bool> {
        self.navigation().node_checked(path)
    }
}

impl Widget for CheckableTree {
    fn node(&self) -> &Node {
        match &self.inner {
            PickedCheckable::Dyna(tree) => &tree.tree.node,
            PickedCheckable::Bootstrap(tree) => &tree.tree.node,
        }
    }

    fn fill_value(&self, value: &Value) -> ViewResult<bool> {
        fill_checked(self, &self.node().path(), value)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::mock::trees::{DynaTreePage, TreeviewPage};
    use crate::widget::Bind;
    use crate::widgets::testing::{setup, setup_at};
    use serde_json::json;

    const PXE: [&str; 4] = ["All PXE Servers", "my-srv", "PXE Images", "img-1"];

    mod dynatree_tests {
        use super::*;

        fn pxe_page(page: &DynaTreePage) {
            page.node(None, "All PXE Servers", "root");
            page.lazy("root", &[("my-srv", "srv")]);
            page.lazy("srv", &[("PXE Images", "images"), ("Windows Images", "win")]);
            page.lazy("images", &[("img-1", "img1")]);
        }

        #[test]
        fn test_path_xpath() {
            assert_eq!(
                DynaTree::path_xpath(&["A", "b's"]),
                "./ul/li[./span/a[normalize-space(.)='A']]/ul/li[./span/a[normalize-space(.)=\"b's\"]]"
            );
        }

        #[test]
        fn test_click_path_expands_and_selects_leaf() {
            let (mock, _browser, root) = setup_at("5.6.4");
            let page = DynaTreePage::new(&mock, "pxe_tree");
            pxe_page(&page);
            let tree = DynaTree::new("pxe_tree").bind(&root, "tree");
            tree.click_path(&PXE).unwrap();
            assert_eq!(mock.call_count("click:"), 4);
            assert_eq!(tree.currently_selected().unwrap(), PXE);
            assert_eq!(tree.read().unwrap(), json!(PXE));
            assert!(!tree.fill(&json!(PXE)).unwrap());
        }

        #[test]
        fn test_lazy_children_load_on_expand() {
            let (mock, _browser, root) = setup_at("5.6.4");
            let page = DynaTreePage::new(&mock, "pxe_tree");
            pxe_page(&page);
            let tree = DynaTree::new("pxe_tree").bind(&root, "tree");
            tree.expand_path(&PXE[..2]).unwrap();
            assert_eq!(tree.child_items("srv").unwrap(), ["PXE Images", "Windows Images"]);
        }

        #[test]
        fn test_missing_segment() {
            let (mock, _browser, root) = setup_at("5.6.4");
            let page = DynaTreePage::new(&mock, "pxe_tree");
            pxe_page(&page);
            let tree = DynaTree::new("pxe_tree").bind(&root, "tree");
            let path = ["All PXE Servers", "my-srv", "PXE Images", "img-2"];
            match tree.click_path(&path).unwrap_err() {
                ViewError::CandidateNotFound { segment, path: tried, message, cause } => {
                    assert_eq!(segment, "img-2");
                    assert_eq!(tried, path);
                    assert_eq!(message, "img-2: could not be found in the tree.");
                    assert_eq!(cause, None);
                }
                other => panic!("unexpected {other:?}"),
            }
        }

        #[test]
        fn test_read_contents_polls_until_loaded() {
            let (mock, _browser, root) = setup_at("5.6.4");
            DynaTreePage::new(&mock, "pxe_tree");
            let polls = std::rc::Rc::new(std::cell::Cell::new(0));
            let counter = std::rc::Rc::clone(&polls);
            mock.on_script("read_tree", move |_, args| {
                assert_eq!(args[0], json!("#pxe_tree"));
                counter.set(counter.get() + 1);
                if counter.get() < 3 {
                    Value::Bool(false)
                } else {
                    json!([["All PXE Servers", ["my-srv"]]])
                }
            });
            let tree = DynaTree::new("pxe_tree").bind(&root, "tree");
            assert_eq!(tree.read_contents().unwrap(), json!([["All PXE Servers", ["my-srv"]]]));
            assert_eq!(polls.get(), 3);
        }

        #[test]
        fn test_read_contents_times_out() {
            let (mock, _browser, root) = setup_at("5.6.4");
            DynaTreePage::new(&mock, "pxe_tree");
            mock.on_script("read_tree", |_, _| Value::Bool(false));
            let tree = DynaTree::new("pxe_tree").bind(&root, "tree");
            assert!(matches!(tree.read_contents(), Err(ViewError::TimedOut { .. })));
        }

        #[test]
        fn test_checkable() {
            let (mock, _browser, root) = setup_at("5.6.4");
            let page = DynaTreePage::new(&mock, "roles");
            page.node(None, "Everything", "all");
            page.node(Some("all"), "Compute", "compute");
            page.node(Some("all"), "Settings", "settings");
            page.checkbox("compute");
            let tree = CheckableDynaTree::new("roles").bind(&root, "features");
            let compute = ["Everything", "Compute"];
            assert!(!tree.node_checked(&compute).unwrap());
            assert!(tree.fill(&json!(compute)).unwrap());
            assert!(tree.node_checked(&compute).unwrap());
            assert!(!tree.fill(&json!(compute)).unwrap());
            assert!(tree.uncheck_node(&compute).unwrap());
            assert!(!tree.node_checked(&compute).unwrap());
            assert!(matches!(
                tree.check_node(&["Everything", "Settings"]),
                Err(ViewError::TreeNodeNotCheckable { .. })
            ));
            assert!(tree.read().unwrap_err().is_skip());
        }
    }

    mod treeview_tests {
        use super::*;

        fn pxe_page(page: &TreeviewPage) {
            page.node("0", "All PXE Servers");
            page.node("0.0", "my-srv");
            page.node("0.0.0", "PXE Images");
            page.node("0.0.1", "Windows Images");
            page.node("0.0.0.0", "img-1");
            page.node("0.1", "other-srv");
        }

        #[test]
        fn test_click_path_and_selection() {
            let (mock, _browser, root) = setup();
            pxe_page(&TreeviewPage::new(&mock, "pxe_tree"));
            let tree = BootstrapTreeview::new("pxe_tree").bind(&root, "tree");
            assert!(tree.currently_selected().unwrap().is_empty());
            assert!(tree.fill(&json!(PXE)).unwrap());
            assert_eq!(tree.read().unwrap(), json!(PXE));
            assert!(!tree.fill(&json!(PXE)).unwrap());
            let leaf = tree.item_by_nodeid("0.0.0.0").unwrap();
            assert!(tree.is_selected(&leaf).unwrap());
        }

        #[test]
        fn test_missing_segment_names_cause() {
            let (mock, _browser, root) = setup();
            pxe_page(&TreeviewPage::new(&mock, "pxe_tree"));
            let tree = BootstrapTreeview::new("pxe_tree").bind(&root, "tree");
            let err = tree.click_path(&["All PXE Servers", "my-srv", "Linux Images"]).unwrap_err();
            let ViewError::CandidateNotFound { segment, cause, message, .. } = err else {
                panic!("unexpected {err:?}");
            };
            assert_eq!(segment, "Linux Images");
            assert_eq!(cause.as_deref(), Some("Was not found in my-srv"));
            assert!(message.contains("All PXE Servers/my-srv/Linux Images"));

            let err = tree.click_path(&["Clouds"]).unwrap_err();
            assert!(matches!(err, ViewError::CandidateNotFound { ref segment, .. } if segment == "Clouds"));

            let err = tree.click_path(&["All PXE Servers", "other-srv", "Images"]).unwrap_err();
            let ViewError::CandidateNotFound { cause, .. } = err else {
                panic!("unexpected {err:?}");
            };
            assert_eq!(cause.as_deref(), Some("Could not expand the Images node"));
        }

        #[test]
        fn test_read_contents() {
            let (mock, _browser, root) = setup();
            pxe_page(&TreeviewPage::new(&mock, "pxe_tree"));
            let tree = BootstrapTreeview::new("pxe_tree").bind(&root, "tree");
            assert_eq!(
                tree.read_contents().unwrap(),
                json!(["All PXE Servers", [
                    ["my-srv", [["PXE Images", ["img-1"]], "Windows Images"]],
                    "other-srv"
                ]])
            );
        }

        #[test]
        fn test_collapse() {
            let (mock, _browser, root) = setup();
            pxe_page(&TreeviewPage::new(&mock, "pxe_tree"));
            let tree = BootstrapTreeview::new("pxe_tree").bind(&root, "tree");
            assert!(tree.expand_node("0").unwrap());
            assert!(tree.is_expanded(&tree.item_by_nodeid("0").unwrap()).unwrap());
            assert!(tree.collapse_node("0").unwrap());
            assert!(!tree.is_expanded(&tree.item_by_nodeid("0").unwrap()).unwrap());
            assert!(!tree.expand_node("0.1").unwrap());
        }

        #[test]
        fn test_checkable() {
            let (mock, _browser, root) = setup();
            let page = TreeviewPage::new(&mock, "roles");
            page.node("0", "Everything");
            page.node("0.0", "Compute");
            page.node("0.1", "Settings");
            page.checkbox("0.0");
            let tree = CheckableBootstrapTreeview::new("roles").bind(&root, "features");
            assert!(tree.check_node(&["Everything", "Compute"]).unwrap());
            assert!(tree.node_checked(&["Everything", "Compute"]).unwrap());
            assert!(!tree.check_node(&["Everything", "Compute"]).unwrap());
            assert!(!tree.node_checked(&["Everything", "Settings"]).unwrap());
            assert!(matches!(
                tree.uncheck_node(&["Everything", "Settings"]),
                Err(ViewError::TreeNodeNotCheckable { .. })
            ));
        }
    }

    mod picked_tests {
        use super::*;

        #[test]
        fn test_version_switch() {
            for (version, kind) in [
                ("5.6.4", TreeKind::DynaTree),
                ("5.7.0.1", TreeKind::BootstrapTreeview),
                ("5.10.1", TreeKind::BootstrapTreeview),
            ] {
                let (_mock, _browser, root) = setup_at(version);
                assert_eq!(Tree::new("t").bind(&root, "tree").kind(), kind);
                assert_eq!(CheckableTree::new("t").bind(&root, "tree").kind(), kind);
            }
        }

        #[test]
        fn test_tree_delegates() {
            let (mock, _browser, root) = setup();
            let page = TreeviewPage::new(&mock, "pxe_tree");
            page.node("0", "All PXE Servers");
            page.node("0.0", "my-srv");
            let tree = Tree::new("pxe_tree").bind(&root, "tree");
            tree.click_path(&["All PXE Servers", "my-srv"]).unwrap();
            assert_eq!(tree.read().unwrap(), json!(["All PXE Servers", "my-srv"]));
            assert_eq!(tree.path(), "tree");
        }
    }
}
