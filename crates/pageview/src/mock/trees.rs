//! Tree markup for [`MockDriver`] pages.
//!
//! [`DynaTreePage`] and [`TreeviewPage`] register the elements the tree
//! widgets look up, wire clicks to expand, select and check nodes, and can
//! defer children until their parent is first expanded.

use super::{MockDriver, MockElement};
use crate::driver::ElementHandle;
use crate::widgets::{BootstrapTreeview, DynaTree};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug, Clone)]
struct DynaEntry {
    span: ElementHandle,
    anchor: ElementHandle,
    path: Vec<String>,
    parent: Option<String>,
}

#[derive(Debug, Default)]
struct DynaState {
    nodes: HashMap<String, DynaEntry>,
}

/// DynaTree markup on a mock page
#[derive(Debug, Clone)]
pub struct DynaTreePage {
    mock: Rc<MockDriver>,
    tree: ElementHandle,
    state: Rc<RefCell<DynaState>>,
}

impl DynaTreePage {
    /// Tree container with id `tree_id`
    pub fn new(mock: &Rc<MockDriver>, tree_id: &str) -> Self {
        let tree = mock.add(None, &format!("#{tree_id}"), MockElement::new("div").attr("id", tree_id));
        Self {
            mock: Rc::clone(mock),
            tree,
            state: Rc::default(),
        }
    }

    /// The container element
    #[must_use]
    pub const fn tree(&self) -> &ElementHandle {
        &self.tree
    }

    /// Register a node under `parent` (a top level node when `None`)
    pub fn node(&self, parent: Option<&str>, name: &str, id: &str) -> ElementHandle {
        register_dyna(&self.mock, &self.tree, &self.state, parent, name, id)
    }

    /// Give `parent` an expander that loads `children` (name, id) on first expand.
    ///
    /// `parent` may itself be one of the lazily loaded children.
    pub fn lazy(&self, parent: &str, children: &[(&str, &str)]) {
        let expander = self.mock.add(
            Some(&self.tree),
            &DynaTree::expander_locator(parent),
            MockElement::new("span").class("dynatree-expander"),
        );
        let children: Vec<(String, String)> = children
            .iter()
            .map(|(name, id)| ((*name).to_string(), (*id).to_string()))
            .collect();
        let tree = self.tree.clone();
        let state = Rc::clone(&self.state);
        let parent = parent.to_string();
        let loaded = Cell::new(false);
        self.mock.on_click(&expander, move |m| {
            let span = state.borrow().nodes.get(&parent).map(|e| e.span.clone());
            if let Some(span) = span {
                m.add_class(&span, "dynatree-expanded");
            }
            if !loaded.replace(true) {
                for (name, id) in &children {
                    register_dyna(m, &tree, &state, Some(&parent), name, id);
                }
            }
        });
    }

    /// Give the node `id` a checkbox
    pub fn checkbox(&self, id: &str) {
        let Some(entry) = self.state.borrow().nodes.get(id).cloned() else {
            return;
        };
        let checkbox = self.mock.add(
            Some(&entry.span),
            DynaTree::CHECKBOX,
            MockElement::new("span").class("dynatree-checkbox"),
        );
        let checked = Cell::new(false);
        self.mock.on_click(&checkbox, move |m| {
            if checked.replace(!checked.get()) {
                m.detach_all(Some(&entry.span), DynaTree::CHECKED);
            } else {
                m.attach(Some(&entry.span), DynaTree::CHECKED, &entry.span);
            }
        });
    }
}

fn register_dyna(
    mock: &MockDriver,
    tree: &ElementHandle,
    state: &Rc<RefCell<DynaState>>,
    parent: Option<&str>,
    name: &str,
    id: &str,
) -> ElementHandle {
    let mut path = parent
        .and_then(|p| state.borrow().nodes.get(p).map(|e| e.path.clone()))
        .unwrap_or_default();
    path.push(name.to_string());
    let segments: Vec<&str> = path.iter().map(String::as_str).collect();

    let li = mock.add(Some(tree), &DynaTree::path_xpath(&segments), MockElement::new("li").attr("id", id));
    match parent {
        Some(parent) => mock.attach(Some(tree), &DynaTree::children_locator(parent), &li),
        None => mock.attach(Some(tree), DynaTree::ROOT_ITEM, &li),
    }
    let span = mock.add(Some(tree), &DynaTree::item_span_locator(id), MockElement::new("span").class("dynatree-node"));
    mock.attach(Some(&li), "./span", &span);
    let anchor = mock.add(Some(&span), "./a", MockElement::new("a").text(name));
    mock.attach(Some(&li), "./span/a", &anchor);

    let tree_el = tree.clone();
    let selecting = Rc::clone(state);
    let selected_id = id.to_string();
    mock.on_click(&anchor, move |m| {
        let state = selecting.borrow();
        let mut chain = Vec::new();
        let mut cursor = Some(selected_id.clone());
        while let Some(current) = cursor {
            let Some(entry) = state.nodes.get(&current) else { break };
            chain.push(entry.anchor.clone());
            cursor = entry.parent.clone();
        }
        m.detach_all(Some(&tree_el), DynaTree::SELECTED);
        for anchor in chain.iter().rev() {
            m.attach(Some(&tree_el), DynaTree::SELECTED, anchor);
        }
    });

    state.borrow_mut().nodes.insert(
        id.to_string(),
        DynaEntry {
            span,
            anchor,
            path,
            parent: parent.map(ToString::to_string),
        },
    );
    li
}

#[derive(Debug, Default)]
struct TreeviewState {
    items: HashMap<String, ElementHandle>,
}

/// Bootstrap Treeview markup on a mock page
#[derive(Debug, Clone)]
pub struct TreeviewPage {
    mock: Rc<MockDriver>,
    tree: ElementHandle,
    state: Rc<RefCell<TreeviewState>>,
}

impl TreeviewPage {
    /// Tree container with id `tree_id`
    pub fn new(mock: &Rc<MockDriver>, tree_id: &str) -> Self {
        let tree = mock.add(None, &format!("#{tree_id}"), MockElement::new("div").attr("id", tree_id));
        Self {
            mock: Rc::clone(mock),
            tree,
            state: Rc::default(),
        }
    }

    /// The container element
    #[must_use]
    pub const fn tree(&self) -> &ElementHandle {
        &self.tree
    }

    /// Register the item `nodeid` (dotted, e.g. `0.1.3`); parents first
    pub fn node(&self, nodeid: &str, text: &str) -> ElementHandle {
        let mock = &self.mock;
        let tree = &self.tree;
        let li = mock.add(
            Some(tree),
            &BootstrapTreeview::item_locator(nodeid),
            MockElement::new("li").attr("data-nodeid", nodeid).class("list-group-item").text(text),
        );
        let depth = nodeid.matches('.').count();
        for _ in 0..depth {
            mock.add(Some(&li), BootstrapTreeview::INDENT, MockElement::new("span").class("indent"));
        }
        match nodeid.rsplit_once('.') {
            None => mock.attach(Some(tree), BootstrapTreeview::ROOT_ITEM, &li),
            Some((parent, _)) => {
                mock.attach(Some(tree), &BootstrapTreeview::child_items_locator(parent, depth), &li);
                mock.attach(
                    Some(tree),
                    &BootstrapTreeview::child_items_with_text_locator(parent, text, depth),
                    &li,
                );
                self.ensure_arrow(parent);
            }
        }

        let tree_el = tree.clone();
        let state = Rc::clone(&self.state);
        let selected = li.clone();
        mock.on_click(&li, move |m| {
            for item in state.borrow().items.values() {
                m.remove_class(item, "node-selected");
            }
            m.add_class(&selected, "node-selected");
            m.detach_all(Some(&tree_el), BootstrapTreeview::SELECTED_ITEM);
            m.attach(Some(&tree_el), BootstrapTreeview::SELECTED_ITEM, &selected);
        });
        self.state.borrow_mut().items.insert(nodeid.to_string(), li.clone());
        li
    }

    fn ensure_arrow(&self, nodeid: &str) {
        let Some(li) = self.state.borrow().items.get(nodeid).cloned() else {
            return;
        };
        let existing = self
            .mock
            .find_registered(Some(&li), BootstrapTreeview::IS_EXPANDABLE);
        if !existing.is_empty() {
            return;
        }
        let arrow = self.mock.add(
            Some(&li),
            BootstrapTreeview::IS_EXPANDABLE,
            MockElement::new("span").class("expand-icon"),
        );
        let parent = li.clone();
        let icon = arrow.clone();
        self.mock.on_click(&arrow, move |m| {
            if m.find_registered(Some(&parent), BootstrapTreeview::IS_EXPANDED).is_empty() {
                m.add_class(&icon, "fa-angle-down");
                m.attach(Some(&parent), BootstrapTreeview::IS_EXPANDED, &icon);
            } else {
                m.remove_class(&icon, "fa-angle-down");
                m.detach_all(Some(&parent), BootstrapTreeview::IS_EXPANDED);
            }
        });
    }

    /// Give the item `nodeid` a checkbox
    pub fn checkbox(&self, nodeid: &str) {
        let Some(li) = self.state.borrow().items.get(nodeid).cloned() else {
            return;
        };
        let checkbox = self.mock.add(
            Some(&li),
            BootstrapTreeview::IS_CHECKABLE,
            MockElement::new("span").class("check-icon"),
        );
        let icon = checkbox.clone();
        self.mock.on_click(&checkbox, move |m| {
            if m.find_registered(Some(&li), BootstrapTreeview::IS_CHECKED).is_empty() {
                m.attach(Some(&li), BootstrapTreeview::IS_CHECKED, &icon);
            } else {
                m.detach_all(Some(&li), BootstrapTreeview::IS_CHECKED);
            }
        });
    }
}
