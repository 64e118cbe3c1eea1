//! Common widgets.
//!
//! Each widget is declared through a constructor returning a
//! [`Placeholder`](crate::Placeholder) (or another [`Bind`](crate::Bind)
//! declaration) and bound by its parent view. Selectors follow the
//! PatternFly/Bootstrap markup the widgets target.

mod bootstrap_select;
mod breadcrumb;
mod button;
mod checkbox;
mod dropdown;
mod flash;
mod input;
mod paginator;
mod select;
mod switch;
mod tab;
mod table;
mod text;
mod tree;

pub use bootstrap_select::BootstrapSelect;
pub use breadcrumb::BreadCrumb;
pub use button::Button;
pub use checkbox::Checkbox;
pub use dropdown::Dropdown;
pub use flash::{FlashKind, FlashMessage, FlashMessages};
pub use input::{Input, TextInput};
pub use paginator::{PageInfo, PaginationPane, Paginator};
pub use select::Select;
pub use switch::BootstrapSwitch;
pub use tab::Tab;
pub use table::{ColumnFilter, ColumnRef, SortOrder, Table, TableColumn, TableDecl, TableRow};
pub use text::Text;
pub use tree::{
    BootstrapTreeview, CheckableBootstrapTreeview, CheckableDynaTree, CheckableTree, DynaTree,
    CheckableNavigation, Tree, TreeKind, TreeNavigation, TREE_SWITCH_VERSION,
};

use crate::result::{ViewError, ViewResult};
use serde_json::Value;

/// Text of a fill value that must be a scalar
pub(crate) fn scalar_text(widget: &str, value: &Value) -> ViewResult<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(ViewError::invalid(widget, format!("expected a scalar, got {other}"))),
    }
}

/// Strings of a fill value that may be one string or a list of them
pub(crate) fn text_list(widget: &str, value: &Value) -> ViewResult<Vec<String>> {
    match value {
        Value::Array(items) => items.iter().map(|v| scalar_text(widget, v)).collect(),
        other => Ok(vec![scalar_text(widget, other)?]),
    }
}
