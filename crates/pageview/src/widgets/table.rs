//! Header-addressed HTML tables.
//!
//! Rows and cells are located positionally (`./tbody/tr[./td][i]`,
//! `./td[j]`), and columns are addressed by header text or index. A column can
//! carry a widget built inside each of its cells; reading and filling the
//! column then goes through that widget instead of the cell text.

use crate::locator::Locator;
use crate::result::{ViewError, ViewResult};
use crate::widget::{Bind, Node, Widget};
use serde_json::{Map, Value};
use std::fmt;
use std::rc::Rc;

/// Rows that have data cells
pub const ROWS: &str = "./tbody/tr[./td]";
/// Header cells
pub const HEADERS: &str = "./thead/tr/th|./tr/th";
/// Checkbox inside a cell
pub const CELL_CHECKBOX: &str = "./input[@type=\"checkbox\"]";

/// Column and expected cell text
pub type ColumnFilter<'a> = (ColumnRef, &'a str);

/// Builds the widget living inside a cell of a column
pub type ColumnFactory = Rc<dyn Fn(&Node) -> Box<dyn Widget>>;

/// A column by header text or zero-based index
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnRef {
    /// Header text
    Name(String),
    /// Position
    Index(usize),
}

impl From<&str> for ColumnRef {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<usize> for ColumnRef {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => write!(f, "{name}"),
            Self::Index(index) => write!(f, "#{index}"),
        }
    }
}

/// Sort direction reported by the header classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// `sorting_asc`
    Ascending,
    /// `sorting_desc`
    Descending,
}

// =============================================================================
// DECLARATION
// =============================================================================

/// Declaration of a [`Table`]
pub struct TableDecl {
    locator: Locator,
    columns: Vec<(ColumnRef, ColumnFactory)>,
}

impl fmt::Debug for TableDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableDecl")
            .field("locator", &self.locator)
            .field("columns", &self.columns.iter().map(|(c, _)| c).collect::<Vec<_>>())
            .finish()
    }
}

impl TableDecl {
    /// Put a widget in every cell of `column`
    #[must_use]
    pub fn column_widget<D>(mut self, column: impl Into<ColumnRef>, declare: impl Fn() -> D + 'static) -> Self
    where
        D: Bind,
        D::Output: Widget + 'static,
    {
        let factory: ColumnFactory = Rc::new(move |cell: &Node| -> Box<dyn Widget> {
            Box::new(declare().bind(cell, "widget"))
        });
        self.columns.push((column.into(), factory));
        self
    }
}

impl Bind for TableDecl {
    type Output = Table;

    fn bind(self, parent: &Node, name: &str) -> Table {
        Table {
            node: parent.child(name, Some(self.locator)),
            columns: Rc::new(self.columns),
        }
    }
}

// =============================================================================
// TABLE
// =============================================================================

/// HTML table with a header row
pub struct Table {
    node: Node,
    columns: Rc<Vec<(ColumnRef, ColumnFactory)>>,
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("path", &self.node.path())
            .field("column_widgets", &self.columns.len())
            .finish()
    }
}

impl Table {
    /// Declare a table
    pub fn new(locator: impl Into<Locator>) -> TableDecl {
        TableDecl {
            locator: locator.into(),
            columns: Vec::new(),
        }
    }

    /// Header texts in order
    pub fn headers(&self) -> ViewResult<Vec<String>> {
        let browser = self.node.browser();
        self.node.find_all(HEADERS)?.iter().map(|el| browser.text(el)).collect()
    }

    fn column_index(&self, headers: &[String], column: &ColumnRef) -> ViewResult<usize> {
        match column {
            ColumnRef::Index(index) if *index < headers.len() || headers.is_empty() => Ok(*index),
            ColumnRef::Name(name) => headers.iter().position(|h| h == name).ok_or_else(|| {
                ViewError::invalid(self.node.path(), format!("no column named {name:?}"))
            }),
            ColumnRef::Index(index) => Err(ViewError::invalid(
                self.node.path(),
                format!("column {index} out of range ({} columns)", headers.len()),
            )),
        }
    }

    /// Number of data rows
    pub fn row_count(&self) -> ViewResult<usize> {
        Ok(self.node.find_all(ROWS)?.len())
    }

    fn make_row(&self, index: usize, headers: Rc<Vec<String>>) -> TableRow {
        let node = self.node.child(
            &format!("row[{index}]"),
            Some(Locator::from(format!("{ROWS}[{}]", index + 1))),
        );
        TableRow {
            node,
            index,
            headers,
            columns: Rc::clone(&self.columns),
        }
    }

    /// Every data row
    pub fn rows(&self) -> ViewResult<Vec<TableRow>> {
        let headers = Rc::new(self.headers()?);
        Ok((0..self.row_count()?)
            .map(|i| self.make_row(i, Rc::clone(&headers)))
            .collect())
    }

    /// Row at a zero-based position
    pub fn row_at(&self, index: usize) -> ViewResult<TableRow> {
        let count = self.row_count()?;
        if index >= count {
            return Err(ViewError::invalid(
                self.node.path(),
                format!("row {index} out of range ({count} rows)"),
            ));
        }
        Ok(self.make_row(index, Rc::new(self.headers()?)))
    }

    /// Rows whose cell texts equal every filter
    pub fn rows_matching(&self, filters: &[ColumnFilter<'_>]) -> ViewResult<Vec<TableRow>> {
        let headers = self.headers()?;
        let wanted = filters
            .iter()
            .map(|(column, text)| Ok((self.column_index(&headers, column)?, *text)))
            .collect::<ViewResult<Vec<_>>>()?;
        let mut matching = Vec::new();
        for row in self.rows()? {
            let mut all = true;
            for (index, text) in &wanted {
                if row.cell_text(*index)? != *text {
                    all = false;
                    break;
                }
            }
            if all {
                matching.push(row);
            }
        }
        Ok(matching)
    }

    /// First row matching every filter
    pub fn row(&self, filters: &[ColumnFilter<'_>]) -> ViewResult<TableRow> {
        self.rows_matching(filters)?.into_iter().next().ok_or_else(|| {
            let described: Vec<String> = filters.iter().map(|(c, t)| format!("{c}={t}")).collect();
            ViewError::not_found(&format!("{ROWS}[{}]", described.join(", ")), self.node.path())
        })
    }

    /// Check the checkbox of every row
    pub fn check_all(&self) -> ViewResult<bool> {
        let mut changed = false;
        for row in self.rows()? {
            changed |= row.check()?;
        }
        Ok(changed)
    }

    /// Uncheck the checkbox of every row
    pub fn uncheck_all(&self) -> ViewResult<bool> {
        let mut changed = false;
        for row in self.rows()? {
            changed |= row.uncheck()?;
        }
        Ok(changed)
    }

    /// Column the table is sorted by and the direction
    pub fn sorted_by(&self) -> ViewResult<Option<(String, SortOrder)>> {
        let browser = self.node.browser();
        for th in self.node.find_all(HEADERS)? {
            let classes = browser.classes(&th)?;
            let order = if classes.iter().any(|c| c == "sorting_asc") {
                SortOrder::Ascending
            } else if classes.iter().any(|c| c == "sorting_desc") {
                SortOrder::Descending
            } else {
                continue;
            };
            return Ok(Some((browser.text(&th)?, order)));
        }
        Ok(None)
    }

    /// Direction of the current sort
    pub fn sort_order(&self) -> ViewResult<Option<SortOrder>> {
        Ok(self.sorted_by()?.map(|(_, order)| order))
    }

    /// Click the header of `column`
    pub fn click_sort(&self, column: impl Into<ColumnRef>) -> ViewResult<()> {
        let column = column.into();
        let headers = self.headers()?;
        let index = self.column_index(&headers, &column)?;
        let th = self
            .node
            .find_all(HEADERS)?
            .into_iter()
            .nth(index)
            .ok_or_else(|| ViewError::not_found(HEADERS, self.node.path()))?;
        tracing::info!(table = %self.node.path(), column = %column, "sort");
        self.node.browser().click(&th)
    }

    /// Click the header until the table is sorted by `column` in `order`
    pub fn sort_by(&self, column: impl Into<ColumnRef>, order: SortOrder) -> ViewResult<()> {
        let column = column.into();
        let headers = self.headers()?;
        let name = headers
            .get(self.column_index(&headers, &column)?)
            .cloned()
            .unwrap_or_default();
        for _ in 0..2 {
            if self.sorted_by()? == Some((name.clone(), order)) {
                return Ok(());
            }
            self.click_sort(column.clone())?;
        }
        if self.sorted_by()? == Some((name.clone(), order)) {
            Ok(())
        } else {
            Err(ViewError::invalid(
                self.node.path(),
                format!("could not sort by {name:?} {order:?}"),
            ))
        }
    }
}

impl Widget for Table {
    fn node(&self) -> &Node {
        &self.node
    }

    fn read(&self) -> ViewResult<Value> {
        Ok(Value::Array(
            self.rows()?.iter().map(Widget::read).collect::<ViewResult<_>>()?,
        ))
    }

    fn fill_value(&self, value: &Value) -> ViewResult<bool> {
        let Value::Array(values) = value else {
            return Err(ViewError::invalid(self.node.path(), "expected a list of rows"));
        };
        let rows = self.rows()?;
        if values.len() > rows.len() {
            return Err(ViewError::invalid(
                self.node.path(),
                format!("{} rows given, table has {}", values.len(), rows.len()),
            ));
        }
        let mut changed = false;
        for (row, value) in rows.iter().zip(values) {
            if !value.is_null() {
                changed |= row.fill(value)?;
            }
        }
        Ok(changed)
    }
}

// =============================================================================
// ROW
// =============================================================================

/// A data row
pub struct TableRow {
    node: Node,
    index: usize,
    headers: Rc<Vec<String>>,
    columns: Rc<Vec<(ColumnRef, ColumnFactory)>>,
}

impl fmt::Debug for TableRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableRow")
            .field("index", &self.index)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

impl TableRow {
    /// Zero-based position
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    fn resolve(&self, column: &ColumnRef) -> ViewResult<usize> {
        match column {
            ColumnRef::Index(index) => Ok(*index),
            ColumnRef::Name(name) => self.headers.iter().position(|h| h == name).ok_or_else(|| {
                ViewError::invalid(self.node.path(), format!("no column named {name:?}"))
            }),
        }
    }

    fn column_name(&self, index: usize) -> String {
        match self.headers.get(index) {
            Some(header) if !header.is_empty() => header.clone(),
            _ => index.to_string(),
        }
    }

    fn factory(&self, index: usize) -> Option<ColumnFactory> {
        self.columns
            .iter()
            .find(|(column, _)| match column {
                ColumnRef::Index(i) => *i == index,
                ColumnRef::Name(name) => self.headers.get(index) == Some(name),
            })
            .map(|(_, f)| Rc::clone(f))
    }

    fn column_at(&self, index: usize) -> TableColumn {
        let node = self.node.child(
            &self.column_name(index),
            Some(Locator::from(format!("./td[{}]", index + 1))),
        );
        let widget = self.factory(index).map(|make| make(&node));
        TableColumn { node, index, widget }
    }

    /// Cell of `column`
    pub fn column(&self, column: impl Into<ColumnRef>) -> ViewResult<TableColumn> {
        Ok(self.column_at(self.resolve(&column.into())?))
    }

    fn cell_text(&self, index: usize) -> ViewResult<String> {
        self.column_at(index).text()
    }

    /// Every cell in order
    pub fn columns(&self) -> ViewResult<Vec<TableColumn>> {
        let count = self.node.find_all("./td")?.len();
        Ok((0..count).map(|i| self.column_at(i)).collect())
    }

    /// Checkbox cell, the first column
    fn checkbox_column(&self) -> TableColumn {
        self.column_at(0)
    }

    /// Whether the row checkbox is checked
    pub fn checked(&self) -> ViewResult<bool> {
        self.checkbox_column().checked()
    }

    /// Check the row; returns whether it changed
    pub fn check(&self) -> ViewResult<bool> {
        self.checkbox_column().check()
    }

    /// Uncheck the row; returns whether it changed
    pub fn uncheck(&self) -> ViewResult<bool> {
        self.checkbox_column().uncheck()
    }

    /// Click the row
    pub fn click(&self) -> ViewResult<()> {
        self.node.click()
    }
}

impl Widget for TableRow {
    fn node(&self) -> &Node {
        &self.node
    }

    fn read(&self) -> ViewResult<Value> {
        let mut row = Map::new();
        for column in self.columns()? {
            row.insert(self.column_name(column.index), column.read()?);
        }
        Ok(Value::Object(row))
    }

    fn fill_value(&self, value: &Value) -> ViewResult<bool> {
        let Value::Object(cells) = value else {
            return Err(ViewError::invalid(self.node.path(), "expected a mapping of columns"));
        };
        let mut changed = false;
        for (name, cell) in cells {
            if cell.is_null() {
                continue;
            }
            let column = match name.parse::<usize>() {
                Ok(index) if !self.headers.contains(name) => self.column(index)?,
                _ => self.column(name.as_str())?,
            };
            changed |= column.fill(cell)?;
        }
        Ok(changed)
    }
}

// =============================================================================
// CELL
// =============================================================================

/// A cell of a row, optionally hosting a widget
pub struct TableColumn {
    node: Node,
    index: usize,
    widget: Option<Box<dyn Widget>>,
}

impl fmt::Debug for TableColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableColumn")
            .field("path", &self.node.path())
            .field("has_widget", &self.widget.is_some())
            .finish()
    }
}

impl TableColumn {
    /// Zero-based position
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Cell text
    pub fn text(&self) -> ViewResult<String> {
        self.node.text()
    }

    /// Widget hosted by the cell
    #[must_use]
    pub fn widget(&self) -> Option<&dyn Widget> {
        self.widget.as_deref()
    }

    fn checkbox(&self) -> ViewResult<crate::driver::ElementHandle> {
        self.node.find(CELL_CHECKBOX)
    }

    /// Whether the cell checkbox is checked
    pub fn checked(&self) -> ViewResult<bool> {
        self.node.browser().is_selected(&self.checkbox()?)
    }

    fn set_checked(&self, wanted: bool) -> ViewResult<bool> {
        let checkbox = self.checkbox()?;
        if self.node.browser().is_selected(&checkbox)? == wanted {
            return Ok(false);
        }
        self.node.browser().click(&checkbox)?;
        Ok(true)
    }

    /// Check the cell checkbox
    pub fn check(&self) -> ViewResult<bool> {
        self.set_checked(true)
    }

    /// Uncheck the cell checkbox
    pub fn uncheck(&self) -> ViewResult<bool> {
        self.set_checked(false)
    }

    /// Click the cell
    pub fn click(&self) -> ViewResult<()> {
        self.node.click()
    }
}

impl Widget for TableColumn {
    fn node(&self) -> &Node {
        &self.node
    }

    fn read(&self) -> ViewResult<Value> {
        match &self.widget {
            Some(widget) => widget.read(),
            None => Ok(Value::String(self.text()?)),
        }
    }

    fn fill_value(&self, value: &Value) -> ViewResult<bool> {
        match &self.widget {
            Some(widget) => widget.fill(value),
            None => Err(ViewError::NotFillable {
                widget: self.node.path(),
            }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::driver::ElementHandle;
    use crate::mock::{MockDriver, MockElement};
    use crate::widgets::testing::setup;
    use crate::widgets::TextInput;
    use serde_json::json;

    const TABLE: &str = ".//table[@id='list']";
    const NOTE: &str = ".//*[(self::input or self::textarea) and @name='note']";

    struct Grid {
        headers: Vec<ElementHandle>,
        checkboxes: Vec<ElementHandle>,
        notes: Vec<ElementHandle>,
    }

    // | (checkbox) | Name | Status | Note (input) |
    fn grid(mock: &MockDriver) -> Grid {
        let table = mock.add(None, TABLE, MockElement::new("table"));
        let headers = ["", "Name", "Status", "Note"]
            .iter()
            .map(|h| mock.add(Some(&table), HEADERS, MockElement::new("th").text(*h)))
            .collect();
        let mut checkboxes = Vec::new();
        let mut notes = Vec::new();
        for (i, (name, status)) in [("alpha", "on"), ("beta", "off"), ("gamma", "on")].iter().enumerate() {
            let tr = mock.add(Some(&table), ROWS, MockElement::new("tr"));
            mock.attach(Some(&table), &format!("{ROWS}[{}]", i + 1), &tr);
            let cells: Vec<ElementHandle> = ["", name, status, ""]
                .iter()
                .enumerate()
                .map(|(j, text)| {
                    let td = mock.add(Some(&tr), "./td", MockElement::new("td").text(*text));
                    mock.attach(Some(&tr), &format!("./td[{}]", j + 1), &td);
                    td
                })
                .collect();
            checkboxes.push(mock.add(Some(&cells[0]), CELL_CHECKBOX, MockElement::input("checkbox")));
            notes.push(mock.add(Some(&cells[3]), NOTE, MockElement::input("text")));
        }
        Grid { headers, checkboxes, notes }
    }

    fn table(root: &Node) -> Table {
        Table::new(TABLE)
            .column_widget("Note", || TextInput::by_name("note"))
            .bind(root, "items")
    }

    mod rows_tests {
        use super::*;

        #[test]
        fn test_headers_and_read() {
            let (mock, _browser, root) = setup();
            grid(&mock);
            let items = table(&root);
            assert_eq!(items.headers().unwrap(), ["", "Name", "Status", "Note"]);
            let rows = items.read().unwrap();
            assert_eq!(rows[1], json!({"0": "", "Name": "beta", "Status": "off", "Note": ""}));
            assert_eq!(rows.as_array().unwrap().len(), 3);
        }

        #[test]
        fn test_row_filters() {
            let (mock, _browser, root) = setup();
            grid(&mock);
            let items = table(&root);
            let row = items.row(&[("Name".into(), "gamma")]).unwrap();
            assert_eq!(row.index(), 2);
            assert_eq!(row.column("Status").unwrap().text().unwrap(), "on");
            assert_eq!(items.rows_matching(&[("Status".into(), "on")]).unwrap().len(), 2);
            assert_eq!(items.rows_matching(&[(ColumnRef::Index(2), "on"), (ColumnRef::Index(1), "alpha")]).unwrap().len(), 1);
            assert!(matches!(items.row(&[("Name".into(), "delta")]), Err(ViewError::LocatorNotFound { .. })));
            assert!(matches!(items.row(&[("Owner".into(), "x")]), Err(ViewError::InvalidValue { .. })));
        }

        #[test]
        fn test_paths() {
            let (mock, _browser, root) = setup();
            grid(&mock);
            let row = table(&root).row_at(0).unwrap();
            assert_eq!(row.column("Name").unwrap().path(), "items.row[0].Name");
        }
    }

    mod fill_tests {
        use super::*;

        #[test]
        fn test_fill_through_column_widgets() {
            let (mock, _browser, root) = setup();
            let page = grid(&mock);
            let items = table(&root);
            assert!(items.fill(&json!([null, {"Note": "keep"}])).unwrap());
            assert_eq!(mock.get_attribute(&page.notes[1], "value").as_deref(), Some("keep"));
            assert_eq!(items.row_at(1).unwrap().read().unwrap()["Note"], json!("keep"));
            assert!(items.fill(&json!([{"Name": "x"}])).is_err());
            assert!(matches!(items.fill(&json!([{}, {}, {}, {}])), Err(ViewError::InvalidValue { .. })));
        }

        #[test]
        fn test_checkboxes() {
            let (mock, _browser, root) = setup();
            let page = grid(&mock);
            let items = table(&root);
            assert!(items.row_at(1).unwrap().check().unwrap());
            assert!(mock.get_selected(&page.checkboxes[1]));
            assert!(!items.row_at(1).unwrap().check().unwrap());
            assert!(items.check_all().unwrap());
            assert!(page.checkboxes.iter().all(|c| mock.get_selected(c)));
            assert!(items.uncheck_all().unwrap());
            assert!(!items.row_at(0).unwrap().checked().unwrap());
        }
    }

    mod sort_tests {
        use super::*;

        #[test]
        fn test_sort_by_clicks_until_order_matches() {
            let (mock, _browser, root) = setup();
            let page = grid(&mock);
            let name = page.headers[1].clone();
            mock.on_click(&page.headers[1], move |m| {
                if m.get_attribute(&name, "class").is_some_and(|c| c.contains("sorting_asc")) {
                    m.remove_class(&name, "sorting_asc");
                    m.add_class(&name, "sorting_desc");
                } else {
                    m.remove_class(&name, "sorting_desc");
                    m.add_class(&name, "sorting_asc");
                }
            });
            let items = table(&root);
            assert_eq!(items.sorted_by().unwrap(), None);
            items.sort_by("Name", SortOrder::Descending).unwrap();
            assert_eq!(items.sorted_by().unwrap(), Some(("Name".to_string(), SortOrder::Descending)));
            assert_eq!(items.sort_order().unwrap(), Some(SortOrder::Descending));
            assert_eq!(mock.call_count(&format!("click:{}", page.headers[1])), 2);
        }

        #[test]
        fn test_unsortable_column() {
            let (mock, _browser, root) = setup();
            grid(&mock);
            assert!(matches!(
                table(&root).sort_by("Status", SortOrder::Ascending),
                Err(ViewError::InvalidValue { .. })
            ));
        }
    }
}
