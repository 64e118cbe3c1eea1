use super::bootstrap_select::BootstrapSelect;
use super::checkbox::Checkbox;
use super::table::{ColumnFilter, Table, TableRow};
use crate::driver::ElementHandle;
use crate::locator::{quote, Locator};
use crate::result::{ViewError, ViewResult};
use crate::version::VersionPick;
use crate::view::{CreateView, View};
use crate::widget::{Bind, Node, Placeholder, Widget};
use regex::Regex;
use std::sync::OnceLock;

/// Paginator control under its parent view
pub const PAGINATOR: &str = ".//ul[@class=\"pagination\"]";
/// Element carrying the "1-20 of 45" text
pub const CUR_PAGE: &str = "./li/span/input[@name=\"limitstart\"]/..";

const PAGE_INFO: &str = r"(\d+)?-?(\d+)\s+of\s+(\d+)";
const ITEMS_SUFFIX: &str = r"\s+items";

fn compiled(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> ViewResult<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok())
        .as_ref()
        .ok_or_else(|| ViewError::Config {
            message: format!("invalid pattern {pattern}"),
        })
}

fn page_info_pattern() -> ViewResult<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&PATTERN, PAGE_INFO)
}

fn items_suffix_pattern() -> ViewResult<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&PATTERN, ITEMS_SUFFIX)
}

/// Item range shown by the paginator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageInfo {
    /// First item on the page; absent when the text has no range
    pub min_item: Option<u64>,
    /// Last item on the page
    pub max_item: u64,
    /// Total number of items
    pub total: u64,
}

impl PageInfo {
    /// Parse "1-20 of 45"
    pub fn parse(text: &str) -> ViewResult<Self> {
        let re = page_info_pattern()?;
        let caps = re
            .captures(text)
            .ok_or_else(|| ViewError::invalid("paginator", format!("unrecognised page info {text:?}")))?;
        let number = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u64>().ok());
        Ok(Self {
            min_item: number(1),
            max_item: number(2).unwrap_or_default(),
            total: number(3).unwrap_or_default(),
        })
    }

    /// `(current page, page count)` for a page size
    #[must_use]
    pub const fn pages(&self, per_page: u64) -> (u64, u64) {
        let per_page = if per_page == 0 { 1 } else { per_page };
        let amount = if self.total == 0 { 1 } else { self.total.div_ceil(per_page) };
        let current = if self.max_item <= per_page { 1 } else { self.max_item.div_ceil(per_page) };
        (current, amount)
    }
}

// =============================================================================
// PAGINATOR
// =============================================================================

/// First/prev/next/last buttons and the item range text
#[derive(Debug)]
pub struct Paginator {
    node: Node,
}

impl Paginator {
    /// Paginator found under the parent view
    pub fn new() -> Placeholder<Self> {
        Placeholder::located(PAGINATOR, |node| Self { node })
    }

    /// Selector of a page button (`first`, `prev`, `next`, `last`)
    #[must_use]
    pub fn button_locator(command: &str) -> String {
        format!("./li[contains(@class, {})]/span", quote(command))
    }

    fn is_enabled(&self, button: &ElementHandle) -> ViewResult<bool> {
        let li = self.node.find_all_in(button, "..")?;
        match li.first() {
            Some(li) => Ok(!self.node.browser().classes(li)?.iter().any(|c| c == "disabled")),
            None => Ok(true),
        }
    }

    fn click_button(&self, command: &str) -> ViewResult<()> {
        let selector = Self::button_locator(command);
        let button = self.node.find(&selector)?;
        if !self.is_enabled(&button)? {
            return Err(ViewError::not_found(&selector, format!("{} (disabled)", self.node.path())));
        }
        tracing::info!(paginator = %self.node.path(), command, "page");
        self.node.browser().click(&button)
    }

    /// Go to the next page
    pub fn next_page(&self) -> ViewResult<()> {
        self.click_button("next")
    }

    /// Go to the previous page
    pub fn prev_page(&self) -> ViewResult<()> {
        self.click_button("prev")
    }

    /// Go to the last page
    pub fn last_page(&self) -> ViewResult<()> {
        self.click_button("last")
    }

    /// Go to the first page
    pub fn first_page(&self) -> ViewResult<()> {
        self.click_button("first")
    }

    /// Item range currently displayed
    pub fn page_info(&self) -> ViewResult<PageInfo> {
        PageInfo::parse(&self.node.browser().text(&self.node.find(CUR_PAGE)?)?)
    }
}

impl Widget for Paginator {
    fn node(&self) -> &Node {
        &self.node
    }
}

// =============================================================================
// PAGINATION PANE
// =============================================================================

/// Paging controls under list pages: select-all, sorting, page size and the
/// paginator.
#[derive(Debug)]
pub struct PaginationPane {
    node: Node,
    /// Select-all checkbox
    pub check_all_items: Checkbox,
    /// Sort column
    pub sort_by: BootstrapSelect,
    /// Items per page
    pub items_on_page: BootstrapSelect,
    /// Page buttons
    pub paginator: Paginator,
}

impl PaginationPane {
    /// Root of the pane
    pub const ROOT: &'static str = "//div[@id=\"paging_div\"]";

    /// Labels of the page size items by product version
    #[must_use]
    pub fn items_text() -> VersionPick<&'static str> {
        VersionPick::lowest("{} items").since("5.8.2", "{}")
    }

    /// Select all rows
    pub fn check_all(&self) -> ViewResult<bool> {
        self.check_all_items.fill(&true.into())
    }

    /// Deselect all rows, selecting first so the toggle clears everything
    pub fn uncheck_all(&self) -> ViewResult<bool> {
        self.check_all()?;
        self.check_all_items.fill(&false.into())
    }

    /// Sort by a column label
    pub fn sort(&self, column: &str) -> ViewResult<bool> {
        self.sort_by.fill(&column.into())
    }

    /// Page size
    pub fn items_per_page(&self) -> ViewResult<u64> {
        let selected = self
            .items_on_page
            .all_selected_options()?
            .into_iter()
            .next()
            .unwrap_or_default();
        let number = items_suffix_pattern()?.replace_all(&selected, "").into_owned();
        number.trim().parse().map_err(|_| {
            ViewError::invalid(self.items_on_page.path(), format!("not a page size: {selected:?}"))
        })
    }

    /// Choose the page size
    pub fn set_items_per_page(&self, value: u64) -> ViewResult<bool> {
        let format = *Self::items_text().resolve(self.node.browser())?;
        let text = format.replace("{}", &value.to_string());
        self.items_on_page.fill(&text.into())
    }

    fn parse_pages(&self) -> ViewResult<(u64, u64)> {
        let info = self.paginator.page_info()?;
        Ok(info.pages(self.items_per_page()?))
    }

    /// Current page number, from 1
    pub fn cur_page(&self) -> ViewResult<u64> {
        Ok(self.parse_pages()?.0)
    }

    /// Number of pages
    pub fn pages_amount(&self) -> ViewResult<u64> {
        Ok(self.parse_pages()?.1)
    }

    /// Total number of items
    pub fn items_amount(&self) -> ViewResult<u64> {
        Ok(self.paginator.page_info()?.total)
    }

    /// First item on the page
    pub fn min_item(&self) -> ViewResult<Option<u64>> {
        Ok(self.paginator.page_info()?.min_item)
    }

    /// Last item on the page
    pub fn max_item(&self) -> ViewResult<u64> {
        Ok(self.paginator.page_info()?.max_item)
    }

    /// Go to the next page
    pub fn next_page(&self) -> ViewResult<()> {
        self.paginator.next_page()
    }

    /// Go to the previous page
    pub fn prev_page(&self) -> ViewResult<()> {
        self.paginator.prev_page()
    }

    /// Go to the first page unless already there
    pub fn first_page(&self) -> ViewResult<()> {
        if self.cur_page()? != 1 {
            self.paginator.first_page()?;
        }
        Ok(())
    }

    /// Go to the last page unless already there
    pub fn last_page(&self) -> ViewResult<()> {
        let (current, amount) = self.parse_pages()?;
        if current != amount {
            self.paginator.last_page()?;
        }
        Ok(())
    }

    /// Call `visit` on every page from the first until it returns a value.
    ///
    /// Without a displayed pane the current page is the only page.
    pub fn visit_pages<T>(
        &self,
        mut visit: impl FnMut(u64) -> ViewResult<Option<T>>,
    ) -> ViewResult<Option<T>> {
        if !self.is_displayed() {
            return visit(1);
        }
        self.first_page()?;
        let amount = self.pages_amount()?;
        for _ in 0..amount {
            let page = self.cur_page()?;
            if let Some(found) = visit(page)? {
                return Ok(Some(found));
            }
            if page >= amount {
                break;
            }
            tracing::debug!(page, "advancing to next page");
            self.next_page()?;
        }
        Ok(None)
    }

    /// First row of `table` matching `filters`, searching every page
    pub fn find_row_on_pages(&self, table: &Table, filters: &[ColumnFilter<'_>]) -> ViewResult<TableRow> {
        let found = self.visit_pages(|_| match table.row(filters) {
            Ok(row) => Ok(Some(row)),
            Err(ViewError::LocatorNotFound { .. }) => Ok(None),
            Err(err) => Err(err),
        })?;
        found.ok_or_else(|| {
            let described: Vec<String> = filters.iter().map(|(c, t)| format!("{c}={t}")).collect();
            ViewError::not_found(&described.join(", "), table.path())
        })
    }

    /// Select then deselect everything; `false` when the pane is absent
    pub fn reset_selection(&self) -> ViewResult<bool> {
        if !self.is_displayed() {
            return Ok(false);
        }
        self.check_all()?;
        self.uncheck_all()?;
        Ok(true)
    }
}

impl Widget for PaginationPane {
    fn node(&self) -> &Node {
        &self.node
    }

    // the paging div can be present but empty
    fn is_displayed(&self) -> bool {
        self.check_all_items.is_displayed()
            || (self.paginator.is_displayed() && self.items_on_page.is_displayed())
    }
}

impl View for PaginationPane {
    fn widgets(&self) -> Vec<(&'static str, &dyn Widget)> {
        vec![
            ("check_all_items", &self.check_all_items),
            ("sort_by", &self.sort_by),
            ("items_on_page", &self.items_on_page),
            ("paginator", &self.paginator),
        ]
    }
}

impl CreateView for PaginationPane {
    fn root_locator() -> Option<Locator> {
        Some(Self::ROOT.into())
    }

    fn create(node: Node) -> Self {
        Self {
            check_all_items: Checkbox::by_id("masterToggle").bind(&node, "check_all_items"),
            sort_by: BootstrapSelect::by_id("sort_choice").bind(&node, "sort_by"),
            items_on_page: BootstrapSelect::by_id("ppsetting").bind(&node, "items_on_page"),
            paginator: Paginator::new().bind(&node, "paginator"),
            node,
        }
    }
}
