mod enumerator;

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::browser::BrowserResult;
use crate::change_await::ChangeSignal;

pub use enumerator::CatalogEnumerator;

pub const UNKNOWN_TITLE: &str = "Unknown Title";

/// One catalog entry. `resource_url` is only set when the row carries an
/// export affordance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemRecord {
    pub title: String,
    pub resource_url: Option<String>,
    pub has_export_link: bool,
    pub detail_url: Option<String>,
}

impl ItemRecord {
    pub fn from_row(row: RawItemRow) -> Self {
        let title = row
            .title
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| UNKNOWN_TITLE.to_string());
        let resource_url = row.export_href.filter(|href| !href.trim().is_empty());
        let detail_url = row.href.filter(|href| !href.trim().is_empty());
        Self {
            title,
            has_export_link: resource_url.is_some(),
            resource_url,
            detail_url,
        }
    }

    pub fn exportable(&self) -> bool {
        self.has_export_link && self.resource_url.is_some()
    }
}

/// Row as scraped from the page, before normalisation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawItemRow {
    pub title: Option<String>,
    pub href: Option<String>,
    pub export_href: Option<String>,
}

/// A catalog interaction that makes the table redraw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogAction {
    SetPageSize(String),
    NextPage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextControl {
    Missing,
    Disabled,
    Enabled,
}

/// The live catalog view. Implemented over a browser tab in
/// [`crate::browser::BrowserCatalogPage`].
#[async_trait(?Send)]
pub trait CatalogPage {
    /// Current value of the page-size control, `None` when there is none.
    async fn page_size(&self) -> BrowserResult<Option<String>>;
    /// Sets the page-size control and fires its change event.
    async fn set_page_size(&self, value: &str) -> BrowserResult<()>;
    async fn status_text(&self) -> BrowserResult<Option<String>>;
    async fn scrape_rows(&self) -> BrowserResult<Vec<RawItemRow>>;
    async fn next_control(&self) -> BrowserResult<NextControl>;
    async fn activate_next(&self) -> BrowserResult<()>;
    /// Runs `action` with change observation already in place, then waits
    /// for the table to be redrawn. Errors come only from the action.
    async fn perform(&self, action: CatalogAction) -> BrowserResult<ChangeSignal>;
}

fn total_items_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)of\s+([\d,]+)\s+items?").expect("total items pattern is valid")
    })
}

/// Parses the "of N items" hint out of the pagination status text.
pub fn parse_total_items(text: &str) -> Option<usize> {
    let captures = total_items_pattern().captures(text)?;
    captures.get(1)?.as_str().replace(',', "").parse().ok()
}
