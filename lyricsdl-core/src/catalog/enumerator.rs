use tokio::time::sleep;
use tracing::{debug, info};

use crate::browser::BrowserResult;
use crate::config::CatalogSection;
use crate::ui::UiSession;

use super::{parse_total_items, CatalogAction, CatalogPage, ItemRecord, NextControl};

/// Walks every catalog page front to back and collects its rows.
///
/// There is no page ceiling and no repeated-page detection: a "next" control
/// that never reports disabled keeps the scan going.
#[derive(Debug, Clone)]
pub struct CatalogEnumerator {
    settings: CatalogSection,
}

impl CatalogEnumerator {
    pub fn new(settings: CatalogSection) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &CatalogSection {
        &self.settings
    }

    pub async fn enumerate_all(
        &self,
        page: &dyn CatalogPage,
        ui: &UiSession,
    ) -> BrowserResult<Vec<ItemRecord>> {
        let original_size = self.maximize_page_size(page, ui).await?;

        let total_hint = page
            .status_text()
            .await?
            .as_deref()
            .and_then(parse_total_items);
        match total_hint {
            Some(total) => ui.set_status(&format!("Found {total} songs. Collecting...")),
            None => ui.set_status("Collecting songs from page..."),
        }

        let mut items = Vec::new();
        let mut page_number = 1usize;
        loop {
            let mut status = format!("Scraping page {page_number}...");
            if let Some(total) = total_hint {
                status.push_str(&format!(" ({} / {total} collected)", items.len()));
            }
            ui.set_status(&status);

            let rows = page.scrape_rows().await?;
            let scraped = rows.len();
            items.extend(rows.into_iter().map(ItemRecord::from_row));
            debug!(
                page = page_number,
                rows = scraped,
                collected = items.len(),
                "scraped catalog page"
            );

            match page.next_control().await? {
                NextControl::Missing | NextControl::Disabled => break,
                NextControl::Enabled => {}
            }

            let signal = page.perform(CatalogAction::NextPage).await?;
            debug!(page = page_number, ?signal, "advanced to next catalog page");
            sleep(self.settings.page_settle()).await;
            page_number += 1;
        }

        if let Some(original) = original_size {
            self.restore_page_size(page, &original).await?;
        }

        info!(
            pages = page_number,
            items = items.len(),
            total_hint = ?total_hint,
            "catalog enumeration finished"
        );
        Ok(items)
    }

    /// Raises the page size to the maximum. Returns the value to restore
    /// afterwards, if any.
    async fn maximize_page_size(
        &self,
        page: &dyn CatalogPage,
        ui: &UiSession,
    ) -> BrowserResult<Option<String>> {
        let Some(original) = page.page_size().await? else {
            return Ok(None);
        };
        let max = &self.settings.max_page_size;
        if &original != max {
            ui.set_status(&format!("Setting page size to {max}..."));
            page.perform(CatalogAction::SetPageSize(max.clone())).await?;
            sleep(self.settings.page_settle()).await;
        }
        Ok(Some(original))
    }

    async fn restore_page_size(&self, page: &dyn CatalogPage, original: &str) -> BrowserResult<()> {
        if original.is_empty() {
            return Ok(());
        }
        match page.page_size().await? {
            Some(current) if current != original => {
                debug!(from = %current, to = %original, "restoring catalog page size");
                page.set_page_size(original).await
            }
            _ => Ok(()),
        }
    }
}
