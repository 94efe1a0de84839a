use async_trait::async_trait;
use tracing::debug;
use url::Url;

use crate::catalog::{CatalogAction, CatalogPage, NextControl, RawItemRow};
use crate::change_await::{wait_for_change, ChangeSignal, MutationProbe};
use crate::config::{CatalogSection, ChangeAwaitSection};

use super::automation::{js_string, BrowserContext};
use super::error::{BrowserError, BrowserResult};

const OBSERVER_SLOT: &str = "__lyricsdlMutation";

/// The catalog listing tab.
#[derive(Debug)]
pub struct BrowserCatalogPage {
    context: BrowserContext,
    catalog: CatalogSection,
    change_await: ChangeAwaitSection,
}

impl BrowserCatalogPage {
    pub fn new(
        context: BrowserContext,
        catalog: CatalogSection,
        change_await: ChangeAwaitSection,
    ) -> Self {
        Self {
            context,
            catalog,
            change_await,
        }
    }

    pub async fn open(&self, url: &str) -> BrowserResult<()> {
        self.context.goto(url).await?;
        debug!(url, "catalog page loaded");
        Ok(())
    }

    /// URL of the page as currently shown, used as the base for export links.
    pub async fn location(&self) -> BrowserResult<Url> {
        let current = self
            .context
            .current_url()
            .await?
            .ok_or_else(|| BrowserError::Unexpected("catalog tab has no url".into()))?;
        Url::parse(&current)
            .map_err(|err| BrowserError::Unexpected(format!("invalid catalog url {current}: {err}")))
    }

    pub fn context(&self) -> &BrowserContext {
        &self.context
    }

    pub async fn close(self) -> BrowserResult<()> {
        self.context.close().await
    }

    fn scrape_script(&self) -> String {
        format!(
            r#"(() => {{
    const text = (el) => (el && el.textContent ? el.textContent : null);
    return Array.from(document.querySelectorAll({items})).map((row) => {{
        const link = row.querySelector({export});
        return {{
            title: text(row.querySelector({title})),
            href: row.getAttribute('href'),
            export_href: link ? link.getAttribute('href') : null,
        }};
    }});
}})()"#,
            items = js_string(&self.catalog.item_selector),
            export = js_string(&self.catalog.export_link_selector),
            title = js_string(&self.catalog.title_selector),
        )
    }
}

#[async_trait(?Send)]
impl CatalogPage for BrowserCatalogPage {
    async fn page_size(&self) -> BrowserResult<Option<String>> {
        let script = format!(
            "(() => {{ const el = document.querySelector({}); return el ? [String(el.value ?? '')] : []; }})()",
            js_string(&self.catalog.page_size_selector)
        );
        let found: Vec<String> = self.context.evaluate(&script, "read page size").await?;
        Ok(found.into_iter().next())
    }

    async fn set_page_size(&self, value: &str) -> BrowserResult<()> {
        let script = format!(
            r#"(() => {{
    const el = document.querySelector({selector});
    if (!el) return false;
    el.value = {value};
    el.dispatchEvent(new Event('change', {{ bubbles: true }}));
    return true;
}})()"#,
            selector = js_string(&self.catalog.page_size_selector),
            value = js_string(value),
        );
        let applied: bool = self.context.evaluate(&script, "set page size").await?;
        if !applied {
            return Err(BrowserError::Script("page size control disappeared".into()));
        }
        Ok(())
    }

    async fn status_text(&self) -> BrowserResult<Option<String>> {
        let script = format!(
            "(() => {{ const el = document.querySelector({}); return el ? [el.textContent || ''] : []; }})()",
            js_string(&self.catalog.status_selector)
        );
        let found: Vec<String> = self
            .context
            .evaluate(&script, "read pagination status")
            .await?;
        Ok(found.into_iter().next())
    }

    async fn scrape_rows(&self) -> BrowserResult<Vec<RawItemRow>> {
        let rows: Vec<RawItemRow> = self
            .context
            .evaluate(&self.scrape_script(), "scrape catalog rows")
            .await?;
        self.context.with_metrics(|metrics| metrics.record_catalog_page());
        Ok(rows)
    }

    async fn next_control(&self) -> BrowserResult<NextControl> {
        let script = format!(
            r#"(() => {{
    const el = document.querySelector({});
    if (!el) return 'missing';
    return el.disabled || el.classList.contains('disabled') ? 'disabled' : 'enabled';
}})()"#,
            js_string(&self.catalog.next_page_selector)
        );
        self.context.evaluate(&script, "inspect next page control").await
    }

    async fn activate_next(&self) -> BrowserResult<()> {
        let script = format!(
            "(() => {{ const el = document.querySelector({}); if (!el) return false; el.click(); return true; }})()",
            js_string(&self.catalog.next_page_selector)
        );
        let clicked: bool = self.context.evaluate(&script, "click next page").await?;
        if !clicked {
            return Err(BrowserError::Script("next page control disappeared".into()));
        }
        Ok(())
    }

    async fn perform(&self, action: CatalogAction) -> BrowserResult<ChangeSignal> {
        wait_for_change(self, &self.change_await, async {
            match &action {
                CatalogAction::SetPageSize(value) => self.set_page_size(value).await,
                CatalogAction::NextPage => self.activate_next().await,
            }
        })
        .await
    }
}

#[async_trait(?Send)]
impl MutationProbe for BrowserCatalogPage {
    async fn arm(&self) -> BrowserResult<bool> {
        let selectors = serde_json::Value::from(self.change_await.container_selectors.clone());
        let script = format!(
            r#"(() => {{
    const previous = window[{slot}];
    if (previous && previous.observer) previous.observer.disconnect();
    const container = {selectors}
        .map((selector) => document.querySelector(selector))
        .find((el) => el);
    if (!container) return false;
    const state = {{ mutated: false, observer: null }};
    state.observer = new MutationObserver(() => {{ state.mutated = true; }});
    state.observer.observe(container, {{ childList: true, subtree: true }});
    window[{slot}] = state;
    return true;
}})()"#,
            slot = js_string(OBSERVER_SLOT),
        );
        self.context.evaluate(&script, "arm change observer").await
    }

    async fn mutated(&self) -> BrowserResult<bool> {
        let script = format!(
            "(() => {{ const state = window[{}]; return !!(state && state.mutated); }})()",
            js_string(OBSERVER_SLOT)
        );
        self.context.evaluate(&script, "poll change observer").await
    }

    async fn disarm(&self) -> BrowserResult<()> {
        let script = format!(
            r#"(() => {{
    const state = window[{slot}];
    if (state && state.observer) state.observer.disconnect();
    delete window[{slot}];
    return true;
}})()"#,
            slot = js_string(OBSERVER_SLOT)
        );
        let _: bool = self.context.evaluate(&script, "disarm change observer").await?;
        Ok(())
    }
}
