use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrowserMetrics {
    pub pages_opened: u64,
    pub catalog_pages_scraped: u64,
    pub sandboxes_created: u64,
    pub sandboxes_destroyed: u64,
    pub export_attempts: u64,
    pub export_failures: u64,
    pub retries: u64,
}

impl BrowserMetrics {
    pub fn record_page_open(&mut self) {
        self.pages_opened = self.pages_opened.saturating_add(1);
    }

    pub fn record_catalog_page(&mut self) {
        self.catalog_pages_scraped = self.catalog_pages_scraped.saturating_add(1);
    }

    pub fn record_sandbox_created(&mut self) {
        self.sandboxes_created = self.sandboxes_created.saturating_add(1);
    }

    pub fn record_sandbox_destroyed(&mut self) {
        self.sandboxes_destroyed = self.sandboxes_destroyed.saturating_add(1);
    }

    pub fn record_export_attempt(&mut self, success: bool) {
        self.export_attempts = self.export_attempts.saturating_add(1);
        if !success {
            self.export_failures = self.export_failures.saturating_add(1);
        }
    }

    pub fn record_retry(&mut self) {
        self.retries = self.retries.saturating_add(1);
    }

    pub fn export_success_rate(&self) -> f64 {
        if self.export_attempts == 0 {
            0.0
        } else {
            let succeeded = self.export_attempts - self.export_failures;
            (succeeded as f64 / self.export_attempts as f64) * 100.0
        }
    }

    /// Sandboxes created but not yet closed.
    pub fn live_sandboxes(&self) -> u64 {
        self.sandboxes_created.saturating_sub(self.sandboxes_destroyed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_rate_counts_failed_attempts() {
        let mut metrics = BrowserMetrics::default();
        assert_eq!(metrics.export_success_rate(), 0.0);
        metrics.record_export_attempt(false);
        metrics.record_export_attempt(true);
        metrics.record_export_attempt(true);
        metrics.record_export_attempt(true);
        assert_eq!(metrics.export_failures, 1);
        assert!((metrics.export_success_rate() - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn live_sandboxes_tracks_balance() {
        let mut metrics = BrowserMetrics::default();
        metrics.record_sandbox_created();
        metrics.record_sandbox_created();
        metrics.record_sandbox_destroyed();
        assert_eq!(metrics.live_sandboxes(), 1);
    }
}
