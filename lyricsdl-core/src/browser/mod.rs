mod automation;
mod catalog;
mod error;
mod metrics;
mod profile;
mod sandbox;

pub use automation::{BrowserAutomation, BrowserContext, BrowserLauncher, LaunchOverrides};
pub use catalog::BrowserCatalogPage;
pub use error::{BrowserError, BrowserResult};
pub use metrics::BrowserMetrics;
pub use profile::{BrowserProfile, ProfileManager};
pub use sandbox::{BrowserExportSandbox, BrowserSandboxFactory};
