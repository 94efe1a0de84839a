use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use lyricsdl_core::browser::{
    BrowserAutomation, BrowserCatalogPage, BrowserError, BrowserLauncher, BrowserSandboxFactory,
    LaunchOverrides, ProfileManager,
};
use lyricsdl_core::export::{ExistingExportScanner, ExportSession, LocalFolderAccess, ScanError};
use lyricsdl_core::{
    load_config, resolve_relative, CatalogEnumerator, DownloadRun, ItemRecord, LyricsdlConfig,
    RunReport, UiSession,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod commands;
mod folder;
mod sink;

pub use commands::{CatalogArgs, RunArgs, ScanArgs};
pub use folder::{PromptHost, PromptedFolderAccess};
pub use sink::TerminalSink;

pub type Result<T> = std::result::Result<T, AppError>;

const DEFAULT_LOG_FILTER: &str = "lyricsdl_core=info,lyricsdlctl=info";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] lyricsdl_core::ConfigError),
    #[error("browser error: {0}")]
    Browser(#[from] BrowserError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("{0}")]
    Scan(#[from] ScanError),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("download run failed: {0}")]
    RunFailed(String),
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Bulk lyric sheet exporter", long_about = None)]
pub struct Cli {
    /// Path to lyricsdl.toml
    #[arg(long, default_value = "configs/lyricsdl.toml")]
    pub config: PathBuf,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Exports every song with lyrics that is not in the folder yet
    Run(RunArgs),
    /// Lists the songs of a catalog without exporting anything
    Catalog(CatalogArgs),
    /// Lists the dedup keys found in a folder
    Scan(ScanArgs),
    /// Prints the effective configuration
    Config,
}

/// Installs the stderr log subscriber. `RUST_LOG` overrides the default
/// filter.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn run(cli: Cli) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(dispatch(cli))
}

async fn dispatch(cli: Cli) -> Result<()> {
    let config = load_config(&cli.config)?;
    match &cli.command {
        Commands::Run(args) => {
            let report = run_download(&cli.config, &config, args, cli.format).await?;
            render(&report, cli.format)?;
            if let RunReport::Failed { detail } = report {
                return Err(AppError::RunFailed(detail));
            }
        }
        Commands::Catalog(args) => {
            let listing = list_catalog(&cli.config, &config, args).await?;
            render(&listing, cli.format)?;
        }
        Commands::Scan(args) => {
            let keys = scan_folder(&config, args).await?;
            render(&keys, cli.format)?;
        }
        Commands::Config => {
            let summary = ConfigSummary::new(&cli.config, &config);
            render(&summary, cli.format)?;
        }
    }
    Ok(())
}

fn folder_or_cwd(folder: Option<&PathBuf>) -> Result<PathBuf> {
    match folder {
        Some(path) if path.as_os_str().is_empty() => {
            Err(AppError::InvalidArgument("--folder must not be empty".into()))
        }
        Some(path) => Ok(path.clone()),
        None => Ok(std::env::current_dir()?),
    }
}

fn validate_catalog_url(raw: &str) -> Result<()> {
    match url::Url::parse(raw) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        Ok(parsed) => Err(AppError::InvalidArgument(format!(
            "catalog url must be http(s), got {}",
            parsed.scheme()
        ))),
        Err(err) => Err(AppError::InvalidArgument(format!(
            "invalid catalog url {raw:?}: {err}"
        ))),
    }
}

async fn launch(
    config_path: &Path,
    config: &LyricsdlConfig,
    headless: bool,
) -> Result<BrowserAutomation> {
    let profile_dir = resolve_relative(config_path, &config.chromium.profile_dir);
    let profiles = ProfileManager::new(profile_dir)?;
    let launcher = BrowserLauncher::new(config.chromium.clone(), profiles);
    let overrides = LaunchOverrides {
        headless: headless.then_some(true),
    };
    Ok(launcher.launch_with_overrides(overrides).await?)
}

async fn open_catalog(
    automation: &BrowserAutomation,
    config: &LyricsdlConfig,
    url: &str,
) -> Result<BrowserCatalogPage> {
    let page = BrowserCatalogPage::new(
        automation.new_context().await?,
        config.catalog.clone(),
        config.change_await.clone(),
    );
    page.open(url).await?;
    Ok(page)
}

async fn run_download(
    config_path: &Path,
    config: &LyricsdlConfig,
    args: &RunArgs,
    format: OutputFormat,
) -> Result<RunReport> {
    validate_catalog_url(&args.catalog_url)?;
    let folder = folder_or_cwd(args.folder.as_ref())?;

    let automation = Arc::new(launch(config_path, config, args.headless).await?);
    let result = async {
        automation.set_download_dir(&folder).await?;
        let catalog = open_catalog(&automation, config, &args.catalog_url).await?;
        let base = catalog.location().await?;
        let factory = Arc::new(BrowserSandboxFactory::new(
            Arc::clone(&automation),
            config.export.clone(),
        ));
        let mut session = ExportSession::new(factory, &base, config.export.session_timeout())
            .with_metrics(automation.metrics_handle());
        let terminal = Arc::new(match format {
            OutputFormat::Text => TerminalSink::new(),
            OutputFormat::Json => TerminalSink::hidden(),
        });
        let access = PromptedFolderAccess::new(&folder, args.yes).with_host(terminal.clone());
        let ui = UiSession::new(terminal);

        let report = DownloadRun::new(config, &catalog, &access, &mut session)
            .run(&ui)
            .await;
        ui.close();
        drop(session);
        if let Err(err) = catalog.close().await {
            warn!(error = %err, "failed to close catalog tab");
        }
        Ok::<_, AppError>(report)
    }
    .await;

    shutdown(automation).await;
    result
}

async fn list_catalog(
    config_path: &Path,
    config: &LyricsdlConfig,
    args: &CatalogArgs,
) -> Result<CatalogListing> {
    validate_catalog_url(&args.catalog_url)?;
    let automation = Arc::new(launch(config_path, config, args.headless).await?);
    let result = async {
        let catalog = open_catalog(&automation, config, &args.catalog_url).await?;
        let ui = UiSession::new(Arc::new(lyricsdl_core::TracingSink));
        let items = CatalogEnumerator::new(config.catalog.clone())
            .enumerate_all(&catalog, &ui)
            .await;
        if let Err(err) = catalog.close().await {
            warn!(error = %err, "failed to close catalog tab");
        }
        Ok::<_, AppError>(items?)
    }
    .await;
    shutdown(automation).await;
    Ok(CatalogListing::new(result?, args.exportable))
}

async fn scan_folder(config: &LyricsdlConfig, args: &ScanArgs) -> Result<KeyListing> {
    let folder = folder_or_cwd(args.folder.as_ref())?;
    let access = LocalFolderAccess::new(&folder);
    let keys = ExistingExportScanner::new(config.export.file_extension.clone())
        .scan(&access)
        .await?
        .unwrap_or_default();
    Ok(KeyListing {
        folder,
        keys: keys.sorted().into_iter().map(str::to_string).collect(),
    })
}

async fn shutdown(automation: Arc<BrowserAutomation>) {
    match Arc::try_unwrap(automation) {
        Ok(automation) => {
            if let Err(err) = automation.shutdown().await {
                warn!(error = %err, "browser shutdown failed");
            }
        }
        Err(_) => warn!("browser still referenced at shutdown, leaving it to drop"),
    }
    info!("browser closed");
}

fn render<T>(value: &T, format: OutputFormat) -> Result<()>
where
    T: Serialize + DisplayFallback,
{
    match format {
        OutputFormat::Text => {
            println!("{}", value.display());
            Ok(())
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{}", json);
            Ok(())
        }
    }
}

trait DisplayFallback {
    fn display(&self) -> String;
}

impl DisplayFallback for RunReport {
    fn display(&self) -> String {
        match self {
            RunReport::NoItems => "No songs found on the page.".to_string(),
            RunReport::NoExportable { no_lyrics } => {
                format!("No songs with lyrics found ({no_lyrics} without lyrics link).")
            }
            RunReport::Cancelled => "Download cancelled by user.".to_string(),
            RunReport::NothingNew { summary } => {
                format!("All songs already downloaded! ({summary})")
            }
            RunReport::Completed { summary } => format!("Done! {summary}."),
            RunReport::Failed { detail } => format!("Error: {detail}"),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CatalogListing {
    pub total: usize,
    pub exportable: usize,
    pub items: Vec<ItemRecord>,
}

impl CatalogListing {
    fn new(items: Vec<ItemRecord>, exportable_only: bool) -> Self {
        let total = items.len();
        let exportable = items.iter().filter(|item| item.exportable()).count();
        let items = if exportable_only {
            items.into_iter().filter(ItemRecord::exportable).collect()
        } else {
            items
        };
        Self {
            total,
            exportable,
            items,
        }
    }
}

impl DisplayFallback for CatalogListing {
    fn display(&self) -> String {
        let mut lines = vec![format!(
            "{} songs, {} with lyrics",
            self.total, self.exportable
        )];
        for item in &self.items {
            let marker = if item.exportable() { "+" } else { "-" };
            lines.push(format!(
                "  {marker} {} | {}",
                item.title,
                item.resource_url.as_deref().unwrap_or("<no lyrics link>")
            ));
        }
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct KeyListing {
    pub folder: PathBuf,
    pub keys: Vec<String>,
}

impl DisplayFallback for KeyListing {
    fn display(&self) -> String {
        if self.keys.is_empty() {
            return format!("No exported lyrics in {}", self.folder.display());
        }
        let mut lines = vec![format!(
            "{} exported lyrics in {}",
            self.keys.len(),
            self.folder.display()
        )];
        lines.extend(self.keys.iter().map(|key| format!("  - {key}")));
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct ConfigSummary {
    pub config_path: PathBuf,
    pub profile_dir: PathBuf,
    #[serde(flatten)]
    pub config: LyricsdlConfig,
}

impl ConfigSummary {
    fn new(config_path: &Path, config: &LyricsdlConfig) -> Self {
        Self {
            config_path: config_path.to_path_buf(),
            profile_dir: resolve_relative(config_path, &config.chromium.profile_dir),
            config: config.clone(),
        }
    }
}

impl DisplayFallback for ConfigSummary {
    fn display(&self) -> String {
        let config = &self.config;
        [
            format!("Config: {}", self.config_path.display()),
            format!(
                "Chromium: {} (headless: {}, sandbox: {})",
                config.chromium.executable_path, config.chromium.headless, config.chromium.sandbox
            ),
            format!(
                "Profile: {}/{}",
                self.profile_dir.display(),
                config.chromium.profile_name
            ),
            format!(
                "Catalog: rows {} | next {} | page size {}",
                config.catalog.item_selector,
                config.catalog.next_page_selector,
                config.catalog.max_page_size
            ),
            format!(
                "Export: timeout {}s | {} polls every {}ms | extension {}",
                config.export.session_timeout_seconds,
                config.export.max_poll_attempts,
                config.export.poll_interval_ms,
                config.export.file_extension
            ),
            format!(
                "Schedule: retry cooldown {}ms | item delay {}ms",
                config.schedule.retry_cooldown_ms, config.schedule.item_delay_ms
            ),
        ]
        .join("\n")
    }
}
