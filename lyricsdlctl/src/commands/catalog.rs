use clap::Args;

/// Parameters of `catalog`.
#[derive(Args, Debug, Clone)]
pub struct CatalogArgs {
    /// Catalog listing to enumerate
    #[arg(long)]
    pub catalog_url: String,
    /// Only list items that carry an export link
    #[arg(long, default_value_t = false)]
    pub exportable: bool,
    /// Run Chromium without a window, overriding the config file
    #[arg(long, default_value_t = false)]
    pub headless: bool,
}
