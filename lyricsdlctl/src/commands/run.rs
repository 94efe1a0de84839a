use std::path::PathBuf;

use clap::Args;

/// Parameters of `run`.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Catalog listing to export from
    #[arg(long)]
    pub catalog_url: String,
    /// Folder holding previously exported lyrics; downloads land here too.
    /// Defaults to the current directory.
    #[arg(long)]
    pub folder: Option<PathBuf>,
    /// Use the folder without asking for confirmation
    #[arg(short, long, default_value_t = false)]
    pub yes: bool,
    /// Run Chromium without a window, overriding the config file
    #[arg(long, default_value_t = false)]
    pub headless: bool,
}
