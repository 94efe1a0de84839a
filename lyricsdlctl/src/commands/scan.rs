use std::path::PathBuf;

use clap::Args;

/// Parameters of `scan`.
#[derive(Args, Debug, Clone)]
pub struct ScanArgs {
    /// Folder to scan. Defaults to the current directory.
    #[arg(long)]
    pub folder: Option<PathBuf>,
}
