mod catalog;
mod run;
mod scan;

pub use catalog::CatalogArgs;
pub use run::RunArgs;
pub use scan::ScanArgs;
