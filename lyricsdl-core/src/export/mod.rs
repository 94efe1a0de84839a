//! Everything between "this item should be exported" and "the export
//! finished": folder scanning, dedup, the result channel and the sandboxed
//! export session.

pub mod channel;
pub mod dedup;
pub mod flow;
pub mod scanner;
pub mod session;

pub use channel::{Envelope, ResultMessage, ResultPort, SandboxId, RESULT_MARKER};
pub use dedup::{already_exists, normalize_title, partition, DedupPartition, ExistingKeySet};
pub use flow::{ExportFlow, ExportPage, DOWNLOAD_MISSING_ERROR, TRIGGER_TIMEOUT_ERROR};
pub use scanner::{
    EntryKind, ExistingExportScanner, FolderAccess, FolderAccessError, FolderEntry,
    LocalFolderAccess, ScanError,
};
pub use session::{ExportOutcome, ExportSandbox, ExportSession, ItemExporter, SandboxFactory};
