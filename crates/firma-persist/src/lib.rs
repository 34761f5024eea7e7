//! Save-path selection and bulk export of stored signatures.

pub mod export;
pub mod selector;
pub mod strategy;

pub use export::{BulkExporter, ExportMode, ExportOutcome};
pub use selector::{Attempt, PersistencePolicy, SaveResolution, StrategySelector};
pub use strategy::{
    DirectoryStrategy, DownloadStrategy, PersistStrategy, SaveReceipt, SilentStrategy,
};

use firma_types::FirmaError;

pub fn export_error(message: impl Into<String>) -> FirmaError {
    FirmaError::Export(message.into())
}
