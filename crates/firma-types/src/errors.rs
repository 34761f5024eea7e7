use thiserror::Error;

use crate::diagnostic::Diagnostic;

pub type Result<T, E = FirmaError> = std::result::Result<T, E>;

/// Unified error type covering the kiosk's failure taxonomy.
#[derive(Debug, Error)]
pub enum FirmaError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("nothing to save: the canvas has no ink")]
    NothingToSave,
    #[error("encoding error: {0}")]
    Encoding(String),
    #[error("capability error: {0}")]
    Capability(Diagnostic),
    #[error("permission error: {0}")]
    Permission(String),
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("export error: {0}")]
    Export(String),
    #[error("operational error: {0}")]
    Ops(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FirmaError {
    /// The user-actionable reason behind this error, when one applies.
    pub fn diagnostic(&self) -> Option<Diagnostic> {
        match self {
            FirmaError::Capability(diagnostic) => Some(*diagnostic),
            FirmaError::Permission(_) => Some(Diagnostic::PermissionDenied),
            FirmaError::Encoding(_) => Some(Diagnostic::EncodingFailed),
            FirmaError::Persistence(_) => Some(Diagnostic::WriteFailed),
            _ => None,
        }
    }
}
