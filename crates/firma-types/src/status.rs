use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{config::StrategyKind, diagnostic::Diagnostic};

/// Everything the kiosk tells the person in front of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notice {
    Saved {
        via: StrategyKind,
        file_name: String,
        /// Why earlier strategies were passed over, when the policy shows it.
        fallback_reason: Option<Diagnostic>,
    },
    NothingToSave,
    SaveFailed {
        reason: Option<Diagnostic>,
    },
    Cleared,
    IdleCleared,
    Exported {
        count: usize,
        archive: Option<String>,
    },
    NothingToExport,
    ArchiveUnavailable,
    ExportFailed {
        details: String,
    },
}

impl Notice {
    pub fn message(&self) -> String {
        match self {
            Notice::Saved {
                via,
                fallback_reason,
                ..
            } => {
                let base = match via {
                    StrategyKind::Silent => "Guardado ✔",
                    StrategyKind::Directory => "Firma guardada ✔",
                    StrategyKind::Download => "Descargado ✔",
                };
                match fallback_reason {
                    Some(reason) => format!("{base} ({reason})"),
                    None => base.to_string(),
                }
            }
            Notice::NothingToSave => "Primero firme con el dedo".into(),
            Notice::SaveFailed { reason: Some(reason) } => reason.message().into(),
            Notice::SaveFailed { reason: None } => "No se pudo guardar la firma".into(),
            Notice::Cleared => "Pantalla limpia".into(),
            Notice::IdleCleared => "Se limpió por inactividad".into(),
            Notice::Exported {
                count,
                archive: Some(name),
            } => format!("{name} descargado ({count} firmas)"),
            Notice::Exported {
                count,
                archive: None,
            } => format!("Exportadas {count} firmas"),
            Notice::NothingToExport => "No hay firmas guardadas".into(),
            Notice::ArchiveUnavailable => "Compresión ZIP no disponible".into(),
            Notice::ExportFailed { details } => format!("No se pudo exportar: {details}"),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Notice::NothingToSave
                | Notice::SaveFailed { .. }
                | Notice::ArchiveUnavailable
                | Notice::ExportFailed { .. }
        )
    }
}

/// Envelope published on the status channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub notice: Notice,
}

impl StatusEvent {
    pub fn new(notice: Notice) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            notice,
        }
    }

    pub fn message(&self) -> String {
        self.notice.message()
    }
}
