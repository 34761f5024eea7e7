use std::fmt;

use serde::{Deserialize, Serialize};

/// User-actionable reason why a persistence strategy could not be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Diagnostic {
    NotSecureContext,
    NoStorage,
    PrivateSession,
    PermissionDenied,
    NoDirectoryCapability,
    EncodingFailed,
    WriteFailed,
}

impl Diagnostic {
    /// Short message shown on the kiosk status line.
    pub fn message(&self) -> &'static str {
        match self {
            Diagnostic::NotSecureContext => "Contexto no seguro: abra la app por https o localhost",
            Diagnostic::NoStorage => "Este navegador no tiene almacenamiento privado",
            Diagnostic::PrivateSession => "Modo incógnito: el almacenamiento no es persistente",
            Diagnostic::PermissionDenied => "Sin permiso para escribir en la carpeta",
            Diagnostic::NoDirectoryCapability => {
                "Este navegador no permite guardar directo a carpeta"
            }
            Diagnostic::EncodingFailed => "No se pudo crear el PNG en este dispositivo",
            Diagnostic::WriteFailed => "No se pudo escribir el archivo",
        }
    }

    /// Ranks how much a reason tells the operator; the dispatcher reports the
    /// most specific one when every strategy fails.
    pub fn specificity(&self) -> u8 {
        match self {
            Diagnostic::WriteFailed => 0,
            Diagnostic::NoStorage | Diagnostic::NoDirectoryCapability => 1,
            Diagnostic::PermissionDenied | Diagnostic::EncodingFailed => 2,
            Diagnostic::NotSecureContext | Diagnostic::PrivateSession => 3,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}
