use serde::{Deserialize, Serialize};

use crate::diagnostic::Diagnostic;

/// How the kiosk shell is hosted; only feeds the badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    Pwa,
    Electron,
    #[default]
    Browser,
    Terminal,
}

impl DisplayMode {
    pub fn label(&self) -> &'static str {
        match self {
            DisplayMode::Pwa => "PWA",
            DisplayMode::Electron => "Electron",
            DisplayMode::Browser => "Navegador",
            DisplayMode::Terminal => "Terminal",
        }
    }
}

/// Capability snapshot computed once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub secure_context: bool,
    pub storage_available: bool,
    pub private_session: bool,
    pub display_mode: DisplayMode,
}

impl Environment {
    pub fn capable() -> Self {
        Self {
            secure_context: true,
            storage_available: true,
            private_session: false,
            display_mode: DisplayMode::Browser,
        }
    }

    /// First reason the origin-private store cannot be used, in the order the
    /// platform would refuse it.
    pub fn silent_blocker(&self) -> Option<Diagnostic> {
        if !self.secure_context {
            Some(Diagnostic::NotSecureContext)
        } else if !self.storage_available {
            Some(Diagnostic::NoStorage)
        } else if self.private_session {
            Some(Diagnostic::PrivateSession)
        } else {
            None
        }
    }

    pub fn supports_silent(&self) -> bool {
        self.silent_blocker().is_none()
    }
}
