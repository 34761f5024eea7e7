use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const PNG_MIME: &str = "image/png";

/// What the exported PNG contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// Transparent background, ink only.
    #[default]
    SignatureOnly,
    /// White background, artwork, then ink.
    Stamped,
}

/// Encoded PNG produced for a single save request.
#[derive(Debug, Clone)]
pub struct SignatureImage {
    pub width: u32,
    pub height: u32,
    pub mode: RenderMode,
    /// PNG-encoded bytes.
    pub bytes: Vec<u8>,
    pub rendered_at: DateTime<Utc>,
}

impl SignatureImage {
    pub fn new(width: u32, height: u32, mode: RenderMode, bytes: Vec<u8>) -> Self {
        Self {
            width,
            height,
            mode,
            bytes,
            rendered_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
