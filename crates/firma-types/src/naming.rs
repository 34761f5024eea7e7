use std::sync::Mutex;

use chrono::{Local, NaiveDateTime};

pub const PNG_EXTENSION: &str = ".png";
const STAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// `<prefix><YYYY-MM-DD_HH-MM-SS>.png`
pub fn signature_file_name(prefix: &str, at: NaiveDateTime) -> String {
    format!("{prefix}{}{PNG_EXTENSION}", at.format(STAMP_FORMAT))
}

/// Hands out signature file names, never the same one twice per process.
///
/// Two saves inside the same second get `-2`, `-3`, ... appended to the
/// stamp instead of overwriting the earlier file.
#[derive(Debug)]
pub struct SignatureNamer {
    prefix: String,
    last: Mutex<Option<(String, u32)>>,
}

impl SignatureNamer {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            last: Mutex::new(None),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn next(&self) -> String {
        self.next_at(Local::now().naive_local())
    }

    pub fn next_at(&self, at: NaiveDateTime) -> String {
        let stamp = at.format(STAMP_FORMAT).to_string();
        let Ok(mut last) = self.last.lock() else {
            return signature_file_name(&self.prefix, at);
        };
        let counter = match last.as_ref() {
            Some((previous, count)) if *previous == stamp => count + 1,
            _ => 1,
        };
        *last = Some((stamp.clone(), counter));
        if counter == 1 {
            format!("{}{stamp}{PNG_EXTENSION}", self.prefix)
        } else {
            format!("{}{stamp}-{counter}{PNG_EXTENSION}", self.prefix)
        }
    }
}

/// True for entries that look like exported signatures.
pub fn is_png_name(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(PNG_EXTENSION)
}
