//! Stroke files: a JSON array of strokes, each an array of `{"x", "y"}`
//! points in css pixels relative to the drawing surface.

use std::path::Path;

use anyhow::{Context, Result};
use firma_kiosk::Kiosk;
use firma_types::geometry::{Point, PointerInput};

pub type Stroke = Vec<Point>;

pub async fn load(path: &Path) -> Result<Vec<Stroke>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("cannot read strokes from {}", path.display()))?;
    parse(&raw).with_context(|| format!("malformed stroke file {}", path.display()))
}

pub fn parse(raw: &str) -> Result<Vec<Stroke>> {
    Ok(serde_json::from_str(raw)?)
}

/// Feeds every stroke through the pointer surface as down, moves, up.
pub fn draw(kiosk: &Kiosk, strokes: &[Stroke]) -> Result<()> {
    for stroke in strokes {
        let Some((first, rest)) = stroke.split_first() else {
            continue;
        };
        kiosk.on_pointer_down(&PointerInput::Pointer { client: *first })?;
        for point in rest {
            kiosk.on_pointer_move(&PointerInput::Pointer { client: *point })?;
        }
        kiosk.on_pointer_up()?;
    }
    Ok(())
}
