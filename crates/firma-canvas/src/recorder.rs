use firma_types::{
    geometry::{CssSize, Point, PointerInput},
    FirmaError, Result,
};

use crate::surface::{RasterSnapshot, SignatureCanvas, StrokeStyle};

/// Per-widget drawing state.
#[derive(Debug, Clone, PartialEq)]
pub struct StrokeSession {
    pub dirty: bool,
    pub saved_since_last_draw: bool,
    pub drawing: bool,
    pub last: Option<Point>,
    /// The "start here" prompt over the empty surface.
    pub prompt_visible: bool,
    /// Bumped whenever the ink on screen stops matching an earlier capture.
    pub generation: u64,
}

impl Default for StrokeSession {
    fn default() -> Self {
        Self {
            dirty: false,
            saved_since_last_draw: false,
            drawing: false,
            last: None,
            prompt_visible: true,
            generation: 0,
        }
    }
}

impl StrokeSession {
    /// Ink exists that nobody has saved yet.
    pub fn has_unsaved_ink(&self) -> bool {
        self.dirty && !self.saved_since_last_draw
    }

    fn reset(&mut self) {
        self.dirty = false;
        self.saved_since_last_draw = false;
        self.drawing = false;
        self.last = None;
        self.prompt_visible = true;
        self.generation += 1;
    }
}

/// Raster captured for a save request, tagged with the session generation it
/// was taken from.
#[derive(Debug, Clone)]
pub struct Capture {
    pub snapshot: RasterSnapshot,
    pub generation: u64,
}

/// Turns pointer positions into ink on the live canvas.
#[derive(Debug, Clone)]
pub struct StrokeRecorder {
    canvas: SignatureCanvas,
    session: StrokeSession,
    style: StrokeStyle,
    origin: Point,
}

impl StrokeRecorder {
    pub fn new(canvas: SignatureCanvas, style: StrokeStyle) -> Self {
        Self {
            canvas,
            session: StrokeSession::default(),
            style,
            origin: Point::default(),
        }
    }

    pub fn session(&self) -> &StrokeSession {
        &self.session
    }

    pub fn canvas(&self) -> &SignatureCanvas {
        &self.canvas
    }

    pub fn canvas_mut(&mut self) -> &mut SignatureCanvas {
        &mut self.canvas
    }

    /// Client position of the surface's top-left corner.
    pub fn set_origin(&mut self, origin: Point) {
        self.origin = origin;
    }

    /// Surface-relative position for any input source.
    pub fn resolve(&self, input: &PointerInput) -> Option<Point> {
        input
            .client_position()
            .map(|client| client.offset_from(self.origin))
    }

    pub fn begin(&mut self, position: Point) {
        self.session.last = Some(position);
        self.session.drawing = true;
        self.session.dirty = true;
        self.session.saved_since_last_draw = false;
        self.session.prompt_visible = false;
        self.session.generation += 1;
    }

    /// Returns false when no stroke is active.
    pub fn extend(&mut self, position: Point) -> bool {
        if !self.session.drawing {
            return false;
        }
        let from = self.session.last.unwrap_or(position);
        self.canvas.draw_segment(from, position, &self.style);
        self.session.last = Some(position);
        self.session.generation += 1;
        true
    }

    /// Returns false when no stroke was active.
    pub fn end(&mut self) -> bool {
        std::mem::replace(&mut self.session.drawing, false)
    }

    pub fn clear(&mut self) {
        self.canvas.clear();
        self.session.reset();
    }

    /// Called once a capture has been persisted.
    pub fn mark_saved(&mut self) {
        self.session.saved_since_last_draw = true;
        self.clear();
    }

    pub fn resize(&mut self, css: CssSize, device_pixel_ratio: f32) {
        self.canvas.resize(css, device_pixel_ratio);
        self.session.reset();
    }

    pub fn capture(&self) -> Result<Capture> {
        if !self.session.dirty {
            return Err(FirmaError::NothingToSave);
        }
        Ok(Capture {
            snapshot: self.canvas.snapshot(),
            generation: self.session.generation,
        })
    }
}
