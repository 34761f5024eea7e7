use serde::{Deserialize, Serialize};

/// Position in css pixels, relative to whatever origin the caller uses.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn offset_from(self, origin: Point) -> Point {
        Point::new(self.x - origin.x, self.y - origin.y)
    }
}

/// Visible size of the drawing surface in css pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CssSize {
    pub width: f32,
    pub height: f32,
}

impl CssSize {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Raw input as delivered by the platform, before position resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum PointerInput {
    Pointer { client: Point },
    Mouse { client: Point },
    Touch { touches: Vec<Point>, changed: Vec<Point> },
}

impl PointerInput {
    /// Client coordinates of the contact this event refers to: the first
    /// active touch, then the first changed touch, then the pointer itself.
    pub fn client_position(&self) -> Option<Point> {
        match self {
            PointerInput::Pointer { client } | PointerInput::Mouse { client } => Some(*client),
            PointerInput::Touch { touches, changed } => {
                touches.first().or_else(|| changed.first()).copied()
            }
        }
    }
}
