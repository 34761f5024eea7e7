//! Live drawing surface, stroke recording and PNG rasterization.

pub mod rasterizer;
pub mod recorder;
pub mod surface;

pub use rasterizer::{DataUrlEncoder, DirectPngEncoder, PngEncoder, Rasterizer};
pub use recorder::{Capture, StrokeRecorder, StrokeSession};
pub use surface::{RasterSnapshot, SignatureCanvas, StrokeStyle};

use firma_types::FirmaError;

pub fn encoding_error(message: impl Into<String>) -> FirmaError {
    FirmaError::Encoding(message.into())
}
