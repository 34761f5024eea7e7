use firma_types::{
    config::{parse_hex_color, CanvasConfig},
    geometry::{CssSize, Point},
    FirmaError, Result,
};
use image::{Rgba, RgbaImage};

const MAX_DEVICE_PIXEL_RATIO: f32 = 2.0;

/// Pen used for every segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeStyle {
    pub color: Rgba<u8>,
    /// Width in css pixels.
    pub width: f32,
}

impl StrokeStyle {
    pub fn from_config(config: &CanvasConfig) -> Result<Self> {
        let color = parse_hex_color(&config.stroke_color).ok_or_else(|| {
            FirmaError::Configuration(format!("invalid stroke color {}", config.stroke_color))
        })?;
        Ok(Self {
            color: Rgba(color),
            width: config.stroke_width,
        })
    }
}

impl Default for StrokeStyle {
    fn default() -> Self {
        Self {
            color: Rgba([0, 0, 0, 255]),
            width: 5.0,
        }
    }
}

/// Frozen copy of the live raster handed to the rasterizer.
#[derive(Debug, Clone)]
pub struct RasterSnapshot {
    pub pixels: RgbaImage,
    /// The platform's blob export refuses this surface; only the data URL
    /// path can read it.
    pub blob_unsupported: bool,
}

/// Live drawing surface: css-sized, backed by `css * device_pixel_ratio`
/// physical pixels.
#[derive(Debug, Clone)]
pub struct SignatureCanvas {
    css: CssSize,
    ratio: f32,
    pixels: RgbaImage,
    blob_unsupported: bool,
}

impl SignatureCanvas {
    pub fn new(css: CssSize, device_pixel_ratio: f32) -> Self {
        let ratio = clamp_ratio(device_pixel_ratio);
        let (width, height) = physical_size(css, ratio);
        Self {
            css,
            ratio,
            pixels: RgbaImage::new(width, height),
            blob_unsupported: false,
        }
    }

    pub fn from_config(config: &CanvasConfig) -> Self {
        Self::new(
            CssSize::new(config.width, config.height),
            config.device_pixel_ratio,
        )
    }

    pub fn css_size(&self) -> CssSize {
        self.css
    }

    pub fn device_pixel_ratio(&self) -> f32 {
        self.ratio
    }

    pub fn pixel_size(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// Reallocates the backing store; previous ink is discarded.
    pub fn resize(&mut self, css: CssSize, device_pixel_ratio: f32) {
        self.css = css;
        self.ratio = clamp_ratio(device_pixel_ratio);
        let (width, height) = physical_size(css, self.ratio);
        self.pixels = RgbaImage::new(width, height);
    }

    pub fn clear(&mut self) {
        for pixel in self.pixels.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 0]);
        }
    }

    pub fn set_blob_unsupported(&mut self, unsupported: bool) {
        self.blob_unsupported = unsupported;
    }

    pub fn has_ink(&self) -> bool {
        self.pixels.pixels().any(|p| p.0[3] > 0)
    }

    /// Strokes a straight segment with round caps; consecutive segments
    /// therefore meet with round joins.
    pub fn draw_segment(&mut self, from: Point, to: Point, style: &StrokeStyle) {
        let (width, height) = self.pixels.dimensions();
        if width == 0 || height == 0 {
            return;
        }
        let a = (from.x * self.ratio, from.y * self.ratio);
        let b = (to.x * self.ratio, to.y * self.ratio);
        let radius = (style.width * self.ratio / 2.0).max(0.5);
        let reach = radius + 1.0;

        let min_x = (a.0.min(b.0) - reach).floor().max(0.0) as u32;
        let min_y = (a.1.min(b.1) - reach).floor().max(0.0) as u32;
        let max_x = ((a.0.max(b.0) + reach).ceil().max(0.0) as u32).min(width - 1);
        let max_y = ((a.1.max(b.1) + reach).ceil().max(0.0) as u32).min(height - 1);
        if min_x > max_x || min_y > max_y {
            return;
        }

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let center = (x as f32 + 0.5, y as f32 + 0.5);
                let distance = distance_to_segment(center, a, b);
                let coverage = (radius + 0.5 - distance).clamp(0.0, 1.0);
                if coverage <= 0.0 {
                    continue;
                }
                let alpha = (coverage * style.color.0[3] as f32).round() as u8;
                let pixel = self.pixels.get_pixel_mut(x, y);
                if alpha > pixel.0[3] {
                    *pixel = Rgba([style.color.0[0], style.color.0[1], style.color.0[2], alpha]);
                }
            }
        }
    }

    pub fn snapshot(&self) -> RasterSnapshot {
        RasterSnapshot {
            pixels: self.pixels.clone(),
            blob_unsupported: self.blob_unsupported,
        }
    }

    /// Coarse ink map for low-resolution previews: `rows` x `cols` cells,
    /// true where any pixel of the cell carries ink.
    pub fn coverage(&self, cols: u16, rows: u16) -> Vec<Vec<bool>> {
        let (width, height) = self.pixels.dimensions();
        let mut grid = vec![vec![false; cols as usize]; rows as usize];
        if cols == 0 || rows == 0 || width == 0 || height == 0 {
            return grid;
        }
        for (x, y, pixel) in self.pixels.enumerate_pixels() {
            if pixel.0[3] == 0 {
                continue;
            }
            let col = (x as u64 * cols as u64 / width as u64) as usize;
            let row = (y as u64 * rows as u64 / height as u64) as usize;
            grid[row][col] = true;
        }
        grid
    }
}

fn clamp_ratio(ratio: f32) -> f32 {
    if ratio.is_finite() {
        ratio.clamp(1.0, MAX_DEVICE_PIXEL_RATIO)
    } else {
        1.0
    }
}

fn physical_size(css: CssSize, ratio: f32) -> (u32, u32) {
    let width = (css.width.max(0.0) * ratio).round() as u32;
    let height = (css.height.max(0.0) * ratio).round() as u32;
    (width.max(1), height.max(1))
}

fn distance_to_segment(p: (f32, f32), a: (f32, f32), b: (f32, f32)) -> f32 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let length_sq = dx * dx + dy * dy;
    let t = if length_sq == 0.0 {
        0.0
    } else {
        (((p.0 - a.0) * dx + (p.1 - a.1) * dy) / length_sq).clamp(0.0, 1.0)
    };
    let (cx, cy) = (a.0 + t * dx, a.1 + t * dy);
    ((p.0 - cx).powi(2) + (p.1 - cy).powi(2)).sqrt()
}
