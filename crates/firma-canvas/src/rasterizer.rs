use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use firma_types::{
    config::OutputConfig,
    image::{RenderMode, SignatureImage, PNG_MIME},
    Result,
};
use image::{
    codecs::png::PngEncoder as PngWriter,
    imageops::{self, FilterType},
    ColorType, ImageEncoder, Rgba, RgbaImage,
};
use tracing::{debug, warn};

use crate::{encoding_error, recorder::Capture, surface::RasterSnapshot};

/// One way of turning a composed raster into PNG bytes.
///
/// `Ok(None)` means the path produced no data; `Err` means it blew up.
/// Either way the rasterizer moves on to the next encoder.
pub trait PngEncoder: Send + Sync {
    fn name(&self) -> &'static str;
    fn encode(&self, surface: &RasterSnapshot) -> Result<Option<Vec<u8>>>;
}

/// Blob-style export straight from the pixel buffer.
pub struct DirectPngEncoder;

impl PngEncoder for DirectPngEncoder {
    fn name(&self) -> &'static str {
        "blob"
    }

    fn encode(&self, surface: &RasterSnapshot) -> Result<Option<Vec<u8>>> {
        if surface.blob_unsupported {
            return Ok(None);
        }
        write_png(&surface.pixels).map(Some)
    }
}

/// Exports a `data:` URL and decodes its base64 payload back into bytes.
pub struct DataUrlEncoder;

impl DataUrlEncoder {
    pub fn to_data_url(surface: &RasterSnapshot) -> Result<String> {
        let png = write_png(&surface.pixels)?;
        Ok(format!("data:{PNG_MIME};base64,{}", STANDARD.encode(png)))
    }

    pub fn decode_data_url(url: &str) -> Result<Vec<u8>> {
        let (_, payload) = url
            .split_once(',')
            .ok_or_else(|| encoding_error("data URL without payload"))?;
        STANDARD
            .decode(payload)
            .map_err(|err| encoding_error(format!("invalid base64 payload: {err}")))
    }
}

impl PngEncoder for DataUrlEncoder {
    fn name(&self) -> &'static str {
        "data-url"
    }

    fn encode(&self, surface: &RasterSnapshot) -> Result<Option<Vec<u8>>> {
        let url = Self::to_data_url(surface)?;
        let bytes = Self::decode_data_url(&url)?;
        Ok((!bytes.is_empty()).then_some(bytes))
    }
}

/// Produces the fixed-size PNG for a capture.
pub struct Rasterizer {
    width: u32,
    height: u32,
    background: Option<RgbaImage>,
    encoders: Vec<Box<dyn PngEncoder>>,
}

impl Rasterizer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            background: None,
            encoders: vec![Box::new(DirectPngEncoder), Box::new(DataUrlEncoder)],
        }
    }

    /// A background that cannot be loaded is skipped; stamped output then
    /// carries the white fill and the ink only.
    pub fn from_config(config: &OutputConfig) -> Self {
        let mut rasterizer = Self::new(config.width, config.height);
        if let Some(path) = &config.background {
            match load_background(Path::new(path)) {
                Ok(image) => rasterizer.background = Some(image),
                Err(err) => warn!("Background artwork {path} unavailable: {err}"),
            }
        }
        rasterizer
    }

    pub fn with_background(mut self, background: RgbaImage) -> Self {
        self.background = Some(background);
        self
    }

    pub fn with_encoders(mut self, encoders: Vec<Box<dyn PngEncoder>>) -> Self {
        self.encoders = encoders;
        self
    }

    pub fn output_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn render(&self, capture: &Capture, mode: RenderMode) -> Result<SignatureImage> {
        let composed = self.compose(&capture.snapshot, mode);
        let bytes = self.encode(&composed)?;
        Ok(SignatureImage::new(self.width, self.height, mode, bytes))
    }

    fn compose(&self, snapshot: &RasterSnapshot, mode: RenderMode) -> RasterSnapshot {
        let ink = imageops::resize(&snapshot.pixels, self.width, self.height, FilterType::Triangle);
        let pixels = match mode {
            RenderMode::SignatureOnly => ink,
            RenderMode::Stamped => {
                let mut out =
                    RgbaImage::from_pixel(self.width, self.height, Rgba([255, 255, 255, 255]));
                if let Some(background) = &self.background {
                    let art =
                        imageops::resize(background, self.width, self.height, FilterType::Triangle);
                    imageops::overlay(&mut out, &art, 0, 0);
                }
                imageops::overlay(&mut out, &ink, 0, 0);
                out
            }
        };
        RasterSnapshot {
            pixels,
            blob_unsupported: snapshot.blob_unsupported,
        }
    }

    fn encode(&self, composed: &RasterSnapshot) -> Result<Vec<u8>> {
        let mut last_failure = String::from("no encoder produced data");
        for encoder in &self.encoders {
            match encoder.encode(composed) {
                Ok(Some(bytes)) if !bytes.is_empty() => {
                    debug!("PNG encoded via {} ({} bytes)", encoder.name(), bytes.len());
                    return Ok(bytes);
                }
                Ok(_) => {
                    debug!("Encoder {} returned no data", encoder.name());
                    last_failure = format!("{} returned no data", encoder.name());
                }
                Err(err) => {
                    warn!("Encoder {} failed: {err}", encoder.name());
                    last_failure = format!("{} failed: {err}", encoder.name());
                }
            }
        }
        Err(encoding_error(last_failure))
    }
}

fn write_png(pixels: &RgbaImage) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let (width, height) = pixels.dimensions();
    PngWriter::new(&mut buffer)
        .write_image(pixels.as_raw(), width, height, ColorType::Rgba8)
        .map_err(|err| encoding_error(format!("PNG write failed: {err}")))?;
    Ok(buffer)
}

fn load_background(path: &Path) -> Result<RgbaImage> {
    let image = image::open(path)
        .map_err(|err| encoding_error(format!("cannot decode {}: {err}", path.display())))?;
    Ok(image.to_rgba8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        recorder::StrokeRecorder,
        surface::{SignatureCanvas, StrokeStyle},
    };
    use firma_types::{geometry::CssSize, geometry::Point, FirmaError};
    use image::ImageFormat;

    fn capture_from(css: CssSize, ratio: f32) -> Capture {
        let mut rec =
            StrokeRecorder::new(SignatureCanvas::new(css, ratio), StrokeStyle::default());
        rec.begin(Point::new(5.0, 5.0));
        rec.extend(Point::new(css.width - 5.0, css.height - 5.0));
        rec.end();
        rec.capture().expect("capture")
    }

    fn decode(bytes: &[u8]) -> RgbaImage {
        image::load_from_memory_with_format(bytes, ImageFormat::Png)
            .expect("decode png")
            .to_rgba8()
    }

    struct Refusing;

    impl PngEncoder for Refusing {
        fn name(&self) -> &'static str {
            "refusing"
        }

        fn encode(&self, _surface: &RasterSnapshot) -> Result<Option<Vec<u8>>> {
            Err(encoding_error("tainted"))
        }
    }

    #[test]
    fn output_has_fixed_dimensions_for_any_canvas() {
        let rasterizer = Rasterizer::new(108, 192);
        for (css, ratio) in [
            (CssSize::new(40.0, 30.0), 1.0),
            (CssSize::new(540.0, 960.0), 2.0),
            (CssSize::new(333.0, 77.0), 1.5),
        ] {
            let image = rasterizer
                .render(&capture_from(css, ratio), RenderMode::SignatureOnly)
                .expect("render");
            assert_eq!((image.width, image.height), (108, 192));
            assert_eq!(decode(&image.bytes).dimensions(), (108, 192));
        }
    }

    #[test]
    fn signature_only_keeps_transparency() {
        let rasterizer = Rasterizer::new(60, 60);
        let image = rasterizer
            .render(&capture_from(CssSize::new(60.0, 60.0), 1.0), RenderMode::SignatureOnly)
            .expect("render");
        let decoded = decode(&image.bytes);
        assert_eq!(decoded.get_pixel(59, 0).0[3], 0);
        assert!(decoded.pixels().any(|p| p.0[3] == 255));
    }

    #[test]
    fn stamped_is_opaque_with_background() {
        let art = RgbaImage::from_pixel(10, 10, Rgba([200, 0, 0, 255]));
        let rasterizer = Rasterizer::new(60, 60).with_background(art);
        let image = rasterizer
            .render(&capture_from(CssSize::new(60.0, 60.0), 1.0), RenderMode::Stamped)
            .expect("render");
        let decoded = decode(&image.bytes);
        assert!(decoded.pixels().all(|p| p.0[3] == 255));
        assert_eq!(decoded.get_pixel(59, 0).0, [200, 0, 0, 255]);
    }

    #[test]
    fn stamped_without_artwork_is_white() {
        let rasterizer = Rasterizer::new(60, 60);
        let image = rasterizer
            .render(&capture_from(CssSize::new(60.0, 60.0), 1.0), RenderMode::Stamped)
            .expect("render");
        assert_eq!(decode(&image.bytes).get_pixel(59, 0).0, [255, 255, 255, 255]);
    }

    #[test]
    fn falls_back_to_data_url_when_blob_export_is_refused() {
        let mut capture = capture_from(CssSize::new(30.0, 30.0), 1.0);
        capture.snapshot.blob_unsupported = true;
        let image = Rasterizer::new(30, 30)
            .render(&capture, RenderMode::SignatureOnly)
            .expect("data url fallback");
        assert_eq!(decode(&image.bytes).dimensions(), (30, 30));
    }

    #[test]
    fn reports_encoding_failure_when_every_path_fails() {
        let rasterizer =
            Rasterizer::new(30, 30).with_encoders(vec![Box::new(Refusing), Box::new(Refusing)]);
        let err = rasterizer
            .render(&capture_from(CssSize::new(30.0, 30.0), 1.0), RenderMode::SignatureOnly)
            .expect_err("must fail");
        assert!(matches!(err, FirmaError::Encoding(_)));
    }

    #[test]
    fn data_url_round_trips() {
        let capture = capture_from(CssSize::new(20.0, 20.0), 1.0);
        let url = DataUrlEncoder::to_data_url(&capture.snapshot).expect("data url");
        assert!(url.starts_with("data:image/png;base64,"));
        let bytes = DataUrlEncoder::decode_data_url(&url).expect("decode");
        assert_eq!(decode(&bytes), capture.snapshot.pixels);
        assert!(DataUrlEncoder::decode_data_url("garbage").is_err());
    }

    #[test]
    fn missing_background_file_is_skipped() {
        let config = OutputConfig {
            width: 20,
            height: 20,
            background: Some("/definitely/not/here.png".into()),
            ..OutputConfig::default()
        };
        let rasterizer = Rasterizer::from_config(&config);
        assert!(rasterizer.background.is_none());
        assert_eq!(rasterizer.output_size(), (20, 20));
    }
}
