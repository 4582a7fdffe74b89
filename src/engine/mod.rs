//! The processing engine behind the pipeline.
//!
//! - [`Handle`]: anything an [`Operation`] can be replayed onto
//! - [`ImageHandle`]: the real, `image`-backed handle. Applying an operation
//!   only records it; decoding, transforming and encoding happen in
//!   [`ImageHandle::render`], like a lazy pipeline.
//! - [`RenderInfo`]: what a render produced
//!
//! Pixel work lives in `transform`, encoder selection in `encode`, and
//! EXIF/ICC carry-over in `metadata`.

mod encode;
mod metadata;
pub mod transform;

use crate::constants::DEFAULT_LIMIT_INPUT_PIXELS;
use crate::error::{PipelineError, Result};
use crate::formats::OutputFormat;
use crate::operation::{EncoderOptions, Operation};
use image::{DynamicImage, ImageReader};
use std::borrow::Cow;
use std::fmt;
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

/// A processing object that queued operations are replayed onto.
///
/// `apply` consumes the handle and returns the one the next operation
/// should receive, so implementations may wrap or replace themselves.
pub trait Handle: Sized {
    fn apply(self, operation: &Operation) -> Result<Self>;
}

/// Metadata about one rendered image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderInfo {
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub size: u64,
}

impl fmt::Display for RenderInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}x{} {} channels, {} bytes",
            self.format, self.width, self.height, self.channels, self.size
        )
    }
}

#[derive(Debug, Clone)]
enum Source {
    File(PathBuf),
    Buffer(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq)]
struct RenderSettings {
    format: Option<OutputFormat>,
    encoder: EncoderOptions,
    limit_input_pixels: u64,
    keep_metadata: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            format: None,
            encoder: EncoderOptions::default(),
            limit_input_pixels: DEFAULT_LIMIT_INPUT_PIXELS,
            keep_metadata: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImageHandle {
    source: Source,
    settings: RenderSettings,
    steps: Vec<Operation>,
}

impl ImageHandle {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self::new(Source::File(path.into()))
    }

    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self::new(Source::Buffer(data))
    }

    fn new(source: Source) -> Self {
        Self {
            source,
            settings: RenderSettings::default(),
            steps: Vec::new(),
        }
    }

    /// Transformations recorded so far, in application order.
    pub fn steps(&self) -> &[Operation] {
        &self.steps
    }

    pub fn output_format(&self) -> Option<OutputFormat> {
        self.settings.format
    }

    fn read_source(&self) -> Result<Cow<'_, [u8]>> {
        match &self.source {
            Source::File(path) => {
                if !path.exists() {
                    return Err(PipelineError::FileNotFound(path.clone()));
                }
                Ok(Cow::Owned(fs::read(path)?))
            }
            Source::Buffer(data) => Ok(Cow::Borrowed(data)),
        }
    }

    /// Decodes the source, runs every recorded step and encodes the result.
    ///
    /// The output format is, in order of preference: a `format` operation,
    /// `fallback` (usually derived from the destination extension), then the
    /// format the input was decoded from.
    pub fn render(&self, fallback: Option<OutputFormat>) -> Result<(Vec<u8>, RenderInfo)> {
        let data = self.read_source()?;

        let reader = ImageReader::new(Cursor::new(&data[..])).with_guessed_format()?;
        let input_format = reader.format();
        let (width, height) = reader.into_dimensions()?;
        self.check_pixel_limit(width, height)?;

        let img = ImageReader::new(Cursor::new(&data[..]))
            .with_guessed_format()?
            .decode()?;
        log::debug!(
            "decoded {}x{} {:?} image, applying {} step(s)",
            width,
            height,
            input_format,
            self.steps.len()
        );

        let img: DynamicImage = transform::apply_all(img, &self.steps)?;

        let format = self
            .settings
            .format
            .or(fallback)
            .or_else(|| input_format.and_then(OutputFormat::from_image_format))
            .ok_or_else(|| {
                PipelineError::UnsupportedFormat(format!(
                    "cannot infer an output format from input {:?}; pass --format",
                    input_format
                ))
            })?;

        let (mut bytes, channels) = encode::encode(&img, format, &self.settings.encoder)?;
        if self.settings.keep_metadata {
            bytes = metadata::copy_metadata(&data, bytes)?;
        }

        let info = RenderInfo {
            format,
            width: img.width(),
            height: img.height(),
            channels,
            size: bytes.len() as u64,
        };
        Ok((bytes, info))
    }

    /// Renders to `destination`, inferring the format from its extension
    /// when no `format` operation was applied. The parent directory must
    /// already exist.
    pub fn render_to_file(&self, destination: &Path) -> Result<RenderInfo> {
        let (bytes, info) = self.render(OutputFormat::from_path(destination))?;
        fs::write(destination, &bytes)?;
        Ok(info)
    }

    pub fn render_to_writer<W: Write>(&self, mut writer: W) -> Result<RenderInfo> {
        let (bytes, info) = self.render(None)?;
        writer.write_all(&bytes)?;
        writer.flush()?;
        Ok(info)
    }

    fn check_pixel_limit(&self, width: u32, height: u32) -> Result<()> {
        let limit = self.settings.limit_input_pixels;
        let pixels = width as u64 * height as u64;
        if limit > 0 && pixels > limit {
            return Err(PipelineError::InputTooLarge {
                width,
                height,
                pixels,
                limit,
            });
        }
        Ok(())
    }
}

impl Handle for ImageHandle {
    fn apply(mut self, operation: &Operation) -> Result<Self> {
        match operation {
            Operation::LimitInputPixels(limit) => self.settings.limit_input_pixels = *limit,
            Operation::Format(format) => self.settings.format = Some(*format),
            Operation::Encoder(options) => {
                let current = &mut self.settings.encoder;
                current.quality = options.quality.or(current.quality);
                current.compression_level = options.compression_level.or(current.compression_level);
                current.effort = options.effort.or(current.effort);
                current.progressive |= options.progressive;
            }
            Operation::KeepMetadata => self.settings.keep_metadata = true,
            Operation::Rotate { angle } if angle.rem_euclid(90) != 0 => {
                return Err(PipelineError::invalid_operation(
                    "rotate",
                    format!("angle must be a multiple of 90, got {}", angle),
                ));
            }
            Operation::Extract { width, height, .. } if *width == 0 || *height == 0 => {
                return Err(PipelineError::invalid_operation(
                    "extract",
                    "width and height must be greater than zero",
                ));
            }
            step => self.steps.push(step.clone()),
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::ResizeOptions;
    use image::{GenericImageView, RgbImage, RgbaImage};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, image::Rgb([200, 10, 10])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_apply_records_transformations_in_order() {
        let handle = ImageHandle::from_bytes(Vec::new())
            .apply(&Operation::Flip)
            .unwrap()
            .apply(&Operation::Negate)
            .unwrap();
        let labels: Vec<_> = handle.steps().iter().map(Operation::label).collect();
        assert_eq!(labels, vec!["flip", "negate"]);
    }

    #[test]
    fn test_apply_global_operations_update_settings_only() {
        let handle = ImageHandle::from_bytes(Vec::new())
            .apply(&Operation::Format(OutputFormat::WebP))
            .unwrap()
            .apply(&Operation::KeepMetadata)
            .unwrap();
        assert!(handle.steps().is_empty());
        assert_eq!(handle.output_format(), Some(OutputFormat::WebP));
        assert!(handle.settings.keep_metadata);
    }

    #[test]
    fn test_encoder_options_merge() {
        let handle = ImageHandle::from_bytes(Vec::new())
            .apply(&Operation::Encoder(EncoderOptions {
                quality: Some(50),
                progressive: true,
                ..Default::default()
            }))
            .unwrap()
            .apply(&Operation::Encoder(EncoderOptions {
                compression_level: Some(9),
                ..Default::default()
            }))
            .unwrap();
        let encoder = handle.settings.encoder;
        assert_eq!(encoder.quality, Some(50));
        assert_eq!(encoder.compression_level, Some(9));
        assert!(encoder.progressive);
    }

    #[test]
    fn test_rotate_rejects_arbitrary_angles() {
        let result = ImageHandle::from_bytes(Vec::new()).apply(&Operation::Rotate { angle: 45 });
        assert!(matches!(
            result,
            Err(PipelineError::InvalidOperation { operation: "rotate", .. })
        ));
        assert!(ImageHandle::from_bytes(Vec::new())
            .apply(&Operation::Rotate { angle: -90 })
            .is_ok());
    }

    #[test]
    fn test_render_keeps_input_format_by_default() {
        let handle = ImageHandle::from_bytes(png_bytes(8, 4))
            .apply(&Operation::Flop)
            .unwrap();
        let (bytes, info) = handle.render(None).unwrap();

        assert_eq!(info.format, OutputFormat::Png);
        assert_eq!((info.width, info.height), (8, 4));
        assert_eq!(info.size, bytes.len() as u64);
        assert_eq!(image::guess_format(&bytes).unwrap(), image::ImageFormat::Png);
    }

    #[test]
    fn test_render_format_operation_beats_fallback() {
        let handle = ImageHandle::from_bytes(png_bytes(4, 4))
            .apply(&Operation::Format(OutputFormat::Jpeg))
            .unwrap();
        let (bytes, info) = handle.render(Some(OutputFormat::Png)).unwrap();
        assert_eq!(info.format, OutputFormat::Jpeg);
        assert_eq!(image::guess_format(&bytes).unwrap(), image::ImageFormat::Jpeg);
    }

    #[test]
    fn test_render_applies_resize() {
        let handle = ImageHandle::from_bytes(png_bytes(40, 20))
            .apply(&Operation::Resize(ResizeOptions {
                width: Some(10),
                ..Default::default()
            }))
            .unwrap();
        let (bytes, info) = handle.render(None).unwrap();
        assert_eq!((info.width, info.height), (10, 5));

        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (10, 5));
    }

    #[test]
    fn test_render_enforces_pixel_limit() {
        let handle = ImageHandle::from_bytes(png_bytes(10, 10))
            .apply(&Operation::LimitInputPixels(99))
            .unwrap();
        assert!(matches!(
            handle.render(None),
            Err(PipelineError::InputTooLarge { pixels: 100, limit: 99, .. })
        ));

        let unlimited = ImageHandle::from_bytes(png_bytes(10, 10))
            .apply(&Operation::LimitInputPixels(0))
            .unwrap();
        assert!(unlimited.render(None).is_ok());
    }

    #[test]
    fn test_render_missing_file() {
        let handle = ImageHandle::from_path("definitely/not/here.png");
        assert!(matches!(
            handle.render(None),
            Err(PipelineError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_render_jpeg_drops_alpha() {
        let rgba = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, image::Rgba([1, 2, 3, 128])));
        let mut buf = Vec::new();
        rgba.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();

        let handle = ImageHandle::from_bytes(buf)
            .apply(&Operation::Format(OutputFormat::Jpeg))
            .unwrap();
        let (_, info) = handle.render(None).unwrap();
        assert_eq!(info.channels, 3);
    }

    #[test]
    fn test_render_to_writer() {
        let handle = ImageHandle::from_bytes(png_bytes(3, 3));
        let mut out = Vec::new();
        let info = handle.render_to_writer(&mut out).unwrap();
        assert_eq!(info.size, out.len() as u64);
    }
}
