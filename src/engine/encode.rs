use crate::constants::{
    DEFAULT_COMPRESSION_LEVEL, DEFAULT_EFFORT, DEFAULT_QUALITY, LIBDEFLATER_MAX_LEVEL,
    MAX_COMPRESSION_LEVEL, MAX_EFFORT, ZOPFLI_ITERATIONS,
};
use crate::error::{PipelineError, Result};
use crate::formats::OutputFormat;
use crate::operation::EncoderOptions;
use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPEncoder;
use image::{ColorType, DynamicImage};
use oxipng::{Deflaters, Interlacing, Options};
use std::io::Cursor;
use std::num::NonZeroU8;

/// Encodes `img` as `format`. Returns the encoded bytes and the number of
/// channels actually written.
pub fn encode(
    img: &DynamicImage,
    format: OutputFormat,
    options: &EncoderOptions,
) -> Result<(Vec<u8>, u8)> {
    let prepared = prepare(img, format);
    let channels = prepared.color().channel_count();
    let quality = options.quality.unwrap_or(DEFAULT_QUALITY);
    let mut buf = Vec::new();

    match format {
        OutputFormat::Jpeg => {
            if options.progressive {
                log::warn!("progressive JPEG is not available; writing baseline JPEG");
            }
            prepared.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality))?;
        }
        OutputFormat::Png => {
            prepared.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
            buf = optimize_png(buf, options)?;
        }
        OutputFormat::WebP => {
            if options.quality.is_some() {
                log::debug!("webp output is lossless; --quality has no effect");
            }
            prepared.write_with_encoder(WebPEncoder::new_lossless(&mut buf))?;
        }
        OutputFormat::Avif => {
            let effort = options.effort.unwrap_or(DEFAULT_EFFORT).min(MAX_EFFORT);
            // rav1e speed: 1 is slowest, 10 fastest
            let speed = 10 - effort;
            prepared.write_with_encoder(AvifEncoder::new_with_speed_quality(
                &mut buf, speed, quality,
            ))?;
        }
        OutputFormat::Gif | OutputFormat::Tiff | OutputFormat::Bmp => {
            prepared.write_to(&mut Cursor::new(&mut buf), format.to_image_format())?;
        }
    }

    Ok((buf, channels))
}

/// Converts to a pixel layout every encoder accepts: 8-bit, RGB(A), or
/// 8-bit grey for JPEG.
fn prepare(img: &DynamicImage, format: OutputFormat) -> DynamicImage {
    let has_alpha = img.color().has_alpha();
    match (format, img.color()) {
        (OutputFormat::Jpeg, ColorType::L8) => img.clone(),
        (OutputFormat::Jpeg, ColorType::L16 | ColorType::La8 | ColorType::La16) => {
            DynamicImage::ImageLuma8(img.to_luma8())
        }
        (OutputFormat::Jpeg, ColorType::Rgb8) => img.clone(),
        (OutputFormat::Jpeg, _) => DynamicImage::ImageRgb8(img.to_rgb8()),
        (_, ColorType::Rgb8 | ColorType::Rgba8) => img.clone(),
        _ if format.supports_alpha() && has_alpha => DynamicImage::ImageRgba8(img.to_rgba8()),
        _ => DynamicImage::ImageRgb8(img.to_rgb8()),
    }
}

/// Re-compresses an encoded PNG with oxipng. Level 0 skips optimisation
/// unless interlacing was requested.
fn optimize_png(raw: Vec<u8>, options: &EncoderOptions) -> Result<Vec<u8>> {
    let level = options
        .compression_level
        .unwrap_or(DEFAULT_COMPRESSION_LEVEL)
        .min(MAX_COMPRESSION_LEVEL);
    if level == 0 && !options.progressive {
        return Ok(raw);
    }

    let mut oxipng_options = Options::from_preset(2);
    oxipng_options.force = true;
    oxipng_options.deflate = png_deflater(level);
    if options.progressive {
        oxipng_options.interlace = Some(Interlacing::Adam7);
    }

    oxipng::optimize_from_memory(&raw, &oxipng_options)
        .map_err(|e| PipelineError::PngOptimization(e.to_string()))
}

fn png_deflater(level: u8) -> Deflaters {
    if level >= MAX_COMPRESSION_LEVEL {
        Deflaters::Zopfli {
            iterations: NonZeroU8::new(ZOPFLI_ITERATIONS).unwrap_or(NonZeroU8::MIN),
        }
    } else {
        let scaled = level as u16 * LIBDEFLATER_MAX_LEVEL as u16 / MAX_COMPRESSION_LEVEL as u16;
        Deflaters::Libdeflater {
            compression: (scaled as u8).max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgb, RgbImage, RgbaImage};

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 7) as u8, (y * 5) as u8, ((x + y) * 3) as u8])
        }))
    }

    #[test]
    fn test_encode_each_format_decodes_back() {
        let img = gradient(16, 12);
        for format in [
            OutputFormat::Jpeg,
            OutputFormat::Png,
            OutputFormat::WebP,
            OutputFormat::Gif,
            OutputFormat::Tiff,
            OutputFormat::Bmp,
        ] {
            let (bytes, _) = encode(&img, format, &EncoderOptions::default()).unwrap();
            assert_eq!(
                image::guess_format(&bytes).unwrap(),
                format.to_image_format(),
                "format {}",
                format
            );
            let decoded = image::load_from_memory(&bytes).unwrap();
            assert_eq!(decoded.dimensions(), (16, 12));
        }
    }

    #[test]
    fn test_jpeg_quality_changes_size() {
        let img = gradient(64, 64);
        let low = EncoderOptions {
            quality: Some(10),
            ..Default::default()
        };
        let high = EncoderOptions {
            quality: Some(95),
            ..Default::default()
        };
        let (small, _) = encode(&img, OutputFormat::Jpeg, &low).unwrap();
        let (large, _) = encode(&img, OutputFormat::Jpeg, &high).unwrap();
        assert!(small.len() < large.len());
    }

    #[test]
    fn test_png_keeps_alpha_channel() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, image::Rgba([1, 2, 3, 4])));
        let (_, channels) = encode(&img, OutputFormat::Png, &EncoderOptions::default()).unwrap();
        assert_eq!(channels, 4);
    }

    #[test]
    fn test_png_level_zero_skips_oxipng() {
        let img = gradient(8, 8);
        let options = EncoderOptions {
            compression_level: Some(0),
            ..Default::default()
        };
        let (bytes, _) = encode(&img, OutputFormat::Png, &options).unwrap();
        let mut raw = Vec::new();
        img.write_to(&mut Cursor::new(&mut raw), image::ImageFormat::Png)
            .unwrap();
        assert_eq!(bytes, raw);
    }

    /// Interlace method byte of the IHDR chunk.
    fn png_interlace_method(png: &[u8]) -> u8 {
        png[28]
    }

    #[test]
    fn test_progressive_png_is_adam7_interlaced() {
        let img = gradient(16, 12);
        let progressive = EncoderOptions {
            progressive: true,
            ..Default::default()
        };
        let (interlaced, _) = encode(&img, OutputFormat::Png, &progressive).unwrap();
        assert_eq!(&interlaced[12..16], b"IHDR");
        assert_eq!(png_interlace_method(&interlaced), 1);
        assert_eq!(image::load_from_memory(&interlaced).unwrap().dimensions(), (16, 12));

        let (plain, _) = encode(&img, OutputFormat::Png, &EncoderOptions::default()).unwrap();
        assert_eq!(png_interlace_method(&plain), 0);
    }

    #[test]
    fn test_progressive_png_at_level_zero_still_interlaces() {
        let options = EncoderOptions {
            progressive: true,
            compression_level: Some(0),
            ..Default::default()
        };
        let (bytes, _) = encode(&gradient(8, 8), OutputFormat::Png, &options).unwrap();
        assert_eq!(png_interlace_method(&bytes), 1);
    }

    #[test]
    fn test_png_deflater_mapping() {
        assert!(matches!(png_deflater(9), Deflaters::Zopfli { .. }));
        assert!(matches!(png_deflater(6), Deflaters::Libdeflater { compression: 8 }));
        assert!(matches!(png_deflater(1), Deflaters::Libdeflater { compression: 1 }));
    }

    #[test]
    fn test_prepare_for_jpeg() {
        let rgba = DynamicImage::ImageRgba8(RgbaImage::new(2, 2));
        assert_eq!(prepare(&rgba, OutputFormat::Jpeg).color(), ColorType::Rgb8);
        let gray = DynamicImage::ImageLumaA8(image::GrayAlphaImage::new(2, 2));
        assert_eq!(prepare(&gray, OutputFormat::Jpeg).color(), ColorType::L8);
        assert_eq!(prepare(&gray, OutputFormat::Png).color(), ColorType::Rgba8);
    }
}
