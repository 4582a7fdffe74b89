//! Pixel transformations applied during render.

use crate::color::Color;
use crate::error::{PipelineError, Result};
use crate::operation::{ConvolutionKernel, Fit, Operation, ResizeOptions};
use image::{DynamicImage, GenericImageView, RgbaImage};

/// Runs `steps` over `img` in order. `background` operations set the colour
/// used by later steps that fill new pixels (extend, contain, flatten).
pub fn apply_all(mut img: DynamicImage, steps: &[Operation]) -> Result<DynamicImage> {
    let mut background = Color::BLACK;
    for step in steps {
        log::trace!("applying {}", step.label());
        img = match step {
            Operation::Background(color) => {
                background = *color;
                img
            }
            Operation::Resize(options) => resize(img, options, background),
            Operation::Extract {
                left,
                top,
                width,
                height,
            } => extract(img, *left, *top, *width, *height)?,
            Operation::Extend {
                top,
                bottom,
                left,
                right,
            } => extend(&img, *top, *bottom, *left, *right, background)?,
            Operation::Rotate { angle } => rotate(img, *angle)?,
            Operation::Flip => img.flipv(),
            Operation::Flop => img.fliph(),
            Operation::Blur { sigma: Some(sigma) } => img.blur(*sigma),
            Operation::Blur { sigma: None } => img.filter3x3(&[1.0 / 9.0; 9]),
            Operation::Sharpen { sigma, threshold } => {
                img.unsharpen(sigma.unwrap_or(1.0), *threshold)
            }
            Operation::Gamma { gamma } => {
                let exponent = 1.0 / gamma;
                map_rgb(img, |c| c.map(|v| 255.0 * (v / 255.0).powf(exponent)))
            }
            Operation::Grayscale => img.grayscale(),
            Operation::Negate => map_rgb(img, |c| c.map(|v| 255.0 - v)),
            Operation::Linear { a, b } => map_rgb(img, |c| c.map(|v| v * a + b)),
            Operation::Threshold { value, grayscale } => threshold(img, *value, *grayscale),
            Operation::Modulate {
                brightness,
                saturation,
                hue,
            } => modulate(img, *brightness, *saturation, *hue),
            Operation::Normalise => normalise(img),
            Operation::Tint(color) => tint(img, *color),
            Operation::Convolve(kernel) => convolve(&img, kernel),
            Operation::Recomb(matrix) => map_rgb(img, |c| {
                let mut out = [0.0; 3];
                for (row, value) in matrix.iter().zip(out.iter_mut()) {
                    *value = row[0] * c[0] + row[1] * c[1] + row[2] * c[2];
                }
                out
            }),
            Operation::Flatten => flatten(img, background),
            Operation::RemoveAlpha if img.color().has_alpha() => {
                DynamicImage::ImageRgb8(img.to_rgb8())
            }
            Operation::EnsureAlpha if !img.color().has_alpha() => {
                DynamicImage::ImageRgba8(img.to_rgba8())
            }
            Operation::RemoveAlpha | Operation::EnsureAlpha => img,
            Operation::LimitInputPixels(_)
            | Operation::Format(_)
            | Operation::Encoder(_)
            | Operation::KeepMetadata => img,
        };
    }
    Ok(img)
}

fn scaled(length: u32, numerator: u32, denominator: u32) -> u32 {
    ((length as f64 * numerator as f64 / denominator as f64).round() as u32).max(1)
}

pub fn resize(img: DynamicImage, options: &ResizeOptions, background: Color) -> DynamicImage {
    let (width, height) = img.dimensions();
    let (target_w, target_h) = match (options.width, options.height) {
        (None, None) => return img,
        (Some(w), None) => (w, scaled(height, w, width)),
        (None, Some(h)) => (scaled(width, h, height), h),
        (Some(w), Some(h)) => (w, h),
    };

    if options.without_enlargement && width <= target_w && height <= target_h {
        return img;
    }

    let filter = options.kernel.filter_type();
    if options.width.is_none() || options.height.is_none() {
        return img.resize_exact(target_w, target_h, filter);
    }

    match options.fit {
        Fit::Fill => img.resize_exact(target_w, target_h, filter),
        Fit::Inside => img.resize(target_w, target_h, filter),
        Fit::Cover => img.resize_to_fill(target_w, target_h, filter),
        Fit::Outside => {
            let scale = f64::max(
                target_w as f64 / width as f64,
                target_h as f64 / height as f64,
            );
            let w = ((width as f64 * scale).round() as u32).max(1);
            let h = ((height as f64 * scale).round() as u32).max(1);
            img.resize_exact(w, h, filter)
        }
        Fit::Contain => {
            let fitted = img.resize(target_w, target_h, filter);
            let x = (target_w - fitted.width()) / 2;
            let y = (target_h - fitted.height()) / 2;
            embed(&fitted, target_w, target_h, x, y, background)
        }
    }
}

fn extract(img: DynamicImage, left: u32, top: u32, width: u32, height: u32) -> Result<DynamicImage> {
    let (w, h) = img.dimensions();
    let fits = left.checked_add(width).is_some_and(|r| r <= w)
        && top.checked_add(height).is_some_and(|b| b <= h);
    if !fits {
        return Err(PipelineError::invalid_operation(
            "extract",
            format!(
                "area {}x{} at ({}, {}) lies outside the {}x{} image",
                width, height, left, top, w, h
            ),
        ));
    }
    Ok(img.crop_imm(left, top, width, height))
}

fn extend(
    img: &DynamicImage,
    top: u32,
    bottom: u32,
    left: u32,
    right: u32,
    background: Color,
) -> Result<DynamicImage> {
    let width = img.width().checked_add(left).and_then(|w| w.checked_add(right));
    let height = img.height().checked_add(top).and_then(|h| h.checked_add(bottom));
    match (width, height) {
        (Some(width), Some(height)) => Ok(embed(img, width, height, left, top, background)),
        _ => Err(PipelineError::invalid_operation(
            "extend",
            format!(
                "padding {},{},{},{} overflows the {}x{} image",
                top,
                right,
                bottom,
                left,
                img.width(),
                img.height()
            ),
        )),
    }
}

/// Places `img` at (`x`, `y`) on a `width`x`height` canvas filled with `background`.
fn embed(img: &DynamicImage, width: u32, height: u32, x: u32, y: u32, background: Color) -> DynamicImage {
    let mut canvas = RgbaImage::from_pixel(width, height, background.to_rgba());
    image::imageops::replace(&mut canvas, &img.to_rgba8(), x as i64, y as i64);
    let canvas = DynamicImage::ImageRgba8(canvas);
    if img.color().has_alpha() || background.a < 255 {
        canvas
    } else {
        DynamicImage::ImageRgb8(canvas.to_rgb8())
    }
}

fn rotate(img: DynamicImage, angle: i32) -> Result<DynamicImage> {
    match angle.rem_euclid(360) {
        0 => Ok(img),
        90 => Ok(img.rotate90()),
        180 => Ok(img.rotate180()),
        270 => Ok(img.rotate270()),
        _ => Err(PipelineError::invalid_operation(
            "rotate",
            format!("angle must be a multiple of 90, got {}", angle),
        )),
    }
}

/// Applies `f` to the RGB channels of every pixel, keeping alpha as is.
fn map_rgb(img: DynamicImage, f: impl Fn([f32; 3]) -> [f32; 3]) -> DynamicImage {
    let had_alpha = img.color().has_alpha();
    let mut rgba = img.into_rgba8();
    for pixel in rgba.pixels_mut() {
        let [r, g, b, a] = pixel.0;
        let [r, g, b] = f([r as f32, g as f32, b as f32]);
        pixel.0 = [clamp(r), clamp(g), clamp(b), a];
    }
    restore_alpha(rgba, had_alpha)
}

fn restore_alpha(rgba: RgbaImage, had_alpha: bool) -> DynamicImage {
    let img = DynamicImage::ImageRgba8(rgba);
    if had_alpha {
        img
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
    }
}

fn clamp(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

fn luma(c: [f32; 3]) -> f32 {
    0.2126 * c[0] + 0.7152 * c[1] + 0.0722 * c[2]
}

fn threshold(img: DynamicImage, value: u8, grayscale: bool) -> DynamicImage {
    let cut = value as f32;
    let binary = |v: f32| if v >= cut { 255.0 } else { 0.0 };
    if grayscale {
        map_rgb(img, |c| [binary(luma(c)); 3])
    } else {
        map_rgb(img, |c| c.map(binary))
    }
}

fn modulate(
    img: DynamicImage,
    brightness: Option<f32>,
    saturation: Option<f32>,
    hue: Option<i32>,
) -> DynamicImage {
    let img = if brightness.is_some() || saturation.is_some() {
        let brightness = brightness.unwrap_or(1.0);
        let saturation = saturation.unwrap_or(1.0);
        map_rgb(img, |c| {
            let c = c.map(|v| v * brightness);
            let l = luma(c);
            c.map(|v| l + (v - l) * saturation)
        })
    } else {
        img
    };
    match hue {
        Some(degrees) => img.huerotate(degrees),
        None => img,
    }
}

/// Stretches luminance to the full 0-255 range.
fn normalise(img: DynamicImage) -> DynamicImage {
    let rgba = img.to_rgba8();
    let (min, max) = rgba.pixels().fold((255.0f32, 0.0f32), |(lo, hi), p| {
        let l = luma([p[0] as f32, p[1] as f32, p[2] as f32]);
        (lo.min(l), hi.max(l))
    });
    if max - min < 1.0 {
        return img;
    }
    let scale = 255.0 / (max - min);
    map_rgb(img, |c| c.map(|v| (v - min) * scale))
}

fn tint(img: DynamicImage, color: Color) -> DynamicImage {
    let factors = [color.r, color.g, color.b].map(|v| v as f32 / 255.0);
    map_rgb(img, |c| {
        let l = luma(c);
        [l * factors[0], l * factors[1], l * factors[2]]
    })
}

fn convolve(img: &DynamicImage, kernel: &ConvolutionKernel) -> DynamicImage {
    let had_alpha = img.color().has_alpha();
    let source = img.to_rgba8();
    let (width, height) = source.dimensions();
    let (kw, kh) = (kernel.width() as i64, kernel.height() as i64);
    let (cx, cy) = (kw / 2, kh / 2);
    let mut output = RgbaImage::new(width, height);

    for y in 0..height as i64 {
        for x in 0..width as i64 {
            let mut sum = [0.0f32; 3];
            for ky in 0..kh {
                for kx in 0..kw {
                    let sx = (x + kx - cx).clamp(0, width as i64 - 1) as u32;
                    let sy = (y + ky - cy).clamp(0, height as i64 - 1) as u32;
                    let weight = kernel.values()[(ky * kw + kx) as usize];
                    let p = source.get_pixel(sx, sy);
                    for (channel, total) in sum.iter_mut().enumerate() {
                        *total += p[channel] as f32 * weight;
                    }
                }
            }
            let alpha = source.get_pixel(x as u32, y as u32)[3];
            let [r, g, b] = sum.map(|v| clamp(v / kernel.scale() + kernel.offset()));
            output.put_pixel(x as u32, y as u32, image::Rgba([r, g, b, alpha]));
        }
    }
    restore_alpha(output, had_alpha)
}

fn flatten(img: DynamicImage, background: Color) -> DynamicImage {
    if !img.color().has_alpha() {
        return img;
    }
    let bg = [background.r, background.g, background.b].map(|v| v as f32);
    let mut rgba = img.into_rgba8();
    for pixel in rgba.pixels_mut() {
        let [r, g, b, a] = pixel.0;
        let alpha = a as f32 / 255.0;
        let blend = |fg: u8, bg: f32| clamp(fg as f32 * alpha + bg * (1.0 - alpha));
        pixel.0 = [blend(r, bg[0]), blend(g, bg[1]), blend(b, bg[2]), 255];
    }
    DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(rgba).to_rgb8())
}
