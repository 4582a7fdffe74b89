//! Deferred pipeline steps.
//!
//! An [`Operation`] is plain data: what to do and with which parameters.
//! Command handlers and the global option resolver build them, the
//! [`OperationQueue`](crate::queue::OperationQueue) orders them, and an
//! engine [`Handle`](crate::engine::Handle) interprets them. Nothing here
//! touches pixels.

use crate::color::Color;
use crate::error::{PipelineError, Result};
use crate::formats::OutputFormat;
use clap::ValueEnum;
use image::imageops::FilterType;

/// How the image should fit both provided dimensions of a resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Fit {
    /// Crop to cover both dimensions, keeping aspect ratio
    #[default]
    Cover,
    /// Letterbox into both dimensions using the background colour
    Contain,
    /// Stretch to both dimensions, ignoring aspect ratio
    Fill,
    /// Largest size that fits inside both dimensions
    Inside,
    /// Smallest size that covers both dimensions
    Outside,
}

/// Interpolation kernel used when resizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ResizeKernel {
    Nearest,
    Linear,
    Cubic,
    Gaussian,
    #[default]
    Lanczos3,
}

impl ResizeKernel {
    pub fn filter_type(self) -> FilterType {
        match self {
            ResizeKernel::Nearest => FilterType::Nearest,
            ResizeKernel::Linear => FilterType::Triangle,
            ResizeKernel::Cubic => FilterType::CatmullRom,
            ResizeKernel::Gaussian => FilterType::Gaussian,
            ResizeKernel::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ResizeOptions {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fit: Fit,
    pub kernel: ResizeKernel,
    pub without_enlargement: bool,
}

/// Encoder tuning shared by every output format. Each encoder reads the
/// fields it understands and ignores the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EncoderOptions {
    pub quality: Option<u8>,
    pub progressive: bool,
    pub compression_level: Option<u8>,
    pub effort: Option<u8>,
}

impl EncoderOptions {
    pub fn is_empty(&self) -> bool {
        *self == EncoderOptions::default()
    }
}

/// A convolution kernel whose value count always matches its dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvolutionKernel {
    width: u32,
    height: u32,
    values: Vec<f32>,
    scale: f32,
    offset: f32,
}

impl ConvolutionKernel {
    pub fn new(
        width: u32,
        height: u32,
        values: Vec<f32>,
        scale: Option<f32>,
        offset: f32,
    ) -> Result<Self> {
        for (name, size) in [("width", width), ("height", height)] {
            if size < 3 || size % 2 == 0 {
                return Err(PipelineError::validation(
                    "convolve",
                    format!("kernel {} must be an odd number of at least 3, got {}", name, size),
                ));
            }
        }
        let expected = (width as usize).checked_mul(height as usize).ok_or_else(|| {
            PipelineError::validation(
                "convolve",
                format!("a {}x{} kernel is too large", width, height),
            )
        })?;
        if values.len() != expected {
            return Err(PipelineError::validation(
                "convolve",
                format!(
                    "a {}x{} kernel needs {} values, got {}",
                    width,
                    height,
                    expected,
                    values.len()
                ),
            ));
        }
        // Default scale is the kernel sum, or 1 for zero-sum kernels (edge detection).
        let scale = scale.unwrap_or_else(|| {
            let sum: f32 = values.iter().sum();
            if sum == 0.0 {
                1.0
            } else {
                sum
            }
        });
        if scale == 0.0 {
            return Err(PipelineError::validation("convolve", "scale must not be zero"));
        }
        Ok(Self {
            width,
            height,
            values,
            scale,
            offset,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn offset(&self) -> f32 {
        self.offset
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    // Cross-cutting concerns, unshifted by the global option resolver.
    LimitInputPixels(u64),
    Format(OutputFormat),
    Encoder(EncoderOptions),
    KeepMetadata,

    // Transformations, pushed by command handlers.
    Background(Color),
    Resize(ResizeOptions),
    Extract {
        left: u32,
        top: u32,
        width: u32,
        height: u32,
    },
    Extend {
        top: u32,
        bottom: u32,
        left: u32,
        right: u32,
    },
    Rotate {
        angle: i32,
    },
    Flip,
    Flop,
    Blur {
        sigma: Option<f32>,
    },
    Sharpen {
        sigma: Option<f32>,
        threshold: i32,
    },
    Gamma {
        gamma: f32,
    },
    Grayscale,
    Negate,
    Linear {
        a: f32,
        b: f32,
    },
    Threshold {
        value: u8,
        grayscale: bool,
    },
    Modulate {
        brightness: Option<f32>,
        saturation: Option<f32>,
        hue: Option<i32>,
    },
    Normalise,
    Tint(Color),
    Convolve(ConvolutionKernel),
    Recomb([[f32; 3]; 3]),
    Flatten,
    RemoveAlpha,
    EnsureAlpha,
}

impl Operation {
    /// Stable identifier used in logs and tests.
    pub fn label(&self) -> &'static str {
        match self {
            Operation::LimitInputPixels(_) => "limit-input-pixels",
            Operation::Format(_) => "format",
            Operation::Encoder(_) => "encoder",
            Operation::KeepMetadata => "keep-metadata",
            Operation::Background(_) => "background",
            Operation::Resize(_) => "resize",
            Operation::Extract { .. } => "extract",
            Operation::Extend { .. } => "extend",
            Operation::Rotate { .. } => "rotate",
            Operation::Flip => "flip",
            Operation::Flop => "flop",
            Operation::Blur { .. } => "blur",
            Operation::Sharpen { .. } => "sharpen",
            Operation::Gamma { .. } => "gamma",
            Operation::Grayscale => "grayscale",
            Operation::Negate => "negate",
            Operation::Linear { .. } => "linear",
            Operation::Threshold { .. } => "threshold",
            Operation::Modulate { .. } => "modulate",
            Operation::Normalise => "normalise",
            Operation::Tint(_) => "tint",
            Operation::Convolve(_) => "convolve",
            Operation::Recomb(_) => "recomb",
            Operation::Flatten => "flatten",
            Operation::RemoveAlpha => "remove-alpha",
            Operation::EnsureAlpha => "ensure-alpha",
        }
    }
}
