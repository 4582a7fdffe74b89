/// Output format handling
///
/// Maps format names, file extensions and the `image` crate's `ImageFormat`
/// onto the set of formats the encoder side can write.
use crate::error::{PipelineError, Result};
use image::ImageFormat;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Formats the renderer can encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
    Avif,
    Gif,
    Tiff,
    Bmp,
}

impl OutputFormat {
    /// Returns the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::WebP => "webp",
            OutputFormat::Avif => "avif",
            OutputFormat::Gif => "gif",
            OutputFormat::Tiff => "tiff",
            OutputFormat::Bmp => "bmp",
        }
    }

    pub fn to_image_format(&self) -> ImageFormat {
        match self {
            OutputFormat::Jpeg => ImageFormat::Jpeg,
            OutputFormat::Png => ImageFormat::Png,
            OutputFormat::WebP => ImageFormat::WebP,
            OutputFormat::Avif => ImageFormat::Avif,
            OutputFormat::Gif => ImageFormat::Gif,
            OutputFormat::Tiff => ImageFormat::Tiff,
            OutputFormat::Bmp => ImageFormat::Bmp,
        }
    }

    pub fn from_image_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Jpeg => Some(OutputFormat::Jpeg),
            ImageFormat::Png => Some(OutputFormat::Png),
            ImageFormat::WebP => Some(OutputFormat::WebP),
            ImageFormat::Avif => Some(OutputFormat::Avif),
            ImageFormat::Gif => Some(OutputFormat::Gif),
            ImageFormat::Tiff => Some(OutputFormat::Tiff),
            ImageFormat::Bmp => Some(OutputFormat::Bmp),
            _ => None,
        }
    }

    /// Format implied by a file extension, `None` when the extension is
    /// missing or not one we can write.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_lowercase().as_str() {
            "jpg" | "jpeg" => Some(OutputFormat::Jpeg),
            "png" => Some(OutputFormat::Png),
            "webp" => Some(OutputFormat::WebP),
            "avif" => Some(OutputFormat::Avif),
            "gif" => Some(OutputFormat::Gif),
            "tif" | "tiff" => Some(OutputFormat::Tiff),
            "bmp" => Some(OutputFormat::Bmp),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Whether the encoder for this format keeps an alpha channel.
    pub fn supports_alpha(&self) -> bool {
        !matches!(self, OutputFormat::Jpeg)
    }

    /// Names accepted by `--format`, besides `input`
    pub fn format_names() -> Vec<&'static str> {
        vec!["jpeg", "png", "webp", "avif", "gif", "tiff", "bmp"]
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Png => "png",
            OutputFormat::WebP => "webp",
            OutputFormat::Avif => "avif",
            OutputFormat::Gif => "gif",
            OutputFormat::Tiff => "tiff",
            OutputFormat::Bmp => "bmp",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for OutputFormat {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "heic" | "heif" | "jxl" | "jpegxl" => Err(PipelineError::UnsupportedFormat(format!(
                "{} output is not supported. Use avif for modern compression",
                s
            ))),
            other => Self::from_extension(other).ok_or_else(|| {
                PipelineError::UnsupportedFormat(format!(
                    "{} (expected one of {})",
                    s,
                    Self::format_names().join(", ")
                ))
            }),
        }
    }
}

/// `--format` accepts every output format plus `input`, which keeps
/// whatever format the source was decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatChoice {
    Input,
    Output(OutputFormat),
}

impl FromStr for FormatChoice {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("input") {
            Ok(FormatChoice::Input)
        } else {
            s.parse().map(FormatChoice::Output)
        }
    }
}
