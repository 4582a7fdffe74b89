use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    Argument(String),

    #[error("Missing required argument: input (pipe an image on stdin or pass --input)")]
    MissingInput,

    #[error("Missing required argument: output (required when --input is given)")]
    MissingOutput,

    #[error("--output cannot be used when reading from stdin; the result is written to stdout")]
    OutputWithoutInput,

    #[error(
        "Ambiguous output: {0} inputs cannot all be written to the single file {1:?}. \
         Use a directory or a template such as '{{dir}}/{{name}}-out{{ext}}'"
    )]
    AmbiguousOutput(usize, PathBuf),

    #[error("No image files found in input path: {0}")]
    NoInputFilesFound(String),

    #[error("Invalid value for {command}: {message}")]
    Validation {
        command: &'static str,
        message: String,
    },

    #[error("Invalid output template {template:?}: {message}")]
    Template { template: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("PNG optimization error: {0}")]
    PngOptimization(String),

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Input image exceeds pixel limit: {width}x{height} = {pixels} pixels, maximum allowed {limit}")]
    InputTooLarge {
        width: u32,
        height: u32,
        pixels: u64,
        limit: u64,
    },

    #[error("Cannot apply {operation}: {message}")]
    InvalidOperation {
        operation: &'static str,
        message: String,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to create output directory: {0}")]
    DirectoryCreationFailed(PathBuf),

    #[error("Walkdir error: {0}")]
    WalkdirError(#[from] walkdir::Error),
}

impl PipelineError {
    pub fn validation(command: &'static str, message: impl Into<String>) -> Self {
        PipelineError::Validation {
            command,
            message: message.into(),
        }
    }

    pub fn invalid_operation(operation: &'static str, message: impl Into<String>) -> Self {
        PipelineError::InvalidOperation {
            operation,
            message: message.into(),
        }
    }

    /// Errors caused by how the tool was invoked, as opposed to failures
    /// while decoding, transforming or writing images. Only these get the
    /// `--help` hint when reported.
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            PipelineError::Argument(_)
                | PipelineError::MissingInput
                | PipelineError::MissingOutput
                | PipelineError::OutputWithoutInput
                | PipelineError::AmbiguousOutput(..)
                | PipelineError::NoInputFilesFound(_)
                | PipelineError::Validation { .. }
                | PipelineError::Template { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
