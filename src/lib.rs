pub mod app;
pub mod cli;
pub mod color;
pub mod commands;
pub mod constants;
pub mod convert;
pub mod engine;
pub mod error;
pub mod formats;
pub mod logger;
pub mod operation;
pub mod options;
pub mod queue;
pub mod template;

pub use cli::{parse_invocation, split_segments, Cli, GlobalArgs, Invocation};
pub use color::Color;
pub use commands::{Command, Enqueue};
pub use convert::{collect_inputs, convert_files, convert_stream, is_image_file, ConversionResult};
pub use engine::{Handle, ImageHandle, RenderInfo};
pub use error::{PipelineError, Result};
pub use formats::{FormatChoice, OutputFormat};
pub use operation::{ConvolutionKernel, EncoderOptions, Fit, Operation, ResizeKernel, ResizeOptions};
pub use options::{global_operations, resolve_global_options, Mode};
pub use queue::{OperationQueue, Plan};
pub use template::{normalize_separators, OutputTarget, PathTemplate, SourceParts};
