//! Resolution of invocation-wide flags.
//!
//! Runs once, after every command segment has been parsed. It checks that
//! the input/output combination makes sense, picks the conversion mode and
//! prepends the global operations to the queue.

use crate::cli::GlobalArgs;
use crate::error::{PipelineError, Result};
use crate::formats::FormatChoice;
use crate::operation::{EncoderOptions, Operation};
use crate::queue::OperationQueue;
use crate::template::OutputTarget;

/// How the invocation reads and writes images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Files in, files out
    Batch(OutputTarget),
    /// stdin in, stdout out
    Stream,
}

/// Global operations implied by `global`, in the order they must run.
/// A concern without any of its flags contributes nothing.
pub fn global_operations(global: &GlobalArgs) -> Vec<Operation> {
    let mut operations = Vec::new();

    if let Some(limit) = global.limit_input_pixels {
        operations.push(Operation::LimitInputPixels(limit));
    }
    if let Some(FormatChoice::Output(format)) = global.format {
        operations.push(Operation::Format(format));
    }
    let encoder = EncoderOptions {
        quality: global.quality,
        progressive: global.progressive,
        compression_level: global.compression_level,
        effort: global.effort,
    };
    if !encoder.is_empty() {
        operations.push(Operation::Encoder(encoder));
    }
    if global.with_metadata {
        operations.push(Operation::KeepMetadata);
    }

    operations
}

/// Validates inputs against `--output`, then unshifts the global
/// operations so the queue reads `[globals] ++ [commands]`.
///
/// `input_count` is the number of files the inputs expanded to.
pub fn resolve_global_options(
    global: &GlobalArgs,
    input_count: usize,
    stdin_is_terminal: bool,
    queue: &mut OperationQueue,
) -> Result<Mode> {
    let has_inputs = !global.input.is_empty();
    let mode = match (has_inputs, global.output.as_deref()) {
        (false, None) if stdin_is_terminal => return Err(PipelineError::MissingInput),
        (false, None) => Mode::Stream,
        (false, Some(_)) if stdin_is_terminal => return Err(PipelineError::MissingInput),
        (false, Some(_)) => return Err(PipelineError::OutputWithoutInput),
        (true, None) => return Err(PipelineError::MissingOutput),
        (true, Some(spec)) => {
            let target = OutputTarget::parse(spec)?;
            if input_count > 1 {
                if let OutputTarget::File(path) = &target {
                    return Err(PipelineError::AmbiguousOutput(input_count, path.clone()));
                }
            }
            Mode::Batch(target)
        }
    };

    for operation in global_operations(global).into_iter().rev() {
        queue.unshift(operation);
    }
    Ok(mode)
}
