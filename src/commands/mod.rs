//! Transformation verbs.
//!
//! Each verb declares its flags as a clap `Args` struct and turns them into
//! zero or more queued [`Operation`]s. Handlers validate everything before
//! pushing, so a rejected command never leaves a partial step behind.

mod alpha;
mod filter;
mod geometry;
mod tone;

pub use alpha::FlattenArgs;
pub use filter::{BlurArgs, ConvolveArgs, SharpenArgs};
pub use geometry::{ExtendArgs, ExtractArgs, ResizeArgs, RotateArgs};
pub use tone::{GammaArgs, LinearArgs, ModulateArgs, RecombArgs, ThresholdArgs, TintArgs};

use crate::error::Result;
use crate::operation::Operation;
use crate::queue::OperationQueue;
use clap::Subcommand;

/// Turns parsed command arguments into queued operations.
pub trait Enqueue {
    fn enqueue(&self, queue: &mut OperationQueue) -> Result<()>;
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    #[command(about = "Resize to a width and/or height")]
    Resize(ResizeArgs),

    #[command(about = "Extract (crop) a region of the image")]
    Extract(ExtractArgs),

    #[command(about = "Extend the edges with the background colour")]
    Extend(ExtendArgs),

    #[command(about = "Rotate by a multiple of 90 degrees")]
    Rotate(RotateArgs),

    #[command(about = "Mirror vertically (about the x axis)")]
    Flip,

    #[command(about = "Mirror horizontally (about the y axis)")]
    Flop,

    #[command(about = "Gaussian blur, or a fast box blur without a sigma")]
    Blur(BlurArgs),

    #[command(about = "Sharpen with an unsharp mask")]
    Sharpen(SharpenArgs),

    #[command(about = "Apply a gamma correction")]
    Gamma(GammaArgs),

    #[command(about = "Convert to 8-bit greyscale", visible_alias = "greyscale")]
    Grayscale,

    #[command(about = "Produce the negative of the image")]
    Negate,

    #[command(about = "Apply the linear formula a * input + b")]
    Linear(LinearArgs),

    #[command(about = "Make every pixel black or white around a threshold")]
    Threshold(ThresholdArgs),

    #[command(about = "Change brightness, saturation and hue")]
    Modulate(ModulateArgs),

    #[command(about = "Stretch luminance to cover the full range", visible_alias = "normalize")]
    Normalise,

    #[command(about = "Tint the image using a colour")]
    Tint(TintArgs),

    #[command(about = "Convolve with a custom kernel")]
    Convolve(ConvolveArgs),

    #[command(about = "Recombine channels with a 3x3 matrix")]
    Recomb(RecombArgs),

    #[command(about = "Merge the alpha channel onto the background colour")]
    Flatten(FlattenArgs),

    #[command(about = "Remove the alpha channel, if any")]
    RemoveAlpha,

    #[command(about = "Add a fully opaque alpha channel, if missing")]
    EnsureAlpha,
}

impl Enqueue for Command {
    fn enqueue(&self, queue: &mut OperationQueue) -> Result<()> {
        match self {
            Command::Resize(args) => args.enqueue(queue),
            Command::Extract(args) => args.enqueue(queue),
            Command::Extend(args) => args.enqueue(queue),
            Command::Rotate(args) => args.enqueue(queue),
            Command::Flip => push(queue, Operation::Flip),
            Command::Flop => push(queue, Operation::Flop),
            Command::Blur(args) => args.enqueue(queue),
            Command::Sharpen(args) => args.enqueue(queue),
            Command::Gamma(args) => args.enqueue(queue),
            Command::Grayscale => push(queue, Operation::Grayscale),
            Command::Negate => push(queue, Operation::Negate),
            Command::Linear(args) => args.enqueue(queue),
            Command::Threshold(args) => args.enqueue(queue),
            Command::Modulate(args) => args.enqueue(queue),
            Command::Normalise => push(queue, Operation::Normalise),
            Command::Tint(args) => args.enqueue(queue),
            Command::Convolve(args) => args.enqueue(queue),
            Command::Recomb(args) => args.enqueue(queue),
            Command::Flatten(args) => args.enqueue(queue),
            Command::RemoveAlpha => push(queue, Operation::RemoveAlpha),
            Command::EnsureAlpha => push(queue, Operation::EnsureAlpha),
        }
    }
}

fn push(queue: &mut OperationQueue, operation: Operation) -> Result<()> {
    queue.push(operation);
    Ok(())
}

/// Pushes `background` ahead of the operation that consumes it, but only
/// when the user supplied one.
fn push_with_background(
    queue: &mut OperationQueue,
    background: Option<crate::color::Color>,
    operation: Operation,
) {
    if let Some(color) = background {
        queue.push(Operation::Background(color));
    }
    queue.push(operation);
}
