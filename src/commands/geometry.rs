use super::{push_with_background, Enqueue};
use crate::color::Color;
use crate::error::{PipelineError, Result};
use crate::operation::{Fit, Operation, ResizeKernel, ResizeOptions};
use crate::queue::OperationQueue;
use clap::Args;

#[derive(Args, Debug, Clone, PartialEq)]
pub struct ResizeArgs {
    #[arg(help = "Target width in pixels, 0 or omitted to derive it from the height")]
    pub width: Option<u32>,

    #[arg(help = "Target height in pixels, omit to keep the aspect ratio")]
    pub height: Option<u32>,

    #[arg(
        long,
        value_enum,
        default_value_t = Fit::Cover,
        help = "How the image should fit both dimensions"
    )]
    pub fit: Fit,

    #[arg(
        long,
        value_enum,
        default_value_t = ResizeKernel::Lanczos3,
        help = "Interpolation kernel"
    )]
    pub kernel: ResizeKernel,

    #[arg(
        long,
        help = "Do not enlarge images smaller than the target",
        long_help = "Leave the image untouched when it is already smaller than \
                     the requested width and height."
    )]
    pub without_enlargement: bool,

    #[arg(long, help = "Background colour for --fit contain, e.g. '#ffffff'")]
    pub background: Option<Color>,
}

impl Enqueue for ResizeArgs {
    fn enqueue(&self, queue: &mut OperationQueue) -> Result<()> {
        let width = self.width.filter(|w| *w > 0);
        let height = self.height.filter(|h| *h > 0);
        if width.is_none() && height.is_none() {
            return Err(PipelineError::validation(
                "resize",
                "a non-zero width or height is required",
            ));
        }

        let options = ResizeOptions {
            width,
            height,
            fit: self.fit,
            kernel: self.kernel,
            without_enlargement: self.without_enlargement,
        };
        push_with_background(queue, self.background, Operation::Resize(options));
        Ok(())
    }
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct ExtractArgs {
    #[arg(help = "Zero-indexed offset from the left edge")]
    pub left: u32,

    #[arg(help = "Zero-indexed offset from the top edge")]
    pub top: u32,

    #[arg(help = "Width of the region to extract")]
    pub width: u32,

    #[arg(help = "Height of the region to extract")]
    pub height: u32,
}

impl Enqueue for ExtractArgs {
    fn enqueue(&self, queue: &mut OperationQueue) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(PipelineError::validation(
                "extract",
                format!("region must not be empty, got {}x{}", self.width, self.height),
            ));
        }
        queue.push(Operation::Extract {
            left: self.left,
            top: self.top,
            width: self.width,
            height: self.height,
        });
        Ok(())
    }
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct ExtendArgs {
    #[arg(
        required = true,
        num_args = 1..=4,
        value_name = "PIXELS",
        help = "Pixels to add: top [right] [bottom] [left]",
        long_help = "Pixels to add to each edge, in CSS shorthand order. One value \
                     applies to every edge, two are vertical then horizontal, three \
                     are top, horizontal then bottom, four are top, right, bottom, left."
    )]
    pub pixels: Vec<u32>,

    #[arg(long, help = "Colour of the added edges, e.g. 'white'")]
    pub background: Option<Color>,
}

impl ExtendArgs {
    /// Expands the shorthand into `(top, right, bottom, left)`.
    fn edges(&self) -> Result<(u32, u32, u32, u32)> {
        match *self.pixels.as_slice() {
            [all] => Ok((all, all, all, all)),
            [vertical, horizontal] => Ok((vertical, horizontal, vertical, horizontal)),
            [top, horizontal, bottom] => Ok((top, horizontal, bottom, horizontal)),
            [top, right, bottom, left] => Ok((top, right, bottom, left)),
            _ => Err(PipelineError::validation(
                "extend",
                format!("expected 1 to 4 values, got {}", self.pixels.len()),
            )),
        }
    }
}

impl Enqueue for ExtendArgs {
    fn enqueue(&self, queue: &mut OperationQueue) -> Result<()> {
        let (top, right, bottom, left) = self.edges()?;
        push_with_background(
            queue,
            self.background,
            Operation::Extend {
                top,
                bottom,
                left,
                right,
            },
        );
        Ok(())
    }
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct RotateArgs {
    #[arg(
        default_value_t = 0,
        allow_negative_numbers = true,
        help = "Angle in degrees, a multiple of 90 (negative turns anticlockwise)"
    )]
    pub angle: i32,

    #[arg(long, help = "Background colour, e.g. 'black'")]
    pub background: Option<Color>,
}

impl Enqueue for RotateArgs {
    fn enqueue(&self, queue: &mut OperationQueue) -> Result<()> {
        if self.angle % 90 != 0 {
            return Err(PipelineError::validation(
                "rotate",
                format!("angle must be a multiple of 90, got {}", self.angle),
            ));
        }
        push_with_background(queue, self.background, Operation::Rotate { angle: self.angle });
        Ok(())
    }
}
