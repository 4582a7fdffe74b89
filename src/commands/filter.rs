use super::Enqueue;
use crate::error::{PipelineError, Result};
use crate::operation::{ConvolutionKernel, Operation};
use crate::queue::OperationQueue;
use clap::Args;

const MIN_BLUR_SIGMA: f32 = 0.3;
const MAX_BLUR_SIGMA: f32 = 1000.0;
const MIN_SHARPEN_SIGMA: f32 = 0.01;

#[derive(Args, Debug, Clone, PartialEq)]
pub struct BlurArgs {
    #[arg(
        help = "Gaussian sigma (0.3-1000)",
        long_help = "Sigma of the Gaussian mask, between 0.3 and 1000. \
                     Without a sigma a fast 3x3 box blur is applied."
    )]
    pub sigma: Option<f32>,
}

impl Enqueue for BlurArgs {
    fn enqueue(&self, queue: &mut OperationQueue) -> Result<()> {
        if let Some(sigma) = self.sigma {
            if !(MIN_BLUR_SIGMA..=MAX_BLUR_SIGMA).contains(&sigma) {
                return Err(PipelineError::validation(
                    "blur",
                    format!(
                        "sigma must be between {} and {}, got {}",
                        MIN_BLUR_SIGMA, MAX_BLUR_SIGMA, sigma
                    ),
                ));
            }
        }
        queue.push(Operation::Blur { sigma: self.sigma });
        Ok(())
    }
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct SharpenArgs {
    #[arg(help = "Sigma of the unsharp mask, omit for a mild default")]
    pub sigma: Option<f32>,

    #[arg(
        long,
        default_value_t = 0,
        help = "Minimum brightness difference to sharpen (0-255)"
    )]
    pub threshold: i32,
}

impl Enqueue for SharpenArgs {
    fn enqueue(&self, queue: &mut OperationQueue) -> Result<()> {
        if let Some(sigma) = self.sigma {
            if !sigma.is_finite() || sigma < MIN_SHARPEN_SIGMA {
                return Err(PipelineError::validation(
                    "sharpen",
                    format!(
                        "sigma must be a finite number of at least {}, got {}",
                        MIN_SHARPEN_SIGMA, sigma
                    ),
                ));
            }
        }
        if !(0..=255).contains(&self.threshold) {
            return Err(PipelineError::validation(
                "sharpen",
                format!("threshold must be between 0 and 255, got {}", self.threshold),
            ));
        }
        queue.push(Operation::Sharpen {
            sigma: self.sigma,
            threshold: self.threshold,
        });
        Ok(())
    }
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct ConvolveArgs {
    #[arg(help = "Kernel width, an odd number of at least 3")]
    pub width: u32,

    #[arg(help = "Kernel height, an odd number of at least 3")]
    pub height: u32,

    #[arg(
        required = true,
        num_args = 1..,
        allow_negative_numbers = true,
        help = "Kernel values in row-major order (width * height of them)"
    )]
    pub kernel: Vec<f32>,

    #[arg(long, help = "Divisor applied to each sum, defaults to the kernel sum")]
    pub scale: Option<f32>,

    #[arg(
        long,
        default_value_t = 0.0,
        allow_negative_numbers = true,
        help = "Offset added after scaling"
    )]
    pub offset: f32,
}

impl Enqueue for ConvolveArgs {
    fn enqueue(&self, queue: &mut OperationQueue) -> Result<()> {
        let kernel = ConvolutionKernel::new(
            self.width,
            self.height,
            self.kernel.clone(),
            self.scale,
            self.offset,
        )?;
        queue.push(Operation::Convolve(kernel));
        Ok(())
    }
}
