use super::Enqueue;
use crate::color::Color;
use crate::error::{PipelineError, Result};
use crate::operation::Operation;
use crate::queue::OperationQueue;
use clap::Args;

const MIN_GAMMA: f32 = 1.0;
const MAX_GAMMA: f32 = 3.0;

#[derive(Args, Debug, Clone, PartialEq)]
pub struct GammaArgs {
    #[arg(default_value_t = 2.2, help = "Gamma value between 1.0 and 3.0")]
    pub gamma: f32,
}

impl Enqueue for GammaArgs {
    fn enqueue(&self, queue: &mut OperationQueue) -> Result<()> {
        if !(MIN_GAMMA..=MAX_GAMMA).contains(&self.gamma) {
            return Err(PipelineError::validation(
                "gamma",
                format!(
                    "gamma must be between {} and {}, got {}",
                    MIN_GAMMA, MAX_GAMMA, self.gamma
                ),
            ));
        }
        queue.push(Operation::Gamma { gamma: self.gamma });
        Ok(())
    }
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct LinearArgs {
    #[arg(default_value_t = 1.0, allow_negative_numbers = true, help = "Multiplier")]
    pub a: f32,

    #[arg(default_value_t = 0.0, allow_negative_numbers = true, help = "Offset")]
    pub b: f32,
}

impl Enqueue for LinearArgs {
    fn enqueue(&self, queue: &mut OperationQueue) -> Result<()> {
        queue.push(Operation::Linear {
            a: self.a,
            b: self.b,
        });
        Ok(())
    }
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct ThresholdArgs {
    #[arg(default_value_t = 128, help = "Threshold value (0-255)")]
    pub value: u8,

    #[arg(
        long = "color",
        help = "Threshold each colour channel instead of converting to greyscale"
    )]
    pub keep_color: bool,
}

impl Enqueue for ThresholdArgs {
    fn enqueue(&self, queue: &mut OperationQueue) -> Result<()> {
        queue.push(Operation::Threshold {
            value: self.value,
            grayscale: !self.keep_color,
        });
        Ok(())
    }
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct ModulateArgs {
    #[arg(long, help = "Brightness multiplier, 1.0 leaves it unchanged")]
    pub brightness: Option<f32>,

    #[arg(long, help = "Saturation multiplier, 0 removes all colour")]
    pub saturation: Option<f32>,

    #[arg(long, allow_negative_numbers = true, help = "Hue rotation in degrees")]
    pub hue: Option<i32>,
}

impl Enqueue for ModulateArgs {
    fn enqueue(&self, queue: &mut OperationQueue) -> Result<()> {
        if self.brightness.is_none() && self.saturation.is_none() && self.hue.is_none() {
            log::debug!("modulate: no adjustment given, nothing queued");
            return Ok(());
        }
        if let Some(brightness) = self.brightness {
            if brightness <= 0.0 {
                return Err(PipelineError::validation(
                    "modulate",
                    format!("brightness must be positive, got {}", brightness),
                ));
            }
        }
        if let Some(saturation) = self.saturation {
            if saturation < 0.0 {
                return Err(PipelineError::validation(
                    "modulate",
                    format!("saturation must not be negative, got {}", saturation),
                ));
            }
        }
        queue.push(Operation::Modulate {
            brightness: self.brightness,
            saturation: self.saturation,
            hue: self.hue,
        });
        Ok(())
    }
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct TintArgs {
    #[arg(help = "Tint colour, e.g. '#ff8800' or 'rgb(255, 136, 0)'")]
    pub color: Color,
}

impl Enqueue for TintArgs {
    fn enqueue(&self, queue: &mut OperationQueue) -> Result<()> {
        queue.push(Operation::Tint(self.color));
        Ok(())
    }
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct RecombArgs {
    #[arg(
        required = true,
        num_args = 1..,
        allow_negative_numbers = true,
        value_name = "VALUE",
        help = "3x3 matrix in row-major order (9 values)"
    )]
    pub matrix: Vec<f32>,
}

impl Enqueue for RecombArgs {
    fn enqueue(&self, queue: &mut OperationQueue) -> Result<()> {
        let values: [f32; 9] = self.matrix.as_slice().try_into().map_err(|_| {
            PipelineError::validation(
                "recomb",
                format!("matrix needs exactly 9 values, got {}", self.matrix.len()),
            )
        })?;
        let matrix = [
            [values[0], values[1], values[2]],
            [values[3], values[4], values[5]],
            [values[6], values[7], values[8]],
        ];
        queue.push(Operation::Recomb(matrix));
        Ok(())
    }
}
