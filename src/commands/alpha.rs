use super::{push_with_background, Enqueue};
use crate::color::Color;
use crate::error::Result;
use crate::operation::Operation;
use crate::queue::OperationQueue;
use clap::Args;

#[derive(Args, Debug, Clone, PartialEq)]
pub struct FlattenArgs {
    #[arg(long, help = "Colour to merge transparent pixels onto, default black")]
    pub background: Option<Color>,
}

impl Enqueue for FlattenArgs {
    fn enqueue(&self, queue: &mut OperationQueue) -> Result<()> {
        push_with_background(queue, self.background, Operation::Flatten);
        Ok(())
    }
}
