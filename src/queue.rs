//! The per-invocation operation queue.
//!
//! Command handlers `push` onto the tail while argv is being parsed; the
//! global option resolver `unshift`s onto the head once parsing is done.
//! The two ends live in separate lists so the final order never depends on
//! when the resolver runs relative to the handlers:
//!
//! ```text
//! [global ops, resolver order] ++ [command ops, argv order]
//! ```

use crate::engine::Handle;
use crate::error::Result;
use crate::operation::Operation;
use std::collections::VecDeque;

#[derive(Debug, Default)]
pub struct OperationQueue {
    head: VecDeque<Operation>,
    tail: Vec<Operation>,
}

impl OperationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an operation.
    pub fn push(&mut self, operation: Operation) -> &mut Self {
        log::debug!("queue: push {}", operation.label());
        self.tail.push(operation);
        self
    }

    /// Prepends an operation; it runs before everything queued so far.
    pub fn unshift(&mut self, operation: Operation) -> &mut Self {
        log::debug!("queue: unshift {}", operation.label());
        self.head.push_front(operation);
        self
    }

    /// Replays every queued operation onto `handle`, in order, and leaves
    /// the queue empty. Each operation receives the handle returned by the
    /// previous one.
    pub fn drain<H: Handle>(&mut self, handle: H) -> Result<H> {
        self.take_plan().replay(handle)
    }

    /// Empties the queue without replaying anything.
    pub fn reset(&mut self) {
        self.head.clear();
        self.tail.clear();
    }

    /// Captures the queued operations into a replayable [`Plan`] and
    /// empties the queue.
    pub fn take_plan(&mut self) -> Plan {
        let mut operations: Vec<Operation> = self.head.drain(..).collect();
        operations.append(&mut self.tail);
        Plan { operations }
    }

    pub fn len(&self) -> usize {
        self.head.len() + self.tail.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Operation> {
        self.head.iter().chain(self.tail.iter())
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.iter().map(Operation::label).collect()
    }
}

/// An immutable snapshot of a drained queue.
///
/// Replaying borrows the plan, so one plan can be applied to any number of
/// fresh handles, including from several threads at once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plan {
    operations: Vec<Operation>,
}

impl Plan {
    pub fn replay<H: Handle>(&self, handle: H) -> Result<H> {
        self.operations
            .iter()
            .try_fold(handle, |handle, operation| handle.apply(operation))
    }

    /// The output format requested by a `format` operation, if any. The
    /// last one wins, matching replay semantics.
    pub fn output_format(&self) -> Option<crate::formats::OutputFormat> {
        self.operations.iter().rev().find_map(|op| match op {
            Operation::Format(format) => Some(*format),
            _ => None,
        })
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.operations.iter().map(Operation::label).collect()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
