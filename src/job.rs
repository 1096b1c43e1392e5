use super::errors::JobResult;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use tokio::sync::{mpsc, oneshot};

/// One unit of work on its way from a submitter to a worker.
pub(crate) struct Job<In, Out, E> {
    input: In,
    reply: Reply<Out, E>,
}

enum Reply<Out, E> {
    Single(oneshot::Sender<JobResult<Out, E>>),
    Batch {
        sender: mpsc::Sender<JobResult<Out, E>>,
        remaining: Arc<AtomicUsize>,
    },
}

impl<In, Out, E> Job<In, Out, E> {
    pub(crate) fn single(input: In, sender: oneshot::Sender<JobResult<Out, E>>) -> Self {
        Self {
            input,
            reply: Reply::Single(sender),
        }
    }

    /// `sender` must have room for every job of the batch, so delivery never waits.
    pub(crate) fn batched(
        input: In,
        sender: mpsc::Sender<JobResult<Out, E>>,
        remaining: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            input,
            reply: Reply::Batch { sender, remaining },
        }
    }

    /// Splits the input from the reply slot so the input can be moved into the user function.
    pub(crate) fn into_parts(self) -> (In, ReplySlot<Out, E>) {
        (self.input, ReplySlot(self.reply))
    }
}

pub(crate) struct ReplySlot<Out, E>(Reply<Out, E>);

impl<Out, E> ReplySlot<Out, E> {
    /// Hands the result to whoever is waiting for it. A receiver that has gone
    /// away is not an error: the caller simply stopped caring.
    pub(crate) fn deliver(self, result: JobResult<Out, E>) {
        match self.0 {
            Reply::Single(sender) => {
                let _ = sender.send(result);
            }
            Reply::Batch { sender, remaining } => {
                let _ = sender.try_send(result);
                remaining.fetch_sub(1, Ordering::AcqRel);
                // dropping the last sender closes the batch stream
                drop(sender);
            }
        }
    }
}
