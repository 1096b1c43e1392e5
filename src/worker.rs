use super::{errors::JobError, job::Job, pool::Shared};
use crossbeam::channel::{self, Receiver, Sender};
use std::{
    any::Any,
    io,
    panic::{self, AssertUnwindSafe},
    sync::{atomic::Ordering, Arc},
    thread::{self, JoinHandle},
};

/// A worker thread owned by the pool.
///
/// Dropping the stop sender raises the stop signal; joining the thread is the
/// stopped confirmation.
pub(crate) struct Worker {
    id: usize,
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    pub(crate) fn spawn<In, Out, E>(
        id: usize,
        shared: Arc<Shared<In, Out, E>>,
        builder: thread::Builder,
    ) -> io::Result<Worker>
    where
        In: Send + 'static,
        Out: Send + 'static,
        E: Send + 'static,
    {
        let (stop_tx, stop_rx) = channel::bounded::<()>(0);
        let thread = builder.spawn(move || worker_loop(id, &shared, &stop_rx))?;
        log::debug!("worker {} started", id);

        Ok(Worker {
            id,
            stop: Some(stop_tx),
            thread: Some(thread),
        })
    }

    #[inline]
    pub(crate) fn stop(&mut self) {
        self.stop.take();
    }

    /// Waits for the worker thread to exit. Must follow [`Worker::stop`].
    pub(crate) fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            match thread.join() {
                Ok(()) => log::debug!("worker {} stopped", self.id),
                Err(_) => log::warn!("worker {} terminated abnormally", self.id),
            }
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop();
        self.join();
    }
}

fn worker_loop<In, Out, E>(id: usize, shared: &Shared<In, Out, E>, stop: &Receiver<()>) {
    loop {
        // if both are ready the choice is random; a taken job always runs to completion
        channel::select! {
            recv(shared.intake) -> job => match job {
                Ok(job) => run_job(id, shared, job),
                Err(_) => break,
            },
            recv(stop) -> _ => break,
        }
    }
}

fn run_job<In, Out, E>(id: usize, shared: &Shared<In, Out, E>, job: Job<In, Out, E>) {
    let (input, slot) = job.into_parts();
    log::trace!("worker {} running job", id);

    let result = match panic::catch_unwind(AssertUnwindSafe(|| (shared.function)(input))) {
        Ok(Ok(output)) => {
            shared.completed.fetch_add(1, Ordering::Relaxed);
            Ok(output)
        }
        Ok(Err(err)) => {
            shared.failed.fetch_add(1, Ordering::Relaxed);
            Err(JobError::Failed(err))
        }
        Err(payload) => {
            shared.panicked.fetch_add(1, Ordering::Relaxed);
            let message = panic_message(payload.as_ref());
            log::warn!("worker {} recovered from panicking job: {}", id, message);
            Err(JobError::Panic(message))
        }
    };

    // decrement before delivery so a caller holding the result never sees it counted
    shared.queued.fetch_sub(1, Ordering::AcqRel);
    slot.deliver(result);
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_message_extracts_strings() {
        let payload = panic::catch_unwind(|| panic!("static message")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "static message");

        let payload = panic::catch_unwind(|| panic!("formatted {}", 42)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "formatted 42");

        let payload = panic::catch_unwind(|| std::panic::panic_any(7_u8)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
