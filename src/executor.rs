//! Where a [`Future`](crate::Future) runs its continuation.
//!
//! Only the seam lives here. Thread pools and scheduling policy are left to
//! whoever implements [`Executor`].

/// A unit of work handed to an executor.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

pub trait Executor: Send + Sync {
    fn add(&self, job: Job);
}

/// Runs every job immediately on the thread that submits it.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    fn add(&self, job: Job) {
        job()
    }
}
