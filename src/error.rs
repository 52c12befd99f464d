use crate::ExceptionWrapper;

/// Everything that can go wrong with a promise.
///
/// The first six variants are reported synchronously to the caller that
/// misused a handle, except `BrokenPromise` which reaches the consumer
/// through the delivered [`Try`](crate::Try). `External` carries a failure
/// the producer chose to deliver.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PromiseError {
    #[error("Promise invalid")]
    Invalid,
    #[error("Promise already satisfied")]
    AlreadySatisfied,
    #[error("Future already retrieved")]
    FutureAlreadyRetrieved,
    #[error("Broken promise for type name `{0}`")]
    BrokenPromise(String),
    #[error("Interrupt handler already set")]
    InterruptHandlerAlreadySet,
    #[error("Continuation already attached")]
    ContinuationAlreadyAttached,
    #[error("{0}")]
    External(ExceptionWrapper),
}

impl PromiseError {
    pub(crate) fn broken<T>() -> Self {
        PromiseError::BrokenPromise(std::any::type_name::<T>().to_owned())
    }
}

/// Raised into a future by [`SemiFuture::cancel`](crate::SemiFuture::cancel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Future was cancelled")]
pub struct FutureCancelled;

/// Recovers the structured kind of a delivered failure. A wrapped
/// `PromiseError` comes back as itself, anything else as `External`.
impl From<ExceptionWrapper> for PromiseError {
    fn from(ew: ExceptionWrapper) -> Self {
        match ew.downcast_ref::<PromiseError>() {
            Some(error) => error.clone(),
            None => PromiseError::External(ew),
        }
    }
}

impl From<PromiseError> for ExceptionWrapper {
    fn from(error: PromiseError) -> Self {
        match error {
            PromiseError::External(ew) => ew,
            other => ExceptionWrapper::new(other),
        }
    }
}
