use crate::{
    executor::Executor,
    state::{Core, InterruptHandler},
    ExceptionWrapper, Future, PromiseError, SemiFuture, Try,
};
use std::sync::Arc;

/// The producer side. Fulfills its core at most once and hands out at most
/// one consumer.
///
/// Dropping a promise that was never fulfilled delivers a
/// [`PromiseError::BrokenPromise`] to the consumer.
///
/// # Examples
///
/// ```
/// use promise_core::Promise;
/// use futures::executor::block_on;
/// use std::thread;
///
/// let mut promise = Promise::<String>::new();
/// let future = promise.get_semi_future().unwrap();
///
/// let task1 = thread::spawn(move || block_on(async {
///     println!("Received {:?}", future.await);
/// }));
/// promise.set_value("Hi".into()).unwrap();
/// task1.join().expect("The task1 thread has panicked.");
/// ```
pub struct Promise<T: Send + 'static> {
    core: Option<Arc<Core<T>>>,
    retrieved: bool,
}

impl<T: Send + 'static> Promise<T> {
    pub fn new() -> Self {
        Promise {
            core: Some(Core::new()),
            retrieved: false,
        }
    }

    /// A promise with no core, the same as one that was moved out of with
    /// [`take`](Self::take). Every operation on it fails with
    /// [`PromiseError::Invalid`].
    pub fn make_empty() -> Self {
        Promise {
            core: None,
            retrieved: false,
        }
    }

    /// A fresh promise together with its consumer.
    pub fn contract() -> (Self, SemiFuture<T>) {
        let core = Core::new();
        let future = SemiFuture::new(Arc::clone(&core));
        (
            Promise {
                core: Some(core),
                retrieved: true,
            },
            future,
        )
    }

    /// Moves the core into a new promise, leaving this one empty.
    pub fn take(&mut self) -> Self {
        std::mem::replace(self, Self::make_empty())
    }

    /// Can be called once; afterwards, and after `get_future`, fails with
    /// [`PromiseError::FutureAlreadyRetrieved`].
    pub fn get_semi_future(&mut self) -> Result<SemiFuture<T>, PromiseError> {
        let core = Arc::clone(self.core()?);
        if self.retrieved {
            return Err(PromiseError::FutureAlreadyRetrieved);
        }
        self.retrieved = true;
        Ok(SemiFuture::new(core))
    }

    /// Like [`get_semi_future`](Self::get_semi_future), bound to an inline
    /// executor.
    pub fn get_future(&mut self) -> Result<Future<T>, PromiseError> {
        self.get_semi_future().map(Future::inline)
    }

    pub fn get_future_with(
        &mut self,
        executor: Arc<dyn Executor>,
    ) -> Result<Future<T>, PromiseError> {
        self.get_semi_future()
            .map(|semi| Future::new(semi, executor))
    }

    pub fn set_value(&self, value: T) -> Result<(), PromiseError> {
        self.set_try(Try::Value(value))
    }

    pub fn set_exception(&self, ew: ExceptionWrapper) -> Result<(), PromiseError> {
        self.set_try(Try::Exception(ew))
    }

    /// Fulfills with a concrete error, erasing its type.
    pub fn set_error<E>(&self, error: E) -> Result<(), PromiseError>
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.set_exception(ExceptionWrapper::new(error))
    }

    /// Any continuation already attached runs on this thread before the call
    /// returns.
    pub fn set_try(&self, t: Try<T>) -> Result<(), PromiseError> {
        self.core()?.set_result(t)
    }

    /// Fulfills with whatever `f` produces. A panic inside `f` is caught and
    /// delivered as a [`Panicked`](crate::Panicked) failure.
    ///
    /// ```
    /// use promise_core::Promise;
    ///
    /// let (promise, future) = Promise::<i32>::contract();
    /// promise.set_with(|| panic!("boom")).unwrap();
    /// assert_eq!(future.get().unwrap_err().to_string(), "boom");
    /// ```
    pub fn set_with<F>(&self, f: F) -> Result<(), PromiseError>
    where
        F: FnOnce() -> T,
    {
        let core = self.core()?;
        if core.is_fulfilled() {
            return Err(PromiseError::AlreadySatisfied);
        }
        core.set_result(Try::catching(f))
    }

    /// [`set_with`](Self::set_with) for fallible producers: `Err` is
    /// delivered as the failure.
    pub fn try_set_with<F, E>(&self, f: F) -> Result<(), PromiseError>
    where
        F: FnOnce() -> Result<T, E>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let core = self.core()?;
        if core.is_fulfilled() {
            return Err(PromiseError::AlreadySatisfied);
        }
        let t = match Try::catching(f) {
            Try::Value(result) => Try::from_result(result),
            Try::Exception(ew) => Try::Exception(ew),
        };
        core.set_result(t)
    }

    /// Installs the handler that receives the consumer's interrupt (see
    /// [`SemiFuture::raise`]). Only one handler may ever be installed; a
    /// second call fails with [`PromiseError::InterruptHandlerAlreadySet`]
    /// and keeps the first. If an interrupt was raised before this call, `f`
    /// runs right away with it.
    pub fn set_interrupt_handler<F>(&self, f: F) -> Result<(), PromiseError>
    where
        F: Fn(&ExceptionWrapper) + Send + Sync + 'static,
    {
        let handler: InterruptHandler = Arc::new(f);
        self.core()?.set_interrupt_handler(handler)
    }

    /// `true` while this promise holds a core.
    pub fn valid(&self) -> bool {
        self.core.is_some()
    }

    /// An empty promise has nothing left to fulfill and reports `true`.
    pub fn is_fulfilled(&self) -> bool {
        self.core.as_ref().map_or(true, |core| core.is_fulfilled())
    }

    fn core(&self) -> Result<&Arc<Core<T>>, PromiseError> {
        self.core.as_ref().ok_or(PromiseError::Invalid)
    }

    fn detach(&mut self) {
        if let Some(core) = self.core.take() {
            if !core.is_fulfilled() {
                core.abandon();
            }
        }
    }
}

impl Promise<()> {
    /// Fulfills a unit promise.
    pub fn complete(&self) -> Result<(), PromiseError> {
        self.set_value(())
    }
}

impl<T: Send + 'static> Default for Promise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> Drop for Promise<T> {
    /// An unfulfilled promise breaks its core on the way out.
    fn drop(&mut self) {
        self.detach()
    }
}

impl<T: Send + 'static> std::fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Promise")
            .field("valid", &self.valid())
            .field("retrieved", &self.retrieved)
            .field("fulfilled", &self.is_fulfilled())
            .finish()
    }
}
