//! Consumer handles.
//!
//! A consumer gets the result in exactly one of three ways: a continuation
//! via `on_complete`, blocking with `wait`/`get`, or `.await`. Polling with
//! `try_take` can precede any of them.
use crate::{
    executor::{Executor, InlineExecutor},
    state::Core,
    ExceptionWrapper, FutureCancelled, PromiseError, Try,
};
use parking_lot::{Condvar, Mutex};
use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll, Waker},
};

#[derive(Debug)]
struct Slot<T> {
    value: Option<Try<T>>,
    waker: Option<Waker>,
}

/// Where the internal continuation drops the result for a blocked thread or
/// a pending task.
#[derive(Debug)]
struct Handoff<T> {
    slot: Mutex<Slot<T>>,
    ready: Condvar,
}

impl<T> Handoff<T> {
    fn deliver(&self, value: Try<T>) {
        let waker = {
            let mut slot = self.slot.lock();
            slot.value = Some(value);
            slot.waker.take()
        };
        self.ready.notify_all();
        if let Some(waker) = waker {
            waker.wake()
        }
    }
}

/// Consumer handle with no execution context: the continuation runs on
/// whichever thread completes the handoff.
///
/// # Examples
///
/// ```
/// use promise_core::Promise;
/// use std::thread;
///
/// let (promise, future) = Promise::<String>::contract();
/// let producer = thread::spawn(move || promise.set_value("Hi".into()));
/// assert_eq!(future.get().unwrap(), "Hi");
/// producer.join().expect("The producer thread has panicked").unwrap();
/// ```
pub struct SemiFuture<T> {
    core: Arc<Core<T>>,
    handoff: Option<Arc<Handoff<T>>>,
}

impl<T: Send + 'static> SemiFuture<T> {
    pub(crate) fn new(core: Arc<Core<T>>) -> Self {
        SemiFuture {
            core,
            handoff: None,
        }
    }

    /// Attaches the terminal continuation.
    ///
    /// `f` runs exactly once, either right here (the result is already in)
    /// or later on the thread that fulfills the promise. Do not assume any
    /// particular thread. Fails if this future was already polled as an
    /// async future.
    pub fn on_complete<F>(self, f: F) -> Result<(), PromiseError>
    where
        F: FnOnce(Try<T>) + Send + 'static,
    {
        if self.handoff.is_some() {
            return Err(PromiseError::ContinuationAlreadyAttached);
        }
        self.core.attach(Box::new(f))
    }

    /// Takes the result if it is already there, otherwise hands the future
    /// back.
    pub fn try_take(self) -> Result<Try<T>, Self> {
        let value = match &self.handoff {
            Some(handoff) => handoff.slot.lock().value.take(),
            None => self.core.try_take(),
        };
        value.ok_or(self)
    }

    /// Blocks the calling thread until the promise is fulfilled or broken.
    pub fn wait(mut self) -> Try<T> {
        if let Some(value) = self.core.try_take() {
            return value;
        }
        let handoff = match self.subscribe(None) {
            Ok(handoff) => handoff,
            Err(error) => return Try::Exception(error.into()),
        };
        let mut slot = handoff.slot.lock();
        loop {
            if let Some(value) = slot.value.take() {
                return value;
            }
            handoff.ready.wait(&mut slot);
        }
    }

    /// [`wait`](Self::wait), as a `Result`.
    pub fn get(self) -> Result<T, ExceptionWrapper> {
        self.wait().into_result()
    }

    /// Requests cancellation from the producer's interrupt handler. The
    /// producer decides whether and how to fulfill in response.
    pub fn raise(&self, reason: ExceptionWrapper) {
        self.core.raise(reason)
    }

    pub fn cancel(&self) {
        self.raise(ExceptionWrapper::new(FutureCancelled))
    }

    pub fn is_ready(&self) -> bool {
        match &self.handoff {
            Some(handoff) => handoff.slot.lock().value.is_some(),
            None => self.core.is_ready(),
        }
    }

    fn subscribe(&mut self, waker: Option<Waker>) -> Result<Arc<Handoff<T>>, PromiseError> {
        if let Some(handoff) = &self.handoff {
            return Ok(Arc::clone(handoff));
        }
        let handoff = Arc::new(Handoff {
            slot: Mutex::new(Slot { value: None, waker }),
            ready: Condvar::new(),
        });
        let sink = Arc::clone(&handoff);
        self.core.attach(Box::new(move |value| sink.deliver(value)))?;
        self.handoff = Some(Arc::clone(&handoff));
        Ok(handoff)
    }
}

impl<T: Send + 'static> std::future::Future for SemiFuture<T> {
    type Output = Try<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if this.handoff.is_none() {
            if let Some(value) = this.core.try_take() {
                return Poll::Ready(value);
            }
        }
        let handoff = match this.subscribe(Some(cx.waker().clone())) {
            Ok(handoff) => handoff,
            Err(error) => return Poll::Ready(Try::Exception(error.into())),
        };
        let mut slot = handoff.slot.lock();
        match slot.value.take() {
            Some(value) => Poll::Ready(value),
            None => {
                slot.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

impl<T> std::fmt::Debug for SemiFuture<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemiFuture")
            .field("subscribed", &self.handoff.is_some())
            .finish_non_exhaustive()
    }
}

/// Consumer handle bound to an [`Executor`]. The continuation is handed to
/// the executor instead of running on whichever thread completes the
/// handoff.
pub struct Future<T> {
    semi: SemiFuture<T>,
    executor: Arc<dyn Executor>,
}

impl<T: Send + 'static> Future<T> {
    pub(crate) fn new(semi: SemiFuture<T>, executor: Arc<dyn Executor>) -> Self {
        Future { semi, executor }
    }

    pub(crate) fn inline(semi: SemiFuture<T>) -> Self {
        Self::new(semi, Arc::new(InlineExecutor))
    }

    /// Attaches the terminal continuation; it is submitted to this future's
    /// executor once the result is in.
    pub fn on_complete<F>(self, f: F) -> Result<(), PromiseError>
    where
        F: FnOnce(Try<T>) + Send + 'static,
    {
        let executor = self.executor;
        self.semi
            .on_complete(move |value| executor.add(Box::new(move || f(value))))
    }

    pub fn try_take(self) -> Result<Try<T>, Self> {
        let executor = self.executor;
        self.semi
            .try_take()
            .map_err(|semi| Future { semi, executor })
    }

    pub fn wait(self) -> Try<T> {
        self.semi.wait()
    }

    pub fn get(self) -> Result<T, ExceptionWrapper> {
        self.semi.get()
    }

    pub fn raise(&self, reason: ExceptionWrapper) {
        self.semi.raise(reason)
    }

    pub fn cancel(&self) {
        self.semi.cancel()
    }

    pub fn is_ready(&self) -> bool {
        self.semi.is_ready()
    }

    /// Drops the executor binding.
    pub fn into_semi(self) -> SemiFuture<T> {
        self.semi
    }
}

impl<T: Send + 'static> std::future::Future for Future<T> {
    type Output = Try<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().semi).poll(cx)
    }
}

impl<T> std::fmt::Debug for Future<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Future")
            .field("semi", &self.semi)
            .finish_non_exhaustive()
    }
}
