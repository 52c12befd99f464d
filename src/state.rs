//! The shared state behind one promise/future pair.
//!
//! `Core` is reached only through the two handles: [`Promise`](crate::Promise)
//! holds the producer side, [`SemiFuture`](crate::SemiFuture) the consumer
//! side. Its whole mutation surface is `set_result`, `attach`, `abandon` and
//! `raise`.
//!
//! Result and continuation race through `state`. Each side stores its half,
//! then tries to move `state` out of `START`. The side whose CAS fails came
//! second and runs the continuation, on its own thread.
use crate::{ExceptionWrapper, PromiseError, Try};
use parking_lot::Mutex;
use std::sync::{
    atomic::{AtomicBool, AtomicU8, Ordering},
    Arc,
};
use tracing::{debug, trace, warn};

const START: u8 = 0;
const ONLY_RESULT: u8 = 1;
const ONLY_CALLBACK: u8 = 2;
const DONE: u8 = 3;

pub(crate) type Callback<T> = Box<dyn FnOnce(Try<T>) + Send + 'static>;
pub(crate) type InterruptHandler = Arc<dyn Fn(&ExceptionWrapper) + Send + Sync + 'static>;

#[derive(Default)]
struct Interrupt {
    handler: Option<InterruptHandler>,
    registered: bool,
    raised: Option<ExceptionWrapper>,
}

pub(crate) struct Core<T> {
    state: AtomicU8,
    fulfilled: AtomicBool,
    attached: AtomicBool,
    result: Mutex<Option<Try<T>>>,
    callback: Mutex<Option<Callback<T>>>,
    interrupt: Mutex<Interrupt>,
}

impl<T: Send + 'static> Core<T> {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Core {
            state: AtomicU8::new(START),
            fulfilled: AtomicBool::new(false),
            attached: AtomicBool::new(false),
            result: Mutex::new(None),
            callback: Mutex::new(None),
            interrupt: Mutex::new(Interrupt::default()),
        })
    }

    /// Fulfills the core. If a continuation is already attached it runs on
    /// the calling thread before this returns.
    pub(crate) fn set_result(&self, result: Try<T>) -> Result<(), PromiseError> {
        if self.fulfilled.swap(true, Ordering::AcqRel) {
            return Err(PromiseError::AlreadySatisfied);
        }
        self.store_result(result);
        Ok(())
    }

    /// Subscribes the single continuation. If the result is already stored
    /// the continuation runs on the calling thread before this returns.
    pub(crate) fn attach(&self, callback: Callback<T>) -> Result<(), PromiseError> {
        if self.attached.swap(true, Ordering::AcqRel) {
            warn!("continuation already attached, rejecting the second");
            return Err(PromiseError::ContinuationAlreadyAttached);
        }
        *self.callback.lock() = Some(callback);
        match self
            .state
            .compare_exchange(START, ONLY_CALLBACK, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => trace!("continuation parked until fulfillment"),
            Err(current) => {
                debug_assert_eq!(current, ONLY_RESULT);
                self.state.store(DONE, Ordering::Release);
                trace!("result already present, consumer runs continuation");
                self.fire();
            }
        }
        Ok(())
    }

    /// Producer went away. Delivers a broken promise unless it already
    /// fulfilled.
    pub(crate) fn abandon(&self) {
        if self.fulfilled.swap(true, Ordering::AcqRel) {
            return;
        }
        let error = PromiseError::broken::<T>();
        debug!(%error, "promise dropped before fulfillment");
        self.store_result(Try::Exception(error.into()));
    }

    /// Asks the producer to stop. Only the first request is kept, and none
    /// is kept once the core has a result.
    pub(crate) fn raise(&self, reason: ExceptionWrapper) {
        if self.is_fulfilled() {
            trace!("interrupt after fulfillment ignored");
            return;
        }
        let handler = {
            let mut interrupt = self.interrupt.lock();
            if interrupt.raised.is_some() {
                return;
            }
            interrupt.raised = Some(reason.clone());
            interrupt.handler.clone()
        };
        match handler {
            Some(handler) => {
                debug!(%reason, "delivering interrupt");
                handler(&reason)
            }
            None => trace!(%reason, "interrupt recorded until a handler is set"),
        }
    }

    pub(crate) fn set_interrupt_handler(
        &self,
        handler: InterruptHandler,
    ) -> Result<(), PromiseError> {
        let pending = {
            let mut interrupt = self.interrupt.lock();
            if interrupt.registered {
                warn!("interrupt handler already set, keeping the first");
                return Err(PromiseError::InterruptHandlerAlreadySet);
            }
            interrupt.registered = true;
            if self.is_fulfilled() {
                return Ok(());
            }
            interrupt.handler = Some(Arc::clone(&handler));
            interrupt.raised.clone()
        };
        if let Some(reason) = pending {
            debug!(%reason, "delivering interrupt raised before handler was set");
            handler(&reason);
        }
        Ok(())
    }

    /// Moves the result out without a continuation. Succeeds only once the
    /// result is stored and nobody subscribed yet.
    pub(crate) fn try_take(&self) -> Option<Try<T>> {
        if self.state.load(Ordering::Acquire) != ONLY_RESULT {
            return None;
        }
        if self.attached.swap(true, Ordering::AcqRel) {
            return None;
        }
        self.state.store(DONE, Ordering::Release);
        self.result.lock().take()
    }

    pub(crate) fn is_fulfilled(&self) -> bool {
        self.fulfilled.load(Ordering::Acquire)
    }

    pub(crate) fn is_ready(&self) -> bool {
        matches!(self.state.load(Ordering::Acquire), ONLY_RESULT | DONE)
    }

    fn store_result(&self, result: Try<T>) {
        // The handler can never be needed again; release what it captured.
        self.interrupt.lock().handler = None;
        *self.result.lock() = Some(result);
        match self
            .state
            .compare_exchange(START, ONLY_RESULT, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => trace!("result parked until a continuation attaches"),
            Err(current) => {
                debug_assert_eq!(current, ONLY_CALLBACK);
                self.state.store(DONE, Ordering::Release);
                trace!("continuation already attached, producer runs it");
                self.fire();
            }
        }
    }

    fn fire(&self) {
        let callback = self.callback.lock().take();
        let result = self.result.lock().take();
        if let (Some(callback), Some(result)) = (callback, result) {
            callback(result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    fn recorder<T: Send + 'static>() -> (Arc<Mutex<Vec<Try<T>>>>, Callback<T>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, Box::new(move |t| sink.lock().push(t)))
    }

    #[test]
    fn test_result_then_continuation() {
        let core = Core::<i32>::new();
        core.set_result(Try::Value(7)).unwrap();
        assert!(core.is_ready());
        let (seen, callback) = recorder();
        core.attach(callback).unwrap();
        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].value(), Some(&7));
    }

    #[test]
    fn test_continuation_then_result() {
        let core = Core::<i32>::new();
        let (seen, callback) = recorder();
        core.attach(callback).unwrap();
        assert!(!core.is_ready());
        assert!(seen.lock().is_empty());
        core.set_result(Try::Value(9)).unwrap();
        assert_eq!(seen.lock()[0].value(), Some(&9));
    }

    #[test]
    fn test_second_result_rejected_and_first_kept() {
        let core = Core::<i32>::new();
        core.set_result(Try::Value(1)).unwrap();
        assert!(matches!(
            core.set_result(Try::Value(2)),
            Err(PromiseError::AlreadySatisfied)
        ));
        assert_eq!(core.try_take().and_then(Try::into_value), Some(1));
    }

    #[test]
    fn test_second_attach_rejected() {
        let core = Core::<i32>::new();
        let (_, first) = recorder();
        let (_, second) = recorder();
        core.attach(first).unwrap();
        assert!(matches!(
            core.attach(second),
            Err(PromiseError::ContinuationAlreadyAttached)
        ));
    }

    #[test]
    fn test_abandon_delivers_broken_promise() {
        let core = Core::<i32>::new();
        let (seen, callback) = recorder();
        core.attach(callback).unwrap();
        core.abandon();
        let seen = seen.lock();
        let error = PromiseError::from(seen[0].exception().cloned().unwrap());
        assert!(matches!(error, PromiseError::BrokenPromise(ref name) if name == "i32"));
    }

    #[test]
    fn test_abandon_after_fulfillment_is_noop() {
        let core = Core::<i32>::new();
        core.set_result(Try::Value(5)).unwrap();
        core.abandon();
        assert_eq!(core.try_take().and_then(Try::into_value), Some(5));
    }

    #[test]
    fn test_try_take_excludes_attach() {
        let core = Core::<i32>::new();
        assert!(core.try_take().is_none());
        core.set_result(Try::Value(3)).unwrap();
        assert!(core.try_take().is_some());
        assert!(core.try_take().is_none());
        let (seen, callback) = recorder();
        assert!(core.attach(callback).is_err());
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_interrupt_before_handler_is_delivered_on_registration() {
        let core = Core::<i32>::new();
        core.raise(ExceptionWrapper::msg("stop"));
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        core.set_interrupt_handler(Arc::new(move |reason: &ExceptionWrapper| {
            assert_eq!(reason.to_string(), "stop");
            counter.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_only_first_interrupt_is_kept() {
        let core = Core::<i32>::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        core.set_interrupt_handler(Arc::new(move |_: &ExceptionWrapper| {
            counter.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();
        core.raise(ExceptionWrapper::msg("first"));
        core.raise(ExceptionWrapper::msg("second"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_handler_may_fulfill_from_inside_interrupt() {
        let core = Core::<i32>::new();
        let weak = Arc::downgrade(&core);
        core.set_interrupt_handler(Arc::new(move |reason: &ExceptionWrapper| {
            if let Some(core) = weak.upgrade() {
                let _ = core.set_result(Try::Exception(reason.clone()));
            }
        }))
        .unwrap();
        core.raise(ExceptionWrapper::msg("cancel"));
        let t = core.try_take().unwrap();
        assert_eq!(t.exception().unwrap().to_string(), "cancel");
    }

    #[test]
    fn test_fulfillment_releases_interrupt_handler() {
        let core = Core::<i32>::new();
        let token = Arc::new(());
        let held = Arc::clone(&token);
        core.set_interrupt_handler(Arc::new(move |_: &ExceptionWrapper| {
            let _ = &held;
        }))
        .unwrap();
        assert_eq!(Arc::strong_count(&token), 2);
        core.set_result(Try::Value(1)).unwrap();
        assert_eq!(Arc::strong_count(&token), 1);
    }

    #[test]
    fn test_racing_sides_fire_exactly_once() {
        for round in 0..500 {
            let core = Core::<usize>::new();
            let fired = Arc::new(AtomicUsize::new(0));
            let value = Arc::new(AtomicUsize::new(usize::MAX));

            let producer = {
                let core = Arc::clone(&core);
                thread::spawn(move || core.set_result(Try::Value(round)).unwrap())
            };
            let consumer = {
                let core = Arc::clone(&core);
                let fired = Arc::clone(&fired);
                let value = Arc::clone(&value);
                thread::spawn(move || {
                    core.attach(Box::new(move |t: Try<usize>| {
                        fired.fetch_add(1, Ordering::SeqCst);
                        value.store(t.into_value().unwrap(), Ordering::SeqCst);
                    }))
                    .unwrap()
                })
            };
            producer.join().expect("The producer thread has panicked");
            consumer.join().expect("The consumer thread has panicked");

            assert_eq!(fired.load(Ordering::SeqCst), 1);
            assert_eq!(value.load(Ordering::SeqCst), round);
        }
    }
}
