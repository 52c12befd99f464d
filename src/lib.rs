//! Single-assignment handoff of a value (or a failure) from one thread to
//! another.
//!
//! A [`Promise`] and its consumer ([`SemiFuture`] or [`Future`]) share one
//! core. The producer fulfills it once, the consumer subscribes once, and
//! whichever of the two arrives second runs the continuation. A promise
//! dropped before fulfilling delivers [`PromiseError::BrokenPromise`].
//!
//! # Examples
//!
//! ```
//! use promise_core::{Promise, Try};
//! use std::thread;
//!
//! let mut promise = Promise::<i32>::new();
//! let future = promise.get_future().unwrap();
//! future
//!     .on_complete(|t: Try<i32>| assert_eq!(t.into_value(), Some(7)))
//!     .unwrap();
//!
//! thread::spawn(move || promise.set_value(7))
//!     .join()
//!     .expect("The producer thread has panicked")
//!     .unwrap();
//! ```
mod error;
mod exception;
pub mod executor;
mod future;
mod promise;
mod result;
mod state;

pub use error::{FutureCancelled, PromiseError};
pub use exception::{ExceptionWrapper, Panicked};
pub use executor::{Executor, InlineExecutor};
pub use future::{Future, SemiFuture};
pub use promise::Promise;
pub use result::Try;
