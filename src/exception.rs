//! A failure container that hides the concrete error type.
//!
//! `ExceptionWrapper` is what travels through a [`Try`](crate::Try) when a
//! promise is fulfilled with a failure. The consumer can print it, downcast
//! it, or hand it on, without knowing what the producer put in.
use std::{any::Any, error::Error as StdError, fmt, sync::Arc};

/// Error produced from a caught panic. Carries the panic message when the
/// payload was a string, and a placeholder otherwise.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct Panicked {
    message: String,
}

impl Panicked {
    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct Message(String);

/// Type-erased, cheaply cloneable failure.
///
/// # Examples
///
/// ```
/// use promise_core::{ExceptionWrapper, PromiseError};
///
/// let ew = ExceptionWrapper::new(PromiseError::AlreadySatisfied);
/// assert!(ew.is::<PromiseError>());
/// assert_eq!(ew.to_string(), "Promise already satisfied");
/// ```
#[derive(Clone)]
pub struct ExceptionWrapper {
    inner: Arc<dyn StdError + Send + Sync + 'static>,
    type_name: &'static str,
}

impl ExceptionWrapper {
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(error),
            type_name: std::any::type_name::<E>(),
        }
    }

    /// The concrete type is lost behind the box; [`what`](Self::what)
    /// reports it as `boxed error`.
    pub fn from_boxed(error: Box<dyn StdError + Send + Sync + 'static>) -> Self {
        Self {
            inner: Arc::from(error),
            type_name: "boxed error",
        }
    }

    /// A synthesized failure described only by text.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(Message(message.into()))
    }

    /// Wraps the payload of a caught panic (as returned by
    /// `std::panic::catch_unwind`) into a [`Panicked`] error.
    pub fn from_panic(payload: Box<dyn Any + Send + 'static>) -> Self {
        let message = match payload.downcast::<String>() {
            Ok(message) => *message,
            Err(payload) => match payload.downcast::<&'static str>() {
                Ok(message) => (*message).to_owned(),
                Err(_) => "panic with a non-string payload".to_owned(),
            },
        };
        Self::new(Panicked { message })
    }

    pub fn is<E: StdError + 'static>(&self) -> bool {
        self.inner.is::<E>()
    }

    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.inner.downcast_ref::<E>()
    }

    pub fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
        &*self.inner
    }

    /// Type-qualified description, `"<type>: <message>"`.
    pub fn what(&self) -> String {
        format!("{}: {}", self.type_name, self.inner)
    }
}

impl fmt::Debug for ExceptionWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ExceptionWrapper").field(&self.inner).finish()
    }
}

impl fmt::Display for ExceptionWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl StdError for ExceptionWrapper {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner.source()
    }
}
