use crate::ExceptionWrapper;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// The outcome a promise is fulfilled with: a value, or a type-erased
/// failure.
#[derive(Debug, Clone)]
pub enum Try<T> {
    Value(T),
    Exception(ExceptionWrapper),
}

impl<T> Try<T> {
    /// Runs `f`, turning a panic into `Try::Exception`.
    ///
    /// # Examples
    ///
    /// ```
    /// use promise_core::Try;
    ///
    /// assert_eq!(Try::catching(|| 42).into_value(), Some(42));
    /// let failed = Try::<i32>::catching(|| panic!("boom"));
    /// assert_eq!(failed.exception().unwrap().to_string(), "boom");
    /// ```
    pub fn catching<F>(f: F) -> Self
    where
        F: FnOnce() -> T,
    {
        match catch_unwind(AssertUnwindSafe(f)) {
            Ok(value) => Try::Value(value),
            Err(payload) => Try::Exception(ExceptionWrapper::from_panic(payload)),
        }
    }

    pub fn from_result<E>(result: Result<T, E>) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        match result {
            Ok(value) => Try::Value(value),
            Err(error) => Try::Exception(ExceptionWrapper::new(error)),
        }
    }

    pub fn has_value(&self) -> bool {
        matches!(self, Try::Value(_))
    }

    pub fn has_exception(&self) -> bool {
        matches!(self, Try::Exception(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Try::Value(value) => Some(value),
            Try::Exception(_) => None,
        }
    }

    pub fn exception(&self) -> Option<&ExceptionWrapper> {
        match self {
            Try::Value(_) => None,
            Try::Exception(ew) => Some(ew),
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Try::Value(value) => Some(value),
            Try::Exception(_) => None,
        }
    }

    pub fn into_result(self) -> Result<T, ExceptionWrapper> {
        self.into()
    }
}

impl<T> From<Result<T, ExceptionWrapper>> for Try<T> {
    fn from(result: Result<T, ExceptionWrapper>) -> Self {
        match result {
            Ok(value) => Try::Value(value),
            Err(ew) => Try::Exception(ew),
        }
    }
}

impl<T> From<Try<T>> for Result<T, ExceptionWrapper> {
    fn from(t: Try<T>) -> Self {
        match t {
            Try::Value(value) => Ok(value),
            Try::Exception(ew) => Err(ew),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PromiseError;

    #[test]
    fn test_accessors() {
        let ok: Try<i32> = Try::Value(3);
        assert!(ok.has_value());
        assert_eq!(ok.value(), Some(&3));
        assert!(ok.exception().is_none());

        let failed: Try<i32> = Try::Exception(ExceptionWrapper::msg("nope"));
        assert!(failed.has_exception());
        assert!(failed.value().is_none());
        assert_eq!(failed.into_result().unwrap_err().to_string(), "nope");
    }

    #[test]
    fn test_from_result_erases_error_type() {
        let t: Try<u8> = Try::from_result(Err(PromiseError::Invalid));
        assert!(t.exception().unwrap().is::<PromiseError>());
        let t: Try<u8> = Try::from_result::<PromiseError>(Ok(1));
        assert_eq!(t.into_value(), Some(1));
    }

    #[test]
    fn test_catching_keeps_value() {
        assert_eq!(Try::catching(|| "x".to_owned()).into_value().as_deref(), Some("x"));
    }
}
