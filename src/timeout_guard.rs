//! A "scope guard" that resets a port's read timeout when it goes out of scope.

use crate::backend::Backend;
use std::{io, marker::PhantomData, time::Duration};

/// A port, as required by the [`TimeoutGuard`].
pub trait Port<B>: private::Sealed {
    /// Get the underlying backend.
    #[doc(hidden)]
    fn backend_mut(&mut self) -> &mut B;
    /// Poison the port.
    #[doc(hidden)]
    fn poison(&mut self, e: io::Error);
}

mod private {
    /// Marks a trait a sealed.
    pub trait Sealed {}
    impl<B> Sealed for crate::port::Port<B> {}
}

/// A "scope guard" that changes a port's read timeout and restores the
/// original when it goes out of scope.
///
/// To create a guard, use the port's [`timeout_guard`](crate::port::Port::timeout_guard)
/// method. [`Port::clear`](crate::port::Port::clear) uses one to drain with a
/// short timeout.
///
/// While the guard is in scope, the port can only be accessed through the guard.
/// However, because the guard implements [`Deref`](std::ops::Deref) and
/// [`DerefMut`](std::ops::DerefMut) callers can treat the guard as the port.
///
/// If the original timeout cannot be restored, the port is poisoned and the
/// failure is reported by the next operation on it.
#[derive(Debug)]
pub struct TimeoutGuard<'a, B: Backend, P: Port<B>> {
    /// The underlying port.
    port: &'a mut P,
    /// The timeout restored when the guard is dropped.
    original_timeout: Option<Duration>,
    backend_marker: PhantomData<B>,
}

impl<'a, B: Backend, P: Port<B>> TimeoutGuard<'a, B, P> {
    /// Update the port's timeout and return a [`TimeoutGuard`] wrapping the port.
    pub(crate) fn new(port: &'a mut P, timeout: Option<Duration>) -> Result<Self, io::Error> {
        let backend = port.backend_mut();
        let original_timeout = backend.read_timeout()?;
        backend.set_read_timeout(timeout)?;
        Ok(TimeoutGuard {
            port,
            original_timeout,
            backend_marker: PhantomData,
        })
    }

    /// The timeout that will be restored.
    pub fn original_timeout(&self) -> Option<Duration> {
        self.original_timeout
    }
}

impl<B: Backend, P: Port<B>> std::ops::Deref for TimeoutGuard<'_, B, P> {
    type Target = P;
    fn deref(&self) -> &Self::Target {
        self.port
    }
}

impl<B: Backend, P: Port<B>> std::ops::DerefMut for TimeoutGuard<'_, B, P> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.port
    }
}

impl<B: Backend, P: Port<B>> Drop for TimeoutGuard<'_, B, P> {
    fn drop(&mut self) {
        let original = self.original_timeout;
        if let Err(err) = self.port.backend_mut().set_read_timeout(original) {
            let message = match original {
                Some(timeout) => format!("failed to restore the read timeout of {timeout:?}: {err}"),
                None => format!("failed to restore an infinite read timeout: {err}"),
            };
            log::debug!("{message}");
            self.port.poison(io::Error::new(err.kind(), message));
        }
    }
}
