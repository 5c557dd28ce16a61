//! Translation of guest-side failures into [`BridgeError`]s.
//!
//! Messages pass through untouched. Runtime envelopes around a guest
//! exception are peeled off first so the caller sees the fault its own code
//! raised.

use std::any::Any;

use tokio::task::JoinError;

use crate::compiler::Diagnostic;
use crate::error::BridgeError;
use crate::unit::GuestException;

/// Compiler rejection.
#[must_use]
pub fn from_diagnostic(diagnostic: Diagnostic) -> BridgeError {
    BridgeError::Compilation {
        message: diagnostic.message,
    }
}

/// Guest exception, unwrapped to its root cause.
#[must_use]
pub fn from_exception(exception: &GuestException) -> BridgeError {
    let root = exception.root_cause();
    BridgeError::Runtime {
        exception_type: Some(root.type_name.clone()),
        message: root.message.clone(),
    }
}

/// Panic raised by a native guest method.
#[must_use]
pub fn from_panic(payload: &(dyn Any + Send)) -> BridgeError {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "guest method panicked".to_owned());
    BridgeError::runtime(message)
}

/// Failure of the worker task that ran an invocation.
#[must_use]
pub fn from_join_error(err: JoinError) -> BridgeError {
    if err.is_panic() {
        from_panic(&*err.into_panic())
    } else {
        BridgeError::runtime("invocation was cancelled before completing")
    }
}
