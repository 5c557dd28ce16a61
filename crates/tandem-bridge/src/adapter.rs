//! The uniform asynchronous invocation contract.
//!
//! Every bound entry point, synchronous or deferred, is called the same way:
//! one input, one completion that fires exactly once. Synchronous bodies run
//! on the blocking pool; deferred bodies are polled on the worker runtime.
//! Guest exceptions and panics are caught at this boundary and delivered
//! through the completion as runtime errors.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};

use futures::FutureExt;
use tandem_telemetry::InvocationContext;
use tokio::runtime::Handle;
use tracing::{Instrument, debug, warn};

use crate::dispatch::Dispatch;
use crate::error::{BridgeError, BridgeResult};
use crate::guest::ParamKind;
use crate::locator::EntryPoint;
use crate::marshal;
use crate::translate;
use crate::unit::{GuestCall, MethodHandle};
use crate::value::HostValue;

/// Completion callback of one invocation.
pub type Completion = Box<dyn FnOnce(BridgeResult<HostValue>) + Send + 'static>;

/// Holds a value that may be taken at most once across threads.
pub(crate) struct CompletionGuard<F> {
    slot: Mutex<Option<F>>,
}

impl<F> CompletionGuard<F> {
    pub(crate) fn new(value: F) -> Self {
        Self {
            slot: Mutex::new(Some(value)),
        }
    }

    /// Take the value. Every call after the first returns `None`.
    pub(crate) fn take(&self) -> Option<F> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub(crate) fn is_spent(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

/// A located entry point ready to be invoked.
///
/// Cheap to clone; clones share the method handle. Concurrent invocations
/// are independent and unordered.
#[derive(Debug, Clone)]
pub struct BoundCallable {
    entry_point: EntryPoint,
    method: Arc<MethodHandle>,
}

impl BoundCallable {
    pub(crate) fn new(entry_point: EntryPoint, method: Arc<MethodHandle>) -> Self {
        Self {
            entry_point,
            method,
        }
    }

    /// The bound type and method.
    #[must_use]
    pub fn entry_point(&self) -> &EntryPoint {
        &self.entry_point
    }

    /// Whether the method returns a deferred value.
    #[must_use]
    pub fn is_asynchronous(&self) -> bool {
        self.method.is_deferred()
    }

    /// How the method declares its parameter.
    #[must_use]
    pub fn param_kind(&self) -> ParamKind {
        self.method.param
    }

    /// Start an invocation on `worker`. Returns immediately; `on_complete`
    /// fires exactly once, through `dispatch`.
    pub fn invoke(
        &self,
        worker: &Handle,
        dispatch: Arc<dyn Dispatch>,
        input: HostValue,
        on_complete: Completion,
    ) {
        dispatch.begin();
        let pending = PendingCompletion {
            callback: Some(on_complete),
            dispatch,
        };
        let execution = self.execute(input);
        worker.spawn(async move {
            let result = execution.await;
            pending.complete(result);
        });
    }

    /// Run an invocation on `worker` and await its result.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Runtime`] if the guest faults, panics, or
    /// returns a value with no host mapping.
    pub async fn invoke_async(&self, worker: &Handle, input: HostValue) -> BridgeResult<HostValue> {
        worker
            .spawn(self.execute(input))
            .await
            .map_err(translate::from_join_error)?
    }

    fn execute(
        &self,
        input: HostValue,
    ) -> impl Future<Output = BridgeResult<HostValue>> + Send + 'static {
        let method = Arc::clone(&self.method);
        let context = InvocationContext::new(self.entry_point.to_string())
            .with_deferred(method.is_deferred());
        let span = context.span();

        async move {
            let result = run(method, input).await;
            match &result {
                Ok(_) => debug!(elapsed_ms = context.elapsed_ms(), "invocation completed"),
                Err(e) => debug!(
                    elapsed_ms = context.elapsed_ms(),
                    error = %e,
                    "invocation failed"
                ),
            }
            result
        }
        .instrument(span)
    }
}

/// Marshal in, call, await if deferred, marshal out.
async fn run(method: Arc<MethodHandle>, input: HostValue) -> BridgeResult<HostValue> {
    let guest_input = marshal::to_guest(&input, method.param);

    let call = if method.is_deferred() {
        call_guarded(&method, guest_input)?
    } else {
        let method = Arc::clone(&method);
        tokio::task::spawn_blocking(move || call_guarded(&method, guest_input))
            .await
            .map_err(translate::from_join_error)??
    };

    let outcome = match call {
        GuestCall::Ready(outcome) => outcome,
        GuestCall::Pending(future) => AssertUnwindSafe(future)
            .catch_unwind()
            .await
            .map_err(|payload| translate::from_panic(&*payload))?,
    };

    match outcome {
        Ok(value) => marshal::to_host(value),
        Err(exception) => Err(translate::from_exception(&exception)),
    }
}

fn call_guarded(
    method: &MethodHandle,
    input: crate::guest::GuestValue,
) -> BridgeResult<GuestCall> {
    std::panic::catch_unwind(AssertUnwindSafe(|| method.call(input)))
        .map_err(|payload| translate::from_panic(&*payload))
}

/// The completion of one in-flight invocation.
///
/// Consumed by [`complete`](Self::complete). If the invocation is dropped
/// first (its worker shut down), the callback still fires, with an error.
struct PendingCompletion {
    callback: Option<Completion>,
    dispatch: Arc<dyn Dispatch>,
}

impl PendingCompletion {
    fn complete(mut self, result: BridgeResult<HostValue>) {
        self.deliver(result);
    }

    fn deliver(&mut self, result: BridgeResult<HostValue>) {
        if let Some(callback) = self.callback.take() {
            self.dispatch.post(Box::new(move || callback(result)));
        }
    }
}

impl Drop for PendingCompletion {
    fn drop(&mut self) {
        if self.callback.is_some() {
            warn!("Invocation dropped before completing");
            self.deliver(Err(BridgeError::runtime(
                "invocation was abandoned before completing",
            )));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use serde_json::json;
    use tokio::sync::oneshot;

    use super::*;
    use crate::dispatch::{HostLoop, Inline};
    use crate::error::ErrorKind;
    use crate::guest::GuestValue;
    use crate::unit::{GuestException, Resolver, ReturnKind};

    fn bound(param: ParamKind, returns: ReturnKind, body: fn(GuestValue) -> GuestCall) -> BoundCallable {
        BoundCallable::new(
            EntryPoint::new("Startup", "Invoke"),
            Arc::new(MethodHandle::new("Invoke", param, returns, body)),
        )
    }

    fn greet(input: GuestValue) -> GuestCall {
        GuestCall::ready(Ok(GuestValue::from(format!("Hello, {input}"))))
    }

    async fn call(callable: &BoundCallable, input: HostValue) -> BridgeResult<HostValue> {
        let (tx, rx) = oneshot::channel();
        callable.invoke(
            &Handle::current(),
            Arc::new(Inline),
            input,
            Box::new(move |result| {
                let _ = tx.send(result);
            }),
        );
        rx.await.unwrap()
    }

    #[tokio::test]
    async fn test_sync_method() {
        let callable = bound(ParamKind::Object, ReturnKind::Value, greet);
        assert!(!callable.is_asynchronous());
        let result = call(&callable, HostValue::from("JavaScript")).await.unwrap();
        assert_eq!(result, HostValue::from("Hello, JavaScript"));
    }

    #[tokio::test]
    async fn test_deferred_method() {
        let callable = bound(ParamKind::Dynamic, ReturnKind::Deferred, |input| {
            GuestCall::pending(async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                let GuestValue::Dynamic(object) = &input else {
                    return Err(GuestException::general("expected dynamic input"));
                };
                let text = object.get_path("nested.text").cloned().unwrap_or(GuestValue::Null);
                Ok(GuestValue::from(format!("{text} works")))
            })
        });
        assert!(callable.is_asynchronous());
        let input = HostValue::from(json!({ "nested": { "text": "Dynamic" } }));
        let result = callable.invoke_async(&Handle::current(), input).await.unwrap();
        assert_eq!(result, HostValue::from("Dynamic works"));
    }

    #[tokio::test]
    async fn test_exception_delivered_through_completion() {
        let callable = bound(ParamKind::Object, ReturnKind::Value, |_| {
            GuestCall::ready(Err(GuestException::general("Test error")
                .wrapped_in("System.Reflection.TargetInvocationException", "wrapper")))
        });
        let err = call(&callable, HostValue::Null).await.unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::RuntimeError));
        assert_eq!(err.to_string(), "Test error");
    }

    #[tokio::test]
    async fn test_panics_become_runtime_errors() {
        let sync_panic = bound(ParamKind::Object, ReturnKind::Value, |_| {
            panic!("sync body panicked")
        });
        let err = call(&sync_panic, HostValue::Null).await.unwrap_err();
        assert_eq!(err.to_string(), "sync body panicked");

        let deferred_panic = bound(ParamKind::Object, ReturnKind::Deferred, |_| {
            GuestCall::pending(async { panic!("deferred body panicked") })
        });
        let err = call(&deferred_panic, HostValue::Null).await.unwrap_err();
        assert_eq!(err.to_string(), "deferred body panicked");
    }

    #[tokio::test]
    async fn test_unmarshalable_result_is_runtime_error() {
        let callable = bound(ParamKind::Object, ReturnKind::Deferred, |_| {
            GuestCall::ready(Ok(GuestValue::Opaque("System.Object".into())))
        });
        let err = call(&callable, HostValue::Null).await.unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::RuntimeError));
    }

    #[tokio::test]
    async fn test_repeated_resolution_fires_once() {
        static FIRED: AtomicUsize = AtomicUsize::new(0);

        let callable = bound(ParamKind::Object, ReturnKind::Deferred, |_| {
            let (resolver, call) = Resolver::channel();
            std::thread::spawn(move || {
                resolver.resolve(GuestValue::from("first"));
                resolver.resolve(GuestValue::from("second"));
                resolver.reject(GuestException::general("third"));
            });
            call
        });

        let host = HostLoop::new();
        let (tx, rx) = oneshot::channel();
        callable.invoke(
            &Handle::current(),
            Arc::new(host.clone()),
            HostValue::Null,
            Box::new(move |result| {
                FIRED.fetch_add(1, Ordering::SeqCst);
                let _ = tx.send(result);
            }),
        );
        assert_eq!(host.outstanding(), 1);
        host.run_until_idle().await;

        assert_eq!(rx.await.unwrap().unwrap(), HostValue::from("first"));
        assert_eq!(FIRED.load(Ordering::SeqCst), 1);
        assert_eq!(host.run_pending(), 0);
    }

    #[test]
    fn test_completion_fires_when_worker_shuts_down() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let callable = bound(ParamKind::Object, ReturnKind::Deferred, |_| {
            GuestCall::pending(futures::future::pending())
        });

        let (tx, rx) = std::sync::mpsc::channel();
        callable.invoke(
            runtime.handle(),
            Arc::new(Inline),
            HostValue::Null,
            Box::new(move |result| {
                let _ = tx.send(result);
            }),
        );
        drop(runtime);

        let err = rx.recv().unwrap().unwrap_err();
        assert_eq!(err.to_string(), "invocation was abandoned before completing");
    }

    #[test]
    fn test_completion_guard_single_take() {
        let guard = CompletionGuard::new(7);
        assert!(!guard.is_spent());
        assert_eq!(guard.take(), Some(7));
        assert_eq!(guard.take(), None);
        assert!(guard.is_spent());
    }
}
