//! Compiled units and the method lookup table.
//!
//! A [`CompiledUnit`] is built once by a [`Compiler`](crate::Compiler) and maps
//! fully qualified type names to [`GuestType`]s, each of which maps method
//! names to [`MethodHandle`]s. Lookups happen once, while a function is built.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::oneshot;
use tracing::warn;

use crate::adapter::CompletionGuard;
use crate::guest::{GuestValue, ParamKind};

/// A fault raised by guest code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestException {
    /// Fully qualified exception type.
    pub type_name: String,
    /// Exception message.
    pub message: String,
    /// The exception this one wraps, if any.
    pub inner: Option<Box<GuestException>>,
    /// Whether this is a runtime envelope (invocation target, aggregate)
    /// around the real fault rather than a fault of its own.
    pub wrapper: bool,
}

impl GuestException {
    /// Create an exception.
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
            inner: None,
            wrapper: false,
        }
    }

    /// `System.Exception` with `message`.
    pub fn general(message: impl Into<String>) -> Self {
        Self::new("System.Exception", message)
    }

    /// Wrap `self` in a runtime envelope of `type_name`.
    #[must_use]
    pub fn wrapped_in(self, type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
            inner: Some(Box::new(self)),
            wrapper: true,
        }
    }

    /// The innermost exception that is not an envelope.
    #[must_use]
    pub fn root_cause(&self) -> &GuestException {
        let mut current = self;
        while current.wrapper {
            match &current.inner {
                Some(inner) => current = inner,
                None => break,
            }
        }
        current
    }
}

impl std::fmt::Display for GuestException {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.type_name, self.message)
    }
}

/// Result of a guest call.
pub type GuestResult = Result<GuestValue, GuestException>;

/// What a guest method returns when called.
pub enum GuestCall {
    /// The call finished before returning.
    Ready(GuestResult),
    /// The call returned a deferred value.
    Pending(BoxFuture<'static, GuestResult>),
}

impl GuestCall {
    /// A completed call.
    #[must_use]
    pub fn ready(result: GuestResult) -> Self {
        Self::Ready(result)
    }

    /// A deferred call.
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = GuestResult> + Send + 'static,
    {
        Self::Pending(Box::pin(future))
    }
}

impl std::fmt::Debug for GuestCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready(result) => f.debug_tuple("Ready").field(result).finish(),
            Self::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

/// Executable body of a guest method.
pub trait GuestMethod: Send + Sync {
    /// Call the method with its single argument.
    fn call(&self, input: GuestValue) -> GuestCall;
}

impl<F> GuestMethod for F
where
    F: Fn(GuestValue) -> GuestCall + Send + Sync,
{
    fn call(&self, input: GuestValue) -> GuestCall {
        self(input)
    }
}

/// Declared return of a guest method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturnKind {
    /// Returns a value directly.
    Value,
    /// Returns a task/future.
    Deferred,
}

/// A method entry in the lookup table.
#[derive(Clone)]
pub struct MethodHandle {
    /// Method name.
    pub name: String,
    /// How the single parameter is declared.
    pub param: ParamKind,
    /// Declared return.
    pub returns: ReturnKind,
    body: Arc<dyn GuestMethod>,
}

impl MethodHandle {
    /// Create a handle around a closure body.
    pub fn new<F>(name: impl Into<String>, param: ParamKind, returns: ReturnKind, body: F) -> Self
    where
        F: Fn(GuestValue) -> GuestCall + Send + Sync + 'static,
    {
        Self::from_method(name, param, returns, Arc::new(body))
    }

    /// Create a handle around any [`GuestMethod`].
    pub fn from_method(
        name: impl Into<String>,
        param: ParamKind,
        returns: ReturnKind,
        body: Arc<dyn GuestMethod>,
    ) -> Self {
        Self {
            name: name.into(),
            param,
            returns,
            body,
        }
    }

    /// Whether the method returns a deferred value.
    #[must_use]
    pub fn is_deferred(&self) -> bool {
        self.returns == ReturnKind::Deferred
    }

    /// Call the method body.
    pub fn call(&self, input: GuestValue) -> GuestCall {
        self.body.call(input)
    }
}

impl std::fmt::Debug for MethodHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodHandle")
            .field("name", &self.name)
            .field("param", &self.param)
            .field("returns", &self.returns)
            .finish_non_exhaustive()
    }
}

/// A type in a compiled unit.
#[derive(Debug, Clone, Default)]
pub struct GuestType {
    /// Fully qualified name.
    pub name: String,
    methods: HashMap<String, Arc<MethodHandle>>,
}

impl GuestType {
    /// Create an empty type.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: HashMap::new(),
        }
    }

    /// Add a method, replacing any of the same name.
    #[must_use]
    pub fn with_method(mut self, method: MethodHandle) -> Self {
        self.add_method(method);
        self
    }

    /// Add a method, replacing any of the same name.
    pub fn add_method(&mut self, method: MethodHandle) {
        self.methods.insert(method.name.clone(), Arc::new(method));
    }

    /// Look up a method.
    #[must_use]
    pub fn method(&self, name: &str) -> Option<Arc<MethodHandle>> {
        self.methods.get(name).cloned()
    }

    /// Method names, unordered.
    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }
}

/// Output of a successful compilation.
#[derive(Debug, Clone, Default)]
pub struct CompiledUnit {
    types: HashMap<String, GuestType>,
}

impl CompiledUnit {
    /// Create an empty unit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a type.
    #[must_use]
    pub fn with_type(mut self, guest_type: GuestType) -> Self {
        self.add_type(guest_type);
        self
    }

    /// Add a type, replacing any of the same name.
    pub fn add_type(&mut self, guest_type: GuestType) {
        self.types.insert(guest_type.name.clone(), guest_type);
    }

    /// Look up a type by fully qualified name.
    #[must_use]
    pub fn find_type(&self, name: &str) -> Option<&GuestType> {
        self.types.get(name)
    }

    /// Number of types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether the unit declares no types.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Completion source for a deferred guest result.
///
/// Guest code that finishes on its own schedule creates a resolver with
/// [`Resolver::channel`], returns the paired [`GuestCall`], and later calls
/// [`resolve`](Self::resolve) or [`reject`](Self::reject). Only the first
/// completion counts.
#[derive(Clone)]
pub struct Resolver {
    sender: Arc<CompletionGuard<oneshot::Sender<GuestResult>>>,
}

impl Resolver {
    /// Create a resolver and the pending call it completes.
    ///
    /// If every clone of the resolver is dropped without completing, the call
    /// faults with a cancellation exception.
    #[must_use]
    pub fn channel() -> (Self, GuestCall) {
        let (tx, rx) = oneshot::channel();
        let resolver = Self {
            sender: Arc::new(CompletionGuard::new(tx)),
        };
        let call = GuestCall::pending(async move {
            rx.await.unwrap_or_else(|_| {
                Err(GuestException::new(
                    "System.Threading.Tasks.TaskCanceledException",
                    "A task was canceled.",
                ))
            })
        });
        (resolver, call)
    }

    /// Complete with a value. Returns `false` if already completed.
    pub fn resolve(&self, value: GuestValue) -> bool {
        self.complete(Ok(value))
    }

    /// Complete with a fault. Returns `false` if already completed.
    pub fn reject(&self, exception: GuestException) -> bool {
        self.complete(Err(exception))
    }

    fn complete(&self, result: GuestResult) -> bool {
        let Some(sender) = self.sender.take() else {
            warn!("Ignoring repeated completion of a deferred guest result");
            return false;
        };
        // A dropped receiver means the invocation is gone; nothing to deliver.
        let _ = sender.send(result);
        true
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("completed", &self.sender.is_spent())
            .finish()
    }
}
