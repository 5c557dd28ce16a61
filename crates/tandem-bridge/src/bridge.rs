//! The function factory.
//!
//! A [`Bridge`] turns descriptors into [`Func`]s. Building a function runs
//! the whole construction pipeline synchronously (resolve, compile, locate),
//! so every construction failure surfaces from [`Bridge::func`] itself and a
//! returned [`Func`] is always usable.

use std::sync::Arc;

use tandem_config::BridgeConfig;
use tokio::runtime::{Handle, Runtime};
use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::adapter::BoundCallable;
use crate::cache::UnitCache;
use crate::compiler::Compiler;
use crate::dispatch::{Dispatch, Inline};
use crate::error::{BridgeError, BridgeResult};
use crate::loader::{FsLoader, SourceLoader};
use crate::locator::{EntryPoint, Locator};
use crate::source::{Descriptor, SourceResolver};
use crate::value::HostValue;

/// Builder for a [`Bridge`].
pub struct BridgeBuilder {
    compiler: Arc<dyn Compiler>,
    loader: Arc<dyn SourceLoader>,
    config: BridgeConfig,
    worker: Option<Handle>,
    dispatch: Arc<dyn Dispatch>,
    type_name: Option<String>,
    method_name: Option<String>,
    runtime_label: Option<String>,
    references: Vec<String>,
    cache: Option<bool>,
}

impl BridgeBuilder {
    /// Start a builder around a compilation service.
    pub fn new(compiler: impl Compiler + 'static) -> Self {
        Self::with_compiler(Arc::new(compiler))
    }

    /// Start a builder around a shared compilation service.
    pub fn with_compiler(compiler: Arc<dyn Compiler>) -> Self {
        Self {
            compiler,
            loader: Arc::new(FsLoader),
            config: BridgeConfig::default(),
            worker: None,
            dispatch: Arc::new(Inline),
            type_name: None,
            method_name: None,
            runtime_label: None,
            references: Vec::new(),
            cache: None,
        }
    }

    /// Base configuration. Values set on the builder take precedence.
    #[must_use]
    pub fn config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    /// Loader for file descriptors.
    #[must_use]
    pub fn loader(mut self, loader: impl SourceLoader + 'static) -> Self {
        self.loader = Arc::new(loader);
        self
    }

    /// Runtime that executes guest invocations.
    ///
    /// Defaults to the runtime current at [`build`](Self::build), or a
    /// dedicated multi-threaded runtime when there is none.
    #[must_use]
    pub fn worker(mut self, handle: Handle) -> Self {
        self.worker = Some(handle);
        self
    }

    /// Where completion callbacks run. Defaults to [`Inline`].
    #[must_use]
    pub fn dispatch(mut self, dispatch: impl Dispatch + 'static) -> Self {
        self.dispatch = Arc::new(dispatch);
        self
    }

    /// Default entry type.
    #[must_use]
    pub fn type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    /// Default entry method.
    #[must_use]
    pub fn method_name(mut self, method_name: impl Into<String>) -> Self {
        self.method_name = Some(method_name.into());
        self
    }

    /// Guest runtime name used in method resolution diagnostics.
    #[must_use]
    pub fn runtime_label(mut self, label: impl Into<String>) -> Self {
        self.runtime_label = Some(label.into());
        self
    }

    /// Add a reference passed to every compilation.
    #[must_use]
    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.references.push(reference.into());
        self
    }

    /// Enable or disable the compiled-unit cache.
    #[must_use]
    pub fn cache(mut self, enabled: bool) -> Self {
        self.cache = Some(enabled);
        self
    }

    /// Build the bridge.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Worker`] if no worker runtime was supplied,
    /// none is current, and a dedicated one cannot be started.
    pub fn build(self) -> BridgeResult<Bridge> {
        let mut config = self.config;
        if let Some(type_name) = self.type_name {
            config.entry.type_name = type_name;
        }
        if let Some(method_name) = self.method_name {
            config.entry.method_name = method_name;
        }
        if let Some(label) = self.runtime_label {
            config.compiler.runtime_label = label;
        }
        if let Some(enabled) = self.cache {
            config.cache.enabled = enabled;
        }
        config.compiler.references.extend(self.references);

        let worker = match self.worker {
            Some(handle) => Worker::shared(handle),
            None => Worker::current_or_owned()?,
        };

        debug!(
            entry_type = %config.entry.type_name,
            entry_method = %config.entry.method_name,
            cache = config.cache.enabled,
            owned_worker = worker.owned.is_some(),
            "Bridge built"
        );

        Ok(Bridge {
            inner: Arc::new(BridgeInner {
                compiler: self.compiler,
                loader: self.loader,
                config,
                worker,
                dispatch: self.dispatch,
                cache: UnitCache::new(),
            }),
        })
    }
}

/// Runtime executing guest invocations.
struct Worker {
    handle: Handle,
    owned: Option<OwnedRuntime>,
}

impl Worker {
    fn shared(handle: Handle) -> Self {
        Self {
            handle,
            owned: None,
        }
    }

    fn current_or_owned() -> BridgeResult<Self> {
        if let Ok(handle) = Handle::try_current() {
            return Ok(Self::shared(handle));
        }
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .thread_name("tandem-worker")
            .enable_all()
            .build()
            .map_err(BridgeError::Worker)?;
        Ok(Self {
            handle: runtime.handle().clone(),
            owned: Some(OwnedRuntime(Some(runtime))),
        })
    }
}

/// A dedicated runtime, shut down without blocking when the bridge drops.
struct OwnedRuntime(Option<Runtime>);

impl Drop for OwnedRuntime {
    fn drop(&mut self) {
        if let Some(runtime) = self.0.take() {
            runtime.shutdown_background();
        }
    }
}

struct BridgeInner {
    compiler: Arc<dyn Compiler>,
    loader: Arc<dyn SourceLoader>,
    config: BridgeConfig,
    worker: Worker,
    dispatch: Arc<dyn Dispatch>,
    cache: UnitCache,
}

/// Builds [`Func`]s from descriptors.
///
/// Cheap to clone; clones share the compiler, worker, dispatcher and cache.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

impl Bridge {
    /// Start building a bridge around a compilation service.
    pub fn builder(compiler: impl Compiler + 'static) -> BridgeBuilder {
        BridgeBuilder::new(compiler)
    }

    /// Effective configuration.
    #[must_use]
    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    /// Number of compiled units held by the cache.
    #[must_use]
    pub fn cached_units(&self) -> usize {
        self.inner.cache.len()
    }

    /// Build a function from a descriptor.
    ///
    /// # Errors
    ///
    /// Fails synchronously if the descriptor cannot be resolved, a source file
    /// cannot be read, the source does not compile, or the entry type or
    /// method is absent. Invocation never reports these.
    pub fn func(&self, descriptor: impl Into<Descriptor>) -> BridgeResult<Func> {
        let inner = &self.inner;
        let resolved =
            SourceResolver::new(inner.loader.as_ref(), &inner.config).resolve(descriptor.into())?;

        let mut locator = Locator::new(
            inner.compiler.as_ref(),
            &inner.config.compiler.runtime_label,
        );
        if inner.config.cache.enabled {
            locator = locator.with_cache(&inner.cache);
        }
        let callable = locator.locate(&resolved)?;

        info!(
            entry_point = %callable.entry_point(),
            kind = ?resolved.kind,
            asynchronous = callable.is_asynchronous(),
            "Built function"
        );

        Ok(Func {
            callable,
            bridge: Arc::clone(&self.inner),
        })
    }

    /// Build a function from a JSON descriptor: a string, or an object
    /// `{ source, typeName?, methodName?, references? }`.
    ///
    /// # Errors
    ///
    /// As [`func`](Self::func), plus [`BridgeError::Resolution`] for any
    /// other JSON shape.
    pub fn func_from_json(&self, descriptor: serde_json::Value) -> BridgeResult<Func> {
        self.func(Descriptor::try_from(descriptor)?)
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("config", &self.inner.config)
            .field("cached_units", &self.inner.cache.len())
            .finish_non_exhaustive()
    }
}

/// A callable bound to a guest entry point.
///
/// Clones share the bound method; calls never block the caller.
#[derive(Clone)]
pub struct Func {
    callable: BoundCallable,
    bridge: Arc<BridgeInner>,
}

impl Func {
    /// The bound type and method.
    #[must_use]
    pub fn entry_point(&self) -> &EntryPoint {
        self.callable.entry_point()
    }

    /// Whether the guest method returns a deferred value.
    #[must_use]
    pub fn is_asynchronous(&self) -> bool {
        self.callable.is_asynchronous()
    }

    /// Invoke with `input`. Returns immediately; `on_complete` fires exactly
    /// once with the result or the runtime error, through the bridge's
    /// dispatcher.
    pub fn call<F>(&self, input: impl Into<HostValue>, on_complete: F)
    where
        F: FnOnce(BridgeResult<HostValue>) + Send + 'static,
    {
        self.callable.invoke(
            &self.bridge.worker.handle,
            Arc::clone(&self.bridge.dispatch),
            input.into(),
            Box::new(on_complete),
        );
    }

    /// Invoke with `input` and await the result directly, bypassing the
    /// dispatcher.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Runtime`] if the guest faults or its result
    /// cannot be marshaled.
    pub async fn invoke(&self, input: impl Into<HostValue>) -> BridgeResult<HostValue> {
        self.callable
            .invoke_async(&self.bridge.worker.handle, input.into())
            .await
    }

    /// Invoke through the dispatcher and wait for the completion on a
    /// oneshot channel.
    ///
    /// With a queuing dispatcher the host must pump its loop concurrently.
    ///
    /// # Errors
    ///
    /// As [`invoke`](Self::invoke).
    pub async fn call_async(&self, input: impl Into<HostValue>) -> BridgeResult<HostValue> {
        let (tx, rx) = oneshot::channel();
        self.call(input, move |result| {
            let _ = tx.send(result);
        });
        rx.await
            .map_err(|_| BridgeError::runtime("completion was dropped before delivery"))?
    }
}

impl std::fmt::Debug for Func {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Func")
            .field("entry_point", self.entry_point())
            .field("asynchronous", &self.is_asynchronous())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;
    use crate::compiler::{CompileRequest, Diagnostic};
    use crate::dispatch::HostLoop;
    use crate::error::ErrorKind;
    use crate::guest::{GuestValue, ParamKind};
    use crate::source::FuncOptions;
    use crate::unit::{CompiledUnit, GuestCall, GuestType, MethodHandle, ReturnKind};

    /// Every source compiles to `Startup.Invoke`, an async greeter, unless it
    /// contains `error`.
    #[derive(Default)]
    struct Greeter {
        compiles: AtomicUsize,
    }

    impl Compiler for Greeter {
        fn compile(&self, request: &CompileRequest) -> Result<CompiledUnit, Diagnostic> {
            self.compiles.fetch_add(1, Ordering::SeqCst);
            if request.source.contains("error") {
                return Err(Diagnostic::new("error CS0116: unexpected token"));
            }
            let method = MethodHandle::new(
                "Invoke",
                ParamKind::Object,
                ReturnKind::Deferred,
                |input: GuestValue| {
                    GuestCall::pending(async move {
                        Ok(GuestValue::from(format!("Hello, {input}")))
                    })
                },
            );
            Ok(CompiledUnit::new().with_type(GuestType::new("Startup").with_method(method)))
        }
    }

    #[tokio::test]
    async fn test_func_round_trip() {
        let bridge = Bridge::builder(Greeter::default()).build().unwrap();
        let func = bridge.func("public class Startup {}").unwrap();
        assert_eq!(func.entry_point().to_string(), "Startup.Invoke");
        assert!(func.is_asynchronous());
        assert_eq!(
            func.invoke("JavaScript").await.unwrap(),
            HostValue::from("Hello, JavaScript")
        );
        assert_eq!(
            func.call_async("again").await.unwrap(),
            HostValue::from("Hello, again")
        );
    }

    #[tokio::test]
    async fn test_construction_errors_are_synchronous() {
        let bridge = Bridge::builder(Greeter::default()).build().unwrap();
        let err = bridge.func("this is an error").unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::CompilationError));

        let err = bridge
            .func(FuncOptions::new("public class Startup {}").with_method_name("Missing"))
            .unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::MethodResolutionError));
        assert!(err.to_string().starts_with("Unable to access guest method"));

        let err = bridge.func_from_json(json!([1, 2])).unwrap_err();
        assert!(matches!(err, BridgeError::Resolution(_)));
    }

    #[tokio::test]
    async fn test_builder_overrides_config() {
        let mut config = BridgeConfig::default();
        config.compiler.runtime_label = "from-config".into();
        config.entry.type_name = "Elsewhere".into();
        let bridge = Bridge::builder(Greeter::default())
            .type_name("Startup")
            .config(config)
            .runtime_label("CLR")
            .reference("System.dll")
            .build()
            .unwrap();
        assert_eq!(bridge.config().entry.type_name, "Startup");
        assert_eq!(bridge.config().compiler.runtime_label, "CLR");
        assert_eq!(bridge.config().compiler.references, vec!["System.dll"]);
    }

    #[tokio::test]
    async fn test_cache_enabled_compiles_once() {
        let compiler = Arc::new(Greeter::default());
        let bridge = BridgeBuilder::with_compiler(Arc::clone(&compiler) as Arc<dyn Compiler>)
            .cache(true)
            .build()
            .unwrap();
        bridge.func("public class Startup {}").unwrap();
        bridge.func("  public class Startup {}\n").unwrap();
        assert_eq!(compiler.compiles.load(Ordering::SeqCst), 1);
        assert_eq!(bridge.cached_units(), 1);
    }

    #[tokio::test]
    async fn test_host_loop_dispatch() {
        let host = HostLoop::new();
        let bridge = Bridge::builder(Greeter::default())
            .dispatch(host.clone())
            .build()
            .unwrap();
        let func = bridge.func("public class Startup {}").unwrap();

        let results = Arc::new(std::sync::Mutex::new(Vec::new()));
        for name in ["a", "b", "c"] {
            let results = Arc::clone(&results);
            func.call(name, move |result| {
                results.lock().unwrap().push(result.unwrap());
            });
        }
        assert_eq!(host.outstanding(), 3);
        host.run_until_idle().await;

        let mut results = results.lock().unwrap().clone();
        results.sort_by(|a, b| a.as_str().cmp(&b.as_str()));
        assert_eq!(
            results,
            vec![
                HostValue::from("Hello, a"),
                HostValue::from("Hello, b"),
                HostValue::from("Hello, c"),
            ]
        );
    }

    #[test]
    fn test_owned_worker_outside_runtime() {
        let bridge = Bridge::builder(Greeter::default()).build().unwrap();
        let func = bridge.func("public class Startup {}").unwrap();

        let (tx, rx) = std::sync::mpsc::channel();
        func.call("worker", move |result| {
            let _ = tx.send(result);
        });
        let result = rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .unwrap()
            .unwrap();
        assert_eq!(result, HostValue::from("Hello, worker"));
    }
}
