//! Entry-point location.
//!
//! Compiles a resolved source, then looks up the entry type and method in the
//! unit's lookup table. All three steps fail synchronously, so a function is
//! either fully built or not built at all.

use std::sync::Arc;

use tracing::debug;

use crate::adapter::BoundCallable;
use crate::cache::UnitCache;
use crate::compiler::{CompileRequest, Compiler};
use crate::error::{BridgeError, BridgeResult};
use crate::source::ResolvedSource;
use crate::translate;

/// The type and method invoked on every call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryPoint {
    /// Fully qualified type name.
    pub type_name: String,
    /// Method name.
    pub method_name: String,
}

impl EntryPoint {
    /// Create an entry point.
    pub fn new(type_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            method_name: method_name.into(),
        }
    }
}

impl std::fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.type_name, self.method_name)
    }
}

/// Locates entry points in compiled sources.
pub struct Locator<'a> {
    compiler: &'a dyn Compiler,
    cache: Option<&'a UnitCache>,
    runtime_label: &'a str,
}

impl<'a> Locator<'a> {
    /// Create a locator. `runtime_label` names the guest runtime in method
    /// resolution diagnostics.
    #[must_use]
    pub fn new(compiler: &'a dyn Compiler, runtime_label: &'a str) -> Self {
        Self {
            compiler,
            cache: None,
            runtime_label,
        }
    }

    /// Reuse compiled units through `cache`.
    #[must_use]
    pub fn with_cache(mut self, cache: &'a UnitCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Compile `source` and bind its entry point.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Compilation`] with the raw diagnostic if the
    /// source is rejected, [`BridgeError::TypeResolution`] if the entry type
    /// is absent, and [`BridgeError::MethodResolution`] if the entry method is
    /// absent on that type.
    pub fn locate(&self, source: &ResolvedSource) -> BridgeResult<BoundCallable> {
        let request = CompileRequest::new(source.text.clone(), source.references.clone());
        debug!(
            references = ?request.references,
            cached = self.cache.is_some(),
            "compiling guest source"
        );

        let unit = match self.cache {
            Some(cache) => cache.get_or_compile(&request, self.compiler),
            None => self.compiler.compile(&request).map(Arc::new),
        }
        .map_err(translate::from_diagnostic)?;

        let entry_point = EntryPoint::new(&source.type_name, &source.method_name);

        let Some(guest_type) = unit.find_type(&entry_point.type_name) else {
            debug!(type_name = %entry_point.type_name, "entry type not found");
            return Err(BridgeError::TypeResolution {
                message: format!(
                    "Could not load type '{}' from the compiled unit.",
                    entry_point.type_name
                ),
                type_name: entry_point.type_name,
            });
        };

        let Some(method) = guest_type.method(&entry_point.method_name) else {
            debug!(
                type_name = %entry_point.type_name,
                method_name = %entry_point.method_name,
                "entry method not found"
            );
            return Err(BridgeError::MethodResolution {
                message: format!(
                    "Unable to access {} method to wrap through reflection. Make sure the {} type exposes a public {} method that accepts a single argument.",
                    self.runtime_label, entry_point.type_name, entry_point.method_name
                ),
                type_name: entry_point.type_name,
                method_name: entry_point.method_name,
            });
        };

        debug!(
            entry_point = %entry_point,
            deferred = method.is_deferred(),
            "entry point bound"
        );
        Ok(BoundCallable::new(entry_point, method))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::Diagnostic;
    use crate::error::ErrorKind;
    use crate::guest::ParamKind;
    use crate::source::{SourceKind, SourceShape};
    use crate::unit::{CompiledUnit, GuestCall, GuestType, MethodHandle, ReturnKind};

    /// Declares `Startup.Invoke` unless the source says otherwise.
    struct Fixed;

    impl Compiler for Fixed {
        fn compile(&self, request: &CompileRequest) -> Result<CompiledUnit, Diagnostic> {
            if request.source == "malformed" {
                return Err(Diagnostic::new("(1,1): error CS1519: Invalid token"));
            }
            let method = MethodHandle::new(
                "Invoke",
                ParamKind::Object,
                ReturnKind::Deferred,
                |input| GuestCall::ready(Ok(input)),
            );
            Ok(CompiledUnit::new().with_type(GuestType::new("Startup").with_method(method)))
        }
    }

    fn resolved(text: &str, type_name: &str, method_name: &str) -> ResolvedSource {
        ResolvedSource {
            kind: SourceKind::Literal,
            raw_text: text.to_owned(),
            text: text.to_owned(),
            type_name: type_name.to_owned(),
            method_name: method_name.to_owned(),
            references: Vec::new(),
            shape: SourceShape::Class,
        }
    }

    #[test]
    fn test_binds_entry_point() {
        let bound = Locator::new(&Fixed, "guest")
            .locate(&resolved("ok", "Startup", "Invoke"))
            .unwrap();
        assert_eq!(bound.entry_point(), &EntryPoint::new("Startup", "Invoke"));
        assert!(bound.is_asynchronous());
    }

    #[test]
    fn test_three_distinguishable_failures() {
        let locator = Locator::new(&Fixed, "CLR");

        let err = locator
            .locate(&resolved("malformed", "Startup", "Invoke"))
            .unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::CompilationError));
        assert_eq!(err.to_string(), "(1,1): error CS1519: Invalid token");

        let err = locator
            .locate(&resolved("ok", "Startup_Bar", "Invoke"))
            .unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::TypeResolutionError));
        assert!(err.to_string().contains("Could not load type 'Startup_Bar'"));

        let err = locator
            .locate(&resolved("ok", "Startup", "Invoke_Foo"))
            .unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::MethodResolutionError));
        assert!(
            err.to_string()
                .starts_with("Unable to access CLR method to wrap through reflection")
        );
    }

    #[test]
    fn test_cache_shares_units() {
        let cache = UnitCache::new();
        let locator = Locator::new(&Fixed, "guest").with_cache(&cache);
        locator.locate(&resolved("ok", "Startup", "Invoke")).unwrap();
        locator.locate(&resolved("ok", "Startup", "Invoke")).unwrap();
        assert_eq!(cache.len(), 1);
    }
}
