//! Compiled-unit cache.
//!
//! Units are keyed by a BLAKE3 hash over the cleaned source and the ordered
//! reference list, so descriptors that differ only in shape (literal, file,
//! embedded) share one compilation. Diagnostics are never cached.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::compiler::{CompileRequest, Compiler, Diagnostic};
use crate::unit::CompiledUnit;

/// Hash identifying a compile request.
#[must_use]
pub fn cache_key(request: &CompileRequest) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    update_framed(&mut hasher, request.source.as_bytes());
    for reference in &request.references {
        update_framed(&mut hasher, reference.as_bytes());
    }
    hasher.finalize()
}

/// Length-prefix each field so `("ab", ["c"])` and `("a", ["bc"])` differ.
fn update_framed(hasher: &mut blake3::Hasher, bytes: &[u8]) {
    hasher.update(&(bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

/// Shared cache of compiled units.
#[derive(Debug, Default)]
pub struct UnitCache {
    units: DashMap<blake3::Hash, Arc<CompiledUnit>>,
}

impl UnitCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached unit for `request`, compiling it on a miss.
    ///
    /// # Errors
    ///
    /// Returns the compiler's [`Diagnostic`] on a miss that fails to compile.
    pub fn get_or_compile(
        &self,
        request: &CompileRequest,
        compiler: &dyn Compiler,
    ) -> Result<Arc<CompiledUnit>, Diagnostic> {
        let key = cache_key(request);
        if let Some(unit) = self.units.get(&key) {
            debug!(key = %key.to_hex(), "compiled unit cache hit");
            return Ok(Arc::clone(unit.value()));
        }

        let unit = Arc::new(compiler.compile(request)?);
        // A concurrent miss may have inserted first; keep whichever landed.
        let entry = self.units.entry(key).or_insert(unit);
        debug!(key = %key.to_hex(), "compiled unit cached");
        Ok(Arc::clone(entry.value()))
    }

    /// Number of cached units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Drop every cached unit.
    pub fn clear(&self) {
        self.units.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::unit::GuestType;

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
    }

    impl Compiler for Counting {
        fn compile(&self, request: &CompileRequest) -> Result<CompiledUnit, Diagnostic> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if request.source.contains("broken") {
                return Err(Diagnostic::new("error CS1002: ; expected"));
            }
            Ok(CompiledUnit::new().with_type(GuestType::new("Startup")))
        }
    }

    #[test]
    fn test_hit_skips_compiler() {
        let cache = UnitCache::new();
        let compiler = Counting::default();
        let request = CompileRequest::new("public class Startup {}", vec![]);

        let first = cache.get_or_compile(&request, &compiler).unwrap();
        let second = cache.get_or_compile(&request, &compiler).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(compiler.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_references_are_part_of_key() {
        let plain = CompileRequest::new("src", vec![]);
        let with_ref = CompileRequest::new("src", vec!["System.Data.dll".into()]);
        assert_ne!(cache_key(&plain), cache_key(&with_ref));

        let a = CompileRequest::new("ab", vec!["c".into()]);
        let b = CompileRequest::new("a", vec!["bc".into()]);
        assert_ne!(cache_key(&a), cache_key(&b));

        let ordered = CompileRequest::new("s", vec!["x".into(), "y".into()]);
        let reversed = CompileRequest::new("s", vec!["y".into(), "x".into()]);
        assert_ne!(cache_key(&ordered), cache_key(&reversed));
    }

    #[test]
    fn test_diagnostics_not_cached() {
        let cache = UnitCache::new();
        let compiler = Counting::default();
        let request = CompileRequest::new("broken", vec![]);
        assert!(cache.get_or_compile(&request, &compiler).is_err());
        assert!(cache.get_or_compile(&request, &compiler).is_err());
        assert_eq!(compiler.calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }
}
