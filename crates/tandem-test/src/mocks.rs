//! Mock collaborators for testing.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tandem_bridge::{CompileRequest, CompiledUnit, Compiler, Diagnostic, SourceLoader};

/// In-memory [`SourceLoader`].
///
/// Cheap to clone; clones share the same files. Every path passed to
/// [`load`](SourceLoader::load) is recorded.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    files: Arc<Mutex<HashMap<PathBuf, String>>>,
    reads: Arc<Mutex<Vec<PathBuf>>>,
}

impl MemoryLoader {
    /// Create an empty loader.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file.
    #[must_use]
    pub fn with_file(self, path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        self.insert(path, text);
        self
    }

    /// Add or replace a file.
    pub fn insert(&self, path: impl Into<PathBuf>, text: impl Into<String>) {
        if let Ok(mut files) = self.files.lock() {
            files.insert(path.into(), text.into());
        }
    }

    /// Paths read so far, in order.
    #[must_use]
    pub fn reads(&self) -> Vec<PathBuf> {
        self.reads.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl SourceLoader for MemoryLoader {
    fn load(&self, path: &Path) -> std::io::Result<String> {
        if let Ok(mut reads) = self.reads.lock() {
            reads.push(path.to_path_buf());
        }
        let files = self
            .files
            .lock()
            .map_err(|_| std::io::Error::other("loader lock poisoned"))?;
        files.get(path).cloned().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no such file: {}", path.display()),
            )
        })
    }
}

/// A [`Compiler`] wrapper that records every request it forwards.
#[derive(Debug)]
pub struct CountingCompiler<C> {
    inner: C,
    count: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<CompileRequest>>>,
}

impl<C: Compiler> CountingCompiler<C> {
    /// Wrap `inner`.
    #[must_use]
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            count: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Shared counter of compilations, readable after the wrapper moves into
    /// a bridge.
    #[must_use]
    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.count)
    }

    /// Shared log of forwarded requests.
    #[must_use]
    pub fn request_log(&self) -> Arc<Mutex<Vec<CompileRequest>>> {
        Arc::clone(&self.requests)
    }

    /// Number of compilations so far.
    #[must_use]
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl<C: Compiler> Compiler for CountingCompiler<C> {
    fn compile(&self, request: &CompileRequest) -> Result<CompiledUnit, Diagnostic> {
        self.count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        self.inner.compile(request)
    }
}
