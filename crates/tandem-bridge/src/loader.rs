//! Source file loading.

use std::path::Path;

/// Reads source files named by a descriptor.
pub trait SourceLoader: Send + Sync {
    /// Read the whole file at `path` as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the file cannot be read.
    fn load(&self, path: &Path) -> std::io::Result<String>;
}

/// Loads source from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsLoader;

impl SourceLoader for FsLoader {
    fn load(&self, path: &Path) -> std::io::Result<String> {
        std::fs::read_to_string(path)
    }
}
