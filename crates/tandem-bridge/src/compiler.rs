//! Compilation service seam.
//!
//! The bridge does not compile anything itself. A [`Compiler`] turns source
//! text plus an ordered reference list into a [`CompiledUnit`], or rejects it
//! with a [`Diagnostic`] whose text is surfaced to the caller verbatim.

use thiserror::Error;

use crate::unit::CompiledUnit;

/// A single compilation request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompileRequest {
    /// Source text with reference directives removed.
    pub source: String,
    /// References in the order they must be resolved.
    pub references: Vec<String>,
}

impl CompileRequest {
    /// Create a request.
    #[must_use]
    pub fn new(source: impl Into<String>, references: Vec<String>) -> Self {
        Self {
            source: source.into(),
            references,
        }
    }

    /// Whether `reference` was requested.
    #[must_use]
    pub fn has_reference(&self, reference: &str) -> bool {
        self.references.iter().any(|r| r == reference)
    }
}

/// Compiler diagnostic for rejected source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct Diagnostic {
    /// Diagnostic text as the compiler produced it.
    pub message: String,
}

impl Diagnostic {
    /// Create a diagnostic.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A compilation service for guest source.
///
/// Implementations must be callable from any thread. A compiled unit is
/// immutable once returned and shared by every function built from it.
pub trait Compiler: Send + Sync {
    /// Compile `request` into a unit.
    ///
    /// # Errors
    ///
    /// Returns a [`Diagnostic`] if the source is malformed or a reference
    /// cannot be satisfied.
    fn compile(&self, request: &CompileRequest) -> Result<CompiledUnit, Diagnostic>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Rejecting;

    impl Compiler for Rejecting {
        fn compile(&self, request: &CompileRequest) -> Result<CompiledUnit, Diagnostic> {
            Err(Diagnostic::new(format!(
                "(1,1): error CS1001: {} references",
                request.references.len()
            )))
        }
    }

    #[test]
    fn test_diagnostic_display_is_message() {
        let request = CompileRequest::new("class", vec!["System.dll".into()]);
        let err = Rejecting.compile(&request).unwrap_err();
        assert_eq!(err.to_string(), "(1,1): error CS1001: 1 references");
    }

    #[test]
    fn test_has_reference() {
        let request = CompileRequest::new("", vec!["System.Data.dll".into()]);
        assert!(request.has_reference("System.Data.dll"));
        assert!(!request.has_reference("System.dll"));
    }
}
