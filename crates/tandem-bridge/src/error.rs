//! Error types for the bridge.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::value::HostValue;

/// Classification of a failure that crossed the runtime boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The compilation service rejected the source.
    CompilationError,
    /// The requested type is absent from the compiled unit.
    TypeResolutionError,
    /// The requested method is absent on the resolved type.
    MethodResolutionError,
    /// The guest code faulted during an invocation.
    RuntimeError,
}

impl ErrorKind {
    /// Name used when the error is rendered as a host value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CompilationError => "CompilationError",
            Self::TypeResolutionError => "TypeResolutionError",
            Self::MethodResolutionError => "MethodResolutionError",
            Self::RuntimeError => "RuntimeError",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All errors surfaced by the bridge.
///
/// For the four classified kinds, `Display` is exactly the diagnostic text
/// produced on the guest side. Callers match on that text, so it is never
/// prefixed, re-rendered or localized.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The descriptor matched none of the accepted shapes.
    #[error("unable to resolve source: {0}")]
    Resolution(String),

    /// A source file named by the descriptor could not be read.
    #[error("failed to read source file {path}: {source}")]
    Load {
        /// Path of the file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The compilation service rejected the source.
    #[error("{message}")]
    Compilation {
        /// Raw compiler diagnostic.
        message: String,
    },

    /// The requested type is absent from the compiled unit.
    #[error("{message}")]
    TypeResolution {
        /// Type that was looked up.
        type_name: String,
        /// Diagnostic text.
        message: String,
    },

    /// The requested method is absent on the resolved type.
    #[error("{message}")]
    MethodResolution {
        /// Type the method was looked up on.
        type_name: String,
        /// Method that was looked up.
        method_name: String,
        /// Diagnostic text.
        message: String,
    },

    /// The worker runtime for guest invocations could not be started.
    #[error("failed to start guest worker runtime: {0}")]
    Worker(#[source] std::io::Error),

    /// The guest code faulted, or its result could not be marshaled.
    #[error("{message}")]
    Runtime {
        /// Guest exception type, when the fault was a guest exception.
        exception_type: Option<String>,
        /// Original exception message.
        message: String,
    },
}

impl BridgeError {
    /// Build a runtime error without an exception type.
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime {
            exception_type: None,
            message: message.into(),
        }
    }

    /// Classify the error. Descriptor resolution, file loading and worker
    /// startup failures sit outside the guest taxonomy and return `None`.
    #[must_use]
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Resolution(_) | Self::Load { .. } | Self::Worker(_) => None,
            Self::Compilation { .. } => Some(ErrorKind::CompilationError),
            Self::TypeResolution { .. } => Some(ErrorKind::TypeResolutionError),
            Self::MethodResolution { .. } => Some(ErrorKind::MethodResolutionError),
            Self::Runtime { .. } => Some(ErrorKind::RuntimeError),
        }
    }

    /// Whether this error can only occur while building a function.
    #[must_use]
    pub fn is_construction_error(&self) -> bool {
        !matches!(self, Self::Runtime { .. })
    }

    /// Snapshot a classified error.
    #[must_use]
    pub fn descriptor(&self) -> Option<ErrorDescriptor> {
        self.kind().map(|kind| ErrorDescriptor {
            kind,
            message: self.to_string(),
        })
    }

    /// Render the error as a host object `{ name, message, exceptionType? }`.
    #[must_use]
    pub fn to_host_value(&self) -> HostValue {
        let name = self.kind().map_or("ResolutionError", ErrorKind::as_str);
        let mut object = BTreeMap::new();
        object.insert("name".to_owned(), HostValue::from(name));
        object.insert("message".to_owned(), HostValue::from(self.to_string()));
        if let Self::Runtime {
            exception_type: Some(ty),
            ..
        } = self
        {
            object.insert("exceptionType".to_owned(), HostValue::from(ty.as_str()));
        }
        HostValue::Object(object)
    }
}

/// A classified failure: its kind plus the verbatim diagnostic text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    /// Failure classification.
    pub kind: ErrorKind,
    /// Original diagnostic text.
    pub message: String,
}

/// A specialized Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;
