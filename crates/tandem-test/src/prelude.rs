//! Prelude module - commonly used types for convenient import.
//!
//! ```rust,ignore
//! use tandem_test::prelude::*;
//! ```

// Compiler
pub use crate::ScriptCompiler;

// Mocks
pub use crate::{CountingCompiler, MemoryLoader};

// Harness
pub use crate::{call_and_wait, init_test_logging, script_bridge};
