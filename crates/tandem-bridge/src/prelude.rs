//! Prelude module - commonly used types for convenient import.
//!
//! Use `use tandem_bridge::prelude::*;` to import the factory, values and
//! errors.

// Factory
pub use crate::{Bridge, BridgeBuilder, BridgeConfig, Func};

// Descriptors
pub use crate::{Descriptor, FuncOptions, Source};

// Values
pub use crate::{DynamicObject, GuestValue, HostValue, ParamKind};

// Compilation service
pub use crate::{
    CompileRequest, CompiledUnit, Compiler, Diagnostic, GuestCall, GuestException, GuestType,
    MethodHandle, Resolver, ReturnKind,
};

// Dispatch
pub use crate::{Dispatch, HostLoop, Inline};

// Errors
pub use crate::{BridgeError, BridgeResult, ErrorKind};
