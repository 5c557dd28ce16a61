//! Tandem Bridge - call guest-runtime code from a Rust host.
//!
//! A [`Bridge`] turns a descriptor into a [`Func`]:
//!
//! 1. [`directive`] strips `#r "<reference>"` lines and collects references.
//! 2. [`source`] normalizes the descriptor (inline text, file path, embedded
//!    comment, or explicit options) and wraps bare lambdas into a type.
//! 3. A [`Compiler`] compiles the text into a [`CompiledUnit`].
//! 4. [`locator`] looks up the entry type and method.
//! 5. [`adapter`] exposes the method through one asynchronous contract:
//!    one input, one completion, exactly once.
//!
//! Values cross the boundary through [`marshal`], failures through
//! [`translate`]. Construction failures are returned by [`Bridge::func`];
//! runtime failures only ever arrive through the completion.
//!
//! # Example
//!
//! ```rust,ignore
//! use tandem_bridge::prelude::*;
//!
//! let bridge = Bridge::builder(my_compiler).build()?;
//! let hello = bridge.func(r#"async (input) => "Hello, " + input.ToString();"#)?;
//! hello.call("JavaScript", |result| {
//!     assert_eq!(result.unwrap(), HostValue::from("Hello, JavaScript"));
//! });
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod adapter;
pub mod bridge;
pub mod cache;
pub mod compiler;
pub mod directive;
pub mod dispatch;
pub mod error;
pub mod guest;
pub mod loader;
pub mod locator;
pub mod marshal;
pub mod source;
pub mod translate;
pub mod unit;
pub mod value;

pub use adapter::{BoundCallable, Completion};
pub use bridge::{Bridge, BridgeBuilder, Func};
pub use cache::UnitCache;
pub use compiler::{CompileRequest, Compiler, Diagnostic};
pub use dispatch::{Dispatch, HostLoop, Inline};
pub use error::{BridgeError, BridgeResult, ErrorDescriptor, ErrorKind};
pub use guest::{DynamicObject, GuestValue, ParamKind};
pub use loader::{FsLoader, SourceLoader};
pub use locator::EntryPoint;
pub use source::{Descriptor, FuncOptions, ResolvedSource, Source, SourceKind, SourceShape};
pub use unit::{
    CompiledUnit, GuestCall, GuestException, GuestMethod, GuestResult, GuestType, MethodHandle,
    Resolver, ReturnKind,
};
pub use value::HostValue;

pub use tandem_config::BridgeConfig;
