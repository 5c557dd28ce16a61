//! Tandem Telemetry - Logging and invocation tracing for the tandem bridge.
//!
//! This crate provides:
//! - Configurable logging setup with multiple formats
//! - Invocation context for correlating a call with its completion
//! - Integration with the tracing ecosystem
//!
//! # Example
//!
//! ```rust,no_run
//! use tandem_telemetry::{InvocationContext, LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), tandem_telemetry::TelemetryError> {
//! let config = LogConfig::new("debug")
//!     .with_format(LogFormat::Compact)
//!     .with_directive("tandem_bridge=trace");
//!
//! setup_logging(&config)?;
//!
//! let ctx = InvocationContext::new("Startup.Invoke");
//! let span = ctx.span();
//! let _guard = span.enter();
//! tracing::info!("Invoking guest method");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod context;
mod error;
mod logging;

pub use context::InvocationContext;
pub use error::{TelemetryError, TelemetryResult};
pub use logging::{LogConfig, LogFormat, LogTarget, setup_default_logging, setup_logging};
