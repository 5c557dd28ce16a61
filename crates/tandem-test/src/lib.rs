//! Tandem Test - Shared test utilities for the tandem bridge.
//!
//! This crate provides a small guest compiler, mock collaborators, source
//! fixtures and harness helpers that can be used across tandem crates as a
//! dev-dependency.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! tandem-test.workspace = true
//! ```
//!
//! ```rust,ignore
//! use tandem_bridge::Bridge;
//! use tandem_test::{ScriptCompiler, ASYNC_LAMBDA};
//!
//! #[tokio::test]
//! async fn test_greeting() {
//!     let bridge = Bridge::builder(ScriptCompiler::new()).build().unwrap();
//!     let func = bridge.func(ASYNC_LAMBDA).unwrap();
//!     let result = func.invoke("JavaScript").await.unwrap();
//!     assert_eq!(result.as_str(), Some("Hello, JavaScript"));
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod fixtures;
pub mod harness;
pub mod mocks;
pub mod script;

pub use fixtures::*;
pub use harness::*;
pub use mocks::*;
pub use script::ScriptCompiler;
