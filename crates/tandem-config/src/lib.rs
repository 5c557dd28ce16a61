#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
//! Configuration for the tandem bridge.
//!
//! A single [`BridgeConfig`] carries the entry-point conventions, the file
//! extensions recognized as source paths, the references handed to every
//! compilation and the compiled-unit cache switch.
//!
//! # Usage
//!
//! ```rust,no_run
//! use tandem_config::BridgeConfig;
//!
//! // Defaults, then an optional file, then environment fallbacks.
//! let config = BridgeConfig::load(Some(std::path::Path::new("tandem.toml"))).unwrap();
//! println!("default entry: {}::{}", config.entry.type_name, config.entry.method_name);
//! ```
//!
//! # Configuration Precedence
//!
//! From highest to lowest priority:
//!
//! 1. **File** passed to [`BridgeConfig::load`]
//! 2. **Environment variables** (`TANDEM_*`) for fields the file leaves unset
//! 3. **Embedded defaults** (`defaults.toml` compiled into the binary)
//!
//! Values set on the bridge builder or in a function descriptor override all
//! of these at the integration boundary.
//!
//! # Design
//!
//! This crate has **no dependencies on other internal tandem crates**.

/// Environment variable fallback resolution.
pub mod env;
/// Configuration error types.
pub mod error;
/// Configuration file loading.
pub mod loader;
/// Layered configuration merging.
pub mod merge;
/// Configuration struct definitions.
pub mod types;
/// Configuration validation rules.
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use types::*;

impl BridgeConfig {
    /// Load configuration: embedded defaults, the optional file at `path`,
    /// then `TANDEM_*` environment fallbacks.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file is malformed or the merged
    /// configuration fails validation.
    pub fn load(path: Option<&std::path::Path>) -> ConfigResult<Self> {
        loader::load(path)
    }
}
