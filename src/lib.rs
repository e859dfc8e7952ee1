#![forbid(unsafe_code)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! brokerscript — a small interpreter that replays declarative browser action lists stored in
//! an INI file (logins, order status checks, quote scraping) against a UI backend.
//!
//! This crate organizes the codebase into cohesive modules and exposes a convenient prelude
//! for downstream crates/binaries:
//! - `backend`: the `Backend` trait and its WebDriver, desktop and dry-run implementations.
//! - `config`: the INI store, the JSON run profile, loader and schema helpers.
//! - `executor`: error taxonomy, interpreter and runtime.
//! - `script`: the action model and the action list parser.
//! - `utils`: `${Section:Key}` resolution and loop-variable substitution.
//!
//! Use `brokerscript::prelude::*` to bring commonly used items into scope quickly.

/// Public module: UI backends.
pub mod backend;
/// Public module: configuration (store, profile models, loader, schema helpers).
pub mod config;
/// Public module: execution engine (interpreter and runtime).
pub mod executor;
/// Public module: action model and parser.
pub mod script;
/// Public module: utilities (reference resolution).
pub mod utils;

/// Crate-level constants for consumers that want to inspect package metadata at runtime.
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the crate version (e.g., "0.1.0").
#[inline]
pub const fn version() -> &'static str {
    PKG_VERSION
}

/// Parse a level name (trace|debug|info|warn|error).
pub fn parse_level(s: &str) -> Option<tracing::Level> {
    use tracing::Level;

    match s.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Initialize tracing (logging) with a reasonable default.
/// - Honors the `RUST_LOG` environment variable if set.
/// - Falls back to `info` level.
///
/// Logs go to stderr so collected texts on stdout stay machine-readable.
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init_tracing() {
    let level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|s| parse_level(&s))
        .unwrap_or(tracing::Level::INFO);
    init_tracing_with_level(level);
}

/// Initialize tracing at an explicit level.
pub fn init_tracing_with_level(level: tracing::Level) {
    use tracing_subscriber::fmt;

    // Ignore the error if the global subscriber was already set.
    let _ = fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .try_init();
}

/// A convenient set of exports for most consumers.
///
/// Bring this into scope with:
/// `use brokerscript::prelude::*;`
pub mod prelude {
    // Common result/error handling
    pub use anyhow::{Context, Error, Result, anyhow, bail, ensure};

    // Serialization
    pub use serde::{Deserialize, Serialize};

    // Tracing macros
    pub use tracing::{debug, error, info, instrument, trace, warn};

    pub use std::time::Duration;

    pub use crate as brokerscript;

    // Frequently used items
    pub use crate::backend::{Backend, BackendError, ElementHandle};
    pub use crate::config::{ConfigStore, Profile};
    pub use crate::executor::{ErrorKind, InterpreterError, Runtime};
    pub use crate::script::{Action, ActionPath, TypeMode};
    pub use crate::{backend, config, executor, script, utils};
}
