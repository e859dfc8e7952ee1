//! Configuration module for brokerscript.
//!
//! Two layers live here:
//! - the JSON run profile (`models`, `loader`): which backend to open, how the
//!   interpreter behaves, where the store is;
//! - the INI `store`: user settings and action lists, read-only once loaded.
//!
//! Example:
//! use brokerscript::config::{ConfigStore, load_from_path};
//!
//! let profile = load_from_path("profile.json")?;
//! let store = ConfigStore::load(&profile.store)?;

pub mod loader;
pub mod models;
pub mod store;

// Re-export core data models
pub use models::{
    BackendConfig, InterpreterSettings, LocatorStrategy, MissingTextPolicy, Profile,
    WebDriverSettings,
};

// Re-export loader utilities
pub use loader::{
    generate_schema, load_from_path, load_from_path_async, load_from_reader, load_from_str,
    validate_profile, write_schema_to_writer,
};

pub use store::{ConfigStore, DEFAULT_SECTION, StoreError};
