//! Utilities for brokerscript.
//!
//! Submodules:
//! - `interpolation`: `${Section:Key}` references against the store and the `${loop}` placeholder.

pub mod interpolation;
