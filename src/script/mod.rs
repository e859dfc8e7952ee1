//! Script model and loader.
//!
//! A script is a JSON list of commands, each written as `[command, args...]`:
//!
//! ```text
//! [["get", "https://example.com/"],
//!  ["exist", "//button[text()=\"Accept\"]", [["click", "//button[text()=\"Accept\"]"]]],
//!  ["for", "${Watchlist:symbols}", [["text", "#quote-${loop}"]]]]
//! ```
//!
//! Parsing turns the literal into the closed [`Action`] enum up front, so the
//! interpreter never sees an unknown command.

pub mod action;
pub mod parser;

pub use action::{Action, ActionPath, TypeMode};
pub use parser::{MAX_DEPTH, parse_list, parse_script};
