#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

/*!
Executor module for brokerscript.

This module wires together:
- `error`: the error taxonomy shared by the parser, resolver and interpreter
- `interpreter`: depth-first execution of an action tree against a backend
- `runtime`: store lookup, parsing, resolution and execution of named action lists

Typical usage:
- Construct a `Runtime` with a loaded `ConfigStore` and the profile's interpreter settings.
- Call `Runtime::run` with a section, a list key and an open backend.

Example:
```no_run
use brokerscript::backend::dry_run::DryRunBackend;
use brokerscript::config::{ConfigStore, InterpreterSettings};
use brokerscript::executor::Runtime;

let store = ConfigStore::load("trading.ini")?;
let runtime = Runtime::new(store, InterpreterSettings::default());
let mut backend = DryRunBackend::new(true);
let texts = runtime.run("Actions", "get_quotes", &mut backend)?;
# Ok::<(), anyhow::Error>(())
```
*/

pub mod error;
pub mod interpreter;
pub mod runtime;

// Re-exports for convenient access from `brokerscript::executor::*`
pub use error::{ErrorKind, InterpreterError};
pub use interpreter::{ExecutionContext, Interpreter};
pub use runtime::Runtime;
