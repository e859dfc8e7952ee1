use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, trace};

use super::interpreter::{self, ExecutionContext, Interpreter};
use crate::backend::Backend;
use crate::config::{ConfigStore, InterpreterSettings};
use crate::script::{self, Action};
use crate::utils::interpolation;

/// Runtime is responsible for:
/// - fetching named action lists from the store
/// - parsing and resolving them into an action tree
/// - running the tree through the interpreter against a backend
pub struct Runtime {
    store: ConfigStore,
    interpreter: Interpreter,
}

impl Runtime {
    pub fn new(store: ConfigStore, settings: InterpreterSettings) -> Self {
        Self {
            store,
            interpreter: Interpreter::new(settings),
        }
    }

    /// Fetch, parse, resolve and validate `[section] key` without executing it.
    pub fn load(&self, section: &str, key: &str) -> Result<Vec<Action>> {
        let raw = self
            .store
            .get(section, key)
            .ok_or_else(|| anyhow!("Unknown action list '{key}' in section [{section}]"))?;
        trace!(target: "brokerscript::runtime", %section, %key, raw, "Fetched action list");

        let parsed = script::parse_script(raw)
            .with_context(|| format!("Action list '{key}' is malformed"))?;
        let resolved = interpolation::resolve_actions(&parsed, &self.store)
            .with_context(|| format!("Action list '{key}' has unresolved references"))?;
        interpreter::validate(&resolved)
            .with_context(|| format!("Action list '{key}' is invalid"))?;

        debug!(
            target: "brokerscript::runtime",
            %section, %key, actions = resolved.len(),
            "Action list loaded"
        );
        Ok(resolved)
    }

    /// Run `[section] key` against `backend` and return the texts it read.
    pub fn run(&self, section: &str, key: &str, backend: &mut dyn Backend) -> Result<Vec<String>> {
        let actions = self.load(section, key)?;

        info!(target: "brokerscript::runtime", %key, "Starting action list");
        let mut ctx = ExecutionContext::new(backend);
        self.interpreter
            .execute(&actions, &mut ctx)
            .with_context(|| format!("Action list '{key}' failed"))?;
        let texts = ctx.into_texts();

        info!(
            target: "brokerscript::runtime",
            %key, texts = texts.len(),
            "Action list completed"
        );
        Ok(texts)
    }

    /// Run several lists in order on one session, stopping at the first failure.
    pub fn run_all(
        &self,
        section: &str,
        keys: &[String],
        backend: &mut dyn Backend,
    ) -> Result<Vec<(String, Vec<String>)>> {
        let mut results = Vec::with_capacity(keys.len());
        for key in keys {
            let texts = self.run(section, key, backend)?;
            results.push((key.clone(), texts));
        }
        Ok(results)
    }
}
