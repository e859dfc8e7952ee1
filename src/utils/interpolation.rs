use thiserror::Error;

use crate::config::ConfigStore;
use crate::executor::error::{ErrorKind, InterpreterError};
use crate::script::action::{self, Action, ActionPath};

/// Name of the placeholder bound to the current `for` token (`${loop}`).
pub const LOOP_VARIABLE: &str = "loop";

/// A `${Section:Key}` placeholder whose section or key is absent from the store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unresolved reference ${{{section}:{key}}}")]
pub struct UnresolvedReference {
    pub section: String,
    pub key: String,
}

/// Replace every `${Section:Key}` placeholder in `raw` with its store value.
///
/// - Substituted values are inserted verbatim; they are never scanned again, so
///   store entries that mention themselves or each other cannot expand forever.
/// - `$$` yields a literal `$`.
/// - Anything else that is not a `${Section:Key}` token (a lone `$`, an unterminated
///   `${`, or `${name}` without a colon such as `${loop}`) is kept as written.
pub fn resolve(raw: &str, store: &ConfigStore) -> Result<String, UnresolvedReference> {
    Ok(render(&resolve_template(raw, store)?, None))
}

/// Resolve store references but keep `${loop}` for later, per iteration.
///
/// The result is template text in which every literal `$` is written `$$` and the
/// only other use of `$` is the loop placeholder. Escaped dollars and spliced store
/// values therefore can never turn into a loop reference. [`render`] produces the
/// final text.
pub fn resolve_template(raw: &str, store: &ConfigStore) -> Result<String, UnresolvedReference> {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(dollar) = rest.find('$') {
        out.push_str(&rest[..dollar]);
        let after = &rest[dollar + 1..];

        if let Some(tail) = after.strip_prefix('$') {
            out.push_str("$$");
            rest = tail;
            continue;
        }

        let Some(body_and_tail) = after.strip_prefix('{') else {
            out.push_str("$$");
            rest = after;
            continue;
        };
        let Some(close) = body_and_tail.find('}') else {
            // Unterminated: keep the remainder as literal text
            push_literal(&mut out, &rest[dollar..]);
            rest = "";
            break;
        };

        let token = &body_and_tail[..close];
        match token.split_once(':') {
            Some((section, key)) => {
                let value = store
                    .get(section, key)
                    .ok_or_else(|| UnresolvedReference {
                        section: section.to_string(),
                        key: key.to_string(),
                    })?;
                push_literal(&mut out, value);
            }
            None if token == LOOP_VARIABLE => out.push_str(&loop_token()),
            None => {
                out.push_str("$${");
                out.push_str(token);
                out.push('}');
            }
        }
        rest = &body_and_tail[close + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

/// Turn template text into final text.
///
/// `$$` becomes `$`; `${loop}` becomes `binding`, or stays as written when there is
/// no binding.
pub fn render(template: &str, binding: Option<&str>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    let token = loop_token();

    while let Some(dollar) = rest.find('$') {
        out.push_str(&rest[..dollar]);
        let tail = &rest[dollar..];
        if let Some(after) = tail.strip_prefix("$$") {
            out.push('$');
            rest = after;
        } else if let Some(after) = tail.strip_prefix(token.as_str()) {
            out.push_str(binding.unwrap_or(token.as_str()));
            rest = after;
        } else {
            out.push('$');
            rest = &tail[1..];
        }
    }

    out.push_str(rest);
    out
}

/// Resolve every string argument of `actions`, including nested `exist`/`for` bodies.
///
/// This is the single pre-pass performed before anything is sent to a backend; the
/// first unresolved placeholder aborts it with the path of the offending action.
/// Arguments come out as template text (see [`resolve_template`]).
pub fn resolve_actions(
    actions: &[Action],
    store: &ConfigStore,
) -> Result<Vec<Action>, InterpreterError> {
    action::try_map_list(actions, &ActionPath::root(), &mut |raw: &str, path: &ActionPath| {
        resolve_template(raw, store)
            .map_err(|e| InterpreterError::new(path.clone(), ErrorKind::UnresolvedReference(e)))
    })
}

/// Whether template text refers to the loop variable. Escaped `$$` never counts.
pub fn mentions_loop_variable(template: &str) -> bool {
    let token = loop_token();
    let mut rest = template;
    while let Some(dollar) = rest.find('$') {
        let tail = &rest[dollar..];
        if let Some(after) = tail.strip_prefix("$$") {
            rest = after;
        } else if tail.starts_with(token.as_str()) {
            return true;
        } else {
            rest = &tail[1..];
        }
    }
    false
}

fn push_literal(out: &mut String, text: &str) {
    out.push_str(&text.replace('$', "$$"));
}

fn loop_token() -> String {
    format!("${{{LOOP_VARIABLE}}}")
}
