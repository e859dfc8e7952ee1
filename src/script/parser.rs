use std::time::Duration;

use serde_json::Value;
use tracing::trace;

use super::action::{Action, ActionPath, TypeMode};
use crate::executor::error::{ErrorKind, InterpreterError};

/// Maximum nesting depth of `exist`/`for` bodies.
pub const MAX_DEPTH: usize = 32;

/// Parse a script literal such as
/// `[["get", "https://x"], ["exist", "#a", [["click", "#a"]]]]`.
pub fn parse_script(literal: &str) -> Result<Vec<Action>, InterpreterError> {
    let value: Value = serde_json::from_str(literal).map_err(|e| {
        InterpreterError::new(
            ActionPath::root(),
            ErrorKind::MalformedAction(format!("script is not a valid JSON list: {e}")),
        )
    })?;
    parse_list(&value, &ActionPath::root())
}

/// Parse an already-decoded JSON list of commands.
pub fn parse_list(value: &Value, path: &ActionPath) -> Result<Vec<Action>, InterpreterError> {
    if path.depth() > MAX_DEPTH {
        return Err(malformed(
            path,
            format!("nesting exceeds the maximum depth of {MAX_DEPTH}"),
        ));
    }
    let items = value
        .as_array()
        .ok_or_else(|| malformed(path, format!("expected a list of actions, found {value}")))?;

    items
        .iter()
        .enumerate()
        .map(|(idx, item)| parse_action(item, &path.child(idx)))
        .collect()
}

fn parse_action(value: &Value, path: &ActionPath) -> Result<Action, InterpreterError> {
    let parts = value
        .as_array()
        .ok_or_else(|| malformed(path, format!("expected [command, args...], found {value}")))?;
    let (command, args) = parts
        .split_first()
        .ok_or_else(|| malformed(path, "empty action".to_string()))?;
    let command = command
        .as_str()
        .ok_or_else(|| malformed(path, format!("command name must be a string, found {command}")))?;

    trace!(target: "brokerscript::script", %path, command, "Parsing action");

    let action = match command {
        "get" => {
            expect_arity(path, command, args, 1, 1)?;
            Action::Navigate {
                url: string_arg(path, command, args, 0)?,
            }
        }
        "click" => {
            expect_arity(path, command, args, 1, 1)?;
            Action::Click {
                locator: string_arg(path, command, args, 0)?,
            }
        }
        "clear" => {
            expect_arity(path, command, args, 1, 1)?;
            Action::Clear {
                locator: string_arg(path, command, args, 0)?,
            }
        }
        "send_keys" => {
            expect_arity(path, command, args, 2, 3)?;
            let locator = string_arg(path, command, args, 0)?;
            let text = string_arg(path, command, args, 1)?;
            let mode = match args.get(2) {
                None => TypeMode::Literal,
                Some(_) => match string_arg(path, command, args, 2)?.as_str() {
                    "literal" => TypeMode::Literal,
                    "enter" => TypeMode::AppendEnter,
                    "loop" => TypeMode::LoopVariable,
                    other => {
                        return Err(malformed(
                            path,
                            format!("unknown send_keys mode '{other}' (expected literal, enter or loop)"),
                        ));
                    }
                },
            };
            if mode == TypeMode::LoopVariable && !text.is_empty() {
                return Err(malformed(
                    path,
                    "send_keys in loop mode takes an empty text argument".to_string(),
                ));
            }
            Action::TypeText {
                locator,
                text,
                mode,
            }
        }
        "sleep" => {
            expect_arity(path, command, args, 1, 1)?;
            Action::Wait {
                duration: duration_arg(path, &args[0])?,
            }
        }
        "refresh" => {
            expect_arity(path, command, args, 0, 0)?;
            Action::Refresh
        }
        "text" => {
            expect_arity(path, command, args, 1, 2)?;
            let label = match args.get(1) {
                None => None,
                Some(_) => Some(string_arg(path, command, args, 1)?),
            };
            Action::ReadText {
                locator: string_arg(path, command, args, 0)?,
                label,
            }
        }
        "exist" => {
            expect_arity(path, command, args, 2, 2)?;
            Action::IfExists {
                locator: string_arg(path, command, args, 0)?,
                then: parse_list(&args[1], path)?,
            }
        }
        "for" => {
            expect_arity(path, command, args, 2, 2)?;
            Action::ForEachToken {
                source: string_arg(path, command, args, 0)?,
                body: parse_list(&args[1], path)?,
            }
        }
        other => return Err(malformed(path, format!("unknown command '{other}'"))),
    };
    Ok(action)
}

fn malformed(path: &ActionPath, message: String) -> InterpreterError {
    InterpreterError::new(path.clone(), ErrorKind::MalformedAction(message))
}

fn expect_arity(
    path: &ActionPath,
    command: &str,
    args: &[Value],
    min: usize,
    max: usize,
) -> Result<(), InterpreterError> {
    if (min..=max).contains(&args.len()) {
        return Ok(());
    }
    let expected = if min == max {
        format!("{min}")
    } else {
        format!("{min} to {max}")
    };
    Err(malformed(
        path,
        format!(
            "'{command}' takes {expected} argument(s), found {}",
            args.len()
        ),
    ))
}

fn string_arg(
    path: &ActionPath,
    command: &str,
    args: &[Value],
    index: usize,
) -> Result<String, InterpreterError> {
    match args.get(index) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(malformed(
            path,
            format!(
                "'{command}' argument {} must be a string, found {other}",
                index + 1
            ),
        )),
        None => Err(malformed(
            path,
            format!("'{command}' is missing argument {}", index + 1),
        )),
    }
}

/// Durations may be written as numbers or numeric strings (`0.8` or `"0.8"`).
fn duration_arg(path: &ActionPath, value: &Value) -> Result<Duration, InterpreterError> {
    let seconds = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| malformed(path, format!("'sleep' expects a number of seconds, found {value}")))?;

    Duration::try_from_secs_f64(seconds).map_err(|e| {
        malformed(
            path,
            format!("'sleep' duration must be a non-negative number of seconds, found {seconds} ({e})"),
        )
    })
}
