use std::fmt;
use std::time::Duration;

/// How `TypeText` chooses what to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeMode {
    /// Send the text argument as-is.
    Literal,
    /// Send the text argument followed by the submit keystroke.
    AppendEnter,
    /// Send the innermost `for` binding instead of the text argument.
    LoopVariable,
}

/// One step of a script.
///
/// Lists are built top-down from static configuration and never refer back to
/// themselves, so a tree of `Action`s is always finite.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Navigate {
        url: String,
    },
    Click {
        locator: String,
    },
    Clear {
        locator: String,
    },
    TypeText {
        locator: String,
        text: String,
        mode: TypeMode,
    },
    Wait {
        duration: Duration,
    },
    Refresh,
    /// Append the first matching element's text to the accumulator.
    ReadText {
        locator: String,
        /// Explicit name used by the "does not exist" diagnostic.
        label: Option<String>,
    },
    /// Run `then` only when `locator` matches at least one element.
    IfExists {
        locator: String,
        then: Vec<Action>,
    },
    /// Run `body` once per `", "`-separated token of `source`.
    ForEachToken {
        source: String,
        body: Vec<Action>,
    },
}

impl Action {
    /// The command name this action is written as in a script literal.
    pub fn command(&self) -> &'static str {
        match self {
            Action::Navigate { .. } => "get",
            Action::Click { .. } => "click",
            Action::Clear { .. } => "clear",
            Action::TypeText { .. } => "send_keys",
            Action::Wait { .. } => "sleep",
            Action::Refresh => "refresh",
            Action::ReadText { .. } => "text",
            Action::IfExists { .. } => "exist",
            Action::ForEachToken { .. } => "for",
        }
    }

    /// Apply `f` to every string argument of this action and of its nested lists,
    /// producing a rewritten copy. `path` is the position of `self`.
    pub fn try_map_strings<E, F>(&self, path: &ActionPath, f: &mut F) -> Result<Action, E>
    where
        F: FnMut(&str, &ActionPath) -> Result<String, E>,
    {
        let mapped = match self {
            Action::Navigate { url } => Action::Navigate { url: f(url, path)? },
            Action::Click { locator } => Action::Click {
                locator: f(locator, path)?,
            },
            Action::Clear { locator } => Action::Clear {
                locator: f(locator, path)?,
            },
            Action::TypeText {
                locator,
                text,
                mode,
            } => Action::TypeText {
                locator: f(locator, path)?,
                text: f(text, path)?,
                mode: *mode,
            },
            Action::Wait { duration } => Action::Wait {
                duration: *duration,
            },
            Action::Refresh => Action::Refresh,
            Action::ReadText { locator, label } => Action::ReadText {
                locator: f(locator, path)?,
                label: label.as_deref().map(|l| f(l, path)).transpose()?,
            },
            Action::IfExists { locator, then } => Action::IfExists {
                locator: f(locator, path)?,
                then: try_map_list(then, path, &mut *f)?,
            },
            Action::ForEachToken { source, body } => Action::ForEachToken {
                source: f(source, path)?,
                body: try_map_list(body, path, &mut *f)?,
            },
        };
        Ok(mapped)
    }
}

/// Rewrite every string in `actions`, whose parent is at `parent`.
pub fn try_map_list<E, F>(
    actions: &[Action],
    parent: &ActionPath,
    f: &mut F,
) -> Result<Vec<Action>, E>
where
    F: FnMut(&str, &ActionPath) -> Result<String, E>,
{
    actions
        .iter()
        .enumerate()
        .map(|(idx, action)| action.try_map_strings(&parent.child(idx), &mut *f))
        .collect()
}

/// Position of an action in a nested script, as zero-based indices from the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ActionPath(Vec<usize>);

impl ActionPath {
    /// The empty path, denoting the top-level list itself.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn child(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(index);
        Self(segments)
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for ActionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<root>");
        }
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl From<Vec<usize>> for ActionPath {
    fn from(segments: Vec<usize>) -> Self {
        Self(segments)
    }
}
