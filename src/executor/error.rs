use thiserror::Error;

use crate::backend::BackendError;
use crate::script::ActionPath;
use crate::utils::interpolation::UnresolvedReference;

/// What went wrong while loading or running a script.
#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error(transparent)]
    UnresolvedReference(#[from] UnresolvedReference),

    #[error("loop variable used outside of a `for` body")]
    UnboundLoopVariable,

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("malformed action: {0}")]
    MalformedAction(String),
}

/// An [`ErrorKind`] together with the position of the action that raised it.
///
/// Every error aborts the whole invocation; the path makes page drift (a locator
/// that no longer matches) easy to pin down.
#[derive(Debug, Error)]
#[error("action {path}: {kind}")]
pub struct InterpreterError {
    pub path: ActionPath,
    pub kind: ErrorKind,
}

impl InterpreterError {
    pub fn new(path: ActionPath, kind: ErrorKind) -> Self {
        Self { path, kind }
    }

    pub fn is_backend(&self) -> bool {
        matches!(self.kind, ErrorKind::Backend(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chained_display_names_the_kind_once() {
        let err = InterpreterError::new(ActionPath::from(vec![1, 0]), ErrorKind::UnboundLoopVariable);
        let chained = format!("{:#}", anyhow::Error::new(err).context("Action list 'x' failed"));
        assert_eq!(
            chained,
            "Action list 'x' failed: action 1.0: loop variable used outside of a `for` body"
        );

        let err = InterpreterError::new(
            ActionPath::from(vec![0]),
            ErrorKind::Backend(BackendError::ElementNotFound("#a".into())),
        );
        let chained = format!("{:#}", anyhow::Error::new(err));
        assert_eq!(chained.matches("#a").count(), 1, "{chained}");
    }
}
