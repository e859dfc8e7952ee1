use std::borrow::Cow;
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use super::error::{ErrorKind, InterpreterError};
use crate::backend::{Backend, BackendError, SUBMIT_KEY};
use crate::config::{InterpreterSettings, MissingTextPolicy};
use crate::script::{Action, ActionPath, TypeMode};
use crate::utils::interpolation::{mentions_loop_variable, render};

/// Separator between the tokens of a `for` source.
pub const TOKEN_DELIMITER: &str = ", ";

/// State of one top-level invocation.
///
/// - `backend`: the session, exclusively borrowed for the whole call.
/// - `texts`: the accumulator every `text` action appends to; recursive calls share
///   it and it is never reset while the invocation runs.
/// - `bindings`: one frame per active `for` iteration; only the innermost is visible.
pub struct ExecutionContext<'b> {
    backend: &'b mut dyn Backend,
    texts: Vec<String>,
    bindings: Vec<String>,
}

impl<'b> ExecutionContext<'b> {
    pub fn new(backend: &'b mut dyn Backend) -> Self {
        Self {
            backend,
            texts: Vec::new(),
            bindings: Vec::new(),
        }
    }

    pub fn into_texts(self) -> Vec<String> {
        self.texts
    }

    /// The current `for` token, if any.
    pub fn loop_binding(&self) -> Option<&str> {
        self.bindings.last().map(String::as_str)
    }

    /// Render a resolved argument into final text, substituting `${loop}` with the
    /// current binding.
    fn expand<'t>(&self, text: &'t str) -> Cow<'t, str> {
        if text.contains('$') {
            Cow::Owned(render(text, self.loop_binding()))
        } else {
            Cow::Borrowed(text)
        }
    }
}

/// Runs resolved action lists against a backend.
#[derive(Debug, Clone, Default)]
pub struct Interpreter {
    settings: InterpreterSettings,
}

impl Interpreter {
    pub fn new(settings: InterpreterSettings) -> Self {
        Self { settings }
    }

    pub fn loop_delay(&self) -> Duration {
        Duration::from_millis(self.settings.loop_delay_ms)
    }

    /// Execute `actions` in order, depth first.
    ///
    /// The tree is validated before anything reaches the backend. The first error of
    /// any kind aborts the whole invocation; nothing is retried.
    pub fn execute(
        &self,
        actions: &[Action],
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<(), InterpreterError> {
        validate(actions)?;

        info!(
            target: "brokerscript::interpreter",
            backend = ctx.backend.name(),
            actions = actions.len(),
            "Running"
        );
        match self.run_list(actions, &ActionPath::root(), ctx) {
            Ok(()) => {
                info!(
                    target: "brokerscript::interpreter",
                    texts = ctx.texts.len(),
                    "Completed"
                );
                Ok(())
            }
            Err(err) => {
                warn!(target: "brokerscript::interpreter", error = %err, "Failed");
                Err(err)
            }
        }
    }

    fn run_list(
        &self,
        actions: &[Action],
        parent: &ActionPath,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<(), InterpreterError> {
        for (idx, action) in actions.iter().enumerate() {
            self.run_action(action, &parent.child(idx), ctx)?;
        }
        Ok(())
    }

    fn run_action(
        &self,
        action: &Action,
        path: &ActionPath,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<(), InterpreterError> {
        let at = |e: BackendError| InterpreterError::new(path.clone(), ErrorKind::Backend(e));
        trace!(
            target: "brokerscript::interpreter",
            %path, command = action.command(), depth = ctx.bindings.len(),
            "Executing action"
        );

        match action {
            Action::Navigate { url } => {
                let url = ctx.expand(url).into_owned();
                ctx.backend.navigate(&url).map_err(at)
            }
            Action::Click { locator } => {
                let locator = ctx.expand(locator).into_owned();
                ctx.backend.click(&locator).map_err(at)
            }
            Action::Clear { locator } => {
                let locator = ctx.expand(locator).into_owned();
                ctx.backend.clear(&locator).map_err(at)
            }
            Action::TypeText {
                locator,
                text,
                mode,
            } => {
                let locator = ctx.expand(locator).into_owned();
                let keys = match mode {
                    TypeMode::Literal => ctx.expand(text).into_owned(),
                    TypeMode::AppendEnter => format!("{}{SUBMIT_KEY}", ctx.expand(text)),
                    TypeMode::LoopVariable => ctx
                        .loop_binding()
                        .ok_or_else(|| {
                            InterpreterError::new(path.clone(), ErrorKind::UnboundLoopVariable)
                        })?
                        .to_string(),
                };
                ctx.backend.send_keys(&locator, &keys).map_err(at)
            }
            Action::Wait { duration } => {
                ctx.backend.pause(*duration);
                Ok(())
            }
            Action::Refresh => ctx.backend.refresh().map_err(at),
            Action::ReadText { locator, label } => {
                let locator = ctx.expand(locator).into_owned();
                let label = label.as_deref().map(|l| ctx.expand(l).into_owned());
                let found = ctx.backend.find_all(&locator).map_err(at)?;
                match found.first() {
                    Some(element) => {
                        let text = ctx.backend.text_content_of(element).map_err(at)?;
                        debug!(target: "brokerscript::interpreter", %path, %locator, %text, "Read text");
                        ctx.texts.push(text);
                    }
                    None => self.record_missing(&locator, label.as_deref(), path, ctx),
                }
                Ok(())
            }
            Action::IfExists { locator, then } => {
                let locator = ctx.expand(locator).into_owned();
                let found = ctx.backend.find_all(&locator).map_err(at)?;
                debug!(
                    target: "brokerscript::interpreter",
                    %path, %locator, matches = found.len(),
                    "exist"
                );
                if found.is_empty() {
                    return Ok(());
                }
                self.run_list(then, path, ctx)
            }
            Action::ForEachToken { source, body } => {
                let source = ctx.expand(source).into_owned();
                let tokens = split_tokens(&source);
                debug!(
                    target: "brokerscript::interpreter",
                    %path, iterations = tokens.len(),
                    "for"
                );
                for token in tokens {
                    ctx.bindings.push(token.to_string());
                    let outcome = self.run_list(body, path, ctx);
                    ctx.bindings.pop();
                    outcome?;
                    ctx.backend.pause(self.loop_delay());
                }
                Ok(())
            }
        }
    }

    fn record_missing(
        &self,
        locator: &str,
        label: Option<&str>,
        path: &ActionPath,
        ctx: &mut ExecutionContext<'_>,
    ) {
        if self.settings.missing_text == MissingTextPolicy::Skip {
            debug!(target: "brokerscript::interpreter", %path, %locator, "No element to read; skipped");
            return;
        }
        let label = label
            .map(str::to_string)
            .or_else(|| derive_label(locator).map(str::to_string));
        match label {
            Some(label) => {
                debug!(target: "brokerscript::interpreter", %path, %locator, %label, "No element to read; recorded diagnostic");
                ctx.texts.push(format!("{label} does not exist."));
            }
            None => {
                debug!(target: "brokerscript::interpreter", %path, %locator, "No element to read and no label; skipped");
            }
        }
    }
}

/// Check that the loop variable is only used inside `for` bodies.
///
/// Runs before execution so a misplaced `send_keys ... "loop"` or `${loop}` fails
/// without any backend call.
pub fn validate(actions: &[Action]) -> Result<(), InterpreterError> {
    validate_list(actions, &ActionPath::root(), false)
}

fn validate_list(
    actions: &[Action],
    parent: &ActionPath,
    in_loop: bool,
) -> Result<(), InterpreterError> {
    for (idx, action) in actions.iter().enumerate() {
        let path = parent.child(idx);
        let unbound = || InterpreterError::new(path.clone(), ErrorKind::UnboundLoopVariable);

        if !in_loop {
            if let Action::TypeText {
                mode: TypeMode::LoopVariable,
                ..
            } = action
            {
                return Err(unbound());
            }
            if own_strings(action).any(mentions_loop_variable) {
                return Err(unbound());
            }
        }

        match action {
            Action::IfExists { then, .. } => validate_list(then, &path, in_loop)?,
            Action::ForEachToken { body, .. } => validate_list(body, &path, true)?,
            _ => {}
        }
    }
    Ok(())
}

/// String arguments of `action` itself, excluding nested lists.
fn own_strings(action: &Action) -> impl Iterator<Item = &str> {
    let strings: Vec<&str> = match action {
        Action::Navigate { url } => vec![url.as_str()],
        Action::Click { locator }
        | Action::Clear { locator }
        | Action::IfExists { locator, .. } => vec![locator.as_str()],
        Action::TypeText { locator, text, .. } => vec![locator.as_str(), text.as_str()],
        Action::Wait { .. } | Action::Refresh => Vec::new(),
        Action::ReadText { locator, label } => {
            let mut v = vec![locator.as_str()];
            v.extend(label.as_deref());
            v
        }
        Action::ForEachToken { source, .. } => vec![source.as_str()],
    };
    strings.into_iter()
}

/// Split a `for` source on `", "`. Empty sources and empty tokens yield nothing.
pub fn split_tokens(source: &str) -> Vec<&str> {
    source
        .split(TOKEN_DELIMITER)
        .filter(|token| !token.is_empty())
        .collect()
}

/// The first quoted literal in a locator, e.g. `ポートフォリオ` in
/// `//a[text()="ポートフォリオ"]`.
pub fn derive_label(locator: &str) -> Option<&str> {
    let (start, quote) = locator.char_indices().find(|(_, c)| *c == '"' || *c == '\'')?;
    let rest = &locator[start + quote.len_utf8()..];
    let end = rest.find(quote)?;
    let label = &rest[..end];
    (!label.is_empty()).then_some(label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::{Call, RecordingBackend};

    fn click(locator: &str) -> Action {
        Action::Click {
            locator: locator.into(),
        }
    }

    fn read(locator: &str) -> Action {
        Action::ReadText {
            locator: locator.into(),
            label: None,
        }
    }

    fn type_loop(locator: &str) -> Action {
        Action::TypeText {
            locator: locator.into(),
            text: String::new(),
            mode: TypeMode::LoopVariable,
        }
    }

    fn run(
        interpreter: &Interpreter,
        actions: &[Action],
        backend: &mut RecordingBackend,
    ) -> Result<Vec<String>, InterpreterError> {
        let mut ctx = ExecutionContext::new(backend);
        interpreter.execute(actions, &mut ctx)?;
        Ok(ctx.into_texts())
    }

    #[test]
    fn test_executes_depth_first_left_to_right() {
        let mut backend = RecordingBackend::new()
            .with_element("#menu", "Menu")
            .with_element("#item", "Item")
            .with_element("#q", "");
        let actions = vec![
            Action::Navigate {
                url: "https://x".into(),
            },
            Action::IfExists {
                locator: "#menu".into(),
                then: vec![
                    click("#menu"),
                    Action::IfExists {
                        locator: "#absent".into(),
                        then: vec![click("#never")],
                    },
                    click("#item"),
                ],
            },
            Action::Clear {
                locator: "#q".into(),
            },
            Action::Refresh,
        ];

        run(&Interpreter::default(), &actions, &mut backend).unwrap();
        assert_eq!(
            backend.calls,
            vec![
                Call::Navigate("https://x".into()),
                Call::FindAll("#menu".into()),
                Call::Click("#menu".into()),
                Call::FindAll("#absent".into()),
                Call::Click("#item".into()),
                Call::Clear("#q".into()),
                Call::Refresh,
            ]
        );
    }

    #[test]
    fn test_for_each_binds_tokens_in_order_and_pauses_after_each() {
        let mut backend = RecordingBackend::new().with_element("#symbol", "");
        let interpreter = Interpreter::new(InterpreterSettings {
            loop_delay_ms: 250,
            ..Default::default()
        });
        let actions = vec![Action::ForEachToken {
            source: "1, 2, 3".into(),
            body: vec![type_loop("#symbol")],
        }];

        run(&interpreter, &actions, &mut backend).unwrap();
        let delay = Duration::from_millis(250);
        assert_eq!(
            backend.calls,
            vec![
                Call::SendKeys("#symbol".into(), "1".into()),
                Call::Pause(delay),
                Call::SendKeys("#symbol".into(), "2".into()),
                Call::Pause(delay),
                Call::SendKeys("#symbol".into(), "3".into()),
                Call::Pause(delay),
            ]
        );
    }

    #[test]
    fn test_empty_source_runs_zero_iterations() {
        let mut backend = RecordingBackend::new();
        let actions = vec![Action::ForEachToken {
            source: String::new(),
            body: vec![click("#a")],
        }];
        run(&Interpreter::default(), &actions, &mut backend).unwrap();
        assert!(backend.calls.is_empty());
        assert_eq!(split_tokens("a, , b"), vec!["a", "b"]);
        assert_eq!(split_tokens("a,b"), vec!["a,b"]);
    }

    #[test]
    fn test_nested_loops_see_the_innermost_binding() {
        let mut backend = RecordingBackend::new()
            .with_element("#outer", "")
            .with_element("#inner", "");
        let interpreter = Interpreter::new(InterpreterSettings {
            loop_delay_ms: 0,
            ..Default::default()
        });
        let actions = vec![Action::ForEachToken {
            source: "a, b".into(),
            body: vec![
                Action::ForEachToken {
                    source: "${loop}1, ${loop}2".into(),
                    body: vec![type_loop("#inner")],
                },
                type_loop("#outer"),
            ],
        }];

        run(&interpreter, &actions, &mut backend).unwrap();
        let typed: Vec<(String, String)> = backend
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::SendKeys(l, t) => Some((l.clone(), t.clone())),
                _ => None,
            })
            .collect();
        assert_eq!(
            typed,
            vec![
                ("#inner".to_string(), "a1".to_string()),
                ("#inner".to_string(), "a2".to_string()),
                ("#outer".to_string(), "a".to_string()),
                ("#inner".to_string(), "b1".to_string()),
                ("#inner".to_string(), "b2".to_string()),
                ("#outer".to_string(), "b".to_string()),
            ]
        );
    }

    #[test]
    fn test_if_exists_skips_branch_when_nothing_matches() {
        let actions = vec![Action::IfExists {
            locator: "#popup".into(),
            then: vec![click("#close"), Action::Refresh],
        }];

        let mut absent = RecordingBackend::new();
        run(&Interpreter::default(), &actions, &mut absent).unwrap();
        assert_eq!(absent.calls, vec![Call::FindAll("#popup".into())]);

        let mut present = RecordingBackend::new()
            .with_element("#popup", "")
            .with_element("#close", "");
        run(&Interpreter::default(), &actions, &mut present).unwrap();
        assert_eq!(
            present.calls,
            vec![
                Call::FindAll("#popup".into()),
                Call::Click("#close".into()),
                Call::Refresh,
            ]
        );
    }

    #[test]
    fn test_loop_mode_outside_a_loop_fails_before_any_backend_call() {
        let mut backend = RecordingBackend::new().with_element("#a", "");
        let actions = vec![
            Action::Navigate {
                url: "https://x".into(),
            },
            Action::IfExists {
                locator: "#a".into(),
                then: vec![type_loop("#a")],
            },
        ];
        let err = run(&Interpreter::default(), &actions, &mut backend).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::UnboundLoopVariable));
        assert_eq!(err.path.to_string(), "1.0");
        assert!(backend.calls.is_empty());
    }

    #[test]
    fn test_loop_placeholder_outside_a_loop_is_unbound() {
        let mut backend = RecordingBackend::new();
        let actions = vec![
            Action::ForEachToken {
                source: "1".into(),
                body: vec![],
            },
            read("#quote-${loop}"),
        ];
        let err = run(&Interpreter::default(), &actions, &mut backend).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::UnboundLoopVariable));
        assert_eq!(err.path.to_string(), "1");
        assert!(backend.calls.is_empty());

        // The source of a top-level loop is evaluated outside that loop
        let actions = vec![Action::ForEachToken {
            source: "${loop}".into(),
            body: vec![],
        }];
        assert!(run(&Interpreter::default(), &actions, &mut backend).is_err());
    }

    #[test]
    fn test_reads_quotes_for_each_symbol() {
        let mut backend = RecordingBackend::new()
            .with_element("#quote-7203", "A")
            .with_element("#quote-9984", "B");
        let actions = vec![
            Action::Navigate {
                url: "https://x".into(),
            },
            Action::IfExists {
                locator: "#missing".into(),
                then: vec![click("#a")],
            },
            Action::ForEachToken {
                source: "7203, 9984".into(),
                body: vec![read("#quote-${loop}")],
            },
        ];

        let texts = run(&Interpreter::default(), &actions, &mut backend).unwrap();
        assert_eq!(texts, vec!["A", "B"]);
        assert_eq!(backend.count(|c| matches!(c, Call::Navigate(_))), 1);
        assert_eq!(backend.count(|c| matches!(c, Call::Click(_))), 0);
        assert_eq!(
            backend.count(|c| matches!(c, Call::FindAll(l) if l.starts_with("#quote-"))),
            2
        );
        assert_eq!(backend.count(|c| matches!(c, Call::TextContentOf(_))), 2);
        assert_eq!(backend.pauses(), vec![Duration::from_millis(1000); 2]);
    }

    #[test]
    fn test_read_text_takes_the_first_match() {
        let mut backend = RecordingBackend::new()
            .with_element(".row", "first")
            .with_element(".row", "second");
        let texts = run(&Interpreter::default(), &[read(".row")], &mut backend).unwrap();
        assert_eq!(texts, vec!["first"]);
    }

    #[test]
    fn test_missing_text_policy() {
        let actions = vec![
            read(r#"//p[text()="メンテナンス"]"#),
            read("#no-label"),
            Action::ReadText {
                locator: "#volume".into(),
                label: Some("Volume".into()),
            },
        ];

        let mut backend = RecordingBackend::new();
        let texts = run(&Interpreter::default(), &actions, &mut backend).unwrap();
        assert!(texts.is_empty());

        let diagnostic = Interpreter::new(InterpreterSettings {
            missing_text: MissingTextPolicy::Diagnostic,
            ..Default::default()
        });
        let mut backend = RecordingBackend::new();
        let texts = run(&diagnostic, &actions, &mut backend).unwrap();
        assert_eq!(
            texts,
            vec!["メンテナンス does not exist.", "Volume does not exist."]
        );
    }

    #[test]
    fn test_append_enter_adds_submit_key() {
        let mut backend = RecordingBackend::new().with_element("#search", "");
        let actions = vec![Action::TypeText {
            locator: "#search".into(),
            text: "7203".into(),
            mode: TypeMode::AppendEnter,
        }];
        run(&Interpreter::default(), &actions, &mut backend).unwrap();
        assert_eq!(
            backend.calls,
            vec![Call::SendKeys("#search".into(), format!("7203{SUBMIT_KEY}"))]
        );
    }

    #[test]
    fn test_wait_pauses_for_the_given_duration() {
        let mut backend = RecordingBackend::new();
        run(
            &Interpreter::default(),
            &[Action::Wait {
                duration: Duration::from_millis(800),
            }],
            &mut backend,
        )
        .unwrap();
        assert_eq!(backend.pauses(), vec![Duration::from_millis(800)]);
    }

    #[test]
    fn test_backend_error_aborts_the_invocation_with_its_path() {
        let mut backend = RecordingBackend::new().with_element("#ok", "");
        let actions = vec![
            Action::ForEachToken {
                source: "1, 2".into(),
                body: vec![click("#ok"), click("#gone-${loop}")],
            },
            click("#ok"),
        ];
        let err = run(&Interpreter::default(), &actions, &mut backend).unwrap_err();
        assert_eq!(err.path.to_string(), "0.1");
        assert!(err.is_backend());
        assert!(matches!(
            err.kind,
            ErrorKind::Backend(BackendError::ElementNotFound(ref l)) if l == "#gone-1"
        ));
        // No continuation: second iteration, loop delay and trailing click never happen
        assert_eq!(
            backend.calls,
            vec![Call::Click("#ok".into()), Call::Click("#gone-1".into())]
        );
    }

    #[test]
    fn test_binding_is_not_visible_after_the_loop() {
        let mut backend = RecordingBackend::new().with_element("#a", "");
        let actions = vec![
            Action::ForEachToken {
                source: "x".into(),
                body: vec![type_loop("#a")],
            },
            type_loop("#a"),
        ];
        let err = run(&Interpreter::default(), &actions, &mut backend).unwrap_err();
        assert_eq!(err.path.to_string(), "1");
        assert!(backend.calls.is_empty());
    }

    #[test]
    fn test_labels_come_from_the_first_quoted_literal() {
        assert_eq!(derive_label(r#"//a[text()="注文照会"]"#), Some("注文照会"));
        assert_eq!(derive_label("//input[@value='次へ']"), Some("次へ"));
        assert_eq!(derive_label("#price"), None);
        assert_eq!(derive_label(r#"//a[text()=""]"#), None);
        assert_eq!(derive_label(r#"//a[text()="open"#), None);
    }
}
