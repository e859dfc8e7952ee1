/*!
UI automation backends.

The interpreter only talks to the [`Backend`] trait; concrete sessions live in
their own files:

- `webdriver.rs` -> `WebDriverBackend` (W3C WebDriver over HTTP, e.g. chromedriver)
- `desktop.rs`   -> `DesktopBackend`   (mouse/keyboard input through Enigo, coordinate locators)
- `dry_run.rs`   -> `DryRunBackend`    (logs every call, touches nothing)

A backend session is exclusively owned by one interpreter invocation at a time and
is never shared across threads while a script runs.
*/

use std::thread;
use std::time::Duration;

use thiserror::Error;

use crate::config::BackendConfig;

pub mod desktop;
pub mod dry_run;
#[cfg(test)]
pub(crate) mod mock;
pub mod webdriver;

pub use desktop::DesktopBackend;
pub use dry_run::DryRunBackend;
pub use webdriver::WebDriverBackend;

/// Platform-neutral "submit" keystroke appended by `send_keys` in `enter` mode.
///
/// This is the WebDriver code point for Enter; non-WebDriver backends translate it.
pub const SUBMIT_KEY: char = '\u{E007}';

/// Failures surfaced by a backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("no element matches '{0}'")]
    ElementNotFound(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("session error: {0}")]
    Session(String),

    #[error("unsupported by this backend: {0}")]
    Unsupported(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Opaque reference to an element found by [`Backend::find_all`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle(pub String);

impl ElementHandle {
    pub fn id(&self) -> &str {
        &self.0
    }
}

/// Capability interface the interpreter drives.
///
/// `click`, `clear` and `send_keys` act on the first element matching the locator and
/// fail with [`BackendError::ElementNotFound`] when nothing matches. Implementations
/// are expected to block until the UI settles before returning.
pub trait Backend {
    /// Static identifier used in logs.
    fn name(&self) -> &'static str;

    fn navigate(&mut self, url: &str) -> Result<(), BackendError>;

    fn click(&mut self, locator: &str) -> Result<(), BackendError>;

    fn clear(&mut self, locator: &str) -> Result<(), BackendError>;

    fn send_keys(&mut self, locator: &str, text: &str) -> Result<(), BackendError>;

    fn refresh(&mut self) -> Result<(), BackendError>;

    /// Every element matching `locator`, in document order. Empty when nothing matches.
    fn find_all(&mut self, locator: &str) -> Result<Vec<ElementHandle>, BackendError>;

    fn text_content_of(&mut self, element: &ElementHandle) -> Result<String, BackendError>;

    /// Block the calling thread; used by `sleep` and the delay between `for` iterations.
    fn pause(&mut self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Open the backend selected by a run profile.
///
/// `dry_run` overrides whatever backend the profile names.
pub fn open(config: &BackendConfig, dry_run: bool) -> Result<Box<dyn Backend>, BackendError> {
    if dry_run {
        let assume_present = match config {
            BackendConfig::DryRun { assume_present } => *assume_present,
            _ => true,
        };
        return Ok(Box::new(DryRunBackend::new(assume_present)));
    }

    match config {
        BackendConfig::WebDriver(settings) => Ok(Box::new(WebDriverBackend::connect(settings)?)),
        BackendConfig::Desktop => Ok(Box::new(DesktopBackend::new())),
        BackendConfig::DryRun { assume_present } => {
            Ok(Box::new(DryRunBackend::new(*assume_present)))
        }
    }
}
