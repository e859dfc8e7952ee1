//! Recording backend shared by the unit tests.

use std::collections::HashMap;
use std::time::Duration;

use super::{Backend, BackendError, ElementHandle};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Navigate(String),
    Click(String),
    Clear(String),
    SendKeys(String, String),
    Refresh,
    FindAll(String),
    TextContentOf(String),
    Pause(Duration),
}

/// In-memory page: `elements[locator]` lists the texts of the matching elements.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    pub calls: Vec<Call>,
    elements: HashMap<String, Vec<String>>,
    failing: HashMap<String, String>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_element(mut self, locator: &str, text: &str) -> Self {
        self.elements
            .entry(locator.to_string())
            .or_default()
            .push(text.to_string());
        self
    }

    /// Make every call naming `locator` fail with a session error.
    pub fn failing_on(mut self, locator: &str, message: &str) -> Self {
        self.failing
            .insert(locator.to_string(), message.to_string());
        self
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    pub fn pauses(&self) -> Vec<Duration> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Pause(d) => Some(*d),
                _ => None,
            })
            .collect()
    }

    fn check(&self, locator: &str) -> Result<(), BackendError> {
        match self.failing.get(locator) {
            Some(message) => Err(BackendError::Session(message.clone())),
            None => Ok(()),
        }
    }

    fn require(&self, locator: &str) -> Result<(), BackendError> {
        self.check(locator)?;
        match self.elements.get(locator) {
            Some(texts) if !texts.is_empty() => Ok(()),
            _ => Err(BackendError::ElementNotFound(locator.to_string())),
        }
    }
}

impl Backend for RecordingBackend {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn navigate(&mut self, url: &str) -> Result<(), BackendError> {
        self.calls.push(Call::Navigate(url.to_string()));
        self.check(url)
    }

    fn click(&mut self, locator: &str) -> Result<(), BackendError> {
        self.calls.push(Call::Click(locator.to_string()));
        self.require(locator)
    }

    fn clear(&mut self, locator: &str) -> Result<(), BackendError> {
        self.calls.push(Call::Clear(locator.to_string()));
        self.require(locator)
    }

    fn send_keys(&mut self, locator: &str, text: &str) -> Result<(), BackendError> {
        self.calls
            .push(Call::SendKeys(locator.to_string(), text.to_string()));
        self.require(locator)
    }

    fn refresh(&mut self) -> Result<(), BackendError> {
        self.calls.push(Call::Refresh);
        Ok(())
    }

    fn find_all(&mut self, locator: &str) -> Result<Vec<ElementHandle>, BackendError> {
        self.calls.push(Call::FindAll(locator.to_string()));
        self.check(locator)?;
        let count = self.elements.get(locator).map_or(0, Vec::len);
        Ok((0..count)
            .map(|i| ElementHandle(format!("{locator}#{i}")))
            .collect())
    }

    fn text_content_of(&mut self, element: &ElementHandle) -> Result<String, BackendError> {
        self.calls.push(Call::TextContentOf(element.id().to_string()));
        let (locator, index) = element
            .id()
            .rsplit_once('#')
            .ok_or_else(|| BackendError::Protocol(format!("bad handle {}", element.id())))?;
        let index: usize = index
            .parse()
            .map_err(|_| BackendError::Protocol(format!("bad handle {}", element.id())))?;
        self.elements
            .get(locator)
            .and_then(|texts| texts.get(index))
            .cloned()
            .ok_or_else(|| BackendError::ElementNotFound(locator.to_string()))
    }

    fn pause(&mut self, duration: Duration) {
        self.calls.push(Call::Pause(duration));
    }
}
