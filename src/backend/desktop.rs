use enigo::Keyboard as _;
use enigo::Mouse as _;
use enigo::{Button, Coordinate, Direction, Enigo, Key, Settings};
use tracing::{debug, trace};

use super::{Backend, BackendError, ElementHandle, SUBMIT_KEY};

#[cfg(target_os = "macos")]
const SELECT_ALL_MODIFIER: Key = Key::Meta;
#[cfg(not(target_os = "macos"))]
const SELECT_ALL_MODIFIER: Key = Key::Control;

/// Drives a desktop application with simulated mouse and keyboard input.
///
/// Locators are absolute screen coordinates written as `"x, y"`. Desktop windows
/// expose no DOM, so `find_all` only tells whether a locator is a usable coordinate
/// pair, and `navigate`, `refresh` and `text_content_of` are unsupported.
pub struct DesktopBackend {
    enigo: Option<Enigo>,
}

impl DesktopBackend {
    /// Input simulation is initialized lazily, on the first call that needs it.
    pub fn new() -> Self {
        Self { enigo: None }
    }

    fn ensure_enigo(&mut self) -> Result<&mut Enigo, BackendError> {
        if self.enigo.is_none() {
            trace!(target: "brokerscript::backend", "Initializing Enigo");
            let enigo = Enigo::new(&Settings::default())
                .map_err(|e| BackendError::Session(format!("failed to initialize Enigo: {e}")))?;
            self.enigo = Some(enigo);
        }
        self.enigo
            .as_mut()
            .ok_or_else(|| BackendError::Session("input simulation is unavailable".into()))
    }

    fn click_at(&mut self, locator: &str) -> Result<(), BackendError> {
        let (x, y) = parse_coordinates(locator)
            .ok_or_else(|| BackendError::ElementNotFound(locator.to_string()))?;
        let enigo = self.ensure_enigo()?;
        trace!(target: "brokerscript::backend", x, y, "click_at");
        enigo.move_mouse(x, y, Coordinate::Abs).map_err(input_error)?;
        enigo
            .button(Button::Left, Direction::Click)
            .map_err(input_error)?;
        Ok(())
    }
}

impl Default for DesktopBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for DesktopBackend {
    fn name(&self) -> &'static str {
        "desktop"
    }

    fn navigate(&mut self, url: &str) -> Result<(), BackendError> {
        Err(BackendError::Unsupported(format!("navigate to {url}")))
    }

    fn click(&mut self, locator: &str) -> Result<(), BackendError> {
        self.click_at(locator)
    }

    fn clear(&mut self, locator: &str) -> Result<(), BackendError> {
        self.click_at(locator)?;
        let enigo = self.ensure_enigo()?;
        enigo
            .key(SELECT_ALL_MODIFIER, Direction::Press)
            .map_err(input_error)?;
        let selected = enigo.key(Key::Unicode('a'), Direction::Click);
        // Release the modifier even if the selection keystroke failed
        enigo
            .key(SELECT_ALL_MODIFIER, Direction::Release)
            .map_err(input_error)?;
        selected.map_err(input_error)?;
        enigo
            .key(Key::Delete, Direction::Click)
            .map_err(input_error)?;
        Ok(())
    }

    fn send_keys(&mut self, locator: &str, text: &str) -> Result<(), BackendError> {
        self.click_at(locator)?;
        let enigo = self.ensure_enigo()?;
        for (i, chunk) in text.split(SUBMIT_KEY).enumerate() {
            if i > 0 {
                enigo
                    .key(Key::Return, Direction::Click)
                    .map_err(input_error)?;
            }
            if !chunk.is_empty() {
                enigo.text(chunk).map_err(input_error)?;
            }
        }
        debug!(target: "brokerscript::backend", %locator, chars = text.chars().count(), "Typed text");
        Ok(())
    }

    fn refresh(&mut self) -> Result<(), BackendError> {
        Err(BackendError::Unsupported("refresh".into()))
    }

    fn find_all(&mut self, locator: &str) -> Result<Vec<ElementHandle>, BackendError> {
        Ok(parse_coordinates(locator)
            .map(|(x, y)| vec![ElementHandle(format!("{x}, {y}"))])
            .unwrap_or_default())
    }

    fn text_content_of(&mut self, element: &ElementHandle) -> Result<String, BackendError> {
        Err(BackendError::Unsupported(format!(
            "reading text at {}",
            element.id()
        )))
    }
}

fn input_error(e: enigo::InputError) -> BackendError {
    BackendError::Session(format!("input simulation failed: {e}"))
}

/// Parse `"x, y"` into absolute screen coordinates.
pub fn parse_coordinates(locator: &str) -> Option<(i32, i32)> {
    let (x, y) = locator.split_once(',')?;
    Some((x.trim().parse().ok()?, y.trim().parse().ok()?))
}
