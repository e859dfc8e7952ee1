use std::time::Duration;

use tracing::info;

use super::{Backend, BackendError, ElementHandle};

/// Backend that only logs what it would do.
///
/// `find_all` answers every locator with one element when `assume_present` is set and
/// with none otherwise, so both sides of an `exist` branch can be rehearsed. Pauses are
/// logged and skipped.
#[derive(Debug, Clone)]
pub struct DryRunBackend {
    assume_present: bool,
}

impl DryRunBackend {
    pub fn new(assume_present: bool) -> Self {
        Self { assume_present }
    }
}

impl Backend for DryRunBackend {
    fn name(&self) -> &'static str {
        "dry_run"
    }

    fn navigate(&mut self, url: &str) -> Result<(), BackendError> {
        info!(target: "brokerscript::backend", %url, "DRY-RUN navigate");
        Ok(())
    }

    fn click(&mut self, locator: &str) -> Result<(), BackendError> {
        info!(target: "brokerscript::backend", %locator, "DRY-RUN click");
        Ok(())
    }

    fn clear(&mut self, locator: &str) -> Result<(), BackendError> {
        info!(target: "brokerscript::backend", %locator, "DRY-RUN clear");
        Ok(())
    }

    fn send_keys(&mut self, locator: &str, text: &str) -> Result<(), BackendError> {
        info!(target: "brokerscript::backend", %locator, text = %text.escape_default(), "DRY-RUN send_keys");
        Ok(())
    }

    fn refresh(&mut self) -> Result<(), BackendError> {
        info!(target: "brokerscript::backend", "DRY-RUN refresh");
        Ok(())
    }

    fn find_all(&mut self, locator: &str) -> Result<Vec<ElementHandle>, BackendError> {
        info!(
            target: "brokerscript::backend",
            %locator, present = self.assume_present,
            "DRY-RUN find_all"
        );
        if self.assume_present {
            Ok(vec![ElementHandle(locator.to_string())])
        } else {
            Ok(Vec::new())
        }
    }

    fn text_content_of(&mut self, element: &ElementHandle) -> Result<String, BackendError> {
        info!(target: "brokerscript::backend", element = %element.id(), "DRY-RUN text_content_of");
        Ok(format!("[text of {}]", element.id()))
    }

    fn pause(&mut self, duration: Duration) {
        info!(target: "brokerscript::backend", ms = duration.as_millis() as u64, "DRY-RUN pause");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presence_follows_setting() {
        let mut present = DryRunBackend::new(true);
        let found = present.find_all("#a").unwrap();
        assert_eq!(found, vec![ElementHandle("#a".into())]);
        assert_eq!(present.text_content_of(&found[0]).unwrap(), "[text of #a]");

        let mut absent = DryRunBackend::new(false);
        assert!(absent.find_all("#a").unwrap().is_empty());
    }

    #[test]
    fn test_pause_does_not_block() {
        let mut backend = DryRunBackend::new(true);
        let started = std::time::Instant::now();
        backend.pause(Duration::from_secs(30));
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
