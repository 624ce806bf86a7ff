use crate::store::controller::MapController;
use crate::store::events::StateChange;
use crate::traits::KmlMetadataProvider;
use crate::Result;
use crossbeam_channel::Receiver;
use instant::Instant;
use std::time::Duration;

/// Keeps the browser URL and the store in step without feedback loops.
///
/// Store changes are applied immediately; the URL follows after a quiet
/// period (`debounce`), and every further change restarts that period.
/// A URL this synchronizer wrote itself is ignored when the browser reports
/// it back, and the change events produced while a URL is being applied are
/// swallowed instead of being turned into another URL write.
pub struct UrlSynchronizer {
    base: String,
    debounce: Duration,
    events: Receiver<StateChange>,
    deadline: Option<Instant>,
    last_written: Option<String>,
}

impl UrlSynchronizer {
    /// Subscribes to `controller`; URLs are written below `base`
    pub fn attach(controller: &mut MapController, base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            debounce: controller.config().url.debounce(),
            events: controller.subscribe(),
            deadline: None,
            last_written: None,
        }
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// When the next URL write is due, if one is pending
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn last_written(&self) -> Option<&str> {
        self.last_written.as_deref()
    }

    /// Applies a URL reported by the browser.
    ///
    /// Returns the URL the browser should be switched to when it differs
    /// from the one received (legacy parameters translated away, defaults
    /// filled in); `None` when nothing has to be rewritten or the URL is the
    /// echo of our own write.
    pub async fn apply_url(
        &mut self,
        controller: &mut MapController,
        url: &str,
        provider: Option<&dyn KmlMetadataProvider>,
    ) -> Result<Option<String>> {
        if self.last_written.as_deref() == Some(url) {
            log::debug!("ignoring echo of {}", url);
            return Ok(None);
        }

        let applied = controller.load_permalink(url, provider).await;
        let swallowed = self.drain();
        log::debug!("applied {} ({} change events swallowed)", url, swallowed);
        self.deadline = None;
        applied?;

        let canonical = controller.permalink_url(&self.base).to_string();
        self.last_written = Some(canonical.clone());
        Ok((canonical != url).then_some(canonical))
    }

    /// Picks up store changes and returns the URL to write once the quiet
    /// period has elapsed
    pub fn poll(&mut self, controller: &MapController, now: Instant) -> Option<String> {
        if self.drain() > 0 {
            self.deadline = Some(now + self.debounce);
        }
        match self.deadline {
            Some(deadline) if deadline <= now => self.write(controller),
            _ => None,
        }
    }

    /// Writes a pending change right away (page unload, share dialog)
    pub fn flush(&mut self, controller: &MapController) -> Option<String> {
        if self.drain() > 0 || self.deadline.is_some() {
            return self.write(controller);
        }
        None
    }

    fn write(&mut self, controller: &MapController) -> Option<String> {
        self.deadline = None;
        let url = controller.permalink_url(&self.base).to_string();
        if self.last_written.as_deref() == Some(url.as_str()) {
            return None;
        }
        self.last_written = Some(url.clone());
        Some(url)
    }

    fn drain(&self) -> usize {
        self.events.try_iter().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{Environment, SyncConfig};
    use crate::core::geo::Point;
    use crate::store::actions::Command;

    const BASE: &str = "https://map.geo.admin.ch/";

    fn setup() -> (MapController, UrlSynchronizer) {
        let mut controller = MapController::new(SyncConfig::default());
        let sync = UrlSynchronizer::attach(&mut controller, BASE);
        (controller, sync)
    }

    #[test]
    fn test_debounce_restarts_and_coalesces() {
        let (mut controller, mut sync) = setup();
        let start = Instant::now();
        let ms = Duration::from_millis;

        controller.dispatch(Command::SetZoom(3.0)).unwrap();
        assert_eq!(sync.poll(&controller, start), None);

        controller.dispatch(Command::SetZoom(4.0)).unwrap();
        assert_eq!(sync.poll(&controller, start + ms(200)), None);
        // the window restarted at 200 ms
        assert_eq!(sync.poll(&controller, start + ms(400)), None);

        let written = sync.poll(&controller, start + ms(500)).unwrap();
        assert!(written.contains("z=4"));
        assert_eq!(sync.poll(&controller, start + ms(900)), None);
    }

    #[test]
    fn test_development_writes_immediately() {
        let mut controller = MapController::new(Environment::Development.resolve());
        let mut sync = UrlSynchronizer::attach(&mut controller, BASE);

        controller
            .dispatch(Command::SetCenter(Point::new(2_600_000.0, 1_200_000.0)))
            .unwrap();
        let written = sync.poll(&controller, Instant::now()).unwrap();
        assert!(written.contains("center=2600000,1200000"));
    }

    #[test]
    fn test_flush_writes_pending_change() {
        let (mut controller, mut sync) = setup();
        assert_eq!(sync.flush(&controller), None);

        controller.dispatch(Command::SetLang("it".into())).unwrap();
        let written = sync.flush(&controller).unwrap();
        assert!(written.contains("lang=it"));
        assert_eq!(sync.last_written(), Some(written.as_str()));
    }
}
