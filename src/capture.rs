//! Page preparation, settle delay and card capture.
//!
//! Everything here is written against [`PageInspector`] and [`Session`], so
//! the same steps run on the Chrome backend and on scripted test pages.

use crate::content::{write_atomic, CardPaths};
use crate::{CardConfig, PageInspector, Result, SelectorKind, Session, SettleDelay};
use rand::Rng;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Load `url` and hide the header, timestamp and prose elements.
///
/// All three elements are located before any is hidden, so a page missing
/// one of them is left untouched and reported as `Error::ElementNotFound`.
pub fn prepare_page<P: PageInspector>(page: &mut P, url: &str) -> Result<()> {
    page.goto(url)?;
    page.wait_for_network_idle()?;

    let elements = SelectorKind::ALL
        .iter()
        .map(|kind| page.find_required(*kind))
        .collect::<Result<Vec<_>>>()?;

    for element in &elements {
        page.hide(element)?;
    }

    Ok(())
}

/// Requests a page has in flight, fed from the browser's network events.
///
/// The network counts as idle once nothing is in flight and no request has
/// started or finished for a whole quiet window.
#[derive(Debug, Clone)]
pub struct NetworkActivity {
    in_flight: HashSet<String>,
    last_change: Instant,
}

impl NetworkActivity {
    pub fn new(now: Instant) -> Self {
        Self {
            in_flight: HashSet::new(),
            last_change: now,
        }
    }

    pub fn request_started(&mut self, id: &str, at: Instant) {
        self.in_flight.insert(id.to_string());
        self.last_change = self.last_change.max(at);
    }

    /// A request finished or failed. Unknown ids are ignored.
    pub fn request_done(&mut self, id: &str, at: Instant) {
        if self.in_flight.remove(id) {
            self.last_change = self.last_change.max(at);
        }
    }

    /// Start a new quiet window at `now`, keeping in-flight requests
    pub fn restart_quiet_window(&mut self, now: Instant) {
        self.last_change = self.last_change.max(now);
    }

    pub fn pending(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_idle(&self, now: Instant, quiet: Duration) -> bool {
        self.in_flight.is_empty() && now.saturating_duration_since(self.last_change) >= quiet
    }
}

impl SettleDelay {
    /// Pick a pause uniformly within the bounds
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.max_ms <= self.min_ms {
            return Duration::from_millis(self.min_ms);
        }
        Duration::from_millis(rng.gen_range(self.min_ms..=self.max_ms))
    }

    /// Sleep for a random interval within the bounds, returning it
    pub fn wait(&self) -> Duration {
        let pause = self.pick(&mut rand::thread_rng());
        if !pause.is_zero() {
            std::thread::sleep(pause);
        }
        pause
    }
}

/// Capture the configured region of a prepared page and write it as the
/// card of `slug`, replacing any previous card.
pub fn capture_card<P: PageInspector>(page: &P, config: &CardConfig, paths: &CardPaths, slug: &str) -> Result<PathBuf> {
    let bytes = page.capture(config.clip, config.format)?;
    let path = paths.card_path(slug);
    write_atomic(&path, &bytes)?;
    Ok(path)
}

/// Run the whole image phase for one article: open a page, prepare it,
/// let it settle, capture and persist the card.
///
/// The page is dropped (and its browser tab closed) before returning, on
/// success and on error alike.
pub fn generate_card<S: Session>(session: &S, config: &CardConfig, paths: &CardPaths, slug: &str) -> Result<PathBuf> {
    let mut page = session.open_page()?;
    let url = config.article_url(slug);

    log::debug!("[{}] loading {}", slug, url);
    prepare_page(&mut page, &url)?;

    let pause = config.settle.wait();
    log::debug!("[{}] settled for {}ms", slug, pause.as_millis());

    let path = capture_card(&page, config, paths, slug)?;
    log::info!("[{}] card written to {}", slug, path.display());
    Ok(path)
}
