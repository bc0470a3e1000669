//! Social card generator
//!
//! Produces the social-sharing preview image ("card") of each blog article by
//! screenshotting the locally served article page in a headless browser, then
//! records the card's public path in the article's front matter.
//!
//! # Pipeline
//!
//! - [`content`] discovers articles and decides whether a card already exists
//! - [`capture`] prepares the page, waits for it to settle and writes the card
//! - [`frontmatter`] inserts the card path into the article's `images` list
//! - [`batch`] drives every article through the steps with bounded concurrency
//!
//! The browser is reached only through the [`Session`] and [`PageInspector`]
//! traits; the Chrome DevTools Protocol backend lives in [`cdp`].
//!
//! # Example
//!
//! ```no_run
//! use cardgen::{batch::BatchOptions, CardConfig};
//!
//! # #[cfg(feature = "cdp")]
//! # async fn run() -> cardgen::Result<()> {
//! let config = CardConfig {
//!     base_url: "http://localhost:3000/blog".to_string(),
//!     ..Default::default()
//! };
//!
//! let report = cardgen::batch::run_batch(&config, BatchOptions::default(), cardgen::cdp::CdpSession::new).await?;
//! println!("generated {} cards", report.generated().len());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

pub mod error;
pub use error::{Error, Result};

pub mod batch;
pub mod capture;
pub mod content;
pub mod frontmatter;

#[cfg(feature = "cdp")]
pub mod cdp;

/// Configuration for a card generation run
///
/// The defaults match the blog's layout: articles in `data/blog`, cards
/// under `public/static/images/twitter-cards/<slug>/twitter-card.png`, pages
/// served by the dev server on `localhost:3000`.
///
/// # Examples
///
/// ```
/// let cfg = cardgen::CardConfig::default();
/// assert_eq!(cfg.clip.width, 1200);
/// assert_eq!(cfg.color_scheme, "dark");
/// ```
#[derive(Debug, Clone)]
pub struct CardConfig {
    /// Directory holding one file per article
    pub content_dir: PathBuf,
    /// File extensions recognized as articles
    pub extensions: Vec<String>,
    /// Root of the statically served site
    pub public_dir: PathBuf,
    /// Cards directory, relative to `public_dir` and to the site root URL
    pub cards_dir: String,
    /// File stem of every card image
    pub card_basename: String,
    /// Article pages are served at `<base_url>/<slug>`
    pub base_url: String,
    /// Browser window size
    pub viewport: Viewport,
    /// Region of the page captured into the card
    pub clip: Clip,
    /// Encoding of the card image
    pub format: ImageFormat,
    /// Value emulated for `prefers-color-scheme` on every page
    pub color_scheme: String,
    /// CSS selectors of the elements hidden before capture
    pub selectors: Selectors,
    /// Timeout for navigation in milliseconds
    pub timeout_ms: u64,
    /// Upper bound on waiting for network quiescence in milliseconds
    pub network_idle_timeout_ms: u64,
    /// How long no new requests must start before the network counts as idle
    pub network_quiet_ms: u64,
    /// How long to wait for each required element to appear
    pub element_timeout_ms: u64,
    /// Bounds of the randomized pause between hiding elements and capture
    pub settle: SettleDelay,
    /// Maximum number of articles processed at once
    pub concurrency: usize,
}

impl Default for CardConfig {
    fn default() -> Self {
        Self {
            content_dir: PathBuf::from("data/blog"),
            extensions: vec!["md".to_string(), "mdx".to_string()],
            public_dir: PathBuf::from("public"),
            cards_dir: "static/images/twitter-cards".to_string(),
            card_basename: "twitter-card".to_string(),
            base_url: "http://localhost:3000/blog".to_string(),
            viewport: Viewport::default(),
            clip: Clip::default(),
            format: ImageFormat::Png,
            color_scheme: "dark".to_string(),
            selectors: Selectors::default(),
            timeout_ms: 30000,
            network_idle_timeout_ms: 10000,
            network_quiet_ms: 500,
            element_timeout_ms: 2000,
            settle: SettleDelay::default(),
            concurrency: default_concurrency(),
        }
    }
}

impl CardConfig {
    /// Reject values the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.base_url)
            .map_err(|e| Error::ConfigError(format!("invalid base url `{}`: {}", self.base_url, e)))?;

        if self.extensions.is_empty() {
            return Err(Error::ConfigError("no article extensions configured".into()));
        }
        if self.clip.width == 0 || self.clip.height == 0 {
            return Err(Error::ConfigError("clip region must not be empty".into()));
        }
        if self.settle.min_ms > self.settle.max_ms {
            return Err(Error::ConfigError(format!(
                "settle delay range {}..{} is inverted",
                self.settle.min_ms, self.settle.max_ms
            )));
        }
        if self.concurrency == 0 {
            return Err(Error::ConfigError("concurrency must be at least 1".into()));
        }
        Ok(())
    }

    /// URL the article with `slug` is served at
    pub fn article_url(&self, slug: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), slug)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Default article concurrency: one per CPU, at most four pages at once
pub fn default_concurrency() -> usize {
    num_cpus::get().clamp(1, 4)
}

/// Viewport dimensions
#[derive(Debug, Clone, Copy)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 800,
        }
    }
}

/// Pixel rectangle of the page captured into a card
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Clip {
    pub x: f64,
    pub y: f64,
    pub width: u32,
    pub height: u32,
    pub scale: f64,
}

impl Default for Clip {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: 1200,
            height: 630,
            scale: 1.0,
        }
    }
}

/// Card image encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Webp,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Webp => "webp",
        }
    }
}

impl std::str::FromStr for ImageFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(ImageFormat::Png),
            "jpg" | "jpeg" => Ok(ImageFormat::Jpeg),
            "webp" => Ok(ImageFormat::Webp),
            other => Err(Error::ConfigError(format!("unsupported image format `{}`", other))),
        }
    }
}

/// Bounds of the pause taken before capture, in milliseconds (inclusive)
#[derive(Debug, Clone, Copy)]
pub struct SettleDelay {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl Default for SettleDelay {
    fn default() -> Self {
        Self {
            min_ms: 1000,
            max_ms: 2000,
        }
    }
}

/// The DOM targets hidden before capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorKind {
    /// The page header
    Header,
    /// The publish timestamp
    Timestamp,
    /// The prose/content container
    Prose,
}

impl SelectorKind {
    pub const ALL: [SelectorKind; 3] = [SelectorKind::Header, SelectorKind::Timestamp, SelectorKind::Prose];
}

impl std::fmt::Display for SelectorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SelectorKind::Header => "header",
            SelectorKind::Timestamp => "timestamp",
            SelectorKind::Prose => "prose",
        };
        f.write_str(name)
    }
}

/// CSS selectors for each [`SelectorKind`]
#[derive(Debug, Clone)]
pub struct Selectors {
    pub header: String,
    pub timestamp: String,
    pub prose: String,
}

impl Selectors {
    pub fn get(&self, kind: SelectorKind) -> &str {
        match kind {
            SelectorKind::Header => &self.header,
            SelectorKind::Timestamp => &self.timestamp,
            SelectorKind::Prose => &self.prose,
        }
    }
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            header: "header".to_string(),
            timestamp: "time".to_string(),
            prose: ".prose".to_string(),
        }
    }
}

/// A browser page bound to one article while it is processed
///
/// Implementations release the underlying page when dropped, so a page is
/// cleaned up whether or not processing succeeded.
pub trait PageInspector {
    /// Handle to a located DOM element
    type Element<'a>
    where
        Self: 'a;

    /// Navigate to a URL and wait for the navigation to complete
    fn goto(&mut self, url: &str) -> Result<()>;

    /// Block until no new network requests have started for the quiet window
    fn wait_for_network_idle(&mut self) -> Result<()>;

    /// Locate a required element, failing with `Error::ElementNotFound`
    fn find_required(&self, kind: SelectorKind) -> Result<Self::Element<'_>>;

    /// Make an element invisible while keeping the space it occupies
    fn hide(&self, element: &Self::Element<'_>) -> Result<()>;

    /// Capture the given region of the rendered page
    fn capture(&self, clip: Clip, format: ImageFormat) -> Result<Vec<u8>>;
}

/// A running browser shared by every article of a batch
pub trait Session: Send + Sync {
    type Page: PageInspector;

    /// Open a fresh page with the session's viewport and color scheme applied
    fn open_page(&self) -> Result<Self::Page>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CardConfig::default();
        assert_eq!(config.viewport.width, 1200);
        assert_eq!(config.clip.height, 630);
        assert_eq!(config.settle.min_ms, 1000);
        assert_eq!(config.settle.max_ms, 2000);
        assert!(config.concurrency >= 1 && config.concurrency <= 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn article_url_joins_slug() {
        let config = CardConfig {
            base_url: "http://localhost:3000/blog/".to_string(),
            ..Default::default()
        };
        assert_eq!(config.article_url("hello-world"), "http://localhost:3000/blog/hello-world");
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let config = CardConfig {
            base_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::ConfigError(_))));
    }

    #[test]
    fn inverted_settle_range_is_rejected() {
        let config = CardConfig {
            settle: SettleDelay { min_ms: 50, max_ms: 10 },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn image_format_parsing() {
        assert_eq!("PNG".parse::<ImageFormat>().unwrap(), ImageFormat::Png);
        assert_eq!("jpeg".parse::<ImageFormat>().unwrap().extension(), "jpg");
        assert!("gif".parse::<ImageFormat>().is_err());
    }

    #[test]
    fn selectors_cover_every_kind() {
        let selectors = Selectors::default();
        let resolved: Vec<&str> = SelectorKind::ALL.iter().map(|k| selectors.get(*k)).collect();
        assert_eq!(resolved, vec!["header", "time", ".prose"]);
    }
}
