//! Cardsmith
//!
//! Personalized greeting cards (birthday, work anniversary, onboarding) built
//! from a declarative field layout and rasterized by a headless browser.
//!
//! # Features
//!
//! - **Field model**: typed fields in template-intrinsic coordinates with a
//!   single scale mapping to the screen
//! - **Resolver + style policy**: one resolved model feeds the editor, the
//!   live preview and the capture pipeline
//! - **CDP backend** (default): captures card pages through headless Chrome
//! - **Adapter-based capture**: the bridge only needs the `Launcher` /
//!   `BrowserContext` traits, so the screenshot engine is swappable
//!
//! # Example
//!
//! ```no_run
//! use cardsmith::{CaptureConfig, card::{CardData, CardType}};
//!
//! # #[cfg(feature = "cdp")]
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CaptureConfig {
//!     pages_base_url: "http://localhost:3000".to_string(),
//!     ..Default::default()
//! };
//!
//! let card = CardData::new(CardType::WorkAnniversary)
//!     .with("name", "Asha Rao")
//!     .with("designation", "Engineer")
//!     .with("years", "5");
//!
//! let url = config.page_url(card.card_type)?;
//! let png = cardsmith::capture::capture(&cardsmith::cdp::CdpLauncher, &config, &url, &card)?;
//! std::fs::write("card.png", png)?;
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "cdp"))]
//! # fn main() {}
//! ```

use std::time::Duration;

pub mod error;
pub use error::{Error, Result};

pub mod field;
pub mod resolver;
pub mod style;
pub mod card;
pub mod editor;
pub mod preview;
pub mod capture;
pub mod search;
pub mod server;

// Async-friendly generation facade (admission control + worker threads)
pub mod async_api;

#[cfg(feature = "cdp")]
pub mod cdp;

pub use async_api::Generator;

/// Configuration for one capture
///
/// Defaults follow the production card pipeline: a large viewport rendered
/// at 2x so the output stays crisp regardless of the requester's display.
///
/// # Examples
///
/// ```
/// let cfg = cardsmith::CaptureConfig::default();
/// assert_eq!(cfg.viewport.width, 2400);
/// assert_eq!(cfg.capture_selector, "[data-preview=\"true\"]");
/// ```
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Origin serving the card pages
    pub pages_base_url: String,
    /// Viewport dimensions
    pub viewport: Viewport,
    /// Device pixel ratio used for rendering
    pub device_scale_factor: f64,
    /// Timeout for navigation and network settling in milliseconds
    pub navigation_timeout_ms: u64,
    /// Upper bound on waiting for an injected image to load
    pub image_timeout_ms: u64,
    /// Fixed delay before the screenshot so transitions reach a stable frame
    pub settle_ms: u64,
    /// Selector of the element to screenshot
    pub capture_selector: String,
    /// Whether the launched browser runs with Chrome's sandbox
    pub sandbox: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            pages_base_url: "http://localhost:3000".to_string(),
            viewport: Viewport::default(),
            device_scale_factor: 2.0,
            navigation_timeout_ms: 30000,
            image_timeout_ms: 5000,
            settle_ms: 1000,
            capture_selector: card::CAPTURE_TARGET.to_string(),
            sandbox: false,
        }
    }
}

impl CaptureConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn image_timeout(&self) -> Duration {
        Duration::from_millis(self.image_timeout_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    /// Absolute URL of the page rendering `card_type`
    pub fn page_url(&self, card_type: card::CardType) -> Result<String> {
        let base = url::Url::parse(&self.pages_base_url).map_err(|e| {
            Error::ConfigError(format!("Invalid pages base URL '{}': {}", self.pages_base_url, e))
        })?;
        let joined = base
            .join(card_type.page_path())
            .map_err(|e| Error::ConfigError(format!("Failed to build page URL: {}", e)))?;
        Ok(joined.to_string())
    }

    /// Reject settings no backend can honour
    pub fn validate(&self) -> Result<()> {
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(Error::ConfigError("viewport must be non-empty".into()));
        }
        if !self.device_scale_factor.is_finite() || self.device_scale_factor <= 0.0 {
            return Err(Error::ConfigError(format!(
                "device scale factor must be positive, got {}",
                self.device_scale_factor
            )));
        }
        if self.capture_selector.trim().is_empty() {
            return Err(Error::ConfigError("capture selector is empty".into()));
        }
        Ok(())
    }
}

/// Viewport dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 2400,
            height: 1800,
        }
    }
}
