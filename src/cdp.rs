//! Chrome DevTools Protocol capture backend

use crate::capture::{BrowserContext, Launcher, POLL_INTERVAL};
use crate::{CaptureConfig, Error, Result};
use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::{Browser, LaunchOptions};
use log::{debug, warn};
use std::ffi::OsString;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Resource count must stay unchanged this long for the network to count as idle
const NETWORK_QUIET: Duration = Duration::from_millis(500);

/// Launches one headless Chrome process per context
#[derive(Debug, Clone, Copy, Default)]
pub struct CdpLauncher;

impl Launcher for CdpLauncher {
    type Context = CdpContext;

    fn launch(&self, config: &CaptureConfig) -> Result<CdpContext> {
        CdpContext::new(config)
    }
}

/// A dedicated headless Chrome instance with a single tab.
///
/// Dropping the `Browser` handle terminates the child process, so `close`
/// only has to release it once.
pub struct CdpContext {
    browser: Option<Browser>,
    tab: Arc<Tab>,
}

impl CdpContext {
    pub fn new(config: &CaptureConfig) -> Result<Self> {
        config.validate()?;

        let scale_arg = OsString::from(format!(
            "--force-device-scale-factor={}",
            config.device_scale_factor
        ));
        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(config.sandbox)
            .window_size(Some((config.viewport.width, config.viewport.height)))
            .args(vec![scale_arg.as_os_str()])
            .build()
            .map_err(|e| Error::InitializationError(format!("Failed to build launch options: {}", e)))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| Error::InitializationError(format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| Error::InitializationError(format!("Failed to create tab: {}", e)))?;
        tab.set_default_timeout(config.navigation_timeout());

        debug!(
            "Launched headless Chrome {}x{} @{}x",
            config.viewport.width, config.viewport.height, config.device_scale_factor
        );

        Ok(Self {
            browser: Some(browser),
            tab,
        })
    }

    fn resource_count(&mut self) -> Result<u64> {
        let v = self.evaluate("performance.getEntriesByType('resource').length")?;
        Ok(v.as_u64().unwrap_or(0))
    }

    // Approximates "network idle": the number of loaded resources stops
    // changing for NETWORK_QUIET.
    fn wait_for_network_idle(&mut self, deadline: Instant, timeout: Duration) -> Result<()> {
        let mut last = self.resource_count()?;
        let mut quiet_since = Instant::now();
        loop {
            if quiet_since.elapsed() >= NETWORK_QUIET {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(Error::Timeout(timeout.as_millis() as u64));
            }
            std::thread::sleep(POLL_INTERVAL);
            let current = self.resource_count()?;
            if current != last {
                last = current;
                quiet_since = Instant::now();
            }
        }
    }
}

impl BrowserContext for CdpContext {
    fn open(&mut self, url: &str, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;

        self.tab
            .navigate_to(url)
            .map_err(|e| Error::LoadError(format!("Navigation to {} failed: {}", url, e)))?;

        self.tab
            .wait_until_navigated()
            .map_err(|e| Error::LoadError(format!("Wait for navigation failed: {}", e)))?;

        let remaining = deadline.saturating_duration_since(Instant::now());
        if !self.wait_for("document.readyState === 'complete'", remaining)? {
            return Err(Error::Timeout(timeout.as_millis() as u64));
        }

        self.wait_for_network_idle(deadline, timeout)
    }

    fn evaluate(&mut self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .tab
            .evaluate(script, false)
            .map_err(|e| Error::ScriptError(format!("Evaluation failed: {}", e)))?;

        Ok(result.value.unwrap_or(serde_json::Value::Null))
    }

    fn capture_element(&mut self, selector: &str) -> Result<Option<Vec<u8>>> {
        let probe = format!(
            "!!document.querySelector({})",
            serde_json::Value::String(selector.to_string())
        );
        if self.evaluate(&probe)?.as_bool() != Some(true) {
            return Ok(None);
        }

        let element = self
            .tab
            .find_element(selector)
            .map_err(|e| Error::RenderError(format!("Failed to locate {}: {}", selector, e)))?;

        let png = element
            .capture_screenshot(Page::CaptureScreenshotFormatOption::Png)
            .map_err(|e| Error::RenderError(format!("Screenshot failed: {}", e)))?;

        Ok(Some(png))
    }

    fn close(&mut self) -> Result<()> {
        let Some(browser) = self.browser.take() else {
            return Ok(());
        };
        if let Err(e) = self.tab.close(false) {
            // The tab may already be gone with a crashed renderer.
            warn!("Failed to close tab cleanly: {}", e);
        }
        drop(browser);
        debug!("Headless Chrome closed");
        Ok(())
    }
}
