//! Browser session lifecycle and page-level operations.
//!
//! One session is opened per run and closed in the cleanup path of each flow.

use std::path::{Path, PathBuf};

use chrono::Local;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::BrowserMode;
use crate::errors::AutomationError;
use crate::locator::Locator;
use crate::selector::Selector;
use crate::webdriver::{driver_launch_instructions, WebDriverClient};

/// A single browser tab driven over the WebDriver protocol.
pub struct Page {
    driver: WebDriverClient,
    session_id: String,
    screenshots_dir: PathBuf,
}

impl Page {
    /// Connect to the WebDriver endpoint and open a fresh browser session.
    pub async fn open(
        webdriver_url: &str,
        mode: BrowserMode,
        screenshots_dir: &Path,
    ) -> Result<Self, AutomationError> {
        let driver = WebDriverClient::new(webdriver_url);

        if !driver.is_available().await {
            return Err(AutomationError::WebDriver(format!(
                "no WebDriver endpoint at {webdriver_url}\n{}",
                driver_launch_instructions()
            )));
        }

        let session_id = driver.new_session(mode == BrowserMode::Headless).await?;
        info!("Browser started in {mode} mode");

        std::fs::create_dir_all(screenshots_dir)?;

        Ok(Self {
            driver,
            session_id,
            screenshots_dir: screenshots_dir.to_path_buf(),
        })
    }

    pub async fn goto(&self, url: &str) -> Result<(), AutomationError> {
        debug!(url, "navigating");
        self.driver.navigate(&self.session_id, url).await
    }

    pub async fn current_url(&self) -> Result<String, AutomationError> {
        self.driver.current_url(&self.session_id).await
    }

    pub async fn title(&self) -> Result<String, AutomationError> {
        self.driver.title(&self.session_id).await
    }

    /// A locator for elements matching the selector on this page.
    pub fn locator(&self, selector: impl Into<Selector>) -> Locator {
        Locator::new(self.driver.clone(), self.session_id.clone(), selector.into())
    }

    pub async fn execute(&self, script: &str) -> Result<Value, AutomationError> {
        self.driver.execute_script(&self.session_id, script).await
    }

    pub async fn scroll_to_top(&self) -> Result<(), AutomationError> {
        self.execute("window.scrollTo(0, 0)").await?;
        Ok(())
    }

    /// Take a timestamped debug screenshot. Returns the file path.
    pub async fn screenshot(&self, name: &str) -> Result<PathBuf, AutomationError> {
        let bytes = self.driver.screenshot(&self.session_id).await?;
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let path = self.screenshots_dir.join(format!("{name}_{timestamp}.png"));
        std::fs::write(&path, bytes)?;
        info!("Screenshot saved: {}", path.display());
        Ok(path)
    }

    /// Close the browser session. Errors are logged, not propagated; cleanup
    /// must not mask the failure that preceded it.
    pub async fn close(self) {
        if let Err(e) = self.driver.delete_session(&self.session_id).await {
            warn!("Error closing browser session: {e}");
        } else {
            info!("Browser closed");
        }
    }
}

/// Handle to a located element, valid while the page it came from is loaded.
#[derive(Clone)]
pub struct Element {
    driver: WebDriverClient,
    session_id: String,
    element_id: String,
}

impl Element {
    pub(crate) fn new(driver: WebDriverClient, session_id: String, element_id: String) -> Self {
        Self {
            driver,
            session_id,
            element_id,
        }
    }

    pub async fn click(&self) -> Result<(), AutomationError> {
        self.driver.click(&self.session_id, &self.element_id).await
    }

    pub async fn clear(&self) -> Result<(), AutomationError> {
        self.driver.clear(&self.session_id, &self.element_id).await
    }

    /// Clear the element, then type the given text into it.
    pub async fn fill(&self, text: &str) -> Result<(), AutomationError> {
        // contenteditable surfaces reject clear(); typing still works
        if let Err(e) = self.clear().await {
            debug!("clear before fill failed (ignored): {e}");
        }
        self.type_text(text).await
    }

    pub async fn type_text(&self, text: &str) -> Result<(), AutomationError> {
        self.driver
            .send_keys(&self.session_id, &self.element_id, text)
            .await
    }

    pub async fn text(&self) -> Result<String, AutomationError> {
        self.driver
            .element_text(&self.session_id, &self.element_id)
            .await
    }

    pub async fn attribute(&self, name: &str) -> Result<Option<String>, AutomationError> {
        self.driver
            .element_attribute(&self.session_id, &self.element_id, name)
            .await
    }

    /// The current value of an input element, empty if unset.
    pub async fn input_value(&self) -> Result<String, AutomationError> {
        Ok(self.attribute("value").await?.unwrap_or_default())
    }

    pub async fn is_visible(&self) -> bool {
        self.driver
            .is_displayed(&self.session_id, &self.element_id)
            .await
            .unwrap_or(false)
    }
}
