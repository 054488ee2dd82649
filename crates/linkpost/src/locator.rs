use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::browser::Element;
use crate::errors::AutomationError;
use crate::selector::Selector;
use crate::webdriver::WebDriverClient;

// Default timeout if none is specified on the locator itself
const DEFAULT_LOCATOR_TIMEOUT: Duration = Duration::from_secs(30);
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// A high-level API for finding and interacting with page elements.
///
/// Lookups poll until the element appears or the timeout elapses; the site
/// renders asynchronously and selectors routinely lag the page by seconds.
#[derive(Clone)]
pub struct Locator {
    driver: WebDriverClient,
    session_id: String,
    selector: Selector,
    timeout: Duration,
}

impl Locator {
    pub(crate) fn new(driver: WebDriverClient, session_id: String, selector: Selector) -> Self {
        Self {
            driver,
            session_id,
            selector,
            timeout: DEFAULT_LOCATOR_TIMEOUT,
        }
    }

    /// Set a default timeout for waiting operations on this locator instance.
    pub fn set_default_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    /// Wait for an element matching the locator to appear, up to the given
    /// timeout (locator default if `None`).
    pub async fn wait(&self, timeout: Option<Duration>) -> Result<Element, AutomationError> {
        let effective_timeout = timeout.unwrap_or(self.timeout);
        let deadline = Instant::now() + effective_timeout;
        debug!("Waiting for element matching selector: {}", self.selector);

        loop {
            match self.driver.find_element(&self.session_id, &self.selector).await {
                Ok(element_id) => {
                    return Ok(Element::new(
                        self.driver.clone(),
                        self.session_id.clone(),
                        element_id,
                    ))
                }
                Err(AutomationError::ElementNotFound(inner)) => {
                    if Instant::now() >= deadline {
                        return Err(AutomationError::Timeout(format!(
                            "timed out after {effective_timeout:?} waiting for element {}: {inner}",
                            self.selector
                        )));
                    }
                    sleep(POLL_INTERVAL).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Wait for the first *visible* element matching the locator.
    pub async fn first_visible(
        &self,
        timeout: Option<Duration>,
    ) -> Result<Element, AutomationError> {
        let effective_timeout = timeout.unwrap_or(self.timeout);
        let deadline = Instant::now() + effective_timeout;

        loop {
            for element in self.all().await? {
                if element.is_visible().await {
                    return Ok(element);
                }
            }
            if Instant::now() >= deadline {
                return Err(AutomationError::Timeout(format!(
                    "timed out after {effective_timeout:?} waiting for visible element {}",
                    self.selector
                )));
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// All elements currently matching this locator, without waiting.
    pub async fn all(&self) -> Result<Vec<Element>, AutomationError> {
        let ids = self
            .driver
            .find_elements(&self.session_id, &self.selector)
            .await?;
        Ok(ids
            .into_iter()
            .map(|id| Element::new(self.driver.clone(), self.session_id.clone(), id))
            .collect())
    }

    /// Number of elements currently matching; lookup failures count as zero.
    pub async fn count(&self) -> usize {
        self.all().await.map(|elements| elements.len()).unwrap_or(0)
    }
}
