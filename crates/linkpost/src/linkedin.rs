//! The LinkedIn posting sequence: login, open the composer, enter text, then
//! publish immediately or walk the scheduling dialog.
//!
//! The target UI has no stable selector contract and changes without notice,
//! so every step works through a list of candidate selectors (English and
//! French variants) tried in order, with fixed pauses for rendering and a
//! debug screenshot whenever a step gives up.

use std::time::Duration;

use chrono::{Datelike, NaiveDateTime, Timelike};
use tracing::{debug, error, info, warn};

use crate::browser::{Element, Page};
use crate::errors::AutomationError;
use crate::selector::Selector;

const LOGIN_URL: &str = "https://www.linkedin.com/login";
const FEED_URL: &str = "https://www.linkedin.com/feed/";

const FIELD_WAIT: Duration = Duration::from_secs(30);
const LOGIN_REDIRECT_WAIT: Duration = Duration::from_secs(60);
const RENDER_PAUSE: Duration = Duration::from_secs(3);
const STEP_PAUSE: Duration = Duration::from_secs(1);
const RETRY_PAUSE: Duration = Duration::from_secs(2);
const OPEN_COMPOSER_ATTEMPTS: u32 = 3;

/// LinkedIn rounds schedule slots to 15-minute intervals.
const SCHEDULE_SLOT_MINUTES: u32 = 15;

const EMAIL_FIELD: &str = "#username";
const PASSWORD_FIELD: &str = "#password";
const SIGN_IN_BUTTON: &str = r#"button[type="submit"]"#;

const COMPOSER_SELECTORS: [&str; 5] = [
    r#"div[contenteditable="true"][role="textbox"]"#,
    r#"div[contenteditable="true"]"#,
    r#"div.ql-editor[contenteditable="true"]"#,
    r#"div[data-placeholder*="What do you want to talk about"]"#,
    r#"div[data-placeholder*="post"]"#,
];

const LOGGED_IN_INDICATORS: [&str; 3] = [
    r#"nav[role="navigation"]"#,
    r#"div[data-test-id="nav"]"#,
    r#"button[aria-label*="Me"]"#,
];

const LOGIN_ERROR_SELECTORS: [&str; 3] = [r#"div[role="alert"]"#, "div.error", "span.error"];

fn start_post_selectors() -> Vec<Selector> {
    vec![
        Selector::Text("Start a post".to_string()),
        Selector::tag_with_text("button", "Start a post"),
        Selector::Css(r#"div[data-control-name="composer"]"#.to_string()),
        Selector::Css("div.share-box".to_string()),
        Selector::Css(r#"div[class*="share-box"]"#.to_string()),
        Selector::Css(r#"div[class*="composer"]"#.to_string()),
    ]
}

fn post_button_selectors() -> Vec<Selector> {
    vec![
        Selector::tag_with_text("button", "Post"),
        Selector::tag_with_text("button", "Publier"),
        Selector::Css(r#"button[aria-label*="Post"]"#.to_string()),
        Selector::Css(r#"button[aria-label*="Publier"]"#.to_string()),
    ]
}

fn schedule_button_selectors() -> Vec<Selector> {
    vec![
        Selector::tag_with_text("button", "Programmer pour plus tard"),
        Selector::Text("Programmer pour plus tard".to_string()),
        Selector::tag_with_text("button", "Schedule"),
        Selector::Css(r#"button[aria-label*="Schedule"]"#.to_string()),
        Selector::Css(r#"button[aria-label*="Programmer"]"#.to_string()),
        Selector::Css(r#"button[data-control-name*="schedule"]"#.to_string()),
    ]
}

fn date_field_selectors() -> Vec<Selector> {
    vec![
        Selector::Css(r#"input[aria-label*="Date"]"#.to_string()),
        Selector::Css(r#"input[placeholder*="Date"]"#.to_string()),
        Selector::Css(r#"div[role="textbox"][aria-label*="Date"]"#.to_string()),
    ]
}

fn time_field_selectors() -> Vec<Selector> {
    vec![
        Selector::Css(r#"input[aria-label*="Heure"]"#.to_string()),
        Selector::Css(r#"input[aria-label*="Time"]"#.to_string()),
        Selector::Css(r#"input[placeholder*="Heure"]"#.to_string()),
    ]
}

fn confirm_selectors() -> Vec<Selector> {
    vec![
        Selector::tag_with_text("button", "Programmer"),
        Selector::tag_with_text("button", "Confirmer"),
        Selector::tag_with_text("button", "Schedule"),
        Selector::tag_with_text("button", "Confirm"),
        Selector::Css(r#"button[aria-label*="Programmer"]"#.to_string()),
        Selector::Css(r#"button[aria-label*="Schedule"]"#.to_string()),
        Selector::Css(r#"button[data-control-name*="schedule"]"#.to_string()),
        Selector::Css(r#"button[type="submit"]"#.to_string()),
    ]
}

/// Drives the LinkedIn web UI through a [`Page`].
pub struct LinkedIn {
    page: Page,
}

impl LinkedIn {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub async fn close(self) {
        self.page.close().await;
    }

    /// Log in with the given credentials. Verification is best effort: a feed
    /// URL or a known logged-in element counts as success, a visible error
    /// banner as failure, anything else is assumed successful.
    pub async fn login(&self, email: &str, password: &str) -> Result<(), AutomationError> {
        info!("Navigating to login page: {LOGIN_URL}");
        self.page.goto(LOGIN_URL).await?;
        sleep(RETRY_PAUSE).await;
        self.shot("01_before_login").await;

        let email_field = match self
            .page
            .locator(EMAIL_FIELD)
            .wait(Some(FIELD_WAIT))
            .await
        {
            Ok(field) => field,
            Err(e) => {
                error!("Email field not found: {e}");
                self.shot("02_email_field_not_found").await;
                return Err(e);
            }
        };
        email_field.fill(email).await?;
        let masked: String = email.chars().take(3).collect();
        info!("Email entered: {masked}***");
        sleep(STEP_PAUSE).await;

        let password_field = match self
            .page
            .locator(PASSWORD_FIELD)
            .wait(Some(FIELD_WAIT))
            .await
        {
            Ok(field) => field,
            Err(e) => {
                error!("Password field not found: {e}");
                self.shot("03_password_field_not_found").await;
                return Err(e);
            }
        };
        password_field.fill(password).await?;
        sleep(STEP_PAUSE).await;

        let sign_in = match self
            .page
            .locator(SIGN_IN_BUTTON)
            .wait(Some(FIELD_WAIT))
            .await
        {
            Ok(button) => button,
            Err(e) => {
                error!("Sign in button not found: {e}");
                self.shot("04_sign_in_button_not_found").await;
                return Err(e);
            }
        };
        sign_in.click().await?;
        info!("Sign in button clicked");
        sleep(RENDER_PAUSE).await;

        if !self.wait_for_feed_url(LOGIN_REDIRECT_WAIT).await {
            warn!("Timed out waiting for feed URL, checking login state anyway");
        }
        sleep(RENDER_PAUSE).await;
        self.shot("05_after_login").await;

        let current_url = self.page.current_url().await.unwrap_or_default();
        info!("Current URL: {current_url}");
        if url_indicates_login(&current_url) {
            info!("Login successful (feed URL reached)");
            return Ok(());
        }

        for indicator in LOGGED_IN_INDICATORS {
            let count = self.page.locator(indicator).count().await;
            debug!("Checking indicator '{indicator}': found {count} elements");
            if count > 0 {
                info!("Login successful (found logged-in indicator: {indicator})");
                return Ok(());
            }
        }

        for selector in LOGIN_ERROR_SELECTORS {
            if let Ok(elements) = self.page.locator(selector).all().await {
                for element in elements {
                    if element.is_visible().await {
                        let message = element.text().await.unwrap_or_default();
                        error!("Login error message found: {message}");
                        self.shot("06_login_failed").await;
                        return Err(AutomationError::WebDriver(format!(
                            "login rejected: {message}"
                        )));
                    }
                }
            }
        }

        warn!("Login verification unclear, assuming success (no errors found)");
        self.shot("06_login_verification_unclear").await;
        Ok(())
    }

    /// Open the post composer from the feed page.
    pub async fn open_composer(&self) -> Result<(), AutomationError> {
        let current_url = self.page.current_url().await.unwrap_or_default();
        if !current_url.contains("feed") {
            info!("Navigating to feed page...");
            self.page.goto(FEED_URL).await?;
        }
        sleep(RENDER_PAUSE).await;
        self.shot("01_feed_page_loaded").await;

        if let Err(e) = self.page.scroll_to_top().await {
            debug!("scroll to top failed (ignored): {e}");
        }
        sleep(STEP_PAUSE).await;

        for attempt in 1..=OPEN_COMPOSER_ATTEMPTS {
            info!("Looking for 'Start a post' control (attempt {attempt}/{OPEN_COMPOSER_ATTEMPTS})");

            if let Some((selector, element)) = self.find_any_visible(&start_post_selectors()).await
            {
                info!("Found start-post control with selector: {selector}");
                if let Err(e) = element.click().await {
                    warn!("Click on start-post control failed: {e}");
                } else {
                    sleep(RENDER_PAUSE).await;
                    self.shot(&format!("02_start_post_clicked_attempt_{attempt}"))
                        .await;
                    if self.composer_is_open().await {
                        info!("Composer opened");
                        return Ok(());
                    }
                    warn!("Composer not visible yet, waiting...");
                    sleep(RETRY_PAUSE).await;
                    if self.composer_is_open().await {
                        info!("Composer opened after wait");
                        return Ok(());
                    }
                }
            } else {
                warn!("No start-post control visible");
            }

            if attempt < OPEN_COMPOSER_ATTEMPTS {
                sleep(RETRY_PAUSE).await;
                if let Err(e) = self.page.scroll_to_top().await {
                    debug!("scroll to top failed (ignored): {e}");
                }
                sleep(STEP_PAUSE).await;
            }
        }

        error!("Could not open the post composer");
        self.shot("02_composer_not_opened").await;
        Err(AutomationError::ElementNotFound(
            "post composer did not open".to_string(),
        ))
    }

    /// Type the post text into the composer and verify it landed.
    pub async fn enter_post_text(&self, text: &str) -> Result<(), AutomationError> {
        info!("Looking for composer text area...");

        let composer_selectors: Vec<Selector> = COMPOSER_SELECTORS
            .iter()
            .map(|s| Selector::from(*s))
            .collect();

        let Some((selector, composer)) = self.find_any_visible(&composer_selectors).await else {
            error!("Could not find composer text area");
            self.shot("03_post_text_error").await;
            return Err(AutomationError::ElementNotFound(
                "composer text area".to_string(),
            ));
        };

        info!("Found composer with selector: {selector}");
        composer.click().await?;
        sleep(STEP_PAUSE).await;
        composer.fill(text).await?;
        sleep(STEP_PAUSE).await;

        let preview: String = text.chars().take(50).collect();
        info!("Text entered: '{preview}...'");
        self.shot("03_post_text_entered").await;

        // Verification is advisory; the text is usually there even when the
        // readback disagrees about whitespace.
        match composer.text().await {
            Ok(entered) => {
                let prefix: String = text.chars().take(50).collect();
                if entered.contains(prefix.trim()) || text.contains(entered.trim()) {
                    info!("Text verified in composer");
                } else {
                    warn!("Text verification unclear, continuing anyway");
                }
            }
            Err(e) => warn!("Could not verify text ({e}), assuming success"),
        }
        Ok(())
    }

    /// Click the Post button to publish immediately.
    pub async fn publish(&self) -> Result<(), AutomationError> {
        info!("Looking for Post button...");
        let Some((selector, button)) = self.find_any_visible(&post_button_selectors()).await
        else {
            error!("Could not find Post button");
            self.shot("04_post_button_not_found").await;
            return Err(AutomationError::ElementNotFound("Post button".to_string()));
        };

        info!("Found Post button with selector: {selector}");
        button.click().await?;
        sleep(RENDER_PAUSE).await;
        info!("Post button clicked");
        self.shot("04_post_published").await;
        Ok(())
    }

    /// Open the scheduling dialog from the composer.
    pub async fn open_schedule_dialog(&self) -> Result<(), AutomationError> {
        sleep(RETRY_PAUSE).await;
        info!("Looking for Schedule button...");

        if let Some((selector, button)) = self.find_any_visible(&schedule_button_selectors()).await
        {
            info!("Found Schedule button with selector: {selector}");
            button.click().await?;
            sleep(RETRY_PAUSE).await;
            self.shot("04_schedule_button_clicked").await;
            return Ok(());
        }

        // The control sometimes renders as a plain labelled element next to
        // the Post button rather than a button of its own.
        if let Some((_, element)) = self
            .find_any_visible(&[Selector::Text("Schedule".to_string())])
            .await
        {
            info!("Found Schedule label next to Post button");
            element.click().await?;
            sleep(RETRY_PAUSE).await;
            self.shot("04_schedule_clicked_from_dropdown").await;
            return Ok(());
        }

        error!("Could not find Schedule button");
        self.shot("04_schedule_button_not_found").await;
        Err(AutomationError::ElementNotFound(
            "Schedule button".to_string(),
        ))
    }

    /// Fill the scheduling dialog's date and time fields. Setting at least
    /// one of the two counts as success; the dialog pre-fills sane defaults.
    pub async fn set_schedule(&self, when: NaiveDateTime) -> Result<(), AutomationError> {
        info!("Setting schedule to {when}");
        sleep(RETRY_PAUSE).await;
        self.shot("05_schedule_modal_opened").await;

        let date_set = self.pick_schedule_date(when).await;
        let time_set = self.pick_schedule_time(when).await;

        if date_set && time_set {
            info!("Schedule date and time set");
            self.shot("10_date_time_set").await;
            Ok(())
        } else if date_set || time_set {
            warn!("Partial schedule success (date: {date_set}, time: {time_set})");
            self.shot("10_date_time_partial").await;
            Ok(())
        } else {
            error!("Could not set schedule date or time");
            self.shot("10_date_time_not_set").await;
            Err(AutomationError::ElementNotFound(
                "schedule date/time fields".to_string(),
            ))
        }
    }

    /// Confirm the scheduling dialog.
    pub async fn confirm_schedule(&self) -> Result<(), AutomationError> {
        self.shot("08_before_confirm").await;
        sleep(RETRY_PAUSE).await;
        info!("Looking for confirm/schedule button...");

        if let Some((selector, button)) = self.find_any_visible(&confirm_selectors()).await {
            info!("Found confirm button with selector: {selector}");
            button.click().await?;
            sleep(RENDER_PAUSE).await;
            self.shot("09_confirm_clicked").await;
            info!("Post scheduled successfully");
            return Ok(());
        }

        // Last resort: scan the first visible buttons for a likely label.
        warn!("No confirm button matched the known selectors, scanning buttons...");
        if let Ok(buttons) = self.page.locator("button").all().await {
            for button in buttons.into_iter().take(10) {
                if !button.is_visible().await {
                    continue;
                }
                let label = button.text().await.unwrap_or_default().to_lowercase();
                if label.contains("schedule")
                    || label.contains("confirm")
                    || label.contains("programmer")
                    || label.contains("publier")
                {
                    info!("Clicking button with label: '{label}'");
                    button.click().await?;
                    sleep(RENDER_PAUSE).await;
                    self.shot("09_confirm_clicked_alternative").await;
                    return Ok(());
                }
            }
        }

        error!("Could not find confirm/schedule button");
        self.shot("08_confirm_button_not_found").await;
        Err(AutomationError::ElementNotFound(
            "confirm schedule button".to_string(),
        ))
    }

    /// Publish `text` right away: composer, text, Post.
    pub async fn publish_post(&self, text: &str) -> Result<(), AutomationError> {
        self.open_composer().await?;
        self.enter_post_text(text).await?;
        self.publish().await
    }

    /// Schedule `text` for `when`: composer, text, schedule dialog, confirm.
    pub async fn schedule_post(
        &self,
        text: &str,
        when: NaiveDateTime,
    ) -> Result<(), AutomationError> {
        self.open_composer().await?;
        self.enter_post_text(text).await?;
        self.open_schedule_dialog().await?;
        if let Err(e) = self.set_schedule(when).await {
            warn!("Failed to set schedule date/time (may still work): {e}");
        }
        self.confirm_schedule().await
    }

    async fn pick_schedule_date(&self, when: NaiveDateTime) -> bool {
        info!("Looking for date field...");
        let field = match self.find_any_visible(&date_field_selectors()).await {
            Some((selector, field)) => {
                info!("Found date field with selector: {selector}");
                Some(field)
            }
            None => self.find_input_with(|value| value.contains('/') && value.len() >= 8).await,
        };

        let Some(field) = field else {
            warn!("Date field not found");
            return false;
        };
        if let Err(e) = field.click().await {
            warn!("Could not open calendar: {e}");
            return false;
        }
        sleep(STEP_PAUSE).await;
        self.shot("06_date_calendar_opened").await;

        let day_selector = Selector::Text(when.day().to_string());
        match self.find_any_visible(&[day_selector]).await {
            Some((_, day)) => match day.click().await {
                Ok(()) => {
                    info!("Date selected: day {}", when.day());
                    self.shot("07_date_selected").await;
                    true
                }
                Err(e) => {
                    debug!("Could not click day {}: {e}", when.day());
                    false
                }
            },
            None => {
                debug!("Day {} not visible in calendar", when.day());
                false
            }
        }
    }

    async fn pick_schedule_time(&self, when: NaiveDateTime) -> bool {
        info!("Looking for time field...");
        let field = match self.find_any_visible(&time_field_selectors()).await {
            Some((selector, field)) => {
                info!("Found time field with selector: {selector}");
                Some(field)
            }
            None => self.find_input_with(|value| value.contains(':') && value.len() == 5).await,
        };

        let Some(field) = field else {
            warn!("Time field not found");
            return false;
        };
        if let Err(e) = field.click().await {
            warn!("Could not open time dropdown: {e}");
            return false;
        }
        sleep(STEP_PAUSE).await;
        self.shot("08_time_dropdown_opened").await;

        let slot = schedule_slot(when);
        info!("Looking for time option: {slot}");
        match self.find_any_visible(&[Selector::Text(slot.clone())]).await {
            Some((_, option)) => match option.click().await {
                Ok(()) => {
                    info!("Time selected: {slot}");
                    self.shot("09_time_selected").await;
                    true
                }
                Err(e) => {
                    debug!("Could not click time {slot}: {e}");
                    false
                }
            },
            None => {
                debug!("Time option {slot} not visible");
                false
            }
        }
    }

    /// First visible `input` (among the first ten) whose value matches.
    async fn find_input_with(&self, matches: impl Fn(&str) -> bool) -> Option<Element> {
        let inputs = self.page.locator("input").all().await.ok()?;
        for input in inputs.into_iter().take(10) {
            if !input.is_visible().await {
                continue;
            }
            let value = input.input_value().await.unwrap_or_default();
            if matches(&value) {
                info!("Found input with matching value: {value}");
                return Some(input);
            }
        }
        None
    }

    async fn composer_is_open(&self) -> bool {
        for selector in COMPOSER_SELECTORS {
            let locator = self.page.locator(selector);
            if let Ok(elements) = locator.all().await {
                for element in elements {
                    if element.is_visible().await {
                        debug!("Composer verified open with selector: {selector}");
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Try each candidate selector once, returning the first visible match.
    async fn find_any_visible(&self, selectors: &[Selector]) -> Option<(Selector, Element)> {
        for selector in selectors {
            match self.page.locator(selector.clone()).all().await {
                Ok(elements) => {
                    for element in elements {
                        if element.is_visible().await {
                            return Some((selector.clone(), element));
                        }
                    }
                }
                Err(e) => debug!("Selector {selector} failed: {e}"),
            }
        }
        None
    }

    async fn wait_for_feed_url(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Ok(url) = self.page.current_url().await {
                if url_indicates_login(&url) {
                    return true;
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            sleep(Duration::from_secs(1)).await;
        }
    }

    /// Best-effort debug screenshot.
    async fn shot(&self, name: &str) {
        if let Err(e) = self.page.screenshot(name).await {
            warn!("Could not take screenshot: {e}");
        }
    }
}

fn url_indicates_login(url: &str) -> bool {
    url.contains("/feed") || url.contains("linkedin.com/in/")
}

/// Format the nearest 15-minute slot at or before `when`, as shown in the
/// scheduling dropdown.
fn schedule_slot(when: NaiveDateTime) -> String {
    let minute = (when.minute() / SCHEDULE_SLOT_MINUTES) * SCHEDULE_SLOT_MINUTES;
    format!("{:02}:{:02}", when.hour(), minute)
}

async fn sleep(duration: Duration) {
    tokio::time::sleep(duration).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 15)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn schedule_slots_round_down_to_quarter_hours() {
        assert_eq!(schedule_slot(at(8, 0)), "08:00");
        assert_eq!(schedule_slot(at(8, 14)), "08:00");
        assert_eq!(schedule_slot(at(8, 15)), "08:15");
        assert_eq!(schedule_slot(at(8, 44)), "08:30");
        assert_eq!(schedule_slot(at(23, 59)), "23:45");
    }

    #[test]
    fn feed_urls_count_as_logged_in() {
        assert!(url_indicates_login("https://www.linkedin.com/feed/"));
        assert!(url_indicates_login("https://www.linkedin.com/in/someone"));
        assert!(!url_indicates_login("https://www.linkedin.com/login"));
    }

    #[test]
    fn selector_lists_all_resolve_to_strategies() {
        let lists = [
            start_post_selectors(),
            post_button_selectors(),
            schedule_button_selectors(),
            date_field_selectors(),
            time_field_selectors(),
            confirm_selectors(),
        ];
        for list in lists {
            for selector in list {
                assert!(selector.strategy().is_ok(), "bad selector: {selector}");
            }
        }
        for selector in COMPOSER_SELECTORS
            .iter()
            .chain(LOGGED_IN_INDICATORS.iter())
            .chain(LOGIN_ERROR_SELECTORS.iter())
        {
            assert!(Selector::from(*selector).strategy().is_ok());
        }
    }
}
