//! Configuration loaded from environment variables.
//!
//! The CLI calls `dotenvy::dotenv()` before this module reads the process
//! environment, so a `.env` file in the working directory works too.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::errors::AutomationError;

const DEFAULT_MODEL: &str = "gpt-4";
const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";
const DEFAULT_SCREENSHOT_DIR: &str = "screenshots";
const DEFAULT_TEMPLATE_PATH: &str = "prompts/post_generation_template.txt";

/// Whether the driven browser shows a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BrowserMode {
    #[default]
    Visible,
    Headless,
}

impl BrowserMode {
    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "visible" => Some(BrowserMode::Visible),
            "headless" => Some(BrowserMode::Headless),
            _ => None,
        }
    }
}

impl fmt::Display for BrowserMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrowserMode::Visible => write!(f, "visible"),
            BrowserMode::Headless => write!(f, "headless"),
        }
    }
}

/// Application settings. Optional fields stay `None` when unset; the
/// per-flow validators report everything that is missing at once.
#[derive(Clone)]
pub struct Settings {
    pub linkedin_email: Option<String>,
    pub linkedin_password: Option<String>,
    pub service_account_path: Option<PathBuf>,
    pub spreadsheet_id: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub browser_mode: BrowserMode,
    pub webdriver_url: String,
    pub screenshot_dir: PathBuf,
    pub prompt_template_path: PathBuf,
    pub log_level: String,
}

impl Settings {
    /// Load settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |name: &str| var(name).filter(|v| !v.trim().is_empty());

        let browser_mode = match non_empty("BROWSER_MODE") {
            Some(raw) => BrowserMode::parse(&raw).unwrap_or_else(|| {
                warn!("Invalid BROWSER_MODE '{raw}', using default 'visible'");
                BrowserMode::Visible
            }),
            None => BrowserMode::Visible,
        };

        let openai_model = non_empty("OPENAI_MODEL").unwrap_or_else(|| {
            warn!("Using {DEFAULT_MODEL} by default. For cheaper testing set OPENAI_MODEL=gpt-3.5-turbo");
            DEFAULT_MODEL.to_string()
        });

        Self {
            linkedin_email: non_empty("LINKEDIN_EMAIL"),
            linkedin_password: non_empty("LINKEDIN_PASSWORD"),
            service_account_path: non_empty("GOOGLE_SHEETS_SERVICE_ACCOUNT_PATH").map(PathBuf::from),
            spreadsheet_id: non_empty("GOOGLE_SHEETS_ID"),
            openai_api_key: non_empty("OPENAI_API_KEY"),
            openai_model,
            browser_mode,
            webdriver_url: non_empty("WEBDRIVER_URL")
                .unwrap_or_else(|| DEFAULT_WEBDRIVER_URL.to_string()),
            screenshot_dir: non_empty("SCREENSHOT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SCREENSHOT_DIR)),
            prompt_template_path: non_empty("PROMPT_TEMPLATE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TEMPLATE_PATH)),
            log_level: non_empty("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        }
    }

    /// Everything the posting flows need: LinkedIn credentials + spreadsheet.
    pub fn validate_posting(&self) -> Result<(), AutomationError> {
        let mut errors = Vec::new();
        if self.linkedin_email.is_none() {
            errors.push("LINKEDIN_EMAIL is required but not set".to_string());
        }
        if self.linkedin_password.is_none() {
            errors.push("LINKEDIN_PASSWORD is required but not set".to_string());
        }
        errors.extend(self.sheets_errors());
        collect(errors)
    }

    /// Everything the generation flow needs: spreadsheet + OpenAI key + template.
    pub fn validate_generation(&self) -> Result<(), AutomationError> {
        let mut errors = self.sheets_errors();
        if self.openai_api_key.is_none() {
            errors.push("OPENAI_API_KEY is required but not set".to_string());
        }
        if !self.prompt_template_path.exists() {
            errors.push(format!(
                "Prompt template not found: {}",
                self.prompt_template_path.display()
            ));
        }
        collect(errors)
    }

    fn sheets_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        match &self.service_account_path {
            None => errors
                .push("GOOGLE_SHEETS_SERVICE_ACCOUNT_PATH is required but not set".to_string()),
            Some(path) if !path.exists() => {
                errors.push(format!("Service account file not found: {}", path.display()))
            }
            Some(_) => {}
        }
        if self.spreadsheet_id.is_none() {
            errors.push("GOOGLE_SHEETS_ID is required but not set".to_string());
        }
        errors
    }

    pub fn linkedin_credentials(&self) -> Result<(String, String), AutomationError> {
        match (&self.linkedin_email, &self.linkedin_password) {
            (Some(email), Some(password)) => Ok((email.clone(), password.clone())),
            _ => Err(AutomationError::Config(
                "LinkedIn credentials are not configured".to_string(),
            )),
        }
    }

    pub fn sheets_config(&self) -> Result<(&Path, &str), AutomationError> {
        let path = self.service_account_path.as_deref().ok_or_else(|| {
            AutomationError::Config("Google Sheets configuration is not set".to_string())
        })?;
        let id = self.spreadsheet_id.as_deref().ok_or_else(|| {
            AutomationError::Config("Google Sheets configuration is not set".to_string())
        })?;
        Ok((path, id))
    }

    pub fn openai_key(&self) -> Result<&str, AutomationError> {
        self.openai_api_key
            .as_deref()
            .ok_or_else(|| AutomationError::Config("OPENAI_API_KEY is not set".to_string()))
    }
}

fn collect(errors: Vec<String>) -> Result<(), AutomationError> {
    if errors.is_empty() {
        Ok(())
    } else {
        let joined = errors
            .iter()
            .map(|e| format!("  - {e}"))
            .collect::<Vec<_>>()
            .join("\n");
        Err(AutomationError::Config(format!(
            "configuration errors:\n{joined}"
        )))
    }
}

// Manual Debug keeps credentials out of logs.
impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("linkedin_email", &self.linkedin_email.as_ref().map(|_| "***"))
            .field(
                "linkedin_password",
                &self.linkedin_password.as_ref().map(|_| "***"),
            )
            .field("service_account_path", &self.service_account_path)
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "***"))
            .field("openai_model", &self.openai_model)
            .field("browser_mode", &self.browser_mode)
            .field("webdriver_url", &self.webdriver_url)
            .field("screenshot_dir", &self.screenshot_dir)
            .field("prompt_template_path", &self.prompt_template_path)
            .field("log_level", &self.log_level)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings_from(pairs: &[(&str, &str)]) -> Settings {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_vars(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_env_is_empty() {
        let settings = settings_from(&[]);
        assert_eq!(settings.browser_mode, BrowserMode::Visible);
        assert_eq!(settings.openai_model, "gpt-4");
        assert_eq!(settings.webdriver_url, "http://localhost:9515");
        assert_eq!(settings.log_level, "info");
        assert!(settings.linkedin_email.is_none());
    }

    #[test]
    fn invalid_browser_mode_falls_back_to_visible() {
        let settings = settings_from(&[("BROWSER_MODE", "invisible")]);
        assert_eq!(settings.browser_mode, BrowserMode::Visible);

        let headless = settings_from(&[("BROWSER_MODE", "HEADLESS")]);
        assert_eq!(headless.browser_mode, BrowserMode::Headless);
    }

    #[test]
    fn posting_validation_reports_all_missing_vars() {
        let settings = settings_from(&[]);
        let err = settings.validate_posting().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("LINKEDIN_EMAIL"));
        assert!(message.contains("LINKEDIN_PASSWORD"));
        assert!(message.contains("GOOGLE_SHEETS_SERVICE_ACCOUNT_PATH"));
        assert!(message.contains("GOOGLE_SHEETS_ID"));
    }

    #[test]
    fn missing_service_account_file_is_reported() {
        let settings = settings_from(&[
            ("LINKEDIN_EMAIL", "me@example.com"),
            ("LINKEDIN_PASSWORD", "secret"),
            ("GOOGLE_SHEETS_SERVICE_ACCOUNT_PATH", "/nonexistent/key.json"),
            ("GOOGLE_SHEETS_ID", "sheet-id"),
        ]);
        let err = settings.validate_posting().unwrap_err();
        assert!(err.to_string().contains("Service account file not found"));
    }

    #[test]
    fn empty_values_count_as_unset() {
        let settings = settings_from(&[("LINKEDIN_EMAIL", "   ")]);
        assert!(settings.linkedin_email.is_none());
    }

    #[test]
    fn debug_output_masks_credentials() {
        let settings = settings_from(&[
            ("LINKEDIN_EMAIL", "me@example.com"),
            ("LINKEDIN_PASSWORD", "hunter2"),
            ("OPENAI_API_KEY", "sk-secret"),
        ]);
        let debug = format!("{settings:?}");
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("sk-secret"));
        assert!(!debug.contains("me@example.com"));
    }
}
