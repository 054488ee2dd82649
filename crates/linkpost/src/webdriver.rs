//! Minimal W3C WebDriver wire-protocol client.
//!
//! The automation talks to an externally launched chromedriver over plain
//! JSON/HTTP, the same way the CDP bridge connects to an existing browser.
//! Only the handful of endpoints the posting flows need are implemented.

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::errors::AutomationError;
use crate::selector::Selector;

/// Key under which the W3C protocol nests element references.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Lightweight WebDriver client for a locally running chromedriver.
#[derive(Debug, Clone)]
pub struct WebDriverClient {
    base_url: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    value: Value,
}

impl WebDriverClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check whether a WebDriver endpoint is reachable.
    pub async fn is_available(&self) -> bool {
        match self.http.get(format!("{}/status", self.base_url)).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    /// Start a Chrome session. Returns the session id.
    pub async fn new_session(&self, headless: bool) -> Result<String, AutomationError> {
        let mut args = vec![
            "--window-size=1920,1080".to_string(),
            "--disable-notifications".to_string(),
            format!("--user-agent={DEFAULT_USER_AGENT}"),
        ];
        if headless {
            args.push("--headless=new".to_string());
        }

        let body = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": { "args": args }
                }
            }
        });

        let value = self.execute("POST", "/session", Some(body)).await?;
        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                AutomationError::WebDriver(format!("no sessionId in new-session response: {value}"))
            })?;

        debug!(session_id, headless, "WebDriver session created");
        Ok(session_id.to_string())
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<(), AutomationError> {
        self.execute("DELETE", &format!("/session/{session_id}"), None)
            .await?;
        debug!(session_id, "WebDriver session deleted");
        Ok(())
    }

    pub async fn navigate(&self, session_id: &str, url: &str) -> Result<(), AutomationError> {
        self.execute(
            "POST",
            &format!("/session/{session_id}/url"),
            Some(json!({ "url": url })),
        )
        .await?;
        Ok(())
    }

    pub async fn current_url(&self, session_id: &str) -> Result<String, AutomationError> {
        let value = self
            .execute("GET", &format!("/session/{session_id}/url"), None)
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    pub async fn title(&self, session_id: &str) -> Result<String, AutomationError> {
        let value = self
            .execute("GET", &format!("/session/{session_id}/title"), None)
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    pub async fn find_element(
        &self,
        session_id: &str,
        selector: &Selector,
    ) -> Result<String, AutomationError> {
        let (using, value) = selector.strategy()?;
        let response = self
            .execute(
                "POST",
                &format!("/session/{session_id}/element"),
                Some(json!({ "using": using, "value": value })),
            )
            .await?;
        extract_element_id(&response)
    }

    pub async fn find_elements(
        &self,
        session_id: &str,
        selector: &Selector,
    ) -> Result<Vec<String>, AutomationError> {
        let (using, value) = selector.strategy()?;
        let response = self
            .execute(
                "POST",
                &format!("/session/{session_id}/elements"),
                Some(json!({ "using": using, "value": value })),
            )
            .await?;

        let ids = response
            .as_array()
            .map(|entries| entries.iter().filter_map(|e| extract_element_id(e).ok()).collect())
            .unwrap_or_default();
        Ok(ids)
    }

    pub async fn click(&self, session_id: &str, element_id: &str) -> Result<(), AutomationError> {
        self.execute(
            "POST",
            &format!("/session/{session_id}/element/{element_id}/click"),
            Some(json!({})),
        )
        .await?;
        Ok(())
    }

    pub async fn clear(&self, session_id: &str, element_id: &str) -> Result<(), AutomationError> {
        self.execute(
            "POST",
            &format!("/session/{session_id}/element/{element_id}/clear"),
            Some(json!({})),
        )
        .await?;
        Ok(())
    }

    pub async fn send_keys(
        &self,
        session_id: &str,
        element_id: &str,
        text: &str,
    ) -> Result<(), AutomationError> {
        self.execute(
            "POST",
            &format!("/session/{session_id}/element/{element_id}/value"),
            Some(json!({ "text": text })),
        )
        .await?;
        Ok(())
    }

    pub async fn element_text(
        &self,
        session_id: &str,
        element_id: &str,
    ) -> Result<String, AutomationError> {
        let value = self
            .execute(
                "GET",
                &format!("/session/{session_id}/element/{element_id}/text"),
                None,
            )
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    pub async fn element_attribute(
        &self,
        session_id: &str,
        element_id: &str,
        name: &str,
    ) -> Result<Option<String>, AutomationError> {
        let value = self
            .execute(
                "GET",
                &format!("/session/{session_id}/element/{element_id}/attribute/{name}"),
                None,
            )
            .await?;
        Ok(value.as_str().map(str::to_string))
    }

    pub async fn is_displayed(
        &self,
        session_id: &str,
        element_id: &str,
    ) -> Result<bool, AutomationError> {
        let value = self
            .execute(
                "GET",
                &format!("/session/{session_id}/element/{element_id}/displayed"),
                None,
            )
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    /// Execute JavaScript in the page, returning the script's value.
    pub async fn execute_script(
        &self,
        session_id: &str,
        script: &str,
    ) -> Result<Value, AutomationError> {
        let value = self
            .execute(
                "POST",
                &format!("/session/{session_id}/execute/sync"),
                Some(json!({ "script": script, "args": [] })),
            )
            .await?;
        Ok(value)
    }

    /// Capture the viewport as PNG bytes.
    pub async fn screenshot(&self, session_id: &str) -> Result<Vec<u8>, AutomationError> {
        use base64::Engine as _;

        let value = self
            .execute("GET", &format!("/session/{session_id}/screenshot"), None)
            .await?;
        let encoded = value.as_str().ok_or_else(|| {
            AutomationError::WebDriver("screenshot response was not a string".to_string())
        })?;

        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| AutomationError::WebDriver(format!("failed to decode screenshot: {e}")))
    }

    async fn execute(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, AutomationError> {
        let url = format!("{}{path}", self.base_url);
        let request = match method {
            "GET" => self.http.get(&url),
            "DELETE" => self.http.delete(&url),
            _ => self.http.post(&url).json(&body.unwrap_or_else(|| json!({}))),
        };

        let response = request
            .send()
            .await
            .map_err(|e| AutomationError::WebDriver(format!("request to {path} failed: {e}")))?;

        let status = response.status();
        let wire: WireResponse = response.json().await.map_err(|e| {
            AutomationError::WebDriver(format!("failed to parse response from {path}: {e}"))
        })?;

        if !status.is_success() {
            return Err(map_wire_error(&wire.value));
        }
        Ok(wire.value)
    }
}

fn extract_element_id(value: &Value) -> Result<String, AutomationError> {
    value
        .get(ELEMENT_KEY)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            AutomationError::WebDriver(format!("no element reference in response: {value}"))
        })
}

/// Map a WebDriver error payload onto the error taxonomy.
fn map_wire_error(value: &Value) -> AutomationError {
    let code = value.get("error").and_then(Value::as_str).unwrap_or("unknown error");
    let message = value
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let detail = format!("{code}: {message}");

    match code {
        "no such element" | "stale element reference" => {
            AutomationError::ElementNotFound(detail)
        }
        "timeout" | "script timeout" => AutomationError::Timeout(detail),
        _ => {
            warn!("WebDriver returned error payload: {detail}");
            AutomationError::WebDriver(detail)
        }
    }
}

/// Human instructions for when no WebDriver endpoint is reachable.
pub fn driver_launch_instructions() -> &'static str {
    r#"
No WebDriver endpoint is reachable. Start chromedriver first:

    chromedriver --port=9515

Then point LINKPOST at it (the default already matches):

    WEBDRIVER_URL=http://localhost:9515
"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_reference_is_extracted_from_w3c_payload() {
        let payload = json!({ ELEMENT_KEY: "abc-123" });
        assert_eq!(extract_element_id(&payload).unwrap(), "abc-123");

        let bad = json!({ "element": "legacy-id" });
        assert!(extract_element_id(&bad).is_err());
    }

    #[test]
    fn wire_errors_map_to_error_taxonomy() {
        let not_found = json!({ "error": "no such element", "message": "no node" });
        assert!(matches!(
            map_wire_error(&not_found),
            AutomationError::ElementNotFound(_)
        ));

        let timeout = json!({ "error": "timeout", "message": "page load" });
        assert!(matches!(map_wire_error(&timeout), AutomationError::Timeout(_)));

        let other = json!({ "error": "invalid session id", "message": "gone" });
        assert!(matches!(map_wire_error(&other), AutomationError::WebDriver(_)));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_not_available() {
        // Nothing listens on this port in the test environment.
        let client = WebDriverClient::new("http://127.0.0.1:9");
        assert!(!client.is_available().await);
    }
}
