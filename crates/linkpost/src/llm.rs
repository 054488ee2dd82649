//! OpenAI chat-completions client.
//!
//! One endpoint, one call shape. The system prompt is fixed; the user prompt
//! is the rendered template.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::AutomationError;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub const DEFAULT_MAX_TOKENS: u32 = 2500;

/// Fixed system prompt steering the model toward short-sentence French posts.
const SYSTEM_PROMPT: &str = "\
You are an elite LinkedIn copywriter specialized in French content. Generate original, \
unique posts in FRENCH based on the subject provided. Do NOT copy the examples - they are \
only for style reference.

LANGUAGE: You MUST write in FRENCH. All posts must be in French language.

CRITICAL FORMATTING RULES - MUST FOLLOW STRICTLY:
- ULTRA-SHORT SENTENCES: MAXIMUM 10-12 WORDS PER SENTENCE. One idea per sentence.
- NO COMPLEX SENTENCES: no relative clauses; make separate sentences instead.
- ULTRA-SHORT PARAGRAPHS: MAXIMUM 2 LINES PER PARAGRAPH. Line break after every 1-2 sentences.
- SIMPLE WORDS: use common, everyday words. Avoid complex or technical terms.
- ACTIVE VOICE: always.
- NO FILLER WORDS: be direct and concise, go straight to the point.
- BE DIVISIVE: take a clear stance that creates debate and engagement.

CRITICAL ACCURACY RULE - ABSOLUTE PRIORITY:
- FACTUAL ACCURACY: all factual, technical, legal, fiscal information MUST be TRUE and \
ACCURATE. If unsure, use cautious formulations or avoid the claim. NEVER invent.

CRITICAL LENGTH RULE - MANDATORY - HIGHEST PRIORITY:
- POST LENGTH: between 300-400 words MINIMUM (approximately 1500-2000 characters). \
Develop multiple paragraphs and angles; do not stop before reaching 300 words.

The prompt contains detailed formatting instructions - follow them STRICTLY.";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    frequency_penalty: f32,
    presence_penalty: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

/// Client for a single chat-completions endpoint.
pub struct LlmClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl LlmClient {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, api_key, model)
    }

    /// Point the client at a different endpoint (tests use a local mock).
    pub fn with_base_url(base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Generate a post from the fully rendered prompt.
    pub async fn generate_post(
        &self,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String, AutomationError> {
        info!("Calling {} to generate post...", self.model);
        debug!(max_tokens, "chat completion parameters");

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens,
            temperature: 0.7,
            top_p: 0.95,
            frequency_penalty: 0.1,
            presence_penalty: 0.1,
        };

        let text = self.complete(&request).await?;
        info!("Post generated successfully ({} characters)", text.len());
        Ok(text)
    }

    /// Probe the endpoint with a minimal request.
    pub async fn test_connection(&self) -> bool {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: "Say 'Hello' if you can read this.",
            }],
            max_tokens: 10,
            temperature: 0.7,
            top_p: 0.95,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        };

        match self.complete(&request).await {
            Ok(reply) => {
                info!("LLM API connection successful. Response: {reply}");
                true
            }
            Err(e) => {
                warn!("LLM API connection failed: {e}");
                false
            }
        }
    }

    async fn complete(&self, request: &ChatRequest<'_>) -> Result<String, AutomationError> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| AutomationError::Llm(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let excerpt: String = body.chars().take(300).collect();
            return Err(AutomationError::Llm(format!(
                "API returned {status}: {excerpt}"
            )));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| AutomationError::Llm(format!("failed to parse response: {e}")))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| AutomationError::Llm("response contained no choices".to_string()))?;

        Ok(content.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read as _;

    fn spawn_mock(response_body: &'static str, status: u16) -> (String, std::thread::JoinHandle<String>) {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let port = server.server_addr().to_ip().unwrap().port();
        let url = format!("http://127.0.0.1:{port}");

        let handle = std::thread::spawn(move || {
            let mut request = server.recv().unwrap();
            let mut body = String::new();
            request.as_reader().read_to_string(&mut body).unwrap();
            let response = tiny_http::Response::from_string(response_body)
                .with_status_code(status)
                .with_header(
                    tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                        .unwrap(),
                );
            request.respond(response).unwrap();
            body
        });

        (url, handle)
    }

    #[tokio::test]
    async fn generate_post_sends_prompt_and_returns_trimmed_content() {
        let (url, handle) = spawn_mock(
            r#"{"choices":[{"message":{"role":"assistant","content":"  Le post généré.  "}}]}"#,
            200,
        );

        let client = LlmClient::with_base_url(&url, "test-key", "gpt-4");
        let text = client.generate_post("the rendered prompt", 500).await.unwrap();
        assert_eq!(text, "Le post généré.");

        let sent = handle.join().unwrap();
        assert!(sent.contains("the rendered prompt"));
        assert!(sent.contains("\"model\":\"gpt-4\""));
        assert!(sent.contains("LinkedIn copywriter"));
    }

    #[tokio::test]
    async fn api_error_status_is_surfaced() {
        let (url, handle) = spawn_mock(r#"{"error":{"message":"bad key"}}"#, 401);

        let client = LlmClient::with_base_url(&url, "bad-key", "gpt-4");
        let err = client.generate_post("prompt", 100).await.unwrap_err();
        assert!(matches!(err, AutomationError::Llm(_)));
        assert!(err.to_string().contains("401"));
        handle.join().unwrap();
    }

    #[tokio::test]
    async fn test_connection_is_false_when_unreachable() {
        let client = LlmClient::with_base_url("http://127.0.0.1:9", "key", "gpt-4");
        assert!(!client.test_connection().await);
    }
}
