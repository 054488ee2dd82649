//! Post generation: template + LLM call + output cleanup, with retries.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::errors::AutomationError;
use crate::llm::{LlmClient, DEFAULT_MAX_TOKENS};
use crate::prompt::PromptTemplate;

const MAX_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Turns a subject cell into a publishable post.
pub struct PostGenerator {
    template: PromptTemplate,
    llm: LlmClient,
    max_attempts: u32,
    retry_delay: Duration,
}

impl PostGenerator {
    pub fn new(template: PromptTemplate, llm: LlmClient) -> Self {
        Self {
            template,
            llm,
            max_attempts: MAX_ATTEMPTS,
            retry_delay: RETRY_DELAY,
        }
    }

    /// Generate a post for the subject. The whole pipeline (template render,
    /// API call, cleanup) is retried on failure with a fixed delay.
    pub async fn generate(&self, subject: &str) -> Result<String, AutomationError> {
        let subject = subject.trim();
        if subject.is_empty() {
            return Err(AutomationError::InvalidArgument(
                "subject cannot be empty".to_string(),
            ));
        }

        info!("Generating post for subject: {subject}");

        let mut last_error = None;
        for attempt in 1..=self.max_attempts {
            debug!("Attempt {attempt}/{}", self.max_attempts);
            match self.generate_once(subject).await {
                Ok(post) => {
                    info!("Post generated successfully ({} characters)", post.len());
                    return Ok(post);
                }
                Err(e) => {
                    warn!("Attempt {attempt}/{} failed: {e}", self.max_attempts);
                    last_error = Some(e);
                    if attempt < self.max_attempts {
                        info!("Retrying in {:?}...", self.retry_delay);
                        sleep(self.retry_delay).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            AutomationError::Llm("post generation failed for unknown reason".to_string())
        }))
    }

    async fn generate_once(&self, subject: &str) -> Result<String, AutomationError> {
        let prompt = self.template.render(subject)?;
        let raw = self.llm.generate_post(&prompt, DEFAULT_MAX_TOKENS).await?;
        Ok(clean_post(&raw))
    }
}

/// Strip wrapper tags the model sometimes emits and normalize whitespace.
pub fn clean_post(text: &str) -> String {
    let mut cleaned = text.trim().to_string();

    for tag in [
        "<AgentOutput>",
        "</AgentOutput>",
        "<Post>",
        "</Post>",
        "<Output>",
        "</Output>",
    ] {
        cleaned = cleaned.replace(tag, "");
    }
    cleaned = cleaned.trim().to_string();

    // A stray unknown opening tag at the very start
    if cleaned.starts_with('<') {
        if let Some(close) = cleaned.find('>') {
            cleaned = cleaned[close + 1..].trim().to_string();
        }
    }
    // A stray truncated closing tag at the very end
    if cleaned.ends_with("</") {
        if let Some(open) = cleaned.rfind('<') {
            cleaned = cleaned[..open].trim().to_string();
        }
    }

    // Collapse runs of blank lines to a single one
    let mut lines = Vec::new();
    let mut previous_blank = false;
    for line in cleaned.lines() {
        let blank = line.trim().is_empty();
        if blank && previous_blank {
            continue;
        }
        lines.push(line);
        previous_blank = blank;
    }

    lines.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn known_wrapper_tags_are_stripped() {
        assert_eq!(
            clean_post("<AgentOutput>Le post.</AgentOutput>"),
            "Le post."
        );
        assert_eq!(clean_post("<Post>body</Post>"), "body");
        assert_eq!(clean_post("  plain text  "), "plain text");
    }

    #[test]
    fn stray_leading_tag_is_removed() {
        assert_eq!(clean_post("<Unknown>content here"), "content here");
    }

    #[test]
    fn blank_line_runs_collapse_to_one() {
        let raw = "Ligne un.\n\n\n\nLigne deux.\n\nLigne trois.";
        assert_eq!(clean_post(raw), "Ligne un.\n\nLigne deux.\n\nLigne trois.");
    }

    #[tokio::test]
    async fn empty_subject_is_rejected_before_any_call() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"<Input><UserInput>x</UserInput></Input>")
            .unwrap();
        let template = PromptTemplate::new(file.path()).unwrap();
        // Unreachable endpoint: the call must fail before it would matter.
        let llm = LlmClient::with_base_url("http://127.0.0.1:9", "key", "gpt-4");

        let generator = PostGenerator::new(template, llm);
        let err = generator.generate("   ").await.unwrap_err();
        assert!(matches!(err, AutomationError::InvalidArgument(_)));
    }
}
