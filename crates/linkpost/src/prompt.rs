//! Prompt template loading and subject injection.
//!
//! Templates are plain text with XML-ish sections. The subject goes between
//! the `<UserInput>` markers of the `<Input>` section; `<Examples>` sections
//! may contain their own `<UserInput>` markers and must stay untouched.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::errors::AutomationError;

const INPUT_OPEN: &str = "<Input>";
const INPUT_CLOSE: &str = "</Input>";
const USER_INPUT_OPEN: &str = "<UserInput>";
const USER_INPUT_CLOSE: &str = "</UserInput>";

/// A prompt template file on disk.
pub struct PromptTemplate {
    path: PathBuf,
}

impl PromptTemplate {
    pub fn new(path: &Path) -> Result<Self, AutomationError> {
        if !path.exists() {
            return Err(AutomationError::Template(format!(
                "prompt template not found: {}",
                path.display()
            )));
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn load(&self) -> Result<String, AutomationError> {
        debug!("Loading prompt template from: {}", self.path.display());
        let template = std::fs::read_to_string(&self.path)?;
        info!("Template loaded ({} characters)", template.len());
        Ok(template)
    }

    /// Load the template and inject the subject in one call.
    pub fn render(&self, subject: &str) -> Result<String, AutomationError> {
        inject_subject(&self.load()?, subject)
    }
}

/// Replace the content between the `<UserInput>` markers of the first
/// `<Input>` section with `subject`. Everything outside that section,
/// including example `<UserInput>` pairs, is preserved byte for byte.
pub fn inject_subject(template: &str, subject: &str) -> Result<String, AutomationError> {
    let input_start = template.find(INPUT_OPEN).ok_or_else(|| {
        AutomationError::Template(format!("could not find {INPUT_OPEN} section in template"))
    })?;
    let input_end = template[input_start..]
        .find(INPUT_CLOSE)
        .map(|offset| input_start + offset)
        .ok_or_else(|| {
            AutomationError::Template(format!("could not find {INPUT_CLOSE} tag in template"))
        })?;

    let section = &template[input_start..input_end + INPUT_CLOSE.len()];

    let marker_start = section.find(USER_INPUT_OPEN).ok_or_else(|| {
        AutomationError::Template(format!(
            "could not find {USER_INPUT_OPEN} tag within {INPUT_OPEN} section"
        ))
    })?;
    let marker_end = section[marker_start..]
        .find(USER_INPUT_CLOSE)
        .map(|offset| marker_start + offset)
        .ok_or_else(|| {
            AutomationError::Template(format!(
                "could not find {USER_INPUT_CLOSE} tag within {INPUT_OPEN} section"
            ))
        })?;

    let mut rendered = String::with_capacity(template.len() + subject.len());
    rendered.push_str(&template[..input_start]);
    rendered.push_str(&section[..marker_start + USER_INPUT_OPEN.len()]);
    rendered.push_str(subject);
    rendered.push_str(&section[marker_end..]);
    rendered.push_str(&template[input_end + INPUT_CLOSE.len()..]);

    debug!("Subject injected, prompt length: {} characters", rendered.len());
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const TEMPLATE: &str = "\
Instructions before.
<Input>
  <UserInput>placeholder subject</UserInput>
</Input>
<Examples>
  <Example>
    <UserInput>example subject kept as-is</UserInput>
    <AgentOutput>example post</AgentOutput>
  </Example>
</Examples>
Instructions after.
";

    #[test]
    fn replaces_only_the_input_section_marker() {
        let rendered = inject_subject(TEMPLATE, "freelancing in 2026").unwrap();
        assert!(rendered.contains("<UserInput>freelancing in 2026</UserInput>"));
        assert!(!rendered.contains("placeholder subject"));
        // The examples section is untouched
        assert!(rendered.contains("<UserInput>example subject kept as-is</UserInput>"));
        assert!(rendered.contains("Instructions before."));
        assert!(rendered.contains("Instructions after."));
    }

    #[test]
    fn missing_markers_are_reported() {
        assert!(inject_subject("no tags at all", "s").is_err());
        assert!(inject_subject("<Input>unterminated", "s").is_err());
        assert!(inject_subject("<Input>no marker</Input>", "s").is_err());
        assert!(inject_subject("<Input><UserInput>open</Input>", "s").is_err());
    }

    #[test]
    fn marker_outside_input_section_does_not_count() {
        let template = "<Examples><UserInput>x</UserInput></Examples>";
        let err = inject_subject(template, "s").unwrap_err();
        assert!(err.to_string().contains("<Input>"));
    }

    #[test]
    fn render_reads_the_template_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TEMPLATE.as_bytes()).unwrap();

        let template = PromptTemplate::new(file.path()).unwrap();
        let rendered = template.render("remote work").unwrap();
        assert!(rendered.contains("<UserInput>remote work</UserInput>"));
    }

    #[test]
    fn missing_template_file_is_an_error() {
        assert!(PromptTemplate::new(Path::new("/nonexistent/template.txt")).is_err());
    }
}
