use crate::errors::AutomationError;

/// Represents ways to locate an element in the target web UI.
///
/// The site this tool drives has no stable selector contract, so flows keep
/// lists of candidate selectors and try them in order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// CSS selector string
    Css(String),
    /// XPath query
    XPath(String),
    /// Exact visible text of any element
    Text(String),
    /// Represents an invalid selector string, with a reason.
    Invalid(String),
}

impl Selector {
    /// Elements of the given tag whose subtree contains the given text,
    /// the equivalent of Playwright's `tag:has-text("...")`.
    pub fn tag_with_text(tag: &str, text: &str) -> Selector {
        Selector::XPath(format!("//{tag}[contains(., {})]", xpath_literal(text)))
    }

    /// The WebDriver location strategy pair for this selector.
    pub(crate) fn strategy(&self) -> Result<(&'static str, String), AutomationError> {
        match self {
            Selector::Css(css) => Ok(("css selector", css.clone())),
            Selector::XPath(xpath) => Ok(("xpath", xpath.clone())),
            Selector::Text(text) => Ok((
                "xpath",
                format!("//*[normalize-space(text())={}]", xpath_literal(text)),
            )),
            Selector::Invalid(reason) => Err(AutomationError::InvalidSelector(reason.clone())),
        }
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Selector::Css(css) => write!(f, "css={css}"),
            Selector::XPath(xpath) => write!(f, "xpath={xpath}"),
            Selector::Text(text) => write!(f, "text={text}"),
            Selector::Invalid(reason) => write!(f, "invalid({reason})"),
        }
    }
}

impl From<&str> for Selector {
    fn from(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() {
            return Selector::Invalid("empty selector string".to_string());
        }

        match s {
            _ if s.starts_with("css=") => Selector::Css(s["css=".len()..].to_string()),
            _ if s.starts_with("xpath=") => Selector::XPath(s["xpath=".len()..].to_string()),
            _ if s.starts_with("text=") => {
                Selector::Text(s["text=".len()..].trim_matches('"').to_string())
            }
            // Bare XPath queries start at the document root
            _ if s.starts_with("//") || s.starts_with("./") => Selector::XPath(s.to_string()),
            _ => Selector::Css(s.to_string()),
        }
    }
}

impl From<String> for Selector {
    fn from(s: String) -> Self {
        Selector::from(s.as_str())
    }
}

/// Quote a string as an XPath literal. XPath 1.0 has no escape syntax, so a
/// value containing both quote kinds must be assembled with `concat()`.
fn xpath_literal(text: &str) -> String {
    if !text.contains('\'') {
        format!("'{text}'")
    } else if !text.contains('"') {
        format!("\"{text}\"")
    } else {
        let parts: Vec<String> = text
            .split('\'')
            .map(|part| format!("'{part}'"))
            .collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_strings_parse_as_css() {
        assert_eq!(
            Selector::from("div[contenteditable=\"true\"]"),
            Selector::Css("div[contenteditable=\"true\"]".to_string())
        );
        assert_eq!(Selector::from("#username"), Selector::Css("#username".to_string()));
    }

    #[test]
    fn prefixed_strings_parse_to_their_variant() {
        assert_eq!(
            Selector::from("css=button.share"),
            Selector::Css("button.share".to_string())
        );
        assert_eq!(
            Selector::from("xpath=//button[1]"),
            Selector::XPath("//button[1]".to_string())
        );
        assert_eq!(
            Selector::from("text=\"Start a post\""),
            Selector::Text("Start a post".to_string())
        );
    }

    #[test]
    fn bare_xpath_is_recognized() {
        assert_eq!(
            Selector::from("//div[@role='alert']"),
            Selector::XPath("//div[@role='alert']".to_string())
        );
    }

    #[test]
    fn empty_string_is_invalid() {
        assert!(matches!(Selector::from("  "), Selector::Invalid(_)));
        assert!(Selector::from("").strategy().is_err());
    }

    #[test]
    fn text_selector_strategy_uses_xpath() {
        let (using, value) = Selector::Text("Schedule".to_string()).strategy().unwrap();
        assert_eq!(using, "xpath");
        assert_eq!(value, "//*[normalize-space(text())='Schedule']");
    }

    #[test]
    fn tag_with_text_builds_contains_query() {
        let selector = Selector::tag_with_text("button", "Post");
        assert_eq!(
            selector,
            Selector::XPath("//button[contains(., 'Post')]".to_string())
        );
    }

    #[test]
    fn xpath_literal_handles_quotes() {
        assert_eq!(xpath_literal("plain"), "'plain'");
        assert_eq!(xpath_literal("it's"), "\"it's\"");
        assert_eq!(
            xpath_literal("both ' and \""),
            "concat('both ', \"'\", ' and \"')"
        );
    }
}
