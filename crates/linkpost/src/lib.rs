//! Automated LinkedIn publishing driven by a Google Sheets content calendar.
//!
//! The pipeline has three legs:
//!
//! - **Sheets**: a spreadsheet holds the calendar (post text, date, time,
//!   posted flag) and a generation tab (subject in, generated post out).
//! - **Generation**: a prompt template plus an OpenAI chat call turns a
//!   subject into a publishable French post.
//! - **Browser**: a WebDriver session drives the LinkedIn web UI to log in
//!   and publish or schedule the post.
//!
//! ```no_run
//! use std::path::Path;
//! use linkpost::{BrowserMode, LinkedIn, Page};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), linkpost::AutomationError> {
//!     let page = Page::open(
//!         "http://localhost:9515",
//!         BrowserMode::Visible,
//!         Path::new("screenshots"),
//!     )
//!     .await?;
//!     let linkedin = LinkedIn::new(page);
//!     linkedin.login("user@example.com", "secret").await?;
//!     linkedin.publish_post("Bonjour LinkedIn !").await?;
//!     linkedin.close().await;
//!     Ok(())
//! }
//! ```

pub mod browser;
pub mod config;
pub mod errors;
pub mod generation;
pub mod linkedin;
pub mod llm;
pub mod locator;
pub mod prompt;
pub mod selector;
pub mod sheets;
pub mod webdriver;

pub use browser::{Element, Page};
pub use config::{BrowserMode, Settings};
pub use errors::AutomationError;
pub use generation::PostGenerator;
pub use linkedin::LinkedIn;
pub use llm::LlmClient;
pub use locator::Locator;
pub use prompt::PromptTemplate;
pub use selector::Selector;
pub use sheets::{PostRow, ScheduledPost, SheetsClient};
pub use webdriver::WebDriverClient;
