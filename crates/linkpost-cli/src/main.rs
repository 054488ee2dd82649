//! Linkpost CLI
//!
//! Publishes LinkedIn posts from a Google Sheets content calendar.
//!
//! Usage:
//!   linkpost post       # Publish today's post now
//!   linkpost schedule   # Schedule the next pending post
//!   linkpost generate   # Generate a post from the subject cell
//!   linkpost check      # Verify configuration and connectivity

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use linkpost::{
    LinkedIn, LlmClient, Page, PostGenerator, PromptTemplate, Settings, SheetsClient,
};

#[derive(Parser)]
#[command(name = "linkpost")]
#[command(about = "📅 Linkpost - LinkedIn publishing from a Google Sheets calendar")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find today's pending post in the sheet and publish it now
    Post,
    /// Take the next pending post and schedule it for its date and time
    Schedule,
    /// Generate a post from the subject cell and write it back to the sheet
    Generate,
    /// Verify configuration, spreadsheet access, LLM and WebDriver endpoints
    Check,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(settings.log_level.clone())),
        )
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Post => run_post(&settings).await,
        Commands::Schedule => run_schedule(&settings).await,
        Commands::Generate => run_generate(&settings).await,
        Commands::Check => run_check(&settings).await,
    };

    if let Err(e) = result {
        error!("❌ {e:#}");
        std::process::exit(1);
    }
}

/// Publish today's post: sheet lookup, login, composer, Post button, then
/// flip the row's status to "yes".
async fn run_post(settings: &Settings) -> Result<()> {
    info!("🚀 Starting LinkedIn auto-posting");
    settings.validate_posting()?;

    let (key_path, spreadsheet_id) = settings.sheets_config()?;
    let sheets = SheetsClient::connect(key_path, spreadsheet_id)
        .await
        .context("could not connect to Google Sheets")?;

    let Some(post) = sheets.find_post_for_today().await? else {
        info!("📭 No post scheduled for today ({})", Local::now().format("%d/%m/%Y"));
        return Ok(());
    };
    info!("📝 Found post for today at row {}", post.row);

    let (email, password) = settings.linkedin_credentials()?;
    let page = Page::open(
        &settings.webdriver_url,
        settings.browser_mode,
        &settings.screenshot_dir,
    )
    .await?;
    let linkedin = LinkedIn::new(page);

    let outcome = publish_flow(&linkedin, &email, &password, &post.text).await;
    linkedin.close().await;
    outcome?;

    sheets.update_post_status(post.row, "yes").await?;
    info!("✅ Post published and marked as posted (row {})", post.row);
    Ok(())
}

async fn publish_flow(
    linkedin: &LinkedIn,
    email: &str,
    password: &str,
    text: &str,
) -> Result<()> {
    linkedin.login(email, password).await?;
    linkedin.publish_post(text).await?;
    Ok(())
}

/// Schedule the next pending post for its own date and time via the
/// composer's scheduling dialog.
async fn run_schedule(settings: &Settings) -> Result<()> {
    info!("🚀 Starting LinkedIn post scheduling");
    settings.validate_posting()?;

    let (key_path, spreadsheet_id) = settings.sheets_config()?;
    let sheets = SheetsClient::connect(key_path, spreadsheet_id)
        .await
        .context("could not connect to Google Sheets")?;

    let Some(post) = sheets.next_scheduled_post().await? else {
        info!("📭 No pending post with a valid date and time");
        return Ok(());
    };
    if post.when <= Local::now().naive_local() {
        warn!(
            "Row {} is scheduled in the past ({}); publishing it with `linkpost post` instead",
            post.row, post.when
        );
        bail!("next pending post is in the past");
    }
    info!("📝 Scheduling row {} for {}", post.row, post.when);

    let (email, password) = settings.linkedin_credentials()?;
    let page = Page::open(
        &settings.webdriver_url,
        settings.browser_mode,
        &settings.screenshot_dir,
    )
    .await?;
    let linkedin = LinkedIn::new(page);

    let outcome = async {
        linkedin.login(&email, &password).await?;
        linkedin.schedule_post(&post.text, post.when).await
    }
    .await;
    linkedin.close().await;
    outcome?;

    sheets.update_post_status(post.row, "yes").await?;
    info!("✅ Post scheduled and marked as posted (row {})", post.row);
    Ok(())
}

/// Generate a post from the subject cell, write it back, then verify the
/// written cell reads back identically.
async fn run_generate(settings: &Settings) -> Result<()> {
    info!("🚀 Starting post generation");
    settings.validate_generation()?;

    let (key_path, spreadsheet_id) = settings.sheets_config()?;
    let sheets = SheetsClient::connect(key_path, spreadsheet_id)
        .await
        .context("could not connect to Google Sheets")?;

    let Some(subject) = sheets.read_subject().await? else {
        bail!("no subject found in the generation sheet (cell A2 is empty)");
    };
    info!("📖 Subject: {subject}");

    let template = PromptTemplate::new(&settings.prompt_template_path)?;
    let llm = LlmClient::new(settings.openai_key()?, &settings.openai_model);
    let generator = PostGenerator::new(template, llm);

    let post = generator.generate(&subject).await?;
    info!("📝 Generated post ({} characters)", post.len());

    sheets.write_generated_post(&post).await?;
    sheets.set_generated_status("yes").await?;

    let written = sheets.read_generated_post().await?;
    if written.trim() != post.trim() {
        warn!(
            "Readback differs from generated text ({} vs {} characters)",
            written.len(),
            post.len()
        );
    } else {
        info!("🔎 Readback verified");
    }

    info!("✅ Post written to the generation sheet");
    Ok(())
}

/// Probe every configured integration and report each one.
async fn run_check(settings: &Settings) -> Result<()> {
    info!("🔍 Checking configuration: {settings:?}");
    let mut failures = 0;

    match settings.sheets_config() {
        Ok((key_path, spreadsheet_id)) => {
            match SheetsClient::connect(key_path, spreadsheet_id).await {
                Ok(_) => info!("✅ Google Sheets: connected"),
                Err(e) => {
                    error!("❌ Google Sheets: {e}");
                    failures += 1;
                }
            }
        }
        Err(e) => {
            warn!("⚠️ Google Sheets not configured: {e}");
        }
    }

    match settings.openai_key() {
        Ok(key) => {
            let llm = LlmClient::new(key, &settings.openai_model);
            if llm.test_connection().await {
                info!("✅ LLM API ({}): reachable", settings.openai_model);
            } else {
                error!("❌ LLM API ({}): unreachable", settings.openai_model);
                failures += 1;
            }
        }
        Err(e) => {
            warn!("⚠️ LLM not configured: {e}");
        }
    }

    let driver = linkpost::WebDriverClient::new(&settings.webdriver_url);
    if driver.is_available().await {
        info!("✅ WebDriver endpoint: {}", settings.webdriver_url);
    } else {
        warn!(
            "⚠️ No WebDriver endpoint at {} (needed for post/schedule)",
            settings.webdriver_url
        );
    }

    match settings.validate_posting() {
        Ok(()) => info!("✅ Posting configuration complete"),
        Err(e) => warn!("⚠️ Posting configuration incomplete: {e}"),
    }
    match settings.validate_generation() {
        Ok(()) => info!("✅ Generation configuration complete"),
        Err(e) => warn!("⚠️ Generation configuration incomplete: {e}"),
    }

    if failures > 0 {
        bail!("{failures} configured integration(s) failed their check");
    }
    info!("🎉 All configured integrations are healthy");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn subcommands_parse() {
        assert!(Cli::try_parse_from(["linkpost", "post"]).is_ok());
        assert!(Cli::try_parse_from(["linkpost", "schedule"]).is_ok());
        assert!(Cli::try_parse_from(["linkpost", "generate"]).is_ok());
        assert!(Cli::try_parse_from(["linkpost", "check"]).is_ok());
        assert!(Cli::try_parse_from(["linkpost", "bogus"]).is_err());
    }
}
