//! Google Sheets adapter.
//!
//! Talks to the Sheets v4 values API with a service-account JWT-bearer grant.
//! The posts sheet holds one row per post: A = text, B = date (DD/MM/YYYY),
//! C = time (HH:MM, optional for publish-now), D = posted status ("yes"/"no").
//! A second sheet drives generation: A2 = subject, B2 = generated text,
//! C2 = generated status.

use std::path::Path;
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::errors::AutomationError;

// Column positions on the posts sheet (1-based)
pub const COL_POST_TEXT: usize = 1;
pub const COL_DATE: usize = 2;
pub const COL_TIME: usize = 3;
pub const COL_POSTED: usize = 4;

const POSTS_RANGE: &str = "A1:D";
const GENERATION_SHEET: &str = "Sheet2";
const SUBJECT_CELL: &str = "A2";
const GENERATED_POST_CELL: &str = "B2";
const GENERATED_STATUS_CELL: &str = "C2";

const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const TOKEN_LEEWAY: Duration = Duration::from_secs(60);

/// One row of the posts sheet, cells trimmed, status lowercased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRow {
    /// 1-based spreadsheet row number
    pub row: usize,
    pub text: String,
    pub date_raw: String,
    pub time_raw: String,
    pub posted: String,
}

impl PostRow {
    pub fn is_posted(&self) -> bool {
        self.posted == "yes"
    }
}

/// A post ready to be scheduled: row content plus the parsed target datetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledPost {
    pub row: usize,
    pub text: String,
    pub when: NaiveDateTime,
}

#[derive(Debug, Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    token_uri: String,
}

#[derive(Debug, Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct ValuesResponse {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

/// Client for one spreadsheet, authorized through a service account.
pub struct SheetsClient {
    http: reqwest::Client,
    key: ServiceAccountKey,
    spreadsheet_id: String,
    base_url: String,
    token: Mutex<Option<CachedToken>>,
}

impl SheetsClient {
    /// Load the service-account key and verify access by fetching the
    /// spreadsheet title.
    pub async fn connect(
        service_account_path: &Path,
        spreadsheet_id: &str,
    ) -> Result<Self, AutomationError> {
        let raw = std::fs::read_to_string(service_account_path)?;
        let key: ServiceAccountKey = serde_json::from_str(&raw).map_err(|e| {
            AutomationError::Sheets(format!(
                "invalid service account file {}: {e}",
                service_account_path.display()
            ))
        })?;

        let client = Self {
            http: reqwest::Client::new(),
            key,
            spreadsheet_id: spreadsheet_id.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            token: Mutex::new(None),
        };

        let title = client.spreadsheet_title().await?;
        info!("Successfully connected to Google Sheet: {title}");
        Ok(client)
    }

    async fn spreadsheet_title(&self) -> Result<String, AutomationError> {
        let token = self.access_token().await?;
        let url = format!(
            "{}/{}?fields=properties.title",
            self.base_url, self.spreadsheet_id
        );
        let response = self
            .http
            .get(&url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| AutomationError::Sheets(format!("metadata request failed: {e}")))?;
        let body: serde_json::Value = check_response(response).await?;
        Ok(body
            .pointer("/properties/title")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("<untitled>")
            .to_string())
    }

    /// Exchange the service-account assertion for an access token, cached
    /// until shortly before expiry.
    async fn access_token(&self) -> Result<String, AutomationError> {
        let mut guard = self.token.lock().await;
        if let Some(cached) = guard.as_ref() {
            if cached.expires_at > Instant::now() {
                return Ok(cached.token.clone());
            }
        }

        let now = chrono::Utc::now().timestamp();
        let claims = JwtClaims {
            iss: &self.key.client_email,
            scope: SHEETS_SCOPE,
            aud: &self.key.token_uri,
            iat: now,
            exp: now + 3600,
        };
        let encoding_key = jsonwebtoken::EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .map_err(|e| AutomationError::Sheets(format!("invalid service account key: {e}")))?;
        let assertion = jsonwebtoken::encode(
            &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256),
            &claims,
            &encoding_key,
        )
        .map_err(|e| AutomationError::Sheets(format!("failed to sign auth assertion: {e}")))?;

        let response = self
            .http
            .post(&self.key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AutomationError::Sheets(format!("token request failed: {e}")))?;
        let token: TokenResponse = check_response(response).await?;

        debug!("Access token refreshed, valid for {}s", token.expires_in);
        let expires_at =
            Instant::now() + Duration::from_secs(token.expires_in).saturating_sub(TOKEN_LEEWAY);
        *guard = Some(CachedToken {
            token: token.access_token.clone(),
            expires_at,
        });
        Ok(token.access_token)
    }

    async fn get_values(&self, range: &str) -> Result<Vec<Vec<String>>, AutomationError> {
        let token = self.access_token().await?;
        let url = format!(
            "{}/{}/values/{range}",
            self.base_url, self.spreadsheet_id
        );
        let response = self
            .http
            .get(&url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| AutomationError::Sheets(format!("read of range {range} failed: {e}")))?;
        let body: ValuesResponse = check_response(response).await?;
        Ok(body.values)
    }

    async fn update_cell(&self, range: &str, value: &str) -> Result<(), AutomationError> {
        let token = self.access_token().await?;
        let url = format!(
            "{}/{}/values/{range}?valueInputOption=RAW",
            self.base_url, self.spreadsheet_id
        );
        let response = self
            .http
            .put(&url)
            .bearer_auth(&token)
            .json(&json!({ "values": [[value]] }))
            .send()
            .await
            .map_err(|e| AutomationError::Sheets(format!("write to {range} failed: {e}")))?;
        let _: serde_json::Value = check_response(response).await?;
        Ok(())
    }

    /// First row dated today that has not been posted yet.
    pub async fn find_post_for_today(&self) -> Result<Option<PostRow>, AutomationError> {
        let today = Local::now().date_naive();
        info!("Looking for post with date: {}", today.format("%d/%m/%Y"));
        let rows = self.get_values(POSTS_RANGE).await?;
        Ok(find_for_date(&rows, today))
    }

    /// First row whose posted status is "no".
    pub async fn first_unposted_row(&self) -> Result<Option<usize>, AutomationError> {
        let rows = self.get_values(POSTS_RANGE).await?;
        Ok(first_unposted(&rows))
    }

    /// Read one row of the posts sheet.
    pub async fn read_post_row(&self, row: usize) -> Result<PostRow, AutomationError> {
        let range = format!("A{row}:D{row}");
        let rows = self.get_values(&range).await?;
        let cells = rows.first().cloned().unwrap_or_default();
        Ok(row_from_cells(row, &cells))
    }

    /// The next unposted row with valid text, date and time, or `None`.
    pub async fn next_scheduled_post(&self) -> Result<Option<ScheduledPost>, AutomationError> {
        let rows = self.get_values(POSTS_RANGE).await?;
        Ok(next_scheduled(&rows))
    }

    /// Write the posted-status cell for a row.
    pub async fn update_post_status(
        &self,
        row: usize,
        status: &str,
    ) -> Result<(), AutomationError> {
        let cell = format!("{}{row}", column_letter(COL_POSTED));
        self.update_cell(&cell, status).await?;
        info!("Updated row {row} status to '{status}'");
        Ok(())
    }

    /// Subject cell of the generation sheet, `None` when empty.
    pub async fn read_subject(&self) -> Result<Option<String>, AutomationError> {
        let range = format!("{GENERATION_SHEET}!{SUBJECT_CELL}");
        let rows = self.get_values(&range).await?;
        let subject = rows
            .first()
            .and_then(|cells| cells.first())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        Ok(subject)
    }

    pub async fn write_generated_post(&self, text: &str) -> Result<(), AutomationError> {
        let range = format!("{GENERATION_SHEET}!{GENERATED_POST_CELL}");
        self.update_cell(&range, text).await
    }

    pub async fn read_generated_post(&self) -> Result<String, AutomationError> {
        let range = format!("{GENERATION_SHEET}!{GENERATED_POST_CELL}");
        let rows = self.get_values(&range).await?;
        Ok(rows
            .first()
            .and_then(|cells| cells.first())
            .cloned()
            .unwrap_or_default())
    }

    pub async fn set_generated_status(&self, status: &str) -> Result<(), AutomationError> {
        let range = format!("{GENERATION_SHEET}!{GENERATED_STATUS_CELL}");
        self.update_cell(&range, status).await
    }

    pub async fn generated_status(&self) -> Result<String, AutomationError> {
        let range = format!("{GENERATION_SHEET}!{GENERATED_STATUS_CELL}");
        let rows = self.get_values(&range).await?;
        Ok(rows
            .first()
            .and_then(|cells| cells.first())
            .map(|s| s.trim().to_lowercase())
            .unwrap_or_default())
    }
}

async fn check_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, AutomationError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let excerpt: String = body.chars().take(300).collect();
        return Err(AutomationError::Sheets(format!(
            "Sheets API returned {status}: {excerpt}"
        )));
    }
    response
        .json()
        .await
        .map_err(|e| AutomationError::Sheets(format!("failed to parse Sheets response: {e}")))
}

/// Parse a post date cell. Only DD/MM/YYYY is accepted.
pub fn parse_post_date(date_str: &str) -> Result<NaiveDate, AutomationError> {
    NaiveDate::parse_from_str(date_str.trim(), "%d/%m/%Y").map_err(|_| {
        AutomationError::InvalidArgument(format!(
            "invalid date format, expected DD/MM/YYYY, got: {date_str}"
        ))
    })
}

/// Parse a post time cell. Only HH:MM is accepted.
pub fn parse_post_time(time_str: &str) -> Result<(u32, u32), AutomationError> {
    let time = NaiveTime::parse_from_str(time_str.trim(), "%H:%M").map_err(|_| {
        AutomationError::InvalidArgument(format!(
            "invalid time format, expected HH:MM, got: {time_str}"
        ))
    })?;
    use chrono::Timelike;
    Ok((time.hour(), time.minute()))
}

/// Convert a 1-based column index to its letter (1 = A, 27 = AA).
pub fn column_letter(mut col: usize) -> String {
    let mut letters = Vec::new();
    while col > 0 {
        col -= 1;
        letters.push(b'A' + (col % 26) as u8);
        col /= 26;
    }
    letters.reverse();
    String::from_utf8(letters).expect("ASCII letters")
}

fn cell(cells: &[String], col: usize) -> &str {
    cells.get(col - 1).map(String::as_str).unwrap_or("")
}

fn row_from_cells(row: usize, cells: &[String]) -> PostRow {
    PostRow {
        row,
        text: cell(cells, COL_POST_TEXT).trim().to_string(),
        date_raw: cell(cells, COL_DATE).trim().to_string(),
        time_raw: cell(cells, COL_TIME).trim().to_string(),
        posted: cell(cells, COL_POSTED).trim().to_lowercase(),
    }
}

/// Scan rows below the header for the first unposted row dated `target`.
/// Rows with empty or unparseable dates are skipped.
fn find_for_date(rows: &[Vec<String>], target: NaiveDate) -> Option<PostRow> {
    for (idx, cells) in rows.iter().enumerate().skip(1) {
        let row = row_from_cells(idx + 1, cells);
        if row.is_posted() || row.date_raw.is_empty() {
            continue;
        }
        match parse_post_date(&row.date_raw) {
            Ok(date) if date == target => {
                info!("Found post for today at row {}", row.row);
                return Some(row);
            }
            Ok(_) => {}
            Err(_) => debug!("Row {} has invalid date format: {}", row.row, row.date_raw),
        }
    }
    info!("No post found for today");
    None
}

fn first_unposted(rows: &[Vec<String>]) -> Option<usize> {
    rows.iter()
        .enumerate()
        .skip(1)
        .find(|(_, cells)| cell(cells, COL_POSTED).trim().eq_ignore_ascii_case("no"))
        .map(|(idx, _)| idx + 1)
}

/// The first unposted row, validated for scheduling. A first unposted row
/// with missing or malformed fields yields `None` rather than scanning on;
/// the sheet is expected to be fixed by hand in that case.
fn next_scheduled(rows: &[Vec<String>]) -> Option<ScheduledPost> {
    let row_num = first_unposted(rows)?;
    let row = row_from_cells(row_num, &rows[row_num - 1]);

    if row.text.is_empty() {
        warn!("Row {} has empty post text", row.row);
        return None;
    }
    if row.date_raw.is_empty() || row.time_raw.is_empty() {
        warn!("Row {} has empty date or time", row.row);
        return None;
    }

    let date = match parse_post_date(&row.date_raw) {
        Ok(date) => date,
        Err(e) => {
            warn!("Row {}: {e}", row.row);
            return None;
        }
    };
    let (hour, minute) = match parse_post_time(&row.time_raw) {
        Ok(parts) => parts,
        Err(e) => {
            warn!("Row {}: {e}", row.row);
            return None;
        }
    };

    let when = date.and_hms_opt(hour, minute, 0)?;
    Some(ScheduledPost {
        row: row.row,
        text: row.text,
        when,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(data: &[&[&str]]) -> Vec<Vec<String>> {
        data.iter()
            .map(|row| row.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    const HEADER: &[&str] = &["Post", "Date", "Heure", "Posted"];

    #[test]
    fn parses_valid_dates() {
        assert_eq!(
            parse_post_date("13/12/2025").unwrap(),
            NaiveDate::from_ymd_opt(2025, 12, 13).unwrap()
        );
        assert_eq!(
            parse_post_date("  01/01/2026 ").unwrap(),
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()
        );
    }

    #[test]
    fn rejects_non_dmy_dates() {
        assert!(parse_post_date("2025-12-13").is_err());
        assert!(parse_post_date("12/13/2025").is_err()); // month 13
        assert!(parse_post_date("32/01/2025").is_err());
        assert!(parse_post_date("").is_err());
    }

    #[test]
    fn parses_valid_times() {
        assert_eq!(parse_post_time("08:00").unwrap(), (8, 0));
        assert_eq!(parse_post_time("23:59").unwrap(), (23, 59));
    }

    #[test]
    fn rejects_malformed_times() {
        assert!(parse_post_time("8h00").is_err());
        assert!(parse_post_time("25:00").is_err());
        assert!(parse_post_time("08:60").is_err());
        assert!(parse_post_time("").is_err());
    }

    #[test]
    fn column_letters_roll_over_past_z() {
        assert_eq!(column_letter(1), "A");
        assert_eq!(column_letter(4), "D");
        assert_eq!(column_letter(26), "Z");
        assert_eq!(column_letter(27), "AA");
        assert_eq!(column_letter(52), "AZ");
        assert_eq!(column_letter(703), "AAA");
    }

    #[test]
    fn short_rows_map_to_empty_cells() {
        let row = row_from_cells(3, &["only text".to_string()]);
        assert_eq!(row.text, "only text");
        assert_eq!(row.date_raw, "");
        assert_eq!(row.time_raw, "");
        assert_eq!(row.posted, "");
        assert!(!row.is_posted());
    }

    #[test]
    fn today_lookup_skips_posted_and_invalid_rows() {
        let today = NaiveDate::from_ymd_opt(2026, 8, 24).unwrap();
        let data = rows(&[
            HEADER,
            &["already out", "24/08/2026", "08:00", "yes"],
            &["bad date", "2026-08-24", "08:00", "no"],
            &["todays post", "24/08/2026", "09:00", "no"],
            &["also today", "24/08/2026", "10:00", "no"],
        ]);

        let found = find_for_date(&data, today).unwrap();
        assert_eq!(found.row, 4);
        assert_eq!(found.text, "todays post");
    }

    #[test]
    fn today_lookup_returns_none_without_match() {
        let today = NaiveDate::from_ymd_opt(2026, 8, 24).unwrap();
        let data = rows(&[HEADER, &["tomorrow", "25/08/2026", "", "no"]]);
        assert!(find_for_date(&data, today).is_none());
        assert!(find_for_date(&rows(&[HEADER]), today).is_none());
    }

    #[test]
    fn first_unposted_skips_header_and_posted_rows() {
        let data = rows(&[
            HEADER,
            &["a", "01/01/2026", "08:00", "yes"],
            &["b", "02/01/2026", "08:00", "NO"],
        ]);
        assert_eq!(first_unposted(&data), Some(3));
        assert_eq!(first_unposted(&rows(&[HEADER])), None);
    }

    #[test]
    fn next_scheduled_combines_date_and_time() {
        let data = rows(&[
            HEADER,
            &["a", "01/01/2026", "08:00", "yes"],
            &["b", "02/01/2026", "09:30", "no"],
        ]);
        let scheduled = next_scheduled(&data).unwrap();
        assert_eq!(scheduled.row, 3);
        assert_eq!(scheduled.text, "b");
        assert_eq!(
            scheduled.when,
            NaiveDate::from_ymd_opt(2026, 1, 2)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap()
        );
    }

    #[test]
    fn next_scheduled_rejects_incomplete_first_unposted_row() {
        // Missing time on the first unposted row stops the scan.
        let data = rows(&[
            HEADER,
            &["b", "02/01/2026", "", "no"],
            &["c", "03/01/2026", "10:00", "no"],
        ]);
        assert!(next_scheduled(&data).is_none());
    }
}
