use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::config::GoogleSheetsConfig;
use crate::error::StoreError;
use crate::google_auth::{ServiceAccountAuth, TokenProvider};

/// Header row written to a fresh in-memory sheet
pub const HEADER_ROW: [&str; 10] = [
    "Submission ID",
    "Date",
    "Full Name",
    "Phone",
    "Email",
    "Interest Type",
    "Message",
    "Contacted",
    "Status",
    "Notes",
];

/// Persistence for submission rows
///
/// Rows are plain strings in column order. `read_rows` returns the header row
/// too, exactly as the sheet holds it.
#[async_trait]
pub trait SheetStore: Send + Sync {
    async fn read_rows(&self) -> Result<Vec<Vec<String>>, StoreError>;

    async fn append_row(&self, row: Vec<String>) -> Result<(), StoreError>;

    /// Confirm the store is reachable with the configured credentials.
    async fn check_access(&self) -> Result<(), StoreError> {
        Ok(())
    }

    /// Short label used in logs and the health endpoint.
    fn kind(&self) -> &'static str;
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Google Sheets API v4 client bound to one spreadsheet range
pub struct GoogleSheets {
    http: Client,
    tokens: Arc<dyn TokenProvider>,
    api_base: String,
    spreadsheet_id: String,
    range: String,
}

impl GoogleSheets {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    /// Build a client that authenticates as the configured service account.
    pub fn from_config(config: &GoogleSheetsConfig) -> Result<Self, StoreError> {
        let http = Self::http_client()?;
        let auth = ServiceAccountAuth::new(
            http.clone(),
            &config.service_account_email,
            &config.private_key,
            &config.token_url,
        )?;

        Ok(GoogleSheets::new(
            http,
            Arc::new(auth),
            &config.api_base,
            &config.spreadsheet_id,
            &config.range,
        ))
    }

    pub fn new(
        http: Client,
        tokens: Arc<dyn TokenProvider>,
        api_base: &str,
        spreadsheet_id: &str,
        range: &str,
    ) -> Self {
        GoogleSheets {
            http,
            tokens,
            api_base: api_base.trim_end_matches('/').to_string(),
            spreadsheet_id: spreadsheet_id.to_string(),
            range: range.to_string(),
        }
    }

    pub fn http_client() -> Result<Client, StoreError> {
        Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .user_agent(concat!("picknik-forms/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StoreError::Transport(e.to_string()))
    }

    fn spreadsheet_url(&self) -> String {
        format!(
            "{}/v4/spreadsheets/{}",
            self.api_base,
            urlencoding::encode(&self.spreadsheet_id)
        )
    }

    fn values_url(&self) -> String {
        format!("{}/values/{}", self.spreadsheet_url(), urlencoding::encode(&self.range))
    }

    async fn check_status(res: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        match res.status() {
            s if s.is_success() => Ok(res),
            s @ (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => {
                let body = res.text().await.unwrap_or_default();
                Err(StoreError::Auth(format!("http {}: {}", s.as_u16(), body)))
            }
            s => {
                let body = res.text().await.unwrap_or_default();
                Err(StoreError::Http {
                    status: s.as_u16(),
                    body,
                })
            }
        }
    }
}

#[async_trait]
impl SheetStore for GoogleSheets {
    async fn read_rows(&self) -> Result<Vec<Vec<String>>, StoreError> {
        let token = self.tokens.access_token().await?;

        let res = self
            .http
            .get(self.values_url())
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        let range: ValueRange = Self::check_status(res)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;

        Ok(range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }

    async fn append_row(&self, row: Vec<String>) -> Result<(), StoreError> {
        let token = self.tokens.access_token().await?;

        let res = self
            .http
            .post(format!("{}:append", self.values_url()))
            .bearer_auth(token)
            .query(&[
                ("valueInputOption", "USER_ENTERED"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .json(&json!({
                "range": self.range,
                "majorDimension": "ROWS",
                "values": [row],
            }))
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        Self::check_status(res).await?;
        Ok(())
    }

    async fn check_access(&self) -> Result<(), StoreError> {
        let token = self.tokens.access_token().await?;

        let res = self
            .http
            .get(self.spreadsheet_url())
            .bearer_auth(token)
            .query(&[("fields", "spreadsheetId")])
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        Self::check_status(res).await?;
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "google-sheets"
    }
}

/// Sheets returns formatted strings by default, but be lenient with
/// numbers and booleans.
fn cell_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Process-local sheet
///
/// Used when no spreadsheet is configured (`FORM_STORE=memory`) and in tests.
#[derive(Debug, Default)]
pub struct MemorySheet {
    rows: RwLock<Vec<Vec<String>>>,
}

impl MemorySheet {
    /// A sheet holding only the header row.
    pub fn with_header() -> Self {
        Self::from_rows(vec![HEADER_ROW.iter().map(|h| h.to_string()).collect()])
    }

    pub fn from_rows(rows: Vec<Vec<String>>) -> Self {
        MemorySheet {
            rows: RwLock::new(rows),
        }
    }

    /// Copy of the current contents.
    pub async fn snapshot(&self) -> Vec<Vec<String>> {
        self.rows.read().await.clone()
    }

    /// Delete the newest data row, as staff do when clearing out spam.
    pub async fn remove_last(&self) -> Option<Vec<String>> {
        let mut rows = self.rows.write().await;
        if rows.len() > 1 { rows.pop() } else { None }
    }
}

#[async_trait]
impl SheetStore for MemorySheet {
    async fn read_rows(&self) -> Result<Vec<Vec<String>>, StoreError> {
        Ok(self.snapshot().await)
    }

    async fn append_row(&self, row: Vec<String>) -> Result<(), StoreError> {
        self.rows.write().await.push(row);
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}
