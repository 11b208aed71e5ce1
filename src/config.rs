use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_ALLOWED_ORIGINS: &[&str] = &["http://localhost:5173", "https://picknikb.vercel.app"];
pub const DEFAULT_SHEET_RANGE: &str = "Sheet1!A:J";
pub const DEFAULT_SHEETS_API_BASE: &str = "https://sheets.googleapis.com";
pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
pub const DEFAULT_SMTP_PORT: u16 = 465;
pub const DEFAULT_RATE_LIMIT_MAX: u32 = 100;
pub const DEFAULT_RATE_LIMIT_WINDOW: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Runtime settings for the relay, read from the environment
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub allowed_origins: Vec<String>,
    pub store: StoreConfig,
    /// `None` disables email notifications
    pub smtp: Option<SmtpSettings>,
    pub rate_limit: RateLimitConfig,
}

/// Which backing store submissions are written to
#[derive(Debug, Clone)]
pub enum StoreConfig {
    Google(GoogleSheetsConfig),
    /// Process-local sheet, lost on restart
    Memory,
}

#[derive(Clone)]
pub struct GoogleSheetsConfig {
    pub spreadsheet_id: String,
    pub range: String,
    pub service_account_email: String,
    pub private_key: String,
    pub api_base: String,
    pub token_url: String,
}

// Keep the private key out of logs.
impl std::fmt::Debug for GoogleSheetsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleSheetsConfig")
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field("range", &self.range)
            .field("service_account_email", &self.service_account_email)
            .field("api_base", &self.api_base)
            .field("token_url", &self.token_url)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    pub recipient: String,
}

impl std::fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("from", &self.from)
            .field("recipient", &self.recipient)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        RateLimitConfig {
            max_requests: DEFAULT_RATE_LIMIT_MAX,
            window: DEFAULT_RATE_LIMIT_WINDOW,
        }
    }
}

impl Config {
    /// Read the configuration from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through an arbitrary key lookup
    ///
    /// Empty values are treated as unset.
    ///
    /// # Arguments
    /// * `lookup` - Returns the raw value for an environment variable name
    ///
    /// # Returns
    /// * `Result<Config, ConfigError>` - The parsed configuration or the first problem found
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let host: IpAddr = parse_or(get("HOST"), "HOST", IpAddr::from([0, 0, 0, 0]))?;
        let port: u16 = parse_or(get("PORT"), "PORT", 3000)?;

        let allowed_origins = match get("ALLOWED_ORIGINS") {
            Some(list) => list
                .split(',')
                .map(|o| o.trim().trim_end_matches('/').to_string())
                .filter(|o| !o.is_empty())
                .collect(),
            None => DEFAULT_ALLOWED_ORIGINS.iter().map(|o| o.to_string()).collect(),
        };

        let store = match get("FORM_STORE").as_deref() {
            None | Some("google") => StoreConfig::Google(GoogleSheetsConfig {
                spreadsheet_id: get("SPREADSHEET_ID").ok_or(ConfigError::Missing("SPREADSHEET_ID"))?,
                range: get("SHEET_RANGE").unwrap_or_else(|| DEFAULT_SHEET_RANGE.to_string()),
                service_account_email: get("GOOGLE_SERVICE_ACCOUNT_EMAIL")
                    .ok_or(ConfigError::Missing("GOOGLE_SERVICE_ACCOUNT_EMAIL"))?,
                private_key: get("GOOGLE_PRIVATE_KEY")
                    .map(|k| unescape_newlines(&k))
                    .ok_or(ConfigError::Missing("GOOGLE_PRIVATE_KEY"))?,
                api_base: get("GOOGLE_SHEETS_API_BASE")
                    .unwrap_or_else(|| DEFAULT_SHEETS_API_BASE.to_string()),
                token_url: get("GOOGLE_TOKEN_URL").unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string()),
            }),
            Some("memory") => StoreConfig::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "FORM_STORE",
                    value: other.to_string(),
                    reason: "expected \"google\" or \"memory\"".to_string(),
                });
            }
        };

        let smtp = match (get("EMAIL_USER"), get("EMAIL_PASSWORD")) {
            (Some(username), Some(password)) => Some(SmtpSettings {
                host: get("SMTP_HOST").unwrap_or_else(|| DEFAULT_SMTP_HOST.to_string()),
                port: parse_or(get("SMTP_PORT"), "SMTP_PORT", DEFAULT_SMTP_PORT)?,
                from: get("EMAIL_FROM").unwrap_or_else(|| username.clone()),
                recipient: get("NOTIFY_RECIPIENT").ok_or(ConfigError::Missing("NOTIFY_RECIPIENT"))?,
                username,
                password,
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing("EMAIL_PASSWORD")),
            (None, Some(_)) => return Err(ConfigError::Missing("EMAIL_USER")),
        };

        let max_requests: u32 = parse_or(get("RATE_LIMIT_MAX"), "RATE_LIMIT_MAX", DEFAULT_RATE_LIMIT_MAX)?;
        if max_requests == 0 {
            return Err(ConfigError::Invalid {
                key: "RATE_LIMIT_MAX",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        let window_secs: u64 = parse_or(
            get("RATE_LIMIT_WINDOW_SECS"),
            "RATE_LIMIT_WINDOW_SECS",
            DEFAULT_RATE_LIMIT_WINDOW.as_secs(),
        )?;

        Ok(Config {
            bind_addr: SocketAddr::new(host, port),
            allowed_origins,
            store,
            smtp,
            rate_limit: RateLimitConfig {
                max_requests,
                window: Duration::from_secs(window_secs.max(1)),
            },
        })
    }
}

fn parse_or<T>(raw: Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
    }
}

/// Private keys pasted into a single-line env var carry literal `\n`.
fn unescape_newlines(key: &str) -> String {
    key.replace("\\n", "\n")
}
