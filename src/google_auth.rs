//! Service-account access tokens for the Google Sheets API.

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

use crate::error::StoreError;

pub const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME: Duration = Duration::from_secs(3600);
/// Tokens are refreshed this long before Google says they expire
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Source of bearer tokens for outbound Sheets requests
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String, StoreError>;
}

/// Always hands out the same token
pub struct StaticToken(pub String);

#[async_trait]
impl TokenProvider for StaticToken {
    async fn access_token(&self) -> Result<String, StoreError> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    ASSERTION_LIFETIME.as_secs()
}

struct CachedToken {
    value: String,
    refresh_at: SystemTime,
}

/// OAuth2 JWT-bearer flow for a Google service account
///
/// Signs an RS256 assertion with the account's private key, trades it for an
/// access token and caches that token until shortly before it expires.
pub struct ServiceAccountAuth {
    http: reqwest::Client,
    email: String,
    key: EncodingKey,
    token_url: String,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountAuth {
    /// # Arguments
    /// * `http` - Shared HTTP client
    /// * `email` - Service account email, used as the JWT issuer
    /// * `private_key_pem` - PKCS#8 RSA private key in PEM form
    /// * `token_url` - OAuth2 token endpoint
    pub fn new(
        http: reqwest::Client,
        email: &str,
        private_key_pem: &str,
        token_url: &str,
    ) -> Result<Self, StoreError> {
        let key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
            .map_err(|e| StoreError::Auth(format!("invalid service account key: {}", e)))?;

        Ok(ServiceAccountAuth {
            http,
            email: email.to_string(),
            key,
            token_url: token_url.to_string(),
            cached: Mutex::new(None),
        })
    }

    fn signed_assertion(&self, now: SystemTime) -> Result<String, StoreError> {
        let iat = now
            .duration_since(UNIX_EPOCH)
            .map_err(|e| StoreError::Auth(format!("system clock before epoch: {}", e)))?
            .as_secs();
        let claims = Claims {
            iss: &self.email,
            scope: SPREADSHEETS_SCOPE,
            aud: &self.token_url,
            iat,
            exp: iat + ASSERTION_LIFETIME.as_secs(),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.key)
            .map_err(|e| StoreError::Auth(format!("could not sign assertion: {}", e)))
    }

    async fn fetch_token(&self, now: SystemTime) -> Result<CachedToken, StoreError> {
        let assertion = self.signed_assertion(now)?;

        let res = self
            .http
            .post(&self.token_url)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(StoreError::Auth(format!("token endpoint returned {}: {}", status, body)));
        }

        let token: TokenResponse = res
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(EXPIRY_MARGIN);
        log::debug!("Obtained Sheets access token valid for {}s", token.expires_in);

        Ok(CachedToken {
            value: token.access_token,
            refresh_at: now + lifetime,
        })
    }
}

#[async_trait]
impl TokenProvider for ServiceAccountAuth {
    async fn access_token(&self) -> Result<String, StoreError> {
        let mut cached = self.cached.lock().await;
        let now = SystemTime::now();

        if let Some(token) = cached.as_ref() {
            if now < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let fresh = self.fetch_token(now).await?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }
}
