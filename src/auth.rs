//! Bearer-token lifecycle and Site Admin session state
//!
//! The platform hands out short-lived bearer tokens in exchange for a
//! username/password pair. [`TokenCache`] holds the current token and its
//! expiry and mints a new one only when the cached token is absent or inside
//! the configured safety margin. The margin exists to avoid a token expiring
//! underneath an in-flight request.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::Site;
use chrono::{DateTime, SubsecRound, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;

/// The privilege an account group must hold for its site to be manageable
const ENROLL_PRIVILEGE: &str = "Enroll Computers and Mobile Devices";

/// A Site Admin's username/password pair.
///
/// Held only in memory and only for as long as token minting needs it.
#[derive(Clone)]
pub struct Credentials {
    /// Account username; also stamped into audit metadata on create/update
    pub username: String,
    /// Account password, used solely for the credential exchange
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never leak the password through Debug output
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Debug)]
struct CachedToken {
    token: String,
    expires: DateTime<Utc>,
}

/// Wire shape of the token endpoint response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
    expires: String,
}

/// Wire shape of the user/site lookup response
#[derive(Debug, Deserialize)]
struct UserDetails {
    #[serde(default, rename = "accountGroups")]
    account_groups: Vec<AccountGroup>,
    #[serde(default)]
    sites: Vec<Site>,
}

#[derive(Debug, Deserialize)]
struct AccountGroup {
    #[serde(default, rename = "siteId")]
    site_id: i64,
    #[serde(default)]
    privileges: Vec<String>,
}

/// Caches a bearer token and its expiry, minting anew only when necessary.
///
/// The cache is shared across pool workers; the internal mutex also serializes
/// concurrent refresh attempts so only one credential exchange is in flight at
/// a time.
pub struct TokenCache {
    http: reqwest::Client,
    base_url: String,
    token_endpoint: String,
    expiry_margin: chrono::Duration,
    credentials: Credentials,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    /// Create a token cache for the given credentials.
    pub fn new(config: &Config, http: reqwest::Client, credentials: Credentials) -> Self {
        let base_url = config.base_url_trimmed().to_string();
        let token_endpoint = format!("{}/api/v1/auth/token", base_url);
        let expiry_margin = chrono::Duration::from_std(config.auth.expiry_margin)
            .unwrap_or_else(|_| chrono::Duration::seconds(300));

        Self {
            http,
            base_url,
            token_endpoint,
            expiry_margin,
            credentials,
            cached: Mutex::new(None),
        }
    }

    /// Username of the credentials backing this cache.
    pub fn username(&self) -> &str {
        &self.credentials.username
    }

    /// Produce a currently-valid bearer token, minting a new one only when the
    /// cached token is absent or inside the expiry safety margin.
    ///
    /// # Errors
    ///
    /// Returns `Error::Auth` when the identity endpoint rejects the
    /// credentials, and `Error::Network` on transport failure. The cache is
    /// never mutated on failure.
    pub async fn get_valid_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;

        if let Some(entry) = cached.as_ref() {
            if Utc::now() < entry.expires - self.expiry_margin {
                tracing::trace!("Reusing cached API token");
                return Ok(entry.token.clone());
            }
            tracing::debug!(expires = %entry.expires, "Cached API token expired or inside safety margin");
        }

        let minted = self.mint_token().await?;
        let token = minted.token.clone();
        *cached = Some(minted);
        Ok(token)
    }

    /// Clear the cached token, forcing the next [`get_valid_token`](Self::get_valid_token)
    /// call to mint anew.
    pub async fn invalidate(&self) {
        let mut cached = self.cached.lock().await;
        *cached = None;
        tracing::debug!("API token cleared");
    }

    /// Perform the credential exchange against the identity endpoint.
    async fn mint_token(&self) -> Result<CachedToken> {
        tracing::debug!(endpoint = %self.token_endpoint, "Requesting API token");

        let response = self
            .http
            .post(&self.token_endpoint)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Token request rejected");
            return Err(Error::Auth(format!(
                "token request rejected with status {}: {}",
                status.as_u16(),
                body
            )));
        }

        let token_response: TokenResponse = response.json().await?;
        let expires = parse_expiry(&token_response.expires)?;

        tracing::info!(expires = %expires, "API token minted");

        Ok(CachedToken {
            token: token_response.token,
            expires,
        })
    }

    /// Retrieve the ordered list of site names the account may manage.
    ///
    /// Filters the account's sites down to those whose account group holds the
    /// enroll privilege, and prepends an empty-string sentinel representing
    /// "no site selected".
    pub async fn fetch_authorized_sites(&self, token_scheme: &str) -> Result<Vec<String>> {
        let token = self.get_valid_token().await?;
        let endpoint = format!("{}/api/v1/auth", self.base_url);

        let response = self
            .http
            .get(&endpoint)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("{} {}", token_scheme, token),
            )
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                endpoint,
                body,
            });
        }

        let details: UserDetails = response.json().await?;

        let authorized_ids: Vec<i64> = details
            .account_groups
            .iter()
            .filter(|group| group.privileges.iter().any(|p| p == ENROLL_PRIVILEGE))
            .map(|group| group.site_id)
            .collect();

        // Leading empty entry is the "no site selected" sentinel
        let mut site_names = vec![String::new()];
        site_names.extend(
            details
                .sites
                .into_iter()
                .filter(|site| authorized_ids.contains(&site.id))
                .map(|site| site.name),
        );

        tracing::info!(sites = site_names.len() - 1, "Collected site access permissions");
        Ok(site_names)
    }

    /// Seed the cache with a known token and expiry. Test-only.
    #[cfg(test)]
    pub(crate) async fn seed(&self, token: &str, expires: DateTime<Utc>) {
        let mut cached = self.cached.lock().await;
        *cached = Some(CachedToken {
            token: token.to_string(),
            expires,
        });
    }
}

/// Parse the token expiry from the server's ISO-8601-like string.
///
/// Fractional seconds are truncated and the timestamp normalized to UTC. A
/// zone-less timestamp is taken as UTC.
fn parse_expiry(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc).trunc_subsecs(0));
    }

    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc().trunc_subsecs(0));
    }

    Err(Error::Auth(format!(
        "could not parse token expiry timestamp '{}'",
        raw
    )))
}
