//! Single-call API invoker with automatic token attachment
//!
//! [`ApiClient::call`] performs one HTTP request against the vendor platform.
//! It always obtains a valid token from the [`TokenCache`] first, and maps
//! connectivity failures (DNS, TCP, timeout) to a `None` sentinel plus a
//! warning notification instead of an error. Callers must treat a missing
//! response as "operation failed, do not continue".
//!
//! The invoker never retries at the HTTP layer; retry policy belongs to
//! callers (the fan-out coordinator owns the one documented retry case).

use crate::auth::TokenCache;
use crate::config::Config;
use crate::dispatcher::Notifier;
use crate::error::Result;
use std::sync::Arc;

/// Body format for requests and responses
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyFormat {
    /// `application/xml` (the classic resource API)
    Xml,
    /// `application/json` (the identity API)
    Json,
}

impl BodyFormat {
    fn mime(self) -> &'static str {
        match self {
            BodyFormat::Xml => "application/xml",
            BodyFormat::Json => "application/json",
        }
    }
}

/// A received HTTP response, status and body only.
#[derive(Clone, Debug)]
pub struct ApiResponse {
    /// HTTP status code
    pub status: u16,
    /// Raw response body
    pub body: String,
}

impl ApiResponse {
    /// True for any 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Wraps outbound requests to the vendor platform.
///
/// Cloneable; the HTTP client and token cache are shared.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token_scheme: String,
    tokens: Arc<TokenCache>,
}

impl ApiClient {
    /// Create a client over an existing token cache.
    pub fn new(config: &Config, http: reqwest::Client, tokens: Arc<TokenCache>) -> Self {
        Self {
            http,
            base_url: config.base_url_trimmed().to_string(),
            token_scheme: config.server.token_scheme.clone(),
            tokens,
        }
    }

    /// The token cache backing this client.
    pub fn tokens(&self) -> &Arc<TokenCache> {
        &self.tokens
    }

    /// Perform one HTTP call against the platform.
    ///
    /// A valid token is obtained (refreshing if needed) before headers are
    /// built. Connectivity failures emit a warning through `notifier` and
    /// return `Ok(None)`; any received response, success or not, is returned
    /// as `Some` for the caller to interpret.
    ///
    /// # Errors
    ///
    /// Only token acquisition can fail here; transport failures are the
    /// `Ok(None)` sentinel, never an `Err`.
    pub async fn call(
        &self,
        method: reqwest::Method,
        endpoint: &str,
        send_format: BodyFormat,
        receive_format: BodyFormat,
        body: Option<String>,
        notifier: &Notifier,
    ) -> Result<Option<ApiResponse>> {
        let token = self.tokens.get_valid_token().await?;
        let url = format!("{}{}", self.base_url, endpoint);

        let mut request = self
            .http
            .request(method.clone(), &url)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("{} {}", self.token_scheme, token),
            )
            .header(reqwest::header::ACCEPT, receive_format.mime());

        if let Some(body) = body {
            request = request
                .header(reqwest::header::CONTENT_TYPE, send_format.mime())
                .body(body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(method = %method, endpoint, error = %e, "Request failed to reach the server");
                notifier.warning("Failed to connect to the server.");
                return Ok(None);
            }
        };

        let status = response.status().as_u16();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(method = %method, endpoint, error = %e, "Response body could not be read");
                notifier.warning("Failed to connect to the server.");
                return Ok(None);
            }
        };

        tracing::debug!(method = %method, endpoint, status, "API call completed");
        Ok(Some(ApiResponse { status, body }))
    }
}
