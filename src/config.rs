//! Configuration types for printer-admin

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Vendor server connection configuration
///
/// Groups settings related to the device-management platform the library talks
/// to. Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the device-management platform (e.g., "https://mdm.example.com")
    pub base_url: String,

    /// Authorization scheme placed before the token in the Authorization header
    /// (default: "Bearer")
    #[serde(default = "default_token_scheme")]
    pub token_scheme: String,

    /// Per-request timeout (default: 30s)
    #[serde(default = "default_request_timeout")]
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            token_scheme: default_token_scheme(),
            request_timeout: default_request_timeout(),
        }
    }
}

/// Token lifecycle configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Safety margin subtracted from the token's literal expiry (default: 5 minutes)
    ///
    /// A token is treated as expired this long before its literal expiry to
    /// avoid races against in-flight requests.
    #[serde(default = "default_expiry_margin")]
    pub expiry_margin: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            expiry_margin: default_expiry_margin(),
        }
    }
}

/// Management agent configuration (local printer enumeration)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Explicit path to the management agent binary.
    ///
    /// When unset and `search_path` is true, the binary is discovered on PATH.
    #[serde(default)]
    pub agent_path: Option<PathBuf>,

    /// Search PATH for the agent binary when no explicit path is configured
    /// (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Name of the agent binary to discover on PATH (default: "jamf")
    #[serde(default = "default_agent_name")]
    pub agent_name: String,

    /// Directory holding CUPS PPD files (default: "/private/etc/cups/ppd")
    #[serde(default = "default_ppd_dir")]
    pub ppd_dir: PathBuf,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            agent_path: None,
            search_path: true,
            agent_name: default_agent_name(),
            ppd_dir: default_ppd_dir(),
        }
    }
}

/// Top-level configuration for [`PrinterManager`](crate::PrinterManager)
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Vendor server connection settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Token lifecycle settings
    #[serde(default)]
    pub auth: AuthConfig,

    /// Management agent settings
    #[serde(default)]
    pub agent: AgentConfig,
}

impl Config {
    /// Validate the configuration, returning the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.server.base_url.is_empty() {
            return Err(Error::Config {
                message: "base_url must be set".to_string(),
                key: Some("server.base_url".to_string()),
            });
        }

        let parsed = url::Url::parse(&self.server.base_url).map_err(|e| Error::Config {
            message: format!("base_url is not a valid URL: {}", e),
            key: Some("server.base_url".to_string()),
        })?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::Config {
                message: format!("base_url scheme must be http or https, got '{}'", parsed.scheme()),
                key: Some("server.base_url".to_string()),
            });
        }

        Ok(())
    }

    /// Base URL with any trailing slash removed, for endpoint joining.
    pub(crate) fn base_url_trimmed(&self) -> &str {
        self.server.base_url.trim_end_matches('/')
    }
}

fn default_token_scheme() -> String {
    "Bearer".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_expiry_margin() -> Duration {
    Duration::from_secs(300)
}

fn default_true() -> bool {
    true
}

fn default_agent_name() -> String {
    "jamf".to_string()
}

fn default_ppd_dir() -> PathBuf {
    PathBuf::from("/private/etc/cups/ppd")
}
