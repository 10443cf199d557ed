//! Core printer management implementation split into focused submodules.
//!
//! The `PrinterManager` struct and its methods are organized by domain:
//! - [`local`] - Local printer enumeration through the management agent
//! - [`fetch`] - Remote inventory fan-out/fan-in fetch cycle
//! - [`crud`] - Create, update, and delete against the vendor API
//! - [`lifecycle`] - Shutdown coordination

mod crud;
mod fetch;
mod lifecycle;
mod local;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

use crate::auth::{Credentials, TokenCache};
use crate::client::ApiClient;
use crate::config::Config;
use crate::dispatcher::{Dispatcher, Notifier};
use crate::error::{Error, Result};
use crate::store::PrinterStore;
use crate::types::Notification;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;

/// Site Admin printer management facade.
///
/// Owns the worker pool, the token cache, the record store, and the session's
/// site authorizations. Cloneable; all state is shared, so clones observe the
/// same store and session. Long-running operations emit [`Notification`]s
/// through the receiver returned by [`PrinterManager::new`].
#[derive(Clone)]
pub struct PrinterManager {
    config: Config,
    client: ApiClient,
    dispatcher: Dispatcher,
    store: PrinterStore,
    /// Site names the logged-in account may manage, leading "" sentinel included.
    /// Empty until the first successful [`login`](Self::login).
    authorized_sites: Arc<RwLock<Vec<String>>>,
    /// Single-flight gate for the full remote fetch cycle.
    fetch_gate: Arc<tokio::sync::Mutex<()>>,
}

impl PrinterManager {
    /// Create a manager for the given server and credentials.
    ///
    /// Returns the manager and the single consumer's notification receiver.
    ///
    /// # Errors
    ///
    /// Fails when the configuration does not validate or the HTTP client
    /// cannot be constructed.
    pub fn new(
        config: Config,
        credentials: Credentials,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Notification>)> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(config.server.request_timeout)
            .build()?;
        let tokens = Arc::new(TokenCache::new(&config, http.clone(), credentials));
        let client = ApiClient::new(&config, http, tokens);
        let (dispatcher, rx) = Dispatcher::new();

        tracing::info!(server = %config.server.base_url, "Printer manager initialized");

        let manager = Self {
            config,
            client,
            dispatcher,
            store: PrinterStore::new(),
            authorized_sites: Arc::new(RwLock::new(Vec::new())),
            fetch_gate: Arc::new(tokio::sync::Mutex::new(())),
        };
        Ok((manager, rx))
    }

    /// Exchange credentials for a token and load the session's site
    /// authorizations.
    ///
    /// Returns the authorized site names with the leading empty-string
    /// "no site selected" sentinel.
    ///
    /// # Errors
    ///
    /// Returns `Error::Auth` for rejected credentials and `Error::Api` or
    /// `Error::Network` when the site lookup fails.
    pub async fn login(&self) -> Result<Vec<String>> {
        let sites = self
            .client
            .tokens()
            .fetch_authorized_sites(&self.config.server.token_scheme)
            .await?;
        self.set_authorized_sites(sites.clone());
        Ok(sites)
    }

    /// Site names the session may manage, leading sentinel included.
    ///
    /// Empty until [`login`](Self::login) succeeds.
    pub fn authorized_sites(&self) -> Vec<String> {
        self.authorized_sites
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// True when `site` is one the session may manage.
    ///
    /// The empty string matches the "no site selected" sentinel and is never a
    /// valid target for record operations; callers validate that separately.
    pub fn is_authorized_site(&self, site: &str) -> bool {
        self.authorized_sites
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .any(|name| name == site)
    }

    fn set_authorized_sites(&self, sites: Vec<String>) {
        let mut authorized = self
            .authorized_sites
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *authorized = sites;
    }

    /// The shared printer record store.
    pub fn store(&self) -> &PrinterStore {
        &self.store
    }

    /// A notifier bound to the consumer channel, for callers that emit
    /// their own messages alongside manager operations.
    pub fn notifier(&self) -> Notifier {
        self.dispatcher.notifier()
    }

    /// The task dispatcher, for callers that schedule their own work on the
    /// shared pool.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Username of the logged-in account, stamped into audit metadata.
    pub fn username(&self) -> &str {
        self.client.tokens().username()
    }

    /// New operations are refused once shutdown has been requested.
    fn ensure_accepting_work(&self) -> Result<()> {
        if self.dispatcher.is_shutting_down() {
            return Err(Error::ShuttingDown);
        }
        Ok(())
    }
}
