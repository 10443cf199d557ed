//! # printer-admin
//!
//! Backend library for Site Admin printer management against a
//! device-management platform.
//!
//! ## Design Philosophy
//!
//! printer-admin is designed to be:
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Notification-driven** - Long-running operations report through a
//!   channel, no polling required
//! - **Site-scoped** - Every record operation respects the logged-in
//!   account's site authorizations
//!
//! ## Quick Start
//!
//! ```no_run
//! use printer_admin::{Config, Credentials, PrinterManager, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         server: ServerConfig {
//!             base_url: "https://mdm.example.com".to_string(),
//!             ..Default::default()
//!         },
//!         ..Default::default()
//!     };
//!     let credentials = Credentials {
//!         username: "siteadmin".to_string(),
//!         password: "hunter2".to_string(),
//!     };
//!
//!     let (manager, mut notifications) = PrinterManager::new(config, credentials)?;
//!
//!     // Consume notifications as operations run
//!     tokio::spawn(async move {
//!         while let Some(notification) = notifications.recv().await {
//!             println!("{:?}", notification);
//!         }
//!     });
//!
//!     manager.login().await?;
//!     manager.refresh_remote_printers().await?;
//!     for printer in manager.store().remote_records_sorted() {
//!         println!("{}", printer);
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Bearer-token lifecycle and site authorizations
pub mod auth;
/// Single-call API invoker
pub mod client;
/// Configuration types
pub mod config;
/// Worker-pool task dispatch and notification relay
pub mod dispatcher;
/// Error types
pub mod error;
/// Core printer management (decomposed into focused submodules)
pub mod manager;
/// In-memory printer record collections
pub mod store;
/// Core types and notifications
pub mod types;
/// Vendor API wire format
pub(crate) mod wire;

// Re-export commonly used types
pub use auth::{Credentials, TokenCache};
pub use client::{ApiClient, ApiResponse, BodyFormat};
pub use config::{AgentConfig, AuthConfig, Config, ServerConfig};
pub use dispatcher::{Dispatcher, Notifier};
pub use error::{Error, Result};
pub use manager::PrinterManager;
pub use store::PrinterStore;
pub use types::{Notification, PrinterId, PrinterRecord, Site};

/// Helper function to run the manager with graceful signal handling.
///
/// Waits for a termination signal and then calls the manager's `shutdown()`
/// method.
///
/// - **Unix:** listens for SIGTERM and SIGINT, falling back to
///   `tokio::signal::ctrl_c()` if registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use printer_admin::{Config, Credentials, PrinterManager, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::default();
///     let credentials = Credentials {
///         username: "siteadmin".to_string(),
///         password: "hunter2".to_string(),
///     };
///     let (manager, _notifications) = PrinterManager::new(config, credentials)?;
///
///     // Run with automatic signal handling
///     run_with_shutdown(manager).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(manager: PrinterManager) -> Result<()> {
    wait_for_signal().await;
    manager.shutdown().await;
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    // Registration can fail in restricted environments (containers, tests)
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                _ = sigint.recv() => tracing::info!("Received SIGINT signal (Ctrl+C)"),
            }
        }
        _ => {
            tracing::warn!("Could not register unix signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
