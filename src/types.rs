//! Core types for printer-admin

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a remote printer record
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PrinterId(pub i64);

impl PrinterId {
    /// Create a new PrinterId
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for PrinterId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<PrinterId> for i64 {
    fn from(id: PrinterId) -> Self {
        id.0
    }
}

impl std::fmt::Display for PrinterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for PrinterId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// One printer's configuration, local or remote.
///
/// Local records are created per enumeration pass of the management agent and
/// carry no `id`. Remote records come back from the vendor API one per fetched
/// id. Within a single collection `display_name` is the de facto identity key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterRecord {
    /// Remote identifier; `None` for local-only records
    pub id: Option<PrinterId>,
    /// Display name shown to the admin (de facto identity key)
    pub display_name: String,
    /// CUPS queue name
    pub cups_name: String,
    /// Physical location string
    pub location: String,
    /// Device URI the queue prints to
    pub device_uri: String,
    /// Printer model
    pub model: String,
    /// Path to the PPD file
    pub ppd_path: String,
    /// Raw PPD driver-description text
    pub ppd_contents: String,
    /// Owning site name; "unassigned" if not yet classified
    pub site: String,
    /// Creation timestamp, when known
    pub created_at: Option<DateTime<Utc>>,
    /// Username that created the record
    pub created_by: String,
    /// Last-update timestamp, when known
    pub updated_at: Option<DateTime<Utc>>,
    /// Username that last updated the record
    pub updated_by: String,
}

impl PrinterRecord {
    /// A local-only record as produced by the agent enumeration pass.
    pub fn local(
        display_name: impl Into<String>,
        cups_name: impl Into<String>,
        location: impl Into<String>,
        device_uri: impl Into<String>,
        model: impl Into<String>,
        ppd_path: impl Into<String>,
        ppd_contents: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            display_name: display_name.into(),
            cups_name: cups_name.into(),
            location: location.into(),
            device_uri: device_uri.into(),
            model: model.into(),
            ppd_path: ppd_path.into(),
            ppd_contents: ppd_contents.into(),
            site: String::new(),
            created_at: None,
            created_by: String::new(),
            updated_at: None,
            updated_by: String::new(),
        }
    }
}

impl std::fmt::Display for PrinterRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name)
    }
}

/// An administrative partition of the device-management platform
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    /// Server-side site id
    pub id: i64,
    /// Site name
    pub name: String,
}

/// Notification emitted by a dispatched task.
///
/// Notifications from a single task arrive at the consumer in emission order.
/// Across concurrently-running tasks no ordering is guaranteed and the consumer
/// must tolerate interleaving.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// Progress update for the status/progress surfaces
    Progress {
        /// Message to display
        message: String,
        /// Current count, when the work is enumerable
        #[serde(skip_serializing_if = "Option::is_none")]
        current: Option<u64>,
        /// Total count, when the work is enumerable
        #[serde(skip_serializing_if = "Option::is_none")]
        total: Option<u64>,
        /// True when the progress surface should pulse instead of counting
        indeterminate: bool,
    },

    /// Recoverable problem the admin should see
    Warning {
        /// Message to display
        message: String,
    },

    /// A task reached its terminal success state
    Finished {
        /// Message to display
        message: String,
    },

    /// A task failed with an uncaught error or panic.
    ///
    /// Delivered instead of crashing the pool; the dispatcher remains usable
    /// for subsequent submissions.
    TaskFailed {
        /// Label of the task that failed
        task: String,
        /// Formatted error or panic message
        message: String,
    },
}
