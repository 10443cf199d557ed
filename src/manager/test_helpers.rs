//! Shared test helpers for creating PrinterManager instances in tests.

use crate::auth::Credentials;
use crate::config::{Config, ServerConfig};
use crate::manager::PrinterManager;
use crate::types::{Notification, PrinterId, PrinterRecord};
use chrono::Utc;
use std::time::Duration;
use tokio::sync::mpsc;
use wiremock::MockServer;

/// Helper to create a test PrinterManager against a mock server.
///
/// The token cache is pre-seeded so tests only mock the endpoints they
/// exercise, and the session is authorized for the "Engineering" site.
pub(crate) async fn create_test_manager(
    server: &MockServer,
) -> (
    PrinterManager,
    mpsc::UnboundedReceiver<Notification>,
) {
    create_test_manager_at(&server.uri()).await
}

/// Same as [`create_test_manager`] but for an arbitrary base URL, which lets
/// connectivity-loss tests point at an address nothing listens on.
pub(crate) async fn create_test_manager_at(
    base_url: &str,
) -> (
    PrinterManager,
    mpsc::UnboundedReceiver<Notification>,
) {
    let config = Config {
        server: ServerConfig {
            base_url: base_url.to_string(),
            request_timeout: Duration::from_secs(2),
            ..Default::default()
        },
        ..Default::default()
    };
    let credentials = Credentials {
        username: "siteadmin".to_string(),
        password: "hunter2".to_string(),
    };

    let (manager, rx) = PrinterManager::new(config, credentials).unwrap();
    manager
        .client
        .tokens()
        .seed("test-token", Utc::now() + chrono::Duration::hours(1))
        .await;
    manager.set_authorized_sites(vec![String::new(), "Engineering".to_string()]);
    (manager, rx)
}

/// A printer detail document as the vendor API returns it.
pub(crate) fn detail_xml(id: i64, name: &str, site: &str) -> String {
    format!(
        "<printer><id>{id}</id><name>{name}</name>\
         <uri>ipp://printer.example.com</uri>\
         <CUPS_name>queue_{id}</CUPS_name>\
         <location>Room 101</location>\
         <model>Generic PostScript</model>\
         <ppd>queue_{id}.ppd</ppd>\
         <ppd_contents>*PPD-Adobe: \"4.3\"</ppd_contents>\
         <notes>{{\"Site\": \"{site}\", \"Created_by\": \"siteadmin\", \"Updated_by\": \"siteadmin\"}}</notes>\
         <ppd_path>/private/etc/cups/ppd/queue_{id}.ppd</ppd_path>\
         </printer>"
    )
}

/// A printer collection document listing the given ids.
pub(crate) fn collection_xml(ids: &[i64]) -> String {
    let mut body = format!("<printers><size>{}</size>", ids.len());
    for id in ids {
        body.push_str(&format!("<printer><id>{id}</id></printer>"));
    }
    body.push_str("</printers>");
    body
}

/// A locally enumerated record ready to be published.
pub(crate) fn local_record(display_name: &str) -> PrinterRecord {
    PrinterRecord::local(
        display_name,
        display_name.to_lowercase().replace(' ', "_"),
        "Room 101",
        "ipp://printer.example.com",
        "Generic PostScript",
        "/private/etc/cups/ppd/lab_printer.ppd",
        "*PPD-Adobe: \"4.3\"",
    )
}

/// A remote record as a prior fetch would have stored it.
pub(crate) fn remote_record(id: i64, display_name: &str, site: &str) -> PrinterRecord {
    let mut record = local_record(display_name);
    record.id = Some(PrinterId::new(id));
    record.site = site.to_string();
    record.created_by = "original-admin".to_string();
    record.updated_by = "original-admin".to_string();
    record
}

/// Drain all notifications currently in the channel.
pub(crate) fn drain_notifications(
    rx: &mut mpsc::UnboundedReceiver<Notification>,
) -> Vec<Notification> {
    let mut notifications = Vec::new();
    while let Ok(notification) = rx.try_recv() {
        notifications.push(notification);
    }
    notifications
}

/// Warnings among the drained notifications, as their messages.
pub(crate) fn warning_messages(notifications: &[Notification]) -> Vec<String> {
    notifications
        .iter()
        .filter_map(|notification| match notification {
            Notification::Warning { message } => Some(message.clone()),
            _ => None,
        })
        .collect()
}
