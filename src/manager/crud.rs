//! Create, update, and delete against the vendor printer resource.
//!
//! All three operations select records by display name, the de facto identity
//! key the admin works with. Create publishes a locally enumerated printer to
//! a site and reads the record back by its server-assigned id; update pushes
//! the local configuration over an existing remote record and trusts its own
//! payload for the store; delete removes the remote record.
//!
//! Connectivity loss never surfaces as an `Err` from these methods: the
//! invoker has already emitted a warning, and the operation resolves to
//! `Ok(None)` meaning "did not happen, already reported".

use super::PrinterManager;
use crate::client::BodyFormat;
use crate::error::{Error, Result};
use crate::types::PrinterRecord;
use crate::wire::{self, NotesPayload};
use chrono::{SubsecRound, Utc};

impl PrinterManager {
    /// Publish a locally enumerated printer to a site.
    ///
    /// `display_name` selects the local record; `site` must be one of the
    /// session's authorized sites and not the empty sentinel. On success the
    /// record is read back by its server-assigned id and upserted into the
    /// remote store.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidSelection` for the empty or unauthorized site
    /// - `Error::NotFound` when no local record matches
    /// - `Error::DuplicateName` when the server reports a name conflict (409)
    /// - `Error::Api` for any other non-success status
    pub async fn create_printer(
        &self,
        display_name: &str,
        site: &str,
    ) -> Result<Option<PrinterRecord>> {
        self.ensure_accepting_work()?;
        self.validate_site(site)?;

        let local = self
            .store
            .local_by_display_name(display_name)
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(display_name.to_string()))?;

        let now = Utc::now().trunc_subsecs(0);
        let notes = NotesPayload {
            site: Some(site.to_string()),
            created_at: Some(now),
            created_by: Some(self.username().to_string()),
            updated_at: Some(now),
            updated_by: Some(self.username().to_string()),
        };
        let payload = wire::build_printer_payload(None, &local, &notes)?;

        let notifier = self.notifier();
        notifier.progress(format!("Creating printer {}...", display_name), None, None, true);

        let endpoint = "/JSSResource/printers/id/0";
        let Some(response) = self
            .client
            .call(
                reqwest::Method::POST,
                endpoint,
                BodyFormat::Xml,
                BodyFormat::Xml,
                Some(payload),
                &notifier,
            )
            .await?
        else {
            return Ok(None);
        };

        if !response.is_success() {
            return Err(Error::from_create_status(
                response.status,
                endpoint,
                response.body,
                display_name,
            ));
        }

        let id = wire::parse_created_id(&response.body)?;
        tracing::info!(%id, printer = display_name, site, "Printer created");

        // Read the record back so the store reflects what the server holds
        let Some(record) = self.fetch_printer_by_id(id, &notifier).await? else {
            return Ok(None);
        };

        notifier.finished(format!("Created printer {}.", display_name));
        Ok(Some(record))
    }

    /// Push the local configuration of `display_name` over its remote record.
    ///
    /// The remote record supplies the id and the creation audit fields; the
    /// local record supplies everything else. The update timestamp and author
    /// are stamped fresh. On a success response the store is updated from the
    /// payload we sent; no readback is performed.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidSelection` for the empty or unauthorized site, or
    ///   when more than one remote record carries the name
    /// - `Error::NotFound` when no remote or no local record matches
    /// - `Error::Api` for a non-success status
    pub async fn update_printer(
        &self,
        display_name: &str,
        site: &str,
    ) -> Result<Option<PrinterRecord>> {
        self.ensure_accepting_work()?;
        self.validate_site(site)?;

        let remote = self.unique_remote(display_name)?;
        let id = remote
            .id
            .ok_or_else(|| Error::NotFound(display_name.to_string()))?;

        let local = self
            .store
            .local_by_display_name(display_name)
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(display_name.to_string()))?;

        let notes = NotesPayload {
            site: Some(site.to_string()),
            created_at: remote.created_at,
            created_by: Some(remote.created_by.clone()),
            updated_at: Some(Utc::now().trunc_subsecs(0)),
            updated_by: Some(self.username().to_string()),
        };
        let payload = wire::build_printer_payload(Some(id), &local, &notes)?;

        let notifier = self.notifier();
        notifier.progress(format!("Updating printer {}...", display_name), None, None, true);

        let endpoint = format!("/JSSResource/printers/id/{}", id);
        let Some(response) = self
            .client
            .call(
                reqwest::Method::PUT,
                &endpoint,
                BodyFormat::Xml,
                BodyFormat::Xml,
                Some(payload),
                &notifier,
            )
            .await?
        else {
            return Ok(None);
        };

        if !response.is_success() {
            return Err(Error::Api {
                status: response.status,
                endpoint,
                body: response.body,
            });
        }

        // The server echoes what it accepted, so the payload we built is the
        // new truth for the store
        let mut updated = local;
        updated.id = Some(id);
        updated.site = site.to_string();
        updated.created_at = notes.created_at;
        updated.created_by = remote.created_by;
        updated.updated_at = notes.updated_at;
        updated.updated_by = self.username().to_string();
        self.store.upsert_remote(updated.clone());

        tracing::info!(%id, printer = display_name, site, "Printer updated");
        notifier.finished(format!("Updated printer {}.", display_name));
        Ok(Some(updated))
    }

    /// Delete the remote record named `display_name`.
    ///
    /// Returns the removed record on success.
    ///
    /// # Errors
    ///
    /// - `Error::NotFound` when no remote record matches
    /// - `Error::InvalidSelection` when more than one remote record carries
    ///   the name
    /// - `Error::Api` for a non-success status
    pub async fn delete_printer(&self, display_name: &str) -> Result<Option<PrinterRecord>> {
        self.ensure_accepting_work()?;
        let remote = self.unique_remote(display_name)?;
        let id = remote
            .id
            .ok_or_else(|| Error::NotFound(display_name.to_string()))?;

        let notifier = self.notifier();
        notifier.progress(format!("Deleting printer {}...", display_name), None, None, true);

        let endpoint = format!("/JSSResource/printers/id/{}", id);
        let Some(response) = self
            .client
            .call(
                reqwest::Method::DELETE,
                &endpoint,
                BodyFormat::Xml,
                BodyFormat::Xml,
                None,
                &notifier,
            )
            .await?
        else {
            return Ok(None);
        };

        if !response.is_success() {
            return Err(Error::Api {
                status: response.status,
                endpoint,
                body: response.body,
            });
        }

        let removed = self.store.remove_remote(id).unwrap_or(remote);
        tracing::info!(%id, printer = display_name, "Printer deleted");
        notifier.finished(format!("Deleted printer {}.", display_name));
        Ok(Some(removed))
    }

    /// A site is a valid operation target when it is non-empty and among the
    /// session's authorizations.
    fn validate_site(&self, site: &str) -> Result<()> {
        if site.is_empty() {
            return Err(Error::InvalidSelection(
                "a site must be selected".to_string(),
            ));
        }
        if !self.is_authorized_site(site) {
            return Err(Error::InvalidSelection(format!(
                "site '{}' is not among this account's authorized sites",
                site
            )));
        }
        Ok(())
    }

    /// The single remote record named `display_name`.
    fn unique_remote(&self, display_name: &str) -> Result<PrinterRecord> {
        let mut matches = self.store.remote_by_display_name(display_name);
        match matches.len() {
            0 => Err(Error::NotFound(display_name.to_string())),
            1 => Ok(matches.remove(0)),
            n => Err(Error::InvalidSelection(format!(
                "{} remote printers are named '{}', refusing to guess",
                n, display_name
            ))),
        }
    }
}
