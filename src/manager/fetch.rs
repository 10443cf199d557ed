//! Remote inventory fetch: collection listing fanned out to per-id lookups.
//!
//! A full fetch lists the printer collection, clears the remote store, and
//! submits one lookup task per id to the worker pool. The coordinator then
//! parks on a fan-in barrier until every id has been accounted for exactly
//! once. A lookup that receives a non-success response is resubmitted once;
//! the retry replaces the original in the accounting, so the expected total
//! stays the number of distinct ids and the barrier cannot overshoot.
//!
//! Fetch cycles are single-flight: a refresh requested while one is already
//! running is dropped with a warning rather than queued.

use super::PrinterManager;
use crate::client::BodyFormat;
use crate::dispatcher::Notifier;
use crate::error::{Error, Result};
use crate::types::{PrinterId, PrinterRecord};
use crate::wire;
use futures::FutureExt;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

/// Fan-in barrier for one fetch cycle.
///
/// `total` is fixed at the number of distinct ids listed; completions are
/// counted under the mutex and the coordinator is woken exactly once, when
/// the count reaches the total. `Notify::notify_one` stores a permit, so the
/// wake is not lost even if the coordinator has not started waiting yet.
struct FetchCycle {
    total: usize,
    completed: Mutex<usize>,
    done: Notify,
    /// Ids that have already used their one retry.
    retried: std::sync::Mutex<HashSet<PrinterId>>,
}

impl FetchCycle {
    fn new(total: usize) -> Self {
        Self {
            total,
            completed: Mutex::new(0),
            done: Notify::new(),
            retried: std::sync::Mutex::new(HashSet::new()),
        }
    }

    /// Count one id as accounted for, waking the coordinator on the last one.
    /// Returns the new completion count.
    async fn record_completion(&self) -> usize {
        let mut completed = self.completed.lock().await;
        *completed += 1;
        if *completed >= self.total {
            self.done.notify_one();
        }
        *completed
    }

    /// Claim the single retry for `id`. True on first failure, false once the
    /// retry has been spent.
    fn claim_retry(&self, id: PrinterId) -> bool {
        self.retried
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(id)
    }
}

/// How a single lookup attempt resolved.
enum LookupOutcome {
    /// Record fetched and stored; carries the display name for progress.
    Stored(String),
    /// Attempt is finished but produced no record (connectivity loss,
    /// unauthorized site, spent retry).
    Skipped,
    /// A replacement attempt was submitted; this attempt does not count.
    Resubmitted,
    /// Shutdown was observed before the lookup ran. Deliberately not counted:
    /// the coordinator is being torn down and nothing will observe the wake.
    Abandoned,
}

impl PrinterManager {
    /// Refresh the remote printer inventory.
    ///
    /// Lists the collection, clears the remote store, and fetches every
    /// listed record concurrently on the worker pool, keeping only records
    /// whose site the session is authorized for. Returns once every id is
    /// accounted for or shutdown interrupts the wait. An empty collection
    /// completes immediately.
    ///
    /// If a refresh is already running, this one is dropped with a warning.
    ///
    /// # Errors
    ///
    /// Returns `Error::Api` when the collection listing itself fails with a
    /// non-success status. Connectivity loss is reported as a warning
    /// notification and returns `Ok(())` with the store left empty.
    pub async fn refresh_remote_printers(&self) -> Result<()> {
        self.ensure_accepting_work()?;
        let notifier = self.notifier();

        let Ok(_running) = self.fetch_gate.try_lock() else {
            tracing::debug!("Refresh requested while one is already running, dropping it");
            notifier.warning("A printer refresh is already running.");
            return Ok(());
        };

        self.ensure_session_sites().await?;

        notifier.progress("Retrieving printers...", None, None, true);

        let endpoint = "/JSSResource/printers";
        let Some(response) = self
            .client
            .call(
                reqwest::Method::GET,
                endpoint,
                BodyFormat::Xml,
                BodyFormat::Xml,
                None,
                &notifier,
            )
            .await?
        else {
            return Ok(());
        };

        if !response.is_success() {
            return Err(Error::Api {
                status: response.status,
                endpoint: endpoint.to_string(),
                body: response.body,
            });
        }

        let ids = wire::parse_printer_ids(&response.body)?;
        self.store.clear_remote();

        if ids.is_empty() {
            notifier.finished("No printers found.");
            return Ok(());
        }

        tracing::info!(printers = ids.len(), "Fetching printer inventory");
        let cycle = Arc::new(FetchCycle::new(ids.len()));
        for id in ids {
            if self.dispatcher.is_shutting_down() {
                return Ok(());
            }
            self.spawn_lookup(Arc::clone(&cycle), id);
        }

        let stop = self.dispatcher.stop_token();
        tokio::select! {
            _ = cycle.done.notified() => {
                let retrieved = self.store.remote_len();
                tracing::info!(retrieved, expected = cycle.total, "Printer inventory fetch complete");
                notifier.finished(format!("Retrieved {} printers.", retrieved));
            }
            _ = stop.cancelled() => {
                tracing::info!("Printer inventory fetch interrupted by shutdown");
            }
        }

        Ok(())
    }

    /// Submit one lookup task for `id`, wiring its outcome into the cycle's
    /// fan-in accounting. Retries resubmit through here, replacing the failed
    /// attempt without touching the expected total.
    ///
    /// The task future is boxed: a retry resubmits from inside a running
    /// lookup, and the indirection keeps the future type from containing
    /// itself.
    fn spawn_lookup(&self, cycle: Arc<FetchCycle>, id: PrinterId) {
        let manager = self.clone();
        self.dispatcher.submit(format!("printer-lookup-{}", id), move |notifier| {
            async move {
                let outcome = manager.lookup_printer(&cycle, id, &notifier).await;
                match outcome {
                    Ok(LookupOutcome::Resubmitted) | Ok(LookupOutcome::Abandoned) => Ok(()),
                    Ok(LookupOutcome::Stored(display_name)) => {
                        let completed = cycle.record_completion().await;
                        notifier.progress(
                            format!("Retrieved printer {}.", display_name),
                            Some(completed as u64),
                            Some(cycle.total as u64),
                            false,
                        );
                        Ok(())
                    }
                    Ok(LookupOutcome::Skipped) => {
                        cycle.record_completion().await;
                        Ok(())
                    }
                    Err(e) => {
                        // The barrier must still advance or the coordinator
                        // waits forever
                        cycle.record_completion().await;
                        Err(e)
                    }
                }
            }
            .boxed()
        });
    }

    async fn lookup_printer(
        &self,
        cycle: &Arc<FetchCycle>,
        id: PrinterId,
        notifier: &Notifier,
    ) -> Result<LookupOutcome> {
        if self.dispatcher.is_shutting_down() {
            return Ok(LookupOutcome::Abandoned);
        }

        let endpoint = format!("/JSSResource/printers/id/{}", id);
        let Some(response) = self
            .client
            .call(
                reqwest::Method::GET,
                &endpoint,
                BodyFormat::Xml,
                BodyFormat::Xml,
                None,
                notifier,
            )
            .await?
        else {
            // Connectivity warning already emitted
            return Ok(LookupOutcome::Skipped);
        };

        if !response.is_success() {
            if cycle.claim_retry(id) {
                tracing::debug!(%id, status = response.status, "Printer lookup failed, retrying once");
                self.spawn_lookup(Arc::clone(cycle), id);
                return Ok(LookupOutcome::Resubmitted);
            }
            tracing::warn!(%id, status = response.status, "Printer lookup failed after retry");
            notifier.warning(format!("Failed to retrieve printer {}.", id));
            return Ok(LookupOutcome::Skipped);
        }

        let record = wire::parse_printer_detail(&response.body)?;
        if !self.is_authorized_site(&record.site) {
            tracing::trace!(%id, site = %record.site, "Skipping printer outside authorized sites");
            return Ok(LookupOutcome::Skipped);
        }

        let display_name = record.display_name.clone();
        self.store.push_remote(record);
        Ok(LookupOutcome::Stored(display_name))
    }

    /// Fetch one printer record by id and upsert it into the remote store.
    ///
    /// Used for the single-record readback after a create. Returns `None`
    /// when connectivity is lost (a warning has already been emitted).
    pub async fn fetch_printer_by_id(
        &self,
        id: PrinterId,
        notifier: &Notifier,
    ) -> Result<Option<PrinterRecord>> {
        let endpoint = format!("/JSSResource/printers/id/{}", id);
        let Some(response) = self
            .client
            .call(
                reqwest::Method::GET,
                &endpoint,
                BodyFormat::Xml,
                BodyFormat::Xml,
                None,
                notifier,
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

        let record = wire::parse_printer_detail(&response.body)?;
        self.store.upsert_remote(record.clone());
        Ok(Some(record))
    }

    /// Load the session's site authorizations if login has not populated them.
    async fn ensure_session_sites(&self) -> Result<()> {
        if self.authorized_sites().is_empty() {
            self.login().await?;
        }
        Ok(())
    }
}
