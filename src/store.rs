//! In-memory printer record collections
//!
//! Two ordered collections: locally discovered records and remotely fetched
//! records. The local collection is replaced wholesale on every enumeration
//! pass; the remote collection is cleared and rebuilt on every full fetch,
//! with single-record removal on delete and replacement on create/update.
//!
//! Collection mutation happens from pool workers, so every accessor takes the
//! lock; the manager additionally enforces single-flight on full fetches so
//! only one fan-out cycle mutates the remote collection at a time.

use crate::types::{PrinterId, PrinterRecord};
use std::sync::{Arc, Mutex, MutexGuard};

/// Shared store of local and remote printer records.
#[derive(Clone, Default)]
pub struct PrinterStore {
    local: Arc<Mutex<Vec<PrinterRecord>>>,
    remote: Arc<Mutex<Vec<PrinterRecord>>>,
}

/// Take the lock, recovering the data if a panicking worker poisoned it.
fn lock(collection: &Mutex<Vec<PrinterRecord>>) -> MutexGuard<'_, Vec<PrinterRecord>> {
    collection.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl PrinterStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the local collection with a fresh enumeration pass.
    pub fn replace_local(&self, records: Vec<PrinterRecord>) {
        let mut local = lock(&self.local);
        *local = records;
    }

    /// Snapshot of the local collection.
    pub fn local_records(&self) -> Vec<PrinterRecord> {
        lock(&self.local).clone()
    }

    /// Local records matching a display name (identity is advisory, so there
    /// may be more than one).
    pub fn local_by_display_name(&self, display_name: &str) -> Vec<PrinterRecord> {
        lock(&self.local)
            .iter()
            .filter(|record| record.display_name == display_name)
            .cloned()
            .collect()
    }

    /// Clear the remote collection ahead of a full fetch.
    pub fn clear_remote(&self) {
        lock(&self.remote).clear();
    }

    /// Append one fetched remote record.
    pub fn push_remote(&self, record: PrinterRecord) {
        lock(&self.remote).push(record);
    }

    /// Replace the remote record with the same id, or append when none matches.
    pub fn upsert_remote(&self, record: PrinterRecord) {
        let mut remote = lock(&self.remote);
        match record.id.and_then(|id| {
            remote
                .iter()
                .position(|existing| existing.id == Some(id))
        }) {
            Some(index) => remote[index] = record,
            None => remote.push(record),
        }
    }

    /// Remove one remote record by id, returning it when found.
    pub fn remove_remote(&self, id: PrinterId) -> Option<PrinterRecord> {
        let mut remote = lock(&self.remote);
        let index = remote.iter().position(|record| record.id == Some(id))?;
        Some(remote.remove(index))
    }

    /// Snapshot of the remote collection sorted by display name.
    ///
    /// Sorting here is the only ordering contract consumers rely on; fetch
    /// completion order is arbitrary.
    pub fn remote_records_sorted(&self) -> Vec<PrinterRecord> {
        let mut records = lock(&self.remote).clone();
        records.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        records
    }

    /// Remote records matching a display name.
    pub fn remote_by_display_name(&self, display_name: &str) -> Vec<PrinterRecord> {
        lock(&self.remote)
            .iter()
            .filter(|record| record.display_name == display_name)
            .cloned()
            .collect()
    }

    /// Display names of remote records assigned to a site, sorted.
    pub fn remote_names_for_site(&self, site: &str) -> Vec<String> {
        let mut names: Vec<String> = lock(&self.remote)
            .iter()
            .filter(|record| record.site == site)
            .map(|record| record.display_name.clone())
            .collect();
        names.sort();
        names
    }

    /// Number of remote records currently held.
    pub fn remote_len(&self) -> usize {
        lock(&self.remote).len()
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn remote(id: i64, name: &str, site: &str) -> PrinterRecord {
        let mut record = PrinterRecord::local(
            name,
            name.to_lowercase().replace(' ', "_"),
            "Room 101",
            "ipp://printer.example.com",
            "Generic PostScript",
            format!("/private/etc/cups/ppd/{}.ppd", name.to_lowercase()),
            "*PPD-Adobe: \"4.3\"",
        );
        record.id = Some(PrinterId::new(id));
        record.site = site.to_string();
        record
    }

    #[test]
    fn replace_local_discards_prior_pass() {
        let store = PrinterStore::new();
        store.replace_local(vec![remote(0, "Old", "")]);
        store.replace_local(vec![remote(0, "New", "")]);

        let local = store.local_records();
        assert_eq!(local.len(), 1);
        assert_eq!(local[0].display_name, "New");
    }

    #[test]
    fn remote_snapshot_is_sorted_by_display_name() {
        let store = PrinterStore::new();
        store.push_remote(remote(2, "Zeta Printer", "A"));
        store.push_remote(remote(1, "Alpha Printer", "A"));

        let names: Vec<_> = store
            .remote_records_sorted()
            .into_iter()
            .map(|r| r.display_name)
            .collect();
        assert_eq!(names, vec!["Alpha Printer", "Zeta Printer"]);
    }

    #[test]
    fn remove_remote_takes_out_exactly_one_record() {
        let store = PrinterStore::new();
        store.push_remote(remote(1, "Alpha Printer", "A"));
        store.push_remote(remote(2, "Beta Printer", "A"));

        let removed = store.remove_remote(PrinterId::new(1)).unwrap();
        assert_eq!(removed.display_name, "Alpha Printer");
        assert_eq!(store.remote_len(), 1);
        assert!(store.remove_remote(PrinterId::new(99)).is_none());
    }

    #[test]
    fn upsert_replaces_matching_id_and_appends_otherwise() {
        let store = PrinterStore::new();
        store.push_remote(remote(1, "Alpha Printer", "A"));

        store.upsert_remote(remote(1, "Alpha Printer Renamed", "A"));
        assert_eq!(store.remote_len(), 1);
        assert_eq!(
            store.remote_records_sorted()[0].display_name,
            "Alpha Printer Renamed"
        );

        store.upsert_remote(remote(2, "Beta Printer", "B"));
        assert_eq!(store.remote_len(), 2);
    }

    #[test]
    fn site_filter_returns_sorted_names() {
        let store = PrinterStore::new();
        store.push_remote(remote(1, "Zeta Printer", "A"));
        store.push_remote(remote(2, "Beta Printer", "B"));
        store.push_remote(remote(3, "Alpha Printer", "A"));

        assert_eq!(
            store.remote_names_for_site("A"),
            vec!["Alpha Printer", "Zeta Printer"]
        );
        assert!(store.remote_names_for_site("C").is_empty());
    }

    #[test]
    fn duplicate_display_names_are_not_deduplicated() {
        let store = PrinterStore::new();
        store.push_remote(remote(1, "Lab Printer", "A"));
        store.push_remote(remote(2, "Lab Printer", "B"));

        assert_eq!(store.remote_by_display_name("Lab Printer").len(), 2);
    }
}
