//! Local printer enumeration through the management agent.
//!
//! The agent binary is asked for its printer listing, one record per CUPS
//! queue, and each queue's PPD file is read from the CUPS PPD directory. A
//! missing PPD produces a warning and an empty-contents record rather than
//! failing the pass; the whole local collection is replaced at the end.

use super::PrinterManager;
use crate::error::{Error, Result};
use crate::types::PrinterRecord;
use crate::wire;
use std::path::PathBuf;

impl PrinterManager {
    /// Enumerate the printers configured on this machine.
    ///
    /// Replaces the local collection wholesale and returns the number of
    /// printers found.
    ///
    /// # Errors
    ///
    /// Returns `Error::Agent` when the agent binary cannot be located or
    /// exits unsuccessfully, and `Error::Wire` when its listing does not
    /// parse.
    pub async fn refresh_local_printers(&self) -> Result<usize> {
        self.ensure_accepting_work()?;
        let notifier = self.notifier();
        notifier.progress("Enumerating local printers...", None, None, true);

        let agent = self.resolve_agent_binary()?;
        tracing::debug!(agent = %agent.display(), "Invoking management agent");

        let output = tokio::process::Command::new(&agent)
            .arg("listprinters")
            .output()
            .await
            .map_err(|e| Error::Agent(format!("failed to run {}: {}", agent.display(), e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Agent(format!(
                "{} listprinters exited with {}: {}",
                agent.display(),
                output.status,
                stderr.trim()
            )));
        }

        let listing = String::from_utf8_lossy(&output.stdout);
        let entries = wire::parse_local_printer_listing(&listing)?;

        let total = entries.len();
        let mut records = Vec::with_capacity(total);
        for (index, entry) in entries.into_iter().enumerate() {
            let ppd_path = self
                .config
                .agent
                .ppd_dir
                .join(format!("{}.ppd", entry.cups_name));

            let ppd_contents = match tokio::fs::read_to_string(&ppd_path).await {
                Ok(contents) => contents,
                Err(e) => {
                    tracing::warn!(ppd = %ppd_path.display(), error = %e, "PPD file could not be read");
                    notifier.warning(format!(
                        "No PPD file found for {}; it cannot be published until one exists.",
                        entry.display_name
                    ));
                    String::new()
                }
            };

            notifier.progress(
                format!("Found printer {}.", entry.display_name),
                Some((index + 1) as u64),
                Some(total as u64),
                false,
            );

            records.push(PrinterRecord::local(
                entry.display_name,
                entry.cups_name,
                entry.location,
                entry.device_uri,
                entry.model,
                ppd_path.to_string_lossy().into_owned(),
                ppd_contents,
            ));
        }

        self.store.replace_local(records);
        tracing::info!(printers = total, "Local printer enumeration complete");
        notifier.finished(format!("Found {} local printers.", total));
        Ok(total)
    }

    /// Locate the agent binary: an explicit configured path wins, otherwise
    /// PATH discovery when enabled.
    fn resolve_agent_binary(&self) -> Result<PathBuf> {
        if let Some(path) = &self.config.agent.agent_path {
            return Ok(path.clone());
        }

        if !self.config.agent.search_path {
            return Err(Error::Agent(
                "no agent path configured and PATH discovery is disabled".to_string(),
            ));
        }

        which::which(&self.config.agent.agent_name).map_err(|e| {
            Error::Agent(format!(
                "management agent '{}' not found on PATH: {}",
                self.config.agent.agent_name, e
            ))
        })
    }
}
