//! Shutdown coordination.

use super::PrinterManager;

impl PrinterManager {
    /// Set the process-wide stop flag without waiting.
    ///
    /// Fetch coordinators and looping tasks observe it between steps; an
    /// attempt already inside an HTTP call runs to its timeout.
    pub fn request_shutdown(&self) {
        self.dispatcher.request_shutdown();
    }

    /// True once shutdown has been requested.
    pub fn is_shutting_down(&self) -> bool {
        self.dispatcher.is_shutting_down()
    }

    /// Request shutdown and wait a bounded grace period for outstanding
    /// workers to drain.
    ///
    /// Safe to call more than once; subsequent calls just re-wait on the
    /// remaining workers.
    pub async fn shutdown(&self) {
        tracing::info!("Printer manager shutting down");
        self.dispatcher.shutdown().await;
        tracing::info!("Printer manager shutdown complete");
    }
}
