//! Running sync rounds from async code.

use crate::error::{SyncError, SyncResult};
use crate::state::{SyncCoordinator, SyncReport};
use crate::transport::SyncTransport;
use qcsync_core::StatementExecutor;
use std::sync::Arc;

impl<E, T> SyncCoordinator<E, T>
where
    E: StatementExecutor + 'static,
    T: SyncTransport + 'static,
{
    /// Runs [`SyncCoordinator::sync`] on tokio's blocking pool.
    ///
    /// Rounds block on storage and network calls; this keeps them off
    /// the async worker threads.
    pub async fn sync_blocking(self: Arc<Self>) -> SyncResult<SyncReport> {
        tokio::task::spawn_blocking(move || self.sync())
            .await
            .map_err(|err| SyncError::transport_fatal(format!("sync task failed: {err}")))?
    }

    /// Runs [`SyncCoordinator::sync_with_retry`] on tokio's blocking pool.
    pub async fn sync_with_retry_blocking(self: Arc<Self>) -> SyncResult<SyncReport> {
        tokio::task::spawn_blocking(move || self.sync_with_retry())
            .await
            .map_err(|err| SyncError::transport_fatal(format!("sync task failed: {err}")))?
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{Credentials, SyncConfig};
    use crate::state::SyncCoordinator;
    use crate::transport::MockTransport;
    use qcsync_codec::Value;
    use qcsync_core::{LocalStore, MemoryExecutor};
    use qcsync_protocol::{SyncResponse, Watermark};
    use std::sync::Arc;

    #[tokio::test]
    async fn sync_runs_off_the_runtime() {
        let store = LocalStore::open(MemoryExecutor::new()).unwrap();
        store.register("addItem", "INSERT INTO t VALUES(?1)");
        store.set_data("addItem", &[Value::from("x")]).unwrap();

        let transport = MockTransport::new();
        transport.push_sync(Ok(SyncResponse::accepted(
            Watermark::parse("2024-05-01 12:00:00").unwrap(),
            vec![],
        )));
        let config = SyncConfig::new("https://example.com/sync.php", Credentials::new("u", "p"));
        let sync = Arc::new(SyncCoordinator::new(config, Arc::new(store), transport));

        let report = Arc::clone(&sync).sync_blocking().await.unwrap();
        assert_eq!(report.pushed, 1);
        assert_eq!(sync.store().pending_count().unwrap(), 0);
    }
}
