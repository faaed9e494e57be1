//! TTL Cleanup Task
//!
//! Background task that periodically removes expired entries from every cache group.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::CacheManager;

/// Spawns a background task that periodically sweeps expired entries.
///
/// Reads still expire entries lazily; the sweep only reclaims budget held by
/// entries nobody asks for. Groups created after the task starts are swept too.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
pub fn spawn_cleanup_task(manager: Arc<CacheManager>, cleanup_interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting TTL cleanup task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = manager.cleanup_expired().await;

            if removed > 0 {
                info!("TTL cleanup: removed {} expired entries", removed);
            } else {
                debug!("TTL cleanup: no expired entries found");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{GetOptions, GroupConfig, LookupStrategy};
    use bytes::Bytes;

    async fn manager_with_group() -> Arc<CacheManager> {
        let manager = Arc::new(CacheManager::new());
        manager
            .get_or_create("sessions", GroupConfig::new(1 << 20), None)
            .await;
        manager
    }

    #[tokio::test]
    async fn test_cleanup_task_removes_expired_entries() {
        let manager = manager_with_group().await;
        manager
            .add("sessions", "expire_soon", Bytes::from("value"), Some(1))
            .await
            .unwrap();

        let handle = spawn_cleanup_task(manager.clone(), 1);

        tokio::time::sleep(Duration::from_millis(2500)).await;

        // the sweep, not a lazy read, removed it
        let stats = manager.stats().await;
        assert_eq!(stats["sessions"].total_entries, 0);

        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_preserves_valid_entries() {
        let manager = manager_with_group().await;
        manager
            .add("sessions", "long_lived", Bytes::from("value"), Some(3600))
            .await
            .unwrap();

        let handle = spawn_cleanup_task(manager.clone(), 1);

        tokio::time::sleep(Duration::from_millis(1500)).await;

        let value = manager
            .get("sessions", "long_lived", GetOptions::new(LookupStrategy::LocalOnly))
            .await
            .unwrap();
        assert_eq!(value, Some(Bytes::from("value")));

        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_can_be_aborted() {
        let handle = spawn_cleanup_task(Arc::new(CacheManager::new()), 1);

        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
