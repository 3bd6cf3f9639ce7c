//! Background job lifecycle.
//!
//! [`JobScheduler`] owns the periodic backup, restore-check and upload
//! reconciliation loops. `start()` spawns them; `shutdown()` signals them
//! and waits for the tasks to exit. Manual triggers from the admin API and
//! the scheduled ticks take the same locks: backup and restore passes share
//! one (they read and write the same snapshots), reconciliation has its own.
//!
//! At startup the restore check runs first and, if no table failed, a
//! backup pass follows so the snapshots reflect the repaired database.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::JobIntervals;
use crate::services::backup::{
    BackupService, RestoreStatus, SnapshotInfo, TableBackupReport, TableRestoreReport,
};
use crate::services::image_sync::{ImageSyncError, SyncReport};
use crate::services::uploads::UploadStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Job {
    Backup,
    RestoreCheck,
    ImageSync,
}

impl Job {
    const fn name(self) -> &'static str {
        match self {
            Self::Backup => "backup",
            Self::RestoreCheck => "restore_check",
            Self::ImageSync => "image_sync",
        }
    }
}

/// Reports from the most recent pass of a job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastRun<T> {
    pub finished_at: DateTime<Utc>,
    pub reports: T,
}

/// Snapshot files plus the latest backup and restore passes.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupOverview {
    pub snapshots: Vec<SnapshotInfo>,
    pub last_backup: Option<LastRun<Vec<TableBackupReport>>>,
    pub last_restore: Option<LastRun<Vec<TableRestoreReport>>>,
    pub last_image_sync: Option<LastRun<SyncReport>>,
}

/// Owner of the background jobs.
#[derive(Clone)]
pub struct JobScheduler {
    inner: Arc<Inner>,
}

struct Inner {
    backup: BackupService,
    uploads: UploadStore,
    intervals: JobIntervals,
    // Backup and restore both touch the snapshot files, so they share a lock.
    snapshot_lock: Mutex<()>,
    sync_lock: Mutex<()>,
    // Shared with `AppState`; dropped when a restore puts rows back
    pending_orders: Cache<(), i64>,
    shutdown_tx: watch::Sender<bool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    last_backup: RwLock<Option<LastRun<Vec<TableBackupReport>>>>,
    last_restore: RwLock<Option<LastRun<Vec<TableRestoreReport>>>>,
    last_image_sync: RwLock<Option<LastRun<SyncReport>>>,
}

impl JobScheduler {
    /// `pending_orders` is the admin badge cache, invalidated whenever a
    /// restore pass inserts rows.
    #[must_use]
    pub fn new(
        backup: BackupService,
        uploads: UploadStore,
        intervals: JobIntervals,
        pending_orders: Cache<(), i64>,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                backup,
                uploads,
                intervals,
                snapshot_lock: Mutex::new(()),
                sync_lock: Mutex::new(()),
                pending_orders,
                shutdown_tx,
                handles: Mutex::new(Vec::new()),
                last_backup: RwLock::new(None),
                last_restore: RwLock::new(None),
                last_image_sync: RwLock::new(None),
            }),
        }
    }

    /// Spawn the job loops. Calling `start` again while running is a no-op.
    ///
    /// Upload reconciliation runs immediately. A startup pass runs the
    /// restore check, then a backup unless a table failed to restore, so a
    /// damaged database is repaired before it is snapshotted. The loops for
    /// both then wait one interval.
    pub async fn start(&self) {
        let mut handles = self.inner.handles.lock().await;
        if !handles.is_empty() {
            return;
        }
        self.inner.shutdown_tx.send_replace(false);

        let intervals = self.inner.intervals;
        handles.push(self.spawn_startup());
        handles.push(self.spawn_loop(Job::RestoreCheck, intervals.restore_check, false));
        handles.push(self.spawn_loop(Job::ImageSync, intervals.image_sync, true));
        handles.push(self.spawn_loop(Job::Backup, intervals.backup, false));

        tracing::info!(
            backup_secs = intervals.backup.as_secs(),
            restore_check_secs = intervals.restore_check.as_secs(),
            image_sync_secs = intervals.image_sync.as_secs(),
            "Background jobs started"
        );
    }

    /// Signal every loop to stop and wait for them to finish.
    ///
    /// A pass already in progress completes first.
    pub async fn shutdown(&self) {
        self.inner.shutdown_tx.send_replace(true);
        let handles: Vec<_> = self.inner.handles.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Background job task panicked");
            }
        }
        tracing::info!("Background jobs stopped");
    }

    fn spawn_startup(&self) -> JoinHandle<()> {
        let this = self.clone();
        let shutdown = self.inner.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let reports = this.run_restore().await;
            if *shutdown.borrow() {
                return;
            }
            if reports.iter().any(|r| r.status == RestoreStatus::Failed) {
                tracing::warn!("Restore check failed for some tables, skipping startup backup");
                return;
            }
            this.run_backup().await;
            tracing::info!("Startup restore check and backup finished");
        })
    }

    fn spawn_loop(&self, job: Job, period: Duration, immediate: bool) -> JoinHandle<()> {
        let this = self.clone();
        let mut shutdown = self.inner.shutdown_tx.subscribe();
        let period = period.max(Duration::from_secs(1));

        tokio::spawn(async move {
            let start = if immediate {
                Instant::now()
            } else {
                Instant::now() + period
            };
            let mut ticker = tokio::time::interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                if *shutdown.borrow() {
                    break;
                }
                tokio::select! {
                    _ = ticker.tick() => this.run_scheduled(job).await,
                    _ = shutdown.changed() => {}
                }
            }
            tracing::debug!(job = job.name(), "Job loop exited");
        })
    }

    async fn run_scheduled(&self, job: Job) {
        tracing::debug!(job = job.name(), "Running scheduled job");
        match job {
            Job::Backup => {
                self.run_backup().await;
            }
            Job::RestoreCheck => {
                self.run_restore().await;
            }
            Job::ImageSync => {
                if let Err(e) = self.run_image_sync().await {
                    tracing::error!(error = %e, "Upload reconciliation failed");
                }
            }
        }
    }

    // =========================================================================
    // Passes (shared by the loops and the manual triggers)
    // =========================================================================

    /// Run a backup pass, waiting for any pass already in flight.
    pub async fn run_backup(&self) -> Vec<TableBackupReport> {
        let _guard = self.inner.snapshot_lock.lock().await;
        let reports = self.inner.backup.backup_all().await;
        *self.inner.last_backup.write().await = Some(LastRun {
            finished_at: Utc::now(),
            reports: reports.clone(),
        });
        reports
    }

    /// Run a restore check, waiting for any pass already in flight.
    ///
    /// Drops the cached pending-order count if any table was restored.
    pub async fn run_restore(&self) -> Vec<TableRestoreReport> {
        let _guard = self.inner.snapshot_lock.lock().await;
        let reports = self.inner.backup.restore_all().await;
        if any_restored(&reports) {
            self.inner.pending_orders.invalidate(&()).await;
        }
        *self.inner.last_restore.write().await = Some(LastRun {
            finished_at: Utc::now(),
            reports: reports.clone(),
        });
        reports
    }

    /// Run an upload reconciliation pass.
    ///
    /// # Errors
    ///
    /// Returns `ImageSyncError` if a directory cannot be listed.
    pub async fn run_image_sync(&self) -> Result<SyncReport, ImageSyncError> {
        let _guard = self.inner.sync_lock.lock().await;
        let report = self.inner.uploads.sync().await?;
        *self.inner.last_image_sync.write().await = Some(LastRun {
            finished_at: Utc::now(),
            reports: report,
        });
        Ok(report)
    }

    /// Snapshot files on disk and the latest pass results.
    pub async fn overview(&self) -> BackupOverview {
        BackupOverview {
            snapshots: self.inner.backup.status().await,
            last_backup: self.inner.last_backup.read().await.clone(),
            last_restore: self.inner.last_restore.read().await.clone(),
            last_image_sync: self.inner.last_image_sync.read().await.clone(),
        }
    }
}

fn any_restored(reports: &[TableRestoreReport]) -> bool {
    reports.iter().any(|r| r.status == RestoreStatus::Restored)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;
    use sqlx::postgres::PgPoolOptions;

    use crate::services::backup::{CriticalTable, Snapshot};

    use super::*;

    fn scheduler(root: &std::path::Path) -> JobScheduler {
        // Nothing listens on port 1: every database pass fails fast
        let pool = PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(200))
            .connect_lazy("postgres://127.0.0.1:1/unused")
            .unwrap();
        let backup = BackupService::new(pool, root.join("backups"));
        let uploads = UploadStore::with_dirs(root.join("data"), root.join("public"));
        JobScheduler::new(
            backup,
            uploads,
            JobIntervals {
                // The loops never tick within the test
                backup: Duration::from_secs(3600),
                restore_check: Duration::from_secs(3600),
                image_sync: Duration::from_secs(3600),
            },
            Cache::new(1),
        )
    }

    fn restore_report(table: CriticalTable, status: RestoreStatus) -> TableRestoreReport {
        TableRestoreReport {
            table,
            status,
            snapshot_rows: 3,
            live_rows: 2,
            verification_missing: 0,
            inserted: 1,
            insert_failures: 0,
            error: None,
        }
    }

    async fn wait_until<F, Fut>(mut done: F)
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        for _ in 0..250 {
            if done().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(40)).await;
        }
        panic!("condition not reached within 10s");
    }

    #[tokio::test]
    async fn test_manual_image_sync_records_last_run() {
        let root = tempfile::tempdir().unwrap();
        let jobs = scheduler(root.path());
        tokio::fs::create_dir_all(root.path().join("data")).await.unwrap();
        tokio::fs::write(root.path().join("data/a.png"), b"a").await.unwrap();

        let report = jobs.run_image_sync().await.unwrap();
        assert_eq!(report.restored, 1);

        let last = jobs.inner.last_image_sync.read().await.clone().unwrap();
        assert_eq!(last.reports, report);
    }

    #[tokio::test]
    async fn test_concurrent_syncs_do_not_overlap() {
        let root = tempfile::tempdir().unwrap();
        let jobs = scheduler(root.path());
        tokio::fs::create_dir_all(root.path().join("data")).await.unwrap();
        tokio::fs::write(root.path().join("data/a.png"), b"a").await.unwrap();

        let (first, second) = tokio::join!(jobs.run_image_sync(), jobs.run_image_sync());
        let (first, second) = (first.unwrap(), second.unwrap());
        // Exactly one pass did the copy; the other found it present
        assert_eq!(first.restored + second.restored, 1);
        assert_eq!(first.already_present + second.already_present, 1);
    }

    #[tokio::test]
    async fn test_start_then_shutdown() {
        let root = tempfile::tempdir().unwrap();
        let jobs = scheduler(root.path());
        tokio::fs::create_dir_all(root.path().join("data")).await.unwrap();
        tokio::fs::write(root.path().join("data/b.png"), b"b").await.unwrap();

        jobs.start().await;
        // Second start is ignored
        jobs.start().await;
        assert_eq!(jobs.inner.handles.lock().await.len(), 4);

        // The immediate reconciliation pass copies the file
        for _ in 0..50 {
            if root.path().join("public/b.png").exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(root.path().join("public/b.png").exists());

        tokio::time::timeout(Duration::from_secs(10), jobs.shutdown())
            .await
            .unwrap();
        assert!(jobs.inner.handles.lock().await.is_empty());
    }

    #[test]
    fn test_any_restored() {
        let healthy = restore_report(CriticalTable::Orders, RestoreStatus::Healthy);
        let restored = restore_report(CriticalTable::Orders, RestoreStatus::Restored);
        let failed = restore_report(CriticalTable::Users, RestoreStatus::Failed);
        assert!(!any_restored(&[healthy.clone(), failed.clone()]));
        assert!(any_restored(&[healthy, restored, failed]));
        assert!(!any_restored(&[]));
    }

    #[tokio::test]
    async fn test_startup_backs_up_after_clean_restore_check() {
        let root = tempfile::tempdir().unwrap();
        let jobs = scheduler(root.path());

        jobs.start().await;
        // No snapshots yet, so the restore check passes and a backup follows
        let scheduler = &jobs;
        wait_until(|| async move { scheduler.inner.last_backup.read().await.is_some() }).await;

        let restore = jobs.inner.last_restore.read().await.clone().unwrap();
        assert!(
            restore
                .reports
                .iter()
                .all(|r| r.status == RestoreStatus::NoSnapshot)
        );
        let backup = jobs.inner.last_backup.read().await.clone().unwrap();
        assert_eq!(backup.reports.len(), CriticalTable::ALL.len());
        assert!(backup.finished_at >= restore.finished_at);

        tokio::time::timeout(Duration::from_secs(10), jobs.shutdown())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_startup_skips_backup_when_restore_check_fails() {
        let root = tempfile::tempdir().unwrap();
        let snapshot = Snapshot {
            table: "users".to_string(),
            taken_at: Utc::now(),
            row_count: 1,
            rows: vec![json!({"id": 1, "username": "bat"})],
        };
        tokio::fs::create_dir_all(root.path().join("backups")).await.unwrap();
        tokio::fs::write(
            root.path().join("backups/users.json"),
            serde_json::to_vec(&snapshot).unwrap(),
        )
        .await
        .unwrap();
        let jobs = scheduler(root.path());

        jobs.start().await;
        let scheduler = &jobs;
        wait_until(|| async move { scheduler.inner.last_restore.read().await.is_some() }).await;
        tokio::time::timeout(Duration::from_secs(10), jobs.shutdown())
            .await
            .unwrap();

        let restore = jobs.inner.last_restore.read().await.clone().unwrap();
        let users = restore
            .reports
            .iter()
            .find(|r| r.table == CriticalTable::Users)
            .unwrap();
        assert_eq!(users.status, RestoreStatus::Failed);
        // A failed check must not overwrite the snapshots
        assert!(jobs.inner.last_backup.read().await.is_none());
    }
}
