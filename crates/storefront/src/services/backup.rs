//! Table snapshots and best-effort restore.
//!
//! Each critical table is dumped to `<backup_dir>/<table>.json`. A restore
//! pass compares the live table against its snapshot and re-inserts rows
//! whose primary key is missing. Existing rows are never modified, so
//! running a restore twice inserts nothing the second time.
//!
//! Tables are processed independently: one failing table is logged and
//! reported without stopping the others.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use thiserror::Error;

/// Snapshot rows checked against the live table during verification.
pub const VERIFY_SAMPLE_SIZE: usize = 5;

/// Tables covered by backup, in foreign-key order for restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CriticalTable {
    Users,
    Categories,
    Products,
    Orders,
    OrderItems,
    SiteContent,
}

impl CriticalTable {
    pub const ALL: [Self; 6] = [
        Self::Users,
        Self::Categories,
        Self::Products,
        Self::Orders,
        Self::OrderItems,
        Self::SiteContent,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Categories => "categories",
            Self::Products => "products",
            Self::Orders => "orders",
            Self::OrderItems => "order_items",
            Self::SiteContent => "site_content",
        }
    }

    /// Whether recent rows are spot-checked on restore.
    #[must_use]
    pub const fn is_verified(self) -> bool {
        matches!(self, Self::Users | Self::Orders)
    }
}

impl std::fmt::Display for CriticalTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for CriticalTable {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| format!("not a backed-up table: {s}"))
    }
}

/// Errors from snapshot I/O or the database.
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("snapshot for {table} is corrupt: {reason}")]
    CorruptSnapshot { table: String, reason: String },
}

/// On-disk snapshot envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub table: String,
    pub taken_at: DateTime<Utc>,
    pub row_count: usize,
    pub rows: Vec<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupStatus {
    Written,
    /// Live table is empty but the previous snapshot is not; kept the old one.
    KeptPrevious,
    Failed,
}

/// Result of backing up one table.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableBackupReport {
    pub table: CriticalTable,
    pub status: BackupStatus,
    pub rows: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RestoreStatus {
    /// No snapshot on disk yet.
    NoSnapshot,
    /// Live table matches the snapshot; nothing inserted.
    Healthy,
    Restored,
    Failed,
}

/// Result of checking (and possibly restoring) one table.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRestoreReport {
    pub table: CriticalTable,
    pub status: RestoreStatus,
    pub snapshot_rows: usize,
    pub live_rows: i64,
    /// Sampled recent rows missing from the live table.
    pub verification_missing: usize,
    pub inserted: usize,
    pub insert_failures: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TableRestoreReport {
    const fn new(table: CriticalTable, status: RestoreStatus) -> Self {
        Self {
            table,
            status,
            snapshot_rows: 0,
            live_rows: 0,
            verification_missing: 0,
            inserted: 0,
            insert_failures: 0,
            error: None,
        }
    }
}

/// Result of spot-checking one table.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableVerifyReport {
    pub table: CriticalTable,
    pub sampled: usize,
    pub missing: Vec<i32>,
}

/// Snapshot metadata for the status endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotInfo {
    pub table: CriticalTable,
    pub taken_at: Option<DateTime<Utc>>,
    pub row_count: Option<usize>,
}

/// Backup and restore over a snapshot directory.
#[derive(Debug, Clone)]
pub struct BackupService {
    pool: PgPool,
    dir: PathBuf,
}

impl BackupService {
    #[must_use]
    pub const fn new(pool: PgPool, dir: PathBuf) -> Self {
        Self { pool, dir }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn snapshot_path(&self, table: CriticalTable) -> PathBuf {
        self.dir.join(format!("{table}.json"))
    }

    // =========================================================================
    // Backup
    // =========================================================================

    /// Snapshot every critical table.
    pub async fn backup_all(&self) -> Vec<TableBackupReport> {
        let mut reports = Vec::with_capacity(CriticalTable::ALL.len());
        for table in CriticalTable::ALL {
            let report = match self.backup_table(table).await {
                Ok(report) => report,
                Err(e) => {
                    tracing::error!(table = %table, error = %e, "Table backup failed");
                    TableBackupReport {
                        table,
                        status: BackupStatus::Failed,
                        rows: 0,
                        error: Some(e.to_string()),
                    }
                }
            };
            reports.push(report);
        }
        reports
    }

    /// Snapshot one table.
    ///
    /// # Errors
    ///
    /// Returns `BackupError` if the dump query or the file write fails.
    pub async fn backup_table(&self, table: CriticalTable) -> Result<TableBackupReport, BackupError> {
        let rows: Value = sqlx::query_scalar(&format!(
            "SELECT COALESCE(json_agg(t ORDER BY t.id), '[]'::json) FROM {table} AS t"
        ))
        .fetch_one(&self.pool)
        .await?;
        let rows = match rows {
            Value::Array(rows) => rows,
            _ => Vec::new(),
        };

        if rows.is_empty()
            && let Some(previous) = self.load_snapshot(table).await?
            && previous.row_count > 0
        {
            tracing::warn!(
                table = %table,
                previous_rows = previous.row_count,
                "Live table is empty, keeping previous snapshot"
            );
            return Ok(TableBackupReport {
                table,
                status: BackupStatus::KeptPrevious,
                rows: previous.row_count,
                error: None,
            });
        }

        let snapshot = Snapshot {
            table: table.name().to_string(),
            taken_at: Utc::now(),
            row_count: rows.len(),
            rows,
        };
        self.write_snapshot(table, &snapshot).await?;

        tracing::info!(table = %table, rows = snapshot.row_count, "Table backed up");
        Ok(TableBackupReport {
            table,
            status: BackupStatus::Written,
            rows: snapshot.row_count,
            error: None,
        })
    }

    async fn write_snapshot(&self, table: CriticalTable, snapshot: &Snapshot) -> Result<(), BackupError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let bytes = serde_json::to_vec(snapshot)?;
        let tmp = self.dir.join(format!(".{table}.json.tmp"));
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, self.snapshot_path(table)).await?;
        Ok(())
    }

    /// Load a table's snapshot, `None` if there is none yet.
    ///
    /// # Errors
    ///
    /// Returns `BackupError::CorruptSnapshot` if the file is not a valid
    /// snapshot for this table.
    pub async fn load_snapshot(&self, table: CriticalTable) -> Result<Option<Snapshot>, BackupError> {
        let bytes = match tokio::fs::read(self.snapshot_path(table)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let snapshot: Snapshot =
            serde_json::from_slice(&bytes).map_err(|e| BackupError::CorruptSnapshot {
                table: table.name().to_string(),
                reason: e.to_string(),
            })?;
        if snapshot.table != table.name() {
            return Err(BackupError::CorruptSnapshot {
                table: table.name().to_string(),
                reason: format!("envelope names table {}", snapshot.table),
            });
        }
        Ok(Some(snapshot))
    }

    /// Snapshot metadata for every critical table.
    pub async fn status(&self) -> Vec<SnapshotInfo> {
        let mut infos = Vec::with_capacity(CriticalTable::ALL.len());
        for table in CriticalTable::ALL {
            let snapshot = self.load_snapshot(table).await.unwrap_or_else(|e| {
                tracing::warn!(table = %table, error = %e, "Cannot read snapshot");
                None
            });
            infos.push(SnapshotInfo {
                table,
                taken_at: snapshot.as_ref().map(|s| s.taken_at),
                row_count: snapshot.as_ref().map(|s| s.row_count),
            });
        }
        infos
    }

    // =========================================================================
    // Verify / Restore
    // =========================================================================

    /// Spot-check the verified tables without restoring anything.
    ///
    /// Tables without a snapshot are skipped.
    ///
    /// # Errors
    ///
    /// Returns the first `BackupError` encountered.
    pub async fn verify_all(&self) -> Result<Vec<TableVerifyReport>, BackupError> {
        let mut reports = Vec::new();
        for table in CriticalTable::ALL.into_iter().filter(|t| t.is_verified()) {
            let Some(snapshot) = self.load_snapshot(table).await? else {
                continue;
            };
            reports.push(self.verify(table, &snapshot).await?);
        }
        Ok(reports)
    }

    async fn verify(&self, table: CriticalTable, snapshot: &Snapshot) -> Result<TableVerifyReport, BackupError> {
        let sample = recent_sample(&snapshot.rows, VERIFY_SAMPLE_SIZE);
        let found: Vec<i32> = sqlx::query_scalar(&format!(
            "SELECT id FROM {table} WHERE id = ANY($1)"
        ))
        .bind(&sample)
        .fetch_all(&self.pool)
        .await?;
        let found: HashSet<i32> = found.into_iter().collect();
        let missing: Vec<i32> = sample.iter().copied().filter(|id| !found.contains(id)).collect();

        if !missing.is_empty() {
            tracing::warn!(table = %table, missing = ?missing, "Recent rows missing from live table");
        }
        Ok(TableVerifyReport {
            table,
            sampled: sample.len(),
            missing,
        })
    }

    /// Check every critical table against its snapshot and restore missing rows.
    pub async fn restore_all(&self) -> Vec<TableRestoreReport> {
        let mut reports = Vec::with_capacity(CriticalTable::ALL.len());
        for table in CriticalTable::ALL {
            let report = match self.restore_table(table).await {
                Ok(report) => report,
                Err(e) => {
                    tracing::error!(table = %table, error = %e, "Table restore failed");
                    let mut report = TableRestoreReport::new(table, RestoreStatus::Failed);
                    report.error = Some(e.to_string());
                    report
                }
            };
            reports.push(report);
        }
        reports
    }

    /// Check one table and re-insert rows missing from the live table.
    ///
    /// Restore runs when the live count is below the snapshot count, or when
    /// verification finds a sampled row missing.
    ///
    /// # Errors
    ///
    /// Returns `BackupError` if the snapshot cannot be read or a query fails.
    /// Individual row insert failures are counted, not returned.
    pub async fn restore_table(&self, table: CriticalTable) -> Result<TableRestoreReport, BackupError> {
        let Some(snapshot) = self.load_snapshot(table).await? else {
            tracing::debug!(table = %table, "No snapshot, skipping restore check");
            return Ok(TableRestoreReport::new(table, RestoreStatus::NoSnapshot));
        };

        let live_rows: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&self.pool)
            .await?;

        let mut report = TableRestoreReport::new(table, RestoreStatus::Healthy);
        report.snapshot_rows = snapshot.row_count;
        report.live_rows = live_rows;

        if table.is_verified() {
            report.verification_missing = self.verify(table, &snapshot).await?.missing.len();
        }

        let behind = usize::try_from(live_rows).unwrap_or(0) < snapshot.row_count;
        if !behind && report.verification_missing == 0 {
            return Ok(report);
        }

        tracing::warn!(
            table = %table,
            live_rows,
            snapshot_rows = snapshot.row_count,
            verification_missing = report.verification_missing,
            "Restoring missing rows from snapshot"
        );

        let live_ids: Vec<i32> = sqlx::query_scalar(&format!("SELECT id FROM {table}"))
            .fetch_all(&self.pool)
            .await?;
        let live_ids: HashSet<i32> = live_ids.into_iter().collect();

        for row in missing_rows(&snapshot.rows, &live_ids) {
            let result = sqlx::query(&format!(
                "INSERT INTO {table} SELECT * FROM jsonb_populate_record(NULL::{table}, $1) \
                 ON CONFLICT (id) DO NOTHING"
            ))
            .bind(row)
            .execute(&self.pool)
            .await;
            match result {
                Ok(done) if done.rows_affected() > 0 => report.inserted += 1,
                Ok(_) => {}
                Err(e) => {
                    report.insert_failures += 1;
                    tracing::warn!(table = %table, id = ?row_id(row), error = %e, "Row restore failed");
                }
            }
        }

        // Keep SERIAL ahead of restored ids
        sqlx::query(&format!(
            "SELECT setval(pg_get_serial_sequence('{table}', 'id'), \
             GREATEST(COALESCE(MAX(id), 0), 1), MAX(id) IS NOT NULL) FROM {table}"
        ))
        .execute(&self.pool)
        .await?;

        report.status = RestoreStatus::Restored;
        tracing::info!(
            table = %table,
            inserted = report.inserted,
            failed = report.insert_failures,
            "Table restore finished"
        );
        Ok(report)
    }
}

fn row_id(row: &Value) -> Option<i32> {
    row.get("id")?.as_i64().and_then(|id| i32::try_from(id).ok())
}

/// Snapshot rows whose id is absent from `live_ids`.
///
/// Rows without a usable id are skipped.
#[must_use]
pub fn missing_rows<'a>(rows: &'a [Value], live_ids: &HashSet<i32>) -> Vec<&'a Value> {
    rows.iter()
        .filter(|row| row_id(row).is_some_and(|id| !live_ids.contains(&id)))
        .collect()
}

/// Ids of the `n` most recently created rows (by `created_at`, then id).
#[must_use]
pub fn recent_sample(rows: &[Value], n: usize) -> Vec<i32> {
    let mut keyed: Vec<(Option<DateTime<FixedOffset>>, i32)> = rows
        .iter()
        .filter_map(|row| {
            let id = row_id(row)?;
            let created = row
                .get("created_at")
                .and_then(Value::as_str)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok());
            Some((created, id))
        })
        .collect();
    // Newest first; rows without a timestamp sort last
    keyed.sort_by(|a, b| b.cmp(a));
    keyed.into_iter().take(n).map(|(_, id)| id).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use serde_json::json;
    use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

    use super::*;

    /// A pool whose `search_path` is a fresh schema holding minimal `users`
    /// and `categories` tables, so the live database is never touched.
    struct Scratch {
        admin: PgPool,
        pool: PgPool,
        schema: String,
    }

    impl Scratch {
        async fn new() -> Self {
            let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
            let admin = PgPool::connect(&url).await.unwrap();
            let schema = format!("backup_test_{}", uuid::Uuid::new_v4().simple());
            sqlx::query(&format!("CREATE SCHEMA {schema}"))
                .execute(&admin)
                .await
                .unwrap();

            let options = PgConnectOptions::from_str(&url)
                .unwrap()
                .options([("search_path", schema.as_str())]);
            let pool = PgPoolOptions::new()
                .max_connections(2)
                .connect_with(options)
                .await
                .unwrap();
            for ddl in [
                "CREATE TABLE users (id SERIAL PRIMARY KEY, username TEXT NOT NULL, \
                 created_at TIMESTAMPTZ NOT NULL DEFAULT NOW())",
                "CREATE TABLE categories (id SERIAL PRIMARY KEY, slug TEXT NOT NULL)",
            ] {
                sqlx::query(ddl).execute(&pool).await.unwrap();
            }
            Self { admin, pool, schema }
        }

        async fn cleanup(self) {
            self.pool.close().await;
            sqlx::query(&format!("DROP SCHEMA {} CASCADE", self.schema))
                .execute(&self.admin)
                .await
                .unwrap();
        }
    }

    async fn add_user(pool: &PgPool, username: &str, created_at: &str) -> i32 {
        let created_at = DateTime::parse_from_rfc3339(created_at)
            .unwrap()
            .with_timezone(&Utc);
        sqlx::query_scalar("INSERT INTO users (username, created_at) VALUES ($1, $2) RETURNING id")
            .bind(username)
            .bind(created_at)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[test]
    fn test_restore_order_respects_foreign_keys() {
        let names: Vec<&str> = CriticalTable::ALL.iter().map(|t| t.name()).collect();
        let pos = |name: &str| names.iter().position(|n| *n == name).unwrap();
        assert!(pos("users") < pos("orders"));
        assert!(pos("categories") < pos("products"));
        assert!(pos("products") < pos("order_items"));
        assert!(pos("orders") < pos("order_items"));
    }

    #[test]
    fn test_table_from_str() {
        assert_eq!("order_items".parse::<CriticalTable>(), Ok(CriticalTable::OrderItems));
        assert!("reviews".parse::<CriticalTable>().is_err());
    }

    #[test]
    fn test_missing_rows() {
        let rows = vec![
            json!({"id": 1, "name": "a"}),
            json!({"id": 2, "name": "b"}),
            json!({"id": 3, "name": "c"}),
            json!({"name": "no id"}),
        ];
        let live: HashSet<i32> = [1, 3].into_iter().collect();
        let missing = missing_rows(&rows, &live);
        assert_eq!(missing, vec![&rows[1]]);

        let all: HashSet<i32> = [1, 2, 3].into_iter().collect();
        assert!(missing_rows(&rows, &all).is_empty());
    }

    #[test]
    fn test_recent_sample_prefers_newest() {
        let rows = vec![
            json!({"id": 1, "created_at": "2026-01-01T00:00:00+00:00"}),
            json!({"id": 2, "created_at": "2026-03-01T00:00:00+08:00"}),
            json!({"id": 3, "created_at": "2026-03-01T00:00:00+08:00"}),
            json!({"id": 4}),
            json!({"id": 5, "created_at": "2026-02-15T12:30:00.123456+00:00"}),
        ];
        assert_eq!(recent_sample(&rows, 3), vec![3, 2, 5]);
        assert_eq!(recent_sample(&rows, 10), vec![3, 2, 5, 1, 4]);
        assert!(recent_sample(&[], 5).is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        // Lazy pool never connects; only file I/O is exercised here
        let pool = PgPool::connect_lazy("postgres://localhost/unused").unwrap();
        let service = BackupService::new(pool, dir.path().to_path_buf());

        assert!(service.load_snapshot(CriticalTable::Users).await.unwrap().is_none());

        let snapshot = Snapshot {
            table: "users".to_string(),
            taken_at: Utc::now(),
            row_count: 1,
            rows: vec![json!({"id": 1, "username": "bat"})],
        };
        service.write_snapshot(CriticalTable::Users, &snapshot).await.unwrap();

        let loaded = service.load_snapshot(CriticalTable::Users).await.unwrap().unwrap();
        assert_eq!(loaded.row_count, 1);
        assert_eq!(loaded.rows, snapshot.rows);
        assert!(!dir.path().join(".users.json.tmp").exists());

        // A snapshot filed under the wrong table is rejected
        tokio::fs::copy(dir.path().join("users.json"), dir.path().join("orders.json"))
            .await
            .unwrap();
        assert!(matches!(
            service.load_snapshot(CriticalTable::Orders).await,
            Err(BackupError::CorruptSnapshot { .. })
        ));
    }

    #[tokio::test]
    #[ignore = "Requires DATABASE_URL"]
    async fn test_missing_recent_row_is_restored_when_counts_match() {
        let scratch = Scratch::new().await;
        let dir = tempfile::tempdir().unwrap();
        let service = BackupService::new(scratch.pool.clone(), dir.path().to_path_buf());

        add_user(&scratch.pool, "bat", "2026-01-01T00:00:00Z").await;
        add_user(&scratch.pool, "dorj", "2026-02-01T00:00:00Z").await;
        let newest = add_user(&scratch.pool, "saraa", "2026-03-01T00:00:00Z").await;
        service.backup_table(CriticalTable::Users).await.unwrap();

        // Lose the newest row but keep the count equal
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(newest)
            .execute(&scratch.pool)
            .await
            .unwrap();
        add_user(&scratch.pool, "tuul", "2026-04-01T00:00:00Z").await;

        let report = service.restore_table(CriticalTable::Users).await.unwrap();
        assert_eq!(report.live_rows, 3);
        assert_eq!(report.snapshot_rows, 3);
        assert_eq!(report.verification_missing, 1);
        assert_eq!(report.inserted, 1);
        assert_eq!(report.status, RestoreStatus::Restored);

        let username: String = sqlx::query_scalar("SELECT username FROM users WHERE id = $1")
            .bind(newest)
            .fetch_one(&scratch.pool)
            .await
            .unwrap();
        assert_eq!(username, "saraa");

        let again = service.restore_table(CriticalTable::Users).await.unwrap();
        assert_eq!(again.status, RestoreStatus::Healthy);
        assert_eq!(again.inserted, 0);

        scratch.cleanup().await;
    }

    #[tokio::test]
    #[ignore = "Requires DATABASE_URL"]
    async fn test_emptied_table_keeps_snapshot_and_restores_with_sequence_bump() {
        let scratch = Scratch::new().await;
        let dir = tempfile::tempdir().unwrap();
        let service = BackupService::new(scratch.pool.clone(), dir.path().to_path_buf());

        sqlx::query("INSERT INTO categories (slug) VALUES ('beef')")
            .execute(&scratch.pool)
            .await
            .unwrap();
        let first = service.backup_table(CriticalTable::Categories).await.unwrap();
        assert_eq!(first.status, BackupStatus::Written);
        assert_eq!(first.rows, 1);

        // Wiped along with its sequence
        sqlx::query("TRUNCATE categories RESTART IDENTITY")
            .execute(&scratch.pool)
            .await
            .unwrap();
        let kept = service.backup_table(CriticalTable::Categories).await.unwrap();
        assert_eq!(kept.status, BackupStatus::KeptPrevious);
        assert_eq!(kept.rows, 1);
        let snapshot = service.load_snapshot(CriticalTable::Categories).await.unwrap().unwrap();
        assert_eq!(snapshot.row_count, 1);

        let report = service.restore_table(CriticalTable::Categories).await.unwrap();
        assert_eq!(report.status, RestoreStatus::Restored);
        assert_eq!(report.inserted, 1);

        let again = service.restore_table(CriticalTable::Categories).await.unwrap();
        assert_eq!(again.status, RestoreStatus::Healthy);
        assert_eq!(again.inserted, 0);

        // New rows do not collide with the restored id
        let next: i32 = sqlx::query_scalar("INSERT INTO categories (slug) VALUES ('lamb') RETURNING id")
            .fetch_one(&scratch.pool)
            .await
            .unwrap();
        assert_eq!(next, 2);

        scratch.cleanup().await;
    }
}
