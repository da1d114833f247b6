//! SQLite-backed trace store

use crate::trace::{TraceEntry, TraceError, TraceExit, TraceOutcome, TraceRecord, TraceRecorder};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// One run as it appears in `history` listings
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub steps: usize,
    pub failures: usize,
}

/// Durable trace recorder over SQLite
pub struct SqliteTraceStore {
    pool: SqlitePool,
}

impl SqliteTraceStore {
    /// Open (or create) a store at the given path
    pub async fn new(db_path: &str) -> Result<Self> {
        let pool = SqlitePool::connect(&format!("sqlite:{}?mode=rwc", db_path))
            .await
            .context("Failed to connect to trace database")?;

        let store = Self { pool };
        store.init().await?;

        Ok(store)
    }

    /// Open a store at the platform-local data directory
    pub async fn with_default_path() -> Result<Self> {
        let data_dir = dirs::data_local_dir().unwrap_or_else(|| std::path::PathBuf::from("."));
        let db_dir = data_dir.join("brickrun");
        std::fs::create_dir_all(&db_dir)?;

        let db_path = db_dir.join("traces.db");
        Self::new(db_path.to_str().context("non-utf8 data directory")?).await
    }

    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trace_records (
                run_id TEXT NOT NULL,
                instance_id TEXT NOT NULL,
                brick_id TEXT NOT NULL,
                step_index INTEGER NOT NULL,
                started_at TEXT NOT NULL,
                finished_at TEXT,
                outcome TEXT,
                detail TEXT,
                args TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_trace_run ON trace_records(run_id);
            CREATE INDEX IF NOT EXISTS idx_trace_instance ON trace_records(run_id, instance_id);
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn to_naive(dt: DateTime<Utc>) -> NaiveDateTime {
        dt.naive_utc()
    }

    fn from_naive(dt: NaiveDateTime) -> DateTime<Utc> {
        DateTime::from_naive_utc_and_offset(dt, Utc)
    }

    async fn insert_entry(&self, entry: &TraceEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO trace_records
            (run_id, instance_id, brick_id, step_index, started_at, args)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(entry.run_id.to_string())
        .bind(entry.instance_id.to_string())
        .bind(&entry.brick_id)
        .bind(entry.step_index as i64)
        .bind(Self::to_naive(entry.started_at))
        .bind(entry.args.to_string())
        .execute(&self.pool)
        .await
        .context("Failed to record trace entry")?;

        Ok(())
    }

    async fn apply_exit(&self, exit: &TraceExit) -> Result<()> {
        let (outcome, detail) = match &exit.outcome {
            TraceOutcome::Success { output } => ("success", output.to_string()),
            TraceOutcome::Failure { error } => ("failure", error.clone()),
            TraceOutcome::Skipped => ("skipped", String::new()),
            TraceOutcome::Cancelled => ("cancelled", String::new()),
        };

        let result = sqlx::query(
            r#"
            UPDATE trace_records
            SET finished_at = ?1, outcome = ?2, detail = ?3
            WHERE rowid = (
                SELECT rowid FROM trace_records
                WHERE run_id = ?4 AND instance_id = ?5 AND outcome IS NULL
                ORDER BY rowid DESC
                LIMIT 1
            )
            "#,
        )
        .bind(Self::to_naive(exit.finished_at))
        .bind(outcome)
        .bind(detail)
        .bind(exit.run_id.to_string())
        .bind(exit.instance_id.to_string())
        .execute(&self.pool)
        .await
        .context("Failed to record trace exit")?;

        if result.rows_affected() == 0 {
            anyhow::bail!("no open entry for instance {}", exit.instance_id);
        }
        Ok(())
    }

    /// Records for one run, in execution order
    pub async fn records_for_run(&self, run_id: Uuid) -> Result<Vec<TraceRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT run_id, instance_id, brick_id, step_index,
                   started_at, finished_at, outcome, detail, args
            FROM trace_records
            WHERE run_id = ?1
            ORDER BY rowid ASC
            "#,
        )
        .bind(run_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to load trace records")?;

        rows.iter().map(Self::row_to_record).collect()
    }

    fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<TraceRecord> {
        let outcome = match row.get::<Option<String>, _>("outcome").as_deref() {
            None => None,
            Some("success") => Some(TraceOutcome::Success {
                output: serde_json::from_str(&row.get::<String, _>("detail"))
                    .unwrap_or(Value::Null),
            }),
            Some("failure") => Some(TraceOutcome::Failure {
                error: row.get("detail"),
            }),
            Some("skipped") => Some(TraceOutcome::Skipped),
            Some("cancelled") => Some(TraceOutcome::Cancelled),
            Some(other) => anyhow::bail!("unknown trace outcome '{other}'"),
        };

        Ok(TraceRecord {
            run_id: Uuid::parse_str(&row.get::<String, _>("run_id"))?,
            instance_id: Uuid::parse_str(&row.get::<String, _>("instance_id"))?,
            brick_id: row.get("brick_id"),
            step_index: row.get::<i64, _>("step_index") as usize,
            started_at: Self::from_naive(row.get("started_at")),
            finished_at: row
                .get::<Option<NaiveDateTime>, _>("finished_at")
                .map(Self::from_naive),
            outcome,
            args: serde_json::from_str(&row.get::<String, _>("args")).unwrap_or(Value::Null),
        })
    }

    /// All records for one step instance across runs, oldest first
    pub async fn records_for_instance(&self, instance_id: Uuid) -> Result<Vec<TraceRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT run_id, instance_id, brick_id, step_index,
                   started_at, finished_at, outcome, detail, args
            FROM trace_records
            WHERE instance_id = ?1
            ORDER BY started_at ASC, rowid ASC
            "#,
        )
        .bind(instance_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to load instance trace records")?;

        rows.iter().map(Self::row_to_record).collect()
    }

    /// Most recent runs first
    pub async fn list_runs(&self, limit: usize) -> Result<Vec<RunSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT run_id,
                   MIN(started_at) AS started_at,
                   MAX(finished_at) AS finished_at,
                   COUNT(*) AS steps,
                   SUM(CASE WHEN outcome IN ('failure', 'cancelled') THEN 1 ELSE 0 END) AS failures
            FROM trace_records
            GROUP BY run_id
            ORDER BY MIN(started_at) DESC
            LIMIT ?1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list runs")?;

        rows.iter()
            .map(|row| {
                Ok(RunSummary {
                    run_id: Uuid::parse_str(&row.get::<String, _>("run_id"))?,
                    started_at: Self::from_naive(row.get("started_at")),
                    finished_at: row
                        .get::<Option<NaiveDateTime>, _>("finished_at")
                        .map(Self::from_naive),
                    steps: row.get::<i64, _>("steps") as usize,
                    failures: row.get::<i64, _>("failures") as usize,
                })
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl TraceRecorder for SqliteTraceStore {
    async fn record_entry(&self, entry: TraceEntry) -> Result<(), TraceError> {
        self.insert_entry(&entry)
            .await
            .map_err(|e| TraceError(e.to_string()))
    }

    async fn record_exit(&self, exit: TraceExit) -> Result<(), TraceError> {
        self.apply_exit(&exit)
            .await
            .map_err(|e| TraceError(e.to_string()))
    }

    async fn clear_run(&self, run_id: Uuid) -> Result<(), TraceError> {
        sqlx::query("DELETE FROM trace_records WHERE run_id = ?1")
            .bind(run_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| TraceError(e.to_string()))?;
        Ok(())
    }
}
