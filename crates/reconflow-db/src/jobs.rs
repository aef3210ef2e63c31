//! Job store for tracking scan invocations.
//!
//! The store enforces the job state machine at the SQL level: a terminal
//! write only applies to a row that is still `pending` or `running`, so a
//! second terminal write for the same job is a no-op rather than an overwrite.

use crate::error::{DatabaseError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use reconflow_core::{JobId, JobStatus, ScanType, TargetId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::SqlitePool;

/// One tracked invocation of a scan against a target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Unique identifier, assigned once at creation
    pub id: JobId,
    /// Target the scan runs against
    pub target_id: TargetId,
    /// Kind of scan
    #[serde(rename = "type")]
    pub scan_type: ScanType,
    /// Current lifecycle state
    pub status: JobStatus,
    /// When the job was created
    pub started_at: DateTime<Utc>,
    /// When the job reached a terminal state
    pub completed_at: Option<DateTime<Utc>>,
    /// Final payload; for failed jobs carries an `error` string
    pub result: Option<Value>,
}

impl Job {
    /// The `result.error` message of a failed job.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.result
            .as_ref()
            .and_then(|result| result.get("error"))
            .and_then(Value::as_str)
    }
}

type JobRow = (
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
);

const JOB_COLUMNS: &str = "id, target_id, type, status, started_at, completed_at, results";

/// Fixed-width UTC timestamps keep `ORDER BY started_at` chronological.
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::Decode(format!("invalid timestamp '{value}': {e}")))
}

fn job_from_row(row: JobRow) -> Result<Job> {
    let (id, target_id, scan_type, status, started_at, completed_at, results) = row;

    let result = results
        .map(|raw| {
            serde_json::from_str(&raw).map_err(|e| {
                DatabaseError::Decode(format!("invalid result payload for job '{id}': {e}"))
            })
        })
        .transpose()?;

    Ok(Job {
        scan_type: scan_type
            .parse()
            .map_err(|e| DatabaseError::Decode(format!("job '{id}': {e}")))?,
        status: status
            .parse()
            .map_err(|e| DatabaseError::Decode(format!("job '{id}': {e}")))?,
        target_id: TargetId::new(target_id)?,
        started_at: parse_timestamp(&started_at)?,
        completed_at: completed_at.as_deref().map(parse_timestamp).transpose()?,
        result,
        id: JobId::from_stored(id),
    })
}

/// Create a new job row.
///
/// # Errors
/// Returns `DatabaseError::Validation` if `status` is terminal, or a database
/// error if the insert fails (for example an unknown `target_id`).
pub async fn create_job(
    pool: &SqlitePool,
    target_id: &TargetId,
    scan_type: ScanType,
    status: JobStatus,
) -> Result<Job> {
    if status.is_terminal() {
        return Err(DatabaseError::Validation(format!(
            "jobs cannot be created in terminal state '{status}'"
        )));
    }

    let id = JobId::generate();
    let started_at = Utc::now();

    sqlx::query(
        "INSERT INTO recon_jobs (id, target_id, type, status, started_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(id.as_str())
    .bind(target_id.as_str())
    .bind(scan_type.as_str())
    .bind(status.as_str())
    .bind(format_timestamp(started_at))
    .execute(pool)
    .await?;

    Ok(Job {
        id,
        target_id: target_id.clone(),
        scan_type,
        status,
        started_at,
        completed_at: None,
        result: None,
    })
}

/// Move a `pending` job to `running`.
///
/// Returns `false` if the job was not pending.
pub async fn mark_running(pool: &SqlitePool, id: &JobId) -> Result<bool> {
    let outcome =
        sqlx::query("UPDATE recon_jobs SET status = 'running' WHERE id = ? AND status = 'pending'")
            .bind(id.as_str())
            .execute(pool)
            .await?;

    Ok(outcome.rows_affected() == 1)
}

/// Move a job into a terminal state with its final payload.
///
/// Returns `true` if this call performed the transition and `false` if the
/// job was already terminal (the stored record is left untouched).
///
/// # Errors
/// Returns `DatabaseError::Validation` if `status` is not terminal and
/// `DatabaseError::NotFound` if no such job exists.
pub async fn finish_job(
    pool: &SqlitePool,
    id: &JobId,
    status: JobStatus,
    result: &Value,
) -> Result<bool> {
    // The update below matches either live state, so both must lead to `status`.
    let reachable = [JobStatus::Pending, JobStatus::Running]
        .iter()
        .all(|from| from.can_transition_to(status));
    if !reachable {
        return Err(DatabaseError::Validation(format!(
            "'{status}' is not a terminal job state"
        )));
    }

    let payload =
        serde_json::to_string(result).map_err(|e| DatabaseError::Serialization(e.to_string()))?;

    let outcome = sqlx::query(
        "UPDATE recon_jobs SET status = ?, completed_at = ?, results = ?
         WHERE id = ? AND status IN ('pending', 'running')",
    )
    .bind(status.as_str())
    .bind(format_timestamp(Utc::now()))
    .bind(payload)
    .bind(id.as_str())
    .execute(pool)
    .await?;

    if outcome.rows_affected() == 1 {
        return Ok(true);
    }

    // Distinguish "already terminal" from "never existed".
    get_job(pool, id).await?;
    Ok(false)
}

/// Fetch one job.
///
/// # Errors
/// Returns `DatabaseError::NotFound` if no such job exists.
pub async fn get_job(pool: &SqlitePool, id: &JobId) -> Result<Job> {
    let row: Option<JobRow> =
        sqlx::query_as(&format!("SELECT {JOB_COLUMNS} FROM recon_jobs WHERE id = ?"))
            .bind(id.as_str())
            .fetch_optional(pool)
            .await?;

    row.map(job_from_row)
        .transpose()?
        .ok_or_else(|| DatabaseError::NotFound(format!("Job '{id}' not found")))
}

/// List every job, newest first. Unpaginated.
pub async fn list_jobs(pool: &SqlitePool) -> Result<Vec<Job>> {
    let rows: Vec<JobRow> = sqlx::query_as(&format!(
        "SELECT {JOB_COLUMNS} FROM recon_jobs ORDER BY started_at DESC, rowid DESC"
    ))
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(job_from_row).collect()
}

/// List the jobs recorded for one target, newest first.
pub async fn list_jobs_for_target(pool: &SqlitePool, target_id: &TargetId) -> Result<Vec<Job>> {
    let rows: Vec<JobRow> = sqlx::query_as(&format!(
        "SELECT {JOB_COLUMNS} FROM recon_jobs WHERE target_id = ? ORDER BY started_at DESC, rowid DESC"
    ))
    .bind(target_id.as_str())
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(job_from_row).collect()
}
