//! Workers and the control keys they expose.
//!
//! Workers are never created explicitly. The first metric report or control
//! registration that names an unknown worker key creates the row, atomically
//! with respect to concurrent first reports.

use serde::Serialize;
use sqlx::{PgExecutor, PgPool};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerRow {
    pub worker_identifier: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerControlRow {
    pub identifier: i64,
    pub control_key: String,
}

/// List every known worker.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_workers(pool: &PgPool) -> Result<Vec<WorkerRow>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (String, Option<String>)>(
        "SELECT worker_identifier, name FROM altar_workers ORDER BY identifier ASC",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|(worker_identifier, name)| WorkerRow { worker_identifier, name })
        .collect())
}

/// Return the internal identifier for `worker_key`, creating the worker if needed.
///
/// The no-op `DO UPDATE` makes `RETURNING` yield the existing row on conflict.
///
/// # Errors
///
/// Returns a database error if the upsert fails.
pub async fn get_or_create_worker<'e, E>(executor: E, worker_key: &str) -> Result<i64, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_scalar(
        "INSERT INTO altar_workers (worker_identifier) VALUES ($1)
         ON CONFLICT (worker_identifier) DO UPDATE SET worker_identifier = EXCLUDED.worker_identifier
         RETURNING identifier",
    )
    .bind(worker_key)
    .fetch_one(executor)
    .await
}

/// Register `control_key` for `worker_key`, creating the worker if needed.
/// Registering an existing pair returns its identifier.
///
/// # Errors
///
/// Returns a database error if either statement fails.
pub async fn register_worker_control(pool: &PgPool, worker_key: &str, control_key: &str) -> Result<i64, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let worker_id = get_or_create_worker(&mut *tx, worker_key).await?;
    let control_id: i64 = sqlx::query_scalar(
        "INSERT INTO altar_worker_controls (altar_worker_identifier, control_key) VALUES ($1, $2)
         ON CONFLICT (altar_worker_identifier, control_key) DO UPDATE SET control_key = EXCLUDED.control_key
         RETURNING identifier",
    )
    .bind(worker_id)
    .bind(control_key)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    debug!(worker = worker_key, control_key, control_id, "registered worker control");
    Ok(control_id)
}

/// List the control keys registered for `worker_key`.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_worker_controls(pool: &PgPool, worker_key: &str) -> Result<Vec<WorkerControlRow>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (i64, String)>(
        "SELECT c.identifier, c.control_key
         FROM altar_worker_controls c
         INNER JOIN altar_workers w ON w.identifier = c.altar_worker_identifier
         WHERE w.worker_identifier = $1
         ORDER BY c.identifier ASC",
    )
    .bind(worker_key)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|(identifier, control_key)| WorkerControlRow { identifier, control_key })
        .collect())
}

#[cfg(test)]
#[path = "worker_test.rs"]
mod tests;
