//! Metric ingestion and time-window aggregation.
//!
//! DESIGN
//! ======
//! Samples are append-only. Reads are always scoped to one worker, one metric
//! name and an open interval `(start, end)`; both bounds are exclusive.
//!
//! Bucketed reads floor each sample's epoch seconds to a multiple of
//! `group_by_seconds` and average within the bucket. Empty buckets are
//! omitted rather than zero-filled.

use serde::Serialize;
use sqlx::PgPool;
use time::OffsetDateTime;
use tracing::debug;

use crate::services::worker;

#[derive(Debug, thiserror::Error)]
pub enum MetricError {
    #[error("groupBySeconds must be a positive integer.")]
    InvalidGroupBy(i64),
    #[error("startTimestamp must be before endTimestamp.")]
    InvalidRange,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// One validated sample reported by a worker.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub worker_identifier: String,
    pub metric_name: String,
    pub metric_value: f64,
    pub metric_units: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricName {
    pub name: String,
}

/// Average of the samples that fall in one bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricBucket {
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub value: f64,
}

/// Worker, metric and exclusive time bounds shared by every read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricWindow {
    pub worker_identifier: String,
    pub metric_name: String,
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
}

impl MetricWindow {
    /// # Errors
    ///
    /// Returns [`MetricError::InvalidRange`] unless `start < end`.
    pub fn validate(&self) -> Result<(), MetricError> {
        if self.start < self.end { Ok(()) } else { Err(MetricError::InvalidRange) }
    }
}

/// Append a sample, creating its worker on first report.
///
/// # Errors
///
/// Returns a database error if either statement fails; nothing is written then.
pub async fn record_sample(pool: &PgPool, sample: &MetricSample) -> Result<(), MetricError> {
    let mut tx = pool.begin().await?;
    worker::get_or_create_worker(&mut *tx, &sample.worker_identifier).await?;
    sqlx::query("INSERT INTO metrics (worker_identifier, name, value, units) VALUES ($1, $2, $3, $4)")
        .bind(&sample.worker_identifier)
        .bind(&sample.metric_name)
        .bind(sample.metric_value)
        .bind(&sample.metric_units)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    debug!(worker = %sample.worker_identifier, metric = %sample.metric_name, value = sample.metric_value, "recorded sample");
    Ok(())
}

/// Distinct metric names a worker has reported.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_metric_names(pool: &PgPool, worker_identifier: &str) -> Result<Vec<MetricName>, MetricError> {
    let names: Vec<String> = sqlx::query_scalar(
        "SELECT m.name
         FROM metrics m
         INNER JOIN altar_workers w ON m.worker_identifier = w.worker_identifier
         WHERE w.worker_identifier = $1
         GROUP BY m.name
         ORDER BY m.name ASC",
    )
    .bind(worker_identifier)
    .fetch_all(pool)
    .await?;
    Ok(names.into_iter().map(|name| MetricName { name }).collect())
}

/// Average values per `group_by_seconds` bucket, oldest bucket first.
///
/// # Errors
///
/// Returns [`MetricError::InvalidGroupBy`] for a non-positive bucket width and
/// [`MetricError::InvalidRange`] for an empty window.
pub async fn bucketed_averages(
    pool: &PgPool,
    window: &MetricWindow,
    group_by_seconds: i64,
) -> Result<Vec<MetricBucket>, MetricError> {
    if group_by_seconds <= 0 {
        return Err(MetricError::InvalidGroupBy(group_by_seconds));
    }
    window.validate()?;

    let rows = sqlx::query_as::<_, (OffsetDateTime, f64)>(
        "SELECT to_timestamp(
                    floor(extract(epoch FROM metric_timestamp)::DOUBLE PRECISION / $5::DOUBLE PRECISION)
                    * $5::DOUBLE PRECISION
                ) AS bucket,
                avg(value) AS value
         FROM metrics
         WHERE worker_identifier = $1
           AND name = $2
           AND metric_timestamp > $3
           AND metric_timestamp < $4
         GROUP BY bucket
         ORDER BY bucket ASC",
    )
    .bind(&window.worker_identifier)
    .bind(&window.metric_name)
    .bind(window.start)
    .bind(window.end)
    .bind(group_by_seconds)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(timestamp, value)| MetricBucket { timestamp, value })
        .collect())
}

/// Smallest value in the window, `None` when there are no samples.
///
/// # Errors
///
/// Returns [`MetricError::InvalidRange`] for an empty window.
pub async fn metric_min(pool: &PgPool, window: &MetricWindow) -> Result<Option<f64>, MetricError> {
    extreme(pool, window, "min").await
}

/// Largest value in the window, `None` when there are no samples.
///
/// # Errors
///
/// Returns [`MetricError::InvalidRange`] for an empty window.
pub async fn metric_max(pool: &PgPool, window: &MetricWindow) -> Result<Option<f64>, MetricError> {
    extreme(pool, window, "max").await
}

async fn extreme(pool: &PgPool, window: &MetricWindow, aggregate: &'static str) -> Result<Option<f64>, MetricError> {
    window.validate()?;
    let sql = format!(
        "SELECT {aggregate}(value) FROM metrics
         WHERE worker_identifier = $1
           AND name = $2
           AND metric_timestamp > $3
           AND metric_timestamp < $4"
    );
    let value: Option<f64> = sqlx::query_scalar(&sql)
        .bind(&window.worker_identifier)
        .bind(&window.metric_name)
        .bind(window.start)
        .bind(window.end)
        .fetch_one(pool)
        .await?;
    Ok(value)
}

#[cfg(test)]
#[path = "metric_test.rs"]
mod tests;
