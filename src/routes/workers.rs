//! Worker, metric, and control-value routes.
//!
//! `POST /metrics` and `POST /create_worker_control` are called by workers,
//! which hold no user session, so they take no [`AuthUser`].

use axum::extract::State;
use axum::response::Json;
use serde::Deserialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::routes::auth::AuthUser;
use crate::routes::error::{ApiError, ApiJson, ApiQuery};
use crate::services::metric::{self, MetricSample, MetricWindow};
use crate::services::worker;
use crate::state::AppState;

type ApiResult = Result<Json<serde_json::Value>, ApiError>;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerQuery {
    worker_identifier: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricQuery {
    worker_identifier: Option<String>,
    metric_name: Option<String>,
    start_timestamp: Option<String>,
    end_timestamp: Option<String>,
    group_by_seconds: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlValueBody {
    worker_identifier: Option<String>,
    control_key: Option<String>,
    control_value: Option<serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricReportBody {
    worker_identifier: Option<String>,
    metric_name: Option<String>,
    metric_value: Option<f64>,
    metric_units: Option<String>,
}

impl MetricReportBody {
    /// Every absent or blank field is reported, not just the first.
    fn into_sample(self) -> Result<MetricSample, ApiError> {
        let worker_identifier = self.worker_identifier.filter(|s| !s.is_empty());
        let metric_name = self.metric_name.filter(|s| !s.is_empty());

        match (worker_identifier, metric_name, self.metric_value) {
            (Some(worker_identifier), Some(metric_name), Some(metric_value)) => Ok(MetricSample {
                worker_identifier,
                metric_name,
                metric_value,
                metric_units: self.metric_units,
            }),
            (worker_identifier, metric_name, metric_value) => {
                let missing = [
                    ("workerIdentifier", worker_identifier.is_none()),
                    ("metricName", metric_name.is_none()),
                    ("metricValue", metric_value.is_none()),
                ];
                Err(ApiError::Validation(
                    missing
                        .into_iter()
                        .filter(|(_, absent)| *absent)
                        .map(|(name, _)| format!("Missing parameter: {name}"))
                        .collect(),
                ))
            }
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerControlBody {
    worker_identifier: Option<String>,
    control_key: Option<String>,
}

fn parse_timestamp(name: &str, raw: &str, errors: &mut Vec<String>) -> Option<OffsetDateTime> {
    match OffsetDateTime::parse(raw.trim(), &Rfc3339) {
        Ok(ts) => Some(ts),
        Err(_) => {
            errors.push(format!("{name} must be an RFC 3339 timestamp."));
            None
        }
    }
}

/// Build the read window from query parameters, reporting every missing or
/// malformed parameter at once.
pub(crate) fn metric_window(query: &MetricQuery) -> Result<MetricWindow, ApiError> {
    let mut errors = Vec::new();
    let mut missing = |name: &str| errors.push(format!("Missing parameter: {name}"));

    let worker_identifier = query.worker_identifier.clone().filter(|v| !v.is_empty());
    if worker_identifier.is_none() {
        missing("workerIdentifier");
    }
    let metric_name = query.metric_name.clone().filter(|v| !v.is_empty());
    if metric_name.is_none() {
        missing("metricName");
    }
    if query.start_timestamp.is_none() {
        missing("startTimestamp");
    }
    if query.end_timestamp.is_none() {
        missing("endTimestamp");
    }

    let start = query
        .start_timestamp
        .as_deref()
        .and_then(|raw| parse_timestamp("startTimestamp", raw, &mut errors));
    let end = query
        .end_timestamp
        .as_deref()
        .and_then(|raw| parse_timestamp("endTimestamp", raw, &mut errors));

    match (worker_identifier, metric_name, start, end) {
        (Some(worker_identifier), Some(metric_name), Some(start), Some(end)) if errors.is_empty() => {
            Ok(MetricWindow { worker_identifier, metric_name, start, end })
        }
        _ => Err(ApiError::Validation(errors)),
    }
}

pub(crate) fn group_by_seconds(raw: Option<&str>) -> Result<i64, ApiError> {
    raw.and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|v| *v > 0)
        .ok_or_else(|| ApiError::validation("groupBySeconds must be a positive integer."))
}

// =============================================================================
// DASHBOARD-CLIENT READS
// =============================================================================

/// `GET /workers`
pub async fn list_workers(State(state): State<AppState>, _auth: AuthUser) -> ApiResult {
    let workers = worker::list_workers(&state.pool).await?;
    Ok(Json(serde_json::json!({ "errors": [], "workers": workers })))
}

/// `GET /worker_controls?workerIdentifier=`
pub async fn list_worker_controls(
    State(state): State<AppState>,
    _auth: AuthUser,
    ApiQuery(query): ApiQuery<WorkerQuery>,
) -> ApiResult {
    let key = query
        .worker_identifier
        .ok_or_else(|| ApiError::validation("Missing parameter: workerIdentifier"))?;
    let controls = worker::list_worker_controls(&state.pool, &key).await?;
    Ok(Json(serde_json::json!({ "errors": [], "controls": controls })))
}

/// `GET /metrics_list?workerIdentifier=`
pub async fn list_metrics(
    State(state): State<AppState>,
    _auth: AuthUser,
    ApiQuery(query): ApiQuery<WorkerQuery>,
) -> ApiResult {
    let key = query
        .worker_identifier
        .ok_or_else(|| ApiError::validation("Missing parameter: workerIdentifier"))?;
    let metrics = metric::list_metric_names(&state.pool, &key).await?;
    Ok(Json(serde_json::json!({ "errors": [], "metrics": metrics })))
}

/// `GET /metrics` — bucketed averages.
pub async fn bucketed_metrics(
    State(state): State<AppState>,
    _auth: AuthUser,
    ApiQuery(query): ApiQuery<MetricQuery>,
) -> ApiResult {
    let window = metric_window(&query)?;
    let group_by = group_by_seconds(query.group_by_seconds.as_deref())?;
    let metrics = metric::bucketed_averages(&state.pool, &window, group_by).await?;
    Ok(Json(serde_json::json!({ "errors": [], "metrics": metrics })))
}

/// `GET /metric_min`
pub async fn metric_min(
    State(state): State<AppState>,
    _auth: AuthUser,
    ApiQuery(query): ApiQuery<MetricQuery>,
) -> ApiResult {
    let window = metric_window(&query)?;
    let value = metric::metric_min(&state.pool, &window).await?;
    Ok(Json(serde_json::json!({ "errors": [], "minValue": value })))
}

/// `GET /metric_max`
pub async fn metric_max(
    State(state): State<AppState>,
    _auth: AuthUser,
    ApiQuery(query): ApiQuery<MetricQuery>,
) -> ApiResult {
    let window = metric_window(&query)?;
    let value = metric::metric_max(&state.pool, &window).await?;
    Ok(Json(serde_json::json!({ "errors": [], "maxValue": value })))
}

/// `POST /update_control_value` — relay a control value to the worker's manager.
pub async fn update_control_value(
    State(state): State<AppState>,
    _auth: AuthUser,
    ApiJson(body): ApiJson<ControlValueBody>,
) -> ApiResult {
    let (Some(worker_key), Some(control_key), Some(control_value)) =
        (body.worker_identifier, body.control_key, body.control_value)
    else {
        return Err(ApiError::validation("Missing parameters: workerIdentifier, controlKey, controlValue"));
    };

    let delivered = state
        .broadcasts
        .publish_control_update(&worker_key, &control_key, control_value);
    Ok(Json(serde_json::json!({ "success": true, "errors": [], "delivered": delivered })))
}

// =============================================================================
// WORKER WRITES
// =============================================================================

/// `POST /metrics` — store a sample and announce it to metric subscribers.
pub async fn report_metric(State(state): State<AppState>, ApiJson(body): ApiJson<MetricReportBody>) -> ApiResult {
    let sample = body.into_sample()?;
    metric::record_sample(&state.pool, &sample).await?;
    state.broadcasts.publish_metric(
        &sample.worker_identifier,
        &sample.metric_name,
        sample.metric_value,
        sample.metric_units.as_deref(),
    );
    Ok(Json(serde_json::json!({ "success": true, "errors": [] })))
}

/// `POST /create_worker_control`
pub async fn create_worker_control(State(state): State<AppState>, ApiJson(body): ApiJson<WorkerControlBody>) -> ApiResult {
    let (Some(worker_key), Some(control_key)) = (body.worker_identifier, body.control_key) else {
        return Err(ApiError::validation("Missing parameters: workerIdentifier, controlKey"));
    };

    let identifier = worker::register_worker_control(&state.pool, &worker_key, &control_key).await?;
    Ok(Json(serde_json::json!({ "success": true, "errors": [], "identifier": identifier })))
}

#[cfg(test)]
#[path = "workers_test.rs"]
mod tests;
