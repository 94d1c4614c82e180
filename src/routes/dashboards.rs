//! Dashboard and component routes.

use axum::extract::State;
use axum::response::Json;
use serde::Deserialize;

use crate::routes::auth::AuthUser;
use crate::routes::error::{ApiError, ApiJson, ApiQuery};
use crate::services::components::{self, ControlProps, GraphProps};
use crate::services::{catalog, dashboard};
use crate::state::AppState;

type ApiResult = Result<Json<serde_json::Value>, ApiError>;

fn require<T>(value: Option<T>, message: &str) -> Result<T, ApiError> {
    value.ok_or_else(|| ApiError::validation(message))
}

// =============================================================================
// DASHBOARDS
// =============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardQuery {
    dashboard_identifier: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardProps {
    title: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDashboardBody {
    identifier: Option<i64>,
    dashboard_props: Option<DashboardProps>,
}

#[derive(Deserialize)]
pub struct IdentifierBody {
    identifier: Option<i64>,
}

/// `GET /dashboards`
pub async fn list_dashboards(State(state): State<AppState>, auth: AuthUser) -> ApiResult {
    let dashboards = dashboard::list_dashboards(&state.pool, auth.user.identifier).await?;
    Ok(Json(serde_json::json!({ "errors": [], "dashboards": dashboards })))
}

/// `GET /get_dashboard?dashboardIdentifier=`
pub async fn get_dashboard(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(query): ApiQuery<DashboardQuery>,
) -> ApiResult {
    let id = require(query.dashboard_identifier, "Missing parameter: dashboardIdentifier")?;
    let found = dashboard::get_dashboard(&state.pool, id, auth.user.identifier).await?;
    Ok(Json(serde_json::json!({ "errors": [], "dashboard": found })))
}

/// `POST /create_dashboard`
pub async fn create_dashboard(State(state): State<AppState>, auth: AuthUser) -> ApiResult {
    let created = dashboard::create_dashboard(&state.pool, auth.user.identifier).await?;
    Ok(Json(serde_json::json!({ "errors": [], "dashboard": created })))
}

/// `POST /update_dashboard`
pub async fn update_dashboard(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(body): ApiJson<UpdateDashboardBody>,
) -> ApiResult {
    let id = require(body.identifier, "Missing parameter: identifier")?;
    let title = require(body.dashboard_props.and_then(|p| p.title), "Missing parameter: dashboardProps.title")?;
    let updated = dashboard::update_dashboard(&state.pool, id, auth.user.identifier, &title).await?;
    Ok(Json(serde_json::json!({ "errors": [], "dashboard": updated })))
}

/// `POST /delete_dashboard`
pub async fn delete_dashboard(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(body): ApiJson<IdentifierBody>,
) -> ApiResult {
    let id = require(body.identifier, "Missing parameter: identifier")?;
    dashboard::delete_dashboard(&state.pool, id, auth.user.identifier).await?;
    Ok(Json(serde_json::json!({ "errors": [] })))
}

/// `GET /dashboard_components?dashboardIdentifier=`
pub async fn dashboard_components(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(query): ApiQuery<DashboardQuery>,
) -> ApiResult {
    let id = require(query.dashboard_identifier, "Missing parameter: dashboardIdentifier")?;
    dashboard::get_dashboard(&state.pool, id, auth.user.identifier).await?;
    let components = catalog::dashboard_components(&state.pool, id).await?;
    Ok(Json(serde_json::json!({ "errors": [], "components": components })))
}

// =============================================================================
// GRAPHS
// =============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGraphBody {
    dashboard_identifier: Option<i64>,
    #[serde(rename = "type")]
    chart_type: Option<String>,
    component_order: Option<i32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGraphBody {
    identifier: Option<i64>,
    graph_props: Option<GraphProps>,
}

/// `POST /create_graph`
pub async fn create_graph(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(body): ApiJson<CreateGraphBody>,
) -> ApiResult {
    let (Some(dashboard_id), Some(chart_type)) = (body.dashboard_identifier, body.chart_type) else {
        return Err(ApiError::validation("Missing parameters: dashboardIdentifier, type"));
    };
    let graph =
        components::create_graph(&state.pool, auth.user.identifier, dashboard_id, &chart_type, body.component_order)
            .await?;
    Ok(Json(serde_json::json!({ "errors": [], "graph": catalog::CatalogEntry::Graph(graph) })))
}

/// `POST /update_graph`
pub async fn update_graph(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(body): ApiJson<UpdateGraphBody>,
) -> ApiResult {
    let id = require(body.identifier, "Missing parameter: identifier")?;
    let props = body.graph_props.unwrap_or_default();
    let graph = components::update_graph(&state.pool, auth.user.identifier, id, &props).await?;
    Ok(Json(serde_json::json!({ "errors": [], "graph": catalog::CatalogEntry::Graph(graph) })))
}

/// `POST /delete_graph`
pub async fn delete_graph(State(state): State<AppState>, auth: AuthUser, ApiJson(body): ApiJson<IdentifierBody>) -> ApiResult {
    let id = require(body.identifier, "Missing parameter: identifier")?;
    components::delete_graph(&state.pool, auth.user.identifier, id).await?;
    Ok(Json(serde_json::json!({ "errors": [] })))
}

// =============================================================================
// CONTROLS
// =============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateControlBody {
    dashboard_identifier: Option<i64>,
    #[serde(rename = "type")]
    control_type: Option<String>,
    component_order: Option<i32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateControlBody {
    identifier: Option<i64>,
    control_props: Option<ControlProps>,
}

/// `POST /create_control`
pub async fn create_control(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(body): ApiJson<CreateControlBody>,
) -> ApiResult {
    let dashboard_id = require(body.dashboard_identifier, "Missing parameters: dashboardIdentifier")?;
    let control = components::create_control(
        &state.pool,
        auth.user.identifier,
        dashboard_id,
        body.control_type.as_deref(),
        body.component_order,
    )
    .await?;
    Ok(Json(serde_json::json!({ "errors": [], "control": catalog::CatalogEntry::Control(control) })))
}

/// `POST /update_control`
pub async fn update_control(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(body): ApiJson<UpdateControlBody>,
) -> ApiResult {
    let id = require(body.identifier, "Missing parameter: identifier")?;
    let props = body.control_props.unwrap_or_default();
    let control = components::update_control(&state.pool, auth.user.identifier, id, &props).await?;
    Ok(Json(serde_json::json!({ "errors": [], "control": catalog::CatalogEntry::Control(control) })))
}

/// `POST /delete_control`
pub async fn delete_control(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(body): ApiJson<IdentifierBody>,
) -> ApiResult {
    let id = require(body.identifier, "Missing parameter: identifier")?;
    components::delete_control(&state.pool, auth.user.identifier, id).await?;
    Ok(Json(serde_json::json!({ "errors": [] })))
}

#[cfg(test)]
#[path = "dashboards_test.rs"]
mod tests;
