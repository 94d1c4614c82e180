//! Graph and control CRUD on top of the ordering engine.
//!
//! DESIGN
//! ======
//! Creating a component inserts its graph/control row and places it in one
//! dashboard scope, so a failed placement leaves no orphan row behind.
//! Deleting runs the reverse: remove from the order space, close the gap,
//! then drop the row, again under the dashboard's lock.
//!
//! Updates only touch the graph/control row and never the order, so they
//! skip the lock.

use serde::Deserialize;
use sqlx::PgPool;
use tracing::info;

use crate::services::catalog::{ControlComponent, GraphComponent};
use crate::services::dashboard::{self, DashboardError};
use crate::services::ordering::{self, ComponentTarget, DashboardId, OrderingError, PgDashboardScope};

#[derive(Debug, thiserror::Error)]
pub enum ComponentError {
    #[error("Dashboard with identifier {0} was not found.")]
    DashboardNotFound(DashboardId),
    #[error("Graph with identifier {0} does not exist.")]
    GraphNotFound(i64),
    #[error("Control with identifier {0} does not exist.")]
    ControlNotFound(i64),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("ordering error: {0}")]
    Ordering(#[from] OrderingError),
}

impl From<DashboardError> for ComponentError {
    fn from(err: DashboardError) -> Self {
        match err {
            DashboardError::NotFound(id) => Self::DashboardNotFound(id),
            DashboardError::Database(e) => Self::Database(e),
            DashboardError::Ordering(e) => Self::Ordering(e),
        }
    }
}

impl ComponentError {
    fn not_found(target: ComponentTarget) -> Self {
        match target {
            ComponentTarget::Graph(id) => Self::GraphNotFound(id),
            ComponentTarget::Control(id) => Self::ControlNotFound(id),
        }
    }
}

/// Replacement values for a graph. Absent fields are cleared.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphProps {
    pub title: Option<String>,
    pub worker_identifier: Option<String>,
    pub metric_name: Option<String>,
    pub units: Option<String>,
}

/// Replacement values for a control. Absent fields are cleared.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlProps {
    pub title: Option<String>,
    pub worker_control_identifier: Option<i64>,
}

type GraphRow = (i64, String, Option<String>, i64, Option<String>, Option<String>, Option<String>, i32);
type ControlRow = (i64, Option<String>, Option<String>, i64, Option<i64>, i32);

fn graph_from_row(row: GraphRow) -> GraphComponent {
    let (identifier, chart_type, title, dashboard_identifier, worker_identifier, metric_name, units, component_order) =
        row;
    GraphComponent {
        identifier,
        chart_type,
        title,
        dashboard_identifier,
        worker_identifier,
        metric_name,
        units,
        component_order,
    }
}

fn control_from_row(row: ControlRow) -> ControlComponent {
    let (identifier, control_type, title, dashboard_identifier, worker_control_identifier, component_order) = row;
    ControlComponent { identifier, control_type, title, dashboard_identifier, worker_control_identifier, component_order }
}

// =============================================================================
// CREATE
// =============================================================================

/// Create a graph of `chart_type` and place it at `component_order`
/// (default 0, clamped to the end of the dashboard).
///
/// # Errors
///
/// Returns [`ComponentError::DashboardNotFound`] if the user does not own the dashboard.
pub async fn create_graph(
    pool: &PgPool,
    user_identifier: i64,
    dashboard_id: DashboardId,
    chart_type: &str,
    component_order: Option<i32>,
) -> Result<GraphComponent, ComponentError> {
    let mut scope = PgDashboardScope::begin(pool, dashboard_id).await?;
    dashboard::get_dashboard(scope.conn(), dashboard_id, user_identifier).await?;

    let identifier: i64 = sqlx::query_scalar("INSERT INTO graphs (type) VALUES ($1) RETURNING identifier")
        .bind(chart_type)
        .fetch_one(scope.conn())
        .await?;
    let placed =
        ordering::place(&mut scope, dashboard_id, ComponentTarget::Graph(identifier), component_order.unwrap_or(0))
            .await?;
    scope.commit().await?;

    info!(dashboard_id, graph_id = identifier, order = placed.order, "created graph");
    Ok(GraphComponent {
        identifier,
        chart_type: chart_type.to_owned(),
        title: None,
        dashboard_identifier: dashboard_id,
        worker_identifier: None,
        metric_name: None,
        units: None,
        component_order: placed.order,
    })
}

/// Create a control and place it at `component_order` (default 0).
///
/// # Errors
///
/// Returns [`ComponentError::DashboardNotFound`] if the user does not own the dashboard.
pub async fn create_control(
    pool: &PgPool,
    user_identifier: i64,
    dashboard_id: DashboardId,
    control_type: Option<&str>,
    component_order: Option<i32>,
) -> Result<ControlComponent, ComponentError> {
    let mut scope = PgDashboardScope::begin(pool, dashboard_id).await?;
    dashboard::get_dashboard(scope.conn(), dashboard_id, user_identifier).await?;

    let identifier: i64 = sqlx::query_scalar("INSERT INTO dashboard_controls (type) VALUES ($1) RETURNING identifier")
        .bind(control_type)
        .fetch_one(scope.conn())
        .await?;
    let placed =
        ordering::place(&mut scope, dashboard_id, ComponentTarget::Control(identifier), component_order.unwrap_or(0))
            .await?;
    scope.commit().await?;

    info!(dashboard_id, control_id = identifier, order = placed.order, "created control");
    Ok(ControlComponent {
        identifier,
        control_type: control_type.map(str::to_owned),
        title: None,
        dashboard_identifier: dashboard_id,
        worker_control_identifier: None,
        component_order: placed.order,
    })
}

// =============================================================================
// UPDATE
// =============================================================================

/// Overwrite a graph's descriptive fields.
///
/// # Errors
///
/// Returns [`ComponentError::GraphNotFound`] if the graph is not on one of the user's dashboards.
pub async fn update_graph(
    pool: &PgPool,
    user_identifier: i64,
    graph_id: i64,
    props: &GraphProps,
) -> Result<GraphComponent, ComponentError> {
    let row = sqlx::query_as::<_, GraphRow>(
        "UPDATE graphs g
         SET title = $3, worker_identifier = $4, metric_name = $5, units = $6
         FROM dashboard_components dc
         INNER JOIN dashboards d ON d.identifier = dc.dashboard_identifier
         WHERE g.identifier = $1 AND dc.graph_identifier = g.identifier AND d.user_identifier = $2
         RETURNING g.identifier, g.type, g.title, dc.dashboard_identifier,
                   g.worker_identifier, g.metric_name, g.units, dc.component_order",
    )
    .bind(graph_id)
    .bind(user_identifier)
    .bind(&props.title)
    .bind(&props.worker_identifier)
    .bind(&props.metric_name)
    .bind(&props.units)
    .fetch_optional(pool)
    .await?;

    row.map(graph_from_row).ok_or(ComponentError::GraphNotFound(graph_id))
}

/// Overwrite a control's title and worker-control binding.
///
/// # Errors
///
/// Returns [`ComponentError::ControlNotFound`] if the control is not on one of the user's dashboards.
pub async fn update_control(
    pool: &PgPool,
    user_identifier: i64,
    control_id: i64,
    props: &ControlProps,
) -> Result<ControlComponent, ComponentError> {
    let row = sqlx::query_as::<_, ControlRow>(
        "UPDATE dashboard_controls c
         SET title = $3, worker_control_identifier = $4
         FROM dashboard_components dc
         INNER JOIN dashboards d ON d.identifier = dc.dashboard_identifier
         WHERE c.identifier = $1 AND dc.control_identifier = c.identifier AND d.user_identifier = $2
         RETURNING c.identifier, c.type, c.title, dc.dashboard_identifier,
                   c.worker_control_identifier, dc.component_order",
    )
    .bind(control_id)
    .bind(user_identifier)
    .bind(&props.title)
    .bind(props.worker_control_identifier)
    .fetch_optional(pool)
    .await?;

    row.map(control_from_row).ok_or(ComponentError::ControlNotFound(control_id))
}

// =============================================================================
// DELETE
// =============================================================================

/// Remove a graph from its dashboard, close the gap, and delete the graph.
///
/// # Errors
///
/// Returns [`ComponentError::GraphNotFound`] if the graph is not on one of the user's dashboards.
pub async fn delete_graph(pool: &PgPool, user_identifier: i64, graph_id: i64) -> Result<(), ComponentError> {
    delete_component(pool, user_identifier, ComponentTarget::Graph(graph_id)).await
}

/// Remove a control from its dashboard, close the gap, and delete the control.
///
/// # Errors
///
/// Returns [`ComponentError::ControlNotFound`] if the control is not on one of the user's dashboards.
pub async fn delete_control(pool: &PgPool, user_identifier: i64, control_id: i64) -> Result<(), ComponentError> {
    delete_component(pool, user_identifier, ComponentTarget::Control(control_id)).await
}

async fn delete_component(pool: &PgPool, user_identifier: i64, target: ComponentTarget) -> Result<(), ComponentError> {
    let dashboard_id: Option<DashboardId> = sqlx::query_scalar(
        "SELECT dc.dashboard_identifier
         FROM dashboard_components dc
         INNER JOIN dashboards d ON d.identifier = dc.dashboard_identifier
         WHERE dc.graph_identifier IS NOT DISTINCT FROM $1
           AND dc.control_identifier IS NOT DISTINCT FROM $2
           AND d.user_identifier = $3",
    )
    .bind(target.graph_id())
    .bind(target.control_id())
    .bind(user_identifier)
    .fetch_optional(pool)
    .await?;
    let dashboard_id = dashboard_id.ok_or_else(|| ComponentError::not_found(target))?;

    let mut scope = PgDashboardScope::begin(pool, dashboard_id).await?;
    match ordering::remove(&mut scope, dashboard_id, target).await {
        Ok(_) => {}
        // Deleted by a concurrent request between the lookup and the lock.
        Err(OrderingError::NotPlaced(..)) => return Err(ComponentError::not_found(target)),
        Err(e) => return Err(e.into()),
    }

    let sql = match target {
        ComponentTarget::Graph(_) => "DELETE FROM graphs WHERE identifier = $1",
        ComponentTarget::Control(_) => "DELETE FROM dashboard_controls WHERE identifier = $1",
    };
    let (ComponentTarget::Graph(id) | ComponentTarget::Control(id)) = target;
    sqlx::query(sql).bind(id).execute(scope.conn()).await?;
    scope.commit().await?;

    info!(dashboard_id, ?target, "deleted component");
    Ok(())
}

#[cfg(test)]
#[path = "components_test.rs"]
mod tests;
