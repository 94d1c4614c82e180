//! Dashboard service — CRUD scoped to the owning user.
//!
//! ERROR HANDLING
//! ==============
//! A dashboard owned by someone else is reported exactly like a missing one,
//! so identifiers of other users' dashboards are not confirmed.

use serde::Serialize;
use sqlx::{PgExecutor, PgPool};
use tracing::info;

use crate::services::ordering::{DashboardId, OrderingError, PgDashboardScope};

pub const DEFAULT_DASHBOARD_TITLE: &str = "New Dashboard";

#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    #[error("Dashboard with identifier {0} was not found.")]
    NotFound(DashboardId),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("ordering error: {0}")]
    Ordering(#[from] OrderingError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardRow {
    pub identifier: DashboardId,
    pub title: String,
}

/// List the user's dashboards, oldest first.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_dashboards(pool: &PgPool, user_identifier: i64) -> Result<Vec<DashboardRow>, DashboardError> {
    let rows = sqlx::query_as::<_, (i64, String)>(
        "SELECT identifier, title FROM dashboards WHERE user_identifier = $1 ORDER BY identifier ASC",
    )
    .bind(user_identifier)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(identifier, title)| DashboardRow { identifier, title })
        .collect())
}

/// Fetch one dashboard owned by the user.
///
/// # Errors
///
/// Returns [`DashboardError::NotFound`] if it does not exist or belongs to another user.
pub async fn get_dashboard<'e, E>(
    executor: E,
    dashboard_id: DashboardId,
    user_identifier: i64,
) -> Result<DashboardRow, DashboardError>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, (i64, String)>(
        "SELECT identifier, title FROM dashboards WHERE identifier = $1 AND user_identifier = $2",
    )
    .bind(dashboard_id)
    .bind(user_identifier)
    .fetch_optional(executor)
    .await?
    .map(|(identifier, title)| DashboardRow { identifier, title })
    .ok_or(DashboardError::NotFound(dashboard_id))
}

/// Create an empty dashboard titled [`DEFAULT_DASHBOARD_TITLE`].
///
/// # Errors
///
/// Returns a database error if the insert fails.
pub async fn create_dashboard(pool: &PgPool, user_identifier: i64) -> Result<DashboardRow, DashboardError> {
    let (identifier, title) = sqlx::query_as::<_, (i64, String)>(
        "INSERT INTO dashboards (user_identifier, title) VALUES ($1, $2) RETURNING identifier, title",
    )
    .bind(user_identifier)
    .bind(DEFAULT_DASHBOARD_TITLE)
    .fetch_one(pool)
    .await?;

    info!(dashboard_id = identifier, user_identifier, "created dashboard");
    Ok(DashboardRow { identifier, title })
}

/// Rename a dashboard.
///
/// # Errors
///
/// Returns [`DashboardError::NotFound`] if no owned dashboard matches.
pub async fn update_dashboard(
    pool: &PgPool,
    dashboard_id: DashboardId,
    user_identifier: i64,
    title: &str,
) -> Result<DashboardRow, DashboardError> {
    sqlx::query_as::<_, (i64, String)>(
        "UPDATE dashboards SET title = $3
         WHERE identifier = $1 AND user_identifier = $2
         RETURNING identifier, title",
    )
    .bind(dashboard_id)
    .bind(user_identifier)
    .bind(title)
    .fetch_optional(pool)
    .await?
    .map(|(identifier, title)| DashboardRow { identifier, title })
    .ok_or(DashboardError::NotFound(dashboard_id))
}

/// Delete a dashboard together with every graph and control placed on it.
///
/// Runs under the dashboard's placement lock so no placement can add a
/// component between collecting the targets and deleting them.
///
/// # Errors
///
/// Returns [`DashboardError::NotFound`] if no owned dashboard matches.
pub async fn delete_dashboard(
    pool: &PgPool,
    dashboard_id: DashboardId,
    user_identifier: i64,
) -> Result<(), DashboardError> {
    let mut scope = PgDashboardScope::begin(pool, dashboard_id).await?;
    get_dashboard(scope.conn(), dashboard_id, user_identifier).await?;

    let targets = sqlx::query_as::<_, (Option<i64>, Option<i64>)>(
        "SELECT graph_identifier, control_identifier FROM dashboard_components WHERE dashboard_identifier = $1",
    )
    .bind(dashboard_id)
    .fetch_all(scope.conn())
    .await?;
    let graph_ids: Vec<i64> = targets.iter().filter_map(|(g, _)| *g).collect();
    let control_ids: Vec<i64> = targets.iter().filter_map(|(_, c)| *c).collect();

    sqlx::query("DELETE FROM dashboards WHERE identifier = $1")
        .bind(dashboard_id)
        .execute(scope.conn())
        .await?;
    sqlx::query("DELETE FROM graphs WHERE identifier = ANY($1)")
        .bind(&graph_ids)
        .execute(scope.conn())
        .await?;
    sqlx::query("DELETE FROM dashboard_controls WHERE identifier = ANY($1)")
        .bind(&control_ids)
        .execute(scope.conn())
        .await?;

    scope.commit().await?;
    info!(
        dashboard_id,
        graphs = graph_ids.len(),
        controls = control_ids.len(),
        "deleted dashboard"
    );
    Ok(())
}

#[cfg(test)]
#[path = "dashboard_test.rs"]
mod tests;
