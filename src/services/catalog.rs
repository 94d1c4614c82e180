//! Component catalog — the ordered, mixed view of a dashboard.
//!
//! DESIGN
//! ======
//! Graph-backed and control-backed components live in different tables but
//! share one order space. Both are loaded, tagged as [`CatalogEntry`], and
//! sequenced by stored order. A skipped order value becomes an empty slot
//! (`null` on the wire) so an invariant violation is visible to clients and
//! tests; two entries sharing an order are both kept, never overwritten.
//! Slot index matches stored order only up to the first shared order: each
//! extra entry at an order shifts every later slot right by one, while gaps
//! after it still produce `None`.

use serde::Serialize;
use sqlx::PgPool;
use tracing::warn;

use crate::services::ordering::{self, DashboardId};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphComponent {
    pub identifier: i64,
    #[serde(rename = "type")]
    pub chart_type: String,
    pub title: Option<String>,
    pub dashboard_identifier: DashboardId,
    pub worker_identifier: Option<String>,
    pub metric_name: Option<String>,
    pub units: Option<String>,
    pub component_order: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlComponent {
    pub identifier: i64,
    #[serde(rename = "type")]
    pub control_type: Option<String>,
    pub title: Option<String>,
    pub dashboard_identifier: DashboardId,
    pub worker_control_identifier: Option<i64>,
    pub component_order: i32,
}

/// One positioned component, tagged by kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "componentType", rename_all = "lowercase")]
pub enum CatalogEntry {
    Graph(GraphComponent),
    Control(ControlComponent),
}

impl CatalogEntry {
    #[must_use]
    pub fn order(&self) -> i32 {
        match self {
            Self::Graph(g) => g.component_order,
            Self::Control(c) => c.component_order,
        }
    }

    fn sort_key(&self) -> (i32, u8, i64) {
        match self {
            Self::Graph(g) => (g.component_order, 0, g.identifier),
            Self::Control(c) => (c.component_order, 1, c.identifier),
        }
    }
}

/// Sequence entries by order. Orders that no entry occupies below the highest
/// stored order yield `None`. Entries sharing an order sit side by side
/// (graphs first), so after a shared order a slot index is its order plus the
/// number of extra entries before it.
#[must_use]
pub fn assemble(mut entries: Vec<CatalogEntry>) -> Vec<Option<CatalogEntry>> {
    entries.sort_by_key(CatalogEntry::sort_key);

    let mut slots = Vec::with_capacity(entries.len());
    let mut next_order = 0;
    for entry in entries {
        let order = entry.order();
        while next_order < order {
            slots.push(None);
            next_order += 1;
        }
        next_order = next_order.max(order + 1);
        slots.push(Some(entry));
    }
    slots
}

/// Load and assemble the catalog for a dashboard.
///
/// # Errors
///
/// Returns a database error if either query fails.
pub async fn dashboard_components(
    pool: &PgPool,
    dashboard_id: DashboardId,
) -> Result<Vec<Option<CatalogEntry>>, sqlx::Error> {
    let graphs = sqlx::query_as::<
        _,
        (i64, String, Option<String>, i64, Option<String>, Option<String>, Option<String>, i32),
    >(
        "SELECT g.identifier, g.type, g.title, dc.dashboard_identifier,
                g.worker_identifier, g.metric_name, g.units, dc.component_order
         FROM dashboard_components dc
         INNER JOIN graphs g ON dc.graph_identifier = g.identifier
         WHERE dc.dashboard_identifier = $1",
    )
    .bind(dashboard_id)
    .fetch_all(pool)
    .await?;

    let controls = sqlx::query_as::<_, (i64, Option<String>, Option<String>, i64, Option<i64>, i32)>(
        "SELECT c.identifier, c.type, c.title, dc.dashboard_identifier,
                c.worker_control_identifier, dc.component_order
         FROM dashboard_components dc
         INNER JOIN dashboard_controls c ON dc.control_identifier = c.identifier
         WHERE dc.dashboard_identifier = $1",
    )
    .bind(dashboard_id)
    .fetch_all(pool)
    .await?;

    let mut entries = Vec::with_capacity(graphs.len() + controls.len());
    for (identifier, chart_type, title, dashboard_identifier, worker_identifier, metric_name, units, component_order) in
        graphs
    {
        entries.push(CatalogEntry::Graph(GraphComponent {
            identifier,
            chart_type,
            title,
            dashboard_identifier,
            worker_identifier,
            metric_name,
            units,
            component_order,
        }));
    }
    for (identifier, control_type, title, dashboard_identifier, worker_control_identifier, component_order) in controls {
        entries.push(CatalogEntry::Control(ControlComponent {
            identifier,
            control_type,
            title,
            dashboard_identifier,
            worker_control_identifier,
            component_order,
        }));
    }

    let orders: Vec<i32> = entries.iter().map(CatalogEntry::order).collect();
    if let Err(violation) = ordering::check_contiguous(&orders) {
        warn!(
            dashboard_id,
            gaps = ?violation.gaps,
            duplicates = ?violation.duplicates,
            "dashboard component orders are not contiguous"
        );
    }

    Ok(assemble(entries))
}

#[cfg(test)]
#[path = "catalog_test.rs"]
mod tests;
