//! Ordering engine — dense component positions within a dashboard.
//!
//! DESIGN
//! ======
//! Graphs and controls share one order space per dashboard. After every
//! committed operation the stored orders of a dashboard with N components are
//! exactly `0..N`. Placement is "close the old gap, open the new slot, write
//! the row", expressed as set-based shifts against a [`DashboardStore`].
//!
//! CONCURRENCY
//! ===========
//! The engine itself holds no locks. Callers run it inside a scope that is
//! exclusive per dashboard: [`PgDashboardScope`] opens a transaction and takes
//! `pg_advisory_xact_lock(dashboard_id)` before any read, so two placements on
//! the same dashboard cannot interleave. Dropping a scope without `commit`
//! rolls every shift back.
//!
//! Out-of-range targets are clamped to `[0, count]` where `count` is the number
//! of other components on the dashboard, so a large target appends.

use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tracing::debug;

pub type DashboardId = i64;

// =============================================================================
// TYPES
// =============================================================================

/// What a component slot points at. Exactly one kind per component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentTarget {
    Graph(i64),
    Control(i64),
}

impl ComponentTarget {
    /// Rebuild a target from the nullable `(graph, control)` column pair.
    #[must_use]
    pub fn from_columns(graph_id: Option<i64>, control_id: Option<i64>) -> Option<Self> {
        match (graph_id, control_id) {
            (Some(id), None) => Some(Self::Graph(id)),
            (None, Some(id)) => Some(Self::Control(id)),
            _ => None,
        }
    }

    #[must_use]
    pub fn graph_id(self) -> Option<i64> {
        match self {
            Self::Graph(id) => Some(id),
            Self::Control(_) => None,
        }
    }

    #[must_use]
    pub fn control_id(self) -> Option<i64> {
        match self {
            Self::Control(id) => Some(id),
            Self::Graph(_) => None,
        }
    }
}

/// A component row as stored on a dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedComponent {
    pub id: i64,
    pub dashboard_id: DashboardId,
    pub target: ComponentTarget,
    pub order: i32,
}

/// A component to write: `id` is `None` for a component not yet on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentSlot {
    pub id: Option<i64>,
    pub dashboard_id: DashboardId,
    pub target: ComponentTarget,
}

/// Shift every component with `order >= from` by `delta`, skipping `except`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderShift {
    pub from: i32,
    pub delta: i32,
    pub except: Option<i64>,
}

impl OrderShift {
    #[must_use]
    pub fn applies_to(&self, component: &PlacedComponent) -> bool {
        component.order >= self.from && self.except != Some(component.id)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OrderingError {
    #[error("{0:?} is not placed on dashboard {1}")]
    NotPlaced(ComponentTarget, DashboardId),
    #[error("scope is locked to dashboard {locked}, not {requested}")]
    ScopeMismatch { locked: DashboardId, requested: DashboardId },
    #[error("store error: {0}")]
    Store(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Gaps and duplicates found in a dashboard's order values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderViolation {
    pub gaps: Vec<i32>,
    pub duplicates: Vec<i32>,
}

// =============================================================================
// STORE CONTRACT
// =============================================================================

/// Persistence calls the engine makes. Every call runs inside the caller's
/// per-dashboard scope and observes that scope's uncommitted writes.
#[async_trait]
pub trait DashboardStore: Send {
    /// Components on the dashboard, ascending by order.
    async fn components_on_dashboard(&mut self, dashboard_id: DashboardId)
    -> Result<Vec<PlacedComponent>, OrderingError>;

    /// Apply `shift` to the dashboard's components. Returns rows touched.
    async fn update_orders(&mut self, dashboard_id: DashboardId, shift: OrderShift) -> Result<u64, OrderingError>;

    /// Move an existing row or insert a new one at `order`.
    async fn upsert_component(&mut self, slot: ComponentSlot, order: i32) -> Result<PlacedComponent, OrderingError>;

    async fn delete_component(&mut self, dashboard_id: DashboardId, component_id: i64) -> Result<(), OrderingError>;
}

// =============================================================================
// ENGINE
// =============================================================================

/// Place `target` on `dashboard_id` at `new_order`, inserting it if it is not
/// on the dashboard yet.
///
/// # Errors
///
/// Propagates store failures; the caller's scope must then be dropped
/// uncommitted.
pub async fn place<S>(
    store: &mut S,
    dashboard_id: DashboardId,
    target: ComponentTarget,
    new_order: i32,
) -> Result<PlacedComponent, OrderingError>
where
    S: DashboardStore + ?Sized,
{
    let components = store.components_on_dashboard(dashboard_id).await?;
    let existing = components.iter().find(|c| c.target == target).cloned();
    let others = components.len() - usize::from(existing.is_some());
    let new_order = clamp_order(new_order, others);

    if let Some(current) = &existing {
        if current.order == new_order {
            return Ok(current.clone());
        }
        store
            .update_orders(dashboard_id, OrderShift { from: current.order + 1, delta: -1, except: Some(current.id) })
            .await?;
    }

    let except = existing.as_ref().map(|c| c.id);
    store
        .update_orders(dashboard_id, OrderShift { from: new_order, delta: 1, except })
        .await?;

    let slot = ComponentSlot { id: except, dashboard_id, target };
    let placed = store.upsert_component(slot, new_order).await?;

    debug!(
        dashboard_id,
        component_id = placed.id,
        from = ?existing.map(|c| c.order),
        to = new_order,
        "placed component"
    );
    Ok(placed)
}

/// Remove `target` from `dashboard_id` and close the gap it leaves.
///
/// # Errors
///
/// Returns [`OrderingError::NotPlaced`] if the target is not on the dashboard.
pub async fn remove<S>(
    store: &mut S,
    dashboard_id: DashboardId,
    target: ComponentTarget,
) -> Result<PlacedComponent, OrderingError>
where
    S: DashboardStore + ?Sized,
{
    let components = store.components_on_dashboard(dashboard_id).await?;
    let Some(existing) = components.into_iter().find(|c| c.target == target) else {
        return Err(OrderingError::NotPlaced(target, dashboard_id));
    };

    store.delete_component(dashboard_id, existing.id).await?;
    store
        .update_orders(dashboard_id, OrderShift { from: existing.order + 1, delta: -1, except: None })
        .await?;

    debug!(dashboard_id, component_id = existing.id, order = existing.order, "removed component");
    Ok(existing)
}

/// Clamp a requested order to `[0, others]`.
#[must_use]
pub fn clamp_order(requested: i32, others: usize) -> i32 {
    let max = i32::try_from(others).unwrap_or(i32::MAX);
    requested.clamp(0, max)
}

/// Verify that `orders` is exactly `0..orders.len()` in some permutation.
///
/// # Errors
///
/// Returns the missing and repeated order values.
pub fn check_contiguous(orders: &[i32]) -> Result<(), OrderViolation> {
    let mut counts: BTreeMap<i32, usize> = BTreeMap::new();
    for order in orders {
        *counts.entry(*order).or_default() += 1;
    }

    let len = i32::try_from(orders.len()).unwrap_or(i32::MAX);
    let violation = OrderViolation {
        gaps: (0..len).filter(|o| !counts.contains_key(o)).collect(),
        duplicates: counts
            .iter()
            .filter(|(_, n)| **n > 1)
            .map(|(o, _)| *o)
            .collect(),
    };

    // N values covering all of 0..N leaves no room for repeats or strays.
    if violation.gaps.is_empty() { Ok(()) } else { Err(violation) }
}

// =============================================================================
// POSTGRES SCOPE
// =============================================================================

type ComponentRow = (i64, i64, Option<i64>, Option<i64>, i32);

const COMPONENT_COLUMNS: &str = "identifier, dashboard_identifier, graph_identifier, control_identifier, component_order";

/// A transaction holding the advisory lock for one dashboard.
///
/// Other work that must commit atomically with a placement (creating the
/// graph row, deleting it) runs on [`PgDashboardScope::conn`].
pub struct PgDashboardScope {
    tx: Transaction<'static, Postgres>,
    dashboard_id: DashboardId,
}

impl PgDashboardScope {
    /// Open a transaction and block until the dashboard's advisory lock is held.
    ///
    /// # Errors
    ///
    /// Returns a database error if the transaction or lock cannot be acquired.
    pub async fn begin(pool: &PgPool, dashboard_id: DashboardId) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(dashboard_id)
            .execute(&mut *tx)
            .await?;
        Ok(Self { tx, dashboard_id })
    }

    /// Connection of the locked transaction, for writes that must commit
    /// together with the placement.
    pub fn conn(&mut self) -> &mut PgConnection {
        &mut self.tx
    }

    /// Commit all writes and release the advisory lock.
    ///
    /// # Errors
    ///
    /// Returns a database error if the commit fails, including a violation of
    /// the deferred `(dashboard, order)` uniqueness constraint.
    pub async fn commit(self) -> Result<(), sqlx::Error> {
        self.tx.commit().await
    }

    fn ensure_scope(&self, requested: DashboardId) -> Result<(), OrderingError> {
        if requested == self.dashboard_id {
            Ok(())
        } else {
            Err(OrderingError::ScopeMismatch { locked: self.dashboard_id, requested })
        }
    }
}

fn row_to_component(row: ComponentRow) -> Result<PlacedComponent, OrderingError> {
    let (id, dashboard_id, graph_id, control_id, order) = row;
    let target = ComponentTarget::from_columns(graph_id, control_id)
        .ok_or_else(|| OrderingError::Store(format!("component {id} has no single target")))?;
    Ok(PlacedComponent { id, dashboard_id, target, order })
}

#[async_trait]
impl DashboardStore for PgDashboardScope {
    async fn components_on_dashboard(
        &mut self,
        dashboard_id: DashboardId,
    ) -> Result<Vec<PlacedComponent>, OrderingError> {
        self.ensure_scope(dashboard_id)?;
        let rows = sqlx::query_as::<_, ComponentRow>(&format!(
            "SELECT {COMPONENT_COLUMNS} FROM dashboard_components
             WHERE dashboard_identifier = $1
             ORDER BY component_order ASC, identifier ASC"
        ))
        .bind(dashboard_id)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(row_to_component).collect()
    }

    async fn update_orders(&mut self, dashboard_id: DashboardId, shift: OrderShift) -> Result<u64, OrderingError> {
        self.ensure_scope(dashboard_id)?;
        let result = sqlx::query(
            "UPDATE dashboard_components
             SET component_order = component_order + $2
             WHERE dashboard_identifier = $1
               AND component_order >= $3
               AND ($4::BIGINT IS NULL OR identifier <> $4)",
        )
        .bind(dashboard_id)
        .bind(shift.delta)
        .bind(shift.from)
        .bind(shift.except)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected())
    }

    async fn upsert_component(&mut self, slot: ComponentSlot, order: i32) -> Result<PlacedComponent, OrderingError> {
        self.ensure_scope(slot.dashboard_id)?;
        let row = match slot.id {
            Some(id) => {
                sqlx::query_as::<_, ComponentRow>(&format!(
                    "UPDATE dashboard_components SET component_order = $3
                     WHERE identifier = $1 AND dashboard_identifier = $2
                     RETURNING {COMPONENT_COLUMNS}"
                ))
                .bind(id)
                .bind(slot.dashboard_id)
                .bind(order)
                .fetch_optional(&mut *self.tx)
                .await?
                .ok_or(OrderingError::NotPlaced(slot.target, slot.dashboard_id))?
            }
            None => {
                sqlx::query_as::<_, ComponentRow>(&format!(
                    "INSERT INTO dashboard_components
                         (dashboard_identifier, graph_identifier, control_identifier, component_order)
                     VALUES ($1, $2, $3, $4)
                     RETURNING {COMPONENT_COLUMNS}"
                ))
                .bind(slot.dashboard_id)
                .bind(slot.target.graph_id())
                .bind(slot.target.control_id())
                .bind(order)
                .fetch_one(&mut *self.tx)
                .await?
            }
        };
        row_to_component(row)
    }

    async fn delete_component(&mut self, dashboard_id: DashboardId, component_id: i64) -> Result<(), OrderingError> {
        self.ensure_scope(dashboard_id)?;
        sqlx::query("DELETE FROM dashboard_components WHERE identifier = $1 AND dashboard_identifier = $2")
            .bind(component_id)
            .bind(dashboard_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "ordering_test.rs"]
mod tests;
