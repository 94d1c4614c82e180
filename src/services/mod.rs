//! Service layer: everything the HTTP and socket routes call into.

pub mod auth;
pub mod broadcast;
pub mod catalog;
pub mod components;
pub mod dashboard;
pub mod metric;
pub mod ordering;
pub mod session;
pub mod worker;

#[cfg(all(test, feature = "live-db-tests"))]
pub mod test_support;
