//! Abstract telemetry storage for the SRT node.
//!
//! Every storage backend (LMDB, in-memory for testing) implements
//! [`TelemetryStore`]. Filtering, sorting, pagination and the dashboard
//! aggregation live here so every backend answers queries identically.

pub mod dashboard;
pub mod error;
pub mod query;
pub mod telemetry;

pub use dashboard::{summarize, DashboardBuilder, DashboardSensor, DASHBOARD_WINDOW};
pub use error::StoreError;
pub use query::{
    Page, ReadingFilter, ReadingQuery, SortDirection, SortField, SortOrder, DEFAULT_PAGE_SIZE,
    MAX_PAGE_SIZE,
};
pub use telemetry::TelemetryStore;
