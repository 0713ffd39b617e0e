//! The `TelemetryStore` trait and the query operations built on top of it.

use std::collections::BTreeSet;

use srt_types::Reading;

use crate::{
    dashboard::{summarize, DashboardSensor},
    query::{Page, ReadingFilter, ReadingQuery, SortOrder},
    StoreError,
};

/// Durable, append-only storage of sensor readings.
///
/// Backends implement `insert`, `scan` and `reading_count`; the read views
/// are derived from `scan`.
pub trait TelemetryStore: Send + Sync {
    /// Append one reading. Once this returns `Ok` the reading is durable.
    fn insert(&self, reading: &Reading) -> Result<(), StoreError>;

    /// All readings matching `filter`, in ascending timestamp order with
    /// ties in insertion order.
    fn scan(&self, filter: &ReadingFilter) -> Result<Vec<Reading>, StoreError>;

    fn reading_count(&self) -> Result<u64, StoreError>;

    fn query(&self, query: &ReadingQuery) -> Result<Page<Reading>, StoreError> {
        let matching = self.scan(&query.filter)?;
        Ok(query.paginate(matching))
    }

    /// Every matching reading, unpaginated.
    fn export(&self, filter: &ReadingFilter, sort: SortOrder) -> Result<Vec<Reading>, StoreError> {
        let mut rows = self.scan(filter)?;
        sort.apply(&mut rows);
        Ok(rows)
    }

    fn dashboard(&self) -> Result<Vec<DashboardSensor>, StoreError> {
        let rows = self.scan(&ReadingFilter::default())?;
        Ok(summarize(&rows))
    }

    fn distinct_sensor_types(&self) -> Result<Vec<String>, StoreError> {
        let rows = self.scan(&ReadingFilter::default())?;
        let types: BTreeSet<String> = rows.into_iter().map(|r| r.sensor_type).collect();
        Ok(types.into_iter().collect())
    }

    /// Distinct sensor ids, optionally restricted to one sensor type.
    fn distinct_sensor_ids(&self, sensor_type: Option<&str>) -> Result<Vec<String>, StoreError> {
        let filter = ReadingFilter {
            sensor_type: sensor_type.map(str::to_string),
            ..Default::default()
        };
        let rows = self.scan(&filter)?;
        let ids: BTreeSet<String> = rows.into_iter().map(|r| r.sensor_id).collect();
        Ok(ids.into_iter().collect())
    }
}
