//! Nullable store: thread-safe in-memory telemetry storage for testing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use srt_store::{ReadingFilter, StoreError, TelemetryStore};
use srt_types::Reading;

/// An in-memory telemetry store.
/// Thread-safe for use with tokio's multi-threaded runtime.
#[derive(Default)]
pub struct NullTelemetryStore {
    readings: Mutex<Vec<Reading>>,
    fail_inserts: AtomicBool,
}

impl NullTelemetryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent insert fail (or succeed again).
    pub fn set_fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    /// Everything stored so far, in insertion order.
    pub fn all(&self) -> Vec<Reading> {
        self.readings.lock().unwrap().clone()
    }
}

impl TelemetryStore for NullTelemetryStore {
    fn insert(&self, reading: &Reading) -> Result<(), StoreError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("null store configured to fail".into()));
        }
        self.readings.lock().unwrap().push(reading.clone());
        Ok(())
    }

    fn scan(&self, filter: &ReadingFilter) -> Result<Vec<Reading>, StoreError> {
        let mut rows: Vec<Reading> = self
            .readings
            .lock()
            .unwrap()
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(rows)
    }

    fn reading_count(&self) -> Result<u64, StoreError> {
        Ok(self.readings.lock().unwrap().len() as u64)
    }
}
