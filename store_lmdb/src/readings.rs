//! LMDB implementation of TelemetryStore.
//!
//! Key layout: `[timestamp millis (8, BE, sign bit flipped)][sequence (8, BE)]`.
//! Flipping the sign bit makes pre-epoch instants sort before post-epoch ones,
//! so a date range maps onto a contiguous key range. The sequence is the
//! database length at insert time, which breaks timestamp ties in insertion
//! order.

use std::ops::Bound;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use heed::types::Bytes;
use heed::{Database, Env};

use srt_store::{DashboardBuilder, DashboardSensor, ReadingFilter, StoreError, TelemetryStore};
use srt_types::Reading;

use crate::LmdbError;

const KEY_LEN: usize = 16;

pub struct LmdbTelemetryStore {
    pub(crate) env: Arc<Env>,
    pub(crate) readings_db: Database<Bytes, Bytes>,
}

fn millis_prefix(ts: &DateTime<Utc>) -> [u8; 8] {
    ((ts.timestamp_millis() as u64) ^ (1 << 63)).to_be_bytes()
}

fn reading_key(ts: &DateTime<Utc>, seq: u64) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    key[..8].copy_from_slice(&millis_prefix(ts));
    key[8..].copy_from_slice(&seq.to_be_bytes());
    key
}

impl LmdbTelemetryStore {
    fn insert_inner(&self, reading: &Reading) -> Result<(), LmdbError> {
        let value = bincode::serialize(reading)?;
        let mut wtxn = self.env.write_txn()?;
        let seq = self.readings_db.len(&wtxn)?;
        let key = reading_key(&reading.timestamp, seq);
        self.readings_db.put(&mut wtxn, &key, &value)?;
        wtxn.commit()?;
        Ok(())
    }

    fn scan_inner(&self, filter: &ReadingFilter) -> Result<Vec<Reading>, LmdbError> {
        let lower = filter.date_from.as_ref().map(|ts| reading_key(ts, 0));
        let upper = filter.date_to.as_ref().map(|ts| reading_key(ts, u64::MAX));
        let bounds = (
            lower
                .as_ref()
                .map_or(Bound::Unbounded, |k| Bound::Included(k.as_slice())),
            upper
                .as_ref()
                .map_or(Bound::Unbounded, |k| Bound::Included(k.as_slice())),
        );

        let rtxn = self.env.read_txn()?;
        let iter = self.readings_db.range(&rtxn, &bounds)?;
        let mut readings = Vec::new();
        for result in iter {
            let (key, val) = result?;
            if key.len() != KEY_LEN {
                return Err(LmdbError::CorruptKey(format!(
                    "expected {KEY_LEN} bytes, found {}",
                    key.len()
                )));
            }
            let reading: Reading = bincode::deserialize(val)?;
            // Keys carry millisecond precision; the filter is exact.
            if filter.matches(&reading) {
                readings.push(reading);
            }
        }
        Ok(readings)
    }

    /// Walk the keys newest first and fold each reading into its sensor's
    /// window; nothing beyond the windows is held in memory.
    fn dashboard_inner(&self) -> Result<Vec<DashboardSensor>, LmdbError> {
        let rtxn = self.env.read_txn()?;
        let mut builder = DashboardBuilder::new();
        for result in self.readings_db.rev_iter(&rtxn)? {
            let (_, val) = result?;
            let reading: Reading = bincode::deserialize(val)?;
            builder.push(&reading);
        }
        Ok(builder.finish())
    }
}

impl TelemetryStore for LmdbTelemetryStore {
    fn insert(&self, reading: &Reading) -> Result<(), StoreError> {
        self.insert_inner(reading).map_err(|e| {
            tracing::error!(sensor_id = %reading.sensor_id, error = %e, "failed to persist reading");
            StoreError::from(e)
        })
    }

    fn scan(&self, filter: &ReadingFilter) -> Result<Vec<Reading>, StoreError> {
        self.scan_inner(filter).map_err(|e| {
            tracing::error!(error = %e, "failed to scan readings");
            StoreError::from(e)
        })
    }

    fn dashboard(&self) -> Result<Vec<DashboardSensor>, StoreError> {
        self.dashboard_inner().map_err(|e| {
            tracing::error!(error = %e, "failed to build dashboard");
            StoreError::from(e)
        })
    }

    fn reading_count(&self) -> Result<u64, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let count = self.readings_db.len(&rtxn).map_err(LmdbError::from)?;
        Ok(count)
    }
}
