//! Per-sensor dashboard summaries.

use chrono::{DateTime, Utc};
use serde::Serialize;
use srt_types::Reading;
use std::collections::BTreeMap;

/// Number of most recent readings averaged per sensor.
pub const DASHBOARD_WINDOW: usize = 100;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSensor {
    pub sensor_id: String,
    pub sensor_type: String,
    pub location: String,
    pub unit: String,
    pub last_value: f64,
    pub last_timestamp: DateTime<Utc>,
    /// Mean of the latest [`DASHBOARD_WINDOW`] values.
    pub average_value: f64,
}

/// Streaming dashboard aggregation over readings fed newest first.
///
/// Holds one bounded window per sensor, so memory grows with the number of
/// sensors rather than with the stored history.
#[derive(Default)]
pub struct DashboardBuilder {
    sensors: BTreeMap<String, SensorWindow>,
}

struct SensorWindow {
    latest: Reading,
    sum: f64,
    count: usize,
}

impl DashboardBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next reading, newest first.
    ///
    /// The first reading seen for a sensor is its latest unless a later one
    /// carries a strictly newer timestamp.
    pub fn push(&mut self, reading: &Reading) {
        if let Some(window) = self.sensors.get_mut(reading.sensor_id.as_str()) {
            if reading.timestamp > window.latest.timestamp {
                window.latest = reading.clone();
            }
            if window.count < DASHBOARD_WINDOW {
                window.sum += reading.value;
                window.count += 1;
            }
            return;
        }
        self.sensors.insert(
            reading.sensor_id.clone(),
            SensorWindow {
                latest: reading.clone(),
                sum: reading.value,
                count: 1,
            },
        );
    }

    /// One summary per sensor, ordered by sensor id.
    pub fn finish(self) -> Vec<DashboardSensor> {
        self.sensors
            .into_values()
            .map(|window| DashboardSensor {
                sensor_id: window.latest.sensor_id,
                sensor_type: window.latest.sensor_type,
                location: window.latest.location,
                unit: window.latest.unit,
                last_value: window.latest.value,
                last_timestamp: window.latest.timestamp,
                average_value: window.sum / window.count as f64,
            })
            .collect()
    }
}

/// Summarize readings per sensor id, ordered by sensor id.
///
/// Input must be in scan order (ascending timestamp, ties by insertion);
/// among readings with equal timestamps the later-inserted one is "latest".
pub fn summarize<'a, I>(readings: I) -> Vec<DashboardSensor>
where
    I: IntoIterator<Item = &'a Reading>,
{
    let mut newest_first: Vec<&Reading> = readings.into_iter().collect();
    newest_first.reverse();
    newest_first.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    let mut builder = DashboardBuilder::new();
    for reading in newest_first {
        builder.push(reading);
    }
    builder.finish()
}
