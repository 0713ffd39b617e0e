//! Reading filters, sort orders and page arithmetic.

use chrono::{DateTime, Utc};
use serde::Serialize;
use srt_types::Reading;
use std::cmp::Ordering;

/// Default page size when none is specified.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Maximum allowed page size.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Predicates over readings, combined with logical AND.
///
/// A `None` (or empty string) predicate is omitted entirely. Date bounds are
/// inclusive on both ends.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReadingFilter {
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub sensor_type: Option<String>,
    pub sensor_id: Option<String>,
}

impl ReadingFilter {
    pub fn from(mut self, date: DateTime<Utc>) -> Self {
        self.date_from = Some(date);
        self
    }

    pub fn to(mut self, date: DateTime<Utc>) -> Self {
        self.date_to = Some(date);
        self
    }

    pub fn sensor_type(mut self, sensor_type: impl Into<String>) -> Self {
        self.sensor_type = Some(sensor_type.into());
        self
    }

    pub fn sensor_id(mut self, sensor_id: impl Into<String>) -> Self {
        self.sensor_id = Some(sensor_id.into());
        self
    }

    pub fn matches(&self, reading: &Reading) -> bool {
        if let Some(from) = self.date_from {
            if reading.timestamp < from {
                return false;
            }
        }
        if let Some(to) = self.date_to {
            if reading.timestamp > to {
                return false;
            }
        }
        if let Some(t) = non_empty(&self.sensor_type) {
            if reading.sensor_type != t {
                return false;
            }
        }
        if let Some(id) = non_empty(&self.sensor_id) {
            if reading.sensor_id != id {
                return false;
            }
        }
        true
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Field a result set can be ordered by.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortField {
    #[default]
    Timestamp,
    SensorType,
    SensorId,
    Location,
    Value,
    Unit,
}

impl SortField {
    /// Lenient parse: case-insensitive, unknown names fall back to timestamp.
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "sensortype" | "sensor_type" => Self::SensorType,
            "sensorid" | "sensor_id" => Self::SensorId,
            "location" => Self::Location,
            "value" => Self::Value,
            "unit" => Self::Unit,
            _ => Self::Timestamp,
        }
    }

    fn compare(&self, a: &Reading, b: &Reading) -> Ordering {
        match self {
            Self::Timestamp => a.timestamp.cmp(&b.timestamp),
            Self::SensorType => a.sensor_type.cmp(&b.sensor_type),
            Self::SensorId => a.sensor_id.cmp(&b.sensor_id),
            Self::Location => a.location.cmp(&b.location),
            Self::Value => a.value.total_cmp(&b.value),
            Self::Unit => a.unit.cmp(&b.unit),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    /// `"asc"` (any case) is ascending; anything else is descending.
    pub fn parse(name: &str) -> Self {
        if name.eq_ignore_ascii_case("asc") {
            Self::Asc
        } else {
            Self::Desc
        }
    }
}

/// Sort specification. Defaults to descending timestamp.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SortOrder {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortOrder {
    pub fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }

    /// Stable sort, so equal keys keep their scan order.
    pub fn apply(&self, readings: &mut [Reading]) {
        readings.sort_by(|a, b| {
            let ord = self.field.compare(a, b);
            match self.direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            }
        });
    }
}

/// A filtered, sorted, paginated read.
#[derive(Clone, Debug, PartialEq)]
pub struct ReadingQuery {
    pub filter: ReadingFilter,
    pub sort: SortOrder,
    /// 1-indexed page number.
    pub page: u32,
    pub page_size: u32,
}

impl Default for ReadingQuery {
    fn default() -> Self {
        Self {
            filter: ReadingFilter::default(),
            sort: SortOrder::default(),
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ReadingQuery {
    pub fn new(filter: ReadingFilter) -> Self {
        Self {
            filter,
            ..Default::default()
        }
    }

    pub fn sorted(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    pub fn page(mut self, page: u32, page_size: u32) -> Self {
        self.page = page;
        self.page_size = page_size;
        self
    }

    /// Page number, with 0 treated as the first page.
    pub fn effective_page(&self) -> u32 {
        self.page.max(1)
    }

    /// Page size clamped to [1, MAX_PAGE_SIZE].
    pub fn effective_page_size(&self) -> u32 {
        self.page_size.clamp(1, MAX_PAGE_SIZE)
    }

    /// Sort `matching` and cut out the requested page.
    ///
    /// `matching` must already satisfy the filter; its length is the total count.
    pub fn paginate(&self, mut matching: Vec<Reading>) -> Page<Reading> {
        self.sort.apply(&mut matching);
        Page::slice(matching, self.effective_page(), self.effective_page_size())
    }
}

/// One page of results plus the total number of matching entries.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total_count: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

impl<T> Page<T> {
    /// Take items `[(page-1)*page_size, page*page_size)` of an ordered list.
    pub fn slice(all: Vec<T>, page: u32, page_size: u32) -> Self {
        let total = all.len();
        let size = page_size.max(1) as usize;
        let start = (page.max(1) as usize - 1).saturating_mul(size);
        let data: Vec<T> = if start >= total {
            Vec::new()
        } else {
            all.into_iter().skip(start).take(size).collect()
        };
        Self {
            data,
            total_count: total as u64,
            page,
            page_size,
            total_pages: total.div_ceil(size) as u32,
        }
    }
}
