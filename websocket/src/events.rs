//! Frames pushed to WebSocket subscribers.

use serde::Serialize;
use srt_types::Reading;

/// Event name clients listen for.
pub const NEW_READING: &str = "NewReading";

/// Frame pushed to subscribers: `{"event": "...", "data": {...}}`.
#[derive(Debug, Serialize)]
pub struct FanoutEvent<'a, T: Serialize> {
    pub event: &'static str,
    pub data: &'a T,
}

impl<'a> FanoutEvent<'a, Reading> {
    pub fn new_reading(reading: &'a Reading) -> Self {
        Self {
            event: NEW_READING,
            data: reading,
        }
    }
}
