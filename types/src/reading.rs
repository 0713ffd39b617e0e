//! Sensor readings and inbound telemetry parsing.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::ParseError;

/// One timestamped sensor observation.
///
/// Created once from a validated inbound message and never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub sensor_type: String,
    pub sensor_id: String,
    pub location: String,
    pub value: f64,
    pub unit: String,
    pub timestamp: DateTime<Utc>,
}

/// Wire shape of a telemetry message as published by sensor nodes.
///
/// Property names are matched case-insensitively (`sensorType`,
/// `SensorType`, `sensortype`): keys are folded to lowercase before this
/// struct is deserialized. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
struct InboundMessage {
    #[serde(rename = "sensortype")]
    sensor_type: String,
    #[serde(rename = "sensorid")]
    sensor_id: String,
    location: String,
    value: f64,
    unit: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    timestamp: DateTime<Utc>,
}

impl Reading {
    /// Parse and validate a raw broker payload.
    pub fn from_json(payload: &[u8]) -> Result<Self, ParseError> {
        let object: Map<String, Value> = serde_json::from_slice(payload)?;
        let folded = object
            .into_iter()
            .map(|(key, value)| (key.to_ascii_lowercase(), value))
            .collect();
        let msg: InboundMessage = serde_json::from_value(Value::Object(folded))?;
        if msg.sensor_type.trim().is_empty() {
            return Err(ParseError::EmptyField("sensorType"));
        }
        if msg.sensor_id.trim().is_empty() {
            return Err(ParseError::EmptyField("sensorId"));
        }
        if !msg.value.is_finite() {
            return Err(ParseError::NonFiniteValue);
        }
        Ok(Self {
            sensor_type: msg.sensor_type,
            sensor_id: msg.sensor_id,
            location: msg.location,
            value: msg.value,
            unit: msg.unit,
            timestamp: msg.timestamp,
        })
    }
}

/// Parse an ISO-8601 instant.
///
/// Accepts RFC 3339 with an offset, an offset-less date-time (taken as UTC),
/// or a bare date (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(raw: &str) -> DateTime<Utc> {
        parse_timestamp(raw).unwrap()
    }

    #[test]
    fn parses_camel_case_message() {
        let payload = r#"{
            "sensorType": "TEMP",
            "sensorId": "TEMP-1",
            "location": "Room",
            "value": 21.5,
            "unit": "°C",
            "timestamp": "2024-01-01T00:00:00Z"
        }"#;
        let reading = Reading::from_json(payload.as_bytes()).unwrap();
        assert_eq!(reading.sensor_type, "TEMP");
        assert_eq!(reading.sensor_id, "TEMP-1");
        assert_eq!(reading.location, "Room");
        assert_eq!(reading.value, 21.5);
        assert_eq!(reading.unit, "°C");
        assert_eq!(reading.timestamp, ts("2024-01-01T00:00:00Z"));
    }

    #[test]
    fn parses_pascal_case_message_with_naive_timestamp() {
        let payload = br#"{"SensorType":"HUM","SensorId":"HUM-2","Location":"Attic",
            "Value":40,"Unit":"%","Timestamp":"2024-03-05T10:11:12.1234567"}"#;
        let reading = Reading::from_json(payload).unwrap();
        assert_eq!(reading.sensor_id, "HUM-2");
        assert_eq!(reading.value, 40.0);
        assert_eq!(reading.timestamp, ts("2024-03-05T10:11:12.1234567Z"));
    }

    #[test]
    fn property_names_ignore_case() {
        let payload = br#"{"SENSORTYPE":"CO2","sensorid":"CO2-7","LoCaTiOn":"Hall",
            "value":415,"UNIT":"ppm","timeStamp":"2024-01-01T00:00:00Z"}"#;
        let reading = Reading::from_json(payload).unwrap();
        assert_eq!(reading.sensor_type, "CO2");
        assert_eq!(reading.sensor_id, "CO2-7");
        assert_eq!(reading.location, "Hall");
        assert_eq!(reading.unit, "ppm");
    }

    #[test]
    fn json_array_is_rejected() {
        assert!(matches!(Reading::from_json(b"[1,2,3]"), Err(ParseError::Json(_))));
    }

    #[test]
    fn extra_fields_are_ignored() {
        let payload = br#"{"sensorType":"TEMP","sensorId":"T","location":"L","value":1,
            "unit":"C","timestamp":"2024-01-01T00:00:00Z","battery":97}"#;
        assert!(Reading::from_json(payload).is_ok());
    }

    #[test]
    fn missing_field_is_a_parse_error() {
        let payload = br#"{"sensorType":"TEMP","sensorId":"T","location":"L","unit":"C",
            "timestamp":"2024-01-01T00:00:00Z"}"#;
        assert!(matches!(
            Reading::from_json(payload),
            Err(ParseError::Json(_))
        ));
    }

    #[test]
    fn wrong_type_is_a_parse_error() {
        let payload = br#"{"sensorType":"TEMP","sensorId":"T","location":"L","value":"hot",
            "unit":"C","timestamp":"2024-01-01T00:00:00Z"}"#;
        assert!(Reading::from_json(payload).is_err());
    }

    #[test]
    fn bad_timestamp_is_a_parse_error() {
        let payload = br#"{"sensorType":"TEMP","sensorId":"T","location":"L","value":1,
            "unit":"C","timestamp":"yesterday"}"#;
        assert!(Reading::from_json(payload).is_err());
    }

    #[test]
    fn empty_sensor_id_is_rejected() {
        let payload = br#"{"sensorType":"TEMP","sensorId":"  ","location":"L","value":1,
            "unit":"C","timestamp":"2024-01-01T00:00:00Z"}"#;
        assert!(matches!(
            Reading::from_json(payload),
            Err(ParseError::EmptyField("sensorId"))
        ));
    }

    #[test]
    fn non_json_is_rejected() {
        assert!(Reading::from_json(b"not json").is_err());
    }

    #[test]
    fn timestamp_forms() {
        assert_eq!(ts("2024-01-01"), ts("2024-01-01T00:00:00Z"));
        assert_eq!(ts("2024-01-01T02:00:00+02:00"), ts("2024-01-01T00:00:00Z"));
        assert!(parse_timestamp("01/01/2024").is_none());
    }

    #[test]
    fn outbound_json_is_camel_case() {
        let reading = Reading {
            sensor_type: "TEMP".into(),
            sensor_id: "TEMP-1".into(),
            location: "Room".into(),
            value: 21.5,
            unit: "C".into(),
            timestamp: ts("2024-01-01T00:00:00Z"),
        };
        let json = serde_json::to_value(&reading).unwrap();
        assert_eq!(json["sensorType"], "TEMP");
        assert_eq!(json["sensorId"], "TEMP-1");
        assert_eq!(json["timestamp"], "2024-01-01T00:00:00Z");
    }
}
