//! Stored record and derived row types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default partition holding device samples.
pub const IOT_PARTITION: &str = "iot-data/";

/// Default partition holding SMHI station samples.
pub const WEATHER_PARTITION: &str = "shmi-data/";

/// One temperature sample, as persisted in the object store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Originating device, or `SMHI-{station}` for weather samples.
    #[serde(default, alias = "deviceId")]
    pub device_id: String,
    /// Temperature in degrees Celsius.
    pub temperature: f64,
    #[serde(default)]
    pub humidity: Option<f64>,
    /// Milliseconds since epoch when written by this service. Records from
    /// other producers may carry seconds.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Storage address of one record: partition prefix plus a unique sub-path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordKey(String);

impl RecordKey {
    /// Wrap a key exactly as listed by the store.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// `{partition}{source}/{timestamp}.json`.
    pub fn for_source(partition: &str, source: &str, timestamp_ms: i64) -> Self {
        Self(format!("{}{}/{}.json", partition, source, timestamp_ms))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RecordKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One IoT sample compared against the latest weather sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonRow {
    pub timestamp: i64,
    pub iot_temperature: f64,
    pub smhi_temperature: Option<f64>,
    pub difference: Option<f64>,
}

/// One IoT sample paired with the weather sample at the same index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedRow {
    pub timestamp: i64,
    pub iot_temperature: f64,
    pub smhi_temperature: Option<f64>,
}

/// A stored document returned verbatim with its key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub key: RecordKey,
    pub data: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_key_for_source() {
        let key = RecordKey::for_source(WEATHER_PARTITION, "72420", 1_700_000_000_000);
        assert_eq!(key.as_str(), "shmi-data/72420/1700000000000.json");
    }

    #[test]
    fn test_observation_wire_format() {
        let obs = Observation {
            device_id: "SMHI-72420".into(),
            temperature: 4.5,
            humidity: None,
            timestamp: 1_700_000_000_000,
            location: Some("Göteborg A".into()),
        };
        let value = serde_json::to_value(&obs).unwrap();
        assert_eq!(
            value,
            json!({
                "device_id": "SMHI-72420",
                "temperature": 4.5,
                "humidity": null,
                "timestamp": 1_700_000_000_000_i64,
                "location": "Göteborg A",
            })
        );
    }

    #[test]
    fn test_device_payload_without_location() {
        let obs: Observation = serde_json::from_str(
            r#"{"device_id":"deviceMAC","temperature":23.41,"humidity":51.2,"timestamp":61234}"#,
        )
        .unwrap();
        assert_eq!(obs.device_id, "deviceMAC");
        assert_eq!(obs.humidity, Some(51.2));
        assert_eq!(obs.location, None);
    }

    #[test]
    fn test_camel_case_device_id_accepted() {
        let obs: Observation =
            serde_json::from_str(r#"{"deviceId":"d1","temperature":1.0,"timestamp":5}"#).unwrap();
        assert_eq!(obs.device_id, "d1");
    }

    #[test]
    fn test_missing_temperature_rejected() {
        let result = serde_json::from_str::<Observation>(r#"{"device_id":"d1","timestamp":5}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_rows_serialize_camel_case() {
        let row = ComparisonRow {
            timestamp: 100,
            iot_temperature: 20.0,
            smhi_temperature: None,
            difference: None,
        };
        let json = serde_json::to_string(&row).unwrap();
        assert!(json.contains("\"iotTemperature\":20.0"));
        assert!(json.contains("\"smhiTemperature\":null"));
        assert!(json.contains("\"difference\":null"));

        let combined = CombinedRow {
            timestamp: 100,
            iot_temperature: 20.0,
            smhi_temperature: Some(18.0),
        };
        let json = serde_json::to_value(&combined).unwrap();
        assert_eq!(json["smhiTemperature"], 18.0);
    }
}
