//! # Companion Sync Channel
//!
//! Types for the push-based key/value channel between the watch and its
//! companion device, the client seam the engine drives, and the listener that
//! turns `/weather` pushes into a [`WeatherSnapshot`].
//!
//! ## Payload Contract
//!
//! ### Consumed: `/weather`
//! | Key | Type | Example |
//! |---|---|---|
//! | `weather-id` | int | `800` |
//! | `high-temp` | string | `"75°"` |
//! | `low-temp` | string | `"60°"` |
//!
//! The icon is resolved on the watch from `weather-id`; no image asset is sent.
//!
//! ### Produced: `/request-weather`
//! | Key | Type |
//! |---|---|
//! | `Time` | long, epoch millis |
//!
//! Marked urgent so the companion delivers it without batching.
//!
//! ## Validation
//! A `/weather` item with a missing key, a value of the wrong type or an empty
//! temperature label is rejected with [`PayloadError`]. The previous snapshot
//! stays in place and a warning is logged.

use crate::WeatherSnapshot;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

pub const WEATHER_PATH: &str = "/weather";
pub const WEATHER_REQUEST_PATH: &str = "/request-weather";

pub const WEATHER_ID_KEY: &str = "weather-id";
pub const HIGH_TEMP_KEY: &str = "high-temp";
pub const LOW_TEMP_KEY: &str = "low-temp";
pub const REQUEST_TIME_KEY: &str = "Time";

/// Errors from validating a `/weather` data map.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PayloadError {
    #[error("missing key {0:?}")]
    MissingKey(&'static str),

    #[error("key {key:?} is not {expected}")]
    WrongType {
        key: &'static str,
        expected: &'static str,
    },

    #[error("key {0:?} is empty")]
    EmptyLabel(&'static str),
}

/// A single typed value in a data map.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataValue {
    Int(i32),
    Long(i64),
    String(String),
}

/// Key/value payload of one data item.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataMap(BTreeMap<String, DataValue>);

impl DataMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_int(&mut self, key: &str, value: i32) -> &mut Self {
        self.0.insert(key.to_string(), DataValue::Int(value));
        self
    }

    pub fn put_long(&mut self, key: &str, value: i64) -> &mut Self {
        self.0.insert(key.to_string(), DataValue::Long(value));
        self
    }

    pub fn put_string(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        self.0.insert(key.to_string(), DataValue::String(value.into()));
        self
    }

    pub fn get_int(&self, key: &'static str) -> Result<i32, PayloadError> {
        match self.0.get(key) {
            Some(DataValue::Int(v)) => Ok(*v),
            Some(_) => Err(PayloadError::WrongType { key, expected: "an int" }),
            None => Err(PayloadError::MissingKey(key)),
        }
    }

    pub fn get_long(&self, key: &'static str) -> Result<i64, PayloadError> {
        match self.0.get(key) {
            Some(DataValue::Long(v)) => Ok(*v),
            Some(_) => Err(PayloadError::WrongType { key, expected: "a long" }),
            None => Err(PayloadError::MissingKey(key)),
        }
    }

    pub fn get_string(&self, key: &'static str) -> Result<&str, PayloadError> {
        match self.0.get(key) {
            Some(DataValue::String(v)) => Ok(v.as_str()),
            Some(_) => Err(PayloadError::WrongType { key, expected: "a string" }),
            None => Err(PayloadError::MissingKey(key)),
        }
    }
}

/// A path plus its payload, as stored on the channel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataItem {
    pub path: String,
    pub data: DataMap,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataEventKind {
    Changed,
    Deleted,
}

/// One entry of a pushed batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataEvent {
    pub kind: DataEventKind,
    pub item: DataItem,
}

impl DataEvent {
    pub fn changed(item: DataItem) -> Self {
        DataEvent {
            kind: DataEventKind::Changed,
            item,
        }
    }
}

/// An outgoing item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutDataRequest {
    pub item: DataItem,
    pub urgent: bool,
}

/// The daily refresh request sent to the companion.
pub fn weather_request(now_millis: i64) -> PutDataRequest {
    let mut data = DataMap::new();
    data.put_long(REQUEST_TIME_KEY, now_millis);
    PutDataRequest {
        item: DataItem {
            path: WEATHER_REQUEST_PATH.to_string(),
            data,
        },
        urgent: true,
    }
}

/// A validated `/weather` payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WeatherPayload {
    pub condition_code: i32,
    pub high: String,
    pub low: String,
}

impl WeatherPayload {
    pub fn from_data_map(data: &DataMap) -> Result<Self, PayloadError> {
        let condition_code = data.get_int(WEATHER_ID_KEY)?;
        let high = non_empty(data, HIGH_TEMP_KEY)?;
        let low = non_empty(data, LOW_TEMP_KEY)?;
        Ok(WeatherPayload {
            condition_code,
            high,
            low,
        })
    }

    pub fn to_data_map(&self) -> DataMap {
        let mut data = DataMap::new();
        data.put_int(WEATHER_ID_KEY, self.condition_code)
            .put_string(HIGH_TEMP_KEY, self.high.clone())
            .put_string(LOW_TEMP_KEY, self.low.clone());
        data
    }

    pub fn into_snapshot(self) -> WeatherSnapshot {
        WeatherSnapshot::new(self.condition_code, self.high, self.low)
    }
}

fn non_empty(data: &DataMap, key: &'static str) -> Result<String, PayloadError> {
    let value = data.get_string(key)?;
    if value.trim().is_empty() {
        return Err(PayloadError::EmptyLabel(key));
    }
    Ok(value.to_string())
}

/// Apply a pushed batch to the cached snapshot.
///
/// Only `Changed` events on [`WEATHER_PATH`] are considered; each valid one
/// replaces the snapshot, so the last valid item of the batch wins. Returns
/// true when the snapshot changed and the face needs a redraw.
pub fn apply_data_events(events: &[DataEvent], cache: &mut Option<WeatherSnapshot>) -> bool {
    let mut updated = false;
    for event in events {
        if event.kind != DataEventKind::Changed || event.item.path != WEATHER_PATH {
            debug!("ignoring {:?} on {}", event.kind, event.item.path);
            continue;
        }
        match WeatherPayload::from_data_map(&event.item.data) {
            Ok(payload) => {
                let snapshot = payload.into_snapshot();
                info!(
                    "weather updated: code {} ({}) high {} low {}",
                    snapshot.condition_code,
                    snapshot.icon.name(),
                    snapshot.high,
                    snapshot.low
                );
                *cache = Some(snapshot);
                updated = true;
            }
            Err(e) => warn!("rejected weather payload, keeping last snapshot: {}", e),
        }
    }
    updated
}

/// The sync transport, as seen by the engine.
///
/// Every call returns immediately. Connection outcomes arrive later as
/// `Connected` / `ConnectionFailed` engine events; pushes arrive as
/// `DataChanged` while a listener is registered.
pub trait DataClient {
    /// Start connecting. No-op while connecting or connected.
    fn connect(&mut self);

    fn disconnect(&mut self);

    fn is_connected(&self) -> bool;

    fn add_listener(&mut self);

    fn remove_listener(&mut self);

    /// Fire-and-forget; failures are logged by the transport.
    fn put_data_item(&mut self, request: PutDataRequest);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WeatherIcon;

    fn weather_item(code: i32, high: &str, low: &str) -> DataItem {
        DataItem {
            path: WEATHER_PATH.to_string(),
            data: WeatherPayload {
                condition_code: code,
                high: high.to_string(),
                low: low.to_string(),
            }
            .to_data_map(),
        }
    }

    #[test]
    fn test_valid_push_replaces_snapshot() {
        let mut cache = None;
        let updated = apply_data_events(&[DataEvent::changed(weather_item(800, "75°", "60°"))], &mut cache);

        assert!(updated);
        let snapshot = cache.unwrap();
        assert_eq!(snapshot.icon, WeatherIcon::Clear);
        assert_eq!(snapshot.high, "75°");
        assert_eq!(snapshot.low, "60°");
        let bitmap = snapshot.bitmap.unwrap();
        assert_eq!((bitmap.width(), bitmap.height()), (crate::ICON_SIZE, crate::ICON_SIZE));
    }

    #[test]
    fn test_last_write_wins_within_batch() {
        let mut cache = None;
        let events = [
            DataEvent::changed(weather_item(800, "75°", "60°")),
            DataEvent::changed(weather_item(502, "61°", "50°")),
        ];
        apply_data_events(&events, &mut cache);
        let snapshot = cache.unwrap();
        assert_eq!(snapshot.condition_code, 502);
        assert_eq!(snapshot.icon, WeatherIcon::Rain);
    }

    #[test]
    fn test_other_paths_and_deletes_are_ignored() {
        let mut cache = Some(WeatherSnapshot::new(800, "75°", "60°"));
        let mut other = weather_item(200, "1", "2");
        other.path = "/settings".to_string();
        let deleted = DataEvent {
            kind: DataEventKind::Deleted,
            item: weather_item(200, "1", "2"),
        };

        let updated = apply_data_events(&[DataEvent::changed(other), deleted], &mut cache);
        assert!(!updated);
        assert_eq!(cache.unwrap().condition_code, 800);
    }

    #[test]
    fn test_malformed_payload_keeps_previous_snapshot() {
        let mut cache = Some(WeatherSnapshot::new(800, "75°", "60°"));

        let mut missing = DataMap::new();
        missing.put_int(WEATHER_ID_KEY, 500).put_string(HIGH_TEMP_KEY, "70°");
        let mut wrong_type = DataMap::new();
        wrong_type
            .put_string(WEATHER_ID_KEY, "500")
            .put_string(HIGH_TEMP_KEY, "70°")
            .put_string(LOW_TEMP_KEY, "65°");

        let events: Vec<DataEvent> = [missing, wrong_type]
            .into_iter()
            .map(|data| {
                DataEvent::changed(DataItem {
                    path: WEATHER_PATH.to_string(),
                    data,
                })
            })
            .collect();

        assert!(!apply_data_events(&events, &mut cache));
        assert_eq!(cache.unwrap().condition_code, 800);
    }

    #[test]
    fn test_payload_errors() {
        let mut data = DataMap::new();
        assert_eq!(
            WeatherPayload::from_data_map(&data),
            Err(PayloadError::MissingKey(WEATHER_ID_KEY))
        );

        data.put_int(WEATHER_ID_KEY, 800)
            .put_string(HIGH_TEMP_KEY, " ")
            .put_string(LOW_TEMP_KEY, "60°");
        assert_eq!(
            WeatherPayload::from_data_map(&data),
            Err(PayloadError::EmptyLabel(HIGH_TEMP_KEY))
        );

        data.put_long(HIGH_TEMP_KEY, 75);
        assert!(matches!(
            WeatherPayload::from_data_map(&data),
            Err(PayloadError::WrongType { key: HIGH_TEMP_KEY, .. })
        ));
    }

    #[test]
    fn test_unknown_code_is_accepted_without_bitmap() {
        let mut cache = None;
        apply_data_events(&[DataEvent::changed(weather_item(999, "1°", "0°"))], &mut cache);
        let snapshot = cache.unwrap();
        assert_eq!(snapshot.icon, WeatherIcon::Unknown);
        assert!(snapshot.bitmap.is_none());
        assert!(snapshot.has_temperatures());
    }

    #[test]
    fn test_weather_request_shape() {
        let request = weather_request(1_700_000_000_123);
        assert!(request.urgent);
        assert_eq!(request.item.path, WEATHER_REQUEST_PATH);
        assert_eq!(request.item.data.get_long(REQUEST_TIME_KEY), Ok(1_700_000_000_123));
    }

    #[test]
    fn test_data_item_json_shape() {
        let item = weather_item(800, "75°", "60°");
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["path"], "/weather");
        assert_eq!(json["data"]["weather-id"]["int"], 800);
        assert_eq!(json["data"]["high-temp"]["string"], "75°");
    }
}
