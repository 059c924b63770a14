//! Aggregation of a computation's data messages by time series

use crate::message::{Message, Value};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::HashMap;

/// One point of a series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataPoint {
    #[serde(rename = "timestamp")]
    pub timestamp_ms: i64,
    pub value: Value,
}

/// Result of draining a computation
///
/// Serializes as `{"type": "data", "data": {tsid: [points]}}`, or as
/// `{"error": "..."}` when the computation could not be read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectResult {
    pub data: HashMap<String, Vec<DataPoint>>,
    pub error: Option<String>,
    /// Draining stopped at a deadline instead of at end of stream
    pub timed_out: bool,
}

impl CollectResult {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Points for one series, in arrival order
    pub fn series(&self, tsid: &str) -> Option<&[DataPoint]> {
        self.data.get(tsid).map(Vec::as_slice)
    }

    pub fn point_count(&self) -> usize {
        self.data.values().map(Vec::len).sum()
    }

    /// Fold one message in. Only data payloads touch the mapping.
    pub fn absorb(&mut self, message: Message) {
        match message {
            Message::Data(data) => {
                for payload in data.payloads {
                    self.data.entry(payload.tsid).or_default().push(DataPoint {
                        timestamp_ms: data.timestamp_ms,
                        value: payload.value,
                    });
                }
            }
            Message::Metadata(_) | Message::Other { .. } => {}
        }
    }
}

impl Serialize for CollectResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if let Some(error) = &self.error {
            let mut map = serializer.serialize_map(Some(1))?;
            map.serialize_entry("error", error)?;
            return map.end();
        }

        let mut map = serializer.serialize_map(Some(if self.timed_out { 3 } else { 2 }))?;
        map.serialize_entry("type", "data")?;
        map.serialize_entry("data", &self.data)?;
        if self.timed_out {
            map.serialize_entry("timed_out", &true)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{MetadataMessage, Payload};
    use serde_json::json;

    #[test]
    fn test_absorb_groups_by_tsid_in_arrival_order() {
        let mut result = CollectResult::default();
        result.absorb(Message::data(
            1000,
            vec![Payload::new("A", 1i64), Payload::new("B", 10i64)],
        ));
        result.absorb(Message::data(2000, vec![Payload::new("A", 2i64)]));
        result.absorb(Message::data(500, vec![Payload::new("A", 3i64)]));

        let a: Vec<i64> = result.series("A").unwrap().iter().map(|p| p.timestamp_ms).collect();
        assert_eq!(a, vec![1000, 2000, 500]);
        assert_eq!(result.series("B").unwrap().len(), 1);
        assert_eq!(result.point_count(), 4);
    }

    #[test]
    fn test_non_data_messages_ignored() {
        let mut result = CollectResult::default();
        result.absorb(Message::Metadata(MetadataMessage {
            tsid: "A".to_string(),
            properties: json!({"sf_metric": "cpu"}),
        }));
        result.absorb(Message::Other {
            kind: "event".to_string(),
            body: json!({}),
        });
        assert!(result.data.is_empty());
    }

    #[test]
    fn test_serialized_shape() {
        let mut result = CollectResult::default();
        result.absorb(Message::data(1000, vec![Payload::new("A", 1.5)]));
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"type": "data", "data": {"A": [{"timestamp": 1000, "value": 1.5}]}})
        );

        let error = CollectResult::error("computation is closed");
        assert_eq!(
            serde_json::to_value(&error).unwrap(),
            json!({"error": "computation is closed"})
        );
    }
}
