//! Messages delivered on a computation's stream

use serde::{Deserialize, Serialize};

/// A datapoint value as reported by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Long(i64),
    Double(f64),
    /// Anything the transport did not decode into a number
    Opaque(serde_json::Value),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Long(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            Value::Opaque(v) => v.as_f64(),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

/// One time series' value within a data message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub tsid: String,
    pub value: Value,
}

impl Payload {
    pub fn new(tsid: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            tsid: tsid.into(),
            value: value.into(),
        }
    }
}

/// Values for a set of series at one logical timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataMessage {
    /// Milliseconds since the Unix epoch
    pub timestamp_ms: i64,
    pub payloads: Vec<Payload>,
}

/// Describes a time series (metric name, dimensions, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataMessage {
    pub tsid: String,
    pub properties: serde_json::Value,
}

/// Anything a computation stream can deliver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    Data(DataMessage),
    Metadata(MetadataMessage),
    /// Control, event and info messages this layer does not interpret
    Other {
        kind: String,
        body: serde_json::Value,
    },
}

impl Message {
    pub fn data(timestamp_ms: i64, payloads: Vec<Payload>) -> Self {
        Message::Data(DataMessage {
            timestamp_ms,
            payloads,
        })
    }

    /// Short label used in log lines
    pub fn kind(&self) -> &str {
        match self {
            Message::Data(_) => "data",
            Message::Metadata(_) => "metadata",
            Message::Other { kind, .. } => kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_serializes_untagged() {
        assert_eq!(serde_json::to_value(Value::Long(3)).unwrap(), json!(3));
        assert_eq!(serde_json::to_value(Value::Double(1.5)).unwrap(), json!(1.5));
        assert_eq!(
            serde_json::to_value(Value::Opaque(json!("n/a"))).unwrap(),
            json!("n/a")
        );
    }

    #[test]
    fn test_value_as_f64() {
        assert_eq!(Value::Long(2).as_f64(), Some(2.0));
        assert_eq!(Value::Opaque(json!(null)).as_f64(), None);
    }

    #[test]
    fn test_message_kind() {
        assert_eq!(Message::data(0, vec![]).kind(), "data");
        let other = Message::Other {
            kind: "control-message".to_string(),
            body: json!({"event": "STREAM_START"}),
        };
        assert_eq!(other.kind(), "control-message");
    }

    #[test]
    fn test_message_json_tag() {
        let msg = Message::data(1000, vec![Payload::new("AAA", 1i64)]);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "data");
        assert_eq!(json["payloads"][0]["tsid"], "AAA");
    }
}
