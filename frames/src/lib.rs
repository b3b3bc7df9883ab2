//! Wire model and protobuf codec for the map sync channel.
//!
//! A [`Frame`] carries one snapshot on one [`Topic`]. The controller publishes
//! full `AppState` snapshots on [`Topic::State`]; the display publishes its
//! visible rectangle on [`Topic::Viewport`]. Payloads stay as
//! `serde_json::Value` so this crate does not depend on the map model, and
//! are encoded as `google.protobuf.Value` for a compact binary form that can
//! cross a process boundary.

use prost::Message;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Largest encoded frame accepted from a peer. A 200x200 fog grid with a few
/// hundred drawings stays well below this.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Error returned by [`decode_frame`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The raw bytes could not be decoded as a protobuf `WireFrame`.
    #[error("failed to decode protobuf frame: {0}")]
    Decode(#[from] prost::DecodeError),
    /// The `topic` integer on the wire does not name a known [`Topic`].
    #[error("unknown frame topic: {0}")]
    UnknownTopic(i32),
}

/// One-directional broadcast topic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    /// Controller to display: the full authoritative state.
    State,
    /// Display to controller: the map-space rectangle the display shows.
    Viewport,
}

impl Topic {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        match self {
            Self::State => WireTopic::State as i32,
            Self::Viewport => WireTopic::Viewport as i32,
        }
    }

    fn from_i32(value: i32) -> Result<Self, CodecError> {
        match WireTopic::try_from(value) {
            Ok(WireTopic::State) => Ok(Self::State),
            Ok(WireTopic::Viewport) => Ok(Self::Viewport),
            Err(_) => Err(CodecError::UnknownTopic(value)),
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::State => "state",
            Self::Viewport => "viewport",
        }
    }
}

/// A single snapshot on the sync channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Unique identifier for this frame (UUID string).
    pub id: String,
    /// Per-topic publish counter. Receivers apply a frame only if its `seq`
    /// is newer than the last one they applied.
    pub seq: u64,
    /// Milliseconds since the Unix epoch when the frame was created.
    pub ts: i64,
    pub topic: Topic,
    /// Snapshot payload.
    pub data: Value,
}

impl Frame {
    /// Whether this frame should replace a replica last updated at `last_seq`.
    #[must_use]
    pub fn supersedes(&self, last_seq: Option<u64>) -> bool {
        last_seq.is_none_or(|last| self.seq > last)
    }
}

/// Encode a frame into protobuf bytes.
#[must_use]
pub fn encode_frame(frame: &Frame) -> Vec<u8> {
    let wire = WireFrame {
        id: frame.id.clone(),
        seq: frame.seq,
        ts: frame.ts,
        topic: frame.topic.as_i32(),
        data: Some(json_to_proto_value(&frame.data)),
    };
    wire.encode_to_vec()
}

/// Decode protobuf bytes into a frame.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] for malformed bytes and
/// [`CodecError::UnknownTopic`] for topic values this build does not know.
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, CodecError> {
    let wire = WireFrame::decode(bytes)?;
    Ok(Frame {
        id: wire.id,
        seq: wire.seq,
        ts: wire.ts,
        topic: Topic::from_i32(wire.topic)?,
        data: wire.data.map_or(Value::Object(Map::new()), |v| proto_to_json_value(&v)),
    })
}

fn json_to_proto_value(value: &Value) -> prost_types::Value {
    use prost_types::value::Kind;

    let kind = match value {
        Value::Null => Kind::NullValue(prost_types::NullValue::NullValue as i32),
        Value::Bool(v) => Kind::BoolValue(*v),
        Value::Number(v) => Kind::NumberValue(v.as_f64().unwrap_or(0.0)),
        Value::String(v) => Kind::StringValue(v.clone()),
        Value::Array(v) => Kind::ListValue(prost_types::ListValue { values: v.iter().map(json_to_proto_value).collect() }),
        Value::Object(v) => Kind::StructValue(prost_types::Struct {
            fields: v.iter().map(|(k, v)| (k.clone(), json_to_proto_value(v))).collect(),
        }),
    };
    prost_types::Value { kind: Some(kind) }
}

/// Inverse of [`json_to_proto_value`]. Protobuf numbers are all doubles, so
/// whole values come back as JSON integers to keep `u32`/`usize` fields
/// deserializable on the far side.
fn proto_to_json_value(value: &prost_types::Value) -> Value {
    use prost_types::value::Kind;

    let Some(kind) = &value.kind else {
        return Value::Null;
    };
    match kind {
        Kind::NullValue(_) => Value::Null,
        Kind::NumberValue(v) => number_to_json(*v),
        Kind::StringValue(v) => Value::String(v.clone()),
        Kind::BoolValue(v) => Value::Bool(*v),
        Kind::StructValue(v) => {
            Value::Object(v.fields.iter().map(|(k, v)| (k.clone(), proto_to_json_value(v))).collect())
        }
        Kind::ListValue(v) => Value::Array(v.values.iter().map(proto_to_json_value).collect()),
    }
}

/// Largest magnitude at which every integer is exactly representable in f64.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

#[allow(clippy::cast_possible_truncation)]
fn number_to_json(v: f64) -> Value {
    if v.fract() == 0.0 && v.abs() <= MAX_SAFE_INTEGER {
        return Value::from(v as i64);
    }
    serde_json::Number::from_f64(v).map_or(Value::Null, Value::Number)
}

#[derive(Clone, PartialEq, Message)]
struct WireFrame {
    #[prost(string, tag = "1")]
    id: String,
    #[prost(uint64, tag = "2")]
    seq: u64,
    #[prost(int64, tag = "3")]
    ts: i64,
    #[prost(enumeration = "WireTopic", tag = "4")]
    topic: i32,
    #[prost(message, optional, tag = "5")]
    data: Option<prost_types::Value>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, prost::Enumeration)]
#[repr(i32)]
enum WireTopic {
    State = 0,
    Viewport = 1,
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
