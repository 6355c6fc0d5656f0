//! Typed notification model.
//!
//! One [`Notification`] is a unit of telemetry: a prefix path, updated
//! (path, value) pairs, and deleted paths. Conversions from the wire
//! messages live here so nothing downstream touches [`crate::proto`].

use bytes::Bytes;
use serde::{Serialize, Serializer};
use std::fmt;

use rill_path::Path;

use crate::proto;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    /// Device timestamp, nanoseconds since the Unix epoch.
    pub timestamp_ns: i64,
    /// Prefix applied to every update and delete path.
    pub prefix: Path,
    pub updates: Vec<Update>,
    pub deletes: Vec<Path>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Update {
    pub path: Path,
    pub value: TelemetryValue,
}

/// A leaf value carried by an update.
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryValue {
    Json(serde_json::Value),
    Ascii(String),
    Bytes(Bytes),
    Proto(Bytes),
}

impl Serialize for TelemetryValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TelemetryValue::Json(v) => v.serialize(serializer),
            TelemetryValue::Ascii(s) => serializer.serialize_str(s),
            TelemetryValue::Bytes(b) | TelemetryValue::Proto(b) => {
                serializer.collect_seq(b.iter())
            }
        }
    }
}

#[derive(Debug)]
pub enum NotificationError {
    /// An update arrived without a path.
    MissingPath,
    /// An update arrived without a value.
    MissingValue { path: String },
    /// A JSON-encoded value failed to parse.
    BadJson { path: String, detail: String },
    /// The wire encoding enum held an unknown discriminant.
    UnknownEncoding { path: String, encoding: i32 },
}

impl fmt::Display for NotificationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingPath => write!(f, "update without a path"),
            Self::MissingValue { path } => write!(f, "update at {path} without a value"),
            Self::BadJson { path, detail } => {
                write!(f, "bad JSON value at {path}: {detail}")
            }
            Self::UnknownEncoding { path, encoding } => {
                write!(f, "unknown value encoding {encoding} at {path}")
            }
        }
    }
}

impl std::error::Error for NotificationError {}

fn typed_path(wire: Option<&proto::Path>) -> Path {
    match wire {
        Some(p) => Path::from_strings(p.element.iter().cloned()),
        None => Path::root(),
    }
}

fn typed_value(path: &Path, wire: proto::Value) -> Result<TelemetryValue, NotificationError> {
    match proto::Encoding::try_from(wire.r#type) {
        Ok(proto::Encoding::Json) => serde_json::from_slice(&wire.value)
            .map(TelemetryValue::Json)
            .map_err(|err| NotificationError::BadJson {
                path: path.to_string(),
                detail: err.to_string(),
            }),
        Ok(proto::Encoding::Ascii) => Ok(TelemetryValue::Ascii(
            String::from_utf8_lossy(&wire.value).into_owned(),
        )),
        Ok(proto::Encoding::Bytes) => Ok(TelemetryValue::Bytes(Bytes::from(wire.value))),
        Ok(proto::Encoding::Proto) => Ok(TelemetryValue::Proto(Bytes::from(wire.value))),
        Err(_) => Err(NotificationError::UnknownEncoding {
            path: path.to_string(),
            encoding: wire.r#type,
        }),
    }
}

impl TryFrom<proto::Notification> for Notification {
    type Error = NotificationError;

    fn try_from(wire: proto::Notification) -> Result<Notification, NotificationError> {
        let prefix = typed_path(wire.prefix.as_ref());
        let mut updates = Vec::with_capacity(wire.update.len());
        for update in wire.update {
            let path = typed_path(Some(
                update.path.as_ref().ok_or(NotificationError::MissingPath)?,
            ));
            let value = update.value.ok_or_else(|| NotificationError::MissingValue {
                path: path.to_string(),
            })?;
            let value = typed_value(&path, value)?;
            updates.push(Update { path, value });
        }
        let deletes = wire
            .delete
            .iter()
            .map(|p| typed_path(Some(p)))
            .collect();
        Ok(Notification {
            timestamp_ns: wire.timestamp,
            prefix,
            updates,
            deletes,
        })
    }
}

impl Notification {
    /// The fully resolved path of update `i`: prefix joined with the
    /// update's own path.
    pub fn resolved_update_path(&self, i: usize) -> Option<Path> {
        self.updates.get(i).map(|u| self.prefix.join(&u.path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire_path(parts: &[&str]) -> proto::Path {
        proto::Path {
            element: parts.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn json_value(v: serde_json::Value) -> proto::Value {
        proto::Value {
            value: serde_json::to_vec(&v).expect("test value should serialize"),
            r#type: proto::Encoding::Json as i32,
        }
    }

    #[test]
    fn converts_updates_and_deletes() {
        let wire = proto::Notification {
            timestamp: 1_700_000_000_000_000_000,
            prefix: Some(wire_path(&["interfaces", "Ethernet1"])),
            update: vec![proto::Update {
                path: Some(wire_path(&["counters", "inOctets"])),
                value: Some(json_value(serde_json::json!(42))),
            }],
            delete: vec![wire_path(&["counters", "stale"])],
        };
        let typed = Notification::try_from(wire).expect("conversion should succeed");
        assert_eq!(typed.prefix.to_string(), "/interfaces/Ethernet1");
        assert_eq!(typed.updates.len(), 1);
        assert_eq!(
            typed.updates[0].value,
            TelemetryValue::Json(serde_json::json!(42))
        );
        assert_eq!(
            typed.resolved_update_path(0).map(|p| p.to_string()),
            Some("/interfaces/Ethernet1/counters/inOctets".to_string())
        );
        assert_eq!(typed.deletes[0].to_string(), "/counters/stale");
    }

    #[test]
    fn missing_update_path_is_an_error() {
        let wire = proto::Notification {
            timestamp: 0,
            prefix: None,
            update: vec![proto::Update {
                path: None,
                value: Some(json_value(serde_json::json!(null))),
            }],
            delete: vec![],
        };
        assert!(matches!(
            Notification::try_from(wire),
            Err(NotificationError::MissingPath)
        ));
    }

    #[test]
    fn malformed_json_is_reported_with_path() {
        let wire = proto::Notification {
            timestamp: 0,
            prefix: None,
            update: vec![proto::Update {
                path: Some(wire_path(&["bad"])),
                value: Some(proto::Value {
                    value: b"{not json".to_vec(),
                    r#type: proto::Encoding::Json as i32,
                }),
            }],
            delete: vec![],
        };
        match Notification::try_from(wire) {
            Err(NotificationError::BadJson { path, .. }) => assert_eq!(path, "/bad"),
            other => panic!("expected BadJson, got {other:?}"),
        }
    }

    #[test]
    fn notification_serializes_as_json() {
        let n = Notification {
            timestamp_ns: 7,
            prefix: Path::from_strings(["intf"]),
            updates: vec![Update {
                path: Path::from_strings(["oper-status"]),
                value: TelemetryValue::Ascii("UP".into()),
            }],
            deletes: vec![],
        };
        let v = serde_json::to_value(&n).expect("should serialize");
        assert_eq!(v["prefix"], "/intf");
        assert_eq!(v["updates"][0]["value"], "UP");
    }
}
