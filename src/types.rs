//! Core ledger types for the a3s-ledger system
//!
//! The persisted record layout uses snake_case field names; it is the
//! on-disk contract and must stay stable.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel `prev_hash` of the first record in a chain
pub const GENESIS: &str = "GENESIS";

/// Opaque event data carried by a record
///
/// The ledger never interprets it; it only hashes it canonically.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// A single committed ledger record
///
/// Constructed exactly once by [`LedgerStore`](crate::ledger::LedgerStore)
/// at append time and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Unix timestamp in milliseconds at append time
    pub sequence_time: u64,

    /// `record_hash` of the preceding record, or [`GENESIS`]
    pub prev_hash: String,

    /// Event data
    pub payload: Payload,

    /// Hex SHA-256 over the canonical (`sequence_time`, `prev_hash`, `payload`)
    pub record_hash: String,
}

impl Record {
    /// Build a record and compute its hash
    pub(crate) fn seal(sequence_time: u64, prev_hash: String, payload: Payload) -> Self {
        let record_hash = crate::canonical::record_digest(sequence_time, &prev_hash, &payload);
        Self {
            sequence_time,
            prev_hash,
            payload,
            record_hash,
        }
    }

    /// Whether this record is the first of its chain
    pub fn is_genesis(&self) -> bool {
        self.prev_hash == GENESIS
    }

    /// Whether this record directly follows `prev`
    pub fn follows(&self, prev: &Record) -> bool {
        self.prev_hash == prev.record_hash
    }

    /// Recompute the digest from the stored fields
    pub fn recompute_hash(&self) -> String {
        crate::canonical::record_digest(self.sequence_time, &self.prev_hash, &self.payload)
    }

    /// Creation time as a UTC datetime
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        let millis = i64::try_from(self.sequence_time).ok()?;
        Utc.timestamp_millis_opt(millis).single()
    }
}

/// Classified event kinds produced by the monitoring front end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    /// A tracked individual was enrolled
    Register,
    /// Position fell inside a high-risk zone
    GeofenceAlert,
    /// Position is too far from every planned itinerary point
    RouteDeviation,
    /// No location update within the idle window
    Inactivity,
    /// Panic button pressed
    Panic,
}

impl AlertKind {
    /// Wire name used in the `event` payload field
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Register => "REGISTER",
            Self::GeofenceAlert => "GEOFENCE_ALERT",
            Self::RouteDeviation => "ROUTE_DEVIATION",
            Self::Inactivity => "INACTIVITY",
            Self::Panic => "PANIC",
        }
    }
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Geographic position in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

/// Builder for a classified-event payload
///
/// Produces `{"event": ..., "subject_id": ..., "location"?: ..., "message"?: ...}`
/// plus any extra fields. The ledger accepts any payload; this is only a
/// convenience for producers.
#[derive(Debug, Clone)]
pub struct Alert {
    kind: AlertKind,
    subject_id: String,
    location: Option<Location>,
    message: Option<String>,
    extra: Payload,
}

impl Alert {
    /// Create an alert of `kind` about `subject_id`
    pub fn new(kind: AlertKind, subject_id: impl Into<String>) -> Self {
        Self {
            kind,
            subject_id: subject_id.into(),
            location: None,
            message: None,
            extra: Payload::new(),
        }
    }

    /// Attach the position the alert refers to
    pub fn with_location(mut self, lat: f64, lng: f64) -> Self {
        self.location = Some(Location { lat, lng });
        self
    }

    /// Attach a human-readable message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Add an extra payload field; reserved keys are overwritten on build
    pub fn with_field(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// The alert kind
    pub fn kind(&self) -> AlertKind {
        self.kind
    }

    /// Build the ledger payload
    pub fn into_payload(self) -> Payload {
        let mut payload = self.extra;
        payload.insert("event".into(), self.kind.as_str().into());
        payload.insert("subject_id".into(), self.subject_id.into());
        if let Some(loc) = self.location {
            let mut l = Payload::new();
            l.insert("lat".into(), loc.lat.into());
            l.insert("lng".into(), loc.lng.into());
            payload.insert("location".into(), serde_json::Value::Object(l));
        }
        if let Some(message) = self.message {
            payload.insert("message".into(), message.into());
        }
        payload
    }
}

impl From<Alert> for Payload {
    fn from(alert: Alert) -> Self {
        alert.into_payload()
    }
}

/// Ledger and bus status
#[derive(Debug, Clone, Serialize)]
pub struct LedgerInfo {
    /// Committed record count
    pub records: usize,
    /// Currently attached subscribers
    pub subscribers: usize,
    /// Hash of the newest record, if any
    pub tail_hash: Option<String>,
}

/// Build a payload from a JSON object literal
///
/// Non-object values are wrapped as `{"value": ...}`.
pub fn payload_from(value: serde_json::Value) -> Payload {
    match value {
        serde_json::Value::Object(map) => map,
        other => {
            let mut map = Payload::new();
            map.insert("value".into(), other);
            map
        }
    }
}

/// Current time in Unix milliseconds
pub(crate) fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_seal_first_record() {
        let record = Record::seal(1_700_000_000_000, GENESIS.to_string(), payload_from(json!({"event": "PANIC"})));
        assert!(record.is_genesis());
        assert_eq!(record.record_hash.len(), 64);
        assert_eq!(record.recompute_hash(), record.record_hash);
    }

    #[test]
    fn test_follows() {
        let first = Record::seal(1, GENESIS.to_string(), Payload::new());
        let second = Record::seal(2, first.record_hash.clone(), Payload::new());
        assert!(second.follows(&first));
        assert!(!first.follows(&second));
    }

    #[test]
    fn test_record_serialization_layout() {
        let record = Record::seal(42, GENESIS.to_string(), payload_from(json!({"id": "T1"})));
        let line = serde_json::to_string(&record).unwrap();
        assert!(line.starts_with("{\"sequence_time\":42,\"prev_hash\":\"GENESIS\""));
        assert!(line.contains("\"record_hash\":"));

        let parsed: Record = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_created_at() {
        let record = Record::seal(1_700_000_000_000, GENESIS.to_string(), Payload::new());
        let at = record.created_at().unwrap();
        assert_eq!(at.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn test_alert_payload() {
        let payload = Alert::new(AlertKind::GeofenceAlert, "T1")
            .with_location(26.15, 91.75)
            .with_message("Entered high-risk zone")
            .into_payload();

        assert_eq!(payload["event"], "GEOFENCE_ALERT");
        assert_eq!(payload["subject_id"], "T1");
        assert_eq!(payload["location"]["lat"], 26.15);
        assert_eq!(payload["message"], "Entered high-risk zone");
    }

    #[test]
    fn test_alert_reserved_fields_win() {
        let payload: Payload = Alert::new(AlertKind::Panic, "T1")
            .with_field("event", json!("SAFE"))
            .with_field("kyc_hash", json!("abc"))
            .into();

        assert_eq!(payload["event"], "PANIC");
        assert_eq!(payload["kyc_hash"], "abc");
        assert!(!payload.contains_key("location"));
    }

    #[test]
    fn test_alert_kind_wire_names() {
        for kind in [
            AlertKind::Register,
            AlertKind::GeofenceAlert,
            AlertKind::RouteDeviation,
            AlertKind::Inactivity,
            AlertKind::Panic,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn test_payload_from_non_object() {
        let payload = payload_from(json!(7));
        assert_eq!(payload["value"], 7);
    }
}
