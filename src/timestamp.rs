// ============================================================================
// One conversion for every time representation the feeds use
// ============================================================================
//
// Fallback order:
// 1. store-native object `{seconds, nanoseconds}` / `{_seconds, _nanoseconds}`
// 2. epoch number (seconds, or milliseconds above `EPOCH_MS_THRESHOLD`)
// 3. RFC 3339 string, then a numeric string treated like (2)
//
// Anything else is `ParsedTime::Unknown`.

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::Value;

/// Epoch values above this are milliseconds (year ~33658 in seconds).
pub const EPOCH_MS_THRESHOLD: f64 = 1e12;

/// Rendered when a record carries no usable time.
pub const UNKNOWN_TIME: &str = "—";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Default)]
#[serde(untagged)]
pub enum ParsedTime {
    #[default]
    Unknown,
    At(DateTime<Utc>),
}

impl ParsedTime {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(map) => {
                let seconds = map
                    .get("seconds")
                    .or_else(|| map.get("_seconds"))
                    .and_then(Value::as_i64);
                let nanos = map
                    .get("nanoseconds")
                    .or_else(|| map.get("_nanoseconds"))
                    .and_then(Value::as_u64)
                    .unwrap_or(0);
                match seconds {
                    Some(secs) => Self::from_parts(secs, nanos),
                    None => Self::Unknown,
                }
            }
            Value::Number(n) => n.as_f64().map(Self::from_epoch).unwrap_or_default(),
            Value::String(s) => Self::from_str_repr(s),
            _ => Self::Unknown,
        }
    }

    pub fn from_epoch(epoch: f64) -> Self {
        if !epoch.is_finite() || epoch < 0.0 {
            return Self::Unknown;
        }
        let millis = if epoch > EPOCH_MS_THRESHOLD {
            epoch
        } else {
            epoch * 1000.0
        };
        Utc.timestamp_millis_opt(millis as i64)
            .single()
            .map(Self::At)
            .unwrap_or_default()
    }

    fn from_parts(seconds: i64, nanos: u64) -> Self {
        let nanos = u32::try_from(nanos).unwrap_or(0);
        DateTime::from_timestamp(seconds, nanos)
            .map(Self::At)
            .unwrap_or_default()
    }

    fn from_str_repr(raw: &str) -> Self {
        let raw = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Self::At(dt.with_timezone(&Utc));
        }
        match raw.parse::<f64>() {
            Ok(epoch) => Self::from_epoch(epoch),
            Err(_) => Self::Unknown,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::At(dt) => Some(*dt),
            Self::Unknown => None,
        }
    }

    /// `YYYY-MM-DD HH:MM:SS` in UTC, or [`UNKNOWN_TIME`].
    pub fn display(&self) -> String {
        match self {
            Self::At(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            Self::Unknown => UNKNOWN_TIME.to_string(),
        }
    }
}
