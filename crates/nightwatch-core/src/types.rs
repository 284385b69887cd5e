use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{NightwatchError, Result};

// =============================================================================
// Time ranges
// =============================================================================

/// Half-open time interval `[start, end)`.
///
/// `start <= end` always holds; constructors that could violate it return
/// `None` instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Build a range, rejecting inverted bounds.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// The window `[now - days, now)`.
    pub fn lookback_days(days: i64, now: DateTime<Utc>) -> Self {
        Self {
            start: now - Duration::days(days.max(0)),
            end: now,
        }
    }

    /// The window `[now - hours, now)`.
    pub fn lookback_hours(hours: i64, now: DateTime<Utc>) -> Self {
        Self {
            start: now - Duration::hours(hours.max(0)),
            end: now,
        }
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Inclusive containment check used by record-level filters.
    pub fn contains_inclusive(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }

    /// ISO-8601 interval form (`start/end`) accepted by the Log Analytics API.
    pub fn to_iso_interval(&self) -> String {
        format!(
            "{}/{}",
            self.start.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.end.to_rfc3339_opts(SecondsFormat::Secs, true)
        )
    }
}

// =============================================================================
// Flow records
// =============================================================================

/// Traffic direction of a flow tuple.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlowDirection {
    Inbound,
    Outbound,
}

impl FlowDirection {
    /// `"I"` is inbound; every other code is outbound.
    pub fn from_code(code: &str) -> Self {
        if code.trim() == "I" {
            FlowDirection::Inbound
        } else {
            FlowDirection::Outbound
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FlowDirection::Inbound => "Inbound",
            FlowDirection::Outbound => "Outbound",
        }
    }
}

/// Allow/deny outcome of a flow tuple.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlowState {
    Allowed,
    Denied,
}

impl FlowState {
    /// `"A"` is allowed; every other code is denied.
    pub fn from_code(code: &str) -> Self {
        if code.trim() == "A" {
            FlowState::Allowed
        } else {
            FlowState::Denied
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FlowState::Allowed => "Allowed",
            FlowState::Denied => "Denied",
        }
    }
}

/// Minimum number of comma-separated fields in a usable flow tuple.
pub const FLOW_TUPLE_MIN_FIELDS: usize = 8;

/// One parsed NSG flow event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowRecord {
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(rename = "srcIP")]
    pub src_ip: String,
    #[serde(rename = "destIP")]
    pub dest_ip: String,
    #[serde(rename = "srcPort")]
    pub src_port: u16,
    #[serde(rename = "destPort")]
    pub dest_port: u16,
    pub protocol: String,
    pub direction: FlowDirection,
    #[serde(rename = "flowState")]
    pub flow_state: FlowState,
}

impl FlowRecord {
    /// Parse a raw flow tuple such as
    /// `1717236000,10.0.0.4,52.1.1.1,44321,443,T,O,A`.
    ///
    /// Returns `Ok(None)` for tuples with fewer than eight fields so callers
    /// can skip them; a record is never partially populated. Non-numeric
    /// ports are an ingestion error.
    pub fn from_tuple(tuple: &str, timestamp: Option<DateTime<Utc>>) -> Result<Option<Self>> {
        let fields: Vec<&str> = tuple.split(',').collect();
        if fields.len() < FLOW_TUPLE_MIN_FIELDS {
            return Ok(None);
        }

        let port = |raw: &str| -> Result<u16> {
            raw.trim().parse::<u16>().map_err(|e| {
                NightwatchError::Ingestion(format!("invalid port '{}' in tuple '{}': {}", raw, tuple, e))
            })
        };

        Ok(Some(Self {
            timestamp,
            src_ip: fields[1].trim().to_string(),
            dest_ip: fields[2].trim().to_string(),
            src_port: port(fields[3])?,
            dest_port: port(fields[4])?,
            protocol: fields[5].trim().to_string(),
            direction: FlowDirection::from_code(fields[6]),
            flow_state: FlowState::from_code(fields[7]),
        }))
    }

    /// Single-line text form stored in the vector index:
    /// `timestamp | SRC: ip:port → DST: ip:port | protocol | direction | state`.
    pub fn to_index_line(&self) -> String {
        let ts = self
            .timestamp
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_else(|| "unknown".to_string());
        format!(
            "{} | SRC: {}:{} → DST: {}:{} | {} | {} | {}",
            ts,
            self.src_ip,
            self.src_port,
            self.dest_ip,
            self.dest_port,
            self.protocol,
            self.direction.as_str(),
            self.flow_state.as_str()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_time_range_rejects_inverted_bounds() {
        let a = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2024, 6, 10, 0, 0, 0).unwrap();
        assert!(TimeRange::new(a, b).is_some());
        assert!(TimeRange::new(a, a).is_some());
        assert!(TimeRange::new(b, a).is_none());
    }

    #[test]
    fn test_lookback_windows() {
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap();
        let week = TimeRange::lookback_days(7, now);
        assert_eq!(week.end, now);
        assert_eq!(week.duration(), Duration::days(7));

        let hours = TimeRange::lookback_hours(5, now);
        assert_eq!(hours.duration(), Duration::hours(5));
    }

    #[test]
    fn test_iso_interval() {
        let range = TimeRange::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 6, 10, 0, 0, 0).unwrap(),
        )
        .unwrap();
        assert_eq!(range.to_iso_interval(), "2024-06-01T00:00:00Z/2024-06-10T00:00:00Z");
    }

    #[test]
    fn test_contains_inclusive_bounds() {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 6, 2, 0, 0, 0).unwrap();
        let range = TimeRange::new(start, end).unwrap();
        assert!(range.contains_inclusive(start));
        assert!(range.contains_inclusive(end));
        assert!(!range.contains_inclusive(end + Duration::seconds(1)));
    }

    #[test]
    fn test_from_tuple_maps_positional_fields() {
        let record = FlowRecord::from_tuple("1717236000,10.0.0.4,52.1.1.1,44321,443,T,I,A", None)
            .unwrap()
            .unwrap();
        assert_eq!(record.src_ip, "10.0.0.4");
        assert_eq!(record.dest_ip, "52.1.1.1");
        assert_eq!(record.src_port, 44321);
        assert_eq!(record.dest_port, 443);
        assert_eq!(record.protocol, "T");
        assert_eq!(record.direction, FlowDirection::Inbound);
        assert_eq!(record.flow_state, FlowState::Allowed);
    }

    #[test]
    fn test_from_tuple_short_tuple_is_skipped() {
        assert!(FlowRecord::from_tuple("1717236000,10.0.0.4,52.1.1.1,44321,443", None)
            .unwrap()
            .is_none());
        assert!(FlowRecord::from_tuple("", None).unwrap().is_none());
    }

    #[test]
    fn test_from_tuple_bad_port_is_error() {
        let err = FlowRecord::from_tuple("1,10.0.0.4,52.1.1.1,http,443,T,I,A", None).unwrap_err();
        assert!(matches!(err, NightwatchError::Ingestion(_)));
    }

    #[test]
    fn test_codes_default_to_outbound_and_denied() {
        assert_eq!(FlowDirection::from_code("O"), FlowDirection::Outbound);
        assert_eq!(FlowDirection::from_code("x"), FlowDirection::Outbound);
        assert_eq!(FlowState::from_code("D"), FlowState::Denied);
        assert_eq!(FlowState::from_code("B"), FlowState::Denied);
    }

    #[test]
    fn test_index_line_format() {
        let ts = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
        let record = FlowRecord::from_tuple("1717236000,10.0.0.4,52.1.1.1,44321,443,T,O,D", Some(ts))
            .unwrap()
            .unwrap();
        assert_eq!(
            record.to_index_line(),
            "2024-06-01T10:00:00Z | SRC: 10.0.0.4:44321 → DST: 52.1.1.1:443 | T | Outbound | Denied"
        );
    }

    #[test]
    fn test_flow_record_json_field_names() {
        let record = FlowRecord::from_tuple("1,10.0.0.4,52.1.1.1,1,2,U,I,A", None)
            .unwrap()
            .unwrap();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["srcIP"], "10.0.0.4");
        assert_eq!(json["destPort"], 2);
        assert_eq!(json["flowState"], "Allowed");
    }
}
