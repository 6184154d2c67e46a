//! Timestamp parsing and formatting.
//!
//! The record file stores timestamps as ISO-8601 UTC. Older writers emitted
//! fractional seconds, newer ones do not; reads accept both variants, while
//! writes always use the second-precision `Z`-suffixed form.

use chrono::{DateTime, SecondsFormat, Utc};

/// Parse an ISO-8601 timestamp, accepting both the fractional-seconds and
/// whole-seconds variants.
///
/// # Errors
///
/// Returns the underlying parse error if neither variant matches.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s.trim()).map(|dt| dt.with_timezone(&Utc))
}

/// Format a timestamp in the fixed write form: `2024-01-01T00:00:00Z`.
#[must_use]
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Serde adapter for required `DateTime<Utc>` fields.
pub mod rfc3339 {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(
        dt: &DateTime<Utc>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_timestamp(dt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_timestamp(&raw).map_err(D::Error::custom)
    }
}

/// Serde adapter for optional `DateTime<Utc>` fields. `None` is written as
/// an explicit `null` so every record line carries the full key set.
pub mod rfc3339_opt {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(
        dt: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match dt {
            Some(dt) => serializer.serialize_some(&super::format_timestamp(dt)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        raw.map(|s| super::parse_timestamp(&s).map_err(D::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn parse_whole_seconds() {
        let dt = parse_timestamp("2024-01-01T00:00:00Z").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn parse_fractional_seconds() {
        let dt = parse_timestamp("2024-01-01T00:00:00.123456Z").unwrap();
        assert_eq!(dt.second(), 0);
        assert_eq!(dt.timestamp_subsec_millis(), 123);
    }

    #[test]
    fn parse_offset_form() {
        let dt = parse_timestamp("2024-01-01T05:00:00+05:00").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn parse_garbage_fails() {
        assert!(parse_timestamp("yesterday").is_err());
        assert!(parse_timestamp("2024-01-01").is_err());
    }

    #[test]
    fn format_is_fixed_form() {
        let dt = Utc
            .with_ymd_and_hms(2024, 6, 15, 12, 30, 45)
            .unwrap()
            .with_nanosecond(123_000_000)
            .unwrap();
        // Fractional part is truncated on write.
        assert_eq!(format_timestamp(&dt), "2024-06-15T12:30:45Z");
    }
}
