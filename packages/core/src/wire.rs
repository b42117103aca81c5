//! Serde helpers for the remote service's wire format.
//!
//! The service sends ids and coordinates either as JSON numbers or strings and
//! expects coordinates back as decimal-degree strings.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serializer};

/// Accepts a string or a number and yields its string form.
pub fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    struct LenientString;

    impl Visitor<'_> for LenientString {
        type Value = String;

        fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("a string or a number")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            Ok(v.to_string())
        }

        fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            Ok(v.to_string())
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            Ok(v.to_string())
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
            Ok(v.to_string())
        }
    }

    deserializer.deserialize_any(LenientString)
}

/// Decimal degrees, written as a string and read from a string or a number.
pub mod coordinate {
    use super::*;

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        let raw = lenient_string(deserializer)?;
        raw.trim()
            .parse::<f64>()
            .map_err(|_| de::Error::custom(format!("invalid coordinate: {raw:?}")))
    }
}

/// ISO-8601 UTC timestamp with millisecond precision (`2024-05-01T13:45:00.000Z`).
pub mod timestamp {
    use super::*;

    pub fn serialize<S: Serializer>(
        value: &DateTime<Utc>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(de::Error::custom)
    }
}

/// Optional string that travels as `""` when absent.
pub mod empty_as_none {
    use super::*;

    pub fn serialize<S: Serializer>(
        value: &Option<String>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(value.as_deref().unwrap_or(""))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<String>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.filter(|s| !s.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize)]
    struct Point {
        #[serde(deserialize_with = "super::lenient_string")]
        id: String,
        #[serde(with = "super::coordinate")]
        lat: f64,
    }

    #[test]
    fn accepts_numbers_and_strings() {
        let a: Point = serde_json::from_str(r#"{"id": 17, "lat": "4.6097"}"#).unwrap();
        let b: Point = serde_json::from_str(r#"{"id": "17", "lat": 4.6097}"#).unwrap();
        assert_eq!(a.id, "17");
        assert_eq!(b.id, "17");
        assert_eq!(a.lat, b.lat);
    }

    #[test]
    fn coordinates_are_written_as_strings() {
        let json = serde_json::to_value(Point {
            id: "1".into(),
            lat: -74.08175,
        })
        .unwrap();
        assert_eq!(json["lat"], "-74.08175");
    }

    #[test]
    fn rejects_garbage_coordinates() {
        let res: Result<Point, _> = serde_json::from_str(r#"{"id": 1, "lat": "north"}"#);
        assert!(res.is_err());
    }
}
