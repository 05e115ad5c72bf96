//! Serde adapter for 64-bit integers carried as decimal strings on the wire
//!
//! Serializes as `"123"`, deserializes from either `"123"` or `123` so that
//! clients using number-as-double JSON encoders never lose precision.

use serde::de::{self, Visitor};
use serde::{Deserializer, Serializer};
use std::fmt;

pub fn serialize<S>(value: &i64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(value)
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(Int64Visitor)
}

struct Int64Visitor;

impl<'de> Visitor<'de> for Int64Visitor {
    type Value = i64;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a 64-bit integer or its decimal string")
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<i64, E> {
        Ok(value)
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<i64, E> {
        i64::try_from(value).map_err(|_| E::custom(format!("integer {value} overflows int64")))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<i64, E> {
        if value.fract() == 0.0 && value >= i64::MIN as f64 && value < i64::MAX as f64 {
            Ok(value as i64)
        } else {
            Err(E::custom(format!("{value} is not an int64")))
        }
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<i64, E> {
        value
            .trim()
            .parse::<i64>()
            .map_err(|e| E::custom(format!("invalid int64 string {value:?}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Wrapper {
        #[serde(with = "crate::stats::int64_string")]
        value: i64,
    }

    #[test]
    fn test_serializes_as_string() {
        let json = serde_json::to_string(&Wrapper { value: i64::MAX }).unwrap();
        assert_eq!(json, r#"{"value":"9223372036854775807"}"#);
    }

    #[test]
    fn test_accepts_string_and_number() {
        let from_str: Wrapper = serde_json::from_str(r#"{"value":"-42"}"#).unwrap();
        let from_num: Wrapper = serde_json::from_str(r#"{"value":42}"#).unwrap();
        assert_eq!(from_str.value, -42);
        assert_eq!(from_num.value, 42);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(serde_json::from_str::<Wrapper>(r#"{"value":"12abc"}"#).is_err());
        assert!(serde_json::from_str::<Wrapper>(r#"{"value":1.5}"#).is_err());
        assert!(serde_json::from_str::<Wrapper>(r#"{"value":18446744073709551615}"#).is_err());
        assert!(serde_json::from_str::<Wrapper>(r#"{"value":9223372036854775808.0}"#).is_err());
    }
}
