//! Strict decoding of mechanism configuration documents.
//!
//! Mechanism prototypes and per-rule overrides are carried around as raw
//! YAML values and decoded into typed structs at compile time. Every typed
//! config struct uses `#[serde(deny_unknown_fields)]` so typos surface as
//! configuration errors instead of being ignored.

use serde::de::DeserializeOwned;
use yaml_serde::{Mapping, Value};

use crate::{Error, Result};

/// Raw configuration of a mechanism prototype or override.
pub type MechanismConfig = Value;

/// Returns `true` if `config` carries no settings at all.
///
/// An absent document, `null` and an empty mapping are all "empty".
pub fn is_empty(config: Option<&Value>) -> bool {
    match config {
        None | Some(Value::Null) => true,
        Some(Value::Mapping(m)) => m.is_empty(),
        Some(_) => false,
    }
}

/// Decode `config` into `T`, naming `what` in the error message.
pub fn decode<T: DeserializeOwned>(config: Option<&Value>, what: &str) -> Result<T> {
    let value = match config {
        None | Some(Value::Null) => Value::Mapping(Mapping::new()),
        Some(v) => v.clone(),
    };

    yaml_serde::from_value(value)
        .map_err(|e| Error::configuration(format!("failed decoding {what} config: {e}")))
}

/// Human-readable durations (`250ms`, `5s`, `1m 30s`).
pub mod duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    /// Deserialize a required duration.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    /// Deserialize an optional duration. Use together with `#[serde(default)]`.
    pub fn deserialize_option<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        raw.map(|s| parse(&s).map_err(serde::de::Error::custom))
            .transpose()
    }

    fn parse(raw: &str) -> Result<Duration, humantime::DurationError> {
        if raw.trim() == "0" {
            return Ok(Duration::ZERO);
        }
        humantime::parse_duration(raw.trim())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::time::Duration;

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(deny_unknown_fields)]
    struct Sample {
        #[serde(default)]
        name: Option<String>,
        #[serde(default, deserialize_with = "duration::deserialize_option")]
        ttl: Option<Duration>,
    }

    #[test]
    fn test_is_empty() {
        assert!(is_empty(None));
        assert!(is_empty(Some(&Value::Null)));
        assert!(is_empty(Some(&yaml_serde::from_str("{}").unwrap())));
        assert!(!is_empty(Some(&yaml_serde::from_str("ttl: 5s").unwrap())));
    }

    #[test]
    fn test_decode_empty_uses_defaults() {
        let sample: Sample = decode(None, "sample").unwrap();
        assert_eq!(sample, Sample { name: None, ttl: None });
    }

    #[test]
    fn test_decode_durations() {
        let value: Value = yaml_serde::from_str("ttl: 250ms").unwrap();
        let sample: Sample = decode(Some(&value), "sample").unwrap();
        assert_eq!(sample.ttl, Some(Duration::from_millis(250)));

        let value: Value = yaml_serde::from_str("ttl: \"0\"").unwrap();
        let sample: Sample = decode(Some(&value), "sample").unwrap();
        assert_eq!(sample.ttl, Some(Duration::ZERO));
    }

    #[test]
    fn test_decode_rejects_unknown_fields() {
        let value: Value = yaml_serde::from_str("foo: bar").unwrap();
        let err = decode::<Sample>(Some(&value), "sample").unwrap_err();
        assert!(err.to_string().contains("failed decoding sample config"));
        assert_eq!(err.kind(), crate::ErrorKind::Configuration);
    }

    #[test]
    fn test_decode_rejects_bad_duration() {
        let value: Value = yaml_serde::from_str("ttl: soon").unwrap();
        assert!(decode::<Sample>(Some(&value), "sample").is_err());
    }
}
