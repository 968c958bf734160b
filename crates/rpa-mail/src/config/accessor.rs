//! Typed lookups over a raw two-level configuration map.
//!
//! Orchestrators hand over configuration as `section -> key -> value`
//! JSON objects. These helpers inspect the runtime type of a single value and
//! convert it, failing with a [`ConfigError`] that names the offending
//! section and key.

use std::time::Duration;

use serde_json::Value;

use crate::error::ConfigError;

/// A raw `section -> key -> value` configuration map.
pub type ConfigMap = serde_json::Map<String, Value>;

/// Returns the string stored at `section.key`.
pub fn get_string(
    config: Option<&ConfigMap>,
    section: &str,
    key: &str,
) -> Result<String, ConfigError> {
    let config = config.ok_or(ConfigError::NullConfig)?;
    let value = lookup_key(section_of(config, section)?, section, key)?;

    match value {
        Value::String(s) => Ok(s.clone()),
        other => Err(mismatch(section, key, "string", other)),
    }
}

/// Returns the `i32` stored at `section.key`.
///
/// Integers, floats (rounded half to even) and numeric strings are accepted
/// as long as the result fits into an `i32`.
pub fn get_int32(config: Option<&ConfigMap>, section: &str, key: &str) -> Result<i32, ConfigError> {
    let config = config.ok_or(ConfigError::NullConfig)?;
    let value = lookup_key(section_of(config, section)?, section, key)?;

    let converted = match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i32::try_from(i).ok()
            } else if n.is_u64() {
                None
            } else {
                n.as_f64().and_then(f64_to_i32)
            }
        }
        Value::String(s) => s.trim().parse::<i32>().ok(),
        _ => None,
    };

    converted.ok_or_else(|| mismatch(section, key, "Int32", value))
}

/// Returns the boolean stored at `section.key`.
///
/// Numbers are true when nonzero. Strings must be `true`/`1` or `false`/`0`,
/// compared case-insensitively after trimming.
pub fn get_bool(config: Option<&ConfigMap>, section: &str, key: &str) -> Result<bool, ConfigError> {
    let config = config.ok_or(ConfigError::NullConfig)?;
    let value = lookup_key(section_of(config, section)?, section, key)?;

    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => Ok(n.as_f64().is_some_and(|f| f != 0.0)),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(mismatch(section, key, "bool", value)),
        },
        other => Err(mismatch(section, key, "bool", other)),
    }
}

/// Returns the duration stored at `section.key` as a number of seconds.
///
/// A missing key yields `default_seconds`. A missing configuration is
/// reported as a missing section, since the section lookup fails first.
pub fn get_duration_from_seconds(
    config: Option<&ConfigMap>,
    section: &str,
    key: &str,
    default_seconds: f64,
) -> Result<Duration, ConfigError> {
    let section_map = config
        .ok_or_else(|| ConfigError::SectionMissing {
            section: section.to_string(),
        })
        .and_then(|config| section_of(config, section))?;

    let Some(value) = section_map.get(key) else {
        return seconds_to_duration(default_seconds).ok_or_else(|| ConfigError::TypeMismatch {
            section: section.to_string(),
            key: key.to_string(),
            expected: "seconds",
            found: format!("default {}", default_seconds),
        });
    };

    let seconds = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    seconds
        .and_then(seconds_to_duration)
        .ok_or_else(|| mismatch(section, key, "seconds", value))
}

fn section_of<'a>(config: &'a ConfigMap, section: &str) -> Result<&'a ConfigMap, ConfigError> {
    config
        .get(section)
        .and_then(Value::as_object)
        .ok_or_else(|| ConfigError::SectionMissing {
            section: section.to_string(),
        })
}

fn lookup_key<'a>(
    section_map: &'a ConfigMap,
    section: &str,
    key: &str,
) -> Result<&'a Value, ConfigError> {
    section_map.get(key).ok_or_else(|| ConfigError::KeyMissing {
        section: section.to_string(),
        key: key.to_string(),
    })
}

fn f64_to_i32(f: f64) -> Option<i32> {
    let rounded = f.round_ties_even();
    if rounded.is_finite() && rounded >= f64::from(i32::MIN) && rounded <= f64::from(i32::MAX) {
        Some(rounded as i32)
    } else {
        None
    }
}

fn seconds_to_duration(seconds: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(seconds).ok()
}

fn mismatch(section: &str, key: &str, expected: &'static str, found: &Value) -> ConfigError {
    ConfigError::TypeMismatch {
        section: section.to_string(),
        key: key.to_string(),
        expected,
        found: describe(found),
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("boolean {}", b),
        Value::Number(n) => format!("number {}", n),
        Value::String(s) => format!("string {:?}", s),
        Value::Array(_) => "array".to_string(),
        Value::Object(_) => "object".to_string(),
    }
}
