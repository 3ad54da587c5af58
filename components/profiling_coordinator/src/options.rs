//! Normalization of caller-supplied action options
//!
//! Callers send loosely-typed JSON. Anything that is not an object is
//! treated as an empty option set, and each field is read leniently.

use serde_json::{Map, Value};
use std::time::Duration;

/// Options understood by the start and heapdump actions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionOptions {
    /// Who or what requested the session
    pub origin: Option<String>,
    /// Auto-stop delay
    pub timeout: Option<Duration>,
    /// Heap sampling interval in bytes
    pub sampling_interval: Option<u64>,
}

impl ActionOptions {
    /// Normalize raw options
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Object(map)) => Self::from_map(map),
            _ => Self::default(),
        }
    }

    fn from_map(map: &Map<String, Value>) -> Self {
        // `initiated` is the field name older agents send
        let origin = ["origin", "initiated"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .map(str::to_string);

        Self {
            origin,
            timeout: map
                .get("timeout")
                .and_then(parse_timeout_ms)
                .map(Duration::from_millis),
            sampling_interval: map.get("samplingInterval").and_then(parse_sampling_interval),
        }
    }
}

/// Read a millisecond timeout the way a lenient integer parse would
///
/// Numbers are truncated, strings contribute their leading integer
/// (`"250ms"` is 250), and negative values clamp to zero.
fn parse_timeout_ms(value: &Value) -> Option<u64> {
    let millis = match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) => i,
            None => {
                let f = n.as_f64()?;
                if !f.is_finite() {
                    return None;
                }
                f.trunc() as i64
            }
        },
        Value::String(s) => parse_leading_integer(s)?,
        _ => return None,
    };
    Some(millis.max(0) as u64)
}

fn parse_leading_integer(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }

    let magnitude = digits[..end].parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -magnitude } else { magnitude })
}

fn parse_sampling_interval(value: &Value) -> Option<u64> {
    let interval = value.as_f64()?;
    if interval.is_finite() && interval >= 1.0 {
        Some(interval as u64)
    } else {
        None
    }
}
