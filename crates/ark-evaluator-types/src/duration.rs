//! Duration parsing shared by the event helpers and the query resolver.
//!
//! Two shapes are accepted (§3 "Duration (extended)", §9 open question):
//! a Go-style duration string (`"1.5s"`, `"500ms"`, `"1m30s"`, `"1h5m30s"`)
//! and a structured `{seconds, microseconds}` pair as emitted by some
//! versions of the `Query` status. [`parse_duration`] handles the string
//! form; [`RawDuration`] is the `serde`-level shape that accepts either.

use serde::{Deserialize, Serialize};

/// Parse a Go-style duration string into fractional seconds.
///
/// Supports a single unit (`"1.5s"`, `"500ms"`) as well as compound forms
/// made of consecutive `<number><unit>` segments (`"1m30s"`, `"1h5m30s"`).
/// Recognized units: `h`, `m`, `s`, `ms`, `us`/`µs`, `ns`. Returns `None` if
/// the string does not parse cleanly.
pub fn parse_duration(input: &str) -> Option<f64> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }

    let mut total = 0.0_f64;
    let mut chars = s.char_indices().peekable();
    let mut any_segment = false;
    let mut number_start = 0usize;

    while let Some(&(idx, ch)) = chars.peek() {
        if ch.is_ascii_digit() || ch == '.' {
            chars.next();
            continue;
        }

        // We've reached the start of a unit suffix; `number_start..idx` is the number.
        let number_str = &s[number_start..idx];
        if number_str.is_empty() {
            return None;
        }
        let value: f64 = number_str.parse().ok()?;

        let unit_start = idx;
        let mut unit_end = idx;
        while let Some(&(j, c)) = chars.peek() {
            if c.is_ascii_digit() || c == '.' {
                break;
            }
            chars.next();
            unit_end = j + c.len_utf8();
        }
        let unit = &s[unit_start..unit_end];
        let seconds = match unit {
            "h" => value * 3600.0,
            "m" => value * 60.0,
            "s" => value,
            "ms" => value / 1_000.0,
            "us" | "µs" => value / 1_000_000.0,
            "ns" => value / 1_000_000_000.0,
            _ => return None,
        };
        total += seconds;
        any_segment = true;
        number_start = unit_end;
    }

    if !any_segment {
        return None;
    }
    // Anything left over after the last unit means trailing garbage (e.g. a
    // dangling number with no unit).
    if number_start != s.len() {
        return None;
    }
    Some(total)
}

/// The two shapes `status.duration` has been observed in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RawDuration {
    /// A Go-style duration string, e.g. `"1.581370292s"`.
    Text(String),
    /// A structured `{seconds, microseconds}` pair.
    Struct {
        seconds: i64,
        #[serde(default)]
        microseconds: i64,
    },
}

impl RawDuration {
    /// Convert to fractional seconds, regardless of the underlying shape.
    /// Returns `0.0` for a text form that fails to parse, mirroring the
    /// original system's tolerant treatment of malformed telemetry.
    pub fn to_seconds(&self) -> f64 {
        match self {
            RawDuration::Text(s) => parse_duration(s).unwrap_or(0.0),
            RawDuration::Struct {
                seconds,
                microseconds,
            } => *seconds as f64 + (*microseconds as f64 / 1_000_000.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_seconds() {
        assert_eq!(parse_duration("1.5s"), Some(1.5));
    }

    #[test]
    fn parses_milliseconds() {
        assert_eq!(parse_duration("500ms"), Some(0.5));
    }

    #[test]
    fn parses_minutes_seconds_compound() {
        assert_eq!(parse_duration("1m30s"), Some(90.0));
    }

    #[test]
    fn parses_hours_minutes_seconds_compound() {
        assert_eq!(parse_duration("1h5m30s"), Some(3930.0));
    }

    #[test]
    fn parses_go_style_fractional_seconds() {
        let secs = parse_duration("1.581370292s").unwrap();
        assert!((secs - 1.581370292).abs() < 1e-9);
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_duration("not-a-duration"), None);
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("5"), None);
    }

    #[test]
    fn raw_duration_struct_form() {
        let raw = RawDuration::Struct {
            seconds: 2,
            microseconds: 500_000,
        };
        assert_eq!(raw.to_seconds(), 2.5);
    }

    #[test]
    fn raw_duration_text_form() {
        let raw = RawDuration::Text("1m30s".to_string());
        assert_eq!(raw.to_seconds(), 90.0);
    }

    #[test]
    fn raw_duration_deserializes_either_shape() {
        let text: RawDuration = serde_json::from_str("\"1.5s\"").unwrap();
        assert_eq!(text, RawDuration::Text("1.5s".to_string()));

        let obj: RawDuration =
            serde_json::from_str(r#"{"seconds": 1, "microseconds": 500000}"#).unwrap();
        assert_eq!(
            obj,
            RawDuration::Struct {
                seconds: 1,
                microseconds: 500_000
            }
        );
    }
}
