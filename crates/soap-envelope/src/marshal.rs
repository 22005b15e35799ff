//! Value Marshaler: one typed payload to an XML Schema type and its text.
//!
//! Unsupported kinds degrade instead of failing: they get no type name and
//! travel as their generic string conversion.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use tracing::{debug, warn};
use url::Url;

use crate::value::Payload;

/// XML Schema type name for a payload, or `None` when the kind is unsupported.
///
/// Every signed width is announced as `xsd:int` and every unsigned width as
/// `xsd:unsignedInt`, which is what common SOAP toolkits accept.
pub fn xml_type(payload: &Payload) -> Option<&'static str> {
    match payload {
        Payload::String(_) | Payload::Char(_) | Payload::Url(_) => Some("xsd:string"),
        Payload::Bytes(_) => Some("xsd:base64Binary"),
        Payload::Int(_) | Payload::Long(_) => Some("xsd:int"),
        Payload::UInt(_) | Payload::ULong(_) => Some("xsd:unsignedInt"),
        Payload::Bool(_) => Some("xsd:boolean"),
        Payload::Float(_) => Some("xsd:float"),
        Payload::Double(_) => Some("xsd:double"),
        // No timezone is written, so this is an approximation of xsd:time.
        Payload::Time(_) => Some("xsd:time"),
        Payload::Date(_) => Some("xsd:date"),
        Payload::DateTime(_) => Some("xsd:dateTime"),
        Payload::List(_) => None,
        Payload::Opaque { kind, .. } => {
            warn!(kind = %kind, "Values of this kind are not supported, sending untyped");
            None
        }
    }
}

/// Text encoding of a payload as it appears in element content.
pub fn text_value(payload: &Payload) -> String {
    match payload {
        Payload::String(s) => s.clone(),
        Payload::Char(c) => c.to_string(),
        Payload::Url(url) => url.as_str().to_string(),
        Payload::Bytes(bytes) => STANDARD.encode(bytes),
        Payload::Int(v) => v.to_string(),
        Payload::Long(v) => v.to_string(),
        Payload::UInt(v) => v.to_string(),
        Payload::ULong(v) => v.to_string(),
        Payload::Bool(v) => v.to_string(),
        Payload::Float(v) => float_text(f64::from(*v), v.to_string()),
        Payload::Double(v) => float_text(*v, v.to_string()),
        Payload::Time(t) => t.format("%H:%M:%S%.f").to_string(),
        // Date portion of UTC midnight on that day.
        Payload::Date(d) => d.format("%Y-%m-%d").to_string(),
        Payload::DateTime(dt) => dt.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        Payload::List(_) => String::new(),
        Payload::Opaque { text, .. } => text.clone(),
    }
}

// XSD spells the special values INF, -INF and NaN.
fn float_text(value: f64, display: String) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        let token = if value > 0.0 { "INF" } else { "-INF" };
        token.to_string()
    } else {
        display
    }
}

fn parse_float(text: &str) -> Option<f64> {
    match text {
        "INF" => Some(f64::INFINITY),
        "-INF" => Some(f64::NEG_INFINITY),
        "NaN" => Some(f64::NAN),
        other => other.parse().ok(),
    }
}

fn parse_datetime(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    // Dates may carry a trailing timezone designator.
    let date_part = text.get(..10).unwrap_or(text);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

fn parse_time(text: &str) -> Option<NaiveTime> {
    let trimmed = text.trim_end_matches('Z');
    let without_offset = match trimmed.rfind(['+', '-']) {
        Some(pos) if pos >= 8 => &trimmed[..pos],
        _ => trimmed,
    };
    NaiveTime::parse_from_str(without_offset, "%H:%M:%S%.f").ok()
}

fn parse_bool(text: &str) -> Option<bool> {
    match text {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

/// Inverse of [`text_value`]: read element text announced with the given
/// XML Schema local type name (`"int"`, `"base64Binary"`, ...).
///
/// Unknown types and unparsable text fall back to [`Payload::String`].
pub fn parse_typed(xml_type: &str, raw: &str) -> Payload {
    // String content is kept verbatim; every other type ignores surrounding
    // whitespace.
    if matches!(xml_type, "string" | "normalizedString" | "token" | "QName") {
        return Payload::String(raw.to_string());
    }
    let text = raw.trim();
    let parsed = match xml_type {
        "anyURI" => Url::parse(text).ok().map(Payload::Url),
        "base64Binary" => STANDARD.decode(text).ok().map(Payload::Bytes),
        "int" | "short" | "byte" => match text.parse::<i32>() {
            Ok(v) => Some(Payload::Int(v)),
            // 64-bit values are written as int as well.
            Err(_) => text.parse::<i64>().ok().map(Payload::Long),
        },
        "long" | "integer" => text.parse::<i64>().ok().map(Payload::Long),
        "unsignedInt" | "unsignedShort" | "unsignedByte" => match text.parse::<u32>() {
            Ok(v) => Some(Payload::UInt(v)),
            // Some peers announce 64-bit values as unsignedInt.
            Err(_) => text.parse::<u64>().ok().map(Payload::ULong),
        },
        "unsignedLong" | "nonNegativeInteger" | "positiveInteger" => {
            text.parse::<u64>().ok().map(Payload::ULong)
        }
        "boolean" => parse_bool(text).map(Payload::Bool),
        "float" => parse_float(text).map(|v| Payload::Float(v as f32)),
        "double" | "decimal" => parse_float(text).map(Payload::Double),
        "date" => parse_date(text).map(Payload::Date),
        "time" => parse_time(text).map(Payload::Time),
        "dateTime" => parse_datetime(text).map(Payload::DateTime),
        other => {
            debug!(xml_type = other, "Unknown schema type in reply, keeping text");
            Some(Payload::String(raw.to_string()))
        }
    };

    parsed.unwrap_or_else(|| {
        warn!(xml_type, text, "Reply value does not parse as its declared type");
        Payload::String(raw.to_string())
    })
}
