//! `name:type=value` call arguments.

use anyhow::{bail, Result};
use soap_envelope::marshal::parse_typed;
use soap_envelope::Payload;

/// Schema type for a command-line type name.
fn schema_type(name: &str) -> Option<&'static str> {
    let xml_type = match name {
        "string" | "str" => "string",
        "int" | "i32" => "int",
        "long" | "i64" => "long",
        "uint" | "u32" => "unsignedInt",
        "ulong" | "u64" => "unsignedLong",
        "bool" | "boolean" => "boolean",
        "float" | "f32" => "float",
        "double" | "f64" => "double",
        "base64" | "bytes" => "base64Binary",
        "url" | "uri" => "anyURI",
        "date" => "date",
        "time" => "time",
        "datetime" => "dateTime",
        _ => return None,
    };
    Some(xml_type)
}

/// Parse `name=value` (a string) or `name:type=value`.
pub fn parse_argument(raw: &str) -> Result<(String, Payload)> {
    let Some((key, value)) = raw.split_once('=') else {
        bail!("argument `{raw}` is not of the form name[:type]=value");
    };
    let (name, type_name) = key.split_once(':').unwrap_or((key, "string"));
    if name.is_empty() {
        bail!("argument `{raw}` has an empty name");
    }
    let Some(xml_type) = schema_type(type_name) else {
        bail!("unknown argument type `{type_name}`");
    };

    let payload = parse_typed(xml_type, value);
    if xml_type != "string" && matches!(payload, Payload::String(_)) {
        bail!("`{value}` is not a valid {type_name}");
    }
    Ok((name.to_string(), payload))
}
