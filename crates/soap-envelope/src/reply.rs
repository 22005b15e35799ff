//! Reply reader: SOAP reply body to [`Message`] or [`SoapFault`].
//!
//! The body is read into a small namespace-resolved element tree first, then
//! interpreted. Values announced with an XML Schema `xsi:type` are parsed back
//! into typed payloads; everything else stays text.

use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

use crate::error::ReplyError;
use crate::marshal;
use crate::value::{Message, Payload, Use, Value, ValueList};
use crate::{is_xml_schema_instance_ns, is_xml_schema_ns};

/// Structured SOAP 1.1 fault.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct SoapFault {
    /// `faultcode`, e.g. `soap:Server`.
    pub code: String,
    /// `faultstring`.
    pub message: String,
    /// `faultactor`, when present.
    pub actor: Option<String>,
    /// Children of `detail`.
    pub detail: ValueList,
}

impl SoapFault {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            actor: None,
            detail: ValueList::new(),
        }
    }
}

/// Interpreted reply body.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Normal response; arguments are the children of the response element.
    Message(Message),
    /// `Body` carried a `Fault`.
    Fault(SoapFault),
}

type Scope = HashMap<String, String>;

#[derive(Debug, Default)]
struct Element {
    namespace: Option<String>,
    local: String,
    attributes: Vec<(Option<String>, String, String)>,
    children: Vec<Element>,
    text: String,
    scope: Scope,
}

impl Element {
    fn child(&self, local: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.local == local)
    }

    fn child_text(&self, local: &str) -> Option<String> {
        self.child(local).map(|c| c.text.trim().to_string())
    }

    fn xsi_attribute(&self, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(ns, name, _)| {
                name == local && ns.as_deref().is_some_and(is_xml_schema_instance_ns)
            })
            .map(|(_, _, value)| value.as_str())
    }

    /// Resolve a `prefix:local` attribute value against this element's scope.
    fn resolve_qname(&self, qname: &str) -> (String, String) {
        let (prefix, local) = split_qname(qname);
        let namespace = self
            .scope
            .get(prefix.unwrap_or(""))
            .cloned()
            .unwrap_or_default();
        (namespace, local.to_string())
    }
}

fn split_qname(qname: &str) -> (Option<&str>, &str) {
    match qname.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, qname),
    }
}

fn open_element(start: &BytesStart<'_>, parent_scope: Option<&Scope>) -> Result<Element, ReplyError> {
    let mut scope = parent_scope.cloned().unwrap_or_default();
    let mut raw_attributes = Vec::new();

    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| ReplyError::Xml(e.to_string()))?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute.unescape_value()?.into_owned();
        if key == "xmlns" {
            scope.insert(String::new(), value);
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            scope.insert(prefix.to_string(), value);
        } else {
            raw_attributes.push((key, value));
        }
    }

    let qname = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let (prefix, local) = split_qname(&qname);
    let namespace = scope.get(prefix.unwrap_or("")).cloned();

    let attributes = raw_attributes
        .into_iter()
        .map(|(key, value)| {
            let (prefix, local) = split_qname(&key);
            // Unprefixed attributes are in no namespace.
            let ns = prefix.and_then(|p| scope.get(p).cloned());
            (ns, local.to_string(), value)
        })
        .collect();

    Ok(Element {
        namespace,
        local: local.to_string(),
        attributes,
        children: Vec::new(),
        text: String::new(),
        scope,
    })
}

fn read_tree(body: &[u8]) -> Result<Element, ReplyError> {
    // Text is kept untrimmed: leading and trailing blanks belong to string
    // values. Whitespace between child elements only lands in the text of
    // containers, which is never read.
    let mut reader = Reader::from_reader(body);

    let mut buf = Vec::new();
    let mut stack: Vec<Element> = Vec::new();
    let mut root = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(start) => {
                let element = open_element(&start, stack.last().map(|e| &e.scope))?;
                stack.push(element);
            }
            Event::Empty(start) => {
                let element = open_element(&start, stack.last().map(|e| &e.scope))?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => root = Some(element),
                }
            }
            Event::End(_) => {
                if let Some(element) = stack.pop() {
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(element),
                        None => root = Some(element),
                    }
                }
            }
            Event::Text(text) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text.unescape()?);
                }
            }
            Event::CData(data) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(ReplyError::Xml("unexpected end of document".to_string()));
    }
    root.ok_or(ReplyError::Empty)
}

/// Read a reply body.
pub fn parse_reply(body: &[u8]) -> Result<Reply, ReplyError> {
    let root = read_tree(body)?;
    if root.local != "Envelope" {
        return Err(ReplyError::NotAnEnvelope(root.local));
    }
    let body = root.child("Body").ok_or(ReplyError::MissingBody)?;

    let Some(response) = body.children.first() else {
        debug!("Reply Body is empty");
        return Ok(Reply::Message(Message::literal()));
    };

    if response.local == "Fault" {
        return Ok(Reply::Fault(read_fault(response)));
    }

    let mut typed = false;
    let arguments: ValueList = response
        .children
        .iter()
        .map(|child| read_value(child, &mut typed))
        .collect();
    let use_style = if typed { Use::Encoded } else { Use::Literal };
    Ok(Reply::Message(Message::from_arguments(arguments, use_style)))
}

fn read_fault(fault: &Element) -> SoapFault {
    let mut typed = false;
    SoapFault {
        code: fault.child_text("faultcode").unwrap_or_default(),
        message: fault.child_text("faultstring").unwrap_or_default(),
        actor: fault.child_text("faultactor").filter(|a| !a.is_empty()),
        detail: fault
            .child("detail")
            .map(|detail| {
                detail
                    .children
                    .iter()
                    .map(|child| read_value(child, &mut typed))
                    .collect()
            })
            .unwrap_or_default(),
    }
}

fn read_value(element: &Element, typed: &mut bool) -> Value {
    let xsi_type = element.xsi_attribute("type").map(|t| element.resolve_qname(t));
    if xsi_type.is_some() {
        *typed = true;
    }

    let payload = if element.children.is_empty() && element.xsi_attribute("arrayType").is_none() {
        match &xsi_type {
            Some((ns, local)) if is_xml_schema_ns(ns) => marshal::parse_typed(local, &element.text),
            _ => Payload::String(element.text.clone()),
        }
    } else {
        let mut list: ValueList = element
            .children
            .iter()
            .map(|child| read_value(child, typed))
            .collect();
        if let Some((ns, local)) = xsi_type {
            list = list.with_type(ns, local);
        }
        if let Some(array_type) = element.xsi_attribute("arrayType") {
            // "prefix:type[count]"; the count is implied by the children.
            let element_type = array_type.split('[').next().unwrap_or(array_type);
            let (ns, local) = element.resolve_qname(element_type);
            list = list.with_array_type(ns, local);
        }
        Payload::List(list)
    };

    Value::new(element.local.clone(), payload)
        .with_namespace(element.namespace.clone().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::EnvelopeBuilder;
    use crate::XML_SCHEMA_NS;

    const RESPONSE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"
               xmlns:xsd="http://www.w3.org/2001/XMLSchema"
               xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
  <soap:Body>
    <n1:AddResponse xmlns:n1="urn:calc">
      <n1:result xsi:type="xsd:int">5</n1:result>
      <n1:note>plain &amp; simple</n1:note>
    </n1:AddResponse>
  </soap:Body>
</soap:Envelope>"#;

    #[test]
    fn test_parse_typed_response() {
        let Reply::Message(message) = parse_reply(RESPONSE.as_bytes()).unwrap() else {
            panic!("expected message");
        };
        assert_eq!(message.use_style(), Use::Encoded);
        let result = message.argument("result").unwrap();
        assert_eq!(result.payload(), &Payload::Int(5));
        assert_eq!(result.namespace(), Some("urn:calc"));
        assert_eq!(
            message.argument("note").unwrap().payload(),
            &Payload::String("plain & simple".into())
        );
    }

    #[test]
    fn test_parse_fault() {
        let body = r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
  <s:Body>
    <s:Fault>
      <faultcode>s:Server</faultcode>
      <faultstring>Division by zero</faultstring>
      <detail><reason>b was 0</reason></detail>
    </s:Fault>
  </s:Body>
</s:Envelope>"#;
        let Reply::Fault(fault) = parse_reply(body.as_bytes()).unwrap() else {
            panic!("expected fault");
        };
        assert_eq!(fault.code, "s:Server");
        assert_eq!(fault.message, "Division by zero");
        assert_eq!(fault.actor, None);
        assert_eq!(
            fault.detail.get("reason").unwrap().payload(),
            &Payload::String("b was 0".into())
        );
        assert_eq!(fault.to_string(), "s:Server: Division by zero");
    }

    #[test]
    fn test_malformed_bodies() {
        assert_eq!(parse_reply(b""), Err(ReplyError::Empty));
        assert_eq!(
            parse_reply(b"<html><body>502</body></html>"),
            Err(ReplyError::NotAnEnvelope("html".into()))
        );
        assert_eq!(
            parse_reply(b"<Envelope><Header/></Envelope>"),
            Err(ReplyError::MissingBody)
        );
        assert!(matches!(
            parse_reply(b"<Envelope><Body>"),
            Err(ReplyError::Xml(_))
        ));
    }

    #[test]
    fn test_string_values_keep_surrounding_whitespace() {
        let message = Message::encoded()
            .with_argument("padded", "  two sides  ")
            .with_argument("blank", " ")
            .with_argument("big", -1_234_567_890_123i64);
        let xml = EnvelopeBuilder::new("urn:ws").build("Echo", &message);
        let Reply::Message(read) = parse_reply(&xml).unwrap() else {
            panic!("expected message");
        };
        assert_eq!(
            read.argument("padded").unwrap().payload(),
            &Payload::String("  two sides  ".into())
        );
        assert_eq!(
            read.argument("blank").unwrap().payload(),
            &Payload::String(" ".into())
        );
        assert_eq!(
            read.argument("big").unwrap().payload(),
            &Payload::Long(-1_234_567_890_123)
        );
    }

    #[test]
    fn test_empty_body_is_empty_message() {
        let reply = parse_reply(b"<Envelope><Body/></Envelope>").unwrap();
        assert_eq!(reply, Reply::Message(Message::literal()));
    }

    #[test]
    fn test_reads_back_built_envelope() {
        let array = ValueList::new()
            .with_array_type(XML_SCHEMA_NS, "base64Binary")
            .with("item", vec![0x00u8, 0xFF]);
        let point = ValueList::new()
            .with_type("urn:geo", "Point")
            .with("x", 1.5f64)
            .with("y", -2i32);
        let message = Message::encoded()
            .with_argument("flag", true)
            .with_argument("blobs", array)
            .with_argument("point", point);

        // Read the request document itself: Body's first child is the call.
        let xml = EnvelopeBuilder::new("urn:geo").build("Plot", &message);
        let Reply::Message(read) = parse_reply(&xml).unwrap() else {
            panic!("expected message");
        };

        assert_eq!(read.argument("flag").unwrap().payload(), &Payload::Bool(true));

        let blobs = read.argument("blobs").unwrap().payload().as_list().unwrap();
        assert_eq!(blobs.array_type().unwrap().name, "base64Binary");
        assert_eq!(
            blobs.get("item").unwrap().payload(),
            &Payload::Bytes(vec![0x00, 0xFF])
        );

        let point = read.argument("point").unwrap().payload().as_list().unwrap();
        assert_eq!(point.type_name().unwrap().namespace, "urn:geo");
        assert_eq!(point.get("x").unwrap().payload(), &Payload::Double(1.5));
        assert_eq!(point.get("y").unwrap().payload(), &Payload::Int(-2));
    }
}
