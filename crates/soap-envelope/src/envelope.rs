//! Envelope Builder: serializes one call into a SOAP 1.1 envelope.
//!
//! Output shape:
//!
//! ```text
//! <?xml version="1.0" encoding="UTF-8"?>
//! <soap:Envelope xmlns:soap=".." xmlns:soap-enc=".." xmlns:xsd=".." xmlns:xsi=".."
//!                soap:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/">
//!   <soap:Body>
//!     <n1:Method xmlns:n1="message namespace">
//!       <n1:arg xsi:type="xsd:int">2</n1:arg>
//!     </n1:Method>
//!   </soap:Body>
//! </soap:Envelope>
//! ```
//!
//! The message namespace is declared on the method element, not on `Body`;
//! several SOAP stacks expect the method element to carry it.

use bytes::Bytes;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use tracing::{debug, error, warn};

use crate::marshal;
use crate::namespaces::{NamespaceDeclaration, NamespacePrefixes};
use crate::value::{Message, Payload, Use, Value, ValueList};
use crate::{SOAP_ENCODING_NS, SOAP_ENVELOPE_NS, XML_SCHEMA_INSTANCE_NS, XML_SCHEMA_NS};

/// Log target for serialized envelopes.
pub const WIRE_LOG_TARGET: &str = "soap::wire";

/// Element name written for a value whose name is empty.
pub const UNNAMED_ELEMENT: &str = "item";

/// Builds outgoing envelopes for one message namespace.
#[derive(Debug, Clone)]
pub struct EnvelopeBuilder {
    message_namespace: String,
    debug_envelopes: bool,
}

impl EnvelopeBuilder {
    pub fn new(message_namespace: impl Into<String>) -> Self {
        Self {
            message_namespace: message_namespace.into(),
            debug_envelopes: false,
        }
    }

    /// Log every serialized envelope on the `soap::wire` target.
    pub fn with_debug(mut self, enabled: bool) -> Self {
        self.debug_envelopes = enabled;
        self
    }

    pub fn message_namespace(&self) -> &str {
        &self.message_namespace
    }

    /// Serialize `message` as a call to `method`.
    ///
    /// Never fails: marshaling problems are logged and the best-effort
    /// document is returned.
    pub fn build(&self, method: &str, message: &Message) -> Bytes {
        self.build_traced(method, message, false)
    }

    /// Like [`EnvelopeBuilder::build`], also logging the envelope when
    /// `trace` is set even if the builder's own flag is off.
    pub fn build_traced(&self, method: &str, message: &Message, trace: bool) -> Bytes {
        let mut writer = EnvelopeWriter {
            writer: Writer::new(Vec::new()),
            prefixes: NamespacePrefixes::new(),
            message_namespace: &self.message_namespace,
            use_style: message.use_style(),
        };
        writer.write_document(method, message);
        let data = writer.writer.into_inner();

        if trace || self.debug_envelopes {
            debug!(
                target: WIRE_LOG_TARGET,
                method,
                envelope = %String::from_utf8_lossy(&data),
                "Serialized SOAP envelope"
            );
        }

        Bytes::from(data)
    }
}

/// State of one in-progress build. The prefix table lives and dies here.
struct EnvelopeWriter<'a> {
    writer: Writer<Vec<u8>>,
    prefixes: NamespacePrefixes,
    message_namespace: &'a str,
    use_style: Use,
}

impl EnvelopeWriter<'_> {
    fn emit(&mut self, event: Event<'_>) {
        if let Err(e) = self.writer.write_event(event) {
            error!(error = %e, "Failed to write XML event");
        }
    }

    fn write_document(&mut self, method: &str, message: &Message) {
        self.emit(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)));

        let standing = [
            self.prefixes.bind(SOAP_ENVELOPE_NS, "soap"),
            self.prefixes.bind(SOAP_ENCODING_NS, "soap-enc"),
            self.prefixes.bind(XML_SCHEMA_NS, "xsd"),
            self.prefixes.bind(XML_SCHEMA_INSTANCE_NS, "xsi"),
        ];

        let envelope_name = self.prefixes.resolve(SOAP_ENVELOPE_NS, "Envelope");
        let mut envelope = BytesStart::new(envelope_name.as_str());
        push_declarations(&mut envelope, &standing);
        let encoding_style = self.prefixes.resolve(SOAP_ENVELOPE_NS, "encodingStyle");
        envelope.push_attribute((encoding_style.as_str(), SOAP_ENCODING_NS));
        self.emit(Event::Start(envelope));

        // TODO: emit soap:Header once Message carries header values.
        let body_name = self.prefixes.resolve(SOAP_ENVELOPE_NS, "Body");
        self.emit(Event::Start(BytesStart::new(body_name.as_str())));

        let method_declarations = self.bind_message_namespaces(message);
        let method_name = self.prefixes.resolve(self.message_namespace, method);
        let mut method_start = BytesStart::new(method_name.as_str());
        push_declarations(&mut method_start, &method_declarations);
        self.emit(Event::Start(method_start));

        self.write_arguments(message.arguments());

        self.emit(Event::End(BytesEnd::new(method_name)));
        self.emit(Event::End(BytesEnd::new(body_name)));
        self.emit(Event::End(BytesEnd::new(envelope_name)));
    }

    /// Bind the message namespace (first free ordinal, normally `n1`) and any
    /// further namespace the arguments reference. All of them are declared on
    /// the method element so they are in scope for every argument.
    fn bind_message_namespaces(&mut self, message: &Message) -> Vec<NamespaceDeclaration> {
        let mut declarations = Vec::new();
        let mut uris = vec![self.message_namespace.to_string()];
        collect_namespaces(message.arguments(), self.use_style, &mut uris);

        for uri in uris {
            if uri.is_empty() || self.prefixes.contains(&uri) {
                continue;
            }
            let prefix = self.prefixes.next_free_prefix();
            declarations.push(self.prefixes.bind(&uri, &prefix));
        }
        declarations
    }

    fn element_name(&self, value: &Value) -> String {
        let local = if value.name().is_empty() {
            warn!(
                kind = value.payload().kind(),
                fallback = UNNAMED_ELEMENT,
                "Value without a name"
            );
            UNNAMED_ELEMENT
        } else {
            value.name()
        };
        match value.namespace() {
            Some("") => local.to_string(),
            Some(ns) => self.prefixes.resolve(ns, local),
            None => self.prefixes.resolve(self.message_namespace, local),
        }
    }

    fn write_arguments(&mut self, list: &ValueList) {
        for value in list {
            match value.payload() {
                Payload::List(nested) => self.write_list(value, nested),
                payload => self.write_primitive(value, payload),
            }
        }
    }

    fn write_list(&mut self, value: &Value, list: &ValueList) {
        let name = self.element_name(value);
        let mut start = BytesStart::new(name.as_str());

        if self.use_style == Use::Encoded {
            if let Some(ty) = list.type_name() {
                let xsi_type = self.prefixes.resolve(&ty.namespace, &ty.name);
                start.push_attribute(("xsi:type", xsi_type.as_str()));
            }
            if let Some(element_type) = list.array_type() {
                list.check_array_elements();
                let array_type = format!(
                    "{}[{}]",
                    self.prefixes
                        .resolve(&element_type.namespace, &element_type.name),
                    list.len()
                );
                start.push_attribute(("xsi:arrayType", array_type.as_str()));
            }
        }

        self.emit(Event::Start(start));
        self.write_arguments(list);
        self.emit(Event::End(BytesEnd::new(name)));
    }

    /// Unsupported kinds are still written, untyped, with their string form.
    fn write_primitive(&mut self, value: &Value, payload: &Payload) {
        let name = self.element_name(value);
        let mut start = BytesStart::new(name.as_str());

        let xml_type = marshal::xml_type(payload);
        if self.use_style == Use::Encoded {
            if let Some(xml_type) = xml_type {
                start.push_attribute(("xsi:type", xml_type));
            }
        }

        self.emit(Event::Start(start));
        let text = marshal::text_value(payload);
        if !text.is_empty() {
            self.emit(Event::Text(BytesText::new(&text)));
        }
        self.emit(Event::End(BytesEnd::new(name)));
    }
}

fn push_declarations(start: &mut BytesStart<'_>, declarations: &[NamespaceDeclaration]) {
    for decl in declarations {
        start.push_attribute((decl.attribute_name().as_str(), decl.uri.as_str()));
    }
}

/// Namespaces referenced by values (and, under encoded use, by type metadata),
/// in first-use order.
fn collect_namespaces(list: &ValueList, use_style: Use, out: &mut Vec<String>) {
    let mut add = |uri: &str| {
        if !uri.is_empty() && !out.iter().any(|u| u == uri) {
            out.push(uri.to_string());
        }
    };

    for value in list {
        if let Some(ns) = value.namespace() {
            add(ns);
        }
        if let Payload::List(nested) = value.payload() {
            if use_style == Use::Encoded {
                if let Some(ty) = nested.type_name() {
                    add(&ty.namespace);
                }
                if let Some(ty) = nested.array_type() {
                    add(&ty.namespace);
                }
            }
        }
    }

    for value in list {
        if let Payload::List(nested) = value.payload() {
            collect_namespaces(nested, use_style, out);
        }
    }
}
