//! # SOAP Envelope - Value Model and Wire Serialization
//!
//! Turns typed application values into SOAP 1.1 envelopes and reads replies
//! back into the same value model.
//!
//! ## Layers
//!
//! ```text
//! ┌──────────────┐   ┌────────────────────┐   ┌──────────────────┐
//! │   Message    │──►│  EnvelopeBuilder   │──►│  XML byte buffer │
//! │ (ValueList)  │   │  + prefix table    │   └──────────────────┘
//! └──────────────┘   │  + marshaler       │
//!        ▲           └────────────────────┘
//!        │
//! ┌──────┴───────┐
//! │ parse_reply  │◄── reply body from the transport
//! └──────────────┘
//! ```
//!
//! - [`marshal`]: one typed value to `xsi:type` + text, and back.
//! - [`namespaces`]: per-envelope namespace URI → prefix table.
//! - [`envelope`]: recursive argument serialization.
//! - [`reply`]: reply body to [`Message`] or [`SoapFault`].

#![warn(clippy::all)]
#![deny(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod envelope;
pub mod error;
pub mod marshal;
pub mod namespaces;
pub mod reply;
pub mod value;

pub use envelope::EnvelopeBuilder;
pub use error::ReplyError;
pub use namespaces::{NamespaceDeclaration, NamespacePrefixes};
pub use reply::{parse_reply, Reply, SoapFault};
pub use value::{Message, Payload, QualifiedType, Use, Value, ValueList};

/// SOAP 1.1 envelope namespace.
pub const SOAP_ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// SOAP 1.1 encoding namespace, also the `encodingStyle` of every envelope.
pub const SOAP_ENCODING_NS: &str = "http://schemas.xmlsoap.org/soap/encoding/";

/// XML Schema namespace bound to the `xsd` prefix.
pub const XML_SCHEMA_NS: &str = "http://www.w3.org/1999/XMLSchema";

/// XML Schema Instance namespace bound to the `xsi` prefix.
pub const XML_SCHEMA_INSTANCE_NS: &str = "http://www.w3.org/1999/XMLSchema-instance";

/// 2001 revisions of the schema namespaces, accepted when reading replies.
pub const XML_SCHEMA_NS_2001: &str = "http://www.w3.org/2001/XMLSchema";
pub const XML_SCHEMA_INSTANCE_NS_2001: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Returns true for either revision of the XML Schema namespace.
pub fn is_xml_schema_ns(uri: &str) -> bool {
    uri == XML_SCHEMA_NS || uri == XML_SCHEMA_NS_2001
}

/// Returns true for either revision of the XML Schema Instance namespace.
pub fn is_xml_schema_instance_ns(uri: &str) -> bool {
    uri == XML_SCHEMA_INSTANCE_NS || uri == XML_SCHEMA_INSTANCE_NS_2001
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_namespace_revisions() {
        assert!(is_xml_schema_ns(XML_SCHEMA_NS));
        assert!(is_xml_schema_ns(XML_SCHEMA_NS_2001));
        assert!(!is_xml_schema_ns(XML_SCHEMA_INSTANCE_NS));
        assert!(is_xml_schema_instance_ns(XML_SCHEMA_INSTANCE_NS_2001));
    }
}
