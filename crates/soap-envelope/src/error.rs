//! Errors raised while reading reply envelopes.

/// Why a reply body could not be read as a SOAP envelope.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplyError {
    /// The body is not well-formed XML.
    #[error("invalid XML in reply: {0}")]
    Xml(String),

    /// The document is empty.
    #[error("reply body is empty")]
    Empty,

    /// The root element is not `Envelope`.
    #[error("expected SOAP Envelope, found <{0}>")]
    NotAnEnvelope(String),

    /// The envelope has no `Body` element.
    #[error("SOAP envelope has no Body")]
    MissingBody,
}

impl From<quick_xml::Error> for ReplyError {
    fn from(e: quick_xml::Error) -> Self {
        ReplyError::Xml(e.to_string())
    }
}
