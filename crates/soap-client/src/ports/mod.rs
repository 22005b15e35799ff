//! Outbound ports for the SOAP client.

pub mod transport;

pub use transport::{
    HttpReply, HttpTransport, SoapRequest, TransportError, SOAP_ACTION_HEADER, SOAP_CONTENT_TYPE,
};
