//! HTTP transport port.
//!
//! Connection establishment, TLS, proxying and timeouts belong to the
//! transport; the dispatcher only hands it a finished request.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;

use crate::auth::Credentials;

/// Content type of every SOAP 1.1 request.
pub const SOAP_CONTENT_TYPE: &str = "text/xml";

/// Name of the SOAP action header.
pub const SOAP_ACTION_HEADER: &str = "SoapAction";

/// One outgoing SOAP POST.
#[derive(Debug, Clone)]
pub struct SoapRequest {
    pub endpoint: String,
    pub soap_action: String,
    /// Serialized envelope. Owned by the request until the transport is done.
    pub body: Bytes,
    /// Set after the authenticator answered a challenge.
    pub credentials: Option<Credentials>,
}

/// Raw HTTP reply handed back by the transport.
#[derive(Debug, Clone, Default)]
pub struct HttpReply {
    pub status: u16,
    /// Header names are lower-cased.
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl HttpReply {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_auth_challenge(&self) -> bool {
        self.status == 401
    }
}

/// Transport-level failures (connection, DNS, TLS, timeout).
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("cannot connect to {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },
    #[error("request timed out")]
    Timeout,
    #[error("request failed: {0}")]
    Request(String),
    #[error("failed to read reply body: {0}")]
    Body(String),
    #[error("transport setup failed: {0}")]
    Setup(String),
}

/// Sends SOAP requests over HTTP.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// POST the request and return the reply, whatever its status.
    async fn post(&self, request: SoapRequest) -> Result<HttpReply, TransportError>;
}
