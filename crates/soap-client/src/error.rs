//! Errors surfaced to callers of the dispatcher.
//!
//! Marshaling never fails a call; everything here comes from the transport or
//! from the reply.

use soap_envelope::{ReplyError, SoapFault};

use crate::config::ConfigError;
use crate::ports::TransportError;

/// Longest reply body excerpt kept in [`CallError::HttpStatus`].
const BODY_EXCERPT_LEN: usize = 512;

/// Why a call produced no reply message.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CallError {
    /// Connection, DNS, TLS or timeout failure reported by the transport
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// The reply carried a SOAP fault
    #[error("SOAP fault: {0}")]
    Fault(SoapFault),

    /// Non-success HTTP status whose body is not a SOAP fault
    #[error("HTTP status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// The reply body is not a SOAP envelope
    #[error("malformed reply: {0}")]
    MalformedReply(#[from] ReplyError),

    /// The authenticator declined a challenge (or none is installed)
    #[error("authentication declined for {endpoint}")]
    AuthenticationDeclined { endpoint: String },

    /// The pending call was cancelled before it completed
    #[error("call cancelled")]
    Cancelled,

    /// The synchronous call worker could not take or finish the task
    #[error("synchronous call worker unavailable: {0}")]
    WorkerUnavailable(String),

    /// The task driving the call panicked
    #[error("call task failed: {0}")]
    TaskFailed(String),
}

impl CallError {
    pub(crate) fn http_status(status: u16, body: &[u8]) -> Self {
        let text = String::from_utf8_lossy(body);
        let body = match text.char_indices().nth(BODY_EXCERPT_LEN) {
            Some((cut, _)) => format!("{}...", &text[..cut]),
            None => text.into_owned(),
        };
        CallError::HttpStatus { status, body }
    }

    /// The fault, when the server answered with one.
    pub fn as_fault(&self) -> Option<&SoapFault> {
        match self {
            CallError::Fault(fault) => Some(fault),
            _ => None,
        }
    }
}

/// Errors raised while constructing a client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_excerpt_is_bounded() {
        let body = "x".repeat(2000);
        let CallError::HttpStatus { status, body } = CallError::http_status(503, body.as_bytes())
        else {
            panic!("expected HttpStatus");
        };
        assert_eq!(status, 503);
        assert_eq!(body.len(), BODY_EXCERPT_LEN + 3);
        assert!(body.ends_with("..."));
    }

    #[test]
    fn test_fault_accessor() {
        let err = CallError::Fault(SoapFault::new("soap:Client", "bad input"));
        assert_eq!(err.as_fault().unwrap().message, "bad input");
        assert!(CallError::Cancelled.as_fault().is_none());
        assert_eq!(
            err.to_string(),
            "SOAP fault: soap:Client: bad input"
        );
    }
}
