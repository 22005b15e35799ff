//! Request preparation and reply handling shared by every call path.

use parking_lot::RwLock;
use soap_envelope::{parse_reply, EnvelopeBuilder, Message, Reply};
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::auth::{AuthChallenge, Authenticator};
use crate::call_id::CallId;
use crate::config::{self, ClientConfig};
use crate::error::CallError;
use crate::pending::PendingCall;
use crate::ports::{HttpReply, HttpTransport, SoapRequest};

pub(crate) struct Dispatcher {
    endpoint: String,
    builder: EnvelopeBuilder,
    transport: Arc<dyn HttpTransport>,
    authenticator: RwLock<Option<Arc<dyn Authenticator>>>,
}

impl Dispatcher {
    pub(crate) fn new(config: &ClientConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            builder: EnvelopeBuilder::new(config.message_namespace.clone())
                .with_debug(config.debug_envelopes),
            transport,
            authenticator: RwLock::new(None),
        }
    }

    pub(crate) fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub(crate) fn message_namespace(&self) -> &str {
        self.builder.message_namespace()
    }

    pub(crate) fn authenticator(&self) -> Option<Arc<dyn Authenticator>> {
        self.authenticator.read().clone()
    }

    pub(crate) fn set_authenticator(&self, authenticator: Option<Arc<dyn Authenticator>>) {
        *self.authenticator.write() = authenticator;
    }

    /// Explicit action, else namespace + method (no separator is inserted).
    pub(crate) fn soap_action(&self, method: &str, action: Option<&str>) -> String {
        match action {
            Some(action) if !action.is_empty() => action.to_string(),
            _ => format!("{}{}", self.message_namespace(), method),
        }
    }

    pub(crate) fn prepare(
        &self,
        method: &str,
        message: &Message,
        action: Option<&str>,
    ) -> SoapRequest {
        SoapRequest {
            endpoint: self.endpoint.clone(),
            soap_action: self.soap_action(method, action),
            // The environment switch is read on every build.
            body: self
                .builder
                .build_traced(method, message, config::debug_from_env()),
            credentials: None,
        }
    }

    /// Build the envelope and start the request on `runtime`. This is the
    /// asynchronous path; the synchronous worker goes through it as well.
    pub(crate) fn start_call(
        self: &Arc<Self>,
        runtime: &Handle,
        call_id: CallId,
        method: &str,
        message: &Message,
        action: Option<&str>,
    ) -> PendingCall {
        let request = self.prepare(method, message, action);
        let authenticator = self.authenticator();
        let dispatcher = Arc::clone(self);
        let task = runtime.spawn(async move {
            dispatcher.execute(call_id, request, authenticator).await
        });
        PendingCall::new(call_id, method, task)
    }

    /// POST the request, answering challenges through `authenticator`, and
    /// turn the final reply into a message.
    pub(crate) async fn execute(
        &self,
        call_id: CallId,
        mut request: SoapRequest,
        authenticator: Option<Arc<dyn Authenticator>>,
    ) -> Result<Message, CallError> {
        let started = Instant::now();
        let mut attempt = 0;

        loop {
            debug!(
                call_id = %call_id,
                soap_action = %request.soap_action,
                bytes = request.body.len(),
                "Sending SOAP request"
            );
            let reply = self.transport.post(request.clone()).await.map_err(|e| {
                warn!(call_id = %call_id, error = %e, "SOAP transport failure");
                CallError::from(e)
            })?;

            if reply.is_auth_challenge() {
                attempt += 1;
                let challenge = AuthChallenge {
                    endpoint: request.endpoint.clone(),
                    www_authenticate: reply.header("www-authenticate").map(str::to_string),
                    attempt,
                };
                let credentials = authenticator
                    .as_deref()
                    .and_then(|auth| auth.credentials(&challenge));
                match credentials {
                    Some(credentials) => {
                        debug!(call_id = %call_id, attempt, "Retrying with credentials");
                        request.credentials = Some(credentials);
                        continue;
                    }
                    None => {
                        warn!(call_id = %call_id, attempt, "Authentication declined");
                        return Err(CallError::AuthenticationDeclined {
                            endpoint: request.endpoint,
                        });
                    }
                }
            }

            let result = interpret_reply(&reply);
            debug!(
                call_id = %call_id,
                status = reply.status,
                ok = result.is_ok(),
                elapsed_ms = started.elapsed().as_millis(),
                "SOAP call completed"
            );
            return result;
        }
    }
}

/// Faults win over status codes; a non-envelope body is a status error when
/// the status already says failure, and a malformed reply otherwise.
pub(crate) fn interpret_reply(reply: &HttpReply) -> Result<Message, CallError> {
    match parse_reply(&reply.body) {
        Ok(Reply::Fault(fault)) => Err(CallError::Fault(fault)),
        Ok(Reply::Message(message)) if reply.is_success() => Ok(message),
        Ok(Reply::Message(_)) => Err(CallError::http_status(reply.status, &reply.body)),
        Err(e) if reply.is_success() => Err(CallError::MalformedReply(e)),
        Err(_) => Err(CallError::http_status(reply.status, &reply.body)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use soap_envelope::Payload;

    const FAULT: &str = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Body><soap:Fault><faultcode>soap:Server</faultcode><faultstring>boom</faultstring></soap:Fault></soap:Body></soap:Envelope>"#;
    const OK: &str = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Body><r:PingResponse xmlns:r="urn:x"><r:out>pong</r:out></r:PingResponse></soap:Body></soap:Envelope>"#;

    #[test]
    fn test_success_reply() {
        let message = interpret_reply(&HttpReply::new(200, OK)).unwrap();
        assert_eq!(
            message.argument("out").unwrap().payload(),
            &Payload::String("pong".into())
        );
    }

    #[test]
    fn test_fault_with_error_status() {
        let err = interpret_reply(&HttpReply::new(500, FAULT)).unwrap_err();
        assert_eq!(err.as_fault().unwrap().message, "boom");
    }

    #[test]
    fn test_fault_with_success_status() {
        let err = interpret_reply(&HttpReply::new(200, FAULT)).unwrap_err();
        assert!(matches!(err, CallError::Fault(_)));
    }

    #[test]
    fn test_error_status_without_fault() {
        let err = interpret_reply(&HttpReply::new(503, "Service Unavailable")).unwrap_err();
        assert!(matches!(err, CallError::HttpStatus { status: 503, .. }));

        let err = interpret_reply(&HttpReply::new(404, OK)).unwrap_err();
        assert!(matches!(err, CallError::HttpStatus { status: 404, .. }));
    }

    #[test]
    fn test_success_status_with_garbage() {
        let err = interpret_reply(&HttpReply::new(200, "<html/>")).unwrap_err();
        assert!(matches!(err, CallError::MalformedReply(_)));
    }
}
