//! HTTP transport backed by reqwest.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use std::collections::HashMap;
use tracing::trace;

use crate::config::ClientConfig;
use crate::ports::{
    HttpReply, HttpTransport, SoapRequest, TransportError, SOAP_ACTION_HEADER, SOAP_CONTENT_TYPE,
};

/// Posts envelopes with a shared connection pool.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Create a transport with the configured timeouts.
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| TransportError::Setup(e.to_string()))?;

        Ok(Self { client })
    }

    /// Wrap an already configured client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post(&self, request: SoapRequest) -> Result<HttpReply, TransportError> {
        let mut builder = self
            .client
            .post(&request.endpoint)
            .header(CONTENT_TYPE, SOAP_CONTENT_TYPE)
            .header(SOAP_ACTION_HEADER, &request.soap_action);
        if let Some(credentials) = &request.credentials {
            builder = builder.header(AUTHORIZATION, credentials.basic_authorization());
        }

        let response = builder
            .body(request.body)
            .send()
            .await
            .map_err(|e| classify(&request.endpoint, e))?;

        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))?;

        trace!(status, bytes = body.len(), "Received HTTP reply");
        Ok(HttpReply {
            status,
            headers,
            body,
        })
    }
}

fn classify(endpoint: &str, error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else if error.is_connect() {
        TransportError::Connect {
            endpoint: endpoint.to_string(),
            reason: error.to_string(),
        }
    } else {
        TransportError::Request(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_builds_from_config() {
        let config = ClientConfig::new("http://localhost/soap", "urn:x");
        assert!(ReqwestTransport::new(&config).is_ok());
    }

    #[tokio::test]
    async fn test_refused_connection_is_connect_error() {
        // Bind then drop to get a port nobody listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut config = ClientConfig::new(format!("http://{addr}/soap"), "urn:x");
        config.connect_timeout = Duration::from_secs(2);
        let transport = ReqwestTransport::new(&config).unwrap();
        let err = transport
            .post(SoapRequest {
                endpoint: config.endpoint.clone(),
                soap_action: "urn:xPing".into(),
                body: "<x/>".into(),
                credentials: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }), "got {err:?}");
    }
}
