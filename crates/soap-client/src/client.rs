//! SoapClient: the call dispatcher.
//!
//! Three ways to issue a call, all building the same envelope:
//!
//! - [`SoapClient::call_no_reply`] sends and forgets; failures are only logged.
//! - [`SoapClient::async_call`] returns a [`PendingCall`] to await.
//! - [`SoapClient::call`] blocks the calling thread until the reply arrives.
//!   Blocking calls from any number of threads are serialized through one
//!   worker, one at a time, in submission order.

use soap_envelope::Message;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

use crate::adapters::ReqwestTransport;
use crate::auth::Authenticator;
use crate::call_id::CallId;
use crate::config::ClientConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{CallError, ClientError};
use crate::pending::PendingCall;
use crate::ports::HttpTransport;
use crate::worker::{completion_pair, CallTask, SyncWorker};

/// Dispatcher of SOAP calls to one endpoint.
pub struct SoapClient {
    dispatcher: Arc<Dispatcher>,
    worker: SyncWorker,
}

impl SoapClient {
    /// Create a client over the given transport.
    ///
    /// Envelope dumps are on when `config.debug_envelopes` is set or when
    /// `SOAP_DEBUG` holds a non-zero integer at the time a call is built.
    pub fn new(
        config: ClientConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, ClientError> {
        config.validate()?;
        let dispatcher = Arc::new(Dispatcher::new(&config, transport));
        info!(
            endpoint = %config.endpoint,
            namespace = %config.message_namespace,
            "SOAP client ready"
        );
        Ok(Self {
            worker: SyncWorker::new(Arc::clone(&dispatcher)),
            dispatcher,
        })
    }

    /// Create a client that talks HTTP through reqwest.
    pub fn connect(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let transport = ReqwestTransport::new(&config)?;
        Self::new(config, Arc::new(transport))
    }

    pub fn endpoint(&self) -> &str {
        self.dispatcher.endpoint()
    }

    pub fn message_namespace(&self) -> &str {
        self.dispatcher.message_namespace()
    }

    /// Install the capability consulted on authentication challenges.
    /// Calls already in flight keep the authenticator they started with.
    pub fn set_authenticator(&self, authenticator: Arc<dyn Authenticator>) {
        self.dispatcher.set_authenticator(Some(authenticator));
    }

    pub fn clear_authenticator(&self) {
        self.dispatcher.set_authenticator(None);
    }

    /// Send the call and return immediately. The reply is discarded; a
    /// failure is logged.
    pub fn call_no_reply(&self, method: &str, message: &Message, action: Option<&str>) {
        let runtime = match self.runtime() {
            Ok(runtime) => runtime,
            Err(e) => {
                error!(method = %method, error = %e, "Cannot send fire-and-forget call");
                return;
            }
        };
        let call_id = CallId::new();
        let request = self.dispatcher.prepare(method, message, action);
        let authenticator = self.dispatcher.authenticator();
        let dispatcher = Arc::clone(&self.dispatcher);
        let method = method.to_string();

        debug!(call_id = %call_id, method = %method, "Sending fire-and-forget call");
        runtime.spawn(async move {
            if let Err(e) = dispatcher.execute(call_id, request, authenticator).await {
                warn!(call_id = %call_id, method = %method, error = %e, "Fire-and-forget call failed");
            }
        });
    }

    /// Start the call and return a handle resolving to the reply.
    ///
    /// Runs on the caller's tokio runtime when there is one, otherwise on
    /// the client's worker runtime.
    pub fn async_call(
        &self,
        method: &str,
        message: &Message,
        action: Option<&str>,
    ) -> Result<PendingCall, CallError> {
        let runtime = self.runtime()?;
        let call_id = CallId::new();
        debug!(call_id = %call_id, method = %method, "Starting asynchronous call");
        Ok(self
            .dispatcher
            .start_call(&runtime, call_id, method, message, action))
    }

    /// Perform the call and block until the reply (or an error) arrives.
    ///
    /// The request runs on the client's own worker, never on the caller's
    /// runtime, so this may be used from `spawn_blocking` or any thread that
    /// has entered a runtime. On an async worker thread it stalls that
    /// thread for the duration of the call.
    pub fn call(
        &self,
        method: &str,
        message: &Message,
        action: Option<&str>,
    ) -> Result<Message, CallError> {
        let (completion, waiter) = completion_pair();
        let task = CallTask {
            id: CallId::new(),
            method: method.to_string(),
            message: message.clone(),
            action: action.map(str::to_string),
            completion,
        };
        debug!(call_id = %task.id, method = %method, "Queueing synchronous call");
        self.worker.enqueue(task)?;
        waiter.wait()
    }

    fn runtime(&self) -> Result<Handle, CallError> {
        match Handle::try_current() {
            Ok(handle) => Ok(handle),
            Err(_) => self.worker.runtime_handle(),
        }
    }
}

impl std::fmt::Debug for SoapClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoapClient")
            .field("endpoint", &self.endpoint())
            .field("message_namespace", &self.message_namespace())
            .field("worker_running", &self.worker.is_running())
            .finish()
    }
}
