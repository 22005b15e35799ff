//! PendingCall: handle of an in-flight asynchronous SOAP call.
//!
//! Resolves to the reply message or a [`CallError`]. The request task owns
//! the outgoing buffer; cancelling (or dropping) the handle aborts the task
//! and releases it.

use soap_envelope::Message;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::call_id::CallId;
use crate::error::CallError;

/// Future that resolves when the reply of an asynchronous call arrives.
#[must_use = "dropping a PendingCall cancels the request"]
pub struct PendingCall {
    id: CallId,
    method: String,
    task: JoinHandle<Result<Message, CallError>>,
}

impl PendingCall {
    pub(crate) fn new(
        id: CallId,
        method: impl Into<String>,
        task: JoinHandle<Result<Message, CallError>>,
    ) -> Self {
        Self {
            id,
            method: method.into(),
            task,
        }
    }

    pub fn id(&self) -> CallId {
        self.id
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// True once the reply (or an error) is available.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Abort the underlying HTTP request. Best effort: a reply that already
    /// arrived is still delivered.
    pub fn cancel(&self) {
        if !self.task.is_finished() {
            debug!(call_id = %self.id, method = %self.method, "Cancelling pending call");
            self.task.abort();
        }
    }
}

impl Future for PendingCall {
    type Output = Result<Message, CallError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.task).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(e)) if e.is_cancelled() => Poll::Ready(Err(CallError::Cancelled)),
            Poll::Ready(Err(e)) => {
                error!(call_id = %this.id, error = %e, "Pending call task failed");
                Poll::Ready(Err(CallError::TaskFailed(e.to_string())))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for PendingCall {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for PendingCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingCall")
            .field("id", &self.id)
            .field("method", &self.method)
            .field("finished", &self.task.is_finished())
            .finish()
    }
}
