//! Server-side wrapper around one accepted transport handle.

use std::fmt;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::debug;

/// Opaque identifier of one accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionHandle(u64);

impl ConnectionHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// `Accepted → Active → Closed`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Accepted,
    Active,
    Closed,
}

/// One live connection, owned by the registry until its removal.
#[derive(Debug)]
pub struct Connection {
    handle: ConnectionHandle,
    state: ConnectionState,
    peer: Option<SocketAddr>,
    accepted_at: Instant,
    /// Signals the task serving this connection to stop.
    shutdown: Option<oneshot::Sender<()>>,
}

impl Connection {
    pub fn new(handle: ConnectionHandle) -> Self {
        Self {
            handle,
            state: ConnectionState::Accepted,
            peer: None,
            accepted_at: Instant::now(),
            shutdown: None,
        }
    }

    pub fn handle(&self) -> ConnectionHandle {
        self.handle
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn set_peer(&mut self, peer: SocketAddr) {
        self.peer = Some(peer);
    }

    /// Attach the stop signal of the task serving this connection.
    pub fn set_shutdown(&mut self, shutdown: oneshot::Sender<()>) {
        self.shutdown = Some(shutdown);
    }

    pub fn age(&self) -> Duration {
        self.accepted_at.elapsed()
    }

    pub fn is_open(&self) -> bool {
        self.state != ConnectionState::Closed
    }

    pub(crate) fn activate(&mut self) -> bool {
        if self.state != ConnectionState::Accepted {
            return false;
        }
        self.state = ConnectionState::Active;
        true
    }

    /// Close the connection, signalling its serving task. Idempotent.
    pub fn close(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }
        self.state = ConnectionState::Closed;
        if let Some(shutdown) = self.shutdown.take() {
            // The task may already be gone.
            let _ = shutdown.send(());
        }
        debug!(handle = %self.handle, "Connection closed");
    }
}
