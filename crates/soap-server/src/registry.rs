//! Live set of accepted connections for one listening endpoint.
//!
//! Mutated only by the context that owns the listener, so no locking.
//! [`ConnectionRegistry::connection_closed`] is the only way an entry leaves
//! the set; [`ConnectionRegistry::disconnect_all`] goes through it too.

use std::collections::HashMap;
use tracing::{debug, info};

use crate::connection::{Connection, ConnectionHandle};
use crate::error::RegistryError;

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionHandle, Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap `handle` in a new connection and track it.
    pub fn accept_connection(
        &mut self,
        handle: ConnectionHandle,
    ) -> Result<&mut Connection, RegistryError> {
        if self.connections.contains_key(&handle) {
            return Err(RegistryError::DuplicateHandle(handle));
        }
        debug!(handle = %handle, live = self.connections.len() + 1, "Accepted connection");
        Ok(self
            .connections
            .entry(handle)
            .or_insert_with(|| Connection::new(handle)))
    }

    /// Move an accepted connection to `Active`.
    pub fn activate(&mut self, handle: ConnectionHandle) -> Result<(), RegistryError> {
        let connection = self
            .connections
            .get_mut(&handle)
            .ok_or(RegistryError::UnknownHandle(handle))?;
        if connection.activate() {
            Ok(())
        } else {
            Err(RegistryError::InvalidTransition {
                handle,
                from: connection.state(),
            })
        }
    }

    /// Stop tracking a connection that reported closure. The returned
    /// connection is the caller's to tear down.
    pub fn connection_closed(&mut self, handle: ConnectionHandle) -> Option<Connection> {
        let removed = self.connections.remove(&handle);
        if removed.is_some() {
            debug!(handle = %handle, live = self.connections.len(), "Removed connection");
        }
        removed
    }

    pub fn get(&self, handle: ConnectionHandle) -> Option<&Connection> {
        self.connections.get(&handle)
    }

    pub fn contains(&self, handle: ConnectionHandle) -> bool {
        self.connections.contains_key(&handle)
    }

    /// Number of live connections.
    pub fn count(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Close every live connection and remove it. Returns how many were
    /// closed; 0 when the set was already empty.
    pub fn disconnect_all(&mut self) -> usize {
        let handles: Vec<ConnectionHandle> = self.connections.keys().copied().collect();
        let mut closed = 0;
        for handle in handles {
            if let Some(mut connection) = self.connection_closed(handle) {
                connection.close();
                closed += 1;
            }
        }
        if closed > 0 {
            info!(closed, "Disconnected all connections");
        }
        closed
    }
}
