//! Registry and listener errors.

use std::net::SocketAddr;

use crate::config::ConfigError;
use crate::connection::{ConnectionHandle, ConnectionState};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("connection {0} is already registered")]
    DuplicateHandle(ConnectionHandle),
    #[error("connection {0} is not registered")]
    UnknownHandle(ConnectionHandle),
    #[error("connection {handle} cannot be activated from state {from:?}")]
    InvalidTransition {
        handle: ConnectionHandle,
        from: ConnectionState,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
