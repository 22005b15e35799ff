//! TCP listener feeding the connection registry.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::connection::ConnectionHandle;
use crate::error::ServerError;
use crate::handler::ConnectionHandler;
use crate::registry::ConnectionRegistry;

/// Listening endpoint owning the registry of its connections.
pub struct SoapServer {
    config: ServerConfig,
    listener: TcpListener,
    local_addr: SocketAddr,
    handler: Arc<dyn ConnectionHandler>,
    registry: ConnectionRegistry,
    next_handle: u64,
    shutdown_tx: Arc<watch::Sender<bool>>,
    count_tx: watch::Sender<usize>,
    count_rx: watch::Receiver<usize>,
}

/// Control handle usable while [`SoapServer::run`] owns the server.
#[derive(Clone)]
pub struct ServerHandle {
    shutdown_tx: Arc<watch::Sender<bool>>,
    connections: watch::Receiver<usize>,
}

impl ServerHandle {
    /// Stop accepting and disconnect every live connection.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Live connections as last published by the listener.
    pub fn connection_count(&self) -> usize {
        *self.connections.borrow()
    }

    /// Wait until the live count equals `expected`.
    pub async fn wait_for_count(&self, expected: usize) {
        let mut connections = self.connections.clone();
        // Err only when the server is gone.
        let _ = connections.wait_for(|count| *count == expected).await;
    }
}

impl SoapServer {
    /// Bind the configured address.
    pub async fn bind(
        config: ServerConfig,
        handler: Arc<dyn ConnectionHandler>,
    ) -> Result<Self, ServerError> {
        config.validate()?;
        let addr = config.addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;
        let (shutdown_tx, _) = watch::channel(false);
        let (count_tx, count_rx) = watch::channel(0);

        Ok(Self {
            config,
            listener,
            local_addr,
            handler,
            registry: ConnectionRegistry::new(),
            next_handle: 1,
            shutdown_tx: Arc::new(shutdown_tx),
            count_tx,
            count_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            shutdown_tx: Arc::clone(&self.shutdown_tx),
            connections: self.count_rx.clone(),
        }
    }

    /// Accept connections until shutdown, then disconnect all of them.
    pub async fn run(mut self) -> Result<(), ServerError> {
        let (closed_tx, mut closed_rx) = mpsc::unbounded_channel();
        let mut shutdown = self.shutdown_tx.subscribe();

        info!(
            addr = %self.local_addr,
            max_connections = self.config.max_connections,
            "SOAP server listening"
        );

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                Some(handle) = closed_rx.recv() => {
                    // Already gone when disconnect_all ran first.
                    if self.registry.connection_closed(handle).is_some() {
                        self.publish_count();
                    }
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => self.admit(stream, peer, &closed_tx),
                    Err(e) => warn!(error = %e, "Failed to accept connection"),
                },
            }
        }

        info!("Received shutdown signal");
        self.registry.disconnect_all();
        self.publish_count();
        info!("SOAP server stopped");
        Ok(())
    }

    fn admit(
        &mut self,
        stream: TcpStream,
        peer: SocketAddr,
        closed_tx: &mpsc::UnboundedSender<ConnectionHandle>,
    ) {
        if self.registry.count() >= self.config.max_connections {
            warn!(
                peer = %peer,
                live = self.registry.count(),
                "Connection limit reached, refusing connection"
            );
            return;
        }

        let handle = ConnectionHandle::new(self.next_handle);
        self.next_handle += 1;

        let (stop_tx, stop_rx) = oneshot::channel();
        match self.registry.accept_connection(handle) {
            Ok(connection) => {
                connection.set_peer(peer);
                connection.set_shutdown(stop_tx);
            }
            Err(e) => {
                error!(error = %e, "Cannot register connection");
                return;
            }
        }
        if let Err(e) = self.registry.activate(handle) {
            error!(error = %e, "Cannot activate connection");
        }
        self.publish_count();

        let handler = Arc::clone(&self.handler);
        let closed_tx = closed_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                result = handler.serve(handle, stream) => {
                    if let Err(e) = result {
                        debug!(handle = %handle, error = %e, "Connection ended with error");
                    }
                }
                _ = stop_rx => {
                    debug!(handle = %handle, "Connection stopped by server");
                }
            }
            // The listener may already have shut down.
            let _ = closed_tx.send(handle);
        });
    }

    fn publish_count(&self) {
        self.count_tx.send_replace(self.registry.count());
    }
}
