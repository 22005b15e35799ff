//! Per-connection request handling.

use async_trait::async_trait;
use tokio::net::TcpStream;

use crate::connection::ConnectionHandle;

/// Serves one accepted connection until the peer goes away.
///
/// The returned future is dropped, closing the stream, when the server
/// disconnects the connection.
#[async_trait]
pub trait ConnectionHandler: Send + Sync + 'static {
    async fn serve(&self, handle: ConnectionHandle, stream: TcpStream) -> std::io::Result<()>;
}
