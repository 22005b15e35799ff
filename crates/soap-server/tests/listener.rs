//! Listener admission and teardown against real sockets.

use async_trait::async_trait;
use soap_server::{ConnectionHandle, ConnectionHandler, ServerConfig, ServerHandle, SoapServer};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

/// Echoes bytes back until the peer closes.
struct Echo;

#[async_trait]
impl ConnectionHandler for Echo {
    async fn serve(&self, _handle: ConnectionHandle, mut stream: TcpStream) -> std::io::Result<()> {
        let mut buf = [0u8; 1024];
        loop {
            let n = stream.read(&mut buf).await?;
            if n == 0 {
                return Ok(());
            }
            stream.write_all(&buf[..n]).await?;
        }
    }
}

async fn start(max_connections: usize) -> (SocketAddr, ServerHandle, JoinHandle<()>) {
    let config = ServerConfig {
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        max_connections,
    };
    let server = SoapServer::bind(config, Arc::new(Echo)).await.unwrap();
    let addr = server.local_addr();
    let handle = server.handle();
    let task = tokio::spawn(async move {
        server.run().await.unwrap();
    });
    (addr, handle, task)
}

async fn wait_for(handle: &ServerHandle, expected: usize) {
    timeout(WAIT, handle.wait_for_count(expected))
        .await
        .unwrap_or_else(|_| panic!("live count never reached {expected}"));
}

async fn echo(stream: &mut TcpStream, payload: &[u8]) -> Vec<u8> {
    stream.write_all(payload).await.unwrap();
    let mut buf = vec![0u8; payload.len()];
    stream.read_exact(&mut buf).await.unwrap();
    buf
}

/// True once the server side has dropped the stream.
async fn is_closed_by_server(stream: &mut TcpStream) -> bool {
    let mut buf = [0u8; 16];
    matches!(timeout(WAIT, stream.read(&mut buf)).await, Ok(Ok(0)) | Ok(Err(_)))
}

#[tokio::test]
async fn test_tracks_live_connections() {
    let (addr, handle, task) = start(16).await;
    assert_eq!(handle.connection_count(), 0);

    let mut first = TcpStream::connect(addr).await.unwrap();
    let second = TcpStream::connect(addr).await.unwrap();
    wait_for(&handle, 2).await;
    assert_eq!(echo(&mut first, b"ping").await, b"ping");

    drop(second);
    wait_for(&handle, 1).await;

    handle.shutdown();
    timeout(WAIT, task).await.unwrap().unwrap();
    assert_eq!(handle.connection_count(), 0);
    assert!(is_closed_by_server(&mut first).await);
}

#[tokio::test]
async fn test_refuses_beyond_limit() {
    let (addr, handle, task) = start(1).await;

    let mut admitted = TcpStream::connect(addr).await.unwrap();
    wait_for(&handle, 1).await;

    let mut refused = TcpStream::connect(addr).await.unwrap();
    assert!(is_closed_by_server(&mut refused).await);
    assert_eq!(handle.connection_count(), 1);
    assert_eq!(echo(&mut admitted, b"still here").await, b"still here");

    // A slot frees up once the admitted peer leaves.
    drop(admitted);
    wait_for(&handle, 0).await;
    let mut next = TcpStream::connect(addr).await.unwrap();
    wait_for(&handle, 1).await;
    assert_eq!(echo(&mut next, b"hi").await, b"hi");

    handle.shutdown();
    timeout(WAIT, task).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_shutdown_without_connections() {
    let (_addr, handle, task) = start(4).await;
    handle.shutdown();
    handle.shutdown();
    timeout(WAIT, task).await.unwrap().unwrap();
    assert_eq!(handle.connection_count(), 0);
}

#[tokio::test]
async fn test_bind_conflict_reported() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let config = ServerConfig {
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: taken.local_addr().unwrap().port(),
        max_connections: 1,
    };
    let err = SoapServer::bind(config, Arc::new(Echo)).await.err().unwrap();
    assert!(matches!(err, soap_server::ServerError::Bind { .. }));
}
