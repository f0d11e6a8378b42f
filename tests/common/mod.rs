//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use nexus_http::config::ServerConfig;
use nexus_http::http::{HttpServerBuilder, ServerError};
use nexus_http::net::Listener;
use nexus_http::HttpServer;

/// A server running on an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<(), ServerError>>,
}

impl TestServer {
    /// Ask the server to shut down and wait for `run` to return.
    pub async fn shutdown(mut self) -> Result<(), ServerError> {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        tokio::time::timeout(Duration::from_secs(10), self.task)
            .await
            .expect("server did not stop in time")
            .expect("server task panicked")
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Config suitable for tests: short timeouts, small limits.
pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.listener.max_connections = 16;
    config.limits.max_content_length = 1024;
    config.timeouts.idle_secs = 5;
    config.timeouts.shutdown_grace_secs = 2;
    config.server.name = "nexus-test".into();
    config
}

/// Build the server described by `configure` and start it.
pub async fn start<F>(configure: F) -> TestServer
where
    F: FnOnce(HttpServerBuilder) -> HttpServerBuilder,
{
    let config = test_config();
    let max_connections = config.listener.max_connections;
    let server = configure(HttpServer::builder(config))
        .build()
        .expect("server builds");

    let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let listener = Listener::from_tcp(tcp, max_connections).unwrap();
    let addr = listener.local_addr().unwrap();

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let task = tokio::spawn(server.run(listener, async move {
        let _ = stop_rx.await;
    }));

    TestServer {
        addr,
        stop: Some(stop_tx),
        task,
    }
}

/// Write raw bytes, then read until the server closes the connection.
pub async fn raw_exchange(addr: SocketAddr, input: &[u8]) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(input).await.unwrap();

    let mut out = Vec::new();
    tokio::time::timeout(Duration::from_secs(10), stream.read_to_end(&mut out))
        .await
        .expect("server did not close the connection")
        .unwrap();
    String::from_utf8_lossy(&out).into_owned()
}

/// Status lines of every response in `out`, in wire order.
pub fn status_lines(out: &str) -> Vec<&str> {
    out.match_indices("HTTP/1.")
        .map(|(at, _)| {
            let rest = &out[at..];
            &rest[..rest.find("\r\n").unwrap_or(rest.len())]
        })
        .collect()
}
