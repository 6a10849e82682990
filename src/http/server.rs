//! HTTP server implementation.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::service::{router, AppState};
use crate::error::{Result, TurnstileError};

/// HTTP server for the admission service.
pub struct HttpServer {
    /// Address to bind to
    addr: SocketAddr,
    /// Shared handler state
    state: Arc<AppState>,
}

impl HttpServer {
    /// Create a new HTTP server.
    pub fn new(addr: SocketAddr, state: Arc<AppState>) -> Self {
        Self { addr, state }
    }

    /// Bind and serve until `signal` resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.addr).await.map_err(|e| {
            error!(addr = %self.addr, error = %e, "Failed to bind HTTP listener");
            TurnstileError::Io(e)
        })?;

        serve_listener(listener, self.state, signal).await
    }
}

/// Serve on an already bound listener until `signal` resolves.
pub async fn serve_listener<F>(listener: TcpListener, state: Arc<AppState>, signal: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!(addr = %addr, "Starting HTTP server with graceful shutdown");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(signal)
        .await
        .map_err(|e| {
            error!(error = %e, "HTTP server failed");
            TurnstileError::Io(e)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::{PolicyTable, RateLimiter};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;

    async fn raw_request(addr: SocketAddr, request: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    fn check_request(forwarded_for: &str) -> String {
        format!(
            "POST /v1/check/auth-send HTTP/1.1\r\nHost: localhost\r\n\
             X-Forwarded-For: {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            forwarded_for
        )
    }

    #[test]
    fn test_server_creation() {
        let addr: SocketAddr = "127.0.0.1:8080".parse().unwrap();
        let state = Arc::new(AppState::new(
            Arc::new(RateLimiter::new()),
            PolicyTable::default(),
        ));
        let _server = HttpServer::new(addr, state);
    }

    #[tokio::test]
    async fn test_serves_and_shuts_down() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(AppState::new(
            Arc::new(RateLimiter::new()),
            PolicyTable::default(),
        ));

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(serve_listener(listener, state, async {
            let _ = shutdown_rx.await;
        }));

        for _ in 0..3 {
            let response = raw_request(addr, &check_request("203.0.113.7")).await;
            assert!(response.starts_with("HTTP/1.1 200"), "{}", response);
        }
        let response = raw_request(addr, &check_request("203.0.113.7")).await;
        assert!(response.starts_with("HTTP/1.1 429"), "{}", response);

        let response = raw_request(
            addr,
            "GET /healthz HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(response.contains("\"tracked_keys\":1"), "{}", response);

        shutdown_tx.send(()).unwrap();
        server.await.unwrap().unwrap();
    }
}
