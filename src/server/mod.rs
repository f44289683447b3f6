//! HTTP/1.1 endpoint.
//!
//! The server accepts connections on a TCP listener and spawns one task per
//! connection. Each POST to the configured path is handed to the
//! [`Dispatcher`], with the protocol chosen from the `Content-Type` header.

mod http;

pub use self::http::HttpResponse;

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use crate::dispatch::Dispatcher;
use crate::error::ServerError;
use crate::protocol::ProtocolSet;

use self::http::Endpoint;

/// Default request path.
pub const DEFAULT_PATH: &str = "/rpc";

/// Default request body limit (1 MiB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;

/// Endpoint behaviour that does not depend on the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointOptions {
    /// Request path; other paths get 404.
    pub path: String,
    /// Largest accepted request body, in bytes.
    pub max_body_size: usize,
    /// Protocols accepted on this endpoint.
    pub protocols: ProtocolSet,
}

impl Default for EndpointOptions {
    fn default() -> Self {
        Self {
            path: DEFAULT_PATH.to_string(),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            protocols: ProtocolSet::ALL,
        }
    }
}

/// A bound, not yet running HTTP server.
#[derive(Debug)]
pub struct HttpServer {
    listener: TcpListener,
    endpoint: Arc<Endpoint>,
}

impl HttpServer {
    /// Binds the listening socket.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound.
    pub async fn bind(
        addr: SocketAddr,
        dispatcher: Arc<Dispatcher>,
        options: EndpointOptions,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        Ok(Self {
            listener,
            endpoint: Arc::new(Endpoint::new(dispatcher, options)),
        })
    }

    /// Returns the bound address, useful after binding port 0.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket address cannot be read.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections until `shutdown` completes.
    ///
    /// Connections already accepted keep running on their own tasks.
    ///
    /// # Errors
    ///
    /// Returns an error if the local address cannot be read.
    pub async fn serve_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        tracing::info!(addr = %self.local_addr()?, "HTTP server listening");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("HTTP server stopped accepting connections");
                    return Ok(());
                }

                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => self.spawn_connection(stream, peer),
                        Err(e) => tracing::warn!(error = %e, "Failed to accept connection"),
                    }
                }
            }
        }
    }

    fn spawn_connection(&self, stream: tokio::net::TcpStream, peer: SocketAddr) {
        let io = TokioIo::new(stream);
        let endpoint = Arc::clone(&self.endpoint);

        tokio::task::spawn(async move {
            let service = service_fn(move |request| {
                let endpoint = Arc::clone(&endpoint);
                async move { Ok::<_, Infallible>(endpoint.respond(request).await) }
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                tracing::debug!(%peer, error = %err, "Error serving connection");
            }
        });
    }

    /// Runs until SIGINT or SIGTERM.
    ///
    /// # Errors
    ///
    /// Returns an error if signal handlers cannot be installed.
    #[cfg(unix)]
    pub async fn run(self) -> Result<(), ServerError> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt()).map_err(ServerError::Signal)?;
        let mut sigterm = signal(SignalKind::terminate()).map_err(ServerError::Signal)?;

        self.serve_until(async move {
            tokio::select! {
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT, initiating graceful shutdown");
                }
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM, initiating graceful shutdown");
                }
            }
        })
        .await
    }

    /// Runs until Ctrl+C.
    ///
    /// # Errors
    ///
    /// Returns an error if the Ctrl+C handler cannot be installed.
    #[cfg(windows)]
    pub async fn run(self) -> Result<(), ServerError> {
        self.serve_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;

    #[tokio::test]
    async fn bind_reports_port() {
        let dispatcher = Arc::new(Dispatcher::new(Registry::new()));
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let server = HttpServer::bind(addr, dispatcher, EndpointOptions::default())
            .await
            .unwrap();
        assert_ne!(server.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn serve_until_returns_on_shutdown() {
        let dispatcher = Arc::new(Dispatcher::new(Registry::new()));
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let server = HttpServer::bind(addr, dispatcher, EndpointOptions::default())
            .await
            .unwrap();
        server.serve_until(async {}).await.unwrap();
    }

    #[tokio::test]
    async fn bind_conflict_is_error() {
        let dispatcher = Arc::new(Dispatcher::new(Registry::new()));
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let first = HttpServer::bind(addr, Arc::clone(&dispatcher), EndpointOptions::default())
            .await
            .unwrap();
        let taken = first.local_addr().unwrap();
        let second = HttpServer::bind(taken, dispatcher, EndpointOptions::default()).await;
        assert!(matches!(second, Err(ServerError::Bind { .. })));
    }

    #[test]
    fn default_options() {
        let options = EndpointOptions::default();
        assert_eq!(options.path, "/rpc");
        assert_eq!(options.max_body_size, 1024 * 1024);
        assert_eq!(options.protocols, ProtocolSet::ALL);
    }
}
