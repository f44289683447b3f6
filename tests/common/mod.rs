//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use duorpc::dispatch::Dispatcher;
use duorpc::registry::Registry;
use duorpc::server::{EndpointOptions, HttpServer};
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::{HeaderMap, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioIo};
use tokio::net::TcpListener;

/// Starts a server for `registry` on an ephemeral port.
pub async fn start_server(registry: Registry, options: EndpointOptions) -> SocketAddr {
    let dispatcher = Arc::new(Dispatcher::new(registry));
    let server = HttpServer::bind("127.0.0.1:0".parse().unwrap(), dispatcher, options)
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();

    tokio::spawn(server.serve_until(std::future::pending()));
    addr
}

/// Starts the demonstration server on an ephemeral port.
pub async fn start_demo_server(options: EndpointOptions) -> SocketAddr {
    start_server(duorpc::demo::registry(true).unwrap(), options).await
}

/// Endpoint URL for a server started with default options.
pub async fn demo_url() -> String {
    let addr = start_demo_server(EndpointOptions::default()).await;
    format!("http://{addr}/rpc")
}

/// Starts a server that answers every request with the same canned response.
pub async fn start_stub_server(status: StatusCode, body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let service = service_fn(move |_request| async move {
                    let mut response = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
                    *response.status_mut() = status;
                    Ok::<_, Infallible>(response)
                });
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });

    format!("http://{addr}/rpc")
}

/// A raw HTTP exchange result.
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RawResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    pub fn text(&self) -> String {
        String::from_utf8(self.body.to_vec()).unwrap()
    }
}

/// Sends one request without going through the client proxies.
pub async fn send_raw(
    method: Method,
    url: &str,
    content_type: Option<&str>,
    body: &str,
) -> RawResponse {
    let client = Client::builder(TokioExecutor::new()).build_http();

    let mut builder = Request::builder().method(method).uri(url);
    if let Some(content_type) = content_type {
        builder = builder.header(CONTENT_TYPE, content_type);
    }
    let request = builder
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap();

    let response = client.request(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();

    RawResponse {
        status,
        headers,
        body,
    }
}
