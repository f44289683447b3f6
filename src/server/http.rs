//! Request routing for the HTTP endpoint.
//!
//! Status codes are reserved for transport problems. Anything that reaches
//! the dispatcher is answered with 200 and an in-band result or fault.
//! Procedures run on tokio's blocking pool so a slow handler never holds up
//! other connections.

use std::error::Error as StdError;
use std::sync::Arc;

use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderValue, ALLOW, CONTENT_LENGTH, CONTENT_TYPE};
use hyper::{Method, Request, Response, StatusCode};

use super::EndpointOptions;
use crate::dispatch::Dispatcher;
use crate::fault::Fault;
use crate::protocol::Protocol;

/// Response type produced by the endpoint.
pub type HttpResponse = Response<Full<Bytes>>;

/// Shared per-server state handed to every connection.
#[derive(Debug)]
pub(crate) struct Endpoint {
    dispatcher: Arc<Dispatcher>,
    options: EndpointOptions,
}

impl Endpoint {
    pub(crate) const fn new(dispatcher: Arc<Dispatcher>, options: EndpointOptions) -> Self {
        Self {
            dispatcher,
            options,
        }
    }

    /// Turns one HTTP request into one HTTP response.
    pub(crate) async fn respond<B>(&self, request: Request<B>) -> HttpResponse
    where
        B: Body<Data = Bytes>,
        B::Error: Into<Box<dyn StdError + Send + Sync>>,
    {
        if request.uri().path() != self.options.path {
            return plain(StatusCode::NOT_FOUND, "not found");
        }

        if request.method() != Method::POST {
            let mut response = plain(StatusCode::METHOD_NOT_ALLOWED, "only POST is supported");
            response
                .headers_mut()
                .insert(ALLOW, HeaderValue::from_static("POST"));
            return response;
        }

        let content_type = request
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        let Some(protocol) = self.accepted_protocol(content_type) else {
            tracing::debug!(content_type, "Unsupported content type");
            return plain(StatusCode::UNSUPPORTED_MEDIA_TYPE, "unsupported content type");
        };

        let declared_length = request
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<usize>().ok());
        if declared_length.is_some_and(|length| length > self.options.max_body_size) {
            return plain(StatusCode::PAYLOAD_TOO_LARGE, "request body too large");
        }

        let body = match Limited::new(request.into_body(), self.options.max_body_size)
            .collect()
            .await
        {
            Ok(collected) => collected.to_bytes(),
            Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
                return plain(StatusCode::PAYLOAD_TOO_LARGE, "request body too large");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read request body");
                return plain(StatusCode::BAD_REQUEST, "failed to read request body");
            }
        };

        let dispatcher = Arc::clone(&self.dispatcher);
        let outcome = tokio::task::spawn_blocking(move || dispatcher.handle(protocol, &body)).await;
        let reply = outcome.unwrap_or_else(|e| {
            tracing::error!(error = %e, "Dispatch task failed");
            let fault = Fault::custom(format!("request processing failed: {e}"));
            Some(Dispatcher::fault_reply(protocol, &fault))
        });

        match reply {
            Some(reply) => {
                let mut response = Response::new(Full::new(Bytes::from(reply.body)));
                response
                    .headers_mut()
                    .insert(CONTENT_TYPE, HeaderValue::from_static(reply.content_type));
                response
            }
            None => {
                let mut response = Response::new(Full::new(Bytes::new()));
                *response.status_mut() = StatusCode::NO_CONTENT;
                response
            }
        }
    }

    fn accepted_protocol(&self, content_type: &str) -> Option<Protocol> {
        Protocol::from_content_type(content_type)
            .filter(|protocol| self.options.protocols.contains(*protocol))
    }
}

fn plain(status: StatusCode, message: &'static str) -> HttpResponse {
    let mut response = Response::new(Full::new(Bytes::from_static(message.as_bytes())));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ProtocolSet;
    use crate::registry::Registry;

    fn endpoint(options: EndpointOptions) -> Endpoint {
        let mut registry = Registry::with_system_methods();
        registry
            .register_fn("ping", |_, _| Ok("pong".into()))
            .unwrap();
        Endpoint::new(Arc::new(Dispatcher::new(registry)), options)
    }

    fn post(path: &str, content_type: &str, body: &'static str) -> Request<Full<Bytes>> {
        Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(CONTENT_TYPE, content_type)
            .body(Full::new(Bytes::from_static(body.as_bytes())))
            .unwrap()
    }

    async fn body_text(response: HttpResponse) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn json_call_answered_with_200() {
        let endpoint = endpoint(EndpointOptions::default());
        let request = post(
            "/rpc",
            "application/json",
            r#"{"jsonrpc":"2.0","method":"ping","id":1}"#,
        );
        let response = endpoint.respond(request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        assert!(body_text(response).await.contains("pong"));
    }

    #[tokio::test]
    async fn fault_still_200() {
        let endpoint = endpoint(EndpointOptions::default());
        let request = post("/rpc", "text/xml", "<methodCall><methodName>nope</methodName></methodCall>");
        let response = endpoint.respond(request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("no such method"));
    }

    #[tokio::test]
    async fn wrong_path() {
        let response = endpoint(EndpointOptions::default())
            .respond(post("/other", "application/json", "{}"))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn wrong_method() {
        let request = Request::builder()
            .method(Method::GET)
            .uri("/rpc")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let response = endpoint(EndpointOptions::default()).respond(request).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[ALLOW], "POST");
    }

    #[tokio::test]
    async fn unsupported_content_type() {
        let response = endpoint(EndpointOptions::default())
            .respond(post("/rpc", "text/plain", "hello"))
            .await;
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn disabled_protocol() {
        let options = EndpointOptions {
            protocols: ProtocolSet::only(Protocol::JsonRpc),
            ..EndpointOptions::default()
        };
        let response = endpoint(options)
            .respond(post("/rpc", "text/xml", "<methodCall/>"))
            .await;
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn body_too_large() {
        let options = EndpointOptions {
            max_body_size: 8,
            ..EndpointOptions::default()
        };
        let response = endpoint(options)
            .respond(post("/rpc", "application/json", r#"{"jsonrpc":"2.0"}"#))
            .await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn notification_gets_no_content() {
        let response = endpoint(EndpointOptions::default())
            .respond(post(
                "/rpc",
                "application/json",
                r#"{"jsonrpc":"2.0","method":"ping"}"#,
            ))
            .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(body_text(response).await.is_empty());
    }
}
