//! HTTP POST transport shared by both client proxies.

use std::borrow::Cow;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use hyper::{Method, Request, StatusCode, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use percent_encoding::percent_decode_str;
use url::{Position, Url};

use super::ClientError;

/// Default time allowed for one call, including reading the body.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Posts request bodies to a single URL.
#[derive(Debug, Clone)]
pub(crate) struct HttpTransport {
    client: Client<HttpConnector, Full<Bytes>>,
    uri: Uri,
    authorization: Option<HeaderValue>,
    timeout: Duration,
}

impl HttpTransport {
    /// Parses `url`. Credentials embedded as `user:password@` are
    /// percent-decoded and moved into a Basic `Authorization` header.
    pub(crate) fn new(url: &str) -> Result<Self, ClientError> {
        let invalid = |reason: &str| ClientError::InvalidUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        };

        let parsed = Url::parse(url).map_err(|e| invalid(&e.to_string()))?;
        if parsed.scheme() != "http" {
            return Err(invalid("only http:// URLs are supported"));
        }
        if !parsed.host_str().is_some_and(|host| !host.is_empty()) {
            return Err(invalid("missing host"));
        }

        let uri = format!(
            "http://{}",
            &parsed[Position::BeforeHost..Position::AfterQuery]
        )
        .parse::<Uri>()
        .map_err(|e| invalid(&e.to_string()))?;

        let authorization = if parsed.username().is_empty() && parsed.password().is_none() {
            None
        } else {
            let user = decode_component(parsed.username())
                .ok_or_else(|| invalid("credentials are not valid UTF-8"))?;
            let password = decode_component(parsed.password().unwrap_or_default())
                .ok_or_else(|| invalid("credentials are not valid UTF-8"))?;
            Some(basic_auth(&user, &password).ok_or_else(|| invalid("invalid credentials"))?)
        };

        Ok(Self {
            client: Client::builder(TokioExecutor::new()).build_http(),
            uri,
            authorization,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Replaces the credentials.
    pub(crate) fn set_basic_auth(&mut self, user: &str, password: &str) -> Result<(), ClientError> {
        let header = basic_auth(user, password).ok_or_else(|| ClientError::InvalidUrl {
            url: self.uri.to_string(),
            reason: "invalid credentials".to_string(),
        })?;
        self.authorization = Some(header);
        Ok(())
    }

    pub(crate) fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub(crate) const fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Sends one POST and returns the body of a 200 response.
    pub(crate) async fn post(
        &self,
        content_type: &'static str,
        body: Vec<u8>,
    ) -> Result<Bytes, ClientError> {
        let mut request = Request::new(Full::new(Bytes::from(body)));
        *request.method_mut() = Method::POST;
        *request.uri_mut() = self.uri.clone();
        request
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        if let Some(authorization) = &self.authorization {
            request
                .headers_mut()
                .insert(AUTHORIZATION, authorization.clone());
        }

        tokio::time::timeout(self.timeout, self.exchange(request))
            .await
            .map_err(|_| ClientError::Timeout(self.timeout))?
    }

    async fn exchange(&self, request: Request<Full<Bytes>>) -> Result<Bytes, ClientError> {
        let response = self.client.request(request).await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(ClientError::Protocol {
                status: status.as_u16(),
            });
        }
        Ok(response.into_body().collect().await?.to_bytes())
    }
}

fn decode_component(raw: &str) -> Option<String> {
    percent_decode_str(raw)
        .decode_utf8()
        .ok()
        .map(Cow::into_owned)
}

fn basic_auth(user: &str, password: &str) -> Option<HeaderValue> {
    let token = BASE64_STANDARD.encode(format!("{user}:{password}"));
    let mut value = HeaderValue::from_str(&format!("Basic {token}")).ok()?;
    value.set_sensitive(true);
    Some(value)
}
