//! Request execution over a single, call-scoped connection.
//!
//! Each call parses the target, opens exactly one TCP connection (wrapped in
//! TLS for `https`), writes the request, reads the whole response and then
//! drops the connection. Nothing is pooled and no call observes another.

use super::body::assemble_body;
use super::types::RequestSpec;
use crate::config::LineMode;
use crate::error::RequestError;
use crate::infra::decompressor::ACCEPT_ENCODING;
use crate::infra::dns::{DnsResolver, SystemDnsResolver};
use crate::infra::tls::{connect_tls, TlsProvider};
use http_body_util::{BodyExt, Full};
use hyper::{
    body::Bytes,
    header::{self, HeaderValue},
    Method, Request,
};
use hyper_util::rt::TokioIo;
use std::{io, net::SocketAddr, sync::Arc};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// Fixed `Content-Type` sent with every request, whatever the body holds.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Where a request goes, derived from its URL.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Target {
    host: String,
    port: u16,
    /// Path plus query, as sent on the request line.
    path: String,
    /// `Host` header value.
    authority: String,
    is_https: bool,
}

impl Target {
    fn from_url(url: &str) -> Result<Self, RequestError> {
        let parsed =
            url::Url::parse(url).map_err(|e| RequestError::InvalidUrl(format!("{}: {}", url, e)))?;

        let is_https = match parsed.scheme() {
            "https" => true,
            "http" => false,
            other => return Err(RequestError::UnsupportedScheme(other.to_string())),
        };

        let host = match parsed.host_str() {
            Some(h) if !h.is_empty() => h.to_string(),
            _ => return Err(RequestError::InvalidUrl(format!("{}: URL has no host", url))),
        };

        let port = parsed
            .port_or_known_default()
            .unwrap_or(if is_https { 443 } else { 80 });
        let path = match parsed.query() {
            Some(query) => format!("{}?{}", parsed.path(), query),
            None => parsed.path().to_string(),
        };
        let authority = match parsed.port() {
            Some(p) => format!("{}:{}", host, p),
            None => host.clone(),
        };

        Ok(Self {
            host,
            port,
            path,
            authority,
            is_https,
        })
    }

    /// Host as used for SNI, without IPv6 brackets.
    fn server_name(&self) -> &str {
        self.host.trim_start_matches('[').trim_end_matches(']')
    }
}

/// Builds the HTTP request. The method is sent exactly as the caller spelled
/// it; methods are case-sensitive, so `get` is not `GET`. Only tokens the
/// HTTP layer cannot represent are rejected.
fn build_http_request(
    method: &str,
    target: &Target,
    payload: Option<&str>,
) -> Result<Request<Full<Bytes>>, RequestError> {
    let method = Method::from_bytes(method.as_bytes())
        .map_err(|_| RequestError::InvalidMethod(method.to_string()))?;

    let mut builder = Request::builder()
        .method(method)
        .uri(target.path.as_str())
        .header(header::HOST, target.authority.as_str())
        .header(header::CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_JSON))
        .header(header::ACCEPT_ENCODING, HeaderValue::from_static(ACCEPT_ENCODING));

    let body = match payload {
        Some(text) => {
            builder = builder.header(header::CONTENT_LENGTH, text.len());
            Bytes::copy_from_slice(text.as_bytes())
        }
        None => Bytes::new(),
    };

    builder
        .body(Full::new(body))
        .map_err(|e| RequestError::Http(format!("Failed to build request: {}", e)))
}

/// Executes requests against a fixed trust policy.
pub struct RequestExecutor {
    tls: Arc<dyn TlsProvider>,
    resolver: Arc<dyn DnsResolver>,
    line_mode: LineMode,
}

impl RequestExecutor {
    pub fn new(tls: Arc<dyn TlsProvider>) -> Self {
        Self {
            tls,
            resolver: Arc::new(SystemDnsResolver::new()),
            line_mode: LineMode::default(),
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn DnsResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_line_mode(mut self, line_mode: LineMode) -> Self {
        self.line_mode = line_mode;
        self
    }

    pub fn line_mode(&self) -> LineMode {
        self.line_mode
    }

    /// Performs one request, absorbing every failure.
    ///
    /// On failure the URL, method, body and cause are logged at `error` and
    /// `None` is returned; callers cannot tell failure causes apart.
    pub async fn perform(&self, spec: &RequestSpec) -> Option<String> {
        match self.execute(spec).await {
            Ok(body) => Some(body),
            Err(e) => {
                tracing::error!(
                    url = %spec.url,
                    method = %spec.method,
                    body = %spec.body.as_deref().unwrap_or("null"),
                    code = e.code(),
                    error = %e,
                    "Error during HTTP request"
                );
                None
            }
        }
    }

    /// Performs one request and returns the assembled response body.
    ///
    /// Statuses of 400 and above fail without reading the body.
    pub async fn execute(&self, spec: &RequestSpec) -> Result<String, RequestError> {
        let target = Target::from_url(&spec.url)?;
        let request = build_http_request(&spec.method, &target, spec.payload())?;

        let tcp_stream = self.connect(&target).await?;

        if target.is_https {
            let tls_stream = connect_tls(self.tls.as_ref(), tcp_stream, target.server_name())
                .await
                .map_err(RequestError::Tls)?;
            self.exchange(tls_stream, request).await
        } else {
            self.exchange(tcp_stream, request).await
        }
    }

    /// Opens a TCP connection to the first reachable resolved address.
    async fn connect(&self, target: &Target) -> Result<TcpStream, RequestError> {
        let ips = self
            .resolver
            .resolve(&target.host)
            .await
            .map_err(RequestError::Dns)?;

        let mut last_error = None;
        for ip in ips {
            let addr = SocketAddr::new(ip, target.port);
            tracing::debug!(%addr, host = %target.host, "Connecting");
            match TcpStream::connect(addr).await {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    tracing::debug!(%addr, error = %e, "Connect attempt failed");
                    last_error = Some(e);
                }
            }
        }

        Err(RequestError::Connect(last_error.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "no addresses to connect to")
        })))
    }

    /// Runs one HTTP/1.1 exchange over `io`.
    ///
    /// The connection driver is polled in this task alongside the exchange
    /// and dropped with it, so the socket is closed by the time this returns
    /// on every path.
    async fn exchange<T>(&self, io: T, request: Request<Full<Bytes>>) -> Result<String, RequestError>
    where
        T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(io))
            .await
            .map_err(|e| RequestError::Http(format!("HTTP handshake failed: {}", e)))?;

        let exchange = send_and_read(sender, request, self.line_mode);

        tokio::pin!(conn);
        tokio::pin!(exchange);

        tokio::select! {
            result = &mut exchange => result,
            driven = &mut conn => match driven {
                // The peer closed after a complete response; the body is
                // already buffered for the exchange.
                Ok(()) => exchange.await,
                Err(e) => Err(RequestError::Http(format!("Connection error: {}", e))),
            },
        }
    }
}

/// Sends the request and reads the whole response body.
async fn send_and_read(
    mut sender: hyper::client::conn::http1::SendRequest<Full<Bytes>>,
    request: Request<Full<Bytes>>,
    line_mode: LineMode,
) -> Result<String, RequestError> {
    let response = sender
        .send_request(request)
        .await
        .map_err(|e| RequestError::Http(format!("Request failed: {}", e)))?;

    let status = response.status().as_u16();
    if status >= 400 {
        return Err(RequestError::Status(status));
    }

    let content_encoding = response
        .headers()
        .get(header::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let bytes = response
        .into_body()
        .collect()
        .await
        .map_err(|e| RequestError::Http(format!("Failed to read body: {}", e)))?
        .to_bytes();

    let body = assemble_body(&bytes, content_encoding.as_deref(), line_mode)?;
    tracing::info!(status, body = %body, "Response received");
    Ok(body)
}
