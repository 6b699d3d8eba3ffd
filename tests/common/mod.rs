//! Shared fixtures: a test server that can speak TLS with the self-signed
//! fixture certificate, and a log capture for assertions.

#![allow(dead_code)]

use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use insecure_bridge::{TlsVersions, TrustPolicy};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use std::collections::HashMap;
use std::convert::Infallible;
use std::io::{self, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Notify;
use tokio_rustls::TlsAcceptor;
use tracing_subscriber::fmt::MakeWriter;

pub const CERT_PEM: &[u8] = include_bytes!("../fixtures/self-signed.crt");
pub const KEY_PEM: &[u8] = include_bytes!("../fixtures/self-signed.key");

pub fn fixture_chain() -> Vec<CertificateDer<'static>> {
    vec![CertificateDer::from_pem_slice(CERT_PEM).expect("fixture certificate")]
}

pub fn fixture_key() -> PrivateKeyDer<'static> {
    PrivateKeyDer::from_pem_slice(KEY_PEM).expect("fixture key")
}

/// A request as the server saw it.
#[derive(Debug, Clone, Default)]
pub struct RawRequest {
    pub method: String,
    /// Path plus query.
    pub path: String,
    /// Header names lower-cased.
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

/// What the server does with a request.
pub enum Reply {
    Respond {
        status: u16,
        headers: Vec<(&'static str, String)>,
        body: Vec<u8>,
    },
    /// Close the connection without answering.
    Hangup,
}

impl Reply {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Reply::status(200, body)
    }

    pub fn status(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Reply::Respond {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }
}

type Handler = Arc<dyn Fn(&RawRequest) -> Reply + Send + Sync>;

#[derive(Default)]
struct ServerState {
    requests: Mutex<Vec<RawRequest>>,
    accepted: AtomicUsize,
    closed: AtomicUsize,
}

/// HTTP/1.1 server on 127.0.0.1, running on its own runtime thread. It keeps
/// connections alive, so only the client (or a [`Reply::Hangup`]) closes them.
pub struct TestServer {
    pub port: u16,
    state: Arc<ServerState>,
}

impl TestServer {
    /// Plain HTTP server.
    pub fn http(handler: impl Fn(&RawRequest) -> Reply + Send + Sync + 'static) -> Self {
        Self::start(None, Arc::new(handler))
    }

    /// TLS server presenting the self-signed fixture certificate.
    pub fn https(handler: impl Fn(&RawRequest) -> Reply + Send + Sync + 'static) -> Self {
        let policy = TrustPolicy::trust_all(TlsVersions::default()).expect("policy");
        let config = policy
            .server_config(fixture_chain(), fixture_key())
            .expect("server config");
        Self::start(Some(TlsAcceptor::from(config)), Arc::new(handler))
    }

    fn start(tls: Option<TlsAcceptor>, handler: Handler) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.set_nonblocking(true).expect("nonblocking");
        let port = listener.local_addr().expect("addr").port();
        let state = Arc::new(ServerState::default());

        {
            let state = state.clone();
            thread::spawn(move || {
                let runtime = tokio::runtime::Builder::new_multi_thread()
                    .worker_threads(2)
                    .enable_all()
                    .build()
                    .expect("server runtime");
                runtime.block_on(accept_loop(listener, tls, handler, state));
            });
        }

        Self { port, state }
    }

    pub fn requests(&self) -> Vec<RawRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn accepted(&self) -> usize {
        self.state.accepted.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.state.closed.load(Ordering::SeqCst)
    }

    /// Waits until every accepted connection has been closed.
    pub fn wait_all_closed(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.closed() == self.accepted() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        self.closed() == self.accepted()
    }
}

async fn accept_loop(
    listener: TcpListener,
    tls: Option<TlsAcceptor>,
    handler: Handler,
    state: Arc<ServerState>,
) {
    let listener = tokio::net::TcpListener::from_std(listener).expect("listener");
    loop {
        let Ok((stream, _)) = listener.accept().await else {
            continue;
        };
        state.accepted.fetch_add(1, Ordering::SeqCst);

        let tls = tls.clone();
        let handler = handler.clone();
        let state = state.clone();
        tokio::spawn(async move {
            match tls {
                // A failed handshake closes the connection like any other end.
                Some(acceptor) => {
                    if let Ok(stream) = acceptor.accept(stream).await {
                        serve(stream, handler, state.clone()).await;
                    }
                }
                None => serve(stream, handler, state.clone()).await,
            }
            state.closed.fetch_add(1, Ordering::SeqCst);
        });
    }
}

/// Serves one connection until the client closes it or a handler hangs up.
async fn serve<S>(stream: S, handler: Handler, state: Arc<ServerState>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let hangup = Arc::new(Notify::new());
    let service = {
        let hangup = hangup.clone();
        service_fn(move |request| {
            respond(request, handler.clone(), state.clone(), hangup.clone())
        })
    };

    let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);

    // Dropping `conn` drops the stream, so a hangup closes it unanswered.
    tokio::select! {
        _ = conn => {}
        _ = hangup.notified() => {}
    }
}

async fn respond(
    request: Request<Incoming>,
    handler: Handler,
    state: Arc<ServerState>,
    hangup: Arc<Notify>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let (parts, body) = request.into_parts();
    let body = body
        .collect()
        .await
        .map(|collected| collected.to_bytes().to_vec())
        .unwrap_or_default();

    let raw = RawRequest {
        method: parts.method.as_str().to_string(),
        path: parts
            .uri
            .path_and_query()
            .map(|p| p.as_str().to_string())
            .unwrap_or_else(|| "/".to_string()),
        headers: parts
            .headers
            .iter()
            .map(|(name, value)| {
                let value = value.to_str().unwrap_or_default().to_string();
                (name.as_str().to_string(), value)
            })
            .collect(),
        body,
    };
    state.requests.lock().unwrap().push(raw.clone());

    match handler(&raw) {
        Reply::Respond {
            status,
            headers,
            body,
        } => {
            let mut builder =
                Response::builder().status(StatusCode::from_u16(status).expect("status"));
            for (name, value) in headers {
                builder = builder.header(name, value);
            }
            Ok(builder.body(Full::new(Bytes::from(body))).expect("response"))
        }
        Reply::Hangup => {
            hangup.notify_one();
            std::future::pending().await
        }
    }
}

/// A port on 127.0.0.1 that refuses connections.
pub fn refused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    listener.local_addr().expect("addr").port()
}

/// Collects formatted log output from the current thread.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Runs `f` with a subscriber that records every event on this thread.
pub fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::TRACE)
        .finish();
    let out = tracing::subscriber::with_default(subscriber, f);
    (out, logs.contents())
}
