use thiserror::Error;

/// Failure while building or installing a trust policy.
#[derive(Error, Debug)]
pub enum TrustError {
    #[error("TLS context initialization failed: {0}")]
    Provider(#[from] rustls::Error),
}

/// Failure of a single request/response exchange.
///
/// The bridge entry point collapses every variant into an absent result;
/// the variant only reaches logs and tests.
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("DNS lookup failed: {0}")]
    Dns(String),

    #[error("TCP connection failed: {0}")]
    Connect(#[source] std::io::Error),

    #[error("TLS handshake failed: {0}")]
    Tls(String),

    #[error("Invalid method: {0}")]
    InvalidMethod(String),

    #[error("HTTP exchange failed: {0}")]
    Http(String),

    #[error("Server returned HTTP {0}")]
    Status(u16),

    #[error("Decompression failed: {0}")]
    Decompression(String),

    #[error("Response body is not valid UTF-8: {0}")]
    Decode(#[from] std::string::FromUtf8Error),
}

impl RequestError {
    /// Short machine-readable code, mirrored in logs.
    pub fn code(&self) -> &'static str {
        match self {
            RequestError::InvalidUrl(_) => "INVALID_URL",
            RequestError::UnsupportedScheme(_) => "UNSUPPORTED_SCHEME",
            RequestError::Dns(_) => "DNS_ERROR",
            RequestError::Connect(_) => "CONNECTION_FAILED",
            RequestError::Tls(_) => "TLS_ERROR",
            RequestError::InvalidMethod(_) => "INVALID_METHOD",
            RequestError::Http(_) => "HTTP_ERROR",
            RequestError::Status(_) => "HTTP_STATUS",
            RequestError::Decompression(_) => "DECOMPRESSION_ERROR",
            RequestError::Decode(_) => "DECODE_ERROR",
        }
    }
}

/// Failure while constructing a [`crate::Bridge`].
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Trust policy installation failed: {0}")]
    Trust(#[from] TrustError),

    #[error("Failed to build request runtime: {0}")]
    Runtime(#[source] std::io::Error),
}
