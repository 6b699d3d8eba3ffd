use std::env;

use rustls::SupportedProtocolVersion;

/// How the response body is reassembled after decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineMode {
    /// Drop every line terminator and concatenate the lines.
    #[default]
    Collapse,
    /// Keep the body exactly as received.
    Preserve,
}

impl LineMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "collapse" => Some(LineMode::Collapse),
            "preserve" => Some(LineMode::Preserve),
            _ => None,
        }
    }
}

static TLS13_ONLY: &[&SupportedProtocolVersion] = &[&rustls::version::TLS13];

/// TLS protocol versions offered by the trust policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsVersions {
    #[default]
    Tls12And13,
    Tls13Only,
}

impl TlsVersions {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "1.2+1.3" | "1.2" => Some(TlsVersions::Tls12And13),
            "1.3" => Some(TlsVersions::Tls13Only),
            _ => None,
        }
    }

    pub fn protocol_versions(self) -> &'static [&'static SupportedProtocolVersion] {
        match self {
            TlsVersions::Tls12And13 => rustls::ALL_VERSIONS,
            TlsVersions::Tls13Only => TLS13_ONLY,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub line_mode: LineMode,
    pub tls_versions: TlsVersions,
    /// The only browser origin allowed to call the bridge cross-origin.
    pub allowed_origin: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            line_mode: LineMode::default(),
            tls_versions: TlsVersions::default(),
            allowed_origin: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            line_mode: env::var("BRIDGE_LINE_MODE")
                .ok()
                .and_then(|m| LineMode::parse(&m))
                .unwrap_or(defaults.line_mode),
            tls_versions: env::var("BRIDGE_TLS_VERSIONS")
                .ok()
                .and_then(|v| TlsVersions::parse(&v))
                .unwrap_or(defaults.tls_versions),
            allowed_origin: env::var("BRIDGE_ALLOWED_ORIGIN")
                .ok()
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty()),
        }
    }
}
