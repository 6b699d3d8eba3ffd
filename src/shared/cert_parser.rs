//! X.509 certificate parsing utilities.
//!
//! Certificates accepted without validation are described in the logs so a
//! reader can see what the process trusted.

use base64::Engine;
use rustls::pki_types::CertificateDer;
use std::fmt;
use std::net::IpAddr;
use x509_parser::prelude::*;

/// Which side of the handshake presented a certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerRole {
    Server,
    Client,
}

impl fmt::Display for PeerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerRole::Server => f.write_str("server"),
            PeerRole::Client => f.write_str("client"),
        }
    }
}

/// Basic X.509 certificate information extracted from DER-encoded data.
#[derive(Debug, Default)]
pub struct BasicCertInfo {
    pub issuer: Option<String>,
    pub subject: Option<String>,
    pub valid_from: Option<i64>,
    pub valid_to: Option<i64>,
    pub san: Vec<String>,
}

impl BasicCertInfo {
    /// A certificate whose issuer equals its subject.
    pub fn is_self_signed(&self) -> bool {
        self.subject.is_some() && self.subject == self.issuer
    }
}

fn common_name_or_full(name: &X509Name<'_>) -> Option<String> {
    name.iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(|s| s.to_string())
        .or_else(|| Some(name.to_string()))
}

/// Parses basic certificate information from DER-encoded X.509 data.
///
/// Fields that cannot be parsed are `None` or empty.
pub fn parse_x509_basic(der: &[u8]) -> BasicCertInfo {
    let mut info = BasicCertInfo::default();

    let Ok((_, cert)) = X509Certificate::from_der(der) else {
        return info;
    };

    info.subject = common_name_or_full(cert.subject());
    info.issuer = common_name_or_full(cert.issuer());
    info.valid_from = Some(cert.validity().not_before.timestamp());
    info.valid_to = Some(cert.validity().not_after.timestamp());

    if let Ok(Some(san_ext)) = cert.subject_alternative_name() {
        for name in &san_ext.value.general_names {
            match name {
                GeneralName::DNSName(dns) => info.san.push(dns.to_string()),
                GeneralName::IPAddress(bytes) => {
                    let ip = match bytes.len() {
                        4 => <[u8; 4]>::try_from(*bytes).ok().map(IpAddr::from),
                        16 => <[u8; 16]>::try_from(*bytes).ok().map(IpAddr::from),
                        _ => None,
                    };
                    if let Some(ip) = ip {
                        info.san.push(ip.to_string());
                    }
                }
                _ => {}
            }
        }
    }

    info
}

/// Logs a certificate that was accepted without validation, with its
/// validity window as Unix timestamps and its subject alternative names.
pub fn log_accepted_certificate(
    role: PeerRole,
    end_entity: &CertificateDer<'_>,
    intermediates: usize,
    server_name: Option<&str>,
) {
    let info = parse_x509_basic(end_entity.as_ref());

    tracing::warn!(
        %role,
        server_name = server_name.unwrap_or("-"),
        subject = info.subject.as_deref().unwrap_or("<unparsed>"),
        issuer = info.issuer.as_deref().unwrap_or("<unparsed>"),
        self_signed = info.is_self_signed(),
        not_before = info.valid_from,
        not_after = info.valid_to,
        san = %info.san.join(","),
        intermediates,
        "Accepting certificate without verification"
    );

    if tracing::enabled!(tracing::Level::TRACE) {
        let encoded = base64::engine::general_purpose::STANDARD.encode(end_entity.as_ref());
        tracing::trace!(%role, der = %encoded, "Accepted certificate DER");
    }
}
