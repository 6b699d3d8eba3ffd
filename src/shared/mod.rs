//! Shared utilities used across the bridge.

pub mod cert_parser;

pub use cert_parser::{log_accepted_certificate, parse_x509_basic, BasicCertInfo, PeerRole};
