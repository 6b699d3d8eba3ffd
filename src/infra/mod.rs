//! Infrastructure layer providing abstractions for external dependencies.
//!
//! This module contains traits and implementations for:
//! - DNS resolution
//! - TLS trust policies and connectors
//! - Content decompression
//!
//! These abstractions enable dependency injection and easier testing.

pub mod decompressor;
pub mod dns;
pub mod tls;

pub use decompressor::{decompress_body, Decompressor, MultiDecompressor};
pub use dns::{DnsResolver, OverrideDnsResolver, SystemDnsResolver};
pub use tls::{
    install_trust_all_policy, install_trust_all_policy_with, installed_policy, ConnectorFactory,
    TlsProvider, TrustPolicy,
};
