//! Content decompression infrastructure.
//!
//! Responses are requested with `Accept-Encoding` and decoded transparently
//! before the body reaches the caller, the way the platform HTTP stack does.

use std::io::Read;

/// Value sent in the `Accept-Encoding` request header.
pub const ACCEPT_ENCODING: &str = "gzip, deflate, br";

/// Trait for content decompression.
pub trait Decompressor: Send + Sync {
    /// Returns `true` if this decompressor handles the given (lower-case)
    /// content-coding token.
    fn handles(&self, coding: &str) -> bool;

    /// Decompresses the given data.
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, String>;
}

/// Gzip decompressor implementation.
#[derive(Default)]
pub struct GzipDecompressor;

impl Decompressor for GzipDecompressor {
    fn handles(&self, coding: &str) -> bool {
        coding == "gzip" || coding == "x-gzip"
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, String> {
        let mut decompressed = Vec::new();
        flate2::read::GzDecoder::new(data)
            .read_to_end(&mut decompressed)
            .map_err(|e| format!("gzip: {}", e))?;
        Ok(decompressed)
    }
}

/// Deflate decompressor implementation.
///
/// `Content-Encoding: deflate` is zlib-wrapped per RFC 9110, but some
/// servers send raw deflate; both are accepted.
#[derive(Default)]
pub struct DeflateDecompressor;

impl Decompressor for DeflateDecompressor {
    fn handles(&self, coding: &str) -> bool {
        coding == "deflate"
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, String> {
        let mut decompressed = Vec::new();
        if flate2::read::ZlibDecoder::new(data)
            .read_to_end(&mut decompressed)
            .is_ok()
        {
            return Ok(decompressed);
        }

        decompressed.clear();
        flate2::read::DeflateDecoder::new(data)
            .read_to_end(&mut decompressed)
            .map_err(|e| format!("deflate: {}", e))?;
        Ok(decompressed)
    }
}

/// Brotli decompressor implementation.
#[derive(Default)]
pub struct BrotliDecompressor;

impl Decompressor for BrotliDecompressor {
    fn handles(&self, coding: &str) -> bool {
        coding == "br"
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, String> {
        let mut decompressed = Vec::new();
        brotli::BrotliDecompress(&mut std::io::Cursor::new(data), &mut decompressed)
            .map_err(|e| format!("br: {}", e))?;
        Ok(decompressed)
    }
}

/// Selects the decompressor for each coding listed in `Content-Encoding`.
pub struct MultiDecompressor {
    decompressors: Vec<Box<dyn Decompressor>>,
}

impl Default for MultiDecompressor {
    fn default() -> Self {
        Self {
            decompressors: vec![
                Box::new(GzipDecompressor),
                Box::new(DeflateDecompressor),
                Box::new(BrotliDecompressor),
            ],
        }
    }
}

impl MultiDecompressor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Undoes every coding in `encoding`, last applied first.
    ///
    /// `identity` and an absent header pass the data through; an unknown
    /// coding is an error since the body cannot be read as text.
    pub fn decompress(&self, data: &[u8], encoding: Option<&str>) -> Result<Vec<u8>, String> {
        let Some(encoding) = encoding else {
            return Ok(data.to_vec());
        };

        let codings: Vec<String> = encoding
            .split(',')
            .map(|c| c.trim().to_ascii_lowercase())
            .filter(|c| !c.is_empty() && c != "identity")
            .collect();

        let mut body = data.to_vec();
        for coding in codings.iter().rev() {
            let decompressor = self
                .decompressors
                .iter()
                .find(|d| d.handles(coding))
                .ok_or_else(|| format!("unsupported content-encoding: {}", coding))?;
            body = decompressor.decompress(&body)?;
        }
        Ok(body)
    }
}

/// Convenience function for decompressing body data.
pub fn decompress_body(body: &[u8], encoding: Option<&str>) -> Result<Vec<u8>, String> {
    MultiDecompressor::new().decompress(body, encoding)
}
