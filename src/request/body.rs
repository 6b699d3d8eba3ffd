//! Response body assembly.
//!
//! Turns the raw bytes read off the connection into the string handed back
//! to the caller: decompress, decode, then reassemble lines.

use crate::config::LineMode;
use crate::error::RequestError;
use crate::infra::decompress_body;

/// Removes every line terminator (`\n`, `\r` or `\r\n`), concatenating the
/// lines in order. Multi-line bodies collapse into a single line, which is
/// lossy; [`LineMode::Preserve`] skips this step.
pub fn collapse_lines(text: &str) -> String {
    text.chars().filter(|c| *c != '\n' && *c != '\r').collect()
}

/// Builds the caller-visible body from raw response bytes.
///
/// Bytes that are not valid UTF-8 after decompression fail the request.
pub fn assemble_body(
    bytes: &[u8],
    content_encoding: Option<&str>,
    line_mode: LineMode,
) -> Result<String, RequestError> {
    let decompressed =
        decompress_body(bytes, content_encoding).map_err(RequestError::Decompression)?;
    let text = String::from_utf8(decompressed)?;

    Ok(match line_mode {
        LineMode::Collapse => collapse_lines(&text),
        LineMode::Preserve => text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_collapse_all_terminator_styles() {
        assert_eq!(collapse_lines("a\nb\r\nc\rd"), "abcd");
        assert_eq!(collapse_lines("pong"), "pong");
        assert_eq!(collapse_lines("\n\n"), "");
        assert_eq!(collapse_lines("{\n  \"a\": 1\n}\n"), "{  \"a\": 1}");
    }

    #[test]
    fn test_preserve_keeps_bytes() {
        let body = assemble_body(b"line one\r\nline two\n", None, LineMode::Preserve).unwrap();
        assert_eq!(body, "line one\r\nline two\n");
    }

    #[test]
    fn test_collapse_after_decompression() {
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::fast());
        encoder.write_all(b"po\nng\n").unwrap();
        let compressed = encoder.finish().unwrap();

        let body = assemble_body(&compressed, Some("gzip"), LineMode::Collapse).unwrap();
        assert_eq!(body, "pong");
    }

    #[test]
    fn test_invalid_utf8_is_decode_error() {
        let err = assemble_body(&[0xff, 0xfe, b'a'], None, LineMode::Collapse).unwrap_err();
        assert_eq!(err.code(), "DECODE_ERROR");
    }

    #[test]
    fn test_bad_encoding_is_decompression_error() {
        let err = assemble_body(b"plain", Some("gzip"), LineMode::Collapse).unwrap_err();
        assert_eq!(err.code(), "DECOMPRESSION_ERROR");
    }
}
